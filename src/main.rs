//! Sitewalk main entry point
//!
//! This is the command-line interface for the Sitewalk site crawler.

use anyhow::{bail, Context};
use clap::Parser;
use sitewalk::analysis::{CancelToken, DistanceEngine};
use sitewalk::config::{load_config_with_hash, Config};
use sitewalk::crawler::{HttpLoaderFactory, LoaderFactory, Poll, SiteCrawler};
use sitewalk::output::{print_statistics, CrawlStatistics};
use sitewalk::url::parse_domain;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;
use url::Url;

/// How long the crawl loop sleeps when no result is ready
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Sitewalk: a resumable, domain-scoped site crawler
///
/// Sitewalk crawls every page reachable inside a domain, checks that the
/// pages it links to outside the domain exist, and checkpoints its progress
/// so an interrupted crawl can be resumed.
#[derive(Parser, Debug)]
#[command(name = "sitewalk")]
#[command(version)]
#[command(about = "A resumable, domain-scoped site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume the crawl stored in the configured archive
    #[arg(long)]
    resume: bool,

    /// Suspend the crawl after this many seconds
    #[arg(long, value_name = "SECS")]
    duration_secs: Option<u64>,

    /// Show statistics from the archive and exit
    #[arg(long, conflicts_with_all = ["resume", "duration_secs"])]
    stats: bool,

    /// Report the pair of pages farthest apart once crawling stops
    #[arg(long)]
    max_distance: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let factory: Arc<dyn LoaderFactory> = Arc::new(
        HttpLoaderFactory::new(&config.user_agent, &config.loader)
            .context("Failed to build HTTP client")?,
    );

    let crawler = if cli.stats {
        open_archive(&config, factory)?
    } else {
        let crawler = prepare_crawl(&config, factory, cli.resume)?;
        run_crawl(&crawler, cli.duration_secs.map(Duration::from_secs)).await?;
        crawler
    };

    let stats = CrawlStatistics::collect(&crawler)?;
    print_statistics(crawler.domain(), &stats);

    if cli.max_distance {
        report_max_distance(crawler, &config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitewalk=info,warn"),
            1 => EnvFilter::new("sitewalk=debug,info"),
            2 => EnvFilter::new("sitewalk=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn archive_path(config: &Config) -> Option<&Path> {
    config.site.archive.as_deref().map(Path::new)
}

fn open_archive(config: &Config, factory: Arc<dyn LoaderFactory>) -> anyhow::Result<SiteCrawler> {
    let Some(dir) = archive_path(config) else {
        bail!("No archive directory configured under [site]");
    };
    let crawler = SiteCrawler::open(dir, config.crawler.clone(), factory)
        .with_context(|| format!("Failed to open archive {}", dir.display()))?;
    tracing::info!("Opened archive {} for {}", dir.display(), crawler.domain());
    Ok(crawler)
}

/// Builds the crawler, either fresh with seeds queued or from the archive
fn prepare_crawl(
    config: &Config,
    factory: Arc<dyn LoaderFactory>,
    resume: bool,
) -> anyhow::Result<SiteCrawler> {
    if resume {
        let crawler = open_archive(config, factory)?;
        let pending = crawler.to_load()?.len();
        tracing::info!("Resuming with {} pending URIs", pending);
        return Ok(crawler);
    }

    let domain = parse_domain(&config.site.domain)
        .with_context(|| format!("Invalid domain {}", config.site.domain))?;

    if let Some(dir) = archive_path(config) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create archive directory {}", dir.display()))?;
    }

    let crawler = SiteCrawler::new(
        domain.clone(),
        archive_path(config),
        config.crawler.clone(),
        factory,
    )?;

    let seeds = if config.site.seeds.is_empty() {
        vec![domain]
    } else {
        config
            .site
            .seeds
            .iter()
            .map(|seed| Url::parse(seed).with_context(|| format!("Invalid seed {}", seed)))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    tracing::info!("Queueing {} seed URIs", seeds.len());
    for seed in seeds {
        crawler.add_seed(seed)?;
    }

    Ok(crawler)
}

/// Crawls until the frontier empties, the deadline passes or Ctrl-C arrives
async fn run_crawl(crawler: &SiteCrawler, duration: Option<Duration>) -> anyhow::Result<()> {
    let deadline = duration.map(|d| Instant::now() + d);
    crawler.start()?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seen = 0u64;
    loop {
        match crawler.poll()? {
            Poll::Item(result) => {
                seen += 1;
                match &result.error {
                    Some(error) => tracing::info!("[{}] {} failed: {}", seen, result.uri, error),
                    None => tracing::info!(
                        "[{}] {} ({} links)",
                        seen,
                        result.uri,
                        result.links().len()
                    ),
                }
                continue;
            }
            Poll::NotRunning => break,
            Poll::Pending => {}
        }

        if crawler.to_load()?.is_empty() {
            tracing::info!("Nothing left to load");
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("Crawl duration elapsed");
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted, suspending crawl");
                break;
            }
            _ = tokio::time::sleep(IDLE_POLL) => {}
        }
    }

    crawler.suspend().await.context("Failed to suspend crawl")?;
    match crawler.archive_dir() {
        Some(dir) => tracing::info!("Crawl suspended, checkpoint written to {}", dir.display()),
        None => tracing::info!("Crawl suspended"),
    }
    Ok(())
}

async fn report_max_distance(crawler: SiteCrawler, config: &Config) -> anyhow::Result<()> {
    let engine = DistanceEngine::new(Arc::new(crawler), &config.distance);
    let cancel = CancelToken::new();

    let canceller = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let outcome = engine.compute_max_distance(&cancel).await;
    watcher.abort();

    match outcome.context("Failed to compute distances")? {
        Some(max) => println!(
            "\nMax distance: {} ({} -> {})",
            max.distance, max.from, max.to
        ),
        None => println!("\nMax distance: no pages loaded"),
    }
    Ok(())
}
