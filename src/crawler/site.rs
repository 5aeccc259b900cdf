//! Site crawler
//!
//! A [`SiteCrawler`] crawls everything reachable inside one domain. It wraps a
//! [`CrawlScheduler`] whose link-page predicate is domain membership, keeps a
//! per-URI ledger of results, and, when given an archive directory,
//! checkpoints its progress periodically and on suspend so the crawl can be
//! resumed with [`SiteCrawler::open`].
//!
//! # Lifecycle
//!
//! ```text
//! new/open ──▶ Idle ──start──▶ Running ──suspend──▶ Idle
//!                │                 │
//!                └─────cancel──────┴──────▶ Cancelled (terminal)
//! ```

use crate::config::{validate_crawler_config, CrawlerConfig};
use crate::crawler::fetcher::LoaderFactory;
use crate::crawler::result::{CrawlResult, Poll, ResultSink};
use crate::crawler::scheduler::CrawlScheduler;
use crate::state::Frontier;
use crate::storage::{CheckpointStore, DirectoryArchive, StorageResult};
use crate::url::{check_domain, in_domain};
use crate::{Result, SitewalkError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use url::Url;

/// Per-URI record of every result, fed by the crawl loop
struct Ledger {
    results: RwLock<HashMap<Url, CrawlResult>>,
    store: Option<Arc<dyn CheckpointStore>>,
    stream: broadcast::Sender<CrawlResult>,
}

impl ResultSink for Ledger {
    fn record(&self, result: &CrawlResult) {
        self.results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(result.uri.clone(), result.clone());

        if let Some(store) = &self.store {
            store.put(result);
        }

        // No subscribers is fine
        let _ = self.stream.send(result.clone());
    }
}

/// Periodic checkpoint task
struct Ticker {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Crawls every reachable page inside a domain
pub struct SiteCrawler {
    domain: Url,
    config: CrawlerConfig,
    scheduler: CrawlScheduler,
    ledger: Arc<Ledger>,
    store: Option<Arc<dyn CheckpointStore>>,
    archive_dir: Option<PathBuf>,
    generation: AtomicU64,
    ticker: Mutex<Option<Ticker>>,
}

impl SiteCrawler {
    /// Creates a crawler for `domain`
    ///
    /// When `archive_dir` is given, a new archive is created in it and the
    /// crawl is checkpointed there.
    ///
    /// # Errors
    ///
    /// * `Config` - a worker count, checkpoint interval or stream capacity is out of range
    /// * `InvalidDomain` - `domain` is not an http(s) URI without query and fragment
    /// * `Storage` - the archive could not be created
    pub fn new(
        domain: Url,
        archive_dir: Option<&Path>,
        config: CrawlerConfig,
        factory: Arc<dyn LoaderFactory>,
    ) -> Result<Self> {
        validate_crawler_config(&config)?;
        check_domain(&domain)
            .map_err(|e| SitewalkError::InvalidDomain(format!("{}: {}", domain, e)))?;

        let store = match archive_dir {
            Some(dir) => Some(Arc::new(DirectoryArchive::create(&domain, dir)?) as Arc<dyn CheckpointStore>),
            None => None,
        };

        Ok(Self::assemble(
            domain,
            archive_dir.map(Path::to_path_buf),
            store,
            config,
            factory,
            Frontier::new(),
            HashMap::new(),
        ))
    }

    /// Reopens the crawl archived in `dir`
    ///
    /// The crawler starts Idle with the restored discovered, failed and
    /// pending sets; nothing already recorded is loaded again.
    pub fn open(dir: &Path, config: CrawlerConfig, factory: Arc<dyn LoaderFactory>) -> Result<Self> {
        validate_crawler_config(&config)?;
        let restored = DirectoryArchive::restore(dir)?;
        let domain = restored.archive.domain().clone();
        check_domain(&domain)
            .map_err(|e| SitewalkError::InvalidDomain(format!("{}: {}", domain, e)))?;

        let frontier = Frontier::with_state(restored.discovered, restored.failed, restored.pending);
        let store: Arc<dyn CheckpointStore> = Arc::new(restored.archive);

        Ok(Self::assemble(
            domain,
            Some(dir.to_path_buf()),
            Some(store),
            config,
            factory,
            frontier,
            restored.results,
        ))
    }

    fn assemble(
        domain: Url,
        archive_dir: Option<PathBuf>,
        store: Option<Arc<dyn CheckpointStore>>,
        config: CrawlerConfig,
        factory: Arc<dyn LoaderFactory>,
        frontier: Frontier,
        results: HashMap<Url, CrawlResult>,
    ) -> Self {
        let (stream, _) = broadcast::channel(config.result_stream_capacity);
        let ledger = Arc::new(Ledger {
            results: RwLock::new(results),
            store: store.clone(),
            stream,
        });

        let scope = domain.clone();
        let scheduler = CrawlScheduler::builder(config.clone(), factory)
            .page_link(Arc::new(move |uri: &Url| in_domain(&scope, uri)))
            .frontier(frontier)
            .sink(Arc::clone(&ledger) as Arc<dyn ResultSink>)
            .build();

        Self {
            domain,
            config,
            scheduler,
            ledger,
            store,
            archive_dir,
            generation: AtomicU64::new(0),
            ticker: Mutex::new(None),
        }
    }

    /// Queues a seed URI inside the domain
    ///
    /// Returns true if the URI was newly queued.
    pub fn add_seed(&self, uri: Url) -> Result<bool> {
        if self.is_cancelled() {
            return Err(SitewalkError::Terminated);
        }
        if !in_domain(&self.domain, &uri) {
            return Err(SitewalkError::OutOfDomain {
                uri: uri.to_string(),
                domain: self.domain.to_string(),
            });
        }
        self.scheduler.add(uri)
    }

    /// Starts or resumes crawling in the background
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let was_running = self.scheduler.is_running();
        self.scheduler.start()?;
        if was_running || !self.scheduler.is_running() {
            return Ok(());
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Crawling {} (run {})", self.domain, generation);

        if let Some(store) = &self.store {
            let mut ticker = lock(&self.ticker);
            if ticker.is_none() {
                *ticker = Some(spawn_ticker(
                    Arc::clone(store),
                    self.scheduler.clone(),
                    Duration::from_secs(self.config.checkpoint_interval_secs),
                ));
            }
        }
        Ok(())
    }

    /// Suspends the crawl and writes a final checkpoint
    ///
    /// Returns once every in-flight URI is back in the pending set.
    pub async fn suspend(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SitewalkError::Terminated);
        }

        let ticker = lock(&self.ticker).take();
        if let Some(ticker) = ticker {
            let _ = ticker.stop.send(());
            if let Err(e) = ticker.task.await {
                tracing::warn!("Checkpoint task ended abnormally: {}", e);
            }
        }

        self.scheduler.suspend().await?;

        if let Some(store) = &self.store {
            let store = Arc::clone(store);
            let scheduler = self.scheduler.clone();
            tokio::task::spawn_blocking(move || checkpoint_now(store.as_ref(), &scheduler))
                .await
                .map_err(|e| {
                    SitewalkError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })??;
        }
        Ok(())
    }

    /// Stops the crawl for good
    pub fn cancel(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.task.abort();
        }
        self.scheduler.cancel();
    }

    /// Writes a checkpoint now, if the crawler has an archive
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SitewalkError::Terminated);
        }
        if let Some(store) = &self.store {
            checkpoint_now(store.as_ref(), &self.scheduler)?;
        }
        Ok(())
    }

    /// Returns the next result without waiting
    pub fn poll(&self) -> Result<Poll> {
        self.scheduler.poll()
    }

    /// The result recorded for `uri`
    ///
    /// # Errors
    ///
    /// * `UnknownUri` - `uri` is still pending or was never seen
    pub fn get(&self, uri: &Url) -> Result<CrawlResult> {
        if self.is_cancelled() {
            return Err(SitewalkError::Terminated);
        }
        self.with_results(|results| results.get(uri).cloned())
            .ok_or_else(|| SitewalkError::UnknownUri(uri.to_string()))
    }

    /// Snapshot of every recorded result
    pub fn results(&self) -> HashMap<Url, CrawlResult> {
        self.with_results(HashMap::clone)
    }

    /// Runs `f` over the recorded results without copying them
    pub fn with_results<R>(&self, f: impl FnOnce(&HashMap<Url, CrawlResult>) -> R) -> R {
        let results = self
            .ledger
            .results
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&results)
    }

    /// Live stream of results as they are recorded
    ///
    /// A subscriber that falls more than `result-stream-capacity` results
    /// behind skips the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlResult> {
        self.ledger.stream.subscribe()
    }

    pub fn loaded(&self) -> Result<HashSet<Url>> {
        self.scheduler.loaded()
    }

    pub fn to_load(&self) -> Result<HashSet<Url>> {
        self.scheduler.to_load()
    }

    pub fn errors(&self) -> Result<HashSet<Url>> {
        self.scheduler.errors()
    }

    pub fn domain(&self) -> &Url {
        &self.domain
    }

    /// The archive directory, if the crawl is being checkpointed
    pub fn archive_dir(&self) -> Option<&Path> {
        self.archive_dir.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn is_cancelled(&self) -> bool {
        self.scheduler.is_cancelled()
    }

    /// Number of times the crawl has been started
    ///
    /// Anything derived from the crawled link graph is stale once this changes.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for SiteCrawler {
    fn drop(&mut self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.task.abort();
        }
        if self.scheduler.is_running() {
            tracing::warn!("Crawler for {} dropped while running", self.domain);
            self.scheduler.cancel();
        }
    }
}

fn spawn_ticker(
    store: Arc<dyn CheckpointStore>,
    scheduler: CrawlScheduler,
    period: Duration,
) -> Ticker {
    let (stop, mut stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = interval.tick() => {
                    let store = Arc::clone(&store);
                    let scheduler = scheduler.clone();
                    let written =
                        tokio::task::spawn_blocking(move || checkpoint_now(store.as_ref(), &scheduler))
                            .await;
                    match written {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::warn!("Periodic checkpoint failed: {}", e),
                        Err(e) => tracing::warn!("Periodic checkpoint task failed: {}", e),
                    }
                }
            }
        }
    });
    Ticker { stop, task }
}

fn checkpoint_now(store: &dyn CheckpointStore, scheduler: &CrawlScheduler) -> StorageResult<()> {
    store.checkpoint(&|| scheduler.pending_snapshot())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
