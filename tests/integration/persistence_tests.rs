//! Checkpointing and resuming crawls from an archive directory

use crate::common::{config, crawl_to_end, site, stalled, url};
use sitewalk::config::CrawlerConfig;
use sitewalk::crawler::{LoaderFactory, SiteCrawler};
use sitewalk::storage::DirectoryArchive;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn small_site() -> Arc<dyn LoaderFactory> {
    site(&[
        ("http://a.test/", &["/b", "/c", "http://ext.test/"]),
        ("http://a.test/b", &["/c", "/d"]),
        ("http://a.test/c", &[]),
    ])
}

#[tokio::test]
async fn test_resume_round_trip() {
    let dir = TempDir::new().unwrap();

    let (loaded, errors, results) = {
        let crawler =
            SiteCrawler::new(url("http://a.test/"), Some(dir.path()), config(2), small_site())
                .unwrap();
        crawler.add_seed(url("http://a.test/")).unwrap();
        crawl_to_end(&crawler).await;
        (
            crawler.loaded().unwrap(),
            crawler.errors().unwrap(),
            crawler.results(),
        )
    };

    let reopened = SiteCrawler::open(dir.path(), config(2), small_site()).unwrap();
    assert_eq!(reopened.domain(), &url("http://a.test/"));
    assert_eq!(reopened.archive_dir(), Some(dir.path()));
    assert_eq!(reopened.loaded().unwrap(), loaded);
    assert_eq!(reopened.errors().unwrap(), errors);
    assert!(reopened.to_load().unwrap().is_empty());
    assert_eq!(reopened.results(), results);

    // Nothing left to do, so start leaves it idle
    reopened.start().unwrap();
    assert!(!reopened.is_running());
}

#[tokio::test]
async fn test_resume_loads_only_pending() {
    let dir = TempDir::new().unwrap();
    let seeds: HashSet<_> = ["http://a.test/", "http://a.test/b", "http://a.test/c"]
        .iter()
        .map(|s| url(s))
        .collect();

    {
        let crawler =
            SiteCrawler::new(url("http://a.test/"), Some(dir.path()), config(2), stalled())
                .unwrap();
        for seed in &seeds {
            crawler.add_seed(seed.clone()).unwrap();
        }
        crawler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        crawler.suspend().await.unwrap();
    }

    let reopened = SiteCrawler::open(dir.path(), config(2), small_site()).unwrap();
    assert_eq!(reopened.to_load().unwrap(), seeds);
    assert!(reopened.loaded().unwrap().is_empty());

    let results = crawl_to_end(&reopened).await;
    let fetched: Vec<_> = results.iter().map(|r| r.uri.clone()).collect();
    let unique: HashSet<_> = fetched.iter().cloned().collect();
    assert_eq!(fetched.len(), unique.len(), "a URI was loaded twice");

    assert_eq!(
        reopened.loaded().unwrap(),
        ["http://a.test/", "http://a.test/b", "http://a.test/c", "http://ext.test/"]
            .iter()
            .map(|s| url(s))
            .collect::<HashSet<_>>()
    );
    assert_eq!(
        reopened.errors().unwrap(),
        HashSet::from([url("http://a.test/d")])
    );
}

#[tokio::test]
async fn test_explicit_checkpoint_while_running() {
    let dir = TempDir::new().unwrap();
    let crawler =
        SiteCrawler::new(url("http://a.test/"), Some(dir.path()), config(2), small_site())
            .unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawler.start().unwrap();
    crate::common::drain(&crawler).await;

    assert!(crawler.is_running());
    crawler.checkpoint().unwrap();

    let restored = DirectoryArchive::restore(dir.path()).unwrap();
    assert_eq!(restored.discovered, crawler.loaded().unwrap());
    assert_eq!(restored.failed, crawler.errors().unwrap());
    assert!(restored.pending.is_empty());

    crawler.suspend().await.unwrap();
}

#[tokio::test]
async fn test_periodic_checkpoint_while_running() {
    let dir = TempDir::new().unwrap();
    let crawler = SiteCrawler::new(
        url("http://a.test/"),
        Some(dir.path()),
        CrawlerConfig {
            checkpoint_interval_secs: 1,
            ..config(2)
        },
        site(&[
            ("http://a.test/", &["/b", "/stall"]),
            ("http://a.test/b", &[]),
        ]),
    )
    .unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    let started = tokio::time::Instant::now();
    crawler.start().unwrap();

    let loaded = HashSet::from([url("http://a.test/"), url("http://a.test/b")]);
    while crawler.loaded().unwrap() != loaded {
        assert!(started.elapsed() < Duration::from_millis(900), "crawl did not settle");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Between the first and second tick
    tokio::time::sleep_until(started + Duration::from_millis(1500)).await;
    let restored = DirectoryArchive::restore(dir.path()).unwrap();

    assert_eq!(restored.discovered, loaded);
    assert!(crawler.is_running());
    assert!(restored.failed.is_empty());
    assert_eq!(restored.pending, vec![url("http://a.test/stall")]);
    assert_eq!(
        restored.results[&url("http://a.test/")].links(),
        &[url("http://a.test/b"), url("http://a.test/stall")]
    );

    crawler.suspend().await.unwrap();
}

#[tokio::test]
async fn test_reopening_missing_archive_fails() {
    let dir = TempDir::new().unwrap();
    let result = SiteCrawler::open(dir.path(), config(2), small_site());
    assert!(matches!(result, Err(sitewalk::SitewalkError::Storage(_))));
}
