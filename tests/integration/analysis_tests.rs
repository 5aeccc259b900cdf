//! Link distances and in-link analytics over finished crawls

use crate::common::{config, crawl_to_end, site, stalled, url};
use sitewalk::analysis::{links_to_domain, CancelToken, DistanceEngine, DistanceMap, LinkIndex};
use sitewalk::config::DistanceConfig;
use sitewalk::crawler::SiteCrawler;
use sitewalk::output::CrawlStatistics;
use sitewalk::{SitewalkError, UriDistance};
use std::collections::BTreeSet;
use std::sync::Arc;

/// `/` links to `/b` and `/c`, `/b` links to `/d`; `/e` is seeded but unreachable
async fn bfs_site() -> Arc<SiteCrawler> {
    let factory = site(&[
        ("http://a.test/", &["/b", "/c"]),
        ("http://a.test/b", &["/d"]),
        ("http://a.test/c", &[]),
        ("http://a.test/d", &[]),
        ("http://a.test/e", &[]),
        ("http://a.test/f", &["/"]),
    ]);
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), factory).unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawler.add_seed(url("http://a.test/e")).unwrap();
    crawl_to_end(&crawler).await;
    Arc::new(crawler)
}

fn engine(crawler: &Arc<SiteCrawler>) -> DistanceEngine {
    DistanceEngine::new(Arc::clone(crawler), &DistanceConfig { workers: 2 })
}

#[tokio::test]
async fn test_bfs_distance_example() {
    let crawler = bfs_site().await;
    let engine = engine(&crawler);

    let map = engine
        .compute_distances(&url("http://a.test/"), &CancelToken::new())
        .await
        .unwrap();

    let expected: DistanceMap = [
        ("http://a.test/", 0),
        ("http://a.test/b", 1),
        ("http://a.test/c", 1),
        ("http://a.test/d", 2),
    ]
    .into_iter()
    .map(|(u, d)| (url(u), d))
    .collect();
    assert_eq!(map, expected);

    // The map is cached from now on
    assert_eq!(engine.distance_map_from(&url("http://a.test/")).unwrap(), map);
}

#[tokio::test]
async fn test_max_distance_example() {
    let crawler = bfs_site().await;
    let engine = engine(&crawler);

    let max = engine
        .compute_max_distance(&CancelToken::new())
        .await
        .unwrap();

    assert_eq!(
        max,
        Some(UriDistance {
            from: url("http://a.test/"),
            to: url("http://a.test/d"),
            distance: 2,
        })
    );
    // Every page now has a cached map
    for page in ["http://a.test/b", "http://a.test/c", "http://a.test/d", "http://a.test/e"] {
        assert!(engine.distance_map_from(&url(page)).is_ok(), "{}", page);
    }
}

#[tokio::test]
async fn test_distance_errors() {
    let crawler = bfs_site().await;
    let engine = engine(&crawler);

    assert!(matches!(
        engine.distance_map_from(&url("http://a.test/b")),
        Err(SitewalkError::NotComputed(_))
    ));
    assert!(matches!(
        engine
            .compute_distances(&url("http://a.test/never"), &CancelToken::new())
            .await,
        Err(SitewalkError::UnknownUri(_))
    ));
    assert!(matches!(
        engine
            .compute_distances(&url("http://ext.test/"), &CancelToken::new())
            .await,
        Err(SitewalkError::UnknownUri(_))
    ));
}

#[tokio::test]
async fn test_cancelled_computations() {
    let crawler = bfs_site().await;
    let engine = engine(&crawler);
    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(matches!(
        engine.compute_distances(&url("http://a.test/"), &cancel).await,
        Err(SitewalkError::Cancelled)
    ));
    assert!(matches!(
        engine.compute_max_distance(&cancel).await,
        Err(SitewalkError::Cancelled)
    ));
    assert!(matches!(
        engine.distance_map_from(&url("http://a.test/")),
        Err(SitewalkError::NotComputed(_))
    ));
}

#[tokio::test]
async fn test_distances_refused_while_running() {
    let crawler = Arc::new(
        SiteCrawler::new(url("http://a.test/"), None, config(2), stalled()).unwrap(),
    );
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawler.start().unwrap();
    let engine = engine(&crawler);

    assert!(matches!(
        engine
            .compute_distances(&url("http://a.test/"), &CancelToken::new())
            .await,
        Err(SitewalkError::CrawlRunning)
    ));
    assert!(matches!(
        engine.compute_max_distance(&CancelToken::new()).await,
        Err(SitewalkError::CrawlRunning)
    ));

    crawler.suspend().await.unwrap();
}

#[tokio::test]
async fn test_restart_invalidates_cached_distances() {
    let crawler = bfs_site().await;
    let engine = engine(&crawler);
    engine
        .compute_distances(&url("http://a.test/"), &CancelToken::new())
        .await
        .unwrap();

    crawler.add_seed(url("http://a.test/f")).unwrap();
    crawl_to_end(&crawler).await;

    assert!(matches!(
        engine.distance_map_from(&url("http://a.test/")),
        Err(SitewalkError::NotComputed(_))
    ));
    let map = engine
        .compute_distances(&url("http://a.test/f"), &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(map[&url("http://a.test/d")], 3);
}

#[tokio::test]
async fn test_link_index() {
    let factory = site(&[
        ("http://a.test/", &["/b", "/c", "http://ext.test/"]),
        ("http://a.test/b", &["/c", "/", "/c"]),
        ("http://a.test/c", &["/c", "/missing"]),
    ]);
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), factory).unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawl_to_end(&crawler).await;

    let index = LinkIndex::build(&crawler);
    assert_eq!(
        index.pointing_to(&url("http://a.test/c")),
        vec![url("http://a.test/"), url("http://a.test/b"), url("http://a.test/c")]
    );
    assert_eq!(index.count(&url("http://ext.test/")), 1);
    assert_eq!(index.count(&url("http://a.test/nowhere")), 0);
    assert_eq!(index.most_pointed(), Some((url("http://a.test/c"), 3)));

    let stats = CrawlStatistics::collect(&crawler).unwrap();
    assert_eq!(stats.discovered, 4);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.link_pages, 3);
    assert_eq!(stats.checked_pages, 1);
    assert_eq!(stats.external_uris, 1);
    assert_eq!(stats.errors_by_kind.get("status"), Some(&1));
    assert_eq!(stats.most_pointed, Some((url("http://a.test/c"), 3)));
}

#[tokio::test]
async fn test_links_to_domain() {
    let factory = site(&[
        (
            "http://a.test/",
            &["http://ext.test/", "http://ext.test/docs/x", "http://other.test/"],
        ),
        ("http://a.test/b", &["http://ext.test/docs/y"]),
    ]);
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), factory).unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawler.add_seed(url("http://a.test/b")).unwrap();
    crawl_to_end(&crawler).await;

    let links = links_to_domain(&crawler, &url("http://ext.test/docs/")).unwrap();
    let expected: BTreeSet<_> = [url("http://ext.test/docs/x"), url("http://ext.test/docs/y")]
        .into_iter()
        .collect();
    assert_eq!(links, expected);

    assert!(matches!(
        links_to_domain(&crawler, &url("ftp://ext.test/")),
        Err(SitewalkError::InvalidDomain(_))
    ));
}
