//! End-to-end crawl behaviour

use crate::common::{config, crawl_to_end, site, stalled, url};
use sitewalk::config::{LoaderConfig, UserAgentConfig};
use sitewalk::crawler::{FetchError, HttpLoaderFactory, LoaderFactory, Poll, SiteCrawler};
use sitewalk::SitewalkError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn set(uris: &[&str]) -> HashSet<url::Url> {
    uris.iter().map(|u| url(u)).collect()
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let factory = site(&[
        (
            "http://a.test/",
            &["/b", "http://ext.test/", "http://gone.test/x", "http://[::1"],
        ),
        ("http://a.test/b", &["/", "/c#section"]),
    ]);
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(4), factory).unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();

    let results = crawl_to_end(&crawler).await;

    assert_eq!(results.len(), 5);
    assert_eq!(
        crawler.loaded().unwrap(),
        set(&["http://a.test/", "http://a.test/b", "http://ext.test/"])
    );
    assert_eq!(
        crawler.errors().unwrap(),
        set(&["http://a.test/c", "http://gone.test/x"])
    );
    assert!(crawler.to_load().unwrap().is_empty());
    assert!(!crawler.is_running());

    let root = crawler.get(&url("http://a.test/")).unwrap();
    assert!(root.is_link_page);
    assert_eq!(root.malformed_links(), ["http://[::1".to_string()]);
    assert_eq!(root.links().len(), 3);

    let external = crawler.get(&url("http://ext.test/")).unwrap();
    assert!(!external.is_link_page);
    assert!(external.links.is_none());
    assert!(external.error.is_none());

    let missing = crawler.get(&url("http://a.test/c")).unwrap();
    assert!(missing.is_link_page);
    assert_eq!(missing.error, Some(FetchError::Status(404)));

    let gone = crawler.get(&url("http://gone.test/x")).unwrap();
    assert!(!gone.is_link_page);
    assert_eq!(gone.error, Some(FetchError::Status(404)));
}

#[tokio::test]
async fn test_every_uri_in_exactly_one_set() {
    let factory = site(&[
        ("http://a.test/", &["/1", "/2", "/3", "http://ext.test/"]),
        ("http://a.test/1", &["/2", "/3"]),
        ("http://a.test/2", &["/1"]),
    ]);
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), factory).unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawl_to_end(&crawler).await;

    let loaded = crawler.loaded().unwrap();
    let errors = crawler.errors().unwrap();
    let pending = crawler.to_load().unwrap();
    assert!(loaded.is_disjoint(&errors));
    assert!(loaded.is_disjoint(&pending));
    assert!(errors.is_disjoint(&pending));

    let recorded: HashSet<_> = crawler.results().into_keys().collect();
    let known: HashSet<_> = loaded.union(&errors).cloned().collect();
    assert_eq!(recorded, known);
}

#[tokio::test]
async fn test_suspend_recovers_in_flight_work() {
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), stalled()).unwrap();
    let seeds: HashSet<_> = (0..10)
        .map(|i| url(&format!("http://a.test/p{}", i)))
        .collect();
    for seed in &seeds {
        assert!(crawler.add_seed(seed.clone()).unwrap());
    }

    crawler.start().unwrap();
    assert!(crawler.is_running());
    tokio::time::sleep(Duration::from_millis(20)).await;
    crawler.suspend().await.unwrap();

    assert!(!crawler.is_running());
    assert_eq!(crawler.to_load().unwrap(), seeds);
    assert!(crawler.loaded().unwrap().is_empty());
    assert!(crawler.errors().unwrap().is_empty());
    assert!(matches!(crawler.poll().unwrap(), Poll::NotRunning));
}

#[tokio::test]
async fn test_cancelled_crawler_is_terminated() {
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), stalled()).unwrap();
    crawler.add_seed(url("http://a.test/")).unwrap();
    crawler.start().unwrap();
    crawler.cancel();

    assert!(crawler.is_cancelled());
    assert!(!crawler.is_running());
    assert!(matches!(
        crawler.add_seed(url("http://a.test/more")),
        Err(SitewalkError::Terminated)
    ));
    assert!(matches!(crawler.start(), Err(SitewalkError::Terminated)));
    assert!(matches!(crawler.suspend().await, Err(SitewalkError::Terminated)));
    assert!(matches!(crawler.poll(), Err(SitewalkError::Terminated)));
    assert!(matches!(crawler.loaded(), Err(SitewalkError::Terminated)));
    assert!(matches!(crawler.to_load(), Err(SitewalkError::Terminated)));
    assert!(matches!(crawler.errors(), Err(SitewalkError::Terminated)));
}

#[tokio::test]
async fn test_subscribers_see_every_result() {
    let factory = site(&[
        ("http://a.test/", &["/b", "http://ext.test/"]),
        ("http://a.test/b", &[]),
    ]);
    let crawler = SiteCrawler::new(url("http://a.test/"), None, config(2), factory).unwrap();
    let mut stream = crawler.subscribe();
    crawler.add_seed(url("http://a.test/")).unwrap();

    let polled = crawl_to_end(&crawler).await;

    let mut streamed = HashSet::new();
    while let Ok(result) = stream.try_recv() {
        streamed.insert(result.uri);
    }
    let polled: HashSet<_> = polled.into_iter().map(|r| r.uri).collect();
    assert_eq!(streamed, polled);
    assert_eq!(streamed.len(), 3);
}

#[tokio::test]
async fn test_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(r#"<html><body><a href="/about">About</a><a href="/missing">Gone</a></body></html>"#),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(r#"<html><body><a href="/">Home</a></body></html>"#),
        )
        .mount(&mock_server)
        .await;

    let factory: Arc<dyn LoaderFactory> = Arc::new(
        HttpLoaderFactory::new(&UserAgentConfig::default(), &LoaderConfig::default()).unwrap(),
    );
    let domain = url(&format!("{}/", base));
    let crawler = SiteCrawler::new(domain.clone(), None, config(2), factory).unwrap();
    crawler.add_seed(domain.clone()).unwrap();

    crawl_to_end(&crawler).await;

    let about = domain.join("/about").unwrap();
    let missing = domain.join("/missing").unwrap();
    assert_eq!(
        crawler.loaded().unwrap(),
        HashSet::from([domain.clone(), about.clone()])
    );
    assert_eq!(crawler.errors().unwrap(), HashSet::from([missing.clone()]));
    assert_eq!(
        crawler.get(&missing).unwrap().error,
        Some(FetchError::Status(404))
    );
    assert_eq!(crawler.get(&about).unwrap().links(), [domain]);
}
