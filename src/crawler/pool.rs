//! Bounded pool of loader instances
//!
//! Every submission runs in its own task, which waits for a free loader,
//! performs the operation and reports a [`Completion`] on the pool's
//! completion channel. Completions therefore arrive in true finish order.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, Loader, LoaderFactory};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Semaphore};
use url::Url;

/// What a submission asks the loader to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Load the page and extract its links
    Fetch,
    /// Only check that the URI exists
    CheckOnly,
}

/// Outcome of one pool operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fetched page and its raw links
    Links(Vec<String>),
    /// A checked URI exists
    Exists,
    /// The operation failed
    Failed(FetchError),
}

/// Reported on the completion channel when an operation finishes
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: u64,
    pub uri: Url,
    pub mode: FetchMode,
    pub outcome: FetchOutcome,
}

/// Identifies an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchHandle {
    pub id: u64,
    pub uri: Url,
    pub mode: FetchMode,
}

/// Reasons a submission is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Fetch pool has been shut down")]
    Shutdown,

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

impl From<PoolError> for FetchError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::UnsupportedScheme(scheme) => FetchError::UnsupportedScheme(scheme),
            PoolError::Shutdown => FetchError::Other(e.to_string()),
        }
    }
}

type Instances = Arc<Mutex<Vec<Box<dyn Loader>>>>;

/// Dispatches fetch and check operations over reusable loaders
pub struct FetchPool {
    factory: Arc<dyn LoaderFactory>,
    instances: Instances,
    fetch_permits: Arc<Semaphore>,
    checker: Arc<dyn Loader>,
    check_permits: Arc<Semaphore>,
    completions: mpsc::UnboundedSender<Completion>,
    shutdown_tx: watch::Sender<bool>,
    next_id: AtomicU64,
}

impl FetchPool {
    /// Creates a pool with `fetch_workers` loaders and one shared checker
    pub fn new(
        config: &CrawlerConfig,
        factory: Arc<dyn LoaderFactory>,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        let instances: Vec<Box<dyn Loader>> =
            (0..config.fetch_workers).map(|_| factory.create()).collect();
        let checker: Arc<dyn Loader> = Arc::from(factory.create());
        let (shutdown_tx, _) = watch::channel(false);

        tracing::debug!(
            "Fetch pool ready: {} fetch workers, {} check workers",
            config.fetch_workers,
            config.check_workers
        );

        Self {
            factory,
            instances: Arc::new(Mutex::new(instances)),
            fetch_permits: Arc::new(Semaphore::new(config.fetch_workers)),
            checker,
            check_permits: Arc::new(Semaphore::new(config.check_workers)),
            completions,
            shutdown_tx,
            next_id: AtomicU64::new(0),
        }
    }

    /// Submits an operation; it runs as soon as a loader is free
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, uri: Url, mode: FetchMode) -> Result<FetchHandle, PoolError> {
        if self.is_shutdown() {
            return Err(PoolError::Shutdown);
        }
        if uri.scheme() != "http" && uri.scheme() != "https" {
            return Err(PoolError::UnsupportedScheme(uri.scheme().to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = FetchHandle {
            id,
            uri: uri.clone(),
            mode,
        };

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let completions = self.completions.clone();

        match mode {
            FetchMode::Fetch => {
                let permits = Arc::clone(&self.fetch_permits);
                let instances = Arc::clone(&self.instances);
                let factory = Arc::clone(&self.factory);
                let target = uri.clone();

                tokio::spawn(async move {
                    let work = async move {
                        let Ok(_permit) = permits.acquire_owned().await else {
                            return None;
                        };
                        let loan = LoanedLoader::take(instances, factory.as_ref());
                        Some(match loan.loader().fetch(&target).await {
                            Ok(links) => FetchOutcome::Links(links),
                            Err(e) => FetchOutcome::Failed(e),
                        })
                    };
                    run_worker(id, uri, mode, work, &mut shutdown_rx, completions).await;
                });
            }
            FetchMode::CheckOnly => {
                let permits = Arc::clone(&self.check_permits);
                let checker = Arc::clone(&self.checker);
                let target = uri.clone();

                tokio::spawn(async move {
                    let work = async move {
                        let Ok(_permit) = permits.acquire_owned().await else {
                            return None;
                        };
                        Some(match checker.check(&target).await {
                            Ok(()) => FetchOutcome::Exists,
                            Err(e) => FetchOutcome::Failed(e),
                        })
                    };
                    run_worker(id, uri, mode, work, &mut shutdown_rx, completions).await;
                });
            }
        }

        Ok(handle)
    }

    /// Abandons all outstanding work; later submissions are refused
    pub fn shutdown(&self) {
        if self.shutdown_tx.send_replace(true) {
            return;
        }
        self.fetch_permits.close();
        self.check_permits.close();
        tracing::debug!("Fetch pool shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker<F>(
    id: u64,
    uri: Url,
    mode: FetchMode,
    work: F,
    shutdown_rx: &mut watch::Receiver<bool>,
    completions: mpsc::UnboundedSender<Completion>,
) where
    F: std::future::Future<Output = Option<FetchOutcome>>,
{
    tokio::select! {
        biased;
        _ = shutdown_rx.changed() => {
            tracing::trace!("Abandoned {:?} of {}", mode, uri);
        }
        outcome = work => {
            if let Some(outcome) = outcome {
                let _ = completions.send(Completion { id, uri, mode, outcome });
            }
        }
    }
}

/// A loader borrowed from the pool, returned when dropped
struct LoanedLoader {
    loader: Option<Box<dyn Loader>>,
    instances: Instances,
}

impl LoanedLoader {
    fn take(instances: Instances, factory: &dyn LoaderFactory) -> Self {
        let loader = instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .unwrap_or_else(|| factory.create());
        Self {
            loader: Some(loader),
            instances,
        }
    }

    fn loader(&self) -> &dyn Loader {
        match &self.loader {
            Some(loader) => loader.as_ref(),
            None => unreachable!("loader is only taken on drop"),
        }
    }
}

impl Drop for LoanedLoader {
    fn drop(&mut self) {
        if let Some(loader) = self.loader.take() {
            self.instances
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(loader);
        }
    }
}
