//! Crawl scheduler
//!
//! The scheduler owns the [`Frontier`] and a control loop that:
//! - Submits every queued URI to a [`FetchPool`]
//! - Waits for a completion, new work, or a stop request
//! - Classifies each completion into a [`CrawlResult`]
//! - Resolves and queues the links of every fetched page
//!
//! Results are handed to an optional [`ResultSink`] and then queued for
//! [`CrawlScheduler::poll`].

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchError, LoaderFactory};
use crate::crawler::pool::{Completion, FetchMode, FetchOutcome, FetchPool};
use crate::crawler::result::{CrawlResult, Poll, ResultSink};
use crate::state::{Frontier, PageState};
use crate::url::{parse_absolute, resolve_link, RawUri};
use crate::{Result, SitewalkError};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use url::Url;

/// Decides whether a URI is a link page, i.e. fetched and its links followed
///
/// URIs that are not link pages are only checked for existence.
pub type PageLinkPredicate = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// Drives downloads of the frontier over a fetch pool
///
/// Cloning a scheduler yields another handle to the same crawl.
#[derive(Clone)]
pub struct CrawlScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    config: CrawlerConfig,
    factory: Arc<dyn LoaderFactory>,
    is_link_page: PageLinkPredicate,
    sink: Option<Arc<dyn ResultSink>>,
    frontier: Mutex<Frontier>,
    results: Mutex<VecDeque<CrawlResult>>,
    work: Notify,
    cancelled: AtomicBool,
    control: Mutex<LoopState>,
    /// Signalled when a stopping loop has been joined
    stopped: Notify,
}

/// Lifecycle of the control loop
///
/// A loop stays `Stopping` until `suspend` has joined it, so no second loop
/// can be started on the same frontier in the meantime.
#[derive(Default)]
enum LoopState {
    #[default]
    Idle,
    Running {
        stop: oneshot::Sender<()>,
        task: JoinHandle<()>,
    },
    Stopping,
}

/// Builder for [`CrawlScheduler`]
pub struct CrawlSchedulerBuilder {
    config: CrawlerConfig,
    factory: Arc<dyn LoaderFactory>,
    is_link_page: PageLinkPredicate,
    sink: Option<Arc<dyn ResultSink>>,
    frontier: Frontier,
}

impl CrawlSchedulerBuilder {
    /// Sets the link-page predicate (default: every URI is a link page)
    pub fn page_link(mut self, predicate: PageLinkPredicate) -> Self {
        self.is_link_page = predicate;
        self
    }

    /// Starts from a restored frontier
    pub fn frontier(mut self, frontier: Frontier) -> Self {
        self.frontier = frontier;
        self
    }

    /// Sets the sink every result is recorded into
    pub fn sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> CrawlScheduler {
        CrawlScheduler {
            inner: Arc::new(Inner {
                config: self.config,
                factory: self.factory,
                is_link_page: self.is_link_page,
                sink: self.sink,
                frontier: Mutex::new(self.frontier),
                results: Mutex::new(VecDeque::new()),
                work: Notify::new(),
                cancelled: AtomicBool::new(false),
                control: Mutex::new(LoopState::Idle),
                stopped: Notify::new(),
            }),
        }
    }
}

impl CrawlScheduler {
    pub fn builder(config: CrawlerConfig, factory: Arc<dyn LoaderFactory>) -> CrawlSchedulerBuilder {
        CrawlSchedulerBuilder {
            config,
            factory,
            is_link_page: Arc::new(|_: &Url| true),
            sink: None,
            frontier: Frontier::new(),
        }
    }

    /// Queues a URI unless it is already pending, discovered or failed
    ///
    /// Returns true if the URI was newly queued.
    pub fn add(&self, uri: Url) -> Result<bool> {
        self.ensure_active()?;
        let added = lock(&self.inner.frontier).add(uri);
        if added {
            self.inner.work.notify_one();
        }
        Ok(added)
    }

    /// Parses and queues a raw URI string
    ///
    /// Only absolute URIs are accepted; anything else is logged and ignored.
    pub fn add_raw(&self, raw: &str) -> Result<bool> {
        self.ensure_active()?;
        match parse_absolute(raw) {
            Ok(RawUri::Absolute(uri)) => self.add(uri),
            Ok(RawUri::Relative(_)) => {
                tracing::warn!("Ignoring relative URI: {}", raw);
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Ignoring unparseable URI {}: {}", raw, e);
                Ok(false)
            }
        }
    }

    /// Starts the control loop in the background
    ///
    /// Does nothing if the crawl is already running or nothing is pending.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// * `Terminated` - the scheduler has been cancelled
    /// * `CrawlStopping` - a suspend has not finished yet
    pub fn start(&self) -> Result<()> {
        self.ensure_active()?;
        let mut control = lock(&self.inner.control);
        match *control {
            LoopState::Running { .. } => return Ok(()),
            LoopState::Stopping => return Err(SitewalkError::CrawlStopping),
            LoopState::Idle => {}
        }
        if lock(&self.inner.frontier).pending().is_empty() {
            tracing::debug!("Nothing to load, not starting");
            return Ok(());
        }

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let pool = FetchPool::new(
            &self.inner.config,
            Arc::clone(&self.inner.factory),
            completions_tx,
        );
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_loop(Arc::clone(&self.inner), pool, completions_rx, stop_rx));
        *control = LoopState::Running { stop, task };

        tracing::info!("Crawl started");
        Ok(())
    }

    /// Stops the control loop and returns once it has exited
    ///
    /// In-flight URIs go back to the pending queue, so a later
    /// [`start`](Self::start) picks them up again. A concurrent call waits
    /// for the same loop to exit.
    pub async fn suspend(&self) -> Result<()> {
        self.ensure_active()?;
        let (stop, task) = loop {
            let stopped = self.inner.stopped.notified();
            {
                let mut control = lock(&self.inner.control);
                match std::mem::replace(&mut *control, LoopState::Stopping) {
                    LoopState::Running { stop, task } => break (stop, task),
                    LoopState::Idle => {
                        *control = LoopState::Idle;
                        return Ok(());
                    }
                    LoopState::Stopping => {}
                }
            }
            stopped.await;
        };

        let _ = stop.send(());
        if let Err(e) = task.await {
            tracing::warn!("Crawl loop ended abnormally: {}", e);
        }

        {
            let mut control = lock(&self.inner.control);
            if matches!(*control, LoopState::Stopping) {
                *control = LoopState::Idle;
            }
        }
        self.inner.stopped.notify_waiters();

        tracing::info!("Crawl suspended");
        Ok(())
    }

    /// Stops the crawl for good
    ///
    /// Outstanding work is abandoned and every later operation fails with
    /// [`SitewalkError::Terminated`].
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let previous = std::mem::take(&mut *lock(&self.inner.control));
        // Dropping the loop drops its pool, which shuts the workers down
        if let LoopState::Running { stop, task } = previous {
            let _ = stop.send(());
            task.abort();
        }
        self.inner.stopped.notify_waiters();
        tracing::info!("Crawl cancelled");
    }

    /// Returns the next result without waiting
    pub fn poll(&self) -> Result<Poll> {
        self.ensure_active()?;
        if !self.is_running() {
            return Ok(Poll::NotRunning);
        }
        Ok(match lock(&self.inner.results).pop_front() {
            Some(result) => Poll::Item(result),
            None => Poll::Pending,
        })
    }

    /// Snapshot of the successfully loaded URIs
    pub fn loaded(&self) -> Result<HashSet<Url>> {
        self.ensure_active()?;
        Ok(lock(&self.inner.frontier).discovered().clone())
    }

    /// Snapshot of the URIs still to load, including those in flight
    pub fn to_load(&self) -> Result<HashSet<Url>> {
        self.ensure_active()?;
        Ok(lock(&self.inner.frontier).pending().clone())
    }

    /// Snapshot of the URIs whose loading failed
    pub fn errors(&self) -> Result<HashSet<Url>> {
        self.ensure_active()?;
        Ok(lock(&self.inner.frontier).failed().clone())
    }

    /// Pending URIs in a stable order, for checkpoints
    pub(crate) fn pending_snapshot(&self) -> Vec<Url> {
        let mut pending: Vec<Url> = lock(&self.inner.frontier).pending().iter().cloned().collect();
        pending.sort();
        pending
    }

    /// Where a URI sits in the frontier
    pub fn state_of(&self, uri: &Url) -> Option<PageState> {
        lock(&self.inner.frontier).state_of(uri)
    }

    /// True from `start` until the control loop has been joined
    pub fn is_running(&self) -> bool {
        !matches!(*lock(&self.inner.control), LoopState::Idle)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SitewalkError::Terminated)
        } else {
            Ok(())
        }
    }
}

async fn run_loop(
    inner: Arc<Inner>,
    pool: FetchPool,
    mut completions: mpsc::UnboundedReceiver<Completion>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        inner.dispatch(&pool);

        tokio::select! {
            biased;
            _ = &mut stop => break,
            Some(completion) = completions.recv() => inner.complete(completion),
            _ = inner.work.notified() => tracing::trace!("Woken by new work"),
        }
    }

    let requeued = lock(&inner.frontier).requeue_in_flight();
    pool.shutdown();
    tracing::debug!("Crawl loop stopped, {} in-flight URIs requeued", requeued);
}

impl Inner {
    /// Submits every queued URI to the pool
    fn dispatch(&self, pool: &FetchPool) {
        loop {
            let Some(uri) = lock(&self.frontier).next() else {
                break;
            };
            let is_link_page = (self.is_link_page)(&uri);
            let mode = if is_link_page {
                FetchMode::Fetch
            } else {
                FetchMode::CheckOnly
            };

            match pool.submit(uri.clone(), mode) {
                Ok(handle) => tracing::trace!("Submitted {:?} #{} for {}", mode, handle.id, uri),
                Err(e) => {
                    tracing::debug!("Submission of {} refused: {}", uri, e);
                    let result = CrawlResult::failure(uri, is_link_page, FetchError::from(e));
                    self.finish(result, PageState::Failed);
                }
            }
        }
    }

    /// Classifies a completion and records its result
    fn complete(&self, completion: Completion) {
        let Completion {
            uri, mode, outcome, ..
        } = completion;

        if lock(&self.frontier).state_of(&uri) != Some(PageState::InFlight) {
            tracing::debug!("Ignoring stale completion for {}", uri);
            return;
        }

        match (mode, outcome) {
            (_, FetchOutcome::Failed(error)) => {
                let result = CrawlResult::failure(uri.clone(), (self.is_link_page)(&uri), error);
                self.finish(result, PageState::Failed);
            }
            (FetchMode::Fetch, FetchOutcome::Links(raw_links)) => {
                let mut links = Vec::new();
                let mut malformed = Vec::new();
                for raw in raw_links {
                    match resolve_link(&uri, &raw) {
                        Ok(link) => links.push(link),
                        Err(e) => {
                            tracing::debug!("Malformed link on {}: {}", uri, e);
                            malformed.push(raw);
                        }
                    }
                }

                // Links are queued before the page is recorded so a checkpoint
                // never holds the page without its links
                {
                    let mut frontier = lock(&self.frontier);
                    for link in &links {
                        frontier.add(link.clone());
                    }
                }

                self.finish(CrawlResult::page(uri, links, malformed), PageState::Discovered);
            }
            (_, _) => self.finish(CrawlResult::checked(uri), PageState::Discovered),
        }
    }

    /// Records a result, makes it pollable, then moves its URI out of pending
    fn finish(&self, result: CrawlResult, state: PageState) {
        tracing::debug!(
            "{} {} ({} links)",
            state,
            result.uri,
            result.links().len()
        );

        if let Some(sink) = &self.sink {
            sink.record(&result);
        }

        let uri = result.uri.clone();
        lock(&self.results).push_back(result);

        let mut frontier = lock(&self.frontier);
        match state {
            PageState::Failed => frontier.mark_failed(&uri),
            _ => frontier.mark_discovered(&uri),
        };
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
