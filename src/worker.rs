//! The per-feed unit of work: mark fetched, fetch, ingest.
//!
//! A worker never returns an error.  Each failure is logged and reported as
//! a [`WorkerOutcome`], so one bad feed cannot disturb the other workers of
//! the same cycle.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ingest::{ingest, IngestStats};
use crate::source::FeedFetcher;
use crate::store::{Feed, Store};

/// How far a worker got with its feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The poll could not be recorded; nothing was fetched.
    MarkFailed,
    /// Shutdown was requested before fetching.
    Cancelled,
    /// The feed was marked but could not be retrieved or decoded.
    FetchFailed,
    Ingested(IngestStats),
}

/// Polls one feed at a time on behalf of the scheduler.
///
/// Holds shared handles only, so the scheduler builds one per feed and
/// moves it into the spawned task.
pub struct FeedWorker {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    shutdown: CancellationToken,
}

impl FeedWorker {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn FeedFetcher>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            fetcher,
            shutdown,
        }
    }

    /// Mark `feed` as polled, fetch it, then ingest its items.
    pub async fn run(&self, feed: Feed) -> WorkerOutcome {
        // Marked before fetching: a feed that keeps failing still moves to
        // the back of the queue.
        if let Err(err) = self.store.mark_feed_fetched(feed.id).await {
            error!(feed = %feed.name, error = %err, "Couldn't mark feed fetched");
            return WorkerOutcome::MarkFailed;
        }

        if self.shutdown.is_cancelled() {
            debug!(feed = %feed.name, "Shutdown requested, not fetching");
            return WorkerOutcome::Cancelled;
        }

        let document = match self.fetcher.fetch(&feed.url).await {
            Ok(document) => document,
            Err(err) => {
                warn!(feed = %feed.name, url = %feed.url, error = %err, "Couldn't collect feed");
                return WorkerOutcome::FetchFailed;
            }
        };

        let stats = ingest(self.store.as_ref(), feed.id, &document, &self.shutdown).await;
        info!(
            feed = %feed.name,
            found = document.items.len(),
            inserted = stats.inserted,
            duplicates = stats.duplicates,
            failed = stats.failed,
            "Feed collected"
        );

        WorkerOutcome::Ingested(stats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
