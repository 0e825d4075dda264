//! Background feed polling.
//!
//! The [`Scheduler`] runs fixed-interval cycles on its own tokio task.  Each
//! cycle asks the store for the next batch of due feeds, runs one
//! [`FeedWorker`] per feed concurrently, and waits for all of them before the
//! next tick.  Cycles never overlap; a tick missed during a slow cycle is
//! skipped rather than bunched up.
//!
//! The first cycle starts one full poll interval after [`Scheduler::start`],
//! not immediately.
//!
//! ## Lifecycle
//!
//! [`Scheduler::start`] returns a [`SchedulerHandle`].  Dropping the handle
//! leaves the loop running until the process exits; call
//! [`SchedulerHandle::stop`] to cancel it and drain the current cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::source::FeedFetcher;
use crate::store::Store;
use crate::worker::{FeedWorker, WorkerOutcome};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Spacing between the starts of successive cycles.
    pub poll_interval: Duration,
    /// Most feeds selected per cycle, and most workers running at once.
    pub batch_size: usize,
}

/// What happened to the feeds of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub selected: usize,
    pub ingested: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub posts_inserted: usize,
}

impl CycleSummary {
    fn record(&mut self, outcome: WorkerOutcome) {
        match outcome {
            WorkerOutcome::Ingested(stats) => {
                self.ingested += 1;
                self.posts_inserted += stats.inserted;
            }
            WorkerOutcome::MarkFailed | WorkerOutcome::FetchFailed => self.failed += 1,
            WorkerOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Owns the polling loop's dependencies until [`start`](Self::start) moves
/// it onto a task.
///
/// [`run_cycle`](Self::run_cycle) runs a single cycle in the foreground.
pub struct Scheduler {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    config: SchedulerConfig,
    /// Caps concurrently running workers at `batch_size`.
    permits: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn FeedFetcher>,
        config: SchedulerConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.batch_size.max(1)));
        Self {
            store,
            fetcher,
            config,
            permits,
        }
    }

    /// Spawn the polling loop on a background task.
    pub fn start(self) -> SchedulerHandle {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SchedulerHandle { shutdown, task }
    }

    /// The polling loop.  Returns once `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let period = self.config.poll_interval;
        info!(
            interval = ?period,
            batch_size = self.config.batch_size,
            "Collecting feeds every {:?} on {} workers",
            period,
            self.config.batch_size
        );

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Some(summary) = self.run_cycle(&shutdown).await {
                info!(
                    selected = summary.selected,
                    ingested = summary.ingested,
                    failed = summary.failed,
                    posts = summary.posts_inserted,
                    "Cycle finished"
                );
            }
        }

        info!("Scheduler stopped");
    }

    /// Run one cycle to completion.
    ///
    /// Returns `None` when the batch could not be listed and the cycle was
    /// skipped.
    pub async fn run_cycle(&self, shutdown: &CancellationToken) -> Option<CycleSummary> {
        let feeds = match self.store.next_feeds_to_fetch(self.config.batch_size).await {
            Ok(feeds) => feeds,
            Err(err) => {
                error!(error = %err, "Couldn't get next feeds to fetch");
                return None;
            }
        };
        info!("Found {} feeds to fetch", feeds.len());

        let mut summary = CycleSummary {
            selected: feeds.len(),
            ..CycleSummary::default()
        };

        let mut workers = JoinSet::new();
        for feed in feeds {
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            let worker = FeedWorker::new(self.store.clone(), self.fetcher.clone(), shutdown.clone());
            workers.spawn(async move {
                let _permit = permit;
                worker.run(feed).await
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(err) => {
                    error!(error = %err, "Feed worker panicked");
                    summary.failed += 1;
                }
            }
        }

        Some(summary)
    }
}

/// Owner-side control of a started [`Scheduler`].
pub struct SchedulerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request shutdown and wait for the loop, including any in-flight
    /// cycle, to finish.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(err) = self.task.await {
            error!(error = %err, "Scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
