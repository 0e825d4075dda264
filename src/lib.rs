//! feed-aggregator: polls RSS feeds on a timer and stores their posts.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────────┐  batch   ┌──────────────┐  fetch()  ┌──────────────┐
//! │ scheduler.rs │ ───────► │  worker.rs   │ ────────► │  source/     │
//! │   (ticker)   │ (JoinSet)│ (one / feed) │           │ (reqwest+rss)│
//! └──────────────┘          └──────────────┘           └──────────────┘
//!        │                         │ ingest()
//!        │ next_feeds_to_fetch()   ▼
//!        │                  ┌──────────────┐
//!        └────────────────► │   store/     │  unique(posts.url)
//!                           │  (sqlx)      │
//!                           └──────────────┘
//! ```
//!
//! * **`source/`** — the [`FeedFetcher`](source::FeedFetcher) trait, the
//!   parsed [`Document`](source::Document) and the RSS implementation.
//! * **`store/`** — the [`Store`](store::Store) capability the core calls
//!   into, plus the SQLite implementation.
//! * **`ingest`** — turns one document into post inserts, swallowing
//!   duplicate-key errors.
//! * **`worker`** — mark-fetched → fetch → ingest for a single feed.
//! * **`scheduler`** — fixed-interval cycles with a start/stop lifecycle.
//! * **`config`** — environment configuration.

pub mod config;
pub mod ingest;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;
