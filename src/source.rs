//! Remote feed retrieval.
//!
//! This module defines the [`FeedFetcher`] trait and the parsed [`Document`]
//! type.  Concrete fetchers live in sub-modules (currently only [`rss`]).
//!
//! ## For contributors — adding a new wire format
//!
//! 1. Create a new file in `src/source/` (e.g. `atom.rs`).
//! 2. Define a fetcher struct and implement [`FeedFetcher`] for it, decoding
//!    the body into a [`Document`].
//! 3. Add `mod atom;` below and re-export your struct.
//!
//! The scheduler, workers and ingester only ever see [`Document`], so nothing
//! else has to change.

mod document;
mod rss;

pub use self::document::{Document, DocumentItem, PUB_DATE_FORMAT};
pub use self::rss::{RssFetcher, FETCH_TIMEOUT};

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Why a feed could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, timeout, or an interrupted body.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("bad status: {0}")]
    Status(StatusCode),

    /// The body is not a feed document we can parse.
    #[error("failed to decode feed: {0}")]
    Decode(#[from] ::rss::Error),
}

/// Anything that can turn a feed URL into a parsed [`Document`].
///
/// Workers call [`fetch()`](FeedFetcher::fetch) concurrently from several
/// tasks, so implementations must be [`Send`] + [`Sync`].
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve and decode the document at `url`.
    async fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}
