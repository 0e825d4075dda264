//! Turning a fetched [`Document`] into stored posts.
//!
//! Every item becomes one insert attempt, independent of the others.  A
//! duplicate URL is the normal outcome when a feed is polled again with
//! overlapping content, so it is counted and logged at info level rather
//! than treated as a failure.

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::source::{Document, DocumentItem};
use crate::store::{NewPost, Store, StoreError};

/// Per-document tally, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Items left untouched because shutdown was requested.
    pub skipped: usize,
}

/// Insert a post for each item of `document` under `feed_id`.
///
/// Never stops early on an error; only `shutdown` cuts the loop short.
pub async fn ingest(
    store: &dyn Store,
    feed_id: Uuid,
    document: &Document,
    shutdown: &CancellationToken,
) -> IngestStats {
    let mut stats = IngestStats::default();

    for (index, item) in document.items.iter().enumerate() {
        if shutdown.is_cancelled() {
            stats.skipped = document.items.len() - index;
            info!(skipped = stats.skipped, "Shutdown requested, leaving remaining items");
            break;
        }

        match store.create_post(new_post(feed_id, item)).await {
            Ok(_) => stats.inserted += 1,
            Err(StoreError::DuplicateKey(_)) => {
                info!(
                    title = %item.title,
                    url = %item.link,
                    "Post already exists, skipping"
                );
                stats.duplicates += 1;
            }
            Err(err) => {
                warn!(title = %item.title, url = %item.link, error = %err, "Failed to insert post");
                stats.failed += 1;
            }
        }
    }

    stats
}

fn new_post(feed_id: Uuid, item: &DocumentItem) -> NewPost {
    let now = Utc::now();
    NewPost {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: item.title.clone(),
        url: item.link.clone(),
        description: Some(item.description.clone()),
        published_at: item.published_at(),
        feed_id,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
