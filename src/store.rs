//! Persistence capability consumed by the ingestion core.
//!
//! The scheduler, workers and ingester depend only on the [`Store`] trait.
//! [`SqliteStore`] is the implementation the binary wires in.
//!
//! ## Duplicate posts
//!
//! `posts.url` carries a unique constraint, and that constraint is the only
//! thing preventing the same post from being stored twice, whether the
//! racing inserts come from one cycle, overlapping cycles, or separate
//! processes.  Implementations must report a violation as
//! [`StoreError::DuplicateKey`] so the ingester can treat it as benign.

mod models;
mod sqlite;

pub use self::models::{Feed, FeedFollow, NewPost, Post, User};
pub use self::sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::DuplicateKey(db_err.message().to_string());
            }
        }

        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Database(other),
        }
    }
}

/// What the ingestion core needs from persistence.
#[async_trait]
pub trait Store: Send + Sync {
    /// Up to `limit` feeds, never-polled ones first, then least recently
    /// polled first.
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, StoreError>;

    /// Set the feed's `last_fetched_at` and `updated_at` to now.
    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, StoreError>;

    /// Insert a post.  Fails with [`StoreError::DuplicateKey`] when a post
    /// with the same URL already exists.
    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;
}
