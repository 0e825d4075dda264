use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Someone who owns and follows feeds.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unique display name; the CLI looks users up by it.
    pub name: String,
    /// 64 hex characters, generated when the user is created.
    pub api_key: String,
}

/// A subscribed remote feed.
///
/// `last_fetched_at` stays `None` until the first poll and only moves
/// forward afterwards.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Bumped whenever the feed is polled.
    pub updated_at: DateTime<Utc>,
    /// Human-readable label used in logs.
    pub name: String,
    /// Where the feed document is fetched from.  Unique.
    pub url: String,
    /// The user who registered the feed.
    pub user_id: Uuid,
    /// When the feed was last polled, successful or not.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A user's subscription to a feed.  At most one per `(user_id, feed_id)`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct FeedFollow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub feed_id: Uuid,
}

/// One stored feed item.  Written once by the ingester, never updated.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    /// Link to the full content.  Unique across all posts, which is what
    /// keeps re-polled items from being stored twice.
    pub url: String,
    /// Always `Some` for ingested posts, possibly empty.
    pub description: Option<String>,
    /// `None` when the feed's date was missing or unparseable.
    pub published_at: Option<DateTime<Utc>>,
    /// The feed the post was collected from.
    pub feed_id: Uuid,
}

/// Insert parameters for [`Store::create_post`](super::Store::create_post).
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: Uuid,
}
