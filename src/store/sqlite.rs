use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::{Feed, FeedFollow, NewPost, Post, Store, StoreError, User};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          BLOB PRIMARY KEY,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        name        TEXT NOT NULL UNIQUE,
        api_key     TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feeds (
        id               BLOB PRIMARY KEY,
        created_at       TEXT NOT NULL,
        updated_at       TEXT NOT NULL,
        name             TEXT NOT NULL,
        url              TEXT NOT NULL UNIQUE,
        user_id          BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        last_fetched_at  TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id            BLOB PRIMARY KEY,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL,
        title         TEXT NOT NULL,
        url           TEXT NOT NULL UNIQUE,
        description   TEXT,
        published_at  TEXT,
        feed_id       BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feed_follows (
        id          BLOB PRIMARY KEY,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL,
        user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        feed_id     BLOB NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
        UNIQUE (user_id, feed_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched_at ON feeds (last_fetched_at)",
    "CREATE INDEX IF NOT EXISTS idx_posts_feed_id ON posts (feed_id)",
];

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

const FOLLOW_COLUMNS: &str = "id, created_at, updated_at, user_id, feed_id";

const POST_COLUMNS: &str =
    "id, created_at, updated_at, title, url, description, published_at, feed_id";

/// [`Store`] backed by a SQLite database through a `sqlx` pool.
///
/// Timestamps are stored as RFC 3339 text in UTC, which sorts correctly as
/// plain strings.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and apply the schema.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Database schema is up to date");
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // -- users ---------------------------------------------------------------

    /// Create a user with a freshly generated API key.
    pub async fn create_user(&self, name: &str) -> Result<User, StoreError> {
        let now = Utc::now();
        let api_key = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, created_at, updated_at, name, api_key)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at, updated_at, name, api_key
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(&api_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name, api_key FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name, api_key FROM users WHERE api_key = $1",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    // -- feeds ---------------------------------------------------------------

    /// Register a feed and follow it on behalf of its owner, atomically.
    pub async fn create_feed(
        &self,
        user_id: Uuid,
        name: &str,
        url: &str,
    ) -> Result<Feed, StoreError> {
        let now = Utc::now();
        let feed_query = format!(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {FEED_COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;

        let feed = sqlx::query_as::<_, Feed>(&feed_query)
            .bind(Uuid::new_v4())
            .bind(now)
            .bind(now)
            .bind(name)
            .bind(url)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(feed = %feed.name, url = %feed.url, "Created feed");

        Ok(feed)
    }

    /// Every feed, in polling order.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        let query = format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC"
        );
        let feeds = sqlx::query_as::<_, Feed>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(feeds)
    }

    /// Record a poll at `at`.  Never moves `last_fetched_at` backwards.
    pub async fn mark_feed_fetched_at(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Feed, StoreError> {
        let query = format!(
            r#"
            UPDATE feeds SET
                last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < $1 THEN $1
                    ELSE last_fetched_at
                END,
                updated_at = $1
            WHERE id = $2
            RETURNING {FEED_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Feed>(&query)
            .bind(at)
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    // -- follows -------------------------------------------------------------

    /// Follow `feed_id`.  Following the same feed twice is a
    /// [`StoreError::DuplicateKey`]; an unknown user or feed is a
    /// [`StoreError::Database`] foreign-key failure.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, StoreError> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FOLLOW_COLUMNS}
            "#
        );

        let follow = sqlx::query_as::<_, FeedFollow>(&query)
            .bind(Uuid::new_v4())
            .bind(now)
            .bind(now)
            .bind(user_id)
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(follow)
    }

    /// Remove a follow, but only if it belongs to `user_id`.
    ///
    /// Returns whether a row was deleted.
    pub async fn delete_feed_follow(
        &self,
        follow_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE id = $1 AND user_id = $2")
            .bind(follow_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn feed_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FeedFollow>, StoreError> {
        let query = format!(
            "SELECT {FOLLOW_COLUMNS} FROM feed_follows WHERE user_id = $1 ORDER BY created_at ASC"
        );
        let follows = sqlx::query_as::<_, FeedFollow>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(follows)
    }

    // -- posts ---------------------------------------------------------------

    /// Newest posts across every feed `user_id` follows.
    pub async fn posts_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.created_at, p.updated_at, p.title, p.url,
                   p.description, p.published_at, p.feed_id
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = $1
            ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    pub async fn posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE feed_id = $1 ORDER BY url");
        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(feed_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(posts)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, StoreError> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS} FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC
            LIMIT $1
            "#
        );

        let feeds = sqlx::query_as::<_, Feed>(&query)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(feeds)
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, StoreError> {
        self.mark_feed_fetched_at(feed_id, Utc::now()).await
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let query = format!(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {POST_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Post>(&query)
            .bind(post.id)
            .bind(post.created_at)
            .bind(post.updated_at)
            .bind(post.title)
            .bind(post.url)
            .bind(post.description)
            .bind(post.published_at)
            .bind(post.feed_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
