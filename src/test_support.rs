//! In-memory doubles for the [`Store`] and [`FeedFetcher`] seams.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::source::{Document, DocumentItem, FeedFetcher, FetchError};
use crate::store::{Feed, NewPost, Post, Store, StoreError};

pub fn feed(name: &str) -> Feed {
    let now = Utc::now();
    Feed {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        name: name.to_string(),
        url: format!("https://{name}.example/rss"),
        user_id: Uuid::new_v4(),
        last_fetched_at: None,
    }
}

pub fn item(link: &str) -> DocumentItem {
    DocumentItem {
        title: format!("Post at {link}"),
        link: link.to_string(),
        description: format!("About {link}"),
        pub_date: "Mon, 01 Jan 2024 00:00:00 +0000".to_string(),
        guid: link.to_string(),
    }
}

pub fn document(links: &[&str]) -> Document {
    Document {
        title: "Test Feed".to_string(),
        items: links.iter().map(|l| item(l)).collect(),
        ..Document::default()
    }
}

/// A [`Store`] kept in a `Mutex`, enforcing the same URL uniqueness as the
/// real schema.
#[derive(Default)]
pub struct MemoryStore {
    feeds: Mutex<Vec<Feed>>,
    posts: Mutex<Vec<Post>>,
    fail_listing: AtomicBool,
    failing_urls: Mutex<HashSet<String>>,
    mark_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn with_feeds(feeds: Vec<Feed>) -> Self {
        Self {
            feeds: Mutex::new(feeds),
            ..Self::default()
        }
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    /// Make inserts of `url` fail with a non-duplicate error.
    pub fn fail_insert_of(&self, url: &str) {
        self.failing_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn mark_calls(&self) -> usize {
        self.mark_calls.load(Ordering::SeqCst)
    }

    pub fn feed(&self, id: Uuid) -> Option<Feed> {
        self.feeds.lock().unwrap().iter().find(|f| f.id == id).cloned()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    pub fn post_urls_for(&self, feed_id: Uuid) -> Vec<String> {
        let mut urls: Vec<String> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.feed_id == feed_id)
            .map(|p| p.url.clone())
            .collect();
        urls.sort();
        urls
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn next_feeds_to_fetch(&self, limit: usize) -> Result<Vec<Feed>, StoreError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut feeds = self.feeds.lock().unwrap().clone();
        // `None < Some(_)`, so never-polled feeds sort first.
        feeds.sort_by_key(|f| f.last_fetched_at);
        feeds.truncate(limit);
        Ok(feeds)
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, StoreError> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        let mut feeds = self.feeds.lock().unwrap();
        let feed = feeds
            .iter_mut()
            .find(|f| f.id == feed_id)
            .ok_or(StoreError::NotFound)?;
        let now = Utc::now();
        feed.last_fetched_at = Some(now);
        feed.updated_at = now;
        Ok(feed.clone())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        if self.failing_urls.lock().unwrap().contains(&post.url) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut posts = self.posts.lock().unwrap();
        if posts.iter().any(|p| p.url == post.url) {
            return Err(StoreError::DuplicateKey(post.url));
        }
        let created = Post {
            id: post.id,
            created_at: post.created_at,
            updated_at: post.updated_at,
            title: post.title,
            url: post.url,
            description: post.description,
            published_at: post.published_at,
            feed_id: post.feed_id,
        };
        posts.push(created.clone());
        Ok(created)
    }
}

/// Serves canned documents by URL; unknown URLs answer 404.
#[derive(Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Document>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn serving(mut self, url: &str, document: Document) -> Self {
        self.documents.insert(url.to_string(), document);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(StatusCode::NOT_FOUND))
    }
}
