//! RSS 2.0 fetcher.
//!
//! Retrieves a feed over HTTP with a bounded timeout and decodes it with the
//! [`rss`] crate.  Use it as a template when adding another wire format.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Document, DocumentItem, FeedFetcher, FetchError};

/// Upper bound on one whole retrieval (connect, headers and body).
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fetches and parses RSS 2.0 feeds.
///
/// Cheap to share: the inner [`reqwest::Client`] pools connections and is
/// reused across every feed and cycle.
#[derive(Clone)]
pub struct RssFetcher {
    client: reqwest::Client,
}

impl RssFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Network)?;
        Ok(Self { client })
    }

    /// Wrap an already-configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Convert an already-parsed [`rss::Channel`] into a [`Document`].
    ///
    /// This is a pure function (no I/O) so that tests can exercise the
    /// mapping without hitting the network.
    pub fn parse_channel(channel: &rss::Channel) -> Document {
        let items = channel
            .items()
            .iter()
            .map(|item| DocumentItem {
                title: item.title().unwrap_or_default().to_string(),
                link: item.link().unwrap_or_default().to_string(),
                description: item.description().unwrap_or_default().to_string(),
                pub_date: item.pub_date().unwrap_or_default().to_string(),
                guid: item
                    .guid()
                    .map(|g| g.value().to_string())
                    .unwrap_or_default(),
            })
            .collect();

        Document {
            title: channel.title().to_string(),
            link: channel.link().to_string(),
            description: channel.description().to_string(),
            items,
        }
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await.map_err(FetchError::Network)?;
        debug!(url, bytes = body.len(), "Fetched feed body");

        let channel = rss::Channel::read_from(&body[..])?;
        Ok(Self::parse_channel(&channel))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <description>A feed for tests</description>
    <item>
      <title>First Post</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <description>First description</description>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/rss+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}/feed.xml")
    }

    fn fetcher(timeout: Duration) -> RssFetcher {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .unwrap();
        RssFetcher::with_client(client)
    }

    #[test]
    fn parse_channel_extracts_items() {
        let channel = rss::Channel::read_from(SAMPLE.as_bytes()).unwrap();
        let doc = RssFetcher::parse_channel(&channel);

        assert_eq!(doc.title, "Test Feed");
        assert_eq!(doc.items.len(), 2);

        assert_eq!(doc.items[0].title, "First Post");
        assert_eq!(doc.items[0].link, "https://example.com/1");
        assert_eq!(doc.items[0].guid, "guid-1");
        assert_eq!(doc.items[0].description, "First description");
        assert!(doc.items[0].published_at().is_some());
    }

    #[test]
    fn missing_elements_decode_as_empty() {
        let channel = rss::Channel::read_from(SAMPLE.as_bytes()).unwrap();
        let doc = RssFetcher::parse_channel(&channel);

        let second = &doc.items[1];
        assert_eq!(second.guid, "");
        assert_eq!(second.description, "");
        assert_eq!(second.pub_date, "");
    }

    #[test]
    fn empty_channel_has_no_items() {
        let xml = r#"<rss version="2.0"><channel><title>t</title></channel></rss>"#;
        let channel = rss::Channel::read_from(xml.as_bytes()).unwrap();
        assert!(RssFetcher::parse_channel(&channel).items.is_empty());
    }

    #[tokio::test]
    async fn fetch_decodes_successful_response() {
        let url = serve_once("200 OK", SAMPLE).await;
        let doc = fetcher(FETCH_TIMEOUT).fetch(&url).await.unwrap();
        assert_eq!(doc.items.len(), 2);
    }

    #[tokio::test]
    async fn non_success_status_is_a_status_error() {
        let url = serve_once("404 Not Found", "gone").await;
        let err = fetcher(FETCH_TIMEOUT).fetch(&url).await.unwrap_err();
        assert!(
            matches!(err, FetchError::Status(s) if s == reqwest::StatusCode::NOT_FOUND),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn non_feed_body_is_a_decode_error() {
        let url = serve_once("200 OK", "this is not xml at all").await;
        let err = fetcher(FETCH_TIMEOUT).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher(FETCH_TIMEOUT)
            .fetch(&format!("http://{addr}/feed.xml"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn silent_server_times_out_as_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let err = fetcher(Duration::from_millis(200))
            .fetch(&format!("http://{addr}/feed.xml"))
            .await
            .unwrap_err();
        match err {
            FetchError::Network(e) => assert!(e.is_timeout(), "expected timeout, got {e:?}"),
            other => panic!("expected network error, got {other:?}"),
        }
    }
}
