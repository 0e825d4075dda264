//! The parsed form of a remote feed.
//!
//! `Document` mirrors the shape of an RSS channel: a few channel-level fields
//! and a list of items.  Every field is a raw string exactly as the feed sent
//! it; elements the feed left out decode as empty strings.  Interpretation
//! (date parsing, choosing the de-duplication key) happens at ingestion time.

use chrono::{DateTime, Utc};

/// The one publish-date layout we accept: RFC 1123 with a numeric zone,
/// e.g. `Mon, 02 Jan 2006 15:04:05 -0700`, minus the leading weekday.
///
/// The weekday name is informational only.  Feeds often get it wrong, so it
/// is stripped before parsing rather than checked against the date.
pub const PUB_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S %z";

/// A decoded feed document.  Lives for a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<DocumentItem>,
}

/// A single `<item>` from a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentItem {
    pub title: String,
    /// Link to the full content.  Becomes the post URL, which is the
    /// de-duplication key.
    pub link: String,
    pub description: String,
    /// Raw `<pubDate>` text.
    pub pub_date: String,
    /// Raw `<guid>` text.  Carried along but not used for de-duplication.
    pub guid: String,
}

impl DocumentItem {
    /// Parse [`pub_date`](Self::pub_date): a three-letter weekday, `", "`,
    /// then [`PUB_DATE_FORMAT`].  The weekday must be present but is not
    /// checked against the date.
    ///
    /// Returns `None` when the date is empty or in any other layout; callers
    /// keep the item either way.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let (weekday, date) = self.pub_date.trim().split_once(", ")?;
        if weekday.len() != 3 || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        DateTime::parse_from_str(date, PUB_DATE_FORMAT)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
