use std::time::Duration;

use async_trait::async_trait;
use bon::bon;
use chrono::{DateTime, Utc};
use reqwest::Client;
use roxmltree::{Document, Node, ParsingOptions};
use tracing::{error, info};

use crate::error::FeedError;
use crate::models::types::{FeedBatch, FeedEntry, RejectedEntry};
use crate::traits::feed_source::FeedSource;

/// Feed crawler: скачивает RSS/Atom и превращает записи в FeedEntry
pub struct FeedCrawler {
    client: Client,
    url: String,
}

#[bon]
impl FeedCrawler {
    #[builder]
    pub fn new(url: String, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl FeedSource for FeedCrawler {
    async fn fetch(&self) -> Result<FeedBatch, FeedError> {
        info!(url = %self.url, "feed: fetch");
        let res = self.client.get(&self.url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(FeedError::Status { url: self.url.clone(), status });
        }
        let xml = res.text().await?;
        let batch = parse_feed(&xml)?;
        info!(
            url = %self.url,
            entries = batch.entries.len(),
            rejected = batch.rejected.len(),
            "feed: parsed"
        );
        Ok(batch)
    }
}

/// Parses RSS 2.0, RSS 1.0 (RDF) or Atom. Entry order is preserved.
pub fn parse_feed(xml: &str) -> Result<FeedBatch, FeedError> {
    let opts = ParsingOptions { allow_dtd: true, ..ParsingOptions::default() };
    let doc = Document::parse_with_options(xml, opts)?;
    let root = doc.root_element();
    let mut batch = FeedBatch::default();
    match root.tag_name().name() {
        "rss" | "RDF" => {
            for item in doc.descendants().filter(|n| n.has_tag_name("item")) {
                push_entry(&mut batch, rss_item(item));
            }
        }
        "feed" => {
            for entry in root.children().filter(|n| n.has_tag_name("entry")) {
                push_entry(&mut batch, atom_entry(entry));
            }
        }
        other => return Err(FeedError::UnsupportedFormat(other.to_string())),
    }
    Ok(batch)
}

fn push_entry(batch: &mut FeedBatch, parsed: Result<FeedEntry, RejectedEntry>) {
    match parsed {
        Ok(entry) => batch.entries.push(entry),
        Err(rejected) => {
            error!(
                entry_id = ?rejected.id,
                reason = %rejected.reason,
                "feed: skipping malformed entry"
            );
            batch.rejected.push(rejected);
        }
    }
}

struct RawEntry {
    id: Option<String>,
    link: Option<String>,
    title: Option<String>,
    description: Option<String>,
    published: Option<String>,
}

fn rss_item(item: Node) -> Result<FeedEntry, RejectedEntry> {
    build_entry(RawEntry {
        id: child_text(item, &["guid"]),
        link: child_text(item, &["link"]),
        title: child_text(item, &["title"]),
        description: child_text(item, &["description", "encoded"]),
        published: child_text(item, &["pubDate", "date"]),
    })
}

fn atom_entry(entry: Node) -> Result<FeedEntry, RejectedEntry> {
    let link = entry
        .children()
        .filter(|n| n.has_tag_name("link"))
        .find(|n| matches!(n.attribute("rel"), None | Some("alternate")))
        .and_then(|n| n.attribute("href"))
        .map(|s| s.trim().to_string());
    build_entry(RawEntry {
        id: child_text(entry, &["id"]),
        link,
        title: child_text(entry, &["title"]),
        description: child_text(entry, &["summary", "content"]),
        published: child_text(entry, &["published", "updated"]),
    })
}

fn build_entry(raw: RawEntry) -> Result<FeedEntry, RejectedEntry> {
    let id = raw.id.or_else(|| raw.link.clone());
    let reject = |reason: String| RejectedEntry { id: id.clone(), reason };
    let Some(link) = raw.link else {
        return Err(reject("missing link".to_string()));
    };
    let Some(published_raw) = raw.published else {
        return Err(reject("missing published timestamp".to_string()));
    };
    let Some(published) = parse_timestamp(&published_raw) else {
        return Err(reject(format!("unparseable published timestamp {:?}", published_raw)));
    };
    Ok(FeedEntry::builder()
        .id(id.unwrap_or_else(|| link.clone()))
        .title(raw.title.unwrap_or_default())
        .maybe_description(raw.description)
        .link(link)
        .published(published)
        .build())
}

/// First non-empty text among children named `names`, tried in order.
fn child_text(node: Node, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        node.children()
            .filter(|n| n.has_tag_name(*name))
            .find_map(|n| n.text().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
    })
}

/// RFC 2822 (RSS) first, then RFC 3339 (Atom, Dublin Core).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
