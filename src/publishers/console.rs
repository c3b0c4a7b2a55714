use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::bluesky::POST_COLLECTION;
use super::utils::log_preview;
use crate::error::ApiError;
use crate::models::types::{BlobRef, Embed, PostRecord, PostRef, Session, TimelineItem};
use crate::traits::social_api::SocialApi;

pub const OFFLINE_DID: &str = "did:offline:dry-run";

/// Dry-run API: печатает посты в stdout вместо отправки, в сеть не ходит
#[derive(Default)]
pub struct OfflineApi {
    pub max_chars: Option<usize>,
    sent: Mutex<Vec<String>>,
    blobs: AtomicUsize,
}

impl OfflineApi {
    pub fn new(max_chars: Option<usize>) -> Self {
        Self { max_chars, ..Default::default() }
    }

    /// Texts of the posts "sent" so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SocialApi for OfflineApi {
    fn name(&self) -> &str {
        "offline"
    }

    async fn create_session(&self, identifier: &str, _password: &str) -> Result<Session, ApiError> {
        info!(identifier = %identifier, "offline: login skipped");
        Ok(Session {
            did: OFFLINE_DID.to_string(),
            handle: identifier.to_string(),
            access_jwt: String::new(),
        })
    }

    async fn author_feed(
        &self,
        _session: &Session,
        _actor: &str,
    ) -> Result<Vec<TimelineItem>, ApiError> {
        Ok(Vec::new())
    }

    async fn upload_blob(
        &self,
        _session: &Session,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<BlobRef, ApiError> {
        let n = self.blobs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(BlobRef::from(json!({
            "$type": "blob",
            "ref": { "$link": format!("offline-blob-{}", n) },
            "mimeType": mime_type,
            "size": bytes.len(),
        })))
    }

    async fn create_post(&self, session: &Session, post: &PostRecord) -> Result<PostRef, ApiError> {
        let text = post.text.text();
        let shown = match self.max_chars {
            Some(max) => log_preview(&text, max),
            None => text.clone(),
        };
        let embed = match &post.embed {
            Some(Embed::Images(images)) => format!("images x{}", images.len()),
            Some(Embed::External { uri, .. }) => format!("link card {}", uri),
            None => "none".to_string(),
        };
        println!("{}\n[embed: {}]", shown, embed);
        info!(
            text_len = text.len(),
            facets = post.text.facets().len(),
            embed = %embed,
            "offline: post not sent"
        );
        let n = {
            let mut sent = self.sent.lock().map_err(|_| ApiError::InvalidResponse {
                endpoint: "offline".into(),
                message: "sent log poisoned".into(),
            })?;
            sent.push(text);
            sent.len()
        };
        Ok(PostRef {
            uri: format!("at://{}/{}/offline-{}", session.did, POST_COLLECTION, n),
            cid: format!("offline-{}", n),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::ImageAttachment;
    use crate::services::rich_text::compose;

    #[tokio::test]
    async fn records_posts_without_network() {
        let api = OfflineApi::new(Some(40));
        let session = api.create_session("me.test", "").await.unwrap();
        assert_eq!(session.did, OFFLINE_DID);
        assert!(api.author_feed(&session, "me.test").await.unwrap().is_empty());

        let blob = api.upload_blob(&session, vec![0; 10], "image/png").await.unwrap();
        assert_eq!(blob.as_value()["size"], 10);

        let post = PostRecord {
            text: compose("Hello #rust\nhttps://e.x"),
            embed: Some(Embed::Images(vec![ImageAttachment { blob, alt: "Hello".into() }])),
        };
        let first = api.create_post(&session, &post).await.unwrap();
        let second = api.create_post(&session, &post).await.unwrap();
        assert_eq!(first.uri, "at://did:offline:dry-run/app.bsky.feed.post/offline-1");
        assert_eq!(second.cid, "offline-2");
        assert_eq!(api.sent(), vec!["Hello #rust\nhttps://e.x".to_string(); 2]);
    }
}
