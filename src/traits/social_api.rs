use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::types::{BlobRef, PostRecord, PostRef, Session, TimelineItem};

/// Interface to the target social network.
///
/// Every call except login takes the session it runs under. The real client
/// talks XRPC through an atrium agent that keeps the tokens from login and
/// takes the repo DID from the session; the offline implementation answers
/// locally for dry runs.
#[async_trait]
pub trait SocialApi: Send + Sync {
    fn name(&self) -> &str;

    async fn create_session(&self, identifier: &str, password: &str) -> Result<Session, ApiError>;

    /// Reads one page of the actor's own feed, newest first.
    async fn author_feed(
        &self,
        session: &Session,
        actor: &str,
    ) -> Result<Vec<TimelineItem>, ApiError>;

    async fn upload_blob(
        &self,
        session: &Session,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<BlobRef, ApiError>;

    async fn create_post(&self, session: &Session, post: &PostRecord) -> Result<PostRef, ApiError>;
}
