use async_trait::async_trait;

use crate::error::FeedError;
use crate::models::types::FeedBatch;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetches the feed once; malformed entries land in `FeedBatch::rejected`.
    async fn fetch(&self) -> Result<FeedBatch, FeedError>;
}
