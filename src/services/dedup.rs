use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::types::{FeedEntry, Session, TimelineItem, Watermark};
use crate::traits::social_api::SocialApi;

/// Strictly newer than the watermark; an entry at the watermark instant is already posted.
pub fn is_new(entry: &FeedEntry, watermark: Watermark) -> bool {
    entry.published > watermark.instant()
}

/// Первый собственный пост (не репост и не ответ) в ленте от новых к старым
pub fn watermark_from_timeline(items: &[TimelineItem]) -> Watermark {
    items
        .iter()
        .find(|item| item.is_top_level())
        .map(|item| Watermark::from(item.created_at))
        .unwrap_or_default()
}

pub async fn try_compute_watermark(
    api: &dyn SocialApi,
    session: &Session,
    handle: &str,
) -> Result<Watermark, ApiError> {
    let items = api.author_feed(session, handle).await?;
    let watermark = watermark_from_timeline(&items);
    info!(
        handle = %handle,
        timeline_items = items.len(),
        watermark = %watermark,
        "dedup: watermark computed"
    );
    Ok(watermark)
}

/// Like [`try_compute_watermark`], but a failed timeline read yields the epoch.
pub async fn compute_watermark(api: &dyn SocialApi, session: &Session, handle: &str) -> Watermark {
    match try_compute_watermark(api, session, handle).await {
        Ok(watermark) => watermark,
        Err(e) => {
            warn!(
                handle = %handle,
                error = %e,
                "dedup: timeline read failed, treating every entry as new"
            );
            Watermark::epoch()
        }
    }
}
