use std::sync::Arc;

use anyhow::{Context as _, Result};
use bon::bon;
use tera::{Context, Tera};
use tracing::{debug, error, info};

use crate::error::PostError;
use crate::models::source::{ImageSource, LinkPreviewSource};
use crate::models::types::{FeedEntry, LinkMetadata, PostRecord, PostRef, RunReport, Watermark};
use crate::publishers::utils::log_preview;
use crate::services::dedup::{compute_watermark, is_new, try_compute_watermark};
use crate::services::embed::{alt_text_for, compose_embed};
use crate::services::link_metadata::{
    LinkMetadataResolver, extract_description_image, plain_text, resolve_against,
};
use crate::services::publisher::Publisher;
use crate::services::rich_text::compose;
use crate::services::settings::RunConfig;
use crate::traits::feed_source::FeedSource;

const POST_TEMPLATE_NAME: &str = "post_tpl";

/// Один проход: вход, watermark, лента, публикация новых записей по порядку
pub struct Worker {
    feed: Arc<dyn FeedSource>,
    resolver: LinkMetadataResolver,
    publisher: Publisher,
    handle: String,
    settings: RunConfig,
    tera: Tera,
}

#[bon]
impl Worker {
    #[builder]
    pub fn new(
        feed: Arc<dyn FeedSource>,
        resolver: LinkMetadataResolver,
        publisher: Publisher,
        #[builder(into)] handle: String,
        #[builder(default)] settings: RunConfig,
    ) -> Result<Self, PostError> {
        let mut tera = Tera::default();
        tera.add_raw_template(POST_TEMPLATE_NAME, settings.post_template())?;
        Ok(Self { feed, resolver, publisher, handle, settings, tera })
    }
}

impl Worker {
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        let offline = self.settings.is_offline();
        info!(api = self.publisher.api().name(), offline, "worker: run starting");

        let session = self.publisher.login().await.context("login failed")?;
        let watermark = if offline {
            Watermark::epoch()
        } else if self.settings.is_strict_watermark() {
            try_compute_watermark(self.publisher.api(), &session, &self.handle)
                .await
                .context("watermark lookup failed")?
        } else {
            compute_watermark(self.publisher.api(), &session, &self.handle).await
        };
        info!(watermark = %watermark, "worker: watermark");

        let batch = self.feed.fetch().await.context("feed fetch failed")?;
        let mut report = RunReport { rejected: batch.rejected.len(), ..Default::default() };

        for entry in &batch.entries {
            report.seen += 1;
            if !is_new(entry, watermark) {
                report.skipped += 1;
                debug!(
                    entry_id = %entry.id,
                    link = %entry.link,
                    published = %entry.published,
                    "worker: already posted"
                );
                continue;
            }
            match self.process_entry(entry).await {
                Ok(post_ref) => {
                    report.posted += 1;
                    info!(
                        entry_id = %entry.id,
                        link = %entry.link,
                        uri = %post_ref.uri,
                        "worker: entry posted"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        entry_id = %entry.id,
                        link = %entry.link,
                        error = %e,
                        "worker: entry failed"
                    );
                }
            }
        }

        info!(
            seen = report.seen,
            skipped = report.skipped,
            posted = report.posted,
            failed = report.failed,
            rejected = report.rejected,
            "worker: run finished"
        );
        Ok(report)
    }

    pub fn render_text(&self, entry: &FeedEntry) -> Result<String, PostError> {
        let mut ctx = Context::new();
        ctx.insert("title", &plain_text(&entry.title));
        ctx.insert("link", &entry.link);
        let description = entry.description.as_deref().map(plain_text).unwrap_or_default();
        ctx.insert("description", &description);
        ctx.insert("id", entry.id.as_str());
        ctx.insert("published", &entry.published.to_rfc3339());
        Ok(self.tera.render(POST_TEMPLATE_NAME, &ctx)?)
    }

    async fn process_entry(&mut self, entry: &FeedEntry) -> Result<PostRef, PostError> {
        let title = plain_text(&entry.title);
        let text = self.render_text(entry)?;
        debug!(entry_id = %entry.id, text = %log_preview(&text, 120), "worker: post text");
        let rich = compose(&text);

        let image_source = self.settings.image_source();
        let link_preview = self.settings.link_preview();
        let page = if image_source == ImageSource::Page || link_preview == LinkPreviewSource::Page {
            self.resolver.resolve(&entry.link).await
        } else {
            LinkMetadata::default()
        };

        let image_url = match image_source {
            ImageSource::Description => entry
                .description
                .as_deref()
                .and_then(extract_description_image)
                .map(|src| resolve_against(&entry.link, &src)),
            ImageSource::Page => page.image.clone(),
            ImageSource::Disabled => None,
        };
        let mut images = Vec::new();
        if let Some(url) = image_url {
            if let Some(image) = self.publisher.upload_image(&url, &alt_text_for(&title)).await {
                images.push(image);
            }
        }

        let preview = match link_preview {
            LinkPreviewSource::Page => LinkMetadata { image: None, ..page },
            LinkPreviewSource::Feed => LinkMetadata {
                title: Some(title.clone()),
                description: entry.description.as_deref().map(plain_text),
                image: None,
            },
            LinkPreviewSource::Disabled => LinkMetadata::default(),
        };
        let embed = compose_embed(images, &preview, &entry.link, self.settings.max_images());
        debug!(
            entry_id = %entry.id,
            embed = ?embed.as_ref().map(|e| e.to_string()),
            "worker: embed"
        );

        self.publisher.publish(&PostRecord { text: rich, embed }).await
    }
}
