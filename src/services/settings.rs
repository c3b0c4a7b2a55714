use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::models::source::{ImageSource, LinkPreviewSource};
use crate::services::embed::MAX_IMAGES;
use crate::services::publisher::LoginBackoffBuilder;

pub const PASSWORD_ENV: &str = "BSKY_APP_PASSWORD";
pub const DEFAULT_POST_TEMPLATE: &str = "{{ title }}\n{{ link }}";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub bluesky: BlueskyConfig,
    pub run: Option<RunConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub url: String,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlueskyConfig {
    pub service_url: Option<String>,      // https://bsky.social
    pub handle: String,                   // чья лента используется для watermark
    pub username: Option<String>,         // логин, по умолчанию handle
    pub app_password: Option<String>,     // иначе BSKY_APP_PASSWORD
    pub login_backoff_step_secs: Option<u64>,
    pub login_backoff_max_secs: Option<u64>,
    pub timeline_limit: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RunConfig {
    pub offline: Option<bool>,
    pub strict_watermark: Option<bool>,
    pub image_source: Option<ImageSource>,
    pub link_preview: Option<LinkPreviewSource>,
    pub max_images: Option<usize>,
    pub metadata_timeout_secs: Option<u64>,
    pub post_template: Option<String>, // Tera template for post text
    pub offline_max_chars: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(30))
    }
}

impl BlueskyConfig {
    pub fn identifier(&self) -> &str {
        self.username.as_deref().filter(|u| !u.is_empty()).unwrap_or(&self.handle)
    }

    /// Config value first, then the environment.
    pub fn password(&self) -> Result<String> {
        if let Some(p) = self.app_password.as_ref().filter(|p| !p.is_empty()) {
            return Ok(p.clone());
        }
        match std::env::var(PASSWORD_ENV) {
            Ok(p) if !p.is_empty() => Ok(p),
            _ => bail!("bluesky.app_password is not set and {} is empty", PASSWORD_ENV),
        }
    }

    pub fn login_backoff(&self) -> LoginBackoffBuilder {
        let default = LoginBackoffBuilder::default();
        LoginBackoffBuilder::new(
            self.login_backoff_step_secs.map(Duration::from_secs).unwrap_or(default.step),
            self.login_backoff_max_secs.map(Duration::from_secs).unwrap_or(default.max),
        )
    }
}

impl RunConfig {
    pub fn is_offline(&self) -> bool {
        self.offline.unwrap_or(false)
    }

    pub fn is_strict_watermark(&self) -> bool {
        self.strict_watermark.unwrap_or(false)
    }

    pub fn image_source(&self) -> ImageSource {
        self.image_source.unwrap_or_default()
    }

    pub fn link_preview(&self) -> LinkPreviewSource {
        self.link_preview.unwrap_or_default()
    }

    pub fn max_images(&self) -> usize {
        self.max_images.unwrap_or(MAX_IMAGES)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs.unwrap_or(10))
    }

    pub fn post_template(&self) -> &str {
        self.post_template.as_deref().unwrap_or(DEFAULT_POST_TEMPLATE)
    }
}

impl AppConfig {
    pub fn run(&self) -> RunConfig {
        self.run.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: AppConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}
