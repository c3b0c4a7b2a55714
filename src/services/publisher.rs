use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, Retryable};
use bon::bon;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use strum_macros::Display;
use tracing::{error, info, warn};

use crate::error::{ApiError, PostError};
use crate::models::types::{ImageAttachment, PostRecord, PostRef, Session};
use crate::traits::social_api::SocialApi;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PublisherState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Posting,
    Failed,
}

/// Паузы между попытками входа: step, 2·step, ... не больше max. Бесконечная.
#[derive(Debug, Clone, Copy)]
pub struct LoginBackoff {
    step: Duration,
    max: Duration,
    attempt: u32,
}

impl Iterator for LoginBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        Some(self.step.saturating_mul(self.attempt).min(self.max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginBackoffBuilder {
    pub step: Duration,
    pub max: Duration,
}

impl LoginBackoffBuilder {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self { step, max }
    }
}

impl Default for LoginBackoffBuilder {
    fn default() -> Self {
        Self { step: Duration::from_secs(60), max: Duration::from_secs(600) }
    }
}

impl BackoffBuilder for LoginBackoffBuilder {
    type Backoff = LoginBackoff;

    fn build(self) -> Self::Backoff {
        LoginBackoff { step: self.step, max: self.max, attempt: 0 }
    }
}

/// Владеет сессией: вход с повторами, загрузка картинок, отправка постов
pub struct Publisher {
    api: Arc<dyn SocialApi>,
    http: Client,
    identifier: String,
    password: String,
    backoff: LoginBackoffBuilder,
    state: PublisherState,
    session: Option<Session>,
}

#[bon]
impl Publisher {
    #[builder]
    pub fn new(
        api: Arc<dyn SocialApi>,
        #[builder(into)] identifier: String,
        #[builder(into)] password: String,
        #[builder(default)] backoff: LoginBackoffBuilder,
        image_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(image_timeout).build()?;
        Ok(Self {
            api,
            http,
            identifier,
            password,
            backoff,
            state: PublisherState::Unauthenticated,
            session: None,
        })
    }
}

impl Publisher {
    pub fn api(&self) -> &dyn SocialApi {
        self.api.as_ref()
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Logs in, retrying until the service accepts the credentials.
    pub async fn login(&mut self) -> Result<Session, ApiError> {
        self.state = PublisherState::Authenticating;
        info!(api = self.api.name(), identifier = %self.identifier, "publisher: login");
        let api = &self.api;
        let identifier = self.identifier.as_str();
        let password = self.password.as_str();
        let result = (|| async move { api.create_session(identifier, password).await })
            .retry(self.backoff)
            .sleep(tokio::time::sleep)
            .notify(|err: &ApiError, dur: Duration| {
                error!(
                    identifier = %identifier,
                    error = %err,
                    retry_in_secs = dur.as_secs(),
                    "publisher: login failed, retrying"
                );
            })
            .await;
        match result {
            Ok(session) => {
                info!(did = %session.did, handle = %session.handle, "publisher: logged in");
                self.state = PublisherState::Authenticated;
                self.session = Some(session.clone());
                Ok(session)
            }
            Err(e) => {
                self.state = PublisherState::Unauthenticated;
                Err(e)
            }
        }
    }

    /// Downloads an image and uploads it as a blob. Any failure yields `None`.
    pub async fn upload_image(&self, url: &str, alt: &str) -> Option<ImageAttachment> {
        let Some(session) = self.session.as_ref() else {
            warn!(url = %url, "publisher: no session, image skipped");
            return None;
        };
        let (bytes, mime) = match self.download(url).await {
            Ok(found) => found,
            Err(e) => {
                warn!(url = %url, error = %e, "publisher: image download failed");
                return None;
            }
        };
        match self.api.upload_blob(session, bytes, &mime).await {
            Ok(blob) => {
                info!(url = %url, mime = %mime, "publisher: image uploaded");
                Some(ImageAttachment { blob, alt: alt.to_string() })
            }
            Err(e) => {
                warn!(url = %url, error = %e, "publisher: image upload failed");
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), ApiError> {
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ApiError::Status { endpoint: url.to_string(), status, body: String::new() });
        }
        let mime = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());
        if !mime.starts_with("image/") {
            return Err(ApiError::InvalidResponse {
                endpoint: url.to_string(),
                message: format!("not an image: {mime}"),
            });
        }
        let bytes = res.bytes().await?.to_vec();
        Ok((bytes, mime))
    }

    pub async fn publish(&mut self, post: &PostRecord) -> Result<PostRef, PostError> {
        if post.text.text().trim().is_empty() {
            return Err(PostError::EmptyText);
        }
        let Some(session) = self.session.as_ref() else {
            return Err(PostError::NotAuthenticated);
        };
        self.state = PublisherState::Posting;
        match self.api.create_post(session, post).await {
            Ok(post_ref) => {
                self.state = PublisherState::Authenticated;
                info!(uri = %post_ref.uri, cid = %post_ref.cid, "publisher: posted");
                Ok(post_ref)
            }
            Err(e) => {
                self.state = PublisherState::Failed;
                Err(e.into())
            }
        }
    }
}
