use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use atrium_api::agent::AtpAgent;
use atrium_api::agent::store::MemorySessionStore;
use atrium_api::app::bsky::embed::{external, images};
use atrium_api::app::bsky::feed::defs::FeedViewPost;
use atrium_api::app::bsky::feed::{get_author_feed, post};
use atrium_api::app::bsky::richtext::facet;
use atrium_api::com::atproto::repo::create_record;
use atrium_api::types::string::{AtIdentifier, Datetime, Nsid};
use atrium_api::types::{LimitedNonZeroU8, Union, Unknown};
use atrium_api::xrpc::Error as AtriumError;
use atrium_api::xrpc::error::XrpcErrorKind;
use atrium_xrpc_client::reqwest::{ReqwestClient, ReqwestClientBuilder};
use bon::bon;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::models::types::{
    BlobRef, Embed, Facet, FacetFeature, PostRecord, PostRef, Session, TimelineItem,
};
use crate::traits::social_api::SocialApi;

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_TIMELINE_LIMIT: u32 = 30;
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const GET_AUTHOR_FEED: &str = "app.bsky.feed.getAuthorFeed";
const UPLOAD_BLOB: &str = "com.atproto.repo.uploadBlob";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

type Agent = AtpAgent<MemorySessionStore, ReqwestClient>;

/// Клиент Bluesky поверх atrium; агент хранит сессию после входа
pub struct BskyClient {
    agent: Agent,
    timeline_limit: u32,
}

#[bon]
impl BskyClient {
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_SERVICE_URL.to_string())] service_url: String,
        #[builder(default = DEFAULT_TIMELINE_LIMIT)] timeline_limit: u32,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        let xrpc = ReqwestClientBuilder::new(service_url.trim_end_matches('/'))
            .client(http)
            .build();
        let agent = AtpAgent::new(xrpc, MemorySessionStore::default());
        Ok(Self { agent, timeline_limit })
    }
}

impl BskyClient {
    fn page_limit(&self) -> Option<LimitedNonZeroU8<100>> {
        u8::try_from(self.timeline_limit)
            .ok()
            .and_then(|n| LimitedNonZeroU8::try_from(n).ok())
    }
}

/// Maps an XRPC failure onto [`ApiError`], keeping the status and the error body.
fn xrpc_error<E>(endpoint: &str, err: AtriumError<E>) -> ApiError
where
    E: fmt::Debug + fmt::Display,
{
    let endpoint = endpoint.to_string();
    match err {
        AtriumError::XrpcResponse(res) => {
            let body = match res.error {
                Some(XrpcErrorKind::Undefined(b)) => [b.error, b.message]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(": "),
                Some(XrpcErrorKind::Custom(e)) => e.to_string(),
                None => String::new(),
            };
            let status = StatusCode::from_u16(res.status.as_u16())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error!(endpoint = %endpoint, status = %status, body = %body, "bsky: request failed");
            ApiError::Status { endpoint, status, body }
        }
        AtriumError::SerdeJson(e) => ApiError::InvalidResponse { endpoint, message: e.to_string() },
        AtriumError::UnexpectedResponseType => {
            ApiError::InvalidResponse { endpoint, message: "unexpected response type".to_string() }
        }
        other => ApiError::Transport { endpoint, message: other.to_string() },
    }
}

fn invalid_request(endpoint: &str, message: impl fmt::Display) -> ApiError {
    ApiError::InvalidRequest { endpoint: endpoint.to_string(), message: message.to_string() }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

/// Reduces a feed item to what the watermark needs.
///
/// The record's `createdAt` is preferred; when it is missing or unparseable
/// the server's `indexedAt` stands in. Items with neither are dropped.
fn timeline_item(view: FeedViewPost) -> Option<TimelineItem> {
    let post = &view.data.post.data;
    let record = serde_json::to_value(&post.record).unwrap_or_default();
    let is_reply = record.get("reply").is_some_and(|r| !r.is_null());

    let created_at = match record.get("createdAt").and_then(Value::as_str) {
        Some(raw) => match parse_timestamp(raw) {
            Some(t) => Some(t),
            None => {
                warn!(
                    uri = %post.uri,
                    created_at = %raw,
                    "bsky: unparseable createdAt, using indexedAt"
                );
                parse_timestamp(post.indexed_at.as_str())
            }
        },
        None => {
            warn!(uri = %post.uri, "bsky: record has no createdAt, using indexedAt");
            parse_timestamp(post.indexed_at.as_str())
        }
    };
    let Some(created_at) = created_at else {
        warn!(
            uri = %post.uri,
            indexed_at = %post.indexed_at.as_str(),
            "bsky: timeline item has no usable time, dropped"
        );
        return None;
    };
    Some(TimelineItem { is_repost: view.data.reason.is_some(), is_reply, created_at })
}

fn rich_text_facet(facet: &Facet) -> facet::Main {
    let feature = match &facet.feature {
        FacetFeature::Link { uri } => {
            facet::MainFeaturesItem::Link(Box::new(facet::LinkData { uri: uri.clone() }.into()))
        }
        FacetFeature::Tag { tag } => {
            facet::MainFeaturesItem::Tag(Box::new(facet::TagData { tag: tag.clone() }.into()))
        }
    };
    facet::MainData {
        features: vec![Union::Refs(feature)],
        index: facet::ByteSliceData { byte_end: facet.byte_end, byte_start: facet.byte_start }
            .into(),
    }
    .into()
}

fn record_embed(embed: &Embed) -> Result<post::RecordEmbedRefs, ApiError> {
    match embed {
        Embed::Images(attachments) => {
            let items = attachments
                .iter()
                .map(|img| -> Result<images::Image, ApiError> {
                    let blob = serde_json::from_value(img.blob.as_value().clone()).map_err(|e| {
                        invalid_request(CREATE_RECORD, format!("bad blob reference: {e}"))
                    })?;
                    let image =
                        images::ImageData { alt: img.alt.clone(), aspect_ratio: None, image: blob };
                    Ok(image.into())
                })
                .collect::<Result<Vec<images::Image>, ApiError>>()?;
            Ok(post::RecordEmbedRefs::AppBskyEmbedImagesMain(Box::new(
                images::MainData { images: items }.into(),
            )))
        }
        Embed::External { uri, title, description } => {
            let external = external::ExternalData {
                description: description.clone(),
                thumb: None,
                title: title.clone(),
                uri: uri.clone(),
            };
            Ok(post::RecordEmbedRefs::AppBskyEmbedExternalMain(Box::new(
                external::MainData { external: external.into() }.into(),
            )))
        }
    }
}

/// Builds the `app.bsky.feed.post` record stamped with `created_at`.
pub fn post_record(post: &PostRecord, created_at: DateTime<Utc>) -> Result<post::Record, ApiError> {
    let facets: Vec<facet::Main> = post.text.facets().iter().map(rich_text_facet).collect();
    let embed = post.embed.as_ref().map(record_embed).transpose()?.map(Union::Refs);
    Ok(post::RecordData {
        created_at: Datetime::new(created_at.fixed_offset()),
        embed,
        entities: None,
        facets: (!facets.is_empty()).then_some(facets),
        labels: None,
        langs: None,
        reply: None,
        tags: None,
        text: post.text.text(),
    }
    .into())
}

/// JSON form of [`post_record`], with the `$type` the repo expects.
pub fn post_record_json(post: &PostRecord, created_at: DateTime<Utc>) -> Result<Value, ApiError> {
    let record = post_record(post, created_at)?;
    let mut value = serde_json::to_value(&record)
        .map_err(|e| invalid_request(CREATE_RECORD, format!("record does not serialize: {e}")))?;
    if let Value::Object(map) = &mut value {
        map.insert("$type".to_string(), Value::String(POST_COLLECTION.to_string()));
    }
    Ok(value)
}

#[async_trait]
impl SocialApi for BskyClient {
    fn name(&self) -> &str {
        "bluesky"
    }

    async fn create_session(&self, identifier: &str, password: &str) -> Result<Session, ApiError> {
        info!(identifier = %identifier, "bsky: createSession");
        let result = self
            .agent
            .login(identifier, password)
            .await
            .map_err(|e| xrpc_error(CREATE_SESSION, e))?;
        Ok(Session {
            did: result.data.did.to_string(),
            handle: result.data.handle.to_string(),
            access_jwt: result.data.access_jwt.clone(),
        })
    }

    async fn author_feed(
        &self,
        _session: &Session,
        actor: &str,
    ) -> Result<Vec<TimelineItem>, ApiError> {
        let actor: AtIdentifier = actor.parse().map_err(|e| invalid_request(GET_AUTHOR_FEED, e))?;
        let params = get_author_feed::ParametersData {
            actor,
            cursor: None,
            filter: None,
            include_pins: None,
            limit: self.page_limit(),
        };
        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .get_author_feed(params.into())
            .await
            .map_err(|e| xrpc_error(GET_AUTHOR_FEED, e))?;
        Ok(output.data.feed.into_iter().filter_map(timeline_item).collect())
    }

    async fn upload_blob(
        &self,
        _session: &Session,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<BlobRef, ApiError> {
        info!(size = bytes.len(), mime = %mime_type, "bsky: uploadBlob");
        let output = self
            .agent
            .api
            .com
            .atproto
            .repo
            .upload_blob(bytes)
            .await
            .map_err(|e| xrpc_error(UPLOAD_BLOB, e))?;
        serde_json::to_value(&output.data.blob)
            .map(BlobRef::from)
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: UPLOAD_BLOB.to_string(),
                message: e.to_string(),
            })
    }

    async fn create_post(&self, session: &Session, post: &PostRecord) -> Result<PostRef, ApiError> {
        let record: Unknown = serde_json::from_value(post_record_json(post, Utc::now())?)
            .map_err(|e| invalid_request(CREATE_RECORD, e))?;
        let collection =
            Nsid::new(POST_COLLECTION.to_string()).map_err(|e| invalid_request(CREATE_RECORD, e))?;
        let repo: AtIdentifier =
            session.did.parse().map_err(|e| invalid_request(CREATE_RECORD, e))?;
        info!(
            repo = %session.did,
            text_len = post.text.len(),
            embed = ?post.embed.as_ref().map(|e| e.to_string()),
            "bsky: createRecord"
        );
        let input = create_record::InputData {
            collection,
            record,
            repo,
            rkey: None,
            swap_commit: None,
            validate: None,
        };
        let output = self
            .agent
            .api
            .com
            .atproto
            .repo
            .create_record(input.into())
            .await
            .map_err(|e| xrpc_error(CREATE_RECORD, e))?;
        Ok(PostRef { uri: output.data.uri.clone(), cid: output.data.cid.as_ref().to_string() })
    }
}
