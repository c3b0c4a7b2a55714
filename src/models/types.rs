use std::fmt;
use std::ops::Range;

use bon::{Builder, bon};
use chrono::{DateTime, Utc};
use derive_more::{AsRef, Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

/// Идентификатор записи ленты (guid/id, иначе ссылка)
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display, AsRef, FromStr,
)]
#[from(String, &str)]
pub struct EntryId(String);

#[bon]
impl EntryId {
    #[builder]
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Момент последнего собственного поста аккаунта; всё, что не новее, уже опубликовано
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn is_epoch(&self) -> bool {
        self.0 == DateTime::<Utc>::UNIX_EPOCH
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::epoch()
    }
}

/// Запись ленты, снимок на один запуск
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct FeedEntry {
    #[builder(into)]
    pub id: EntryId,
    #[builder(into)]
    pub title: String,
    #[builder(into)]
    pub description: Option<String>,
    #[builder(into)]
    pub link: String,
    pub published: DateTime<Utc>,
}

/// Entry the parser refused to turn into a [`FeedEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedBatch {
    pub entries: Vec<FeedEntry>,
    pub rejected: Vec<RejectedEntry>,
}

/// Метаданные страницы для карточки ссылки
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl LinkMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.image.is_none()
    }

    /// True when there is text for a link-preview card.
    pub fn has_preview_text(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.title) || filled(&self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum SpanKind {
    Plain,
    Link { uri: String },
    Tag { tag: String },
}

/// Фрагмент размеченного текста с байтовыми смещениями в итоговой строке
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichTextSpan {
    pub text: String,
    pub range: Range<usize>,
    pub kind: SpanKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacetFeature {
    Link { uri: String },
    Tag { tag: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub byte_start: usize,
    pub byte_end: usize,
    pub feature: FacetFeature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    spans: Vec<RichTextSpan>,
}

impl RichText {
    pub fn new(spans: Vec<RichTextSpan>) -> Self {
        Self { spans }
    }

    pub fn spans(&self) -> &[RichTextSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Byte length of the rendered text.
    pub fn len(&self) -> usize {
        self.spans.last().map(|s| s.range.end).unwrap_or(0)
    }

    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn facets(&self) -> Vec<Facet> {
        self.spans
            .iter()
            .filter_map(|span| {
                let feature = match &span.kind {
                    SpanKind::Plain => return None,
                    SpanKind::Link { uri } => FacetFeature::Link { uri: uri.clone() },
                    SpanKind::Tag { tag } => FacetFeature::Tag { tag: tag.clone() },
                };
                Some(Facet {
                    byte_start: span.range.start,
                    byte_end: span.range.end,
                    feature,
                })
            })
            .collect()
    }
}

/// Непрозрачная ссылка на загруженный blob, встраивается в пост как есть
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct BlobRef(serde_json::Value);

impl BlobRef {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub blob: BlobRef,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Embed {
    Images(Vec<ImageAttachment>),
    External {
        uri: String,
        title: String,
        description: String,
    },
}

/// Пост к отправке; время создания проставляет адаптер API в момент отправки
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub text: RichText,
    pub embed: Option<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"<redacted>")
            .finish()
    }
}

/// One entry of the account's own timeline, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineItem {
    pub is_repost: bool,
    pub is_reply: bool,
    pub created_at: DateTime<Utc>,
}

impl TimelineItem {
    pub fn is_top_level(&self) -> bool {
        !self.is_repost && !self.is_reply
    }
}

/// Итоги одного запуска
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub seen: usize,
    pub skipped: usize,
    pub posted: usize,
    pub failed: usize,
    pub rejected: usize,
}
