use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString, IntoStaticStr};

/// Откуда брать картинку для поста
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    IntoStaticStr,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    /// First `<img>` of the entry description, `_thumb` swapped for `_full`
    #[default]
    Description,
    /// Preview image of the linked page, normalized to the `_full.jpg` asset
    Page,
    /// No image attachments
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Disabled,
}

/// Откуда брать заголовок и описание карточки ссылки
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumString,
    IntoStaticStr,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LinkPreviewSource {
    /// Metadata resolved from the linked page
    #[default]
    Page,
    /// Title and description of the feed entry itself
    Feed,
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    Disabled,
}

impl ImageSource {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn all() -> Vec<ImageSource> {
        vec![ImageSource::Description, ImageSource::Page, ImageSource::Disabled]
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LinkPreviewSource {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    pub fn all() -> Vec<LinkPreviewSource> {
        vec![LinkPreviewSource::Page, LinkPreviewSource::Feed, LinkPreviewSource::Disabled]
    }
}

impl std::fmt::Display for LinkPreviewSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
