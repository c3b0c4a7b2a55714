use std::time::Duration;

use bon::bon;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::error::ResolveError;
use crate::models::types::LinkMetadata;

/// Suffix of the high-resolution asset in the CDN naming convention.
pub const FULL_IMAGE_SUFFIX: &str = "_full.jpg";

/// One way of pulling a value out of an HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaSource {
    /// `<meta property="..." content="...">` (Open Graph)
    Property(&'static str),
    /// `<meta name="..." content="...">`
    Name(&'static str),
    /// Text of the `<title>` element
    TitleElement,
}

pub const TITLE_CHAIN: &[MetaSource] =
    &[MetaSource::Property("og:title"), MetaSource::TitleElement];
pub const DESCRIPTION_CHAIN: &[MetaSource] =
    &[MetaSource::Property("og:description"), MetaSource::Name("description")];
pub const IMAGE_CHAIN: &[MetaSource] =
    &[MetaSource::Property("og:image"), MetaSource::Name("twitter:image")];

impl MetaSource {
    pub fn extract(&self, doc: &Html) -> Option<String> {
        let value = match self {
            MetaSource::Property(p) => meta_content(doc, "property", p),
            MetaSource::Name(n) => meta_content(doc, "name", n),
            MetaSource::TitleElement => {
                let sel = Selector::parse("title").ok()?;
                doc.select(&sel).next().map(|e| e.text().collect::<String>())
            }
        }?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

fn meta_content(doc: &Html, attr: &str, value: &str) -> Option<String> {
    let sel = Selector::parse(&format!(r#"meta[{}="{}"]"#, attr, value)).ok()?;
    doc.select(&sel)
        .find_map(|e| e.value().attr("content"))
        .map(str::to_string)
}

/// Tries the strategies in order, first non-empty value wins.
pub fn first_match(doc: &Html, chain: &[MetaSource]) -> Option<String> {
    chain.iter().find_map(|source| source.extract(doc))
}

/// Extracts preview metadata from a page fetched from `page_url`.
///
/// Relative image URLs are resolved against the page before normalization.
pub fn extract_metadata(html: &str, page_url: &str) -> LinkMetadata {
    let doc = Html::parse_document(html);
    let image = first_match(&doc, IMAGE_CHAIN)
        .map(|raw| normalize_image_url(&resolve_against(page_url, &raw)));
    LinkMetadata {
        title: first_match(&doc, TITLE_CHAIN),
        description: first_match(&doc, DESCRIPTION_CHAIN),
        image,
    }
}

/// Joins a possibly relative `raw` reference onto `base`.
/// Falls back to `raw` when either side does not parse.
pub fn resolve_against(base: &str, raw: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(raw))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Rewrites `.../photo.png` to `.../photo_full.jpg`, keeping scheme, host and port.
///
/// URLs already ending in the suffix, URLs without an extension in their last
/// path segment and unparseable URLs are returned unchanged.
pub fn normalize_image_url(raw: &str) -> String {
    if raw.ends_with(FULL_IMAGE_SUFFIX) {
        return raw.to_string();
    }
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let path = url.path().to_string();
    let (dir, file) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
    let Some((stem, _ext)) = file.rsplit_once('.') else {
        return raw.to_string();
    };
    if stem.is_empty() {
        return raw.to_string();
    }
    url.set_path(&format!("{}/{}{}", dir, stem, FULL_IMAGE_SUFFIX));
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// First `<img src>` of an HTML fragment, with `_thumb` swapped for `_full`.
pub fn extract_description_image(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let sel = Selector::parse("img[src]").ok()?;
    fragment
        .select(&sel)
        .find_map(|img| img.value().attr("src"))
        .map(|src| src.trim())
        .filter(|src| !src.is_empty())
        .map(|src| src.replace("_thumb", "_full"))
}

/// Text content of a fragment that may carry markup.
pub fn plain_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return fragment.trim().to_string();
    }
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}

/// Загружает страницу и извлекает метаданные для карточки ссылки
#[derive(Debug, Clone)]
pub struct LinkMetadataResolver {
    client: Client,
}

#[bon]
impl LinkMetadataResolver {
    #[builder]
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl LinkMetadataResolver {
    pub async fn try_resolve(&self, url: &str) -> Result<LinkMetadata, ResolveError> {
        let res = self.client.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(ResolveError::Status { url: url.to_string(), status });
        }
        let body = res.text().await?;
        Ok(extract_metadata(&body, url))
    }

    /// Never fails: any error degrades to empty metadata and a warning.
    pub async fn resolve(&self, url: &str) -> LinkMetadata {
        match self.try_resolve(url).await {
            Ok(meta) => {
                debug!(
                    url = %url,
                    title = ?meta.title,
                    image = ?meta.image,
                    "link metadata: resolved"
                );
                meta
            }
            Err(e) => {
                warn!(
                    url = %url,
                    error = %e,
                    "link metadata: could not fetch, continuing without it"
                );
                LinkMetadata::default()
            }
        }
    }
}
