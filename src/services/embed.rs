use crate::models::types::{Embed, ImageAttachment, LinkMetadata};

/// Platform limit on images in one post.
pub const MAX_IMAGES: usize = 4;
pub const DEFAULT_ALT_TEXT: &str = "Preview image";
pub const DEFAULT_LINK_TITLE: &str = "Link";

/// Alt text for an attached image: the post title, or a generic label.
pub fn alt_text_for(title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_ALT_TEXT.to_string()
    } else {
        title.to_string()
    }
}

/// Выбирает ровно одно вложение: картинки важнее карточки ссылки
pub fn compose_embed(
    images: Vec<ImageAttachment>,
    metadata: &LinkMetadata,
    uri: &str,
    max_images: usize,
) -> Option<Embed> {
    if !images.is_empty() {
        let mut images = images;
        images.truncate(max_images.clamp(1, MAX_IMAGES));
        return Some(Embed::Images(images));
    }
    if !metadata.has_preview_text() {
        return None;
    }
    let non_blank = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(Embed::External {
        uri: uri.to_string(),
        title: non_blank(&metadata.title).unwrap_or_else(|| DEFAULT_LINK_TITLE.to_string()),
        description: non_blank(&metadata.description).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::BlobRef;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn image(n: usize) -> ImageAttachment {
        ImageAttachment {
            blob: BlobRef::from(json!({ "ref": { "$link": format!("blob{}", n) } })),
            alt: format!("alt {}", n),
        }
    }

    fn meta(title: Option<&str>, description: Option<&str>) -> LinkMetadata {
        LinkMetadata {
            title: title.map(str::to_string),
            description: description.map(str::to_string),
            image: None,
        }
    }

    #[test]
    fn images_win_over_link_preview() {
        let preview = meta(Some("Page"), Some("about"));
        let embed = compose_embed(vec![image(1)], &preview, "https://e.x", MAX_IMAGES);
        assert_eq!(embed, Some(Embed::Images(vec![image(1)])));
    }

    #[rstest]
    #[case(6, MAX_IMAGES, 4)]
    #[case(3, MAX_IMAGES, 3)]
    #[case(3, 2, 2)]
    #[case(5, 10, 4)]
    fn images_are_truncated(#[case] count: usize, #[case] max: usize, #[case] expected: usize) {
        let images = (0..count).map(image).collect();
        match compose_embed(images, &LinkMetadata::default(), "https://e.x", max) {
            Some(Embed::Images(kept)) => {
                assert_eq!(kept.len(), expected);
                assert_eq!(kept[0], image(0));
            }
            other => panic!("expected images, got {:?}", other),
        }
    }

    #[test]
    fn external_defaults_title_and_description() {
        let embed = compose_embed(vec![], &meta(None, Some("about")), "https://e.x/1", MAX_IMAGES);
        assert_eq!(
            embed,
            Some(Embed::External {
                uri: "https://e.x/1".into(),
                title: DEFAULT_LINK_TITLE.into(),
                description: "about".into(),
            })
        );

        let embed = compose_embed(vec![], &meta(Some("Page"), None), "https://e.x/1", MAX_IMAGES);
        assert_eq!(
            embed,
            Some(Embed::External {
                uri: "https://e.x/1".into(),
                title: "Page".into(),
                description: String::new(),
            })
        );
    }

    #[test]
    fn nothing_to_embed() {
        let empty = LinkMetadata::default();
        assert_eq!(compose_embed(vec![], &empty, "https://e.x", MAX_IMAGES), None);
        // an image url alone is not preview material
        let image_only =
            LinkMetadata { image: Some("https://cdn/x_full.jpg".into()), ..Default::default() };
        assert_eq!(compose_embed(vec![], &image_only, "https://e.x", MAX_IMAGES), None);
        let blank = meta(Some(" "), Some(""));
        assert_eq!(compose_embed(vec![], &blank, "https://e.x", MAX_IMAGES), None);
    }

    #[test]
    fn alt_text() {
        assert_eq!(alt_text_for("Release notes"), "Release notes");
        assert_eq!(alt_text_for("  "), DEFAULT_ALT_TEXT);
    }
}
