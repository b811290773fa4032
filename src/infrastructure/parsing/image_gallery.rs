//! Image-only fallback for detail content that cleans down to nothing.

use std::collections::HashSet;
use tracing::debug;

use super::content_sanitizer::{is_blocked_image, is_branding_image, replace_gray_line};
use super::content_tree::{self, ContentElement, ContentNode};

const GALLERY_IMAGE_STYLE: &str = "display:block;margin:0 auto 10px auto;";

/// Rebuilds `raw_html` as a single `<div>` of its allowed images, in
/// first-seen order and de-duplicated by URL. `None` when no image survives.
pub fn build_image_gallery(raw_html: &str, product_code: &str) -> Option<String> {
    if raw_html.trim().is_empty() {
        debug!("[CONTENT][{}] gallery fallback received empty html", product_code);
        return None;
    }

    let nodes = content_tree::parse_fragment(raw_html);
    let mut seen = HashSet::new();
    let mut container = ContentElement::new("div");

    for img in content_tree::elements(&nodes).into_iter().filter(|el| el.is("img")) {
        let src = img
            .attr("data-src")
            .or_else(|| img.attr("src"))
            .unwrap_or_default()
            .trim();
        if src.is_empty() {
            continue;
        }
        let src = replace_gray_line(src);
        if is_blocked_image(src) || is_branding_image(src) || !seen.insert(src.to_string()) {
            continue;
        }
        container.children.push(ContentNode::Element(
            ContentElement::new("img")
                .with_attr("src", src)
                .with_attr("style", GALLERY_IMAGE_STYLE),
        ));
    }

    if container.children.is_empty() {
        debug!("[CONTENT][{}] gallery fallback found no images", product_code);
        return None;
    }
    debug!(
        "[CONTENT][{}] gallery fallback kept {} images",
        product_code,
        container.children.len()
    );
    Some(content_tree::serialize(&[ContentNode::Element(container)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::content_sanitizer::{BLOCKED_IMAGE_PREFIXES, BRANDING_TOP};

    #[test]
    fn duplicates_collapse_in_first_seen_order() {
        let raw = r#"
            <div><img src="https://shop-phinf.pstatic.net/a.jpg"></div>
            <img data-src="https://shop-phinf.pstatic.net/b.jpg" src="">
            <img src="https://shop-phinf.pstatic.net/a.jpg">
        "#;
        let gallery = build_image_gallery(raw, "1").unwrap();
        assert_eq!(gallery.matches("<img").count(), 2);
        let a = gallery.find("a.jpg").unwrap();
        let b = gallery.find("b.jpg").unwrap();
        assert!(a < b);
        assert!(gallery.starts_with("<div><img src="));
        assert!(gallery.contains(GALLERY_IMAGE_STYLE));
    }

    #[test]
    fn blocked_and_branding_images_are_skipped() {
        let raw = format!(
            r#"<img src="{}/x.png"><img src="{}"><img src="  ">"#,
            BLOCKED_IMAGE_PREFIXES[1], BRANDING_TOP
        );
        assert!(build_image_gallery(&raw, "1").is_none());
        assert!(build_image_gallery("   ", "1").is_none());
    }

    #[test]
    fn gray_line_is_swapped_not_dropped() {
        let raw = r#"<img src="https://rapid-up.s3.ap-northeast-2.amazonaws.com/dev/gray-line.png">"#;
        let gallery = build_image_gallery(raw, "1").unwrap();
        assert!(gallery.contains("oraclecloud.com/bucket-20230610-0005/upload/gray-line.png"));
        assert!(!gallery.contains("rapid-up"));
    }
}
