//! Detail content sanitizer
//!
//! Turns the raw inner HTML of a product's detail container into the markup
//! stored in the content column. The steps run in a fixed order: later steps
//! rely on attributes and wrappers normalized by earlier ones.

use tracing::debug;

use super::content_tree::{self, ContentElement, ContentNode, Edit};
use super::image_gallery::build_image_gallery;
use crate::domain::product::{ContentFragment, ContentSource};

pub const CONTENT_STYLESHEET: &str =
    "https://static-resource-smartstore.pstatic.net/smartstore/p/static/20230630180923/common.css";

pub const BRANDING_TOP: &str =
    "https://axh2eqadoldy.compat.objectstorage.ap-chuncheon-1.oraclecloud.com/bucket-20230610-0005/upload/top.png";
pub const BRANDING_BOTTOM: &str =
    "https://axh2eqadoldy.compat.objectstorage.ap-chuncheon-1.oraclecloud.com/bucket-20230610-0005/upload/bottom.png";
pub const BRANDING_CLOUD: &str =
    "https://coudae.s3.ap-northeast-2.amazonaws.com/A00412936/cloud/7290.png";
pub const BRANDING_IMAGES: [&str; 3] = [BRANDING_TOP, BRANDING_BOTTOM, BRANDING_CLOUD];

const GRAY_LINE_LEGACY: &str = "https://rapid-up.s3.ap-northeast-2.amazonaws.com/dev/gray-line.png";
const GRAY_LINE: &str =
    "https://axh2eqadoldy.compat.objectstorage.ap-chuncheon-1.oraclecloud.com/bucket-20230610-0005/upload/gray-line.png";

pub const BLOCKED_IMAGE_PREFIXES: [&str; 3] = [
    "https://rapid-up.s3.ap-northeast-2.amazonaws.com",
    "https://cdn.heyseller.kr",
    "https://ai.esmplus.com/",
];

const JUNK_INLINE_CSS: &str = "* {text-align: center;}  #mycontents11 img{max-width: 100%;}";

const PLACEHOLDER_TEXTS: [&str; 4] = ["계속됩니다", "계속됩니다.", "계속됩니다..", "계속됩니다..."];

const DISALLOWED_ATTRIBUTES: [&str; 6] = [
    "area-hidden",
    "data-linkdata",
    "data-linktype",
    "onclick",
    "style",
    "class",
];

const PLAYER_UI_KEYWORDS: [&str; 14] = [
    "광고 후 계속됩니다",
    "다음 동영상",
    "subject",
    "author",
    "재생 속도",
    "해상도",
    "자막",
    "옵션",
    "도움말",
    "죄송합니다. 문제가 발생했습니다",
    "고화질 재생이 가능한 영상입니다",
    "더 알아보기",
    "00:00",
    "0:00",
];

/// Player overlay classes removed with their subtree
const PLAYER_OVERLAY_CLASSES: [&str; 7] = [
    "pzp-ui-dimmed",
    "pzp-upnext-endscreen",
    "pzp-ui-playlist",
    "pzp-double-tap-overlay",
    "pzp-ad-break-indicator",
    "pzp-pc__poster",
    "pzp-ui-circle-process",
];

/// Editor wrappers whose children are kept
const WRAPPER_CLASSES: [&str; 14] = [
    "se-main-container",
    "editor_wrap",
    "se-viewer",
    "uOXg8u0yzs",
    "LXGzUhHJC2",
    "EtTm8LLHdw",
    "Uea3oKmnaJ",
    "se-component",
    "se-component-content",
    "se-section",
    "se-module",
    "se-section-video",
    "se-module-video",
    "pzp-pc__video",
];

const NON_CONTENT_TAGS: [&str; 4] = ["style", "script", "svg", "canvas"];
const TEXT_TAGS: [&str; 5] = ["p", "div", "span", "li", "a"];

const IMAGE_STYLE: &str = "display: block; margin-left: auto; margin-right: auto; margin-bottom: 10px;";
const HEADING_STYLE: &str = "text-align: center; font-size: 30px; margin-bottom: 20px;";
const TEXT_STYLE: &str = "text-align: center; font-size: 18px; margin-bottom: 30px;";
const BRANDING_STYLE: &str = "display: block; margin-left: auto; margin-right: auto;";
const VIDEO_STYLE: &str = "display:block;margin:0 auto 20px auto;max-width:100%;";

pub fn is_blocked_image(src: &str) -> bool {
    BLOCKED_IMAGE_PREFIXES
        .iter()
        .any(|prefix| src.starts_with(prefix))
}

pub fn is_branding_image(src: &str) -> bool {
    BRANDING_IMAGES.contains(&src)
}

/// Swaps the retired gray separator for its mirror
pub fn replace_gray_line(src: &str) -> &str {
    if src == GRAY_LINE_LEGACY {
        GRAY_LINE
    } else {
        src
    }
}

fn is_blob(value: &str) -> bool {
    value.contains("blob:")
}

/// Wraps a fragment into a standalone UTF-8 document
pub fn wrap_document(body: &str) -> String {
    if body.is_empty() {
        return String::new();
    }
    format!(
        "<!DOCTYPE html><html lang=\"ko\"><head><meta charset=\"utf-8\">\
         <style>body{{margin:0;padding:0;background:#fff;}}</style></head><body>{body}</body></html>"
    )
}

/// Result of one sanitizer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeOutcome {
    Cleaned(String),
    /// Cleanup left nothing, images were rebuilt from the raw markup
    Gallery(String),
    /// The fragment only said the content continues elsewhere
    Placeholder,
    /// Neither cleanup nor the gallery produced anything
    Empty,
}

impl SanitizeOutcome {
    pub fn html(&self) -> Option<&str> {
        match self {
            Self::Cleaned(html) | Self::Gallery(html) => Some(html),
            Self::Placeholder | Self::Empty => None,
        }
    }

    pub fn into_fragment(self) -> Option<ContentFragment> {
        match self {
            Self::Cleaned(html) => Some(ContentFragment {
                html,
                source: ContentSource::Cleaned,
            }),
            Self::Gallery(html) => Some(ContentFragment {
                html,
                source: ContentSource::FallbackGallery,
            }),
            Self::Placeholder | Self::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSanitizer {
    wrap_document: bool,
}

impl ContentSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit full documents instead of fragments
    pub fn with_document_wrap(mut self, enabled: bool) -> Self {
        self.wrap_document = enabled;
        self
    }

    pub fn sanitize(&self, raw_html: &str, product_code: &str) -> SanitizeOutcome {
        let mut nodes = content_tree::parse_fragment(raw_html);

        promote_lazy_images(&mut nodes);

        if is_placeholder(&nodes) {
            debug!("[CONTENT][{}] placeholder text only, skipping", product_code);
            return SanitizeOutcome::Placeholder;
        }

        inject_stylesheet(&mut nodes);
        content_tree::remove_elements(&mut nodes, |el| el.is("button"));
        content_tree::for_each_element(&mut nodes, &mut |el| {
            if el.is("img") {
                if let Some(src) = el.attr("src").filter(|s| *s == GRAY_LINE_LEGACY) {
                    let replaced = replace_gray_line(src).to_string();
                    el.set_attr("src", &replaced);
                }
            }
        });
        remove_junk_css(&mut nodes, product_code);
        strip_disallowed_attributes(&mut nodes);
        restore_linked_images(&mut nodes);
        let blocked = content_tree::remove_elements(&mut nodes, |el| {
            el.is("img") && el.attr("src").is_some_and(is_blocked_image)
        });
        if blocked > 0 {
            debug!("[CONTENT][{}] removed {} blocked images", product_code, blocked);
        }
        strip_player_media(&mut nodes, product_code);
        cleanup_structure(&mut nodes);
        normalize_bare_videos(&mut nodes);
        apply_presentation_styles(&mut nodes);
        insert_branding(&mut nodes);

        let has_text = !content_tree::text_of(&nodes).trim().is_empty();
        // a lone video is not enough to keep the cleaned fragment
        let has_image = content_tree::elements(&nodes).iter().any(|el| {
            el.is("img")
                && el
                    .attr("src")
                    .map(str::trim)
                    .is_some_and(|src| !src.is_empty() && !is_branding_image(src))
        });

        if !has_text && !has_image {
            debug!("[CONTENT][{}] empty after cleanup, trying gallery fallback", product_code);
            return match build_image_gallery(raw_html, product_code) {
                Some(gallery) => SanitizeOutcome::Gallery(self.finish(gallery)),
                None => SanitizeOutcome::Empty,
            };
        }

        let cleaned = content_tree::serialize(&nodes).trim().to_string();
        SanitizeOutcome::Cleaned(self.finish(cleaned))
    }

    fn finish(&self, html: String) -> String {
        if self.wrap_document {
            wrap_document(&html)
        } else {
            html
        }
    }
}

/// Sanitized fragment with default settings, `None` when nothing usable remains
pub fn sanitize_content(raw_html: &str) -> Option<String> {
    ContentSanitizer::new()
        .sanitize(raw_html, "-")
        .html()
        .map(str::to_string)
}

fn promote_lazy_images(nodes: &mut [ContentNode]) {
    content_tree::for_each_element(nodes, &mut |el| {
        if el.is("img") {
            if let Some(data_src) = el.remove_attr("data-src") {
                el.set_attr("src", &data_src);
            }
        }
    });
}

fn is_placeholder(nodes: &[ContentNode]) -> bool {
    let text: String = content_tree::text_of(nodes)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    PLACEHOLDER_TEXTS.contains(&text.as_str())
}

/// Puts the storefront stylesheet in a leading `<head>`, replacing any copy
/// left by an earlier run.
fn inject_stylesheet(nodes: &mut Vec<ContentNode>) {
    content_tree::remove_elements(nodes, |el| {
        (el.is("link") && el.attr("href") == Some(CONTENT_STYLESHEET))
            || (el.is("head") && el.children.is_empty())
    });
    let mut head = ContentElement::new("head");
    head.children.push(ContentNode::Element(
        ContentElement::new("link")
            .with_attr("rel", "stylesheet")
            .with_attr("href", CONTENT_STYLESHEET),
    ));
    nodes.insert(0, ContentNode::Element(head));
}

fn remove_junk_css(nodes: &mut [ContentNode], product_code: &str) {
    let mut removed = false;
    content_tree::for_each_text(nodes, &mut |text| {
        if text.contains(JUNK_INLINE_CSS) {
            *text = text.replace(JUNK_INLINE_CSS, "");
            removed = true;
        }
    });
    if removed {
        debug!("[CONTENT][{}] removed inline text-align styles", product_code);
    }
}

fn strip_disallowed_attributes(nodes: &mut [ContentNode]) {
    content_tree::for_each_element(nodes, &mut |el| {
        for attr in DISALLOWED_ATTRIBUTES {
            el.strip_attr(attr);
        }
    });
}

/// Tracked image links: make sure the wrapped image kept a source
fn restore_linked_images(nodes: &mut [ContentNode]) {
    content_tree::for_each_element(nodes, &mut |el| {
        if !el.is("a") || el.original_attr("data-linkdata").is_none() {
            return;
        }
        if let Some(img) = el.find_mut("img") {
            let data_src = img.remove_attr("data-src");
            if img.attr("src").unwrap_or_default().is_empty() {
                img.set_attr("src", data_src.as_deref().unwrap_or_default());
            }
        }
    });
}

fn canonical_video(src: &str) -> ContentNode {
    ContentNode::Element(
        ContentElement::new("video")
            .with_attr("src", src)
            .with_attr("controls", "controls")
            .with_attr("autoplay", "autoplay")
            .with_attr("muted", "muted")
            .with_attr("loop", "loop")
            .with_attr("style", VIDEO_STYLE),
    )
}

/// First durable source among the element's own videos
fn playable_source(el: &ContentElement) -> Option<String> {
    let own = std::iter::once(el).filter(|e| e.is("video"));
    let nested = el.descendants().into_iter().filter(|e| e.is("video"));
    own.chain(nested).find_map(|video| {
        let direct = [video.attr("src"), video.attr("data-src")];
        let sources = video
            .descendants()
            .into_iter()
            .filter(|e| e.is("source"))
            .map(|s| s.attr("src"));
        direct
            .into_iter()
            .chain(sources)
            .flatten()
            .find(|src| !src.is_empty() && !src.starts_with("blob:"))
            .map(str::to_string)
    })
}

fn is_player_chrome(el: &ContentElement) -> bool {
    let class = el.original_attr("class").unwrap_or_default();
    el.has_class("prismplayer-area")
        || el.has_class("pzp")
        || ["pzp-", "pzp_", "pzp ", "webplayer", "player-area"]
            .iter()
            .any(|needle| class.contains(needle))
}

fn holds_player_keyword(el: &ContentElement) -> bool {
    el.children.iter().any(|child| match child {
        ContentNode::Text(text) => {
            let text = text.trim();
            !text.is_empty() && PLAYER_UI_KEYWORDS.iter().any(|k| text.contains(k))
        }
        ContentNode::Element(_) => false,
    })
}

fn strip_player_media(nodes: &mut Vec<ContentNode>, product_code: &str) {
    let mut simplified = 0;
    let mut removed = 0;

    content_tree::rewrite(nodes, &mut |el| {
        if !(el.has_class("se-component") && el.has_class("se-video")) {
            return Edit::Keep;
        }
        match playable_source(el) {
            Some(src) => {
                simplified += 1;
                Edit::Replace(canonical_video(&src))
            }
            None => {
                removed += 1;
                Edit::Remove
            }
        }
    });

    removed += content_tree::remove_elements(nodes, |el| {
        matches!(el.name.as_str(), "video" | "source" | "iframe" | "canvas")
            && ["src", "data-src", "poster"]
                .iter()
                .filter_map(|attr| el.attr(attr))
                .any(is_blob)
    });
    removed += content_tree::remove_elements(nodes, is_player_chrome);
    removed += content_tree::remove_elements(nodes, holds_player_keyword);

    if removed > 0 || simplified > 0 {
        debug!(
            "[CONTENT][{}] removed {} blob media blocks, simplified {} playable videos",
            product_code, removed, simplified
        );
    }
}

fn is_wrapper(el: &ContentElement) -> bool {
    WRAPPER_CLASSES.iter().any(|class| el.has_class(class))
        || el
            .attr("aria-label")
            .is_some_and(|label| label.contains("비디오") || label.contains("동영상"))
        || el.attr("id").is_some_and(|id| id.starts_with("wpc-"))
}

fn cleanup_structure(nodes: &mut Vec<ContentNode>) {
    content_tree::remove_elements(nodes, |el| {
        NON_CONTENT_TAGS.contains(&el.name.as_str())
            || PLAYER_OVERLAY_CLASSES.iter().any(|class| el.has_class(class))
    });
    content_tree::rewrite(nodes, &mut |el| {
        if is_wrapper(el) {
            Edit::Unwrap
        } else {
            Edit::Keep
        }
    });
}

/// Any remaining `<video>` becomes the canonical tag, or goes away
fn normalize_bare_videos(nodes: &mut Vec<ContentNode>) {
    content_tree::rewrite(nodes, &mut |el| {
        if !el.is("video") {
            return Edit::Keep;
        }
        match playable_source(el) {
            Some(src) => Edit::Replace(canonical_video(&src)),
            None => Edit::Remove,
        }
    });
}

fn apply_presentation_styles(nodes: &mut [ContentNode]) {
    content_tree::for_each_element(nodes, &mut |el| {
        let name = el.name.clone();
        match name.as_str() {
            "img" => el.set_attr("style", IMAGE_STYLE),
            "h1" => el.set_attr("style", HEADING_STYLE),
            tag if TEXT_TAGS.contains(&tag) => {
                let style = match el.attr("style").map(str::trim).filter(|s| !s.is_empty()) {
                    Some(existing) => format!("{existing}; {TEXT_STYLE}"),
                    None => TEXT_STYLE.to_string(),
                };
                el.set_attr("style", &style);
            }
            _ => {}
        }
    });
}

fn branding_image(src: &str) -> ContentNode {
    ContentNode::Element(
        ContentElement::new("img")
            .with_attr("src", src)
            .with_attr("style", BRANDING_STYLE),
    )
}

/// Top banner before the content, cloud and bottom banners after it
fn insert_branding(nodes: &mut Vec<ContentNode>) {
    content_tree::remove_elements(nodes, |el| {
        el.is("img")
            && el
                .attr("src")
                .map_or(true, |src| src.is_empty() || is_branding_image(src))
    });

    if nodes.is_empty() {
        return;
    }
    // the stylesheet head is the first child, the top banner precedes it
    nodes.insert(0, branding_image(BRANDING_TOP));
    nodes.push(branding_image(BRANDING_CLOUD));
    nodes.push(branding_image(BRANDING_BOTTOM));
}
