//! Properties of the detail content sanitizer over generated markup
use proptest::prelude::*;
use smartstore_relister_lib::infrastructure::parsing::content_sanitizer::{
    BLOCKED_IMAGE_PREFIXES, BRANDING_BOTTOM, BRANDING_TOP,
};
use smartstore_relister_lib::infrastructure::parsing::{
    ContentSanitizer, SanitizeOutcome, sanitize_content,
};

fn words() -> impl Strategy<Value = String> {
    "[가나다라마바사아자차카타파하]{1,12}"
}

proptest! {
    #[test]
    fn blocked_images_never_survive(
        text in words(),
        prefix in prop::sample::select(BLOCKED_IMAGE_PREFIXES.to_vec()),
        name in "[a-z]{1,8}",
    ) {
        let raw = format!(r#"<p>{text}</p><img src="{prefix}/{name}.png">"#);
        let html = sanitize_content(&raw).unwrap();
        prop_assert!(!html.contains(prefix));
        prop_assert!(html.contains(&text));
    }

    #[test]
    fn sanitizing_twice_changes_nothing(
        paragraphs in prop::collection::vec(words(), 1..4),
        image in "[a-z0-9]{1,10}",
    ) {
        let body: String = paragraphs.iter().map(|p| format!("<p class=\"se-text\">{p}</p>")).collect();
        let raw = format!(
            r#"<div class="se-main-container">{body}<img data-src="https://shop-phinf.pstatic.net/{image}.jpg"></div>"#
        );
        let once = sanitize_content(&raw).unwrap();
        let twice = sanitize_content(&once).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(twice.matches(BRANDING_TOP).count(), 1);
        prop_assert_eq!(twice.matches(BRANDING_BOTTOM).count(), 1);
    }
}

#[test]
fn placeholder_and_empty_content_yield_no_html() {
    let sanitizer = ContentSanitizer::new();
    assert_eq!(sanitizer.sanitize("<p>계속됩니다.</p>", "1"), SanitizeOutcome::Placeholder);
    assert_eq!(sanitizer.sanitize("<script>x()</script>", "1"), SanitizeOutcome::Empty);
    assert!(SanitizeOutcome::Empty.html().is_none());
}
