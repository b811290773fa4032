//! Detail content parsing
//!
//! Selector tables for every storefront lookup plus the HTML rewriting used
//! on product detail content.

pub mod config;
pub mod content_sanitizer;
pub mod content_tree;
pub mod image_gallery;

// Re-export public types
pub use config::{
    PaginationSelectors, ProductDetailSelectors, ProductListSelectors, StorefrontSelectors,
};
pub use content_sanitizer::{sanitize_content, wrap_document, ContentSanitizer, SanitizeOutcome};
pub use image_gallery::build_image_gallery;
