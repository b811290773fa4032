//! Domain module - Core business logic and entities
//!
//! Pure value types and text heuristics. Nothing here touches the browser,
//! the file system or the clock, so every function is testable against
//! fixture strings.

pub mod heuristics;
pub mod pagination;
pub mod pricing;
pub mod product;

// Re-export commonly used items for convenience
pub use pagination::{
    ListSignature, NavigationOutcome, NavigationReport, PageGroup, PageNumber, plan_page_groups,
};
pub use product::{ContentFragment, ContentSource, ListingCard, OptionGroup, ProductRecord};
