//! catalog-results
//!
//! Result views derived from one search response: hits grouped by parent work
//! with bounded lazy expansion (`grouping`) and the page-number window
//! (`pagination`).
pub mod grouping;
pub mod pagination;

pub use grouping::{group_hits, ExpandAction, ExpansionState, Overflow, ResultsView, WorkGroup};
pub use pagination::{page_window, PageItem};
