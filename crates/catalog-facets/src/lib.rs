//! catalog-facets
//!
//! Turns raw facet distributions into stable, labelled option lists. See
//! `resolution` for the label/code mapping rebuilt on every response, `merge`
//! for folding new counts into the previously shown list, and `panel` for the
//! per-dimension state that combines both.
pub mod merge;
pub mod normalize;
pub mod panel;
pub mod resolution;

pub use merge::merge_with_memory;
pub use normalize::normalize_label;
pub use panel::{FacetPanel, SelectionFix};
pub use resolution::ResolutionEntry;
