//! Client-side list view: parameters, the filter/sort/paginate transform and
//! page-scoped selection.

pub mod params;
pub mod selection;
pub mod transform;

pub use params::{ViewParams, ALL};
pub use selection::Selection;
pub use transform::{apply, locale_compare, Page};
