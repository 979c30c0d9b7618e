//! One parser per page section. Each takes its section's elements (or
//! None when the page lacks the section) and returns a raw record,
//! defaulting to empty. Malformed structure is logged and skipped,
//! never fatal.

pub mod controlled_access;
pub mod data_provider;
pub mod molecular_data;
pub mod publications;
pub mod release;
pub mod summary;

use scraper::ElementRef;

use crate::html;

/// All descendant tables across a section's elements, document order.
pub(crate) fn tables_in<'a>(els: &[ElementRef<'a>]) -> Vec<ElementRef<'a>> {
    els.iter().flat_map(|el| html::descendant_tables(*el)).collect()
}

/// True when a cell/paragraph carries nothing meaningful.
pub(crate) fn is_ignorable_text(s: &str) -> bool {
    crate::lookup::is_empty_marker(s)
}
