//! On-wiki mapping lists.
//!
//! Batches map free-text metadata values (people, keywords, places) to wiki
//! entities via template based list pages. These are scraped to local JSON
//! mirrors, merged with newly encountered values and rendered back to
//! wikitext for another round of manual mapping.

mod entry;
mod list;
mod merge;

pub use entry::MappingEntry;
pub use list::{MappingError, MappingList, MappingListOptions};
pub use merge::{make_entry, merge_mapping_tables, merge_mappings, Counter};
