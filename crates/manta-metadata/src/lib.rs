//! # manta-metadata
//!
//! Schema model for manta: immutable descriptions of tables, views and their
//! key layouts. Managers are constructed from these specifications and fail
//! fast when a specification is inconsistent.
//!
//! ## Model
//!
//! ```text
//! TableSpecification ── Columns (name, CQL type, key flags)
//!         │             Partitioning (ordered)
//!         │             Clustering (ordered, per-column descending)
//!         │             Indexes (index name -> column name)
//!         │
//! ViewSpecification ─── base table + its own key layout
//! ```
//!
//! Specifications are plain serde-able values. How they are produced (by
//! hand, by a macro, by code generation) is outside this crate's concern.

pub mod column;
pub mod error;
pub mod keys;
pub mod table;
pub mod view;

pub use column::ColumnSpecification;
pub use error::MetadataError;
pub use keys::{
    ClusteringColumn, ClusteringColumnLookup, PartitioningColumn, PartitioningColumnLookup,
};
pub use table::TableSpecification;
pub use view::ViewSpecification;

/// Result alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Checks a table/view/column identifier: non-empty, ASCII alphanumeric or
/// underscore, not starting with a digit.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let cleaned = name.trim();
    if cleaned.is_empty() {
        return false;
    }
    let mut chars = cleaned.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("orders"));
        assert!(is_valid_name("orders_by_region"));
        assert!(is_valid_name("_internal"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("  "));
        assert!(!is_valid_name("9lives"));
        assert!(!is_valid_name("bad-name"));
        assert!(!is_valid_name("drop table"));
    }
}
