//! # manta-projections
//!
//! Software-maintained secondary projections: N alternately-keyed, fully
//! denormalized copies of a base table's rows, kept consistent because the
//! store's native secondary structures cannot express multi-column,
//! time-ordered or arbitrarily-clustered layouts.
//!
//! ## The consistency protocol
//!
//! A minimal *control record* per base row (base key columns plus the
//! tracked non-key columns that appear in any projection's key) is the
//! durable record of where that row is currently projected. Every change
//! runs:
//!
//! ```text
//! read control record
//!     ↓ (happens-before)
//! delete the row at its OLD coordinates from every projection   (fan-out)
//!     ↓ (happens-before)
//! overwrite the control record with the new tracked values
//!     ↓
//! upsert the row at its NEW coordinates into every projection   (fan-out)
//! ```
//!
//! Cleanup-before-rewrite is mandatory: a projection's key can include
//! columns whose values are changing, and without deleting at the old
//! coordinates first the row would be duplicated rather than moved.
//!
//! Fan-outs are fail-fast: the first failing projection task cancels its
//! in-flight siblings. Tasks that already committed are not compensated;
//! the error names the stage and projection so partial completion can be
//! diagnosed, and the next change for the same key converges the
//! projections again.
//!
//! Two concurrent calls for the same base key can interleave their
//! read/fan-out/write phases; serialize per key externally if that matters.

pub mod error;
pub mod manager;
pub mod spec;

pub use error::{FanOutStage, ProjectionError};
pub use manager::{ProjectionManager, ProjectionManagerConfig};
pub use spec::ProjectionSpecification;

/// Suffix appended to the base table's name for the control table, unless
/// the configuration overrides it.
pub const DEFAULT_CONTROL_TABLE_SUFFIX: &str = "_ctrl";
