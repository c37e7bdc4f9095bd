//! Error types for network reconciliation.

use thiserror::Error;

/// Errors raised by network construction, reconciliation, blending, and
/// evaluation.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// All variants are raised at the point of detection and never retried:
/// reconciliation is a deterministic transformation, so retrying with the
/// same inputs cannot succeed. Recoverable situations (for example a node
/// that already exists in the target) are modeled as status values on the
/// operations themselves, not as errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The network's structure is invalid for the requested operation.
    ///
    /// Covers a missing or duplicated Decision/Utility node, duplicate node
    /// names, arcs referencing unknown endpoints, self-loops, and arc
    /// additions that would create a directed cycle.
    #[error("structural error: {0}")]
    Structural(String),

    /// A named variable, parent, label, or preference criterion was not
    /// found where no default is defined.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// A table is inconsistent with the structure it is attached to.
    ///
    /// Covers CPT rows that fail to normalize, and shape mismatches when a
    /// table is copied between networks whose parent domains differ.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// An operation was invoked before its preconditions were established,
    /// such as evaluating a network with empty CPTs or transferring a
    /// preference before the structural transfer of its variable.
    #[error("precondition error: {0}")]
    Precondition(String),
}
