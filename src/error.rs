//! Error types for `bplus_index`.

/// Convenient `Result` alias for fallible operations of this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Failures reported to callers.
///
/// Only configuration can fail. Lookups of absent keys and inserts of duplicate keys are
/// ordinary outcomes (`None` / `false`), and broken tree invariants panic instead of surfacing
/// here.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The requested branching factor cannot keep nodes at least half full.
    #[error("invalid degree {degree}: a B+ tree needs a degree of at least {min}")]
    InvalidDegree {
        /// The rejected degree.
        degree: usize,
        /// The smallest accepted degree.
        min: usize,
    },
}
