use thiserror::Error;

/// Errors surfaced by the partitioning core.
///
/// Invariant violations (bitset capacity mismatches, item ids out of range outside the solution
/// validation path) are programmer errors and panic instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A cost-model fit was requested on an empty sample set.
    #[error("cannot fit a cost model from an empty sample set")]
    InsufficientData,

    /// Every request is empty, or the total request weight is zero or non-finite.
    #[error("demand is degenerate: total request weight is {0}")]
    DegenerateDemand(f64),

    /// A solution failed validation against its instance.
    #[error("invalid solution: {0}")]
    InvalidSolution(String),

    /// The external subsetting capability failed.
    #[error(transparent)]
    Subset(#[from] anyhow::Error),
}
