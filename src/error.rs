use thiserror::Error;

/// Errors raised by the selection engine and the operations built on it.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// Malformed or contradictory input, such as a festive service without
    /// an occasion or a position outside the selection.
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// An explicit swap target that violates the slot rule or duplicates
    /// another entry of the same selection.
    #[error("Invalid replacement: {0}")]
    InvalidReplacement(String),

    /// A slot rule admits no hymn at all. The catalog data is incomplete.
    #[error("Catalog exhausted: {0}")]
    CatalogExhausted(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure reading from or writing to the history store.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SelectionError {
    /// Caller errors are surfaced for correction and never retried.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidConstraint(_) | Self::InvalidReplacement(_) | Self::NotFound(_)
        )
    }
}
