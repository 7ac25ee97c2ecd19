use thiserror::Error;

/// Errors raised while loading graphs, computing signatures or building mappings.
#[derive(Debug, Error)]
pub enum AlignError {
    /// A deferred blank reference was not found in the node's rank table.
    #[error("blank neighbour {neighbour} of {node} has no rank in the signature table")]
    MissingRank { node: String, neighbour: String },

    /// A signature was required for a node that has none.
    #[error("no signature computed for {0}")]
    MissingSignature(String),

    /// The same node was mapped twice on one side.
    #[error("mapping is no longer injective: {a} -> {b}")]
    NotInjective { a: String, b: String },

    #[error("literal {0} cannot be the subject of a triple")]
    LiteralSubject(String),

    #[error("radius must be at least one hop")]
    InvalidRadius,

    #[error("invalid radius literal: {0}")]
    RadiusSyntax(String),

    /// A mapping was applied to a graph containing blank nodes it does not cover.
    #[error("no mapping for blank node {0}")]
    Unmapped(String),

    #[error("malformed triple batch: {0}")]
    Column(String),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),
}

impl AlignError {
    /// Faults that indicate a defect in signature or ordering computation.
    /// These must never be retried.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            AlignError::MissingRank { .. }
                | AlignError::MissingSignature(_)
                | AlignError::NotInjective { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AlignError>;
