//! Error taxonomy shared by every public operation.

use thiserror::Error;

/// Errors raised while obtaining proving or verification material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// The material could not be obtained right now; the resolver retries these.
    #[error("artifacts for depth {depth} unavailable: {reason}")]
    Unavailable { depth: usize, reason: String },
    /// No circuit exists for the requested depth.
    #[error("no artifacts exist for tree depth {0}")]
    UnsupportedDepth(usize),
    /// Key generation for the depth's circuit failed.
    #[error("key generation failed for depth {depth}: {reason}")]
    Keygen { depth: usize, reason: String },
}

impl ArtifactError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ArtifactError::Unavailable { .. })
    }
}

#[derive(Error, Debug)]
pub enum SemaphoreError {
    /// A missing, mistyped or out-of-range argument, or a malformed proof shape.
    #[error("validation error: {0}")]
    Validation(String),
    /// A commitment that was looked up is not a member of the group.
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// A group index outside `0..size`.
    #[error("index {index} is out of range for a group of {size} members")]
    Range { index: usize, size: usize },
    /// The proving engine rejected the witness or its task died.
    #[error("prover error: {0}")]
    Prover(String),
}

impl SemaphoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        SemaphoreError::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SemaphoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        let transient = ArtifactError::Unavailable {
            depth: 3,
            reason: "disk busy".into(),
        };
        assert!(transient.is_transient());
        assert!(!ArtifactError::UnsupportedDepth(40).is_transient());
    }

    #[test]
    fn test_range_error_message() {
        let err = SemaphoreError::Range { index: 7, size: 3 };
        assert_eq!(
            err.to_string(),
            "index 7 is out of range for a group of 3 members"
        );
    }
}
