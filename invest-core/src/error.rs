//! Error taxonomy for the decision-network engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using the engine error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine errors.
///
/// Structural and normalization errors stop a build or a learning run. An
/// evidence error stops one inference call; the pipeline skips that record.
/// The remaining variants are non-fatal and are normally carried as markers
/// ([`LearningDataError`], [`InferenceNonConvergence`]) rather than returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Invalid topology: cycle, self-loop, duplicate arc, unknown node, arc out of a utility node
    #[error("Structural error: {0}")]
    Structural(String),

    /// CPT or utility table with the wrong shape, non-finite entries, or rows not summing to 1
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Unknown node or label, evidence on the target decision, impossible evidence
    #[error("Evidence error: {0}")]
    Evidence(String),

    /// Nothing usable in an observation table
    #[error("Learning data error: {0}")]
    LearningData(String),

    /// EM hit its iteration cap
    #[error("{0}")]
    NonConvergence(InferenceNonConvergence),
}

impl Error {
    /// Whether the error aborts the operation that raised it.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Structural(_) | Self::Normalization(_) | Self::Evidence(_)
        )
    }

    /// Check if this is an evidence error.
    pub const fn is_evidence(&self) -> bool {
        matches!(self, Self::Evidence(_))
    }

    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub(crate) fn normalization(msg: impl Into<String>) -> Self {
        Self::Normalization(msg.into())
    }

    pub(crate) fn evidence(msg: impl Into<String>) -> Self {
        Self::Evidence(msg.into())
    }
}

/// Why a learning run produced no estimate. The caller keeps its prior CPTs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct LearningDataError {
    pub reason: String,
}

impl LearningDataError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<LearningDataError> for Error {
    fn from(e: LearningDataError) -> Self {
        Self::LearningData(e.reason)
    }
}

/// Attached to a learned CPT set when EM stopped at its iteration cap.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error(
    "EM did not converge after {iterations} iterations (last log-likelihood change {last_delta:.3e})"
)]
pub struct InferenceNonConvergence {
    /// Iterations run
    pub iterations: usize,
    /// Absolute log-likelihood change in the final iteration
    pub last_delta: f64,
    /// Log-likelihood of the returned estimate
    pub best_log_likelihood: f64,
}

impl From<InferenceNonConvergence> for Error {
    fn from(e: InferenceNonConvergence) -> Self {
        Self::NonConvergence(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(Error::structural("cycle").is_fatal());
        assert!(Error::normalization("row").is_fatal());
        assert!(Error::evidence("label").is_fatal());
        assert!(!Error::from(LearningDataError::new("empty")).is_fatal());

        let marker = InferenceNonConvergence {
            iterations: 100,
            last_delta: 0.01,
            best_log_likelihood: -12.0,
        };
        let err = Error::from(marker);
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("100 iterations"));
    }

    #[test]
    fn test_is_evidence() {
        assert!(Error::evidence("x").is_evidence());
        assert!(!Error::structural("x").is_evidence());
    }
}
