//! Error types for the PTM crate.

use thiserror::Error;

/// Main error type for PTM operations.
#[derive(Debug, Error, Clone, PartialEq)]
#[allow(missing_docs)] // Error variant fields are self-documenting via #[error] attribute
pub enum PtmError {
    /// Precondition: caller supplied more points than the library supports.
    #[error("too many input points: got {got}, max is {max}")]
    TooManyPoints { got: usize, max: usize },

    /// Precondition: the library has not been initialized for this thread.
    #[error("ptm handle is not initialized")]
    Uninitialized,

    /// Recoverable: the Voronoi orderer found fewer usable neighbours than a
    /// template requires.
    #[error("insufficient neighbours: have {have}, need {need}")]
    InsufficientNeighbours { have: usize, need: usize },

    /// Recoverable: a two-shell expansion (diamond/graphene) could not fill
    /// one of its shells.
    #[error("shell {shell} could not be filled")]
    ShellFailure { shell: u8 },

    /// Recoverable: the convex hull degenerated (coplanar/collinear input).
    #[error("convex hull is degenerate")]
    HullDegenerate,

    /// Numerical: the QCP Newton iteration did not converge within the
    /// iteration bound.
    #[error("QCP eigenvalue iteration did not converge")]
    NumericalNonConvergence,
}

/// Result type alias for PTM operations.
pub type Result<T> = std::result::Result<T, PtmError>;

impl PtmError {
    /// True for preconditions: these must propagate to the caller of
    /// `ptm_index` as a negative return code rather than being folded into
    /// a per-template "no match."
    pub fn is_precondition(&self) -> bool {
        matches!(self, PtmError::TooManyPoints { .. } | PtmError::Uninitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_variants_display() {
        let test_cases: Vec<(PtmError, &[&str])> = vec![
            (PtmError::TooManyPoints { got: 20, max: 18 }, &["20", "18", "many"]),
            (PtmError::Uninitialized, &["not", "initialized"]),
            (
                PtmError::InsufficientNeighbours { have: 3, need: 6 },
                &["3", "6", "insufficient"],
            ),
            (PtmError::ShellFailure { shell: 2 }, &["shell 2", "filled"]),
            (PtmError::HullDegenerate, &["hull", "degenerate"]),
            (PtmError::NumericalNonConvergence, &["converge"]),
        ];

        for (err, expected_substrings) in test_cases {
            let msg = err.to_string();
            for substring in expected_substrings {
                assert!(
                    msg.to_lowercase().contains(&substring.to_lowercase()),
                    "Error message '{msg}' should contain '{substring}'"
                );
            }
        }
    }

    #[test]
    fn test_is_precondition() {
        assert!(PtmError::TooManyPoints { got: 1, max: 0 }.is_precondition());
        assert!(PtmError::Uninitialized.is_precondition());
        assert!(!PtmError::HullDegenerate.is_precondition());
        assert!(!PtmError::InsufficientNeighbours { have: 0, need: 1 }.is_precondition());
        assert!(!PtmError::ShellFailure { shell: 1 }.is_precondition());
        assert!(!PtmError::NumericalNonConvergence.is_precondition());
    }
}
