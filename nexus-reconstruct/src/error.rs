use thiserror::Error;

/// Per-core, session-terminating errors: on any of these the
/// core transitions to `RetirementState::Error` and stops emitting, while
/// other cores continue unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ReconstructError {
    #[error("instruction oracle error: {0}")]
    Oracle(#[from] nexus_oracle::OracleError),

    #[error("count-tracking error: {0}")]
    Core(#[from] nexus_core::CoreError),

    #[error("impossible state transition: {0}")]
    ImpossibleTransition(&'static str),
}

pub type Result<T> = std::result::Result<T, ReconstructError>;
