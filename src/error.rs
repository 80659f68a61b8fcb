use thiserror::Error;

/// Errors surfaced by the planning core. Malformed numeric input is never one
/// of them: it is coerced to zero at the edit site.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("line index {index} out of range (have {len} lines)")]
    InvalidLine { index: usize, len: usize },
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("scenario {0} is not declared by this store")]
    UndeclaredScenario(String),
    #[error("no saved version with id {0}")]
    UnknownVersion(u64),
    #[error("import record {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },
}

pub type PlanResult<T> = Result<T, PlanError>;
