use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

/// Internal failure reasons for the evaluator and in-process storage.
///
/// None of these ever reach a caller of [`crate::evaluator::Evaluator::evaluate`]
/// — per the propagation policy, every failure path here resolves to the
/// `"control"` / `"exception"` sentinel before it leaves the evaluator.
#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum EvalReason {
    #[error("matcher regex did not compile")]
    RegexCompile,
    #[error("attribute value could not be coerced to the type the matcher expects")]
    Coercion,
    #[error("storage access failed during evaluation")]
    StoreUnavailable,
    #[error("dependency matcher cycle detected")]
    DependencyCycle,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for EvalReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::RegexCompile => 1001,
            Self::Coercion => 1002,
            Self::StoreUnavailable => 1003,
            Self::DependencyCycle => 1004,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type EvalError = StructError<EvalReason>;
pub type EvalResult<T> = Result<T, EvalError>;
