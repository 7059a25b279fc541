use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};
use split_core::error::EvalReason;

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum SyncReason {
    #[error("transport error")]
    Transport,
    #[error("storage write error")]
    StoreWrite,
    #[error("bootstrap error")]
    Bootstrap,
    #[error("shutdown error")]
    Shutdown,
    #[error("{0}")]
    Core(EvalReason),
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for SyncReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::Transport => 2001,
            Self::StoreWrite => 2002,
            Self::Bootstrap => 2003,
            Self::Shutdown => 2004,
            Self::Core(c) => c.error_code(),
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type SyncError = StructError<SyncReason>;
pub type SyncResult<T> = Result<T, SyncError>;
