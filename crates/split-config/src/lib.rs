//! The SDK configuration object and the logging configuration it carries.
//! Kept separate from `split-runtime` so the parsing and validation layer
//! has no `tracing`/`tokio` dependency of its own.

pub mod client_config;
pub mod logging;
pub mod remote;
pub mod validate;

pub use client_config::{ClientConfig, OperationMode};
pub use logging::{LogFormat, LoggingConfig};
pub use remote::{AdvancedConfig, RemoteConfig};
