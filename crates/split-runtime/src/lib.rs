//! Synchronization loop, transport interfaces, and remote storage backend
//! that feed [`split_core`]'s evaluator: the periodic task runner, the
//! concrete sync task bodies, the client-facing evaluation surface, and
//! the factory that wires configuration into a running SDK instance.

#[macro_use]
mod log_macros;

pub mod client;
pub mod error;
pub mod factory;
pub mod manager;
pub mod periodic;
pub mod remote;
pub mod sync;
pub mod tracing_init;
pub mod transport;

pub use client::SplitClient;
pub use factory::SplitFactory;
pub use manager::{SplitManager, SplitView};
pub use periodic::PeriodicTask;
