//! Runtime error types.

use thiserror::Error;

use weaver_core::TransportError;

use crate::config::ConfigError;

/// Errors surfaced by the runtime layer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Invalid or unloadable configuration. Fatal to startup.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport error escaping a helper call.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
