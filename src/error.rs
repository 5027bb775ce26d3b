use thiserror::Error;

/// Errors raised by the sampling core. None of them is fatal: callers log
/// and keep going with whatever state they already hold.
#[derive(Debug, Error)]
pub enum NetError {
    /// The selected interface is no longer reported by the OS.
    #[error("adapter '{0}' is not available")]
    AdapterUnavailable(String),

    /// The OS counter read itself failed.
    #[error("counter read failed: {0}")]
    CounterRead(String),

    #[error("failed to read {path}: {reason}")]
    PersistenceRead { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    PersistenceWrite { path: String, reason: String },

    /// A setting was out of range or not a number; the previous value stays.
    #[error("invalid {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        NetError::InvalidConfig {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NetError>;
