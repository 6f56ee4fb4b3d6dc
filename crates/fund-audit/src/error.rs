use std::io;

/// Errors produced by audit sinks.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// I/O error while appending to or reading a file sink.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The sink is not accepting events.
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("audit sink lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the audit crate.
pub type Result<T> = std::result::Result<T, AuditError>;
