//! Error types for the deferred notification scheduler.

/// Top-level error type for scheduling, cooldown and payload handling.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Invalid or missing trigger input (resume target, resume kind, delay).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cooldown attempted before anything was triggered in this process.
    #[error("no notification was triggered in this process; nothing to cool down")]
    NotTriggered,

    /// Identifier store, work queue or fire ledger read/write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Payload could not be serialized.
    #[error("payload encoding error: {0}")]
    Encoding(String),

    /// Payload text was malformed or missing required fields.
    #[error("payload decoding error: {0}")]
    Decoding(String),

    /// Scheduler backend rejected an enqueue or cancel request.
    #[error("scheduler backend error: {0}")]
    Backend(String),

    /// Config file load/save error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, NotifyError>;
