use thiserror::Error;

/// Error types for diagnosis sessions
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Error when initializing the recorder
    #[error("Failed to initialize recorder: {0}")]
    InitializationError(String),

    /// The system-wide mouse hook could not be installed
    #[error("Failed to install mouse hook: {0}")]
    HookInstall(String),

    /// Error while a session was running
    #[error("Failed to record session: {0}")]
    RecordingError(String),

    /// A session is already running
    #[error("A diagnosis session is already running")]
    AlreadyRecording,

    /// No session is running
    #[error("No diagnosis session is running")]
    NotRecording,

    /// Error from the session log
    #[error("Session log error: {0}")]
    LogError(String),

    /// Error when loading or saving settings
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// Error when writing CSV
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error when serializing or deserializing JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;
