use thiserror::Error;

/// Errors produced by fallible internal steps (sidecar decoding, config
/// loading, CLI input handling).
#[derive(Error, Debug)]
pub enum MadrawError {
    /// A sidecar payload could not be decoded.
    #[error("malformed {channel} payload: {message}")]
    Sidecar {
        channel: &'static str,
        message: String,
    },

    /// A sidecar envelope declares a version this build cannot read.
    #[error("unsupported {channel} payload version {version}")]
    SidecarVersion { channel: &'static str, version: u64 },

    /// Configuration parsing or validation errors.
    #[error("invalid config: {0}")]
    Config(String),

    /// I/O operation errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Data conversion errors (JSON).
    #[error("{0}")]
    Convert(#[from] serde_json::Error),
}

/// Result type alias for madraw operations.
pub type Result<T> = std::result::Result<T, MadrawError>;
