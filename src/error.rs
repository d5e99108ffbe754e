use thiserror::Error;

/// Result type for Cable Guardian operations
pub type Result<T> = std::result::Result<T, GuardianError>;

/// Error reported by a native capability provider (VR runtime, process or
/// audio device enumeration)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (code {code})")]
pub struct RuntimeError {
    /// Provider-specific error code, 0 when the provider has none
    pub code: i32,
    /// Human-readable description from the provider
    pub message: String,
}

impl RuntimeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors that can occur when configuring or querying the guardian core
#[derive(Error, Debug)]
pub enum GuardianError {
    /// Native runtime call failed
    #[error("VR runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Operation needs a live runtime handle but the connection has none
    #[error("Not connected to the {0} runtime")]
    NotConnected(crate::types::VrApi),

    /// A configuration value is out of range
    #[error("Invalid {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// TOML configuration could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event source was dropped
    #[error("Event channel closed")]
    ChannelClosed,

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}
