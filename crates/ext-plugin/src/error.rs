//! Error type plugins return to the host.

/// Result type for plugin callbacks.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Failure reported by a plugin callback.
///
/// The host logs these and carries on with the next plugin.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("missing configuration value '{key}'")]
    MissingConfiguration { key: String },

    #[error("invalid configuration value '{key}': {message}")]
    InvalidConfiguration { key: String, message: String },

    #[error("{0}")]
    Message(String),
}

impl PluginError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
