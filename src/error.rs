use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("wkhtmltoimage binary is not found or not executable: {}", .0.display())]
    BinaryNotExecutable(PathBuf),

    #[error("Failed to launch \"{command}\": {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("System error \"{message}\" when executing command \"{command}\". Try using the binary provided on http://wkhtmltopdf.org/downloads.html")]
    RendererError { message: String, command: String },

    #[error("wkhtmltoimage didn't return any data")]
    EmptyOutput,

    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl RenderError {
    /// Errors raised before a renderer process was ever started.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(
            self,
            RenderError::BinaryNotExecutable(_)
                | RenderError::UnsupportedFormat(_)
                | RenderError::ConfigurationError(_)
                | RenderError::SerializationError(_)
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::BinaryNotExecutable(_) => "binary_not_executable",
            RenderError::SpawnFailed { .. } => "spawn_failed",
            RenderError::RendererError { .. } => "renderer_error",
            RenderError::EmptyOutput => "empty_output",
            RenderError::Timeout(_) => "timeout",
            RenderError::UnsupportedFormat(_) => "unsupported_format",
            RenderError::Io(_) => "io",
            RenderError::ConfigurationError(_) => "configuration",
            RenderError::SerializationError(_) => "serialization",
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::SerializationError(err.to_string())
    }
}
