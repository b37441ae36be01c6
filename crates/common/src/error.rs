//! Error types shared across Shotline crates.

use std::path::PathBuf;

/// Top-level error type for Shotline operations.
#[derive(Debug, thiserror::Error)]
pub enum ShotlineError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Scene host error: {message}")]
    Host { message: String },

    #[error("Compositor error: {message}")]
    Compositor { message: String },

    #[error("Script template error: {message}")]
    Template { message: String },

    #[error("Shot range table error: {message}")]
    RangeTable { message: String },

    /// A resource the run cannot continue without (view layer, collection,
    /// required bucket contents).
    #[error("Missing required resource: {message}")]
    MissingResource { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ShotlineError.
pub type ShotlineResult<T> = Result<T, ShotlineError>;

impl ShotlineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host {
            message: msg.into(),
        }
    }

    pub fn compositor(msg: impl Into<String>) -> Self {
        Self::Compositor {
            message: msg.into(),
        }
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    pub fn range_table(msg: impl Into<String>) -> Self {
        Self::RangeTable {
            message: msg.into(),
        }
    }

    pub fn missing_resource(msg: impl Into<String>) -> Self {
        Self::MissingResource {
            message: msg.into(),
        }
    }

    /// Whether this error means the run must stop before anything is saved.
    pub fn is_fatal_resource(&self) -> bool {
        matches!(self, Self::MissingResource { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors_render_messages() {
        let err = ShotlineError::missing_resource("view layer 'alpha_char'");
        assert_eq!(
            err.to_string(),
            "Missing required resource: view layer 'alpha_char'"
        );
        assert!(err.is_fatal_resource());
        assert!(!ShotlineError::host("boom").is_fatal_resource());
    }

    #[test]
    fn test_io_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ShotlineError = io.into();
        assert_eq!(err.to_string(), "gone");
    }
}
