//! Error types for kiln
//!
//! Library errors use `thiserror`; the binary wraps them in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// Main error type for kiln operations
#[derive(Error, Debug)]
pub enum KilnError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A pipeline input file is missing
    #[error("source file not found: {path}")]
    MissingSource { path: PathBuf },

    /// Invalid glob pattern in a source selector
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Stylesheet compilation failed (SCSS compile or CSS transform)
    ///
    /// This is the one error callers are expected to catch and surface as a
    /// notification instead of aborting the whole run.
    #[error("stylesheet error in {file}: {message}")]
    Stylesheet { file: PathBuf, message: String },

    /// Unknown ECMAScript emit target in configuration
    #[error("unknown script target '{target}'")]
    InvalidTarget { target: String },

    /// Script bundle could not be parsed or emitted
    #[error("script error in {file}: {message}")]
    Script { file: PathBuf, message: String },

    /// Image recompression failed
    #[error("image error in {file}: {message}")]
    Image { file: PathBuf, message: String },

    /// Dev server failed to start or crashed
    #[error("server error: {message}")]
    Server { message: String },

    /// File watcher could not be set up
    #[error("watch error: {message}")]
    Watch { message: String },
}

impl KilnError {
    /// True for errors that should be rendered as a notification and
    /// swallowed rather than aborting sibling tasks.
    pub fn is_notification(&self) -> bool {
        matches!(self, KilnError::Stylesheet { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_source() {
        let err = KilnError::MissingSource {
            path: PathBuf::from("src/styles/main.scss"),
        };
        assert_eq!(
            err.to_string(),
            "source file not found: src/styles/main.scss"
        );
    }

    #[test]
    fn test_error_display_stylesheet() {
        let err = KilnError::Stylesheet {
            file: PathBuf::from("src/styles/main.scss"),
            message: "undefined variable $primary".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "stylesheet error in src/styles/main.scss: undefined variable $primary"
        );
    }

    #[test]
    fn test_stylesheet_errors_are_notifications() {
        let err = KilnError::Stylesheet {
            file: PathBuf::from("main.scss"),
            message: "boom".to_string(),
        };
        assert!(err.is_notification());

        let err = KilnError::MissingSource {
            path: PathBuf::from("main.js"),
        };
        assert!(!err.is_notification());
    }
}
