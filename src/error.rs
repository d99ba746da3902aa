//! # Error Types
//!
//! This module defines the error type shared by every part of the jam engine.
//!
//! Most failures in the playback path are deliberately *not* errors: an
//! unparseable chord symbol becomes a silent bar, and a drum sample that fails
//! to load falls back to synthesized drums. The variants below cover what is
//! left over.
//!
//! ## Error Types
//! - `Validation` - Caller input rejected before any work is done (e.g. exporting an empty progression)
//! - `InvalidState` - A persisted jam-state document could not be parsed or validated
//! - `MalformedResponse` - The progression generator returned something unusable (retriable)
//! - `Engine` - The audio graph could not be brought back after a reset (fatal, reload required)
//! - `Config` - The engine configuration file is invalid
//!
//! ## Usage
//! ```rust
//! use jam::{export_midi, JamError};
//!
//! match export_midi(&[], 120, None) {
//!     Ok(bytes) => println!("{} bytes", bytes.len()),
//!     Err(JamError::Validation(message)) => eprintln!("Nothing to export: {}", message),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JamError {
    /// Caller input rejected before processing.
    ///
    /// # Example
    /// ```
    /// # use jam::JamError;
    /// let err = JamError::Validation("progression is empty".to_string());
    /// assert_eq!(err.to_string(), "Validation failed: progression is empty");
    /// ```
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Malformed jam-state document.
    ///
    /// `field` names the offending JSON path so the UI can point at it.
    ///
    /// # Example
    /// ```
    /// # use jam::JamError;
    /// let err = JamError::InvalidState {
    ///     field: "bpm".to_string(),
    ///     message: "must be between 40 and 240, got 300".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Invalid jam state at 'bpm': must be between 40 and 240, got 300");
    /// ```
    #[error("Invalid jam state at '{field}': {message}")]
    InvalidState { field: String, message: String },

    /// Progression generator response failed schema validation.
    ///
    /// The request can be retried by the user.
    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),

    /// The audio graph is unusable and the engine must be reloaded.
    #[error("Audio engine failure: {0}")]
    Engine(String),

    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JamError {
    /// Whether the user can simply try the same action again.
    pub fn is_retriable(&self) -> bool {
        matches!(self, JamError::MalformedResponse(_))
    }

    /// Whether the engine has to be torn down and rebuilt from scratch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, JamError::Engine(_))
    }

    pub(crate) fn state(field: impl Into<String>, message: impl Into<String>) -> Self {
        JamError::InvalidState {
            field: field.into(),
            message: message.into(),
        }
    }
}
