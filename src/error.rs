use crate::platform::PlatformError;
use crate::template_matching::IconId;
use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for automation operations.
pub type AutomationResult<T> = Result<T, AutomationError>;

/// The error type for loading, matching, dispatching and configuration.
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Screen capture failed: {source}")]
    Capture { source: PlatformError },

    #[error("Failed to load icon template {path:?}: {reason}")]
    TemplateLoad { path: PathBuf, reason: String },

    #[error("Frame is empty ({width}x{height}), nothing to match against")]
    EmptyFrame { width: u32, height: u32 },

    #[error("Matching worker for icon {icon} ('{name}') failed: {reason}")]
    MatchWorker {
        icon: IconId,
        name: String,
        reason: String,
    },

    #[error("Click at ({x}, {y}) failed: {source}")]
    Dispatch {
        x: u32,
        y: u32,
        source: PlatformError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid profile name '{name}'")]
    ProfileName { name: String },

    #[error("Profile '{name}' not found in {dir:?}")]
    ProfileNotFound { name: String, dir: PathBuf },

    #[error("Profile storage error at {path:?}: {source}")]
    ProfileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Profile {path:?} is not valid JSON: {source}")]
    ProfileFormat {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Platform setup failed: {source}")]
    Platform {
        #[from]
        source: PlatformError,
    },
}

impl AutomationError {
    /// Startup errors abort before the loop runs; everything else is contained in a tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AutomationError::TemplateLoad { .. }
                | AutomationError::Config(_)
                | AutomationError::Platform { .. }
        )
    }

    /// Process exit status: 2 when the run never started, 1 otherwise.
    pub fn exit_status(&self) -> u8 {
        if self.is_fatal() { 2 } else { 1 }
    }
}
