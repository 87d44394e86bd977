use thiserror::Error;

/// A specialized `Result` type for desktop collaborator operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// The error type for screen, input, hotkey and overlay collaborators.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Failed to enumerate monitors: {description}")]
    MonitorEnumerationFailed { description: String },

    #[error("No primary monitor found (checked {checked} monitors)")]
    NoPrimaryMonitor { checked: usize },

    #[error("Screen capture failed: {description}")]
    CaptureFailed { description: String },

    #[error("Screen capture returned an empty buffer ({width}x{height})")]
    EmptyCapture { width: u32, height: u32 },

    #[error("Failed to initialise input injection: {description}")]
    InjectorUnavailable { description: String },

    #[error("Click at x={x}, y={y} failed: {description}")]
    ClickFailed { x: u32, y: u32, description: String },

    #[error("Unknown hotkey '{key}'")]
    UnknownKey { key: String },

    #[error("Failed to start global key listener: {description}")]
    ListenerFailed { description: String },
}

impl PlatformError {
    /// True for failures that stop the current tick but leave the platform usable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::CaptureFailed { .. }
                | PlatformError::EmptyCapture { .. }
                | PlatformError::ClickFailed { .. }
        )
    }
}
