// Capability traits for the desktop collaborators the automation core drives
use super::error::PlatformResult;
use image::RgbImage;
use std::time::Duration;

/// Callback fired from the key listener thread when a bound key goes down.
pub type HotkeyCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Grabs the full primary display as an RGB buffer.
pub trait ScreenCapture {
    fn grab(&mut self) -> PlatformResult<RgbImage>;
}

/// Synthesizes mouse clicks at absolute screen coordinates.
pub trait InputInjector {
    fn click(&mut self, x: u32, y: u32) -> PlatformResult<()>;
}

/// Global key observation, independent of window focus.
pub trait HotkeyListener {
    /// Register `callback` to run whenever `key` is pressed.
    fn bind(&mut self, key: &str, callback: HotkeyCallback) -> PlatformResult<()>;

    /// Whether `key` is held down right now.
    fn is_pressed(&self, key: &str) -> bool;

    /// Drop every registration made through `bind`.
    fn release(&mut self);
}

/// Draws a transient, click-through highlight rectangle.
///
/// `flash` blocks for `duration` and is expected to be called from a
/// throwaway thread, never from the control loop.
pub trait OverlayRenderer: Send + Sync {
    fn flash(&self, x: u32, y: u32, width: u32, height: u32, duration: Duration);
}
