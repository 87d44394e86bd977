// Platform module - desktop collaborators for the automation core
// Screen capture, click injection, global hotkeys and the highlight overlay
// sit behind small traits so the core can be driven by fakes in tests.

pub mod error;
pub mod hotkey;
pub mod input;
pub mod overlay;
pub mod screen;
pub mod types;

// Re-export the main types and functions for easy access
pub use error::{PlatformError, PlatformResult};
pub use hotkey::RdevHotkeys;
pub use input::EnigoInjector;
pub use overlay::LogOverlay;
pub use screen::XcapScreen;
pub use types::{HotkeyCallback, HotkeyListener, InputInjector, OverlayRenderer, ScreenCapture};
