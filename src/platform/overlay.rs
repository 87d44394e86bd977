// Highlight renderer that reports the box through the log
use super::types::OverlayRenderer;
use std::time::Duration;

/// Stand-in for a transparent always-on-top window: the highlight is logged
/// when it appears and when it is dismissed.
#[derive(Debug, Default, Clone)]
pub struct LogOverlay;

impl OverlayRenderer for LogOverlay {
    fn flash(&self, x: u32, y: u32, width: u32, height: u32, duration: Duration) {
        log::info!(
            "🟩 Highlight [{},{} {}x{}] for {}ms",
            x,
            y,
            width,
            height,
            duration.as_millis()
        );
        std::thread::sleep(duration);
        log::debug!("🟩 Highlight [{},{} {}x{}] dismissed", x, y, width, height);
    }
}
