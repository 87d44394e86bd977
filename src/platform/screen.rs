// Primary-display capture backed by xcap
use super::error::{PlatformError, PlatformResult};
use super::types::ScreenCapture;
use image::{DynamicImage, RgbImage, RgbaImage};
use std::time::Instant;

pub struct XcapScreen {
    monitor: xcap::Monitor,
    capture_count: u64,
}

impl XcapScreen {
    /// Open the primary monitor. Multi-monitor setups always use the primary one.
    pub fn primary() -> PlatformResult<Self> {
        let monitors =
            xcap::Monitor::all().map_err(|e| PlatformError::MonitorEnumerationFailed {
                description: e.to_string(),
            })?;
        let checked = monitors.len();
        let monitor = monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .ok_or(PlatformError::NoPrimaryMonitor { checked })?;
        log::debug!(
            "🖥️ Using primary monitor '{}'",
            monitor.name().unwrap_or_default()
        );
        Ok(Self {
            monitor,
            capture_count: 0,
        })
    }
}

impl ScreenCapture for XcapScreen {
    fn grab(&mut self) -> PlatformResult<RgbImage> {
        let start = Instant::now();
        let shot = self
            .monitor
            .capture_image()
            .map_err(|e| PlatformError::CaptureFailed {
                description: e.to_string(),
            })?;
        let (width, height) = (shot.width(), shot.height());
        if width == 0 || height == 0 {
            return Err(PlatformError::EmptyCapture { width, height });
        }
        // xcap may pin a different `image` release, so hand the pixels over raw
        let rgba = RgbaImage::from_raw(width, height, shot.into_raw())
            .ok_or(PlatformError::EmptyCapture { width, height })?;
        self.capture_count += 1;
        log::debug!(
            "📸 Capture #{} {}x{} in {}ms",
            self.capture_count,
            width,
            height,
            start.elapsed().as_millis()
        );
        Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
    }
}
