//! Screen frames and their grayscale, blurred derivative

use crate::error::{AutomationError, AutomationResult};
use crate::platform::ScreenCapture;
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use std::sync::Arc;

/// Standard deviation OpenCV derives for a 5x5 Gaussian kernel: 0.3*((5-1)/2 - 1) + 0.8
pub const DEFAULT_BLUR_SIGMA: f32 = 1.1;

/// One captured screen, owned by a single tick
#[derive(Debug, Clone)]
pub struct Frame {
    pub color: RgbImage,
    /// Shared read-only with the matching workers of the same tick
    pub gray: Arc<GrayImage>,
}

impl Frame {
    /// Derive the matching buffer from a color capture.
    ///
    /// A `blur_sigma` of zero or less skips the blur.
    pub fn from_rgb(color: RgbImage, blur_sigma: f32) -> Self {
        let gray = DynamicImage::ImageRgb8(color.clone()).to_luma8();
        let gray = if blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, blur_sigma)
        } else {
            gray
        };
        Self {
            color,
            gray: Arc::new(gray),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.color.dimensions()
    }
}

/// Captures frames through a screen collaborator
pub struct FrameSource<S: ScreenCapture> {
    screen: S,
    blur_sigma: f32,
}

impl<S: ScreenCapture> FrameSource<S> {
    pub fn new(screen: S, blur_sigma: f32) -> Self {
        Self { screen, blur_sigma }
    }

    pub fn capture(&mut self) -> AutomationResult<Frame> {
        let color = self
            .screen
            .grab()
            .map_err(|source| AutomationError::Capture { source })?;
        if color.width() == 0 || color.height() == 0 {
            return Err(AutomationError::Capture {
                source: crate::platform::PlatformError::EmptyCapture {
                    width: color.width(),
                    height: color.height(),
                },
            });
        }
        Ok(Frame::from_rgb(color, self.blur_sigma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformError, PlatformResult};
    use image::Rgb;

    struct StaticScreen {
        image: RgbImage,
    }

    impl ScreenCapture for StaticScreen {
        fn grab(&mut self) -> PlatformResult<RgbImage> {
            Ok(self.image.clone())
        }
    }

    struct DeniedScreen;

    impl ScreenCapture for DeniedScreen {
        fn grab(&mut self) -> PlatformResult<RgbImage> {
            Err(PlatformError::CaptureFailed {
                description: "permission denied".to_string(),
            })
        }
    }

    #[test]
    fn test_capture_produces_gray_of_same_size() {
        let screen = StaticScreen {
            image: RgbImage::from_pixel(64, 48, Rgb([120, 120, 120])),
        };
        let mut source = FrameSource::new(screen, DEFAULT_BLUR_SIGMA);
        let frame = source.capture().unwrap();

        assert_eq!(frame.dimensions(), (64, 48));
        assert_eq!(frame.gray.dimensions(), (64, 48));
        // A uniform screen stays (almost) uniform through the blur
        for pixel in frame.gray.pixels() {
            assert!(
                (pixel[0] as i16 - 120).abs() <= 1,
                "unexpected gray value {}",
                pixel[0]
            );
        }
    }

    #[test]
    fn test_blur_can_be_disabled() {
        let color = RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let sharp = Frame::from_rgb(color.clone(), 0.0);
        assert_eq!(sharp.gray.get_pixel(3, 0)[0], 0);
        assert_eq!(sharp.gray.get_pixel(4, 0)[0], 255);

        let blurred = Frame::from_rgb(color, DEFAULT_BLUR_SIGMA);
        let edge = blurred.gray.get_pixel(3, 0)[0];
        assert!(edge > 0 && edge < 255, "blur should soften the edge, got {edge}");
    }

    #[test]
    fn test_capture_error_is_reported() {
        let mut source = FrameSource::new(DeniedScreen, DEFAULT_BLUR_SIGMA);
        let err = source.capture().unwrap_err();
        assert!(matches!(err, AutomationError::Capture { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_empty_capture_is_error() {
        let screen = StaticScreen {
            image: RgbImage::new(0, 0),
        };
        let mut source = FrameSource::new(screen, DEFAULT_BLUR_SIGMA);
        assert!(matches!(
            source.capture(),
            Err(AutomationError::Capture {
                source: PlatformError::EmptyCapture { .. }
            })
        ));
    }
}
