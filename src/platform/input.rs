// Mouse click injection backed by enigo
use super::error::{PlatformError, PlatformResult};
use super::types::InputInjector;
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> PlatformResult<Self> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| PlatformError::InjectorUnavailable {
                description: e.to_string(),
            })?;
        Ok(Self { enigo })
    }
}

impl InputInjector for EnigoInjector {
    fn click(&mut self, x: u32, y: u32) -> PlatformResult<()> {
        let to_click_error = |e: enigo::InputError| PlatformError::ClickFailed {
            x,
            y,
            description: e.to_string(),
        };
        let (abs_x, abs_y) = (
            i32::try_from(x).map_err(|_| PlatformError::ClickFailed {
                x,
                y,
                description: "x exceeds i32 range".to_string(),
            })?,
            i32::try_from(y).map_err(|_| PlatformError::ClickFailed {
                x,
                y,
                description: "y exceeds i32 range".to_string(),
            })?,
        );
        self.enigo
            .move_mouse(abs_x, abs_y, Coordinate::Abs)
            .map_err(to_click_error)?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(to_click_error)?;
        Ok(())
    }
}
