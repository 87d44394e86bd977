// Action dispatcher: turns a priority-ordered match set into at most one click
use super::config::RunConfig;
use super::types::DispatchOutcome;
use crate::error::{AutomationError, AutomationResult};
use crate::platform::{InputInjector, OverlayRenderer};
use crate::template_matching::{MatchResult, MatchSet};
use std::sync::Arc;
use tokio::time::{Duration, sleep};

pub struct ActionDispatcher<I: InputInjector> {
    injector: I,
    overlay: Arc<dyn OverlayRenderer>,
    highlight: Duration,
    settle: Duration,
    click_count: u8,
}

impl<I: InputInjector> ActionDispatcher<I> {
    pub fn new(injector: I, overlay: Arc<dyn OverlayRenderer>, config: &RunConfig) -> Self {
        Self {
            injector,
            overlay,
            highlight: config.highlight_duration(),
            settle: config.settle_delay(),
            click_count: config.click_count.max(1),
        }
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    /// Act on the highest-priority match in `set`, ignoring every other icon.
    ///
    /// `names` maps icon ranks to display names. Returns `NoAction` without
    /// touching the screen when nothing matched.
    pub async fn dispatch(
        &mut self,
        set: &MatchSet,
        names: &[String],
    ) -> AutomationResult<DispatchOutcome> {
        let Some(result) = set.first_found() else {
            log::debug!("👀 No icon matched, nothing to do");
            return Ok(DispatchOutcome::NoAction);
        };

        let name = names
            .get(result.icon.rank())
            .cloned()
            .unwrap_or_else(|| result.icon.to_string());
        let (x, y) = result.click_point();

        self.flash_highlight(result);

        for _ in 0..self.click_count {
            self.injector
                .click(x, y)
                .map_err(|source| AutomationError::Dispatch { x, y, source })?;
        }
        log::info!("🎯 Clicked {} at ({}, {})", result.describe(&name), x, y);

        sleep(self.settle).await;

        Ok(DispatchOutcome::Clicked {
            icon: result.icon,
            name,
            point: (x, y),
            bounds: (result.x, result.y, result.width, result.height),
            confidence: result.confidence,
        })
    }

    fn flash_highlight(&self, result: &MatchResult) {
        let overlay = Arc::clone(&self.overlay);
        let duration = self.highlight;
        let (x, y, width, height) = (result.x, result.y, result.width, result.height);
        // Detached; the click must not wait for the highlight
        if let Err(e) = std::thread::Builder::new()
            .name("overlay-flash".to_string())
            .spawn(move || overlay.flash(x, y, width, height, duration))
        {
            log::warn!("⚠️ Could not start highlight thread: {}", e);
        }
    }
}
