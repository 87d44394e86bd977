// Polling control loop: capture -> match -> dispatch -> sleep until cancelled
use super::config::RunConfig;
use super::coordinator::MatchCoordinator;
use super::dispatcher::ActionDispatcher;
use super::types::{DispatchOutcome, LoopState, LoopSummary, StopReason, StopSignal, TickReport};
use crate::error::{AutomationError, AutomationResult};
use crate::platform::{HotkeyListener, InputInjector, ScreenCapture};
use crate::template_matching::{Frame, FrameSource, MatchSet};
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;
use tokio::time::{Duration, Instant, sleep};

const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

pub struct ControlLoop<'a, S, I, H>
where
    S: ScreenCapture,
    I: InputInjector,
    H: HotkeyListener,
{
    config: &'a RunConfig,
    state: LoopState,
    frames: FrameSource<S>,
    coordinator: MatchCoordinator,
    dispatcher: ActionDispatcher<I>,
    hotkeys: H,
    stop: StopSignal,
    names: Vec<String>,
    timeout: Option<Duration>,
    max_ticks: Option<u64>,
    ticks: u64,
    clicks: u64,
    errors: u64,
}

impl<'a, S, I, H> ControlLoop<'a, S, I, H>
where
    S: ScreenCapture,
    I: InputInjector,
    H: HotkeyListener,
{
    pub fn new(
        config: &'a RunConfig,
        frames: FrameSource<S>,
        coordinator: MatchCoordinator,
        dispatcher: ActionDispatcher<I>,
        hotkeys: H,
    ) -> Self {
        let names = coordinator
            .icons()
            .iter()
            .map(|icon| icon.name.clone())
            .collect();
        Self {
            config,
            state: LoopState::Stopped,
            frames,
            coordinator,
            dispatcher,
            hotkeys,
            stop: StopSignal::new(),
            names,
            timeout: None,
            max_ticks: None,
            ticks: 0,
            clicks: 0,
            errors: 0,
        }
    }

    /// Stop after `timeout` of wall time, checked between ticks
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Handle for stopping the loop from outside; cloning shares the flag.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn dispatcher(&self) -> &ActionDispatcher<I> {
        &self.dispatcher
    }

    /// Register the cancellation key so a press raises the stop flag even
    /// while a tick is busy.
    pub fn bind_cancel_key(&mut self) -> AutomationResult<()> {
        let stop = self.stop.clone();
        self.hotkeys
            .bind(&self.config.cancel_key, Box::new(move || stop.raise()))?;
        log::info!("⌨️ Press '{}' to stop", self.config.cancel_key);
        Ok(())
    }

    fn change_state(&mut self, new_state: LoopState) {
        if self.state != new_state {
            log::debug!("🎮 Control loop state: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
        }
    }

    /// Run ticks until the cancel key, the timeout or the tick limit stops
    /// the loop. Per-tick failures are counted and logged, never returned.
    pub async fn run(&mut self) -> LoopSummary {
        let started = Instant::now();
        self.change_state(LoopState::Running);
        log::info!(
            "🚀 Watching for {} icons (threshold {}, scales {:?})",
            self.names.len(),
            self.config.threshold,
            self.config.scale_factors()
        );

        let stop_reason = loop {
            if let Some(reason) = self.should_stop(started) {
                break reason;
            }

            let report = self.tick().await;
            log::debug!(
                "⏱️ Tick {} done in {}ms",
                report.index,
                report.elapsed.as_millis()
            );

            sleep(self.config.poll_interval()).await;
        };

        self.hotkeys.release();
        self.change_state(LoopState::Stopped);

        let summary = LoopSummary {
            ticks: self.ticks,
            clicks: self.clicks,
            errors: self.errors,
            stop_reason,
        };
        log::info!(
            "⏹️ Stopped ({:?}) after {} ticks, {} clicks, {} errors",
            summary.stop_reason,
            summary.ticks,
            summary.clicks,
            summary.errors
        );
        summary
    }

    fn should_stop(&self, started: Instant) -> Option<StopReason> {
        if self.hotkeys.is_pressed(&self.config.cancel_key) {
            self.stop.raise();
        }
        if self.stop.is_raised() {
            return Some(StopReason::CancelKey);
        }
        if self.max_ticks.is_some_and(|max| self.ticks >= max) {
            return Some(StopReason::TickLimit);
        }
        if self.timeout.is_some_and(|timeout| started.elapsed() >= timeout) {
            return Some(StopReason::Timeout);
        }
        None
    }

    /// One capture -> match -> dispatch pass. Failures end the tick with no action.
    pub async fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        self.ticks += 1;
        let index = self.ticks;

        let frame = match self.frames.capture() {
            Ok(frame) => frame,
            Err(e) => return self.failed_tick(index, start, e),
        };

        let set = self.coordinator.run(&frame).await;

        let outcome = match self.dispatcher.dispatch(&set, &self.names).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.dump_frame(index, &frame, &DispatchOutcome::NoAction);
                return self.failed_tick(index, start, e);
            }
        };
        if matches!(outcome, DispatchOutcome::Clicked { .. }) {
            self.clicks += 1;
        }
        self.dump_frame(index, &frame, &outcome);

        TickReport {
            index,
            outcome,
            error: None,
            elapsed: start.elapsed(),
        }
    }

    fn failed_tick(&mut self, index: u64, start: Instant, error: AutomationError) -> TickReport {
        self.errors += 1;
        let transient = match &error {
            AutomationError::Capture { source } | AutomationError::Dispatch { source, .. } => {
                source.is_transient()
            }
            _ => false,
        };
        if transient {
            log::warn!("⚠️ Tick {}: {}", index, error);
        } else {
            log::error!("❌ Tick {}: {}", index, error);
        }
        TickReport {
            index,
            outcome: DispatchOutcome::NoAction,
            error: Some(error.to_string()),
            elapsed: start.elapsed(),
        }
    }

    fn dump_frame(&self, index: u64, frame: &Frame, outcome: &DispatchOutcome) {
        let Some(dir) = &self.config.dump_dir else {
            return;
        };
        if let Err(e) = write_dump(dir, index, frame, outcome) {
            log::warn!("⚠️ Debug frame dump for tick {} failed: {}", index, e);
        }
    }
}

fn write_dump(
    dir: &Path,
    index: u64,
    frame: &Frame,
    outcome: &DispatchOutcome,
) -> Result<(), image::ImageError> {
    std::fs::create_dir_all(dir)?;
    frame
        .gray
        .save(dir.join(format!("tick_{:06}_gray.png", index)))?;

    if let DispatchOutcome::Clicked {
        bounds: (x, y, width, height),
        ..
    } = outcome
    {
        let mut marked = frame.color.clone();
        draw_hollow_rect_mut(
            &mut marked,
            Rect::at(*x as i32, *y as i32).of_size((*width).max(1), (*height).max(1)),
            HIGHLIGHT_COLOR,
        );
        marked.save(dir.join(format!("tick_{:06}_click.png", index)))?;
    }
    log::debug!("💾 Dumped tick {} to {:?}", index, dir);
    Ok(())
}

/// Capture one frame and match every icon once, without clicking.
pub async fn detect_once<S: ScreenCapture>(
    frames: &mut FrameSource<S>,
    coordinator: &MatchCoordinator,
) -> AutomationResult<MatchSet> {
    let frame = frames.capture()?;
    let (width, height) = frame.dimensions();
    log::debug!("📸 Captured {}x{} frame", width, height);
    Ok(coordinator.run(&frame).await)
}
