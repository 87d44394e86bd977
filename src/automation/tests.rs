//! Tests for the coordinator, dispatcher and control loop, driven by fake
//! platform collaborators

use super::*;
use crate::error::{AutomationError, AutomationResult};
use crate::platform::{
    HotkeyCallback, HotkeyListener, InputInjector, OverlayRenderer, PlatformError,
    PlatformResult, ScreenCapture,
};
use crate::template_matching::{
    Frame, FrameSource, IconId, IconMatcher, IconTemplate, MatchOutcome, MatchResult, MatchSet,
    ScaleMatcher,
};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Behaviour {
    Found { x: u32, y: u32, width: u32, height: u32 },
    Miss,
    Fail,
    Panic,
}

/// Matcher whose per-icon answer and completion delay are scripted by rank
struct ScriptedMatcher {
    behaviour: HashMap<usize, Behaviour>,
    delay_ms: HashMap<usize, u64>,
}

impl ScriptedMatcher {
    fn new(behaviour: Vec<Behaviour>) -> Self {
        Self {
            behaviour: behaviour.into_iter().enumerate().collect(),
            delay_ms: HashMap::new(),
        }
    }

    fn with_delays(mut self, delays: Vec<u64>) -> Self {
        self.delay_ms = delays.into_iter().enumerate().collect();
        self
    }
}

impl IconMatcher for ScriptedMatcher {
    fn match_icon(
        &self,
        template: &IconTemplate,
        _frame: &GrayImage,
    ) -> AutomationResult<Option<MatchResult>> {
        let rank = template.id.rank();
        if let Some(ms) = self.delay_ms.get(&rank) {
            std::thread::sleep(Duration::from_millis(*ms));
        }
        match self.behaviour.get(&rank).copied().unwrap_or(Behaviour::Miss) {
            Behaviour::Found { x, y, width, height } => Ok(Some(MatchResult {
                icon: template.id,
                x,
                y,
                width,
                height,
                confidence: 0.93,
                scale: 1.0,
            })),
            Behaviour::Miss => Ok(None),
            Behaviour::Fail => Err(AutomationError::EmptyFrame {
                width: 0,
                height: 0,
            }),
            Behaviour::Panic => panic!("scripted matcher panic"),
        }
    }
}

#[derive(Default)]
struct FakeScreen {
    script: VecDeque<PlatformResult<RgbImage>>,
    grabs: usize,
    /// Raise the stop flag during the n-th grab
    raise_on_grab: Arc<Mutex<Option<(usize, StopSignal)>>>,
}

impl FakeScreen {
    fn blank() -> Self {
        Self::default()
    }

    fn scripted(script: Vec<PlatformResult<RgbImage>>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }
}

impl ScreenCapture for FakeScreen {
    fn grab(&mut self) -> PlatformResult<RgbImage> {
        self.grabs += 1;
        if let Ok(trigger) = self.raise_on_grab.lock()
            && let Some((at, stop)) = trigger.as_ref()
            && *at == self.grabs
        {
            stop.raise();
        }
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(RgbImage::new(32, 32)))
    }
}

#[derive(Default)]
struct FakeInjector {
    clicks: Vec<(u32, u32)>,
    fail: bool,
}

impl InputInjector for FakeInjector {
    fn click(&mut self, x: u32, y: u32) -> PlatformResult<()> {
        if self.fail {
            return Err(PlatformError::ClickFailed {
                x,
                y,
                description: "injector offline".to_string(),
            });
        }
        self.clicks.push((x, y));
        Ok(())
    }
}

#[derive(Default)]
struct FakeHotkeys {
    pressed: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    bindings: Arc<Mutex<Vec<(String, HotkeyCallback)>>>,
}

impl HotkeyListener for FakeHotkeys {
    fn bind(&mut self, key: &str, callback: HotkeyCallback) -> PlatformResult<()> {
        self.bindings
            .lock()
            .unwrap()
            .push((key.to_string(), callback));
        Ok(())
    }

    fn is_pressed(&self, _key: &str) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }

    fn release(&mut self) {
        self.bindings.lock().unwrap().clear();
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct RecordingOverlay {
    flashes: Mutex<Vec<(u32, u32, u32, u32)>>,
    calls: AtomicUsize,
}

impl OverlayRenderer for RecordingOverlay {
    fn flash(&self, x: u32, y: u32, width: u32, height: u32, _duration: Duration) {
        if let Ok(mut flashes) = self.flashes.lock() {
            flashes.push((x, y, width, height));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fast_config() -> RunConfig {
    RunConfig {
        poll_interval_ms: 0,
        settle_ms: 0,
        highlight_ms: 0,
        ..RunConfig::default()
    }
}

fn icons(count: usize) -> Vec<IconTemplate> {
    (0..count)
        .map(|i| IconTemplate::from_gray(IconId(i), &format!("icon{i}"), GrayImage::new(4, 4)))
        .collect()
}

fn coordinator(matcher: ScriptedMatcher, count: usize) -> MatchCoordinator {
    MatchCoordinator::new(Arc::new(matcher), icons(count)).unwrap()
}

fn blank_frame() -> Frame {
    Frame::from_rgb(RgbImage::new(32, 32), 0.0)
}

fn found(icon: usize, x: u32, y: u32, width: u32, height: u32) -> MatchOutcome {
    MatchOutcome::Found(MatchResult {
        icon: IconId(icon),
        x,
        y,
        width,
        height,
        confidence: 0.9,
        scale: 1.0,
    })
}

fn missed(icon: usize) -> MatchOutcome {
    MatchOutcome::NoMatch { icon: IconId(icon) }
}

fn names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("icon{i}")).collect()
}

fn dispatcher(config: &RunConfig) -> (ActionDispatcher<FakeInjector>, Arc<RecordingOverlay>) {
    let overlay = Arc::new(RecordingOverlay::default());
    let dispatcher = ActionDispatcher::new(FakeInjector::default(), overlay.clone(), config);
    (dispatcher, overlay)
}

// ---------------------------------------------------------------------------
// MatchCoordinator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_coordinator_returns_one_outcome_per_icon_in_order() {
    let matcher = ScriptedMatcher::new(vec![
        Behaviour::Miss,
        Behaviour::Found { x: 10, y: 12, width: 4, height: 4 },
        Behaviour::Miss,
        Behaviour::Found { x: 1, y: 2, width: 4, height: 4 },
    ]);
    let set = coordinator(matcher, 4).run(&blank_frame()).await;

    assert_eq!(set.len(), 4);
    for (position, outcome) in set.iter().enumerate() {
        assert_eq!(outcome.icon(), IconId(position));
    }
    assert!(!set.get(IconId(0)).unwrap().is_found());
    assert!(set.get(IconId(1)).unwrap().is_found());
    assert_eq!(set.found_count(), 2);
}

#[tokio::test]
async fn test_coordinator_order_independent_of_completion_order() {
    let behaviour = vec![
        Behaviour::Found { x: 0, y: 0, width: 4, height: 4 },
        Behaviour::Found { x: 5, y: 5, width: 4, height: 4 },
        Behaviour::Miss,
        Behaviour::Found { x: 9, y: 9, width: 4, height: 4 },
    ];

    let in_order = coordinator(ScriptedMatcher::new(behaviour.clone()), 4)
        .run(&blank_frame())
        .await;
    // Highest priority finishes last
    let reversed = coordinator(
        ScriptedMatcher::new(behaviour.clone()).with_delays(vec![80, 50, 20, 0]),
        4,
    )
    .run(&blank_frame())
    .await;
    let shuffled = coordinator(
        ScriptedMatcher::new(behaviour).with_delays(vec![30, 0, 60, 10]),
        4,
    )
    .run(&blank_frame())
    .await;

    assert_eq!(reversed, in_order);
    assert_eq!(shuffled, in_order);
}

#[tokio::test]
async fn test_coordinator_failing_worker_becomes_no_match() {
    let matcher = ScriptedMatcher::new(vec![
        Behaviour::Found { x: 3, y: 3, width: 4, height: 4 },
        Behaviour::Fail,
        Behaviour::Found { x: 7, y: 7, width: 4, height: 4 },
    ]);
    let set = coordinator(matcher, 3).run(&blank_frame()).await;

    let expected = MatchSet::from_ordered(vec![
        found(0, 3, 3, 4, 4),
        missed(1),
        found(2, 7, 7, 4, 4),
    ])
    .unwrap();
    // Confidence differs between the scripted matcher and the helper
    assert_eq!(set.len(), expected.len());
    for (got, want) in set.iter().zip(expected.iter()) {
        assert_eq!(got.is_found(), want.is_found());
        assert_eq!(got.icon(), want.icon());
    }
}

#[tokio::test]
async fn test_coordinator_panicking_worker_becomes_no_match() {
    let matcher = ScriptedMatcher::new(vec![
        Behaviour::Panic,
        Behaviour::Found { x: 2, y: 2, width: 4, height: 4 },
    ]);
    let set = coordinator(matcher, 2).run(&blank_frame()).await;

    assert_eq!(set.len(), 2);
    assert_eq!(set.get(IconId(0)), Some(&missed(0)));
    assert!(set.get(IconId(1)).unwrap().is_found());
}

#[test]
fn test_coordinator_rejects_misnumbered_icons() {
    let mut templates = icons(3);
    templates.swap(0, 2);
    let result = MatchCoordinator::new(Arc::new(ScriptedMatcher::new(Vec::new())), templates);
    assert!(matches!(result, Err(AutomationError::Config(_))));

    let empty = MatchCoordinator::new(Arc::new(ScriptedMatcher::new(Vec::new())), Vec::new());
    assert!(matches!(empty, Err(AutomationError::Config(_))));
}

// ---------------------------------------------------------------------------
// ActionDispatcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dispatch_acts_only_on_highest_priority_match() {
    let config = fast_config();
    let (mut dispatcher, _) = dispatcher(&config);
    let set = MatchSet::from_ordered(vec![
        found(0, 100, 200, 40, 20),
        missed(1),
        found(2, 500, 500, 40, 40),
    ])
    .unwrap();

    let outcome = dispatcher.dispatch(&set, &names(3)).await.unwrap();

    assert_eq!(outcome.clicked_icon(), Some(IconId(0)));
    assert_eq!(dispatcher.injector().clicks, vec![(120, 210)]);
}

#[tokio::test]
async fn test_dispatch_clicks_box_center() {
    let config = fast_config();
    let (mut dispatcher, _) = dispatcher(&config);
    let set = MatchSet::from_ordered(vec![missed(0), found(1, 100, 200, 40, 20)]).unwrap();

    let outcome = dispatcher.dispatch(&set, &names(2)).await.unwrap();

    match outcome {
        DispatchOutcome::Clicked {
            icon,
            name,
            point,
            bounds,
            ..
        } => {
            assert_eq!(icon, IconId(1));
            assert_eq!(name, "icon1");
            assert_eq!(point, (120, 210));
            assert_eq!(bounds, (100, 200, 40, 20));
        }
        DispatchOutcome::NoAction => panic!("expected a click"),
    }
}

#[tokio::test]
async fn test_dispatch_no_match_does_nothing() {
    let config = fast_config();
    let (mut dispatcher, overlay) = dispatcher(&config);

    let outcome = dispatcher
        .dispatch(&MatchSet::all_missed(4), &names(4))
        .await
        .unwrap();

    assert_eq!(outcome, DispatchOutcome::NoAction);
    assert!(dispatcher.injector().clicks.is_empty());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(overlay.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dispatch_flashes_highlight_around_match() {
    let config = fast_config();
    let (mut dispatcher, overlay) = dispatcher(&config);
    let set = MatchSet::from_ordered(vec![found(0, 10, 20, 30, 40)]).unwrap();

    dispatcher.dispatch(&set, &names(1)).await.unwrap();

    // The highlight runs on its own thread
    for _ in 0..100 {
        if overlay.calls.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*overlay.flashes.lock().unwrap(), vec![(10, 20, 30, 40)]);
}

#[tokio::test]
async fn test_dispatch_repeats_clicks_per_config() {
    let config = RunConfig {
        click_count: 2,
        ..fast_config()
    };
    let (mut dispatcher, _) = dispatcher(&config);
    let set = MatchSet::from_ordered(vec![found(0, 0, 0, 10, 10)]).unwrap();

    dispatcher.dispatch(&set, &names(1)).await.unwrap();

    assert_eq!(dispatcher.injector().clicks, vec![(5, 5), (5, 5)]);
}

#[tokio::test]
async fn test_dispatch_click_failure_is_dispatch_error() {
    let config = fast_config();
    let overlay = Arc::new(RecordingOverlay::default());
    let injector = FakeInjector {
        fail: true,
        ..FakeInjector::default()
    };
    let mut dispatcher = ActionDispatcher::new(injector, overlay, &config);
    let set = MatchSet::from_ordered(vec![found(0, 100, 200, 40, 20)]).unwrap();

    let result = dispatcher.dispatch(&set, &names(1)).await;

    assert!(matches!(
        result,
        Err(AutomationError::Dispatch { x: 120, y: 210, .. })
    ));
}

// ---------------------------------------------------------------------------
// ControlLoop
// ---------------------------------------------------------------------------

fn control_loop<'a>(
    config: &'a RunConfig,
    screen: FakeScreen,
    matcher: ScriptedMatcher,
    hotkeys: FakeHotkeys,
) -> ControlLoop<'a, FakeScreen, FakeInjector, FakeHotkeys> {
    let (dispatcher, _) = dispatcher(config);
    ControlLoop::new(
        config,
        FrameSource::new(screen, 0.0),
        coordinator(matcher, 4),
        dispatcher,
        hotkeys,
    )
}

#[tokio::test]
async fn test_loop_stops_at_tick_limit() {
    let config = fast_config();
    let matcher = ScriptedMatcher::new(vec![
        Behaviour::Miss,
        Behaviour::Miss,
        Behaviour::Found { x: 0, y: 0, width: 8, height: 8 },
    ]);
    let mut control = control_loop(&config, FakeScreen::blank(), matcher, FakeHotkeys::default())
        .with_max_ticks(Some(3));

    let summary = control.run().await;

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.clicks, 3);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.stop_reason, StopReason::TickLimit);
    assert_eq!(control.dispatcher().injector().clicks, vec![(4, 4); 3]);
    assert_eq!(control.state(), LoopState::Stopped);
}

#[tokio::test]
async fn test_loop_continues_after_capture_failure() {
    let config = fast_config();
    let screen = FakeScreen::scripted(vec![
        Err(PlatformError::CaptureFailed {
            description: "display asleep".to_string(),
        }),
        Ok(RgbImage::new(0, 0)),
        Ok(RgbImage::new(32, 32)),
    ]);
    let matcher = ScriptedMatcher::new(vec![Behaviour::Found {
        x: 2,
        y: 2,
        width: 4,
        height: 4,
    }]);
    let mut control =
        control_loop(&config, screen, matcher, FakeHotkeys::default()).with_max_ticks(Some(3));

    let summary = control.run().await;

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.errors, 2);
    assert_eq!(summary.clicks, 1);
}

#[tokio::test]
async fn test_failed_tick_reports_no_action() {
    let config = fast_config();
    let screen = FakeScreen::scripted(vec![Err(PlatformError::CaptureFailed {
        description: "denied".to_string(),
    })]);
    let mut control = control_loop(
        &config,
        screen,
        ScriptedMatcher::new(Vec::new()),
        FakeHotkeys::default(),
    );

    let report = control.tick().await;

    assert_eq!(report.index, 1);
    assert_eq!(report.outcome, DispatchOutcome::NoAction);
    assert!(report.error.unwrap().contains("denied"));
}

#[tokio::test]
async fn test_cancel_lets_in_flight_tick_finish_then_stops() {
    let config = fast_config();
    let screen = FakeScreen::blank();
    let trigger = screen.raise_on_grab.clone();
    let mut control = control_loop(
        &config,
        screen,
        ScriptedMatcher::new(vec![Behaviour::Found {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        }]),
        FakeHotkeys::default(),
    )
    .with_max_ticks(Some(10));
    // Raise the flag mid-way through the second tick
    *trigger.lock().unwrap() = Some((2, control.stop_signal()));

    let summary = control.run().await;

    assert_eq!(summary.stop_reason, StopReason::CancelKey);
    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.clicks, 2);
}

#[tokio::test]
async fn test_pressed_cancel_key_prevents_first_tick() {
    let config = fast_config();
    let hotkeys = FakeHotkeys::default();
    hotkeys.pressed.store(true, Ordering::SeqCst);
    let released = hotkeys.released.clone();
    let mut control = control_loop(
        &config,
        FakeScreen::blank(),
        ScriptedMatcher::new(Vec::new()),
        hotkeys,
    );

    let summary = control.run().await;

    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.stop_reason, StopReason::CancelKey);
    assert!(released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_bound_cancel_key_raises_stop_signal() {
    let config = fast_config();
    let hotkeys = FakeHotkeys::default();
    let bindings = hotkeys.bindings.clone();
    let mut control = control_loop(
        &config,
        FakeScreen::blank(),
        ScriptedMatcher::new(Vec::new()),
        hotkeys,
    );
    control.bind_cancel_key().unwrap();
    let stop = control.stop_signal();
    assert!(!stop.is_raised());

    {
        let bound = bindings.lock().unwrap();
        let (key, callback) = &bound[0];
        assert_eq!(key, "q");
        callback();
    }

    assert!(stop.is_raised());
    let summary = control.run().await;
    assert_eq!(summary.ticks, 0);
}

#[tokio::test]
async fn test_zero_timeout_stops_immediately() {
    let config = fast_config();
    let mut control = control_loop(
        &config,
        FakeScreen::blank(),
        ScriptedMatcher::new(Vec::new()),
        FakeHotkeys::default(),
    )
    .with_timeout(Some(Duration::ZERO));

    let summary = control.run().await;

    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.stop_reason, StopReason::Timeout);
}

#[tokio::test]
async fn test_dump_dir_receives_frames() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        dump_dir: Some(dir.path().join("dumps")),
        ..fast_config()
    };
    let mut control = control_loop(
        &config,
        FakeScreen::blank(),
        ScriptedMatcher::new(vec![Behaviour::Found {
            x: 4,
            y: 4,
            width: 8,
            height: 8,
        }]),
        FakeHotkeys::default(),
    )
    .with_max_ticks(Some(1));

    control.run().await;

    let dumps = dir.path().join("dumps");
    assert!(dumps.join("tick_000001_gray.png").exists());
    assert!(dumps.join("tick_000001_click.png").exists());
}

// ---------------------------------------------------------------------------
// End to end with the real matcher
// ---------------------------------------------------------------------------

fn textured_icon(size: u32) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| {
        Luma([((x * 37 + y * 91 + x * y * 13) % 223 + 16) as u8])
    })
}

/// Pattern that appears nowhere in the test screen
fn checkerboard(size: u32) -> GrayImage {
    GrayImage::from_fn(size, size, |x, y| {
        if (x / 3 + y / 3) % 2 == 0 {
            Luma([250])
        } else {
            Luma([5])
        }
    })
}

#[tokio::test]
async fn test_real_matcher_clicks_planted_icon() {
    let config = RunConfig {
        blur_sigma: 0.0,
        scale_low: 1.0,
        ..fast_config()
    };
    let icon = textured_icon(24);
    let mut screen_image = RgbImage::from_fn(200, 150, |x, y| {
        let v = ((x + y) / 2) as u8;
        Rgb([v, v, v])
    });
    for (x, y, p) in icon.enumerate_pixels() {
        let v = p.0[0];
        screen_image.put_pixel(100 + x, 60 + y, Rgb([v, v, v]));
    }
    let screen = FakeScreen::scripted(vec![Ok(screen_image)]);
    let coordinator = MatchCoordinator::new(
        Arc::new(ScaleMatcher::new(config.threshold, config.scale_factors())),
        vec![
            IconTemplate::from_gray(IconId(0), "absent", checkerboard(24)),
            IconTemplate::from_gray(IconId(1), "target", icon),
        ],
    )
    .unwrap();
    let (dispatcher, _) = dispatcher(&config);
    let mut control = ControlLoop::new(
        &config,
        FrameSource::new(screen, config.blur_sigma),
        coordinator,
        dispatcher,
        FakeHotkeys::default(),
    );

    let report = control.tick().await;

    assert_eq!(report.outcome.clicked_icon(), Some(IconId(1)));
    assert_eq!(control.dispatcher().injector().clicks, vec![(112, 72)]);
}

#[tokio::test]
async fn test_detect_once_matches_without_clicking() {
    let mut frames = FrameSource::new(FakeScreen::blank(), 0.0);
    let coordinator = coordinator(
        ScriptedMatcher::new(vec![
            Behaviour::Miss,
            Behaviour::Found { x: 1, y: 1, width: 4, height: 4 },
        ]),
        2,
    );

    let set = detect_once(&mut frames, &coordinator).await.unwrap();

    assert_eq!(set.len(), 2);
    assert_eq!(set.first_found().map(|r| r.icon), Some(IconId(1)));
}
