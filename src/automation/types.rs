// Types and enums for the automation loop
use crate::template_matching::IconId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CancelKey,
    Timeout,
    TickLimit,
}

/// What the dispatcher did with one match set
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Clicked {
        icon: IconId,
        name: String,
        point: (u32, u32),
        /// x, y, width, height of the matched box
        bounds: (u32, u32, u32, u32),
        confidence: f32,
    },
    NoAction,
}

impl DispatchOutcome {
    pub fn clicked_icon(&self) -> Option<IconId> {
        match self {
            DispatchOutcome::Clicked { icon, .. } => Some(*icon),
            DispatchOutcome::NoAction => None,
        }
    }
}

/// Summary of one capture → match → dispatch iteration
#[derive(Debug, Clone)]
pub struct TickReport {
    pub index: u64,
    pub outcome: DispatchOutcome,
    /// Set when the tick hit a contained failure
    pub error: Option<String>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub clicks: u64,
    pub errors: u64,
    pub stop_reason: StopReason,
}

/// Cooperative stop flag shared by the hotkey callback and the loop.
///
/// Cloning shares the flag; once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
