// Automation module
// This module drives the capture -> match -> click loop against the desktop
// through the platform traits, one tick at a time until cancelled.

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod fsm;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export the main types and functions for easy access
pub use config::RunConfig;
pub use coordinator::MatchCoordinator;
pub use dispatcher::ActionDispatcher;
pub use fsm::{ControlLoop, detect_once};
pub use types::{DispatchOutcome, LoopState, LoopSummary, StopReason, StopSignal, TickReport};
