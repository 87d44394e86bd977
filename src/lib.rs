pub mod args;
pub mod automation;
pub mod error;
pub mod platform;
pub mod profiles;
pub mod template_matching;

pub use error::{AutomationError, AutomationResult};
