/// Template matching module for locating icons in screen captures
///
/// This module provides:
/// - Frame capture with grayscale conversion and Gaussian noise reduction
/// - Immutable icon templates loaded once at startup
/// - Correlation-coefficient matching across a fixed list of scales, coarse to fine
/// - Icon-tagged results assembled into priority-ordered match sets
pub mod frame;
pub mod matcher;
pub mod template;
pub mod types;

pub use frame::{DEFAULT_BLUR_SIGMA, Frame, FrameSource};
pub use matcher::{IconMatcher, ScaleMatcher, ScaleSearch, correlation_surface, scale_factors};
pub use template::{FsTemplateStore, IconTemplate, TemplateStore, apply_white_mask, load_icon_set};
pub use types::{IconId, MatchOutcome, MatchResult, MatchSet};
