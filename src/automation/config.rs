//! Run configuration, built once at startup and passed by reference

use crate::error::{AutomationError, AutomationResult};
use crate::template_matching::{DEFAULT_BLUR_SIGMA, ScaleMatcher, scale_factors};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Directory the icon file names are resolved against
    pub icon_dir: PathBuf,
    /// Icon files in priority order (first = highest priority)
    pub icons: Vec<String>,
    /// Minimum correlation coefficient for a match (0.0 to 1.0)
    pub threshold: f32,
    /// Closed scale range searched low to high
    pub scale_low: f32,
    pub scale_high: f32,
    pub scale_step: f32,
    /// Sleep between ticks
    pub poll_interval_ms: u64,
    /// Pause after a click so the game UI can react before the next capture
    pub settle_ms: u64,
    /// How long the highlight box stays up
    pub highlight_ms: u64,
    /// Key that stops the loop
    pub cancel_key: String,
    /// Gaussian blur applied to the grayscale frame; 0 disables it
    pub blur_sigma: f32,
    /// Zero template pixels darker than this before matching
    pub white_mask_cutoff: Option<u8>,
    /// Clicks issued per action
    pub click_count: u8,
    /// Write per-tick debug frames here
    pub dump_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            icon_dir: PathBuf::from("assets"),
            icons: vec![
                "cook.png".to_string(),
                "cook_menu.png".to_string(),
                "cook_start.png".to_string(),
                "finish.png".to_string(),
            ],
            threshold: 0.8,
            scale_low: 0.8,
            scale_high: 1.0,
            scale_step: 0.1,
            poll_interval_ms: 100,
            settle_ms: 300,
            highlight_ms: 500,
            cancel_key: "q".to_string(),
            blur_sigma: DEFAULT_BLUR_SIGMA,
            white_mask_cutoff: None,
            click_count: 1,
            dump_dir: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> AutomationResult<()> {
        if self.icons.is_empty() {
            return Err(AutomationError::Config(
                "at least one icon must be configured".to_string(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(AutomationError::Config(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.scale_step <= 0.0 {
            return Err(AutomationError::Config(format!(
                "scale_step must be positive, got {}",
                self.scale_step
            )));
        }
        if self.scale_low <= 0.0 || self.scale_low > self.scale_high {
            return Err(AutomationError::Config(format!(
                "scale range [{}, {}] is empty or non-positive",
                self.scale_low, self.scale_high
            )));
        }
        if self.click_count == 0 {
            return Err(AutomationError::Config(
                "click_count must be at least 1".to_string(),
            ));
        }
        if self.cancel_key.trim().is_empty() {
            return Err(AutomationError::Config(
                "cancel_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Icon paths in priority order
    pub fn icon_paths(&self) -> Vec<PathBuf> {
        self.icons.iter().map(|name| self.icon_dir.join(name)).collect()
    }

    pub fn scale_factors(&self) -> Vec<f32> {
        scale_factors(self.scale_low, self.scale_high, self.scale_step)
    }

    pub fn matcher(&self) -> ScaleMatcher {
        ScaleMatcher::new(self.threshold, self.scale_factors())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();

        assert_eq!(config.threshold, 0.8);
        assert_eq!(config.scale_factors(), vec![0.8, 0.9, 1.0]);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.settle_delay(), Duration::from_millis(300));
        assert_eq!(config.cancel_key, "q");
        assert_eq!(config.click_count, 1);
        assert!(config.white_mask_cutoff.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_icon_paths_keep_priority_order() {
        let config = RunConfig::default();
        let paths = config.icon_paths();

        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0], PathBuf::from("assets").join("cook.png"));
        assert_eq!(paths[3], PathBuf::from("assets").join("finish.png"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: Vec<(&str, RunConfig)> = vec![
            ("no icons", RunConfig {
                icons: Vec::new(),
                ..RunConfig::default()
            }),
            ("zero threshold", RunConfig {
                threshold: 0.0,
                ..RunConfig::default()
            }),
            ("threshold above one", RunConfig {
                threshold: 1.5,
                ..RunConfig::default()
            }),
            ("zero step", RunConfig {
                scale_step: 0.0,
                ..RunConfig::default()
            }),
            ("inverted range", RunConfig {
                scale_low: 1.2,
                scale_high: 0.8,
                ..RunConfig::default()
            }),
            ("zero clicks", RunConfig {
                click_count: 0,
                ..RunConfig::default()
            }),
            ("blank cancel key", RunConfig {
                cancel_key: " ".to_string(),
                ..RunConfig::default()
            }),
        ];

        for (label, config) in cases {
            assert!(
                matches!(config.validate(), Err(AutomationError::Config(_))),
                "{label} should be rejected"
            );
        }
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: RunConfig =
            serde_json::from_str(r#"{ "threshold": 0.9, "icons": ["finish.png"] }"#).unwrap();

        assert_eq!(config.threshold, 0.9);
        assert_eq!(config.icons, vec!["finish.png".to_string()]);
        assert_eq!(config.scale_factors(), vec![0.8, 0.9, 1.0]);
        assert_eq!(config.settle_ms, 300);
    }

    #[test]
    fn test_matcher_uses_threshold_and_scales() {
        let config = RunConfig {
            threshold: 0.85,
            scale_low: 0.9,
            ..RunConfig::default()
        };
        let matcher = config.matcher();
        assert_eq!(matcher.threshold(), 0.85);
        assert_eq!(matcher.scales(), &[0.9, 1.0]);
    }
}
