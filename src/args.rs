use crate::automation::RunConfig;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "screen-icon-run", version)]
#[command(about = "🤖 Watch the screen for game icons and click them in priority order")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Start from a saved profile instead of the built-in defaults
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Directory holding saved profiles
    #[arg(long, default_value = "configs", global = true)]
    pub profiles_dir: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the capture -> match -> click loop until the cancel key is pressed (default)
    Run(RunOverrides),

    /// Capture once, report every icon's match, click nothing
    Detect(RunOverrides),

    /// Manage saved profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// List saved profiles
    List,
    /// Print a profile as JSON
    Show { name: String },
    /// Save the current settings (defaults or --profile, plus overrides) under a name
    Save {
        name: String,
        #[command(flatten)]
        overrides: RunOverrides,
    },
    /// Delete a profile
    Delete { name: String },
}

/// Per-run settings that override the loaded profile
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct RunOverrides {
    /// Minimum match confidence (0.0 to 1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Directory containing the icon images
    #[arg(long)]
    pub icon_dir: Option<PathBuf>,

    /// Key that stops the loop
    #[arg(long)]
    pub cancel_key: Option<String>,

    /// Clicks per action (2 = double click)
    #[arg(long)]
    pub click_count: Option<u8>,

    /// Zero template pixels at or below this gray value before matching
    #[arg(long, value_name = "CUTOFF")]
    pub white_mask: Option<u8>,

    /// Write per-tick debug frames to this directory
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Auto-exit after N seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Auto-exit after N ticks
    #[arg(long, value_name = "N")]
    pub max_ticks: Option<u64>,
}

impl RunOverrides {
    /// Fold the overrides that belong in a profile into `config`
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(dir) = &self.icon_dir {
            config.icon_dir = dir.clone();
        }
        if let Some(key) = &self.cancel_key {
            config.cancel_key = key.clone();
        }
        if let Some(count) = self.click_count {
            config.click_count = count;
        }
        if let Some(cutoff) = self.white_mask {
            config.white_mask_cutoff = Some(cutoff);
        }
        if let Some(dir) = &self.dump_dir {
            config.dump_dir = Some(dir.clone());
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}
