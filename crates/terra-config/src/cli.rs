//! Command-line argument parsing for the native Terra viewer.

use std::path::PathBuf;

use clap::Parser;

use crate::EarthConfig;

/// Terra command-line arguments.
///
/// CLI values override settings loaded from `terra.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "terra", about = "Interactive planet visualization")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory textures are loaded from.
    #[arg(long)]
    pub assets: Option<String>,

    /// Initialize even when capability detection is unfavorable.
    #[arg(long)]
    pub force_three: bool,

    /// Treat the device as low-end regardless of detection.
    #[arg(long)]
    pub low_end: bool,

    /// Report a mobile user agent to capability detection.
    #[arg(long)]
    pub mobile: bool,

    /// Base URL relative card links are opened under.
    #[arg(long)]
    pub site_url: Option<String>,
}

impl EarthConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(ref root) = args.assets {
            self.paths.root = root.clone();
        }
        if args.force_three {
            self.debug.force_three = true;
        }
    }
}
