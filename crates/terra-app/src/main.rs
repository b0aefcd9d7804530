//! Native Terra viewer.
//!
//! Configuration is loaded from `terra.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p terra-app -- --assets ./img/earth` to pick a texture root.

use clap::Parser;
use terra_app::{PlatformDirs, ViewerOptions, window};
use terra_config::{CliArgs, EarthConfig};
use tracing::{error, info};

fn main() {
    let args = CliArgs::parse();

    let dirs = match args.config.as_deref() {
        Some(dir) => PlatformDirs::with_config_dir(dir),
        None => PlatformDirs::resolve().unwrap_or_else(|e| {
            eprintln!("{e}, using the working directory");
            PlatformDirs::with_config_dir(std::path::Path::new(".terra"))
        }),
    };
    if let Err(e) = dirs.create_dirs() {
        eprintln!("Failed to create {}: {e}", dirs.config_dir.display());
    }

    let mut config = EarthConfig::load_or_create(&dirs.config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        EarthConfig::default()
    });
    config.apply_cli_overrides(&args);

    terra_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    let options = ViewerOptions {
        asset_base: dirs.asset_base(&config.paths.root),
        mobile: args.mobile,
        low_end: args.low_end,
        site_url: args.site_url.clone(),
    };
    info!(
        "Textures from {} under {}",
        config.paths.root,
        options.asset_base.display()
    );

    if let Err(e) = window::run(config, options) {
        error!("Viewer stopped: {e}");
        std::process::exit(1);
    }
}
