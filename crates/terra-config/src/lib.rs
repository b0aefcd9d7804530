//! Configuration for the Terra planet visualization.
//!
//! Every tunable lives in [`EarthConfig`], which persists to disk as RON and
//! accepts CLI overrides via clap. Device-specific and showcase adjustments are
//! expressed as [`ConfigOverride`] values merged into a [`ConfigStore`], which
//! versions the effective configuration and keeps snapshots for rollback.

mod cli;
mod config;
mod device;
mod error;
mod store;

pub use cli::CliArgs;
pub use config::{
    AtmosphereConfig, BodyTransform, CameraConfig, CameraPreset, CameraPresets, CardRecord,
    CloudConfig, DebugConfig, DragConfig, EarthBodyConfig, EarthConfig, InitConfig,
    LightingConfig, LightingPreset, MoonConfig, MoonLodLevel, PerformanceConfig, PresetName,
    QualityLevels, QualityTier, QualityTierConfig, SectionTable, SectionTransforms,
    ShootingStarConfig, ShowcaseConfig, StarAnimationConfig, StarConfig, SunConfig, SurfaceMode,
    TexturePaths, WindowConfig,
};
pub use device::{DeviceCapabilities, FrameProbe, HostEnvironment};
pub use error::ConfigError;
pub use store::{ConfigOverride, ConfigStore, SnapshotId};
