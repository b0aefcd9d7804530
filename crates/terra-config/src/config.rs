//! Configuration structs with sensible defaults and RON persistence.

use std::f32::consts::{FRAC_PI_2, PI};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the planet visualization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EarthConfig {
    /// Native window settings.
    pub window: WindowConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
    /// Planet body geometry and material tunables.
    pub earth: EarthBodyConfig,
    /// Cloud shell.
    pub clouds: CloudConfig,
    /// Atmosphere shell.
    pub atmosphere: AtmosphereConfig,
    /// Directional sun placement.
    pub sun: SunConfig,
    /// Day/night lighting presets.
    pub lighting: LightingConfig,
    /// Star field.
    pub stars: StarConfig,
    /// Moon body and its detail levels.
    pub moon: MoonConfig,
    /// Camera projection, zoom range, and presets.
    pub camera: CameraConfig,
    /// Shooting-star cadence.
    pub shooting_stars: ShootingStarConfig,
    /// Resolution scaling thresholds.
    pub performance: PerformanceConfig,
    /// Quality tiers, highest first.
    pub quality: QualityLevels,
    /// Texture locations relative to the asset root.
    pub paths: TexturePaths,
    /// Per-section body/moon target transforms.
    pub sections: SectionTable,
    /// Showcase demo mode.
    pub showcase: ShowcaseConfig,
    /// Initialization timing.
    pub init: InitConfig,
    /// Feature cards shown in the `features` section.
    pub cards: Vec<CardRecord>,
}

impl Default for EarthConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            debug: DebugConfig::default(),
            earth: EarthBodyConfig::default(),
            clouds: CloudConfig::default(),
            atmosphere: AtmosphereConfig::default(),
            sun: SunConfig::default(),
            lighting: LightingConfig::default(),
            stars: StarConfig::default(),
            moon: MoonConfig::default(),
            camera: CameraConfig::default(),
            shooting_stars: ShootingStarConfig::default(),
            performance: PerformanceConfig::default(),
            quality: QualityLevels::default(),
            paths: TexturePaths::default(),
            sections: SectionTable::default(),
            showcase: ShowcaseConfig::default(),
            init: InitConfig::default(),
            cards: CardRecord::defaults(),
        }
    }
}

/// Window configuration for the native host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Window title.
    pub title: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Force initialization even when capability detection is unfavorable.
    pub force_three: bool,
}

/// Planet body configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EarthBodyConfig {
    /// Sphere radius in world units.
    pub radius: f32,
    /// Sphere segments on standard devices.
    pub segments: u32,
    /// Sphere segments on mobile or constrained devices.
    pub segments_mobile: u32,
    /// Bump map displacement scale.
    pub bump_scale: f32,
    /// Base emissive intensity of the night material.
    pub emissive_intensity: f32,
    /// Angular speed of the night-mode emissive pulse.
    pub emissive_pulse_speed: f32,
    /// Amplitude of the night-mode emissive pulse.
    pub emissive_pulse_amplitude: f32,
    /// Night emissive tint as `0xRRGGBB`.
    pub night_emissive_color: u32,
    /// Multiplier applied to `emissive_intensity` on the night material.
    pub night_emissive_multiplier: f32,
    /// Position of the body before the first section is applied.
    pub initial_position: [f32; 3],
    /// Uniform scale before the first section is applied.
    pub initial_scale: f32,
}

/// Cloud shell configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    /// Height of the shell above the body surface in world units.
    pub altitude: f32,
    /// Rotation speed per 60 Hz tick.
    pub rotation_speed: f32,
    /// Shell opacity (0 hides the layer).
    pub opacity: f32,
}

/// Atmosphere shell configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AtmosphereConfig {
    /// Shell scale relative to the body radius.
    pub scale: f32,
    /// Fresnel falloff exponent.
    pub fresnel_power: f32,
    /// Rayleigh tint as `0xRRGGBB`.
    pub rayleigh_color: u32,
    /// Mie tint as `0xRRGGBB`.
    pub mie_color: u32,
    /// Rayleigh contribution.
    pub rayleigh_intensity: f32,
    /// Mie contribution.
    pub mie_intensity: f32,
    /// Overall scattering strength.
    pub scattering_strength: f32,
}

/// Sun placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SunConfig {
    /// Horizontal distance of the directional light from the origin.
    pub radius: f32,
    /// Height of the directional light.
    pub height: f32,
    /// Default light intensity.
    pub intensity: f32,
}

/// One lighting preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingPreset {
    /// Ambient light intensity.
    pub ambient_intensity: f32,
    /// Ambient light color as `0xRRGGBB`.
    pub ambient_color: u32,
    /// Directional sun intensity.
    pub sun_intensity: f32,
}

impl Default for LightingPreset {
    fn default() -> Self {
        Self {
            ambient_intensity: 1.4,
            ambient_color: 0x606060,
            sun_intensity: 1.8,
        }
    }
}

/// Day and night lighting presets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingConfig {
    /// Lighting while the body shows its day side.
    pub day: LightingPreset,
    /// Lighting while the body shows its night side.
    pub night: LightingPreset,
}

impl LightingConfig {
    /// Preset for the given surface mode.
    pub fn preset(&self, mode: SurfaceMode) -> &LightingPreset {
        match mode {
            SurfaceMode::Day => &self.day,
            SurfaceMode::Night => &self.night,
        }
    }
}

/// Star field configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarConfig {
    /// Number of stars on standard devices (halved on mobile).
    pub count: u32,
    /// Twinkle speed fed to the star shader.
    pub twinkle_speed: f32,
    /// Morph animation tunables.
    pub animation: StarAnimationConfig,
}

/// Star morph animation tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarAnimationConfig {
    /// Duration of one morph in milliseconds.
    pub duration_ms: u32,
    /// Delay after which targets are refined once the camera settles.
    pub camera_settle_delay_ms: u32,
    /// Transition value at which cards start fading in.
    pub card_fade_start: f32,
    /// Transition value at which cards are fully visible.
    pub card_fade_end: f32,
    /// Per-star horizontal spread around its target.
    pub spread_xy: f32,
    /// Per-star depth spread around its target.
    pub spread_z: f32,
    /// World-space depth plane targets are unprojected onto.
    pub target_depth: f32,
    /// Minimum interval between scroll-driven target recomputations.
    pub scroll_throttle_ms: u32,
    /// Upper bound of outline samples taken from one element.
    pub max_points_per_element: u32,
    /// Screen-space jitter applied to each outline sample, in pixels.
    pub screen_jitter_px: f32,
    /// Depth jitter applied to each unprojected sample.
    pub depth_jitter: f32,
}

/// Moon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MoonConfig {
    /// Sphere radius.
    pub radius: f32,
    /// Orbit distance from the origin.
    pub distance: f32,
    /// Rotation speed per 60 Hz tick.
    pub orbit_speed: f32,
    /// Segment count of the finest level.
    pub segments: u32,
    /// Bump map displacement scale.
    pub bump_scale: f32,
    /// Detail levels, nearest first.
    pub lod_levels: Vec<MoonLodLevel>,
    /// Position before the first section is applied.
    pub start_position: [f32; 3],
}

/// One discrete moon detail level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MoonLodLevel {
    /// Sphere segments at this level.
    pub segments: u32,
    /// Camera distance from which this level is used.
    pub distance: f32,
}

/// Camera configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Field of view used below `mobile_breakpoint`.
    pub fov_mobile: f32,
    /// Viewport width (logical px) under which the mobile field of view applies.
    pub mobile_breakpoint: f32,
    /// Near clip plane.
    pub near: f32,
    /// Far clip plane.
    pub far: f32,
    /// Minimum zoom distance.
    pub zoom_min: f32,
    /// Maximum zoom distance.
    pub zoom_max: f32,
    /// Position smoothing per 60 Hz tick.
    pub lerp_factor: f32,
    /// Preset flight duration in seconds.
    pub transition_duration: f32,
    /// Named flight destinations.
    pub presets: CameraPresets,
    /// Pointer drag rotation.
    pub drag: DragConfig,
}

/// Drag-to-rotate tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DragConfig {
    /// Radians of orbit per pixel of horizontal drag.
    pub sensitivity: f32,
    /// Velocity retained per 60 Hz tick after release.
    pub inertia_damping: f32,
    /// Idle time after release before external orbit control resumes.
    pub auto_rotate_delay_ms: u32,
}

/// A camera destination: `position.x/y` is the orbit target, `position.z` the
/// zoom distance, `look_at` the point the camera faces on arrival.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CameraPreset {
    /// Target x, target y, zoom.
    pub position: [f32; 3],
    /// Look-at point.
    pub look_at: [f32; 3],
}

/// The four named presets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraPresets {
    pub hero: CameraPreset,
    pub features: CameraPreset,
    pub about: CameraPreset,
    pub contact: CameraPreset,
}

impl CameraPresets {
    /// Preset for `name`.
    pub fn get(&self, name: PresetName) -> &CameraPreset {
        match name {
            PresetName::Hero => &self.hero,
            PresetName::Features => &self.features,
            PresetName::About => &self.about,
            PresetName::Contact => &self.contact,
        }
    }
}

/// Named camera presets, also used to key the per-section transform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresetName {
    Hero,
    Features,
    About,
    Contact,
}

impl PresetName {
    /// All presets in page order.
    pub const ALL: [PresetName; 4] = [Self::Hero, Self::Features, Self::About, Self::Contact];

    /// Parse a preset key (`hero`, `features`, `about`, `contact`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "hero" => Some(Self::Hero),
            "features" => Some(Self::Features),
            "about" => Some(Self::About),
            "contact" => Some(Self::Contact),
            _ => None,
        }
    }

    /// The preset key.
    pub fn key(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Features => "features",
            Self::About => "about",
            Self::Contact => "contact",
        }
    }

    /// Position in page order, used to derive scroll direction.
    pub fn order(self) -> usize {
        match self {
            Self::Hero => 0,
            Self::Features => 1,
            Self::About => 2,
            Self::Contact => 3,
        }
    }
}

/// Shooting-star cadence, expressed in 60 Hz ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShootingStarConfig {
    /// Spawn probability per tick outside a shower.
    pub base_frequency: f32,
    /// Spawn probability per tick during a shower.
    pub shower_frequency: f32,
    /// Shower length in ticks.
    pub shower_duration: f32,
    /// Cooldown after a shower in ticks.
    pub shower_cooldown: f32,
    /// Upper bound on simultaneously active shooting stars.
    pub max_simultaneous: usize,
}

/// Dynamic resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Upper bound of the device pixel ratio used for rendering.
    pub pixel_ratio_cap: f32,
    /// Pixel ratio used on narrow viewports.
    pub narrow_pixel_ratio: f32,
    /// Viewport width above which `pixel_ratio_cap` applies.
    pub wide_viewport_width: f32,
    /// Frame budget target.
    pub target_fps: f32,
    /// FPS below which the resolution scale decreases.
    pub drs_down_threshold: f32,
    /// FPS above which the resolution scale increases.
    pub drs_up_threshold: f32,
    /// Scale change applied per adjustment.
    pub resolution_step: f32,
    /// Lowest resolution scale the controller may select.
    pub min_resolution_scale: f32,
}

/// A quality tier name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    High,
    Medium,
    Low,
}

/// Optional effects enabled at one tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityTierConfig {
    /// Minimum sustained FPS for this tier.
    pub min_fps: f32,
    pub multi_layer_atmosphere: bool,
    pub ocean_reflections: bool,
    pub cloud_layer: bool,
    pub meteor_showers: bool,
}

impl Default for QualityTierConfig {
    fn default() -> Self {
        Self {
            min_fps: 0.0,
            multi_layer_atmosphere: false,
            ocean_reflections: false,
            cloud_layer: false,
            meteor_showers: false,
        }
    }
}

/// The three quality tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityLevels {
    pub high: QualityTierConfig,
    pub medium: QualityTierConfig,
    pub low: QualityTierConfig,
}

impl QualityLevels {
    /// Settings for `tier`.
    pub fn tier(&self, tier: QualityTier) -> &QualityTierConfig {
        match tier {
            QualityTier::High => &self.high,
            QualityTier::Medium => &self.medium,
            QualityTier::Low => &self.low,
        }
    }
}

/// Texture paths, relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TexturePaths {
    pub root: String,
    pub earth_day: String,
    pub earth_night: String,
    pub earth_normal: String,
    pub earth_bump: String,
    pub clouds: String,
    pub moon: String,
    pub moon_bump: String,
}

/// Day or night surface of the planet body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceMode {
    Day,
    Night,
}

impl SurfaceMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Day => Self::Night,
            Self::Night => Self::Day,
        }
    }
}

/// Target transform for one body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BodyTransform {
    pub position: [f32; 3],
    pub scale: f32,
    /// Rotation about the Y axis in radians.
    pub rotation: f32,
}

/// Target transforms applied when a section becomes active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SectionTransforms {
    pub earth: BodyTransform,
    pub moon: BodyTransform,
    /// Surface mode the section is designed for.
    pub mode: SurfaceMode,
}

/// Per-section transform table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SectionTable {
    pub hero: SectionTransforms,
    pub features: SectionTransforms,
    pub about: SectionTransforms,
    pub contact: SectionTransforms,
}

impl SectionTable {
    /// Transforms for the section mapped to `name`.
    pub fn get(&self, name: PresetName) -> &SectionTransforms {
        match name {
            PresetName::Hero => &self.hero,
            PresetName::Features => &self.features,
            PresetName::About => &self.about,
            PresetName::Contact => &self.contact,
        }
    }
}

/// Showcase demo mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShowcaseConfig {
    /// Default duration when the event carries none.
    pub default_duration_ms: u32,
    /// Multiplier on cloud speed and pulse amplitude while active.
    pub boost: f32,
    /// Spacing between the scheduled meteor showers.
    pub shower_interval_ms: u32,
    /// Scale bump applied to the body while active.
    pub scale_bump: f32,
    /// Lead time before the end at which the scale bump is reverted.
    pub scale_restore_lead_ms: u32,
}

/// Initialization timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InitConfig {
    /// Timeout for the primary texture set, also used as the init watchdog.
    pub asset_timeout_ms: u32,
    /// Frame budget on low-end devices.
    pub low_end_frame_budget_ms: f32,
    /// Root margin of the viewport-visibility observer in pixels.
    pub viewport_margin_px: f32,
}

/// One feature card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardRecord {
    pub title: String,
    pub subtitle: String,
    pub text: String,
    pub link: String,
    /// Icon identifier (`about`, `projects`, `photos`, `videos`, `blog`).
    pub icon: String,
    /// Accent color as `#rrggbb`.
    pub color: String,
}

impl CardRecord {
    fn new(title: &str, subtitle: &str, text: &str, link: &str, icon: &str, color: &str) -> Self {
        Self {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            text: text.to_string(),
            link: link.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        }
    }

    /// The built-in feature cards.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(
                "Über mich",
                "ÜBER MICH",
                "Kurz & knapp: Wer ich bin, was mich antreibt und meine Vision.",
                "/about/",
                "about",
                "#07a1ff",
            ),
            Self::new(
                "Projekte",
                "PROJEKTE",
                "Auswahl an Projekten - Konzept, Umsetzung und Ergebnis.",
                "/projekte/",
                "projects",
                "#a107ff",
            ),
            Self::new(
                "Fotos",
                "FOTOS",
                "Momente und Perspektiven, die mich inspirieren.",
                "/gallery/",
                "photos",
                "#ff07a1",
            ),
            Self::new(
                "Videos",
                "VIDEOS",
                "Meine Videosammlung - Technik, Making-of und Stories.",
                "/videos/",
                "videos",
                "#07ffbc",
            ),
            Self::new(
                "Blog",
                "BLOG",
                "Aktuelle Gedanken, Learnings und Updates rund um meine Arbeit.",
                "/blog/",
                "blog",
                "#ffb807",
            ),
        ]
    }
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Terra".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            force_three: false,
        }
    }
}

impl Default for EarthBodyConfig {
    fn default() -> Self {
        Self {
            radius: 3.5,
            segments: 64,
            segments_mobile: 32,
            bump_scale: 0.008,
            emissive_intensity: 0.2,
            emissive_pulse_speed: 0.3,
            emissive_pulse_amplitude: 0.08,
            night_emissive_color: 0xffcc66,
            night_emissive_multiplier: 4.0,
            initial_position: [0.0, -6.0, 0.0],
            initial_scale: 1.5,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            altitude: 0.03,
            rotation_speed: 0.0008,
            opacity: 0.3,
        }
    }
}

impl Default for AtmosphereConfig {
    fn default() -> Self {
        Self {
            scale: 1.015,
            fresnel_power: 4.5,
            rayleigh_color: 0x4488ff,
            mie_color: 0xffbb66,
            rayleigh_intensity: 0.08,
            mie_intensity: 0.04,
            scattering_strength: 0.18,
        }
    }
}

impl Default for SunConfig {
    fn default() -> Self {
        Self {
            radius: 15.0,
            height: 3.0,
            intensity: 1.8,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            day: LightingPreset::default(),
            night: LightingPreset {
                ambient_intensity: 0.3,
                ambient_color: 0x202845,
                sun_intensity: 0.35,
            },
        }
    }
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            count: 3000,
            twinkle_speed: 0.2,
            animation: StarAnimationConfig::default(),
        }
    }
}

impl Default for StarAnimationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 2800,
            camera_settle_delay_ms: 1800,
            card_fade_start: 0.75,
            card_fade_end: 0.95,
            spread_xy: 0.02,
            spread_z: 0.01,
            target_depth: -2.0,
            scroll_throttle_ms: 150,
            max_points_per_element: 120,
            screen_jitter_px: 2.0,
            depth_jitter: 0.05,
        }
    }
}

impl Default for MoonConfig {
    fn default() -> Self {
        Self {
            radius: 0.95,
            distance: 25.0,
            orbit_speed: 0.00025,
            segments: 48,
            bump_scale: 0.015,
            lod_levels: vec![
                MoonLodLevel {
                    segments: 48,
                    distance: 0.0,
                },
                MoonLodLevel {
                    segments: 28,
                    distance: 15.0,
                },
                MoonLodLevel {
                    segments: 16,
                    distance: 40.0,
                },
            ],
            start_position: [25.0, 2.0, -10.0],
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            fov_mobile: 55.0,
            mobile_breakpoint: 768.0,
            near: 0.1,
            far: 1000.0,
            zoom_min: 5.0,
            zoom_max: 25.0,
            lerp_factor: 0.06,
            transition_duration: 1.8,
            presets: CameraPresets::default(),
            drag: DragConfig::default(),
        }
    }
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.005,
            inertia_damping: 0.95,
            auto_rotate_delay_ms: 3000,
        }
    }
}

impl Default for CameraPresets {
    fn default() -> Self {
        Self {
            hero: CameraPreset {
                position: [-6.5, 4.8, 10.5],
                look_at: [0.0, -0.5, 0.0],
            },
            features: CameraPreset {
                position: [7.0, 5.5, 7.5],
                look_at: [0.0, 0.5, 0.0],
            },
            about: CameraPreset {
                position: [-3.2, 3.0, 9.5],
                look_at: [0.0, 0.0, 0.0],
            },
            contact: CameraPreset {
                position: [-0.5, 3.0, 9.5],
                look_at: [0.0, 0.0, 0.0],
            },
        }
    }
}

impl Default for CameraPreset {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 10.0],
            look_at: [0.0, 0.0, 0.0],
        }
    }
}

impl Default for ShootingStarConfig {
    fn default() -> Self {
        Self {
            base_frequency: 0.003,
            shower_frequency: 0.02,
            shower_duration: 180.0,
            shower_cooldown: 1200.0,
            max_simultaneous: 3,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            pixel_ratio_cap: 1.5,
            narrow_pixel_ratio: 1.0,
            wide_viewport_width: 1200.0,
            target_fps: 30.0,
            drs_down_threshold: 25.0,
            drs_up_threshold: 35.0,
            resolution_step: 0.25,
            min_resolution_scale: 0.5,
        }
    }
}

impl Default for QualityLevels {
    fn default() -> Self {
        Self {
            high: QualityTierConfig {
                min_fps: 28.0,
                multi_layer_atmosphere: true,
                ocean_reflections: true,
                cloud_layer: true,
                meteor_showers: true,
            },
            medium: QualityTierConfig {
                min_fps: 18.0,
                multi_layer_atmosphere: false,
                ocean_reflections: true,
                cloud_layer: true,
                meteor_showers: true,
            },
            low: QualityTierConfig::default(),
        }
    }
}

impl Default for TexturePaths {
    fn default() -> Self {
        Self {
            root: "assets/textures".to_string(),
            earth_day: "earth_day.webp".to_string(),
            earth_night: "earth_night.webp".to_string(),
            earth_normal: "earth_normal.webp".to_string(),
            earth_bump: "earth_bump.webp".to_string(),
            clouds: "earth_clouds_1024.png".to_string(),
            moon: "moon_texture.webp".to_string(),
            moon_bump: "moon_bump.webp".to_string(),
        }
    }
}

impl Default for SectionTransforms {
    fn default() -> Self {
        SectionTable::default().hero
    }
}

impl Default for SectionTable {
    fn default() -> Self {
        let parked_moon = BodyTransform {
            position: [-45.0, -45.0, -90.0],
            scale: 0.4,
            rotation: 0.0,
        };
        Self {
            hero: SectionTransforms {
                earth: BodyTransform {
                    position: [1.0, -2.5, -1.0],
                    scale: 1.3,
                    rotation: 0.0,
                },
                moon: parked_moon,
                mode: SurfaceMode::Day,
            },
            features: SectionTransforms {
                earth: BodyTransform {
                    position: [-7.0, -2.0, -4.0],
                    scale: 0.7,
                    rotation: 0.0,
                },
                moon: BodyTransform {
                    position: [1.0, 2.0, -5.0],
                    scale: 1.1,
                    rotation: 0.0,
                },
                mode: SurfaceMode::Day,
            },
            about: SectionTransforms {
                earth: BodyTransform {
                    position: [-1.0, -0.5, -1.0],
                    scale: 1.0,
                    rotation: PI,
                },
                moon: parked_moon,
                mode: SurfaceMode::Night,
            },
            contact: SectionTransforms {
                earth: BodyTransform {
                    position: [0.0, -1.5, 0.0],
                    scale: 1.1,
                    rotation: FRAC_PI_2,
                },
                moon: parked_moon,
                mode: SurfaceMode::Day,
            },
        }
    }
}

impl Default for ShowcaseConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 8000,
            boost: 3.0,
            shower_interval_ms: 1200,
            scale_bump: 1.06,
            scale_restore_lead_ms: 300,
        }
    }
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            asset_timeout_ms: 10_000,
            low_end_frame_budget_ms: 1000.0 / 30.0,
            viewport_margin_px: 50.0,
        }
    }
}

// --- Load / Save / Reload ---

const CONFIG_FILE: &str = "terra.ron";

impl EarthConfig {
    /// Platform config directory (`<config_dir>/terra`), if the OS exposes one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("terra"))
    }

    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: EarthConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = EarthConfig::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `terra.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: EarthConfig = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Star count for the given device class (halved on mobile).
    pub fn star_count(&self, mobile: bool) -> usize {
        if mobile {
            (self.stars.count / 2) as usize
        } else {
            self.stars.count as usize
        }
    }

    /// Sphere segment count for the given device class.
    pub fn earth_segments(&self, mobile: bool) -> u32 {
        if mobile {
            self.earth.segments_mobile
        } else {
            self.earth.segments
        }
    }
}
