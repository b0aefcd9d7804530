//! Device capability detection and the device-specific config override.
//!
//! Detection combines coarse host signals (user agent, viewport width, core
//! count) with an optional warm-up frame-time probe. A probe, when available,
//! decides the low-end flag on its own since measured frame cost is a better
//! signal than a user-agent string.

use crate::config::{EarthConfig, QualityTier};
use crate::store::ConfigOverride;

/// What the host reports about the device.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEnvironment {
    pub user_agent: String,
    /// Viewport width in logical pixels.
    pub viewport_width: f32,
    /// Viewport height in logical pixels.
    pub viewport_height: f32,
    pub device_pixel_ratio: f32,
    /// Logical cores, if the host exposes them.
    pub hardware_concurrency: Option<usize>,
    /// Set by the `forceThree=1` query parameter or a global override flag.
    pub force_three: bool,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            viewport_width: 1280.0,
            viewport_height: 720.0,
            device_pixel_ratio: 1.0,
            hardware_concurrency: None,
            force_three: false,
        }
    }
}

/// Frame times measured over a short warm-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameProbe {
    pub frame_times_ms: Vec<f32>,
}

impl FrameProbe {
    /// Minimum sample count for the probe to be trusted.
    pub const MIN_SAMPLES: usize = 10;

    /// Median frame time, or `None` with too few samples.
    pub fn median_ms(&self) -> Option<f32> {
        if self.frame_times_ms.len() < Self::MIN_SAMPLES {
            return None;
        }
        let mut sorted: Vec<f32> = self
            .frame_times_ms
            .iter()
            .copied()
            .filter(|t| t.is_finite() && *t > 0.0)
            .collect();
        if sorted.len() < Self::MIN_SAMPLES {
            return None;
        }
        sorted.sort_by(f32::total_cmp);
        Some(sorted[sorted.len() / 2])
    }
}

/// The three-tier capability contract consumed by the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    pub is_mobile: bool,
    pub is_low_end: bool,
    pub recommended_quality: QualityTier,
}

const MOBILE_MARKERS: [&str; 6] = ["mobile", "tablet", "android", "ios", "iphone", "ipad"];
const OLD_OS_MARKERS: [&str; 5] = ["android 4", "android 5", "android 6", "os 9_", "os 10_"];

/// Median FPS under which a probed device is considered low-end.
const PROBE_LOW_END_FPS: f32 = 20.0;

impl DeviceCapabilities {
    /// Classify the device from host signals and an optional warm-up probe.
    pub fn detect(env: &HostEnvironment, probe: Option<&FrameProbe>) -> Self {
        let ua = env.user_agent.to_ascii_lowercase();
        let is_mobile = MOBILE_MARKERS.iter().any(|m| ua.contains(m));

        let heuristic_low_end = OLD_OS_MARKERS.iter().any(|m| ua.contains(m))
            || env.hardware_concurrency.is_some_and(|cores| cores <= 2);

        let is_low_end = match probe.and_then(FrameProbe::median_ms) {
            Some(median) => 1000.0 / median < PROBE_LOW_END_FPS,
            None => heuristic_low_end,
        };

        let recommended_quality = if is_low_end {
            QualityTier::Low
        } else if is_mobile {
            QualityTier::Medium
        } else {
            QualityTier::High
        };

        Self {
            is_mobile,
            is_low_end,
            recommended_quality,
        }
    }

    /// A forced low-end profile, used by `--low-end` and tests.
    pub fn low_end() -> Self {
        Self {
            is_mobile: true,
            is_low_end: true,
            recommended_quality: QualityTier::Low,
        }
    }

    /// Whether the reduced tessellation preset should be used. Low-end devices
    /// and narrow viewports take the mobile preset as well.
    pub fn uses_mobile_geometry(&self, env: &HostEnvironment, config: &EarthConfig) -> bool {
        self.is_mobile || self.is_low_end || env.viewport_width <= config.camera.mobile_breakpoint
    }

    /// The one-time device override merged at startup.
    pub fn device_override(&self, env: &HostEnvironment) -> ConfigOverride {
        if self.is_low_end {
            ConfigOverride {
                earth_segments: Some(24),
                earth_segments_mobile: Some(16),
                star_count: Some(1000),
                pixel_ratio_cap: Some(1.0),
                cloud_opacity: Some(0.0),
                ..Default::default()
            }
        } else if self.is_mobile {
            ConfigOverride {
                star_count: Some(2000),
                pixel_ratio_cap: Some(env.device_pixel_ratio.min(2.0)),
                ..Default::default()
            }
        } else {
            ConfigOverride::default()
        }
    }
}
