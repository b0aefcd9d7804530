//! Timed demo mode: boosted clouds and pulse, an orbit swing, a scale bump
//! and a series of meteor showers.

use terra_config::{ConfigOverride, EarthConfig, ShowcaseConfig, SnapshotId};

const SECONDS_PER_SHOWER: u64 = 2000;

/// Duration requested by the showcase event's `detail.duration`, in ms.
pub fn requested_duration(detail: Option<&serde_json::Value>) -> Option<u64> {
    let value = detail?.get("duration")?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite() && *v > 0.0).map(|v| v as u64))
        .filter(|ms| *ms > 0)
}

/// The boosted values applied while the showcase runs.
pub fn showcase_override(config: &EarthConfig) -> ConfigOverride {
    let boost = config.showcase.boost;
    ConfigOverride {
        cloud_rotation_speed: Some(config.clouds.rotation_speed * boost),
        emissive_pulse_amplitude: Some(config.earth.emissive_pulse_amplitude * boost),
        ..Default::default()
    }
}

pub fn shower_count(duration_ms: u64) -> u64 {
    (duration_ms / SECONDS_PER_SHOWER).max(2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowcaseStep {
    Shower,
    RestoreScale,
    End,
}

/// A running showcase: its pending steps and what it must undo.
#[derive(Debug, Clone)]
pub struct Showcase {
    steps: Vec<(f64, ShowcaseStep)>,
    snapshot: SnapshotId,
    base_scale: f32,
}

impl Showcase {
    /// Schedule every step relative to `now` (seconds).
    pub fn plan(
        now: f64,
        duration_ms: u64,
        config: &ShowcaseConfig,
        snapshot: SnapshotId,
        base_scale: f32,
    ) -> Self {
        let at = |ms: u64| now + ms as f64 / 1000.0;
        let mut steps: Vec<(f64, ShowcaseStep)> = (0..shower_count(duration_ms))
            .map(|i| (at(i * u64::from(config.shower_interval_ms)), ShowcaseStep::Shower))
            .collect();
        steps.push((
            at(duration_ms.saturating_sub(u64::from(config.scale_restore_lead_ms))),
            ShowcaseStep::RestoreScale,
        ));
        steps.push((at(duration_ms), ShowcaseStep::End));
        steps.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            steps,
            snapshot,
            base_scale,
        }
    }

    /// Remove and return the steps due at `now`, in order.
    pub fn due(&mut self, now: f64) -> Vec<ShowcaseStep> {
        let split = self.steps.partition_point(|(at, _)| *at <= now);
        self.steps.drain(..split).map(|(_, step)| step).collect()
    }

    pub fn snapshot(&self) -> SnapshotId {
        self.snapshot
    }

    /// Body scale to return to when the bump ends.
    pub fn base_scale(&self) -> f32 {
        self.base_scale
    }

    pub fn is_finished(&self) -> bool {
        self.steps.is_empty()
    }
}
