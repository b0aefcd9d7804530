//! Versioned effective configuration with pure overrides and rollback.
//!
//! Components receive `&EarthConfig` at construction. Runtime adjustments
//! (device tuning, showcase mode, public patches) are [`ConfigOverride`]
//! values merged into a new configuration; the store never mutates a shared
//! value in place.

use std::sync::Arc;

use crate::config::EarthConfig;
use crate::error::ConfigError;

/// A partial configuration. `None` fields leave the base value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverride {
    pub earth_segments: Option<u32>,
    pub earth_segments_mobile: Option<u32>,
    pub star_count: Option<u32>,
    pub pixel_ratio_cap: Option<f32>,
    pub cloud_opacity: Option<f32>,
    pub cloud_rotation_speed: Option<f32>,
    pub emissive_pulse_speed: Option<f32>,
    pub emissive_pulse_amplitude: Option<f32>,
    pub twinkle_speed: Option<f32>,
    pub camera_transition_duration: Option<f32>,
    pub scroll_throttle_ms: Option<u32>,
    pub shooting_star_base_frequency: Option<f32>,
}

macro_rules! override_fields {
    ($m:ident) => {
        $m!(earth_segments, earth.segments);
        $m!(earth_segments_mobile, earth.segments_mobile);
        $m!(star_count, stars.count);
        $m!(pixel_ratio_cap, performance.pixel_ratio_cap);
        $m!(cloud_opacity, clouds.opacity);
        $m!(cloud_rotation_speed, clouds.rotation_speed);
        $m!(emissive_pulse_speed, earth.emissive_pulse_speed);
        $m!(emissive_pulse_amplitude, earth.emissive_pulse_amplitude);
        $m!(twinkle_speed, stars.twinkle_speed);
        $m!(camera_transition_duration, camera.transition_duration);
        $m!(scroll_throttle_ms, stars.animation.scroll_throttle_ms);
        $m!(shooting_star_base_frequency, shooting_stars.base_frequency);
    };
}

impl ConfigOverride {
    /// Whether this override sets no field.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge `later` on top of `self`; fields set in `later` win.
    pub fn then(mut self, later: &ConfigOverride) -> Self {
        macro_rules! take {
            ($field:ident, $($path:ident).+) => {
                if later.$field.is_some() {
                    self.$field = later.$field;
                }
            };
        }
        override_fields!(take);
        self
    }

    /// The values `base` currently holds for every field this override sets.
    /// Applying the result undoes `self`.
    pub fn capture(&self, base: &EarthConfig) -> ConfigOverride {
        let mut inverse = ConfigOverride::default();
        macro_rules! capture {
            ($field:ident, $($path:ident).+) => {
                if self.$field.is_some() {
                    inverse.$field = Some(base.$($path).+);
                }
            };
        }
        override_fields!(capture);
        inverse
    }
}

impl EarthConfig {
    /// Produce a new configuration with `overrides` applied.
    pub fn merged(&self, overrides: &ConfigOverride) -> EarthConfig {
        let mut next = self.clone();
        macro_rules! apply {
            ($field:ident, $($path:ident).+) => {
                if let Some(value) = overrides.$field {
                    next.$($path).+ = value;
                }
            };
        }
        override_fields!(apply);
        next
    }
}

/// Handle to a rollback point held by a [`ConfigStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(u64);

/// Holds the effective configuration and its version.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    current: Arc<EarthConfig>,
    version: u64,
    snapshots: Vec<(SnapshotId, ConfigOverride)>,
    next_snapshot: u64,
}

impl ConfigStore {
    /// Start a store at version 0.
    pub fn new(base: EarthConfig) -> Self {
        Self {
            current: Arc::new(base),
            version: 0,
            snapshots: Vec::new(),
            next_snapshot: 0,
        }
    }

    /// The effective configuration.
    pub fn current(&self) -> &Arc<EarthConfig> {
        &self.current
    }

    /// Incremented on every change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Merge `overrides` into the effective configuration.
    pub fn apply(&mut self, overrides: &ConfigOverride) -> u64 {
        if overrides.is_empty() {
            return self.version;
        }
        self.current = Arc::new(self.current.merged(overrides));
        self.version += 1;
        self.version
    }

    /// Like [`apply`](Self::apply) but records the replaced values so the
    /// change can be reverted with [`rollback`](Self::rollback).
    pub fn apply_with_snapshot(&mut self, overrides: &ConfigOverride) -> SnapshotId {
        let id = SnapshotId(self.next_snapshot);
        self.next_snapshot += 1;
        self.snapshots.push((id, overrides.capture(&self.current)));
        self.apply(overrides);
        id
    }

    /// Restore the values replaced by the snapshot's override.
    pub fn rollback(&mut self, id: SnapshotId) -> Result<u64, ConfigError> {
        let index = self
            .snapshots
            .iter()
            .position(|(sid, _)| *sid == id)
            .ok_or(ConfigError::UnknownSnapshot(id.0))?;
        let (_, inverse) = self.snapshots.remove(index);
        log::debug!("Rolling back config snapshot {}", id.0);
        Ok(self.apply(&inverse))
    }

    /// Whether `id` can still be rolled back.
    pub fn has_snapshot(&self, id: SnapshotId) -> bool {
        self.snapshots.iter().any(|(sid, _)| *sid == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_pure() {
        let base = EarthConfig::default();
        let merged = base.merged(&ConfigOverride {
            cloud_opacity: Some(0.0),
            ..Default::default()
        });
        assert_eq!(merged.clouds.opacity, 0.0);
        assert_eq!(base.clouds.opacity, 0.3, "base must not change");
        assert_eq!(merged.earth, base.earth);
    }

    #[test]
    fn test_empty_override_keeps_version() {
        let mut store = ConfigStore::new(EarthConfig::default());
        assert_eq!(store.apply(&ConfigOverride::default()), 0);
    }

    #[test]
    fn test_apply_bumps_version() {
        let mut store = ConfigStore::new(EarthConfig::default());
        let v = store.apply(&ConfigOverride {
            star_count: Some(1000),
            ..Default::default()
        });
        assert_eq!(v, 1);
        assert_eq!(store.current().stars.count, 1000);
    }

    #[test]
    fn test_rollback_restores_only_overridden_fields() {
        let mut store = ConfigStore::new(EarthConfig::default());
        let snap = store.apply_with_snapshot(&ConfigOverride {
            cloud_rotation_speed: Some(0.0024),
            emissive_pulse_amplitude: Some(0.24),
            ..Default::default()
        });
        // An unrelated patch during the snapshot's lifetime must survive rollback.
        store.apply(&ConfigOverride {
            twinkle_speed: Some(0.5),
            ..Default::default()
        });

        store.rollback(snap).unwrap();
        let config = store.current();
        assert_eq!(config.clouds.rotation_speed, 0.0008);
        assert_eq!(config.earth.emissive_pulse_amplitude, 0.08);
        assert_eq!(config.stars.twinkle_speed, 0.5);
        assert!(!store.has_snapshot(snap));
    }

    #[test]
    fn test_double_rollback_errors() {
        let mut store = ConfigStore::new(EarthConfig::default());
        let snap = store.apply_with_snapshot(&ConfigOverride {
            cloud_opacity: Some(0.9),
            ..Default::default()
        });
        assert!(store.rollback(snap).is_ok());
        assert!(matches!(
            store.rollback(snap),
            Err(ConfigError::UnknownSnapshot(_))
        ));
    }

    #[test]
    fn test_then_prefers_later_fields() {
        let a = ConfigOverride {
            star_count: Some(1000),
            pixel_ratio_cap: Some(1.0),
            ..Default::default()
        };
        let b = ConfigOverride {
            star_count: Some(2000),
            ..Default::default()
        };
        let merged = a.then(&b);
        assert_eq!(merged.star_count, Some(2000));
        assert_eq!(merged.pixel_ratio_cap, Some(1.0));
    }
}
