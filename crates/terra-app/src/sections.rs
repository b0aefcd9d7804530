//! Page section tracking and the per-section body transforms.

use std::f32::consts::PI;

use glam::Vec3;
use terra_animation::{damp, damp_vec3};
use terra_camera::preset_for_section;
use terra_cards::CardDirection;
use terra_config::{BodyTransform, PresetName, SurfaceMode};

/// The footer is observed through a trigger zone above it.
pub const FOOTER_TRIGGER_ID: &str = "footer-trigger-zone";
pub const FOOTER_ID: &str = "site-footer";

const POSITION_RATE: f32 = 0.04;
const SCALE_RATE: f32 = 0.06;
const ROTATION_RATE: f32 = 0.06;
const ROTATION_EPSILON: f32 = 0.001;

/// One observed section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionEntry {
    pub id: String,
    /// Visible fraction of the section.
    pub ratio: f32,
    pub intersecting: bool,
}

impl SectionEntry {
    pub fn new(id: impl Into<String>, ratio: f32, intersecting: bool) -> Self {
        Self {
            id: id.into(),
            ratio,
            intersecting,
        }
    }
}

/// The most visible entry, if it is intersecting. Ties keep the first.
pub fn best_entry(entries: &[SectionEntry]) -> Option<&SectionEntry> {
    let mut best: Option<&SectionEntry> = None;
    for entry in entries {
        if best.is_none_or(|b| entry.ratio > b.ratio) {
            best = Some(entry);
        }
    }
    best.filter(|b| b.intersecting)
}

pub fn map_section_id(id: &str) -> &str {
    if id == FOOTER_TRIGGER_ID { FOOTER_ID } else { id }
}

/// Preset for an observed element id, through the footer alias.
pub fn section_preset(id: &str) -> Option<PresetName> {
    preset_for_section(map_section_id(id))
}

/// A change of the active section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionChange {
    pub previous: Option<PresetName>,
    pub next: PresetName,
    /// Only leaving `features` for `about` swaps day and night.
    pub flips_mode: bool,
}

impl SectionChange {
    pub fn between(previous: Option<PresetName>, next: PresetName) -> Option<Self> {
        if previous == Some(next) {
            return None;
        }
        Some(Self {
            previous,
            next,
            flips_mode: previous == Some(PresetName::Features) && next == PresetName::About,
        })
    }

    /// Scroll direction implied by the section order.
    pub fn direction(&self) -> CardDirection {
        match self.previous {
            Some(prev) if self.next.order() < prev.order() => CardDirection::Up,
            _ => CardDirection::Down,
        }
    }

    pub fn enters(&self, preset: PresetName) -> bool {
        self.next == preset
    }

    pub fn leaves(&self, preset: PresetName) -> bool {
        self.previous == Some(preset)
    }
}

/// Camera orbit angle that shows the lit side for `mode`.
pub fn orbit_angle_for(mode: SurfaceMode) -> f32 {
    match mode {
        SurfaceMode::Day => 0.0,
        SurfaceMode::Night => PI,
    }
}

/// A body easing toward its section transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMotion {
    pub position: Vec3,
    pub scale: f32,
    pub rotation: f32,
    pub target_position: Vec3,
    pub target_scale: f32,
    /// `None` leaves the rotation to someone else.
    pub target_rotation: Option<f32>,
}

impl BodyMotion {
    pub fn at(position: Vec3, scale: f32) -> Self {
        Self {
            position,
            scale,
            rotation: 0.0,
            target_position: position,
            target_scale: scale,
            target_rotation: None,
        }
    }

    pub fn set_target(&mut self, target: &BodyTransform, with_rotation: bool) {
        self.target_position = Vec3::from(target.position);
        self.target_scale = target.scale;
        if with_rotation {
            self.target_rotation = Some(target.rotation);
        }
    }

    pub fn update(&mut self, dt: f32) {
        self.position = damp_vec3(self.position, self.target_position, POSITION_RATE, dt);
        self.scale = damp(self.scale, self.target_scale, SCALE_RATE, dt);
        if let Some(target) = self.target_rotation
            && (target - self.rotation).abs() > ROTATION_EPSILON
        {
            self.rotation = damp(self.rotation, target, ROTATION_RATE, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_best_entry() {
        let entries = vec![
            SectionEntry::new("hero", 0.2, true),
            SectionEntry::new("features", 0.7, true),
            SectionEntry::new("section3", 0.7, true),
        ];
        assert_eq!(best_entry(&entries).map(|e| e.id.as_str()), Some("features"));

        let hidden = vec![SectionEntry::new("hero", 0.9, false), SectionEntry::new("features", 0.1, true)];
        assert!(best_entry(&hidden).is_none());
        assert!(best_entry(&[]).is_none());
    }

    #[test]
    fn test_footer_alias() {
        assert_eq!(section_preset(FOOTER_TRIGGER_ID), Some(PresetName::Contact));
        assert_eq!(section_preset("section3"), Some(PresetName::About));
        assert_eq!(section_preset("imprint"), None);
    }

    #[test]
    fn test_only_features_to_about_flips() {
        for prev in PresetName::ALL {
            for next in PresetName::ALL {
                let Some(change) = SectionChange::between(Some(prev), next) else {
                    assert_eq!(prev, next);
                    continue;
                };
                let expected = prev == PresetName::Features && next == PresetName::About;
                assert_eq!(change.flips_mode, expected, "{prev:?} -> {next:?}");
            }
        }
        assert!(!SectionChange::between(None, PresetName::About).unwrap().flips_mode);
    }

    #[test]
    fn test_direction_follows_order() {
        let down = SectionChange::between(Some(PresetName::Hero), PresetName::Features).unwrap();
        assert_eq!(down.direction(), CardDirection::Down);
        let up = SectionChange::between(Some(PresetName::About), PresetName::Features).unwrap();
        assert_eq!(up.direction(), CardDirection::Up);
    }

    #[test]
    fn test_body_motion_converges() {
        let mut body = BodyMotion::at(Vec3::ZERO, 1.0);
        body.set_target(
            &BodyTransform {
                position: [-7.0, -2.0, -4.0],
                scale: 0.7,
                rotation: PI,
            },
            true,
        );
        for _ in 0..600 {
            body.update(DT);
        }
        assert!(body.position.distance(Vec3::new(-7.0, -2.0, -4.0)) < 1e-3);
        assert!((body.scale - 0.7).abs() < 1e-3);
        assert!((body.rotation - PI).abs() <= ROTATION_EPSILON * 2.0);
    }

    #[test]
    fn test_rotation_untouched_without_target() {
        let mut moon = BodyMotion::at(Vec3::ONE, 0.4);
        moon.rotation = 2.0;
        moon.set_target(
            &BodyTransform {
                position: [0.0; 3],
                scale: 1.0,
                rotation: 0.0,
            },
            false,
        );
        moon.update(DT);
        assert_eq!(moon.rotation, 2.0);
    }
}
