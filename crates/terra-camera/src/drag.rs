//! Pointer drag rotation with inertia.

use terra_animation::tick_scale;
use terra_config::DragConfig;

/// Velocities below this are treated as stopped.
const REST_VELOCITY: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    dragging: bool,
    last_x: f32,
    velocity: f32,
    resume_at: f64,
    auto_rotating: bool,
}

impl Default for DragState {
    fn default() -> Self {
        Self {
            dragging: false,
            last_x: 0.0,
            velocity: 0.0,
            resume_at: 0.0,
            auto_rotating: true,
        }
    }
}

impl DragState {
    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// False from a pointer press until the drag has come to rest and the
    /// resume delay has passed.
    pub fn is_auto_rotating(&self) -> bool {
        self.auto_rotating
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub(crate) fn press(&mut self, x: f32) {
        self.dragging = true;
        self.last_x = x;
        self.velocity = 0.0;
        self.auto_rotating = false;
    }

    /// Returns the angle delta produced by the move, or `None` when not
    /// dragging.
    pub(crate) fn motion(&mut self, x: f32, config: &DragConfig) -> Option<f32> {
        if !self.dragging {
            return None;
        }
        let dx = x - self.last_x;
        self.last_x = x;
        self.velocity = dx * config.sensitivity;
        Some(self.velocity)
    }

    pub(crate) fn release(&mut self, now: f64, config: &DragConfig) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        self.resume_at = now + f64::from(config.auto_rotate_delay_ms) / 1000.0;
    }

    /// Advance inertia by `dt` seconds. Returns the angle to subtract from the
    /// target orbit angle.
    pub(crate) fn coast(&mut self, now: f64, dt: f32, config: &DragConfig) -> f32 {
        if self.dragging {
            return 0.0;
        }
        let mut delta = 0.0;
        if self.velocity.abs() > REST_VELOCITY {
            let ticks = tick_scale(dt);
            delta = self.velocity * ticks;
            self.velocity *= config.inertia_damping.clamp(0.0, 1.0).powf(ticks);
        }
        if !self.auto_rotating && self.velocity.abs() < REST_VELOCITY && now > self.resume_at {
            self.auto_rotating = true;
        }
        delta
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_only_while_dragging() {
        let config = DragConfig::default();
        let mut drag = DragState::default();
        assert_eq!(drag.motion(10.0, &config), None);
        drag.press(100.0);
        assert!(!drag.is_auto_rotating());
        let delta = drag.motion(120.0, &config).unwrap();
        assert!((delta - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_inertia_decays_then_resumes() {
        let config = DragConfig::default();
        let mut drag = DragState::default();
        drag.press(0.0);
        drag.motion(40.0, &config);
        drag.release(0.0, &config);

        let mut total = 0.0;
        let mut now = 0.0;
        for frame in 1..=600 {
            now += 1.0 / 60.0;
            total += drag.coast(now, 1.0 / 60.0, &config);
            if frame == 60 {
                assert!(!drag.is_auto_rotating(), "still coasting after one second");
            }
        }
        assert!(drag.velocity().abs() < REST_VELOCITY);
        // Geometric series of 0.2 with ratio 0.95 sums to about 4.
        assert!((total - 4.0).abs() < 0.05, "coasted {total}");
        assert!(drag.is_auto_rotating());
    }
}
