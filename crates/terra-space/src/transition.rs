//! The morph scalar and the card fade derived from it.

use terra_animation::{Easing, Tween};

/// Transitions this close to their target are not restarted.
const SETTLED_EPSILON: f32 = 0.01;

/// Time-driven `transition ∈ [0, 1]`. The value changes through
/// [`MorphTransition::update`], or snaps when a start lands within the
/// settle distance of its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphTransition {
    value: f32,
    from: f32,
    to: f32,
    duration: f64,
    tween: Option<Tween>,
}

impl MorphTransition {
    /// `duration` is in seconds.
    pub fn new(duration: f64) -> Self {
        Self {
            value: 0.0,
            from: 0.0,
            to: 0.0,
            duration,
            tween: None,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// The value the current or last run heads to.
    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn is_active(&self) -> bool {
        self.tween.is_some()
    }

    /// Start easing toward `target` from the current value. Returns `false`
    /// when already there.
    pub fn start(&mut self, target: f32, now: f64) -> bool {
        let target = target.clamp(0.0, 1.0);
        if (self.value - target).abs() < SETTLED_EPSILON {
            self.tween = None;
            self.value = target;
            self.to = target;
            return false;
        }
        self.from = self.value;
        self.to = target;
        self.tween = Some(Tween::new(now, self.duration, Easing::InOutCubic));
        true
    }

    /// Sample the transition at `now`.
    pub fn update(&mut self, now: f64) -> f32 {
        if let Some(tween) = self.tween {
            let eased = tween.eased(now);
            self.value = (self.from + (self.to - self.from) * eased).clamp(0.0, 1.0);
            if tween.is_finished(now) {
                self.tween = None;
            }
        }
        self.value
    }

    pub fn cancel(&mut self) {
        self.tween = None;
    }
}

/// Card opacity for a transition value: zero up to `start`, one from `end`,
/// linear in between.
pub fn card_opacity(transition: f32, start: f32, end: f32) -> f32 {
    if end <= start {
        return if transition >= start { 1.0 } else { 0.0 };
    }
    ((transition - start) / (end - start)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_to_target_and_back() {
        let mut t = MorphTransition::new(2.8);
        assert!(t.start(1.0, 0.0));
        assert!(t.is_active());
        assert!((t.update(1.4) - 0.5).abs() < 1e-4);
        assert_eq!(t.update(2.8), 1.0);
        assert!(!t.is_active());

        assert!(t.start(0.0, 3.0));
        assert_eq!(t.update(10.0), 0.0);
    }

    #[test]
    fn test_value_stays_in_unit_range() {
        let mut t = MorphTransition::new(1.0);
        t.start(5.0, 0.0);
        for i in 0..=40 {
            let v = t.update(f64::from(i) * 0.05 - 0.5);
            assert!((0.0..=1.0).contains(&v), "value {v} escaped");
        }
    }

    #[test]
    fn test_start_skipped_at_target() {
        let mut t = MorphTransition::new(1.0);
        assert!(!t.start(0.0, 0.0));
        assert!(!t.is_active());
    }

    #[test]
    fn test_early_reset_returns_to_zero() {
        let mut t = MorphTransition::new(2.8);
        assert!(t.start(1.0, 0.0));
        let early = t.update(0.3);
        assert!(early > 0.0 && early < SETTLED_EPSILON);

        assert!(!t.start(0.0, 0.3));
        assert_eq!(t.value(), 0.0);
        assert_eq!(t.update(10.0), 0.0);
        assert!(!t.is_active());
    }

    #[test]
    fn test_restart_midway_continues_from_current() {
        let mut t = MorphTransition::new(2.0);
        t.start(1.0, 0.0);
        let mid = t.update(1.0);
        t.start(0.0, 1.0);
        assert_eq!(t.update(1.0), mid);
        assert!(t.update(1.5) < mid);
    }

    #[test]
    fn test_card_opacity_window() {
        assert_eq!(card_opacity(0.5, 0.75, 0.95), 0.0);
        assert_eq!(card_opacity(0.75, 0.75, 0.95), 0.0);
        assert!((card_opacity(0.85, 0.75, 0.95) - 0.5).abs() < 1e-5);
        assert_eq!(card_opacity(1.0, 0.75, 0.95), 1.0);
        assert_eq!(card_opacity(0.8, 0.8, 0.8), 1.0);
    }
}
