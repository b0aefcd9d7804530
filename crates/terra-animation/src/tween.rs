//! Time-based progress over a fixed duration.

use crate::easing::Easing;

/// Progress of a timed transition sampled against an external clock.
///
/// Times are seconds on whatever monotonic clock the caller uses; the tween
/// never reads wall-clock time itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    started_at: f64,
    duration: f64,
    easing: Easing,
}

impl Tween {
    /// Start a tween at `now`. Non-positive durations finish immediately.
    pub fn new(now: f64, duration: f64, easing: Easing) -> Self {
        Self {
            started_at: now,
            duration: duration.max(0.0),
            easing,
        }
    }

    /// Linear progress in `[0, 1]`.
    pub fn progress(&self, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0) as f32
    }

    /// Eased progress in `[0, 1]`.
    pub fn eased(&self, now: f64) -> f32 {
        self.easing.apply(self.progress(now))
    }

    /// Whether the full duration has elapsed.
    pub fn is_finished(&self, now: f64) -> bool {
        self.progress(now) >= 1.0
    }

    /// When the tween began.
    pub fn started_at(&self) -> f64 {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_clamped() {
        let t = Tween::new(10.0, 2.0, Easing::Linear);
        assert_eq!(t.progress(9.0), 0.0);
        assert!((t.progress(11.0) - 0.5).abs() < 1e-6);
        assert_eq!(t.progress(20.0), 1.0);
        assert!(t.is_finished(12.0));
        assert!(!t.is_finished(11.9));
    }

    #[test]
    fn test_zero_duration_finishes() {
        let t = Tween::new(0.0, 0.0, Easing::InOutCubic);
        assert!(t.is_finished(0.0));
        assert_eq!(t.eased(0.0), 1.0);
    }
}
