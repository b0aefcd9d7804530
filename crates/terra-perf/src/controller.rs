use terra_config::{PerformanceConfig, QualityLevels, QualityTier};
use terra_render::RenderBackend;

/// Seconds between FPS samples and between resolution adjustments.
const SAMPLE_INTERVAL: f64 = 1.0;
const INITIAL_FPS: f32 = 60.0;

/// Tier for a measured frame rate: the first tier, from high to low, whose
/// `min_fps` the rate reaches.
pub fn classify_tier(fps: f32, levels: &QualityLevels) -> QualityTier {
    if fps >= levels.high.min_fps {
        QualityTier::High
    } else if fps >= levels.medium.min_fps {
        QualityTier::Medium
    } else {
        QualityTier::Low
    }
}

/// Next resolution scale: one step down below `drs_down_threshold`, one step
/// up above `drs_up_threshold`, unchanged in between. The result stays in
/// `[min_resolution_scale, cap]`.
pub fn next_resolution_scale(fps: f32, current: f32, cap: f32, config: &PerformanceConfig) -> f32 {
    let floor = config.min_resolution_scale.min(cap);
    let next = if fps < config.drs_down_threshold {
        current - config.resolution_step
    } else if fps > config.drs_up_threshold {
        current + config.resolution_step
    } else {
        current
    };
    next.clamp(floor, cap)
}

/// The controller's current decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityState {
    pub tier: QualityTier,
    pub resolution_scale: f32,
}

/// Result of one completed FPS window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerfSample {
    pub fps: f32,
    /// Set when this sample moved the controller to a new tier.
    pub tier_changed: Option<QualityTier>,
    /// Set when this sample changed the renderer's pixel ratio.
    pub resolution_changed: Option<f32>,
}

type TierCallback = Box<dyn FnMut(QualityTier)>;

/// Samples the frame rate once per second, classifies it into a quality
/// tier and steers the renderer's pixel ratio.
pub struct PerformanceController {
    config: PerformanceConfig,
    levels: QualityLevels,
    frames: u32,
    window_start: f64,
    fps: f32,
    state: QualityState,
    max_scale: f32,
    last_adjust: Option<f64>,
    on_tier_change: Option<TierCallback>,
}

impl std::fmt::Debug for PerformanceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceController")
            .field("fps", &self.fps)
            .field("state", &self.state)
            .field("max_scale", &self.max_scale)
            .finish_non_exhaustive()
    }
}

impl PerformanceController {
    /// `pixel_ratio` is the ratio the renderer was created with; the scale
    /// never rises above it.
    pub fn new(config: &PerformanceConfig, levels: &QualityLevels, pixel_ratio: f32, now: f64) -> Self {
        let max_scale = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        Self {
            config: config.clone(),
            levels: levels.clone(),
            frames: 0,
            window_start: now,
            fps: INITIAL_FPS,
            state: QualityState {
                tier: QualityTier::High,
                resolution_scale: max_scale,
            },
            max_scale,
            last_adjust: None,
            on_tier_change: None,
        }
    }

    /// Invoke `callback` with the new tier whenever it changes.
    pub fn on_tier_change(&mut self, callback: impl FnMut(QualityTier) + 'static) {
        self.on_tier_change = Some(Box::new(callback));
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn tier(&self) -> QualityTier {
        self.state.tier
    }

    pub fn resolution_scale(&self) -> f32 {
        self.state.resolution_scale
    }

    pub fn state(&self) -> QualityState {
        self.state
    }

    /// Count one frame. Once a second has passed, measure the FPS, update
    /// the tier and apply any resolution change to `backend`.
    pub fn update(&mut self, now: f64, backend: &mut dyn RenderBackend) -> Option<PerfSample> {
        self.frames += 1;
        let elapsed = now - self.window_start;
        if elapsed < SAMPLE_INTERVAL {
            return None;
        }
        self.fps = (f64::from(self.frames) / elapsed) as f32;
        self.frames = 0;
        self.window_start = now;

        let tier_changed = self.classify();
        let resolution_changed = if self.can_adjust(now) {
            self.last_adjust = Some(now);
            self.adjust_resolution(backend)
        } else {
            None
        };
        Some(PerfSample {
            fps: self.fps,
            tier_changed,
            resolution_changed,
        })
    }

    fn classify(&mut self) -> Option<QualityTier> {
        let tier = classify_tier(self.fps, &self.levels);
        if tier == self.state.tier {
            return None;
        }
        tracing::info!(
            "Quality tier {:?} -> {:?} at {:.1} fps",
            self.state.tier,
            tier,
            self.fps
        );
        self.state.tier = tier;
        if let Some(callback) = self.on_tier_change.as_mut() {
            callback(tier);
        }
        Some(tier)
    }

    fn can_adjust(&self, now: f64) -> bool {
        self.last_adjust
            .is_none_or(|last| now - last >= SAMPLE_INTERVAL)
    }

    fn adjust_resolution(&mut self, backend: &mut dyn RenderBackend) -> Option<f32> {
        let current = self.state.resolution_scale;
        let next = next_resolution_scale(self.fps, current, self.max_scale, &self.config);
        if (next - current).abs() < f32::EPSILON {
            return None;
        }
        tracing::info!("Adjusting pixel ratio: {current} -> {next}");
        self.state.resolution_scale = next;
        backend.set_pixel_ratio(next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use terra_render::HeadlessBackend;

    fn controller(pixel_ratio: f32) -> PerformanceController {
        PerformanceController::new(
            &PerformanceConfig::default(),
            &QualityLevels::default(),
            pixel_ratio,
            0.0,
        )
    }

    /// Feed `seconds` of frames at `fps` starting at `start`. Returns the
    /// samples and the end time.
    fn feed(
        c: &mut PerformanceController,
        backend: &mut HeadlessBackend,
        fps: f64,
        start: f64,
        seconds: f64,
    ) -> (Vec<PerfSample>, f64) {
        let mut samples = Vec::new();
        let frames = (fps * seconds).round() as u32;
        let mut now = start;
        for i in 1..=frames {
            now = start + f64::from(i) / fps;
            samples.extend(c.update(now, backend));
        }
        (samples, now)
    }

    #[test]
    fn test_classify_descending_thresholds() {
        let levels = QualityLevels::default();
        assert_eq!(classify_tier(60.0, &levels), QualityTier::High);
        assert_eq!(classify_tier(28.0, &levels), QualityTier::High);
        assert_eq!(classify_tier(27.9, &levels), QualityTier::Medium);
        assert_eq!(classify_tier(18.0, &levels), QualityTier::Medium);
        assert_eq!(classify_tier(10.0, &levels), QualityTier::Low);
    }

    #[test]
    fn test_resolution_hysteresis() {
        let config = PerformanceConfig::default();
        assert_eq!(next_resolution_scale(20.0, 1.5, 1.5, &config), 1.25);
        assert_eq!(next_resolution_scale(30.0, 1.25, 1.5, &config), 1.25);
        assert_eq!(next_resolution_scale(50.0, 1.25, 1.5, &config), 1.5);
        assert_eq!(next_resolution_scale(50.0, 1.5, 1.5, &config), 1.5, "capped");
        assert_eq!(next_resolution_scale(5.0, 0.5, 1.5, &config), 0.5, "floored");
        assert_eq!(next_resolution_scale(5.0, 0.4, 0.4, &config), 0.4, "cap below floor");
    }

    #[test]
    fn test_samples_once_per_second() {
        let mut c = controller(1.5);
        let mut backend = HeadlessBackend::default();
        let (samples, _) = feed(&mut c, &mut backend, 60.0, 0.0, 3.0);
        assert_eq!(samples.len(), 3);
        for s in &samples {
            assert!((s.fps - 60.0).abs() < 1.5, "fps {}", s.fps);
            assert_eq!(s.tier_changed, None);
        }
    }

    #[test]
    fn test_slow_frames_drop_tier_and_resolution() {
        let mut c = controller(1.5);
        let mut backend = HeadlessBackend::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        c.on_tier_change(move |tier| sink.borrow_mut().push(tier));

        let (samples, now) = feed(&mut c, &mut backend, 20.0, 0.0, 1.0);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].tier_changed, Some(QualityTier::Medium));
        assert_eq!(samples[0].resolution_changed, Some(1.25));
        assert_eq!(backend.pixel_ratio(), 1.25);

        let (_, _) = feed(&mut c, &mut backend, 12.0, now, 3.0);
        assert_eq!(c.tier(), QualityTier::Low);
        assert_eq!(c.resolution_scale(), 0.5);
        assert_eq!(*seen.borrow(), vec![QualityTier::Medium, QualityTier::Low]);
    }

    #[test]
    fn test_falling_fps_never_raises_resolution() {
        let mut c = controller(1.5);
        let mut backend = HeadlessBackend::default();
        let mut now = 0.0;
        let mut previous = c.resolution_scale();
        for fps in [60.0, 50.0, 40.0, 30.0, 25.0, 20.0, 15.0, 10.0, 5.0] {
            let (samples, end) = feed(&mut c, &mut backend, fps, now, 1.0);
            now = end;
            assert_eq!(samples.len(), 1, "one sample per second at {fps} fps");
            let scale = c.resolution_scale();
            assert!(scale <= previous, "scale rose from {previous} to {scale} at {fps} fps");
            if let Some(changed) = samples[0].resolution_changed {
                assert_eq!(changed, scale);
                assert_eq!(backend.pixel_ratio(), scale);
            }
            previous = scale;
        }
        assert_eq!(previous, 0.5);
    }

    #[test]
    fn test_recovery_is_capped() {
        let mut c = controller(1.5);
        let mut backend = HeadlessBackend::default();
        let (_, now) = feed(&mut c, &mut backend, 15.0, 0.0, 2.0);
        assert_eq!(c.resolution_scale(), 1.0);

        let (_, _) = feed(&mut c, &mut backend, 60.0, now, 5.0);
        assert_eq!(c.tier(), QualityTier::High);
        assert_eq!(c.resolution_scale(), 1.5);
        assert_eq!(backend.pixel_ratio(), 1.5);
    }

    #[test]
    fn test_middle_band_holds() {
        let mut c = controller(1.0);
        let mut backend = HeadlessBackend::default();
        let (samples, _) = feed(&mut c, &mut backend, 30.0, 0.0, 3.0);
        assert!(samples.iter().all(|s| s.resolution_changed.is_none()));
        assert_eq!(c.resolution_scale(), 1.0);
    }
}
