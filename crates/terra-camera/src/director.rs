use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use terra_animation::{Easing, Tween, damp_factor, damp_vec3};
use terra_config::{CameraConfig, PresetName};
use terra_render::Camera;

use crate::drag::DragState;
use crate::section::preset_for_section;

/// Horizontal squash of the orbit ellipse.
const ORBIT_X_SCALE: f32 = 0.75;
/// Orbit chase rate per 60 Hz tick at zero gap.
const ORBIT_BASE_RATE: f32 = 0.06;
/// Extra chase rate reached at a gap of π.
const ORBIT_GAP_RATE: f32 = 0.12;
const WHEEL_ZOOM_SCALE: f32 = 0.01;

/// Orbit parameters the camera placement is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub target: Vec3,
    pub zoom: f32,
    pub orbit_angle: f32,
    pub target_orbit_angle: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            target: Vec3::new(0.0, 0.0, 10.0),
            zoom: 10.0,
            orbit_angle: 0.0,
            target_orbit_angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    preset: PresetName,
    tween: Tween,
    start_target: Vec2,
    end_target: Vec2,
    start_zoom: f32,
    end_zoom: f32,
    start_look_at: Vec3,
    end_look_at: Vec3,
}

/// Owns the scene camera and everything that moves it.
///
/// Times passed in are seconds on the host's monotonic clock; `dt` is the
/// frame time in seconds.
#[derive(Debug, Clone)]
pub struct CameraDirector {
    camera: Camera,
    config: CameraConfig,
    state: CameraState,
    position: Vec3,
    look_at: Vec3,
    flight: Option<Flight>,
    drag: DragState,
    preset: Option<PresetName>,
}

impl CameraDirector {
    pub fn new(camera: Camera, config: &CameraConfig) -> Self {
        let state = CameraState::default();
        let mut director = Self {
            camera,
            config: config.clone(),
            state,
            position: Vec3::new(0.0, 0.0, state.zoom),
            look_at: Vec3::ZERO,
            flight: None,
            drag: DragState::default(),
            preset: None,
        };
        director.camera.position = director.position;
        director.camera.look_at(director.look_at);
        director
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    /// The point the camera currently faces.
    pub fn look_at(&self) -> Vec3 {
        self.look_at
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    /// The preset of the current or last flight.
    pub fn active_preset(&self) -> Option<PresetName> {
        self.preset
    }

    pub fn is_transitioning(&self) -> bool {
        self.flight.is_some()
    }

    /// Fly to the preset mapped to a page section. Unknown sections fall back
    /// to `hero`.
    pub fn update_camera_for_section(&mut self, section: &str, now: f64) -> PresetName {
        let preset = preset_for_section(section).unwrap_or_else(|| {
            tracing::warn!("No camera preset for section '{section}', using hero");
            PresetName::Hero
        });
        self.fly_to_preset(preset, now);
        preset
    }

    /// Start a flight to `preset` from wherever the camera is now. Any flight
    /// in progress is abandoned at its current values.
    pub fn fly_to_preset(&mut self, preset: PresetName, now: f64) {
        let destination = self.config.presets.get(preset);
        if self.flight.is_some() {
            tracing::debug!("Camera flight superseded by {}", preset.key());
        }
        self.flight = Some(Flight {
            preset,
            tween: Tween::new(
                now,
                f64::from(self.config.transition_duration),
                Easing::InOutQuart,
            ),
            start_target: self.state.target.truncate(),
            end_target: Vec2::new(destination.position[0], destination.position[1]),
            start_zoom: self.state.zoom,
            end_zoom: destination.position[2],
            start_look_at: self.look_at,
            end_look_at: Vec3::from(destination.look_at),
        });
        self.preset = Some(preset);
    }

    /// Abandon any flight in progress.
    pub fn cancel(&mut self) {
        self.flight = None;
        self.drag.reset();
    }

    /// Set the orbit angle the camera swings toward. Ignored while the user
    /// is dragging.
    pub fn set_target_orbit_angle(&mut self, angle: f32) {
        if !self.drag.is_dragging() {
            self.state.target_orbit_angle = angle;
        }
    }

    /// Wheel zoom, clamped to the configured range.
    pub fn handle_wheel(&mut self, delta_y: f32) {
        self.state.zoom = (self.state.zoom - delta_y * WHEEL_ZOOM_SCALE)
            .clamp(self.config.zoom_min, self.config.zoom_max);
    }

    pub fn pointer_down(&mut self, x: f32) {
        self.drag.press(x);
    }

    /// Drags rotate both angles directly so the globe follows the pointer.
    pub fn pointer_move(&mut self, x: f32) {
        if let Some(delta) = self.drag.motion(x, &self.config.drag) {
            self.state.target_orbit_angle -= delta;
            self.state.orbit_angle -= delta;
        }
    }

    pub fn pointer_up(&mut self, now: f64) {
        self.drag.release(now, &self.config.drag);
    }

    /// Match the viewport: aspect ratio and the narrow-screen field of view.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.camera.set_aspect_ratio(width, height);
        let fov = if width < self.config.mobile_breakpoint {
            self.config.fov_mobile
        } else {
            self.config.fov
        };
        self.camera.set_fov_degrees(fov);
    }

    /// Advance the flight, drag inertia and orbit, then place the camera.
    pub fn update(&mut self, now: f64, dt: f32) {
        self.advance_flight(now);

        let coast = self.drag.coast(now, dt, &self.config.drag);
        self.state.target_orbit_angle -= coast;

        let gap = self.state.target_orbit_angle - self.state.orbit_angle;
        let swing = Easing::OutQuart.apply(gap.abs() / PI);
        let rate = ORBIT_BASE_RATE + swing * ORBIT_GAP_RATE;
        self.state.orbit_angle += gap * damp_factor(rate, dt);

        let (sin, cos) = self.state.orbit_angle.sin_cos();
        let radius = self.state.zoom;
        let placement = Vec3::new(
            self.state.target.x + sin * radius * ORBIT_X_SCALE,
            self.state.target.y,
            cos * radius,
        );
        self.position = damp_vec3(self.position, placement, self.config.lerp_factor, dt);
        self.camera.position = self.position;
        self.camera.look_at(self.look_at);
    }

    fn advance_flight(&mut self, now: f64) {
        let Some(flight) = self.flight else {
            return;
        };
        let t = flight.tween.eased(now);
        let target = flight.start_target.lerp(flight.end_target, t);
        self.state.target.x = target.x;
        self.state.target.y = target.y;
        self.state.zoom = flight.start_zoom + (flight.end_zoom - flight.start_zoom) * t;
        self.look_at = flight.start_look_at.lerp(flight.end_look_at, t);

        if flight.tween.is_finished(now) {
            self.look_at = flight.end_look_at;
            self.flight = None;
            tracing::debug!("Camera arrived at {}", flight.preset.key());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn director() -> CameraDirector {
        CameraDirector::new(Camera::default(), &CameraConfig::default())
    }

    fn run(director: &mut CameraDirector, from: f64, frames: u32) -> f64 {
        let mut now = from;
        for _ in 0..frames {
            now += f64::from(DT);
            director.update(now, DT);
        }
        now
    }

    #[test]
    fn test_flight_reaches_preset_and_snaps_look_at() {
        let mut d = director();
        d.fly_to_preset(PresetName::Features, 0.0);
        assert!(d.is_transitioning());

        run(&mut d, 0.0, 120);
        assert!(!d.is_transitioning(), "flight must end after 1.8 s");
        let preset = CameraConfig::default().presets.features;
        assert_eq!(d.look_at(), Vec3::from(preset.look_at));
        assert!((d.state().target.x - preset.position[0]).abs() < 1e-5);
        assert!((d.state().target.y - preset.position[1]).abs() < 1e-5);
        assert!((d.state().zoom - preset.position[2]).abs() < 1e-5);
    }

    #[test]
    fn test_flight_midpoint_is_half_way() {
        let mut d = director();
        d.fly_to_preset(PresetName::Hero, 0.0);
        d.update(0.9, DT);
        let hero = CameraConfig::default().presets.hero;
        let expected_zoom = 10.0 + (hero.position[2] - 10.0) * 0.5;
        assert!((d.state().zoom - expected_zoom).abs() < 1e-4);
    }

    #[test]
    fn test_new_flight_starts_from_current_values() {
        let mut d = director();
        d.fly_to_preset(PresetName::Features, 0.0);
        d.update(0.9, DT);
        let mid_zoom = d.state().zoom;
        let mid_look = d.look_at();

        d.fly_to_preset(PresetName::About, 0.9);
        d.update(0.9, DT);
        assert!((d.state().zoom - mid_zoom).abs() < 1e-5, "superseding flight must not jump");
        assert!((d.look_at() - mid_look).length() < 1e-5);
        assert_eq!(d.active_preset(), Some(PresetName::About));
    }

    #[test]
    fn test_section_aliases_fly_to_presets() {
        let mut d = director();
        assert_eq!(d.update_camera_for_section("site-footer", 0.0), PresetName::Contact);
        assert_eq!(d.update_camera_for_section("section3", 0.0), PresetName::About);
        assert_eq!(d.update_camera_for_section("nowhere", 0.0), PresetName::Hero);
    }

    #[test]
    fn test_orbit_converges_from_any_gap() {
        for gap in [0.1, 1.0, PI, -PI] {
            let mut d = director();
            d.set_target_orbit_angle(gap);
            run(&mut d, 0.0, 600);
            let err = (d.state().orbit_angle - gap).abs();
            assert!(err < 1e-3, "gap {gap} left error {err}");
        }
    }

    #[test]
    fn test_orbit_never_snaps() {
        let mut d = director();
        d.set_target_orbit_angle(PI);
        d.update(DT as f64, DT);
        let angle = d.state().orbit_angle;
        assert!(angle > 0.0 && angle < PI * 0.2, "first step moved {angle}");
    }

    #[test]
    fn test_orbit_is_frame_rate_independent() {
        let mut fast = director();
        let mut slow = director();
        fast.set_target_orbit_angle(PI);
        slow.set_target_orbit_angle(PI);
        let mut now = 0.0;
        for _ in 0..60 {
            now += 1.0 / 60.0;
            fast.update(now, 1.0 / 60.0);
        }
        let mut now = 0.0;
        for _ in 0..30 {
            now += 1.0 / 30.0;
            slow.update(now, 1.0 / 30.0);
        }
        let diff = (fast.state().orbit_angle - slow.state().orbit_angle).abs();
        assert!(diff < 0.15, "30 and 60 fps diverged by {diff}");
    }

    #[test]
    fn test_wheel_zoom_clamped() {
        let mut d = director();
        d.handle_wheel(-10_000.0);
        assert_eq!(d.state().zoom, 25.0);
        d.handle_wheel(10_000.0);
        assert_eq!(d.state().zoom, 5.0);
        d.handle_wheel(-100.0);
        assert!((d.state().zoom - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_drag_blocks_external_orbit_target() {
        let mut d = director();
        d.pointer_down(0.0);
        d.pointer_move(100.0);
        let dragged = d.state().target_orbit_angle;
        assert!((dragged + 0.5).abs() < 1e-6);
        d.set_target_orbit_angle(PI);
        assert_eq!(d.state().target_orbit_angle, dragged);
        d.pointer_up(0.0);
        d.set_target_orbit_angle(PI);
        assert_eq!(d.state().target_orbit_angle, PI);
    }

    #[test]
    fn test_resize_switches_fov() {
        let mut d = director();
        d.resize(500.0, 800.0);
        let fov = |d: &CameraDirector| d.camera().fov_degrees().unwrap_or_default();
        assert!((fov(&d) - 55.0).abs() < 1e-4);
        d.resize(1600.0, 900.0);
        assert!((fov(&d) - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_position_follows_polar_placement() {
        let mut d = director();
        d.fly_to_preset(PresetName::About, 0.0);
        run(&mut d, 0.0, 1200);
        let s = *d.state();
        let expected = Vec3::new(
            s.target.x + s.orbit_angle.sin() * s.zoom * ORBIT_X_SCALE,
            s.target.y,
            s.orbit_angle.cos() * s.zoom,
        );
        assert!((d.camera().position - expected).length() < 1e-3);
    }
}
