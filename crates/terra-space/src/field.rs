//! The star field node and its morph toward on-screen outlines.

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use terra_config::{CameraConfig, EarthConfig, PresetName, StarConfig};
use terra_render::{
    Camera, GeometryId, Material, MaterialId, Node, NodeId, NodeKind, RenderBackend, RenderError,
    Scene, ScreenRect, StarMaterial, Viewport,
};

use crate::buffer::StarBuffer;
use crate::outline::{OutlineParams, project_screen_rect_to_world_outline};
use crate::transition::{MorphTransition, card_opacity};

/// An off-screen camera at the pose the real camera holds once it has
/// settled on the features preset. Used only for projection.
pub fn virtual_camera(config: &CameraConfig, viewport: Viewport) -> Camera {
    let fov = if viewport.width < config.mobile_breakpoint {
        config.fov_mobile
    } else {
        config.fov
    };
    let preset = config.presets.get(PresetName::Features);
    let mut camera = Camera::perspective(fov, viewport.aspect(), config.near, config.far);
    camera.position = Vec3::from(preset.position);
    camera.look_at(Vec3::from(preset.look_at));
    camera
}

/// Star point cloud whose stars can flow into the outlines of screen
/// rectangles and back.
#[derive(Debug)]
pub struct StarField {
    buffer: StarBuffer,
    node: NodeId,
    geometry: GeometryId,
    material: MaterialId,
    transition: MorphTransition,
    config: StarConfig,
    camera_config: CameraConfig,
    outline: OutlineParams,
    viewport: Viewport,
    virtual_camera: Camera,
    rng: ChaCha8Rng,
    forming_cards: bool,
    scroll_updates: bool,
    last_scroll_update: Option<f64>,
    refine_at: Option<f64>,
}

impl StarField {
    /// Generate the stars and add them to the scene root.
    pub fn create<B>(
        scene: &mut Scene,
        backend: &mut B,
        config: &EarthConfig,
        viewport: Viewport,
        mobile: bool,
        seed: u64,
    ) -> Result<Self, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let buffer = StarBuffer::generate(config.star_count(mobile), &mut rng);
        let geometry = backend.upload_stars("star-field", buffer.attributes())?;
        let material = scene.add_material(Material::Stars(StarMaterial {
            twinkle_speed: config.stars.twinkle_speed,
            ..Default::default()
        }));
        let count = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        let root = scene.root();
        let node = scene.add(
            root,
            Node::new(
                "star-field",
                NodeKind::Stars {
                    geometry,
                    material,
                    count,
                },
            ),
        );
        tracing::info!("Star field created with {count} stars");

        let animation = &config.stars.animation;
        Ok(Self {
            buffer,
            node,
            geometry,
            material,
            transition: MorphTransition::new(f64::from(animation.duration_ms) / 1000.0),
            config: config.stars.clone(),
            camera_config: config.camera.clone(),
            outline: OutlineParams::from_config(animation),
            viewport,
            virtual_camera: virtual_camera(&config.camera, viewport),
            rng,
            forming_cards: false,
            scroll_updates: false,
            last_scroll_update: None,
            refine_at: None,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn buffer(&self) -> &StarBuffer {
        &self.buffer
    }

    pub fn virtual_camera(&self) -> &Camera {
        &self.virtual_camera
    }

    pub fn transition(&self) -> f32 {
        self.transition.value()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_active()
    }

    pub fn is_forming_cards(&self) -> bool {
        self.forming_cards
    }

    /// Card opacity implied by the current transition value.
    pub fn card_opacity(&self) -> f32 {
        let animation = &self.config.animation;
        card_opacity(
            self.transition.value(),
            animation.card_fade_start,
            animation.card_fade_end,
        )
    }

    /// Where star `index` is drawn right now.
    pub fn rendered_position(&self, index: usize) -> Option<Vec3> {
        self.buffer.rendered_position(index, self.transition.value())
    }

    /// Outline points for every non-empty rectangle, through the virtual
    /// camera.
    pub fn outline_points(&mut self, rects: &[ScreenRect]) -> Vec<Vec3> {
        let depth = self.config.animation.target_depth;
        let mut points = Vec::new();
        for rect in rects.iter().filter(|r| !r.is_empty()) {
            points.extend(project_screen_rect_to_world_outline(
                rect,
                self.viewport,
                &self.virtual_camera,
                depth,
                &self.outline,
                &mut self.rng,
            ));
        }
        points
    }

    /// Recompute targets from `rects` and upload them. Returns the number of
    /// outline points used; zero leaves the targets untouched.
    pub fn retarget<B>(&mut self, backend: &mut B, rects: &[ScreenRect]) -> Result<usize, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        let points = self.outline_points(rects);
        if points.is_empty() {
            return Ok(0);
        }
        let animation = &self.config.animation;
        self.buffer
            .assign_targets(&points, animation.spread_xy, animation.spread_z);
        backend.write_star_targets(self.geometry, self.buffer.targets())?;
        Ok(points.len())
    }

    /// Morph the stars into the outlines of `rects`. Does nothing when no
    /// rectangle yields points.
    pub fn animate_stars_to_cards<B>(
        &mut self,
        backend: &mut B,
        rects: &[ScreenRect],
        now: f64,
    ) -> Result<bool, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        self.forming_cards = true;
        if self.retarget(backend, rects)? == 0 {
            tracing::debug!("No card outlines to form");
            return Ok(false);
        }
        self.transition.start(1.0, now);
        self.scroll_updates = true;
        self.refine_at =
            Some(now + f64::from(self.config.animation.camera_settle_delay_ms) / 1000.0);
        Ok(true)
    }

    /// Morph the stars back to their origins.
    pub fn reset_stars_to_original(&mut self, now: f64) {
        self.forming_cards = false;
        self.scroll_updates = false;
        self.refine_at = None;
        self.transition.start(0.0, now);
    }

    /// Scroll moved the rectangles. Recomputes targets at most once per
    /// throttle interval and never while a transition runs.
    pub fn handle_scroll<B>(
        &mut self,
        backend: &mut B,
        rects: &[ScreenRect],
        now: f64,
    ) -> Result<bool, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        if !self.scroll_updates || self.transition.is_active() {
            return Ok(false);
        }
        let throttle = f64::from(self.config.animation.scroll_throttle_ms) / 1000.0;
        if self
            .last_scroll_update
            .is_some_and(|last| now - last < throttle)
        {
            return Ok(false);
        }
        self.last_scroll_update = Some(now);
        Ok(self.retarget(backend, rects)? > 0)
    }

    /// The viewport changed. The virtual camera follows the new aspect, and
    /// formed outlines are recomputed unless a transition is running.
    pub fn handle_resize<B>(
        &mut self,
        backend: &mut B,
        viewport: Viewport,
        rects: &[ScreenRect],
    ) -> Result<(), RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        self.viewport = viewport;
        self.virtual_camera = virtual_camera(&self.camera_config, viewport);
        if self.forming_cards && !self.transition.is_active() {
            self.retarget(backend, rects)?;
        }
        Ok(())
    }

    /// Whether the one-shot target refinement after the camera settles is
    /// due. Returns `true` at most once per [`Self::animate_stars_to_cards`].
    pub fn take_refine(&mut self, now: f64) -> bool {
        match self.refine_at {
            Some(at) if now >= at => {
                self.refine_at = None;
                self.transition.target() >= 1.0
            }
            _ => false,
        }
    }

    /// Advance the morph and the twinkle clock. Returns the transition value.
    pub fn update(&mut self, scene: &mut Scene, elapsed: f64, now: f64) -> f32 {
        let value = self.transition.update(now);
        if let Some(Material::Stars(material)) = scene.material_mut(self.material) {
            material.transition = value;
            material.time = elapsed as f32;
        }
        value
    }

    pub fn set_twinkle_speed(&mut self, scene: &mut Scene, speed: f32) {
        self.config.twinkle_speed = speed;
        if let Some(Material::Stars(material)) = scene.material_mut(self.material) {
            material.twinkle_speed = speed;
        }
    }

    pub fn dispose(self, scene: &mut Scene, backend: &mut dyn RenderBackend) {
        scene.dispose_subtree(self.node, backend);
        tracing::debug!("Star field disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_render::HeadlessBackend;

    const DT: f64 = 1.0 / 60.0;

    fn setup() -> (Scene, HeadlessBackend, StarField) {
        let mut scene = Scene::new();
        let mut backend = HeadlessBackend::default();
        let config = EarthConfig::default();
        let field = StarField::create(
            &mut scene,
            &mut backend,
            &config,
            Viewport::new(1600.0, 900.0),
            false,
            11,
        )
        .unwrap();
        (scene, backend, field)
    }

    fn cards() -> Vec<ScreenRect> {
        (0..3)
            .map(|i| ScreenRect::new(300.0 + i as f32 * 360.0, 320.0, 300.0, 260.0))
            .collect()
    }

    fn run(field: &mut StarField, scene: &mut Scene, from: f64, seconds: f64) -> f64 {
        let mut now = from;
        while now < from + seconds {
            now += DT;
            field.update(scene, now, now);
        }
        now
    }

    #[test]
    fn test_mobile_count_halved() {
        let mut scene = Scene::new();
        let mut backend = HeadlessBackend::default();
        let config = EarthConfig::default();
        let field = StarField::create(
            &mut scene,
            &mut backend,
            &config,
            Viewport::new(400.0, 800.0),
            true,
            1,
        )
        .unwrap();
        assert_eq!(field.buffer().len(), 1500);
        assert!(field.buffer().attributes().validate().is_ok());
    }

    #[test]
    fn test_virtual_camera_at_features_pose() {
        let config = CameraConfig::default();
        let cam = virtual_camera(&config, Viewport::new(1600.0, 900.0));
        assert_eq!(cam.position, Vec3::new(7.0, 5.5, 7.5));
        let look = (Vec3::new(0.0, 0.5, 0.0) - cam.position).normalize();
        assert!((cam.forward() - look).length() < 1e-4);
    }

    #[test]
    fn test_round_trip_restores_origins() {
        let (mut scene, mut backend, mut field) = setup();
        assert!(field.animate_stars_to_cards(&mut backend, &cards(), 0.0).unwrap());
        let now = run(&mut field, &mut scene, 0.0, 3.0);
        assert_eq!(field.transition(), 1.0);
        assert_eq!(field.card_opacity(), 1.0);
        let formed = field.rendered_position(0).unwrap();
        assert!((formed.z - -2.0).abs() < 0.1, "formed star at {formed}");

        field.reset_stars_to_original(now);
        run(&mut field, &mut scene, now, 3.0);
        assert_eq!(field.transition(), 0.0);
        for i in 0..field.buffer().len() {
            let drawn = field.rendered_position(i).unwrap();
            assert!((drawn - field.buffer().origins()[i]).length() < 1e-4);
        }
    }

    #[test]
    fn test_targets_uploaded_to_backend() {
        let (_scene, mut backend, mut field) = setup();
        field.animate_stars_to_cards(&mut backend, &cards(), 0.0).unwrap();
        let uploaded = backend.star_targets(field.geometry).unwrap();
        assert_eq!(uploaded, field.buffer().targets());
    }

    #[test]
    fn test_no_rects_no_transition() {
        let (_scene, mut backend, mut field) = setup();
        assert!(!field.animate_stars_to_cards(&mut backend, &[], 0.0).unwrap());
        assert!(!field.is_transitioning());
    }

    #[test]
    fn test_scroll_throttled_and_blocked_during_transition() {
        let (mut scene, mut backend, mut field) = setup();
        assert!(!field.handle_scroll(&mut backend, &cards(), 0.0).unwrap(), "scroll updates start disabled");

        field.animate_stars_to_cards(&mut backend, &cards(), 0.0).unwrap();
        assert!(!field.handle_scroll(&mut backend, &cards(), 0.5).unwrap(), "blocked while morphing");

        let now = run(&mut field, &mut scene, 0.0, 3.0);
        assert!(field.handle_scroll(&mut backend, &cards(), now).unwrap());
        assert!(!field.handle_scroll(&mut backend, &cards(), now + 0.1).unwrap());
        assert!(field.handle_scroll(&mut backend, &cards(), now + 0.2).unwrap());

        field.reset_stars_to_original(now + 0.3);
        run(&mut field, &mut scene, now + 0.3, 3.0);
        assert!(!field.handle_scroll(&mut backend, &cards(), now + 10.0).unwrap());
    }

    #[test]
    fn test_refine_fires_once_after_settle() {
        let (_scene, mut backend, mut field) = setup();
        field.animate_stars_to_cards(&mut backend, &cards(), 0.0).unwrap();
        assert!(!field.take_refine(1.0));
        assert!(field.take_refine(1.8));
        assert!(!field.take_refine(2.5));
    }

    #[test]
    fn test_refine_cancelled_by_reset() {
        let (_scene, mut backend, mut field) = setup();
        field.animate_stars_to_cards(&mut backend, &cards(), 0.0).unwrap();
        field.reset_stars_to_original(0.5);
        assert!(!field.take_refine(5.0));
    }

    #[test]
    fn test_resize_rebuilds_virtual_camera() {
        let (_scene, mut backend, mut field) = setup();
        field
            .handle_resize(&mut backend, Viewport::new(500.0, 900.0), &cards())
            .unwrap();
        let fov = field.virtual_camera().fov_degrees().unwrap_or_default();
        assert!((fov - 55.0).abs() < 1e-4);
    }

    #[test]
    fn test_update_writes_material_uniforms() {
        let (mut scene, mut backend, mut field) = setup();
        field.animate_stars_to_cards(&mut backend, &cards(), 0.0).unwrap();
        let value = field.update(&mut scene, 12.5, 1.4);
        match scene.material(field.material) {
            Some(Material::Stars(m)) => {
                assert_eq!(m.transition, value);
                assert_eq!(m.time, 12.5);
                assert_eq!(m.twinkle_speed, 0.2);
            }
            other => panic!("unexpected material {other:?}"),
        }
    }

    #[test]
    fn test_dispose_releases_everything() {
        let (mut scene, mut backend, field) = setup();
        field.dispose(&mut scene, &mut backend);
        assert!(backend.live_resources().is_empty());
    }
}
