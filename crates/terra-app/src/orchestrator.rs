//! Wires the scene, assets, camera, stars, cards and performance control
//! into one running planet view.
//!
//! [`TerraEarth::init`] builds everything against a [`Host`] and returns the
//! running system; the host then feeds it frames, section visibility, input
//! and page events. [`TerraEarth::dispose`] tears it all down again.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use std::time::Duration;

use glam::{Quat, Vec2, Vec3};
use terra_assets::{
    CloudLayer, EarthSystem, LoadOptions, MoonSystem, TextureSource, create_cloud_layer,
    create_earth_system, create_moon_system,
};
use terra_camera::{CameraDirector, preset_for_section};
use terra_cards::{CardLayout, CardManager};
use terra_config::{
    ConfigOverride, ConfigStore, DeviceCapabilities, EarthConfig, FrameProbe, PresetName,
    QualityTier, SurfaceMode,
};
use terra_perf::PerformanceController;
use terra_render::{
    Camera, ContainerInfo, FrameStats, Material, RenderBackend, RenderError,
    ResourceCounts, Scene, ScreenRect, Viewport, apply_lighting, create_atmosphere, setup_scene,
};
use terra_space::{ShootingStars, StarField};

use crate::error::InitError;
use crate::host::{CONTAINER_ID, ErrorPanel, Host, HostEvent, LoaderGuard, SHOWCASE_EVENT};
use crate::lifecycle::Lifecycle;
use crate::scheduler::FrameToken;
use crate::sections::{BodyMotion, SectionChange, SectionEntry, best_entry, orbit_angle_for, section_preset};
use crate::showcase::{Showcase, ShowcaseStep, requested_duration, showcase_override};

/// Longest frame step fed to the animations, in seconds.
const MAX_FRAME_TIME: f64 = 0.25;
/// Tolerance for vsync jitter when throttling low-end frames.
const THROTTLE_SLACK_MS: f64 = 1.0;
/// Cloud and moon speeds are per tick at these historical update rates.
const CLOUD_TICK_RATE: f32 = 30.0;
const MOON_TICK_RATE: f32 = 20.0;
const FEATURES_SECTION: &str = "features";

/// Startup choices that do not come from the configuration.
#[derive(Debug, Clone)]
pub struct InitOptions {
    pub container_id: String,
    /// Warm-up frame times, when the host measured any.
    pub probe: Option<FrameProbe>,
    /// Skip detection and use the low-end profile.
    pub force_low_end: bool,
    /// Seed for star placement, card stardust and shooting stars.
    pub seed: u64,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            container_id: CONTAINER_ID.to_string(),
            probe: None,
            force_low_end: false,
            seed: 0x7e44a,
        }
    }
}

/// What one delivered frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not the frame the loop is waiting for, or the system is not running.
    Stale,
    /// Dropped by the low-end frame budget.
    Throttled,
    Rendered(FrameStats),
    /// Rendering failed; the loop continues.
    Failed,
}

/// Backend and scene of an initialization in progress.
struct Building<B> {
    backend: B,
    scene: Scene,
    loader: LoaderGuard,
}

impl<B: RenderBackend> Building<B> {
    fn abandon(mut self, host: &mut dyn Host) {
        self.loader.release(host);
        self.scene.dispose_all(&mut self.backend);
        self.backend.dispose();
    }
}

struct Parts {
    earth: EarthSystem,
    clouds: CloudLayer,
    moon: Option<MoonSystem>,
    stars: StarField,
    cards: CardManager,
    shooting: ShootingStars,
}

/// The running planet view.
pub struct TerraEarth<B: RenderBackend> {
    lifecycle: Lifecycle,
    store: ConfigStore,
    capabilities: DeviceCapabilities,
    container: ContainerInfo,
    viewport: Viewport,
    backend: B,
    scene: Scene,
    director: CameraDirector,
    earth: EarthSystem,
    clouds: CloudLayer,
    moon: Option<MoonSystem>,
    stars: StarField,
    shooting: ShootingStars,
    cards: CardManager,
    perf: PerformanceController,
    mode: SurfaceMode,
    earth_motion: BodyMotion,
    moon_motion: BodyMotion,
    cloud_spin: f32,
    moon_spin: f32,
    section: Option<PresetName>,
    pointer: Option<Vec2>,
    in_viewport: bool,
    document_hidden: bool,
    pending: Option<FrameToken>,
    started_at: f64,
    last_frame: Option<f64>,
    loader: LoaderGuard,
    first_frame_done: bool,
    showcase: Option<Showcase>,
    cards_follow_stars: bool,
}

impl<B: RenderBackend> std::fmt::Debug for TerraEarth<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerraEarth")
            .field("state", &self.lifecycle.state())
            .field("container", &self.container.id)
            .field("mode", &self.mode)
            .field("section", &self.section)
            .field("running", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: RenderBackend> TerraEarth<B> {
    /// Build the planet view inside the container named by `options`.
    ///
    /// `lifecycle` is the single system slot: a second initialization fails
    /// while one is running, and disposing it from elsewhere cancels this
    /// one at its next await. `clock` returns seconds on the same monotonic
    /// clock later passed to [`frame`](Self::frame).
    pub async fn init<S, F>(
        host: &mut dyn Host,
        lifecycle: &Lifecycle,
        config: EarthConfig,
        options: &InitOptions,
        source: &S,
        create_backend: F,
        clock: impl Fn() -> f64,
    ) -> Result<Self, InitError>
    where
        S: TextureSource,
        F: FnOnce(&ContainerInfo) -> Result<B, RenderError>,
    {
        lifecycle.begin()?;
        tracing::info!("Initializing planet view in #{}", options.container_id);

        let Some(container) = host.container(&options.container_id) else {
            tracing::warn!("Container #{} not found", options.container_id);
            lifecycle.abort();
            return Err(InitError::ContainerMissing(options.container_id.clone()));
        };

        let env = host.environment();
        if !(env.force_three || config.debug.force_three || host.supports_rendering()) {
            tracing::warn!("Rendering unsupported, showing static preview");
            lifecycle.abort();
            host.show_unsupported(&container.id);
            return Err(InitError::Unsupported);
        }
        host.clear_fallback(&container.id);

        let capabilities = if options.force_low_end {
            DeviceCapabilities::low_end()
        } else {
            DeviceCapabilities::detect(&env, options.probe.as_ref())
        };
        tracing::info!(
            "Device: mobile={} low_end={} quality={:?}",
            capabilities.is_mobile,
            capabilities.is_low_end,
            capabilities.recommended_quality
        );
        let mut store = ConfigStore::new(config);
        store.apply(&capabilities.device_override(&env));
        let config = Arc::clone(store.current());

        let mut backend = match create_backend(&container) {
            Ok(backend) => backend,
            Err(e) => return Err(fail(host, lifecycle, &container.id, InitError::Context(e))),
        };
        let boot = match setup_scene(&mut backend, &container, &config, |c| {
            host.emit(HostEvent::Attached {
                container_id: c.id.clone(),
            })
        }) {
            Ok(boot) => boot,
            Err(e) => {
                backend.dispose();
                return Err(fail(host, lifecycle, &container.id, InitError::Context(e)));
            }
        };
        let pixel_ratio = boot.pixel_ratio;

        let mut building = Building {
            backend,
            scene: boot.scene,
            loader: LoaderGuard::show(host),
        };
        let load = LoadOptions {
            mobile_geometry: capabilities.uses_mobile_geometry(&env, &config),
            is_mobile: capabilities.is_mobile,
            max_anisotropy: building.backend.info().max_anisotropy,
        };
        let viewport = Viewport::new(container.size().0, container.size().1);

        let parts = match assemble(
            &mut building,
            lifecycle,
            &config,
            &load,
            source,
            viewport,
            pixel_ratio,
            capabilities.is_mobile,
            options.seed,
        )
        .await
        {
            Ok(parts) if lifecycle.mark_ready() => parts,
            Ok(_) => {
                building.abandon(host);
                return Err(InitError::Cancelled);
            }
            Err(e) => {
                building.abandon(host);
                return Err(fail(host, lifecycle, &container.id, e));
            }
        };

        let now = clock();
        let Building {
            backend,
            scene,
            loader,
        } = building;
        let mut director = CameraDirector::new(boot.camera, &config.camera);
        director.resize(viewport.width, viewport.height);
        let perf = PerformanceController::new(&config.performance, &config.quality, pixel_ratio, now);

        let mut earth_motion = BodyMotion::at(Vec3::from(config.earth.initial_position), config.earth.initial_scale);
        let hero = config.sections.get(PresetName::Hero);
        earth_motion.set_target(&hero.earth, true);
        let mut moon_motion = BodyMotion::at(Vec3::from(config.moon.start_position), hero.moon.scale);
        moon_motion.set_target(&hero.moon, false);

        let mut earth = Self {
            lifecycle: lifecycle.clone(),
            store,
            capabilities,
            in_viewport: host.container_visible(&container.id, config.init.viewport_margin_px),
            container,
            viewport,
            backend,
            scene,
            director,
            earth: parts.earth,
            clouds: parts.clouds,
            moon: parts.moon,
            stars: parts.stars,
            shooting: parts.shooting,
            cards: parts.cards,
            perf,
            mode: SurfaceMode::Day,
            earth_motion,
            moon_motion,
            cloud_spin: 0.0,
            moon_spin: 0.0,
            section: None,
            pointer: None,
            document_hidden: false,
            pending: None,
            started_at: now,
            last_frame: None,
            loader,
            first_frame_done: false,
            showcase: None,
            cards_follow_stars: false,
        };
        earth.apply_tier(earth.capabilities.recommended_quality);
        earth.sync_transforms();

        tracing::info!("Planet view ready");
        host.emit(HostEvent::Ready {
            container_id: earth.container.id.clone(),
        });
        earth.sync_loop(host);
        Ok(earth)
    }

    /// Run one frame delivered by the host's scheduler. `now` is in seconds.
    pub fn frame(&mut self, host: &mut dyn Host, token: FrameToken, now: f64) -> FrameOutcome {
        if !self.lifecycle.is_ready() || self.pending != Some(token) {
            return FrameOutcome::Stale;
        }
        self.pending = Some(host.frames().schedule());
        self.advance_timers(now);

        let low_end = self.capabilities.is_low_end;
        if low_end
            && let Some(last) = self.last_frame
            && (now - last) * 1000.0 + THROTTLE_SLACK_MS
                < f64::from(self.store.current().init.low_end_frame_budget_ms)
        {
            return FrameOutcome::Throttled;
        }

        let mut step = self.last_frame.map_or(0.0, |last| (now - last).max(0.0));
        if step > MAX_FRAME_TIME {
            tracing::warn!("Frame time {step:.3}s clamped to {MAX_FRAME_TIME}s");
            step = MAX_FRAME_TIME;
        }
        let dt = step as f32;
        self.last_frame = Some(now);
        let elapsed = now - self.started_at;
        let config = Arc::clone(self.store.current());

        self.cloud_spin += config.clouds.rotation_speed * CLOUD_TICK_RATE * dt;
        self.moon_spin += config.moon.orbit_speed * MOON_TICK_RATE * dt;

        if !low_end {
            self.update_stars(elapsed, now);
        }

        if self.mode == SurfaceMode::Night && !low_end {
            let body = &config.earth;
            let pulse = (elapsed as f32 * body.emissive_pulse_speed).sin()
                * body.emissive_pulse_amplitude
                * 2.0;
            if let Some(material) = self
                .scene
                .material_mut(self.earth.night_material)
                .and_then(Material::as_standard_mut)
            {
                material.emissive_intensity =
                    body.emissive_intensity * body.night_emissive_multiplier + pulse;
            }
        }

        self.director.update(now, dt);
        self.earth_motion.update(dt);
        self.moon_motion.update(dt);
        self.sync_transforms();

        self.cards
            .update(&mut self.scene, self.director.camera(), self.pointer, now, dt);

        if !low_end {
            self.shooting.update(&mut self.scene, dt);
        }

        if let Some(sample) = self.perf.update(now, &mut self.backend)
            && let Some(tier) = sample.tier_changed
        {
            self.apply_tier(tier);
        }

        match self.backend.render(&self.scene, self.director.camera()) {
            Ok(stats) => {
                if !self.first_frame_done {
                    self.first_frame_done = true;
                    tracing::info!("First frame rendered, hiding loader");
                    self.loader.release(host);
                    host.emit(HostEvent::FirstFrame {
                        container_id: self.container.id.clone(),
                    });
                }
                FrameOutcome::Rendered(stats)
            }
            Err(e) => {
                tracing::warn!("Frame skipped: {e}");
                FrameOutcome::Failed
            }
        }
    }

    fn update_stars(&mut self, elapsed: f64, now: f64) {
        self.stars.update(&mut self.scene, elapsed, now);
        if self.stars.take_refine(now) {
            let rects = self.card_rects();
            if let Err(e) = self.stars.retarget(&mut self.backend, &rects) {
                tracing::warn!("Star outline refinement failed: {e}");
            }
        }
        if self.cards_follow_stars {
            self.cards.set_progress(self.stars.card_opacity());
            if !self.stars.is_forming_cards() && !self.stars.is_transitioning() {
                self.cards_follow_stars = false;
            }
        }
    }

    fn sync_transforms(&mut self) {
        let earth = self.earth_motion;
        if let Some(node) = self.scene.node_mut(self.earth.node) {
            node.transform.position = earth.position;
            node.transform.scale = Vec3::splat(earth.scale);
            node.transform.rotation = Quat::from_rotation_y(earth.rotation);
        }
        if let Some(node) = self.scene.node_mut(self.clouds.node) {
            node.transform.position = earth.position;
            node.transform.scale = Vec3::splat(earth.scale);
            node.transform.rotation = Quat::from_rotation_y(self.cloud_spin);
        }
        if let Some(moon) = &self.moon
            && let Some(node) = self.scene.node_mut(moon.node)
        {
            node.transform.position = self.moon_motion.position;
            node.transform.scale = Vec3::splat(self.moon_motion.scale);
            node.transform.rotation = Quat::from_rotation_y(self.moon_spin);
        }
    }

    /// Enable the optional effects of `tier`.
    fn apply_tier(&mut self, tier: QualityTier) {
        let config = Arc::clone(self.store.current());
        let effects = config.quality.tier(tier);
        if !self.clouds.is_placeholder()
            && let Some(node) = self.scene.node_mut(self.clouds.node)
        {
            node.visible = effects.cloud_layer;
        }
        self.shooting.set_disabled(!effects.meteor_showers);
        tracing::debug!("Applied quality tier {tier:?}");
    }

    /// Card rectangles as seen from the features camera pose.
    fn card_rects(&self) -> Vec<ScreenRect> {
        self.cards
            .screen_rects(&self.scene, self.stars.virtual_camera(), self.viewport)
    }

    /// React to a batch of section visibility entries. Returns the section
    /// change, if the most visible section changed.
    pub fn handle_sections(&mut self, entries: &[SectionEntry], now: f64) -> Option<SectionChange> {
        let best = best_entry(entries)?;
        if best.id == FEATURES_SECTION && !self.cards_follow_stars {
            self.cards.set_progress(best.ratio);
        }
        let Some(preset) = section_preset(&best.id) else {
            tracing::debug!("Ignoring unknown section #{}", best.id);
            return None;
        };
        let change = SectionChange::between(self.section, preset)?;
        self.section = Some(preset);
        tracing::debug!("Section {:?} -> {}", change.previous, preset.key());

        self.director.fly_to_preset(preset, now);
        self.apply_section(&change);
        self.update_cards_for(&change, now);
        Some(change)
    }

    fn apply_section(&mut self, change: &SectionChange) {
        let config = Arc::clone(self.store.current());
        let transforms = config.sections.get(change.next);
        self.earth_motion.set_target(&transforms.earth, true);
        self.moon_motion.set_target(&transforms.moon, false);
        if change.flips_mode {
            self.set_mode(self.mode.toggled());
        }
        apply_lighting(&mut self.scene, config.lighting.preset(self.mode));
    }

    fn set_mode(&mut self, mode: SurfaceMode) {
        self.mode = mode;
        let material = match mode {
            SurfaceMode::Day => self.earth.day_material,
            SurfaceMode::Night => self.earth.night_material,
        };
        if let Some(node) = self.scene.node_mut(self.earth.node) {
            node.set_material(material);
        }
        self.director.set_target_orbit_angle(orbit_angle_for(mode));
        tracing::info!("Surface switched to {mode:?}");
    }

    fn update_cards_for(&mut self, change: &SectionChange, now: f64) {
        let low_end = self.capabilities.is_low_end;
        if change.enters(PresetName::Features) {
            self.cards.animate_in(change.direction(), now);
            if low_end {
                self.cards.set_progress(1.0);
                return;
            }
            let rects = self.card_rects();
            self.cards_follow_stars = match self.stars.animate_stars_to_cards(&mut self.backend, &rects, now) {
                Ok(started) => started,
                Err(e) => {
                    tracing::warn!("Star morph failed: {e}");
                    false
                }
            };
            if !self.cards_follow_stars {
                self.cards.set_progress(1.0);
            }
        } else if change.leaves(PresetName::Features) {
            if !low_end {
                self.stars.reset_stars_to_original(now);
            }
            self.cards.animate_out(change.direction());
            if !self.cards_follow_stars {
                self.cards.set_progress(0.0);
            }
        }
    }

    /// The page scrolled; card outlines may need to follow.
    pub fn handle_scroll(&mut self, now: f64) {
        if self.capabilities.is_low_end {
            return;
        }
        let rects = self.card_rects();
        if let Err(e) = self.stars.handle_scroll(&mut self.backend, &rects, now) {
            tracing::warn!("Scroll retarget failed: {e}");
        }
    }

    /// The container changed size, in logical pixels.
    pub fn handle_resize(&mut self, width: f32, height: f32) {
        self.container.width = width;
        self.container.height = height;
        let (width, height) = self.container.size();
        self.viewport = Viewport::new(width, height);
        self.backend.resize(width, height);
        self.director.resize(width, height);
        let rects = self.card_rects();
        if let Err(e) = self.stars.handle_resize(&mut self.backend, self.viewport, &rects) {
            tracing::warn!("Resize retarget failed: {e}");
        }
    }

    /// Pointer position in normalized device coordinates.
    pub fn pointer_moved(&mut self, ndc: Vec2) {
        self.pointer = Some(ndc);
    }

    pub fn pointer_left(&mut self) {
        self.pointer = None;
    }

    /// Open the link of the card under `ndc`. Returns whether one was hit.
    pub fn click(&mut self, host: &mut dyn Host, ndc: Vec2) -> bool {
        if !self.lifecycle.is_ready() {
            return false;
        }
        match self.cards.handle_click(&self.scene, self.director.camera(), ndc) {
            Some(link) => {
                host.navigate(link);
                true
            }
            None => false,
        }
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.director.handle_wheel(delta_y);
    }

    pub fn drag_start(&mut self, x: f32) {
        self.director.pointer_down(x);
    }

    pub fn drag_move(&mut self, x: f32) {
        self.director.pointer_move(x);
    }

    pub fn drag_end(&mut self, now: f64) {
        self.director.pointer_up(now);
    }

    /// The document was hidden or shown.
    pub fn set_document_hidden(&mut self, host: &mut dyn Host, hidden: bool) {
        self.document_hidden = hidden;
        self.sync_loop(host);
    }

    /// The container entered or left the viewport.
    pub fn set_container_visible(&mut self, host: &mut dyn Host, visible: bool) {
        self.in_viewport = visible;
        self.sync_loop(host);
    }

    /// Ask the host whether the container is in view and follow the answer.
    pub fn refresh_visibility(&mut self, host: &mut dyn Host) {
        let margin = self.store.current().init.viewport_margin_px;
        let visible = host.container_visible(&self.container.id, margin);
        self.set_container_visible(host, visible);
    }

    /// Schedule or cancel the next frame so the loop runs exactly when the
    /// system is ready, the document is shown and the container is in view.
    fn sync_loop(&mut self, host: &mut dyn Host) {
        let run = self.lifecycle.is_ready() && !self.document_hidden && self.in_viewport;
        match (run, self.pending) {
            (true, None) => {
                self.last_frame = None;
                self.pending = Some(host.frames().schedule());
                tracing::debug!("Render loop running");
            }
            (false, Some(token)) => {
                host.frames().cancel(token);
                self.pending = None;
                tracing::debug!("Render loop paused");
            }
            _ => {}
        }
    }

    /// Handle a custom page event. Returns whether it was recognized.
    pub fn handle_custom_event(&mut self, name: &str, detail: Option<&serde_json::Value>, now: f64) -> bool {
        if name != SHOWCASE_EVENT {
            return false;
        }
        let duration = requested_duration(detail)
            .unwrap_or_else(|| u64::from(self.store.current().showcase.default_duration_ms));
        self.trigger_showcase(duration, now);
        true
    }

    /// Start the showcase mode. Skipped on low-end devices and while one is
    /// already running.
    pub fn trigger_showcase(&mut self, duration_ms: u64, now: f64) -> bool {
        if !self.lifecycle.is_ready() || self.showcase.is_some() || self.capabilities.is_low_end {
            return false;
        }
        let config = Arc::clone(self.store.current());
        let snapshot = self.store.apply_with_snapshot(&showcase_override(&config));

        let orbit = self.director.state().orbit_angle;
        self.director.set_target_orbit_angle(orbit + FRAC_PI_2);
        let base_scale = self.earth_motion.target_scale;
        self.earth_motion.target_scale = base_scale * config.showcase.scale_bump;

        tracing::info!("Showcase started for {duration_ms} ms");
        self.showcase = Some(Showcase::plan(now, duration_ms, &config.showcase, snapshot, base_scale));
        self.advance_timers(now);
        true
    }

    pub fn is_showcase_active(&self) -> bool {
        self.showcase.is_some()
    }

    /// Fire the showcase steps that are due.
    pub fn advance_timers(&mut self, now: f64) {
        let Some(showcase) = self.showcase.as_mut() else {
            return;
        };
        let base_scale = showcase.base_scale();
        for step in showcase.due(now) {
            match step {
                ShowcaseStep::Shower => {
                    self.shooting.trigger_shower();
                }
                ShowcaseStep::RestoreScale => self.earth_motion.target_scale = base_scale,
                ShowcaseStep::End => {
                    self.end_showcase();
                    break;
                }
            }
        }
    }

    fn end_showcase(&mut self) {
        let Some(showcase) = self.showcase.take() else {
            return;
        };
        if let Err(e) = self.store.rollback(showcase.snapshot()) {
            tracing::warn!("Showcase config rollback failed: {e}");
        }
        tracing::info!("Showcase ended");
    }

    /// Merge `overrides` into the effective configuration and push the
    /// values that can change at runtime into the live components.
    pub fn update_config(&mut self, overrides: &ConfigOverride) -> u64 {
        let version = self.store.apply(overrides);
        let config = Arc::clone(self.store.current());
        self.shooting.set_config(&config.shooting_stars);
        if let Some(material) = self
            .clouds
            .material
            .and_then(|id| self.scene.material_mut(id))
            .and_then(Material::as_standard_mut)
        {
            material.opacity = config.clouds.opacity;
        }
        self.stars
            .set_twinkle_speed(&mut self.scene, config.stars.twinkle_speed);
        tracing::debug!("Configuration updated to version {version}");
        version
    }

    /// The effective configuration.
    pub fn config(&self) -> Arc<EarthConfig> {
        Arc::clone(self.store.current())
    }

    /// Fly the camera to a preset by key or section id.
    pub fn fly_to_preset(&mut self, name: &str, now: f64) -> bool {
        match preset_for_section(name) {
            Some(preset) => {
                self.director.fly_to_preset(preset, now);
                true
            }
            None => {
                tracing::warn!("Unknown camera preset '{name}'");
                false
            }
        }
    }

    /// Start a meteor shower. No-op while one is active or cooling down.
    pub fn trigger_meteor_shower(&mut self) -> bool {
        self.shooting.trigger_shower()
    }

    pub fn shooting_stars(&self) -> &ShootingStars {
        &self.shooting
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    pub fn section(&self) -> Option<PresetName> {
        self.section
    }

    /// Whether a frame is scheduled.
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn camera(&self) -> &Camera {
        self.director.camera()
    }

    pub fn director(&self) -> &CameraDirector {
        &self.director
    }

    pub fn earth_system(&self) -> &EarthSystem {
        &self.earth
    }

    pub fn earth_motion(&self) -> &BodyMotion {
        &self.earth_motion
    }

    pub fn clouds(&self) -> &CloudLayer {
        &self.clouds
    }

    pub fn moon(&self) -> Option<&MoonSystem> {
        self.moon.as_ref()
    }

    pub fn stars(&self) -> &StarField {
        &self.stars
    }

    pub fn cards(&self) -> &CardManager {
        &self.cards
    }

    /// Stop the loop, revert the showcase, release the loader and every GPU
    /// resource, then free the system slot. Returns the resources the
    /// backend still held before its own disposal, which should be none.
    pub fn dispose(mut self, host: &mut dyn Host) -> ResourceCounts {
        self.lifecycle.dispose();
        if let Some(token) = self.pending.take() {
            host.frames().cancel(token);
        }
        self.end_showcase();
        self.loader.release(host);

        let Self {
            mut backend,
            mut scene,
            earth,
            stars,
            shooting,
            cards,
            ..
        } = self;
        cards.dispose(&mut scene, &mut backend);
        shooting.dispose(&mut scene, &mut backend);
        stars.dispose(&mut scene, &mut backend);
        earth.dispose(&mut scene, &mut backend);
        scene.dispose_all(&mut backend);

        let leaked = backend.live_resources();
        if !leaked.is_empty() {
            tracing::warn!("GPU resources still live after teardown: {leaked:?}");
        }
        backend.dispose();
        tracing::info!("Planet view disposed");
        leaked
    }
}

/// Mark a failed initialization and show the error panel where appropriate.
fn fail(host: &mut dyn Host, lifecycle: &Lifecycle, container_id: &str, error: InitError) -> InitError {
    if error.shows_error_panel() && lifecycle.fail() {
        tracing::error!("Planet view failed to initialize: {error}");
        host.show_error(container_id, &ErrorPanel::for_error(&error));
    }
    error
}

fn check_cancelled(lifecycle: &Lifecycle) -> Result<(), InitError> {
    if lifecycle.is_initializing() {
        Ok(())
    } else {
        tracing::info!("Initialization cancelled");
        Err(InitError::Cancelled)
    }
}

#[allow(clippy::too_many_arguments)]
async fn assemble<B: RenderBackend, S: TextureSource>(
    building: &mut Building<B>,
    lifecycle: &Lifecycle,
    config: &EarthConfig,
    load: &LoadOptions,
    source: &S,
    viewport: Viewport,
    pixel_ratio: f32,
    mobile: bool,
    seed: u64,
) -> Result<Parts, InitError> {
    let scene = &mut building.scene;
    let backend = &mut building.backend;
    let root = scene.root();

    let earth = create_earth_system(scene, backend, root, source, config, load).await;
    check_cancelled(lifecycle)?;
    let earth = earth?;

    let watchdog = Duration::from_millis(u64::from(config.init.asset_timeout_ms));
    let clouds = tokio::time::timeout(watchdog, create_cloud_layer(scene, backend, root, source, config, load)).await;
    check_cancelled(lifecycle)?;
    let clouds = clouds.unwrap_or_else(|_| {
        tracing::warn!("Cloud layer did not load within {watchdog:?}");
        CloudLayer::placeholder(scene, root)
    });
    if let Some(material) = clouds
        .material
        .and_then(|id| scene.material_mut(id))
        .and_then(Material::as_standard_mut)
    {
        material.opacity = config.clouds.opacity;
    }

    let moon = create_moon_system(scene, backend, root, source, config, load).await;
    check_cancelled(lifecycle)?;
    let moon = moon
        .inspect_err(|e| tracing::warn!("Continuing without moon: {e}"))
        .ok();

    let segments = config.earth_segments(load.mobile_geometry);
    create_atmosphere(scene, backend, earth.node, config, segments)?;

    let stars = StarField::create(scene, backend, config, viewport, mobile, seed)?;
    let cards = CardManager::new(
        scene,
        backend,
        root,
        &config.cards,
        pixel_ratio,
        CardLayout::default(),
        seed.rotate_left(17),
    )?;
    let shooting = ShootingStars::new(scene, backend, &config.shooting_stars, seed.rotate_left(31))?;

    Ok(Parts {
        earth,
        clouds,
        moon,
        stars,
        cards,
        shooting,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::f32::consts::PI;
    use std::rc::Rc;

    use super::*;
    use crate::host::{LOADER_FALLBACK_ID, LoadingIndicator};
    use crate::lifecycle::LifecycleState;
    use crate::scheduler::{FrameScheduler, QueuedFrames};
    use terra_assets::{MemoryTextureSource, texture_path};
    use terra_config::HostEnvironment;
    use terra_render::{
        BackendInfo, GeometryId, HeadlessBackend, MaterialId, MeshData, StarAttributes, TextureId,
        TextureImage, TextureOptions, uv_sphere,
    };
    use terra_space::ShowerState;

    const DT: f64 = 1.0 / 60.0;

    #[derive(Debug, Default)]
    struct Indicator {
        shows: u32,
        releases: u32,
    }

    impl LoadingIndicator for Indicator {
        fn request_show(&mut self, _owner: &str) {
            self.shows += 1;
        }

        fn release(&mut self, _owner: &str) {
            self.releases += 1;
        }
    }

    #[derive(Debug)]
    struct MockHost {
        container: Option<ContainerInfo>,
        env: HostEnvironment,
        supported: bool,
        visible: bool,
        frames: QueuedFrames,
        events: Vec<HostEvent>,
        indicator: Option<Indicator>,
        hidden: Vec<String>,
        errors: Vec<ErrorPanel>,
        unsupported: bool,
        cleared: bool,
        links: Vec<String>,
    }

    impl Default for MockHost {
        fn default() -> Self {
            Self {
                container: Some(ContainerInfo::new(CONTAINER_ID, 1600.0, 900.0, 2.0)),
                env: HostEnvironment {
                    viewport_width: 1600.0,
                    viewport_height: 900.0,
                    device_pixel_ratio: 2.0,
                    hardware_concurrency: Some(8),
                    ..Default::default()
                },
                supported: true,
                visible: true,
                frames: QueuedFrames::new(),
                events: Vec::new(),
                indicator: Some(Indicator::default()),
                hidden: Vec::new(),
                errors: Vec::new(),
                unsupported: false,
                cleared: false,
                links: Vec::new(),
            }
        }
    }

    impl MockHost {
        fn event_names(&self) -> Vec<&'static str> {
            self.events.iter().map(HostEvent::name).collect()
        }

        fn count(&self, name: &str) -> usize {
            self.events.iter().filter(|e| e.name() == name).count()
        }
    }

    impl Host for MockHost {
        fn container(&self, id: &str) -> Option<ContainerInfo> {
            self.container.clone().filter(|c| c.id == id)
        }

        fn container_visible(&self, _id: &str, _margin_px: f32) -> bool {
            self.visible
        }

        fn environment(&self) -> HostEnvironment {
            self.env.clone()
        }

        fn supports_rendering(&self) -> bool {
            self.supported
        }

        fn clear_fallback(&mut self, _container_id: &str) {
            self.cleared = true;
        }

        fn show_unsupported(&mut self, _container_id: &str) {
            self.unsupported = true;
        }

        fn emit(&mut self, event: HostEvent) {
            self.events.push(event);
        }

        fn loading_indicator(&mut self) -> Option<&mut dyn LoadingIndicator> {
            self.indicator.as_mut().map(|i| i as &mut dyn LoadingIndicator)
        }

        fn hide_element(&mut self, id: &str) -> bool {
            self.hidden.push(id.to_string());
            true
        }

        fn show_error(&mut self, _container_id: &str, panel: &ErrorPanel) {
            self.errors.push(panel.clone());
        }

        fn navigate(&mut self, link: &str) {
            self.links.push(link.to_string());
        }

        fn frames(&mut self) -> &mut dyn FrameScheduler {
            &mut self.frames
        }
    }

    /// Headless backend that reports what was still live when disposed.
    #[derive(Debug)]
    struct TrackedBackend {
        inner: HeadlessBackend,
        at_dispose: Rc<Cell<Option<ResourceCounts>>>,
    }

    impl RenderBackend for TrackedBackend {
        fn info(&self) -> BackendInfo {
            self.inner.info()
        }

        fn upload_texture(
            &mut self,
            label: &str,
            image: &TextureImage,
            options: &TextureOptions,
        ) -> Result<TextureId, RenderError> {
            self.inner.upload_texture(label, image, options)
        }

        fn upload_mesh(&mut self, label: &str, mesh: &MeshData) -> Result<GeometryId, RenderError> {
            self.inner.upload_mesh(label, mesh)
        }

        fn upload_stars(&mut self, label: &str, stars: StarAttributes<'_>) -> Result<GeometryId, RenderError> {
            self.inner.upload_stars(label, stars)
        }

        fn write_star_targets(&mut self, geometry: GeometryId, targets: &[Vec3]) -> Result<(), RenderError> {
            self.inner.write_star_targets(geometry, targets)
        }

        fn release_texture(&mut self, id: TextureId) {
            self.inner.release_texture(id);
        }

        fn release_geometry(&mut self, id: GeometryId) {
            self.inner.release_geometry(id);
        }

        fn release_material(&mut self, id: MaterialId) {
            self.inner.release_material(id);
        }

        fn resize(&mut self, width: f32, height: f32) {
            self.inner.resize(width, height);
        }

        fn set_pixel_ratio(&mut self, ratio: f32) {
            self.inner.set_pixel_ratio(ratio);
        }

        fn pixel_ratio(&self) -> f32 {
            self.inner.pixel_ratio()
        }

        fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<FrameStats, RenderError> {
            self.inner.render(scene, camera)
        }

        fn live_resources(&self) -> ResourceCounts {
            self.inner.live_resources()
        }

        fn dispose(&mut self) {
            self.at_dispose.set(Some(self.inner.live_resources()));
            self.inner.dispose();
        }
    }

    fn pixel() -> TextureImage {
        TextureImage::new(2, 2, vec![200; 16]).unwrap()
    }

    fn source() -> MemoryTextureSource {
        MemoryTextureSource::new().with_fallback(pixel())
    }

    fn path(file: impl Fn(&terra_config::TexturePaths) -> &String) -> String {
        let paths = EarthConfig::default().paths;
        texture_path(&paths, file(&paths))
    }

    fn clock() -> impl Fn() -> f64 {
        let start = tokio::time::Instant::now();
        move || start.elapsed().as_secs_f64()
    }

    async fn start_with(
        host: &mut MockHost,
        lifecycle: &Lifecycle,
        options: &InitOptions,
        source: &MemoryTextureSource,
    ) -> Result<TerraEarth<HeadlessBackend>, InitError> {
        TerraEarth::init(
            host,
            lifecycle,
            EarthConfig::default(),
            options,
            source,
            |_| Ok(HeadlessBackend::default()),
            clock(),
        )
        .await
    }

    async fn start(host: &mut MockHost) -> TerraEarth<HeadlessBackend> {
        start_with(host, &Lifecycle::new(), &InitOptions::default(), &source())
            .await
            .unwrap()
    }

    /// Deliver `n` frames at 60 Hz starting at `now`. Returns the next time.
    fn run_frames<B: RenderBackend>(earth: &mut TerraEarth<B>, host: &mut MockHost, mut now: f64, n: usize) -> f64 {
        for _ in 0..n {
            if let Some(token) = host.frames.pop() {
                earth.frame(host, token, now);
            }
            now += DT;
        }
        now
    }

    fn enter(earth: &mut TerraEarth<HeadlessBackend>, id: &str, now: f64) -> Option<SectionChange> {
        earth.handle_sections(&[SectionEntry::new(id, 0.8, true)], now)
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_emits_events_and_starts_loop() {
        let mut host = MockHost::default();
        let earth = start(&mut host).await;

        assert!(earth.lifecycle().is_ready());
        assert!(host.cleared);
        assert_eq!(host.event_names(), vec!["three-attached", "three-ready"]);
        assert!(earth.is_running());
        assert_eq!(host.frames.pending().len(), 1);
        assert!(earth.moon().is_some_and(|m| m.textured));
        assert!(!earth.clouds().is_placeholder());
        let indicator = host.indicator.as_ref().unwrap();
        assert_eq!((indicator.shows, indicator.releases), (1, 0));

        let atmosphere = earth.scene().find("atmosphere").unwrap();
        assert_eq!(
            earth.scene().node(atmosphere).unwrap().parent(),
            Some(earth.earth_system().node)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_init_is_rejected() {
        let mut host = MockHost::default();
        let lifecycle = Lifecycle::new();
        let earth = start_with(&mut host, &lifecycle, &InitOptions::default(), &source())
            .await
            .unwrap();
        let again = start_with(&mut host, &lifecycle, &InitOptions::default(), &source()).await;
        assert!(matches!(again, Err(InitError::AlreadyActive)));

        earth.dispose(&mut host);
        let again = start_with(&mut host, &lifecycle, &InitOptions::default(), &source()).await;
        assert!(again.is_ok(), "re-initialization after dispose");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_container_and_unsupported() {
        let mut host = MockHost {
            container: None,
            ..Default::default()
        };
        let lifecycle = Lifecycle::new();
        let result = start_with(&mut host, &lifecycle, &InitOptions::default(), &source()).await;
        assert!(matches!(result, Err(InitError::ContainerMissing(_))));
        assert_eq!(lifecycle.state(), LifecycleState::Idle);

        let mut host = MockHost {
            supported: false,
            ..Default::default()
        };
        let result = start_with(&mut host, &lifecycle, &InitOptions::default(), &source()).await;
        assert!(matches!(result, Err(InitError::Unsupported)));
        assert!(host.unsupported);
        assert!(host.events.is_empty());

        let mut forced = MockHost {
            supported: false,
            ..Default::default()
        };
        forced.env.force_three = true;
        assert!(start_with(&mut forced, &lifecycle, &InitOptions::default(), &source()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_context_failure_shows_error_panel() {
        let mut host = MockHost::default();
        let lifecycle = Lifecycle::new();
        let result = TerraEarth::<HeadlessBackend>::init(
            &mut host,
            &lifecycle,
            EarthConfig::default(),
            &InitOptions::default(),
            &source(),
            |_| Err(RenderError::SurfaceLost),
            clock(),
        )
        .await;
        assert!(matches!(result, Err(InitError::Context(_))));
        assert_eq!(lifecycle.state(), LifecycleState::Error);
        assert_eq!(host.errors.len(), 1);
        assert_eq!(host.errors[0].message, "CSS-Modus");
        assert!(lifecycle.begin().is_ok(), "retry allowed after an error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_end_profile() {
        let mut host = MockHost::default();
        let options = InitOptions {
            force_low_end: true,
            ..Default::default()
        };
        let mut earth = start_with(&mut host, &Lifecycle::new(), &options, &source())
            .await
            .unwrap();
        let config = earth.config();

        // Mobile segment counts.
        assert_eq!(config.earth_segments(true), 16);
        let geometry = earth.scene().node(earth.earth_system().node).unwrap().geometry().unwrap();
        assert_eq!(
            earth.backend().mesh_triangles(geometry),
            Some(uv_sphere(config.earth.radius, 16).triangle_count())
        );

        // Invisible clouds.
        assert_eq!(config.clouds.opacity, 0.0);
        let cloud_material = earth.clouds().material.unwrap();
        let opacity = earth.scene().material(cloud_material).and_then(Material::as_standard).unwrap().opacity;
        assert_eq!(opacity, 0.0);

        // Resolution capped at 1.
        assert_eq!(config.performance.pixel_ratio_cap, 1.0);
        assert!(earth.backend().pixel_ratio() <= 1.0);

        // Star and shooting-star updates skipped.
        enter(&mut earth, "features", 0.0);
        assert!(!earth.stars().is_forming_cards());
        assert!(earth.trigger_meteor_shower());
        let now = run_frames(&mut earth, &mut host, 0.0, 240);
        assert_eq!(earth.stars().transition(), 0.0);
        let star_material = earth.scene().node(earth.stars().node()).unwrap().material().unwrap();
        assert_eq!(earth.scene().material(star_material).and_then(Material::as_stars).unwrap().time, 0.0);
        assert_eq!(earth.shooting_stars().active_count(), 0);
        assert_eq!(earth.shooting_stars().shower_state(), ShowerState::Active { elapsed: 0.0 });
        assert_eq!(earth.cards().progress(), 1.0);

        // Roughly every other 60 Hz frame is dropped.
        let before = earth.backend().frames_rendered();
        run_frames(&mut earth, &mut host, now, 60);
        let rendered = earth.backend().frames_rendered() - before;
        assert!((25..=35).contains(&rendered), "rendered {rendered}");
        assert!(!earth.trigger_showcase(1000, now), "no showcase on low-end");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_texture_times_out() {
        let mut host = MockHost::default();
        let lifecycle = Lifecycle::new();
        let stalled = source().with_pending(path(|p| &p.earth_day));
        let start = tokio::time::Instant::now();

        let result = start_with(&mut host, &lifecycle, &InitOptions::default(), &stalled).await;
        let waited = start.elapsed();
        let error = result.unwrap_err();
        assert!(error.is_timeout(), "{error}");
        assert!(waited <= Duration::from_millis(10_001), "waited {waited:?}");
        assert_eq!(lifecycle.state(), LifecycleState::Error);
        assert_eq!(host.errors.len(), 1);
        assert_eq!(host.indicator.as_ref().unwrap().releases, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_assets_degrade() {
        let mut host = MockHost::default();
        let degraded = source()
            .with_pending(path(|p| &p.clouds))
            .with_failure(path(|p| &p.moon))
            .with_failure(path(|p| &p.moon_bump));
        let earth = start_with(&mut host, &Lifecycle::new(), &InitOptions::default(), &degraded)
            .await
            .unwrap();
        assert!(earth.clouds().is_placeholder());
        assert!(!earth.scene().node(earth.clouds().node).unwrap().visible);
        assert!(earth.moon().is_some_and(|m| !m.textured));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_during_loading_cancels() {
        let mut host = MockHost::default();
        let lifecycle = Lifecycle::new();
        let at_dispose = Rc::new(Cell::new(None));
        let slow = source().with_delay(path(|p| &p.earth_day), pixel(), Duration::from_secs(1));
        let observer = lifecycle.clone();
        let sink = Rc::clone(&at_dispose);

        let init_options = InitOptions::default();
        let result = {
            let init = TerraEarth::init(
                &mut host,
                &lifecycle,
                EarthConfig::default(),
                &init_options,
                &slow,
                move |_| {
                    Ok(TrackedBackend {
                        inner: HeadlessBackend::default(),
                        at_dispose: sink,
                    })
                },
                clock(),
            );
            tokio::pin!(init);
            assert!(
                tokio::time::timeout(Duration::from_millis(100), &mut init)
                    .await
                    .is_err()
            );
            observer.dispose();
            init.await
        };

        assert!(matches!(result, Err(InitError::Cancelled)));
        assert_eq!(at_dispose.get(), Some(ResourceCounts::default()));
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
        assert!(host.errors.is_empty());
        assert_eq!(host.count("three-ready"), 0);
        assert_eq!(host.indicator.as_ref().unwrap().releases, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_features_to_about_flips_once() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;

        enter(&mut earth, "hero", 0.0);
        assert_eq!(enter(&mut earth, "features", 0.1).map(|c| c.flips_mode), Some(false));
        assert_eq!(earth.mode(), SurfaceMode::Day);
        assert_eq!(earth.director().state().target_orbit_angle, 0.0);

        let change = enter(&mut earth, "section3", 0.2).unwrap();
        assert!(change.flips_mode);
        assert_eq!(earth.mode(), SurfaceMode::Night);
        assert_eq!(earth.director().state().target_orbit_angle, PI);
        let node = earth.scene().node(earth.earth_system().node).unwrap();
        assert_eq!(node.material(), Some(earth.earth_system().night_material));
        let night = earth.config().lighting.night.clone();
        assert_eq!(earth.scene().ambient.intensity, night.ambient_intensity);

        assert!(enter(&mut earth, "section3", 0.3).is_none(), "same section is no change");
        for (id, t) in [("footer-trigger-zone", 0.4), ("section3", 0.5), ("features", 0.6), ("hero", 0.7)] {
            let change = enter(&mut earth, id, t).unwrap();
            assert!(!change.flips_mode, "{id}");
        }
        assert_eq!(earth.mode(), SurfaceMode::Night);
    }

    #[tokio::test(start_paused = true)]
    async fn test_features_forms_cards_from_stars() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;

        enter(&mut earth, "hero", 0.0);
        enter(&mut earth, "features", 0.0);
        assert!(earth.stars().is_forming_cards());
        assert!(earth.cards().is_shown());
        let now = run_frames(&mut earth, &mut host, 0.0, 240);
        assert!((earth.stars().transition() - 1.0).abs() < 1e-4);
        assert!(earth.cards().progress() > 0.99);

        enter(&mut earth, "section3", now);
        assert!(!earth.stars().is_forming_cards());
        run_frames(&mut earth, &mut host, now, 240);
        assert!(earth.stars().transition() < 1e-4);
        assert!(earth.cards().progress() < 1e-4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        let now = run_frames(&mut earth, &mut host, 0.0, 3);
        assert_eq!(earth.backend().frames_rendered(), 3);

        earth.set_document_hidden(&mut host, true);
        assert!(!earth.is_running());
        assert!(host.frames.is_idle());
        assert_eq!(host.frames.cancelled(), 1);

        earth.set_container_visible(&mut host, false);
        earth.set_document_hidden(&mut host, false);
        assert!(!earth.is_running(), "still out of view");

        earth.set_container_visible(&mut host, true);
        assert!(earth.is_running());
        let stale = FrameToken::from_raw(1);
        assert_eq!(earth.frame(&mut host, stale, now), FrameOutcome::Stale);
        run_frames(&mut earth, &mut host, now + 5.0, 2);
        assert_eq!(earth.backend().frames_rendered(), 5);
        assert_eq!(host.frames.pending().len(), 1, "one frame in flight");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_frame_releases_loader_once() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        run_frames(&mut earth, &mut host, 0.0, 10);
        assert_eq!(host.count("three-first-frame"), 1);
        assert_eq!(host.indicator.as_ref().unwrap().releases, 1);
        earth.dispose(&mut host);
        assert_eq!(host.indicator.as_ref().unwrap().releases, 1);

        let mut bare = MockHost {
            indicator: None,
            ..Default::default()
        };
        let mut earth = start(&mut bare).await;
        run_frames(&mut earth, &mut bare, 0.0, 5);
        assert_eq!(bare.hidden, vec![LOADER_FALLBACK_ID.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_showcase_boosts_and_reverts() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        let base = earth.config();
        let detail = serde_json::json!({ "duration": 3000 });

        assert!(earth.handle_custom_event(SHOWCASE_EVENT, Some(&detail), 1.0));
        assert!(earth.is_showcase_active());
        assert_eq!(earth.config().clouds.rotation_speed, base.clouds.rotation_speed * 3.0);
        assert_eq!(earth.director().state().target_orbit_angle, FRAC_PI_2);
        assert!(matches!(earth.shooting_stars().shower_state(), ShowerState::Active { .. }));
        assert!(!earth.trigger_showcase(1000, 1.5), "already active");

        let scale = earth.earth_motion().target_scale;
        earth.advance_timers(3.75);
        assert!(earth.earth_motion().target_scale < scale, "scale bump restored early");
        earth.advance_timers(4.0);
        assert!(!earth.is_showcase_active());
        assert_eq!(*earth.config(), *base);
        assert!(!earth.handle_custom_event("other", None, 5.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_showcase_swings_from_current_orbit() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        enter(&mut earth, "hero", 0.0);
        enter(&mut earth, "features", 0.1);
        enter(&mut earth, "section3", 0.2);
        let now = run_frames(&mut earth, &mut host, 0.2, 10);

        let orbit = earth.director().state().orbit_angle;
        assert!(orbit > 0.0 && orbit < PI, "orbit still swinging: {orbit}");
        assert!(earth.trigger_showcase(2000, now));
        let target = earth.director().state().target_orbit_angle;
        assert!((target - (orbit + FRAC_PI_2)).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_meteor_shower_no_op_while_busy() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        assert!(earth.trigger_meteor_shower());
        let state = earth.shooting_stars().shower_state();
        assert!(!earth.trigger_meteor_shower());
        assert_eq!(earth.shooting_stars().shower_state(), state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_navigates() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        enter(&mut earth, "features", 0.0);
        run_frames(&mut earth, &mut host, 0.0, 600);

        let camera = earth.camera().clone();
        let card = earth.cards().node(0).unwrap();
        let center = earth.scene().world_matrix(card).unwrap().transform_point3(Vec3::ZERO);
        let ndc = camera.project(center).truncate();
        assert!(earth.click(&mut host, ndc));
        assert_eq!(host.links.len(), 1);
        assert!(!earth.click(&mut host, Vec2::new(0.99, 0.99)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_releases_everything() {
        let mut host = MockHost::default();
        let lifecycle = Lifecycle::new();
        let mut earth = start_with(&mut host, &lifecycle, &InitOptions::default(), &source())
            .await
            .unwrap();
        enter(&mut earth, "features", 0.0);
        run_frames(&mut earth, &mut host, 0.0, 30);

        let leaked = earth.dispose(&mut host);
        assert!(leaked.is_empty(), "{leaked:?}");
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
        assert!(host.frames.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_propagates() {
        let mut host = MockHost::default();
        let mut earth = start(&mut host).await;
        let version = earth.update_config(&ConfigOverride {
            cloud_opacity: Some(0.25),
            ..Default::default()
        });
        assert!(version > 0);
        assert_eq!(earth.config().clouds.opacity, 0.25);
        let material = earth.clouds().material.unwrap();
        assert_eq!(
            earth.scene().material(material).and_then(Material::as_standard).unwrap().opacity,
            0.25
        );
        assert!(earth.fly_to_preset("about", 0.0));
        assert!(earth.fly_to_preset("site-footer", 0.0));
        assert!(!earth.fly_to_preset("nowhere", 0.0));
    }
}
