//! Billboard cards: the entrance cascade, the exit drift, hover and picking.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use terra_animation::{Easing, Tween, damp, tick_scale};
use terra_config::CardRecord;
use terra_render::{
    BasicMaterial, Blending, Camera, GeometryId, Material, MaterialId, Node, NodeId,
    RenderBackend, RenderError, Scene, ScreenRect, Side, TextureOptions, Transform, Viewport,
    plane,
};

use crate::canvas;

/// Cards fainter than this are not pickable.
const PICK_MIN_OPACITY: f32 = 0.01;

/// Which way the page scrolled when the cards were triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardDirection {
    Down,
    Up,
}

impl CardDirection {
    /// `-1` for cards launched from below, `1` from above.
    fn vertical(self) -> f32 {
        match self {
            CardDirection::Down => -1.0,
            CardDirection::Up => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Idle,
    Entering,
    Exiting,
}

/// Placement and animation tunables. Distances are world units, times are
/// seconds, rates are per 60 Hz tick.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub card_width: f32,
    pub card_height: f32,
    /// Center distance between neighbours in the row.
    pub spacing: f32,
    pub row_y: f32,
    pub row_z: f32,
    pub stagger: f64,
    pub entry_duration: f64,
    pub exit_duration: f64,
    pub launch_distance: f32,
    pub launch_depth: f32,
    /// Sideways launch offset per slot away from the row center.
    pub launch_spread: f32,
    /// Launch pitch in radians.
    pub launch_tilt: f32,
    pub exit_speed: f32,
    pub float_amplitude: f32,
    /// Radians per second.
    pub float_speed: f32,
    pub hover_lift: f32,
    pub hover_scale: f32,
    pub hover_rate: f32,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            card_width: 2.3,
            card_height: 3.15,
            spacing: 2.7,
            row_y: 0.0,
            row_z: 4.0,
            stagger: 0.12,
            entry_duration: 1.2,
            exit_duration: 0.8,
            launch_distance: 12.0,
            launch_depth: 6.0,
            launch_spread: 1.5,
            launch_tilt: 1.1,
            exit_speed: 0.12,
            float_amplitude: 0.1,
            float_speed: 1.0,
            hover_lift: 0.5,
            hover_scale: 1.1,
            hover_rate: 0.1,
        }
    }
}

#[derive(Debug)]
struct Card {
    link: String,
    node: NodeId,
    material: MaterialId,
    base_position: Vec3,
    animation_offset: Vec3,
    /// Euler XYZ tilt applied on top of the camera-facing rotation.
    animation_rotation: Vec3,
    launch_offset: Vec3,
    launch_rotation: Vec3,
    target_opacity: f32,
    opacity: f32,
    delay: f64,
    entry: Option<Tween>,
    hover: f32,
    float_phase: f32,
}

/// Owns the card meshes under one group node.
#[derive(Debug)]
pub struct CardManager {
    group: NodeId,
    cards: Vec<Card>,
    layout: CardLayout,
    phase: CardPhase,
    exit_velocity: Vec3,
    shown: bool,
    progress: f32,
    hovered: Option<usize>,
}

impl CardManager {
    /// Build one hidden billboard per record under a new group attached to
    /// `parent`. `seed` scatters the border stardust of each texture.
    pub fn new(
        scene: &mut Scene,
        backend: &mut dyn RenderBackend,
        parent: NodeId,
        records: &[CardRecord],
        pixel_ratio: f32,
        layout: CardLayout,
        seed: u64,
    ) -> Result<Self, RenderError> {
        let geometry = backend.upload_mesh("card", &plane(layout.card_width, layout.card_height))?;
        let group = scene.add(parent, Node::group("cards"));
        let mut cards = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            let slot = CardSlot {
                index: i,
                count: records.len(),
                pixel_ratio,
                seed,
            };
            match build_card(scene, backend, group, geometry, record, slot, &layout) {
                Ok(card) => cards.push(card),
                Err(e) => {
                    tracing::error!("Failed to build card {:?}: {e}", record.title);
                    let had_nodes = !cards.is_empty();
                    scene.dispose_subtree(group, backend);
                    if !had_nodes {
                        backend.release_geometry(geometry);
                    }
                    return Err(e);
                }
            }
        }
        if cards.is_empty() {
            backend.release_geometry(geometry);
        }

        tracing::debug!("Created {} cards", cards.len());
        Ok(Self {
            group,
            cards,
            layout,
            phase: CardPhase::Idle,
            exit_velocity: Vec3::ZERO,
            shown: false,
            progress: 1.0,
            hovered: None,
        })
    }

    pub fn group(&self) -> NodeId {
        self.group
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<NodeId> {
        self.cards.get(index).map(|c| c.node)
    }

    pub fn phase(&self) -> CardPhase {
        self.phase
    }

    /// Whether the cards are entering, settled, or still fading out.
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn layout(&self) -> &CardLayout {
        &self.layout
    }

    /// Entrance delays of the current or last trigger, by card index.
    pub fn delays(&self) -> Vec<f64> {
        self.cards.iter().map(|c| c.delay).collect()
    }

    /// Animated opacity of card `index`, before the external progress.
    pub fn opacity(&self, index: usize) -> Option<f32> {
        self.cards.get(index).map(|c| c.opacity)
    }

    /// Multiplier on every card's opacity, e.g. from the star morph.
    pub fn set_progress(&mut self, progress: f32) {
        if progress.is_finite() {
            self.progress = progress.clamp(0.0, 1.0);
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Launch every card from off-screen. Scrolling down cascades left to
    /// right, scrolling up right to left.
    pub fn animate_in(&mut self, direction: CardDirection, now: f64) {
        let n = self.cards.len();
        let vertical = direction.vertical();
        for (i, card) in self.cards.iter_mut().enumerate() {
            let order = match direction {
                CardDirection::Down => i,
                CardDirection::Up => n - 1 - i,
            };
            let side = i as f32 - (n as f32 - 1.0) * 0.5;
            card.delay = order as f64 * self.layout.stagger;
            card.launch_offset = Vec3::new(
                side * self.layout.launch_spread,
                vertical * self.layout.launch_distance,
                -self.layout.launch_depth,
            );
            card.launch_rotation = Vec3::new(-vertical * self.layout.launch_tilt, side * 0.15, side * -0.1);
            card.animation_offset = card.launch_offset;
            card.animation_rotation = card.launch_rotation;
            card.opacity = 0.0;
            card.target_opacity = 1.0;
            card.entry = Some(Tween::new(now + card.delay, self.layout.entry_duration, Easing::OutCubic));
        }
        self.phase = CardPhase::Entering;
        self.shown = n > 0;
        tracing::debug!("Cards entering ({direction:?})");
    }

    /// Drift every card away and fade it out. Leaving downward sends the
    /// cards up, leaving upward sends them down.
    pub fn animate_out(&mut self, direction: CardDirection) -> bool {
        if !self.shown {
            return false;
        }
        for card in &mut self.cards {
            card.entry = None;
            card.target_opacity = 0.0;
        }
        self.exit_velocity = Vec3::new(0.0, -direction.vertical(), -0.25) * self.layout.exit_speed;
        self.phase = CardPhase::Exiting;
        tracing::debug!("Cards exiting ({direction:?})");
        true
    }

    /// Advance the animation and write transforms and opacities into the
    /// scene. `pointer` is in normalized device coordinates. Returns the
    /// hovered card.
    pub fn update(
        &mut self,
        scene: &mut Scene,
        camera: &Camera,
        pointer: Option<Vec2>,
        now: f64,
        dt: f32,
    ) -> Option<usize> {
        match self.phase {
            CardPhase::Entering => self.advance_entry(now),
            CardPhase::Exiting => self.advance_exit(dt),
            CardPhase::Idle => {}
        }

        self.hovered = if self.shown && self.phase != CardPhase::Exiting {
            pointer.and_then(|ndc| self.pick(scene, camera, ndc))
        } else {
            None
        };

        let group_world = scene.world_matrix(self.group).unwrap_or(Mat4::IDENTITY);
        let layout = &self.layout;
        for (i, card) in self.cards.iter_mut().enumerate() {
            let hover_target = if self.hovered == Some(i) { 1.0 } else { 0.0 };
            card.hover = damp(card.hover, hover_target, layout.hover_rate, dt);

            let float = (now as f32 * layout.float_speed + card.float_phase).sin() * layout.float_amplitude;
            let lift = card.hover * layout.hover_lift;
            let position = card.base_position + card.animation_offset + Vec3::Y * (float + lift);
            let scale = 1.0 + card.hover * (layout.hover_scale - 1.0);
            let facing = billboard_rotation(group_world.transform_point3(position), camera.position);
            let r = card.animation_rotation;
            let tilt = Quat::from_euler(EulerRot::XYZ, r.x, r.y, r.z);

            if let Some(node) = scene.node_mut(card.node) {
                node.transform = Transform {
                    position,
                    rotation: facing * tilt,
                    scale: Vec3::splat(scale),
                };
                node.visible = self.shown;
            }
            if let Some(Material::Basic(basic)) = scene.material_mut(card.material) {
                basic.opacity = card.opacity * self.progress;
            }
        }
        self.hovered
    }

    fn advance_entry(&mut self, now: f64) {
        let mut settled = true;
        for card in &mut self.cards {
            let Some(tween) = card.entry else {
                continue;
            };
            let eased = tween.eased(now);
            card.animation_offset = card.launch_offset * (1.0 - eased);
            card.animation_rotation = card.launch_rotation * (1.0 - eased);
            card.opacity = eased * card.target_opacity;
            if tween.is_finished(now) {
                card.entry = None;
            } else {
                settled = false;
            }
        }
        if settled {
            self.phase = CardPhase::Idle;
            tracing::debug!("Cards settled");
        }
    }

    fn advance_exit(&mut self, dt: f32) {
        let ticks = tick_scale(dt);
        let fade = if self.layout.exit_duration > 0.0 {
            dt / self.layout.exit_duration as f32
        } else {
            1.0
        };
        let mut faded = true;
        for card in &mut self.cards {
            card.animation_offset += self.exit_velocity * ticks;
            card.opacity = (card.opacity - fade).max(card.target_opacity);
            if card.opacity > 0.0 {
                faded = false;
            }
        }
        if faded {
            self.phase = CardPhase::Idle;
            self.shown = false;
            tracing::debug!("Cards hidden");
        }
    }

    /// Nearest visible card under `ndc`.
    pub fn pick(&self, scene: &Scene, camera: &Camera, ndc: Vec2) -> Option<usize> {
        if !self.shown {
            return None;
        }
        let ray = camera.ray_from_ndc(ndc);
        self.cards
            .iter()
            .enumerate()
            .filter(|(_, c)| c.opacity * self.progress > PICK_MIN_OPACITY)
            .filter_map(|(i, c)| {
                let world = scene.world_matrix(c.node)?;
                let t = ray.intersect_quad(world, self.layout.card_width, self.layout.card_height)?;
                Some((i, t))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Link of the card under `ndc`, if any. Exiting cards ignore clicks.
    pub fn handle_click(&self, scene: &Scene, camera: &Camera, ndc: Vec2) -> Option<&str> {
        if self.phase == CardPhase::Exiting {
            return None;
        }
        let index = self.pick(scene, camera, ndc)?;
        let link = self.cards[index].link.as_str();
        if link.is_empty() {
            return None;
        }
        tracing::info!("Card {index} clicked, opening {link}");
        Some(link)
    }

    /// Pixel rectangles of the cards at rest in the row, facing `camera`.
    /// Cards partly behind the camera are left out.
    pub fn screen_rects(&self, scene: &Scene, camera: &Camera, viewport: Viewport) -> Vec<ScreenRect> {
        let group_world = scene.world_matrix(self.group).unwrap_or(Mat4::IDENTITY);
        let half = Vec2::new(self.layout.card_width, self.layout.card_height) * 0.5;
        let forward = camera.forward();

        self.cards
            .iter()
            .filter_map(|card| {
                let center = group_world.transform_point3(card.base_position);
                let facing = billboard_rotation(center, camera.position);
                let mut min = Vec2::splat(f32::MAX);
                let mut max = Vec2::splat(f32::MIN);
                for (sx, sy) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                    let corner = center + facing * Vec3::new(sx * half.x, sy * half.y, 0.0);
                    if (corner - camera.position).dot(forward) <= camera.near {
                        return None;
                    }
                    let px = viewport.from_ndc(camera.project(corner).truncate());
                    min = min.min(px);
                    max = max.max(px);
                }
                Some(ScreenRect::new(min.x, min.y, max.x - min.x, max.y - min.y))
            })
            .collect()
    }

    /// Remove the cards and release their textures, materials and geometry.
    pub fn dispose(self, scene: &mut Scene, backend: &mut dyn RenderBackend) {
        scene.dispose_subtree(self.group, backend);
        tracing::debug!("Cards disposed");
    }
}

/// Where a card sits in the row and how its texture is rendered.
#[derive(Debug, Clone, Copy)]
struct CardSlot {
    index: usize,
    count: usize,
    pixel_ratio: f32,
    seed: u64,
}

fn build_card(
    scene: &mut Scene,
    backend: &mut dyn RenderBackend,
    group: NodeId,
    geometry: GeometryId,
    record: &CardRecord,
    slot: CardSlot,
    layout: &CardLayout,
) -> Result<Card, RenderError> {
    let CardSlot {
        index,
        count,
        pixel_ratio,
        seed,
    } = slot;
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64));
    let image = canvas::card_texture(record, pixel_ratio, &mut rng)?;
    let options = TextureOptions {
        generate_mipmaps: false,
        ..Default::default()
    };
    let texture = backend.upload_texture(&format!("card-{index}"), &image, &options)?;
    let material = scene.add_material(Material::Basic(BasicMaterial {
        map: Some(texture),
        opacity: 0.0,
        transparent: true,
        depth_write: false,
        side: Side::Double,
        blending: Blending::Normal,
        ..Default::default()
    }));

    let x = (index as f32 - (count as f32 - 1.0) * 0.5) * layout.spacing;
    let base_position = Vec3::new(x, layout.row_y, layout.row_z);
    let mut node = Node::mesh(format!("card-{index}"), geometry, material)
        .with_transform(Transform::from_position(base_position));
    node.visible = false;
    let node = scene.add(group, node);

    Ok(Card {
        link: record.link.clone(),
        node,
        material,
        base_position,
        animation_offset: Vec3::ZERO,
        animation_rotation: Vec3::ZERO,
        launch_offset: Vec3::ZERO,
        launch_rotation: Vec3::ZERO,
        target_opacity: 0.0,
        opacity: 0.0,
        delay: 0.0,
        entry: None,
        hover: 0.0,
        float_phase: index as f32,
    })
}

/// Rotation turning a plane's +Z toward `eye`, keeping world up.
fn billboard_rotation(position: Vec3, eye: Vec3) -> Quat {
    let Some(z) = (eye - position).try_normalize() else {
        return Quat::IDENTITY;
    };
    let right = Vec3::Y.cross(z).try_normalize().unwrap_or(Vec3::X);
    let up = z.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, z)).normalize()
}
