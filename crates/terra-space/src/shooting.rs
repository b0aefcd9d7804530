//! Pooled shooting stars and the meteor shower cycle.

use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use terra_animation::tick_scale;
use terra_config::ShootingStarConfig;
use terra_render::{
    BasicMaterial, GeometryId, Material, MaterialId, Node, NodeId, RenderBackend, RenderError,
    Scene, Transform, rgb_from_hex, uv_sphere,
};

const STAR_RADIUS: f32 = 0.05;
const STAR_SEGMENTS: u32 = 8;
const STAR_COLOR: u32 = 0xfffdef;
/// Fraction of the lifetime after which a star fades out.
const FADE_START: f32 = 0.7;

/// Slot index of a pooled shooting star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShootingStarHandle(usize);

impl ShootingStarHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Slot {
    node: NodeId,
    material: MaterialId,
    in_use: bool,
}

/// A bounded free list of hidden star meshes. All meshes share one sphere
/// geometry; each has its own material so it can fade independently.
#[derive(Debug)]
pub struct ShootingStarPool {
    group: NodeId,
    geometry: GeometryId,
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl ShootingStarPool {
    /// Build `capacity` hidden stars under a new group attached to `parent`.
    pub fn new<B>(
        scene: &mut Scene,
        backend: &mut B,
        parent: NodeId,
        capacity: usize,
    ) -> Result<Self, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        let geometry = backend.upload_mesh(
            "shooting-star",
            &uv_sphere(STAR_RADIUS, STAR_SEGMENTS),
        )?;
        let group = scene.add(parent, Node::group("shooting-stars"));
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let material = scene.add_material(Material::Basic(BasicMaterial {
                color: rgb_from_hex(STAR_COLOR),
                transparent: true,
                ..Default::default()
            }));
            let mut node = Node::mesh(format!("shooting-star-{i}"), geometry, material);
            node.visible = false;
            let node = scene.add(group, node);
            slots.push(Slot {
                node,
                material,
                in_use: false,
            });
        }
        // Pop from the back so slot 0 is handed out first.
        let free = (0..capacity).rev().collect();
        Ok(Self {
            group,
            geometry,
            slots,
            free,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn geometry(&self) -> GeometryId {
        self.geometry
    }

    pub fn node(&self, handle: ShootingStarHandle) -> Option<NodeId> {
        self.slots.get(handle.0).map(|s| s.node)
    }

    /// Take a star out of the pool, visible at full opacity. `None` when
    /// every slot is in use.
    pub fn acquire(&mut self, scene: &mut Scene) -> Option<ShootingStarHandle> {
        let index = self.free.pop()?;
        let slot = &mut self.slots[index];
        slot.in_use = true;
        if let Some(node) = scene.node_mut(slot.node) {
            node.visible = true;
        }
        set_opacity(scene, slot.material, 1.0);
        Some(ShootingStarHandle(index))
    }

    /// Hide a star and return it to the pool. Returns `false` for handles
    /// that are not currently acquired.
    pub fn release(&mut self, scene: &mut Scene, handle: ShootingStarHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.0) else {
            return false;
        };
        if !slot.in_use {
            return false;
        }
        slot.in_use = false;
        if let Some(node) = scene.node_mut(slot.node) {
            node.visible = false;
        }
        self.free.push(handle.0);
        true
    }

    fn set_opacity(&self, scene: &mut Scene, handle: ShootingStarHandle, opacity: f32) {
        if let Some(slot) = self.slots.get(handle.0) {
            set_opacity(scene, slot.material, opacity);
        }
    }

    pub fn dispose(self, scene: &mut Scene, backend: &mut dyn RenderBackend) {
        scene.dispose_subtree(self.group, backend);
    }
}

fn set_opacity(scene: &mut Scene, material: MaterialId, opacity: f32) {
    if let Some(Material::Basic(basic)) = scene.material_mut(material) {
        basic.opacity = opacity;
    }
}

/// Where the meteor shower cycle stands. Durations are in 60 Hz ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShowerState {
    Idle,
    Active { elapsed: f32 },
    Cooldown { remaining: f32 },
}

#[derive(Debug, Clone, Copy)]
struct Flight {
    handle: ShootingStarHandle,
    velocity: Vec3,
    age: f32,
    lifetime: f32,
}

/// Randomly spawned shooting stars with occasional showers.
#[derive(Debug)]
pub struct ShootingStars {
    pool: ShootingStarPool,
    active: Vec<Flight>,
    shower: ShowerState,
    config: ShootingStarConfig,
    rng: ChaCha8Rng,
    disabled: bool,
}

impl ShootingStars {
    pub fn new<B>(
        scene: &mut Scene,
        backend: &mut B,
        config: &ShootingStarConfig,
        seed: u64,
    ) -> Result<Self, RenderError>
    where
        B: RenderBackend + ?Sized,
    {
        let root = scene.root();
        let pool = ShootingStarPool::new(scene, backend, root, config.max_simultaneous)?;
        Ok(Self {
            pool,
            active: Vec::with_capacity(config.max_simultaneous),
            shower: ShowerState::Idle,
            config: config.clone(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            disabled: false,
        })
    }

    pub fn pool(&self) -> &ShootingStarPool {
        &self.pool
    }

    pub fn shower_state(&self) -> ShowerState {
        self.shower
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Adopt new cadence values. The pool size is fixed at construction.
    pub fn set_config(&mut self, config: &ShootingStarConfig) {
        self.config = config.clone();
    }

    /// Start a shower. No-op (returns `false`) while one is active or cooling
    /// down.
    pub fn trigger_shower(&mut self) -> bool {
        if self.shower != ShowerState::Idle {
            return false;
        }
        self.shower = ShowerState::Active { elapsed: 0.0 };
        tracing::info!("Meteor shower triggered");
        true
    }

    /// Launch one star from behind the scene. `false` when the simultaneous
    /// limit is reached.
    pub fn spawn(&mut self, scene: &mut Scene) -> bool {
        if self.active.len() >= self.config.max_simultaneous {
            return false;
        }
        let Some(handle) = self.pool.acquire(scene) else {
            return false;
        };

        let rng = &mut self.rng;
        let position = Vec3::new(
            (rng.random::<f32>() - 0.5) * 100.0,
            20.0 + rng.random::<f32>() * 20.0,
            -50.0 - rng.random::<f32>() * 50.0,
        );
        let velocity = Vec3::new(
            (rng.random::<f32>() - 0.9) * 0.2,
            (rng.random::<f32>() - 0.6) * 0.2,
            0.0,
        );
        let stretch = 2.0 + rng.random::<f32>() * 3.0;
        let lifetime = 300.0 + rng.random::<f32>() * 200.0;

        if let Some(node) = self.pool.node(handle).and_then(|id| scene.node_mut(id)) {
            node.transform = Transform {
                position,
                rotation: Quat::from_rotation_arc(Vec3::Z, velocity.normalize_or(Vec3::NEG_X)),
                scale: Vec3::new(1.0, 1.0, stretch),
            };
        }
        self.active.push(Flight {
            handle,
            velocity,
            age: 0.0,
            lifetime,
        });
        true
    }

    /// Advance the shower cycle, maybe spawn, then move, fade and retire
    /// stars. `dt` is in seconds.
    pub fn update(&mut self, scene: &mut Scene, dt: f32) {
        if self.disabled {
            return;
        }
        let ticks = tick_scale(dt.max(0.0));

        self.shower = match self.shower {
            ShowerState::Active { elapsed } if elapsed + ticks >= self.config.shower_duration => {
                ShowerState::Cooldown {
                    remaining: self.config.shower_cooldown,
                }
            }
            ShowerState::Active { elapsed } => ShowerState::Active {
                elapsed: elapsed + ticks,
            },
            ShowerState::Cooldown { remaining } if remaining - ticks <= 0.0 => ShowerState::Idle,
            ShowerState::Cooldown { remaining } => ShowerState::Cooldown {
                remaining: remaining - ticks,
            },
            ShowerState::Idle => ShowerState::Idle,
        };

        let chance = match self.shower {
            ShowerState::Active { .. } => self.config.shower_frequency,
            _ => self.config.base_frequency,
        };
        if self.rng.random::<f32>() < chance * ticks {
            self.spawn(scene);
        }

        let mut i = 0;
        while i < self.active.len() {
            let flight = &mut self.active[i];
            flight.age += ticks;
            if flight.age > flight.lifetime {
                let handle = flight.handle;
                self.active.swap_remove(i);
                self.pool.release(scene, handle);
                continue;
            }

            let (handle, velocity) = (flight.handle, flight.velocity);
            let fade_start = flight.lifetime * FADE_START;
            let opacity = if flight.age > fade_start {
                1.0 - (flight.age - fade_start) / (flight.lifetime - fade_start)
            } else {
                1.0
            };
            if let Some(node) = self.pool.node(handle).and_then(|id| scene.node_mut(id)) {
                node.transform.position += velocity * ticks;
            }
            self.pool.set_opacity(scene, handle, opacity.clamp(0.0, 1.0));
            i += 1;
        }
    }

    pub fn dispose(self, scene: &mut Scene, backend: &mut dyn RenderBackend) {
        self.pool.dispose(scene, backend);
    }
}
