//! Scene graph arena: nodes with transforms, materials, and lights.
//!
//! Nodes are addressed by generational [`NodeId`]s so stale handles held by
//! subsystems resolve to `None` after removal instead of aliasing new nodes.

use glam::{Mat4, Quat, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{GeometryId, RenderBackend, TextureId};
use crate::camera::Camera;
use crate::material::Material;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

impl MaterialId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Translation, rotation, and non-uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// One discrete detail level of a [`NodeKind::Lod`] node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodLevel {
    /// Child node rendered at this level.
    pub node: NodeId,
    /// Camera distance from which this level applies.
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh {
        geometry: GeometryId,
        material: MaterialId,
    },
    /// Instanced star sprites.
    Stars {
        geometry: GeometryId,
        material: MaterialId,
        count: u32,
    },
    /// Renders exactly one child, picked by camera distance.
    Lod { levels: Vec<LodLevel> },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    /// Lower values draw first within the opaque and transparent groups.
    pub render_order: i32,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            visible: true,
            render_order: 0,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, geometry: GeometryId, material: MaterialId) -> Self {
        Self::new(name, NodeKind::Mesh { geometry, material })
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The material this node draws with, if any.
    pub fn material(&self) -> Option<MaterialId> {
        match self.kind {
            NodeKind::Mesh { material, .. } | NodeKind::Stars { material, .. } => Some(material),
            NodeKind::Group | NodeKind::Lod { .. } => None,
        }
    }

    pub fn geometry(&self) -> Option<GeometryId> {
        match self.kind {
            NodeKind::Mesh { geometry, .. } | NodeKind::Stars { geometry, .. } => Some(geometry),
            NodeKind::Group | NodeKind::Lod { .. } => None,
        }
    }

    /// Point a mesh or star node at another material.
    pub fn set_material(&mut self, id: MaterialId) {
        if let NodeKind::Mesh { material, .. } | NodeKind::Stars { material, .. } = &mut self.kind
        {
            *material = id;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Light arriving from `position` toward the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    /// Unit vector from the origin toward the light.
    pub fn direction(&self) -> Vec3 {
        self.position.normalize_or(Vec3::Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawKind {
    Mesh,
    Stars { count: u32 },
}

/// One visible renderable, resolved to world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub node: NodeId,
    pub world: Mat4,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub kind: DrawKind,
    pub transparent: bool,
    pub render_order: i32,
    /// Distance from the camera to the node origin.
    pub view_depth: f32,
}

/// GPU resources no longer referenced after a removal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneResources {
    pub geometries: Vec<GeometryId>,
    pub materials: Vec<MaterialId>,
    pub textures: Vec<TextureId>,
}

impl SceneResources {
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty() && self.materials.is_empty() && self.textures.is_empty()
    }

    /// Release everything listed.
    pub fn release(self, backend: &mut dyn RenderBackend) {
        for id in self.geometries {
            backend.release_geometry(id);
        }
        for id in self.materials {
            backend.release_material(id);
        }
        for id in self.textures {
            backend.release_texture(id);
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Owns every node and material of a rendered scene.
#[derive(Debug)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    materials: FxHashMap<MaterialId, Material>,
    next_material: u64,
    pub ambient: AmbientLight,
    pub sun: DirectionalLight,
    /// Tone-mapping exposure.
    pub exposure: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node::group("root")),
            }],
            free: Vec::new(),
            root,
            materials: FxHashMap::default(),
            next_material: 0,
            ambient: AmbientLight {
                color: Vec3::ONE,
                intensity: 0.0,
            },
            sun: DirectionalLight {
                position: Vec3::Y,
                color: Vec3::ONE,
                intensity: 0.0,
            },
            exposure: 1.0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// Insert `node` under `parent`. Unknown parents fall back to the root.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let parent = if self.contains(parent) {
            parent
        } else {
            log::warn!("Parent {parent:?} is gone, attaching '{}' to root", node.name);
            self.root
        };
        node.parent = Some(parent);
        node.children.clear();

        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Insert a detail-level node whose children are `levels`, nearest first.
    pub fn add_lod(&mut self, parent: NodeId, lod: Node, levels: Vec<(Node, f32)>) -> NodeId {
        let lod_id = self.add(
            parent,
            Node {
                kind: NodeKind::Lod { levels: Vec::new() },
                ..lod
            },
        );
        let resolved: Vec<LodLevel> = levels
            .into_iter()
            .map(|(node, distance)| LodLevel {
                node: self.add(lod_id, node),
                distance,
            })
            .collect();
        if let Some(node) = self.node_mut(lod_id) {
            node.kind = NodeKind::Lod { levels: resolved };
        }
        lod_id
    }

    /// First node with `name`, in insertion order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.node.as_ref().filter(|n| n.name == name).map(|_| NodeId {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.next_material);
        self.next_material += 1;
        self.materials.insert(id, material);
        id
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// World matrix of `id`, composed through its ancestors.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.node(id)?;
        let mut world = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.node(parent)?;
            world = node.transform.matrix() * world;
        }
        Some(world)
    }

    /// Whether `id` and all its ancestors are visible.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cid) = current {
            match self.node(cid) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// The level to render at `distance`: the farthest level whose threshold
    /// has been reached.
    pub fn select_lod(levels: &[LodLevel], distance: f32) -> Option<NodeId> {
        levels
            .iter()
            .rev()
            .find(|l| distance >= l.distance)
            .or_else(|| levels.first())
            .map(|l| l.node)
    }

    /// Visible renderables, opaque first (front to back) then transparent
    /// (back to front), each group ordered by `render_order` first.
    pub fn draw_list(&self, camera: &Camera) -> Vec<DrawItem> {
        let mut items = Vec::new();
        let mut stack = vec![(self.root, Mat4::IDENTITY)];

        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.matrix();

            match &node.kind {
                NodeKind::Group => {}
                NodeKind::Lod { levels } => {
                    let distance = camera.position.distance(world.w_axis.truncate());
                    if let Some(level) = Self::select_lod(levels, distance) {
                        stack.push((level, world));
                    }
                    continue;
                }
                NodeKind::Mesh { geometry, material } | NodeKind::Stars { geometry, material, .. } => {
                    if let Some(mat) = self.materials.get(material)
                        && !mat.is_invisible()
                    {
                        let kind = match node.kind {
                            NodeKind::Stars { count, .. } => DrawKind::Stars { count },
                            _ => DrawKind::Mesh,
                        };
                        items.push(DrawItem {
                            node: id,
                            world,
                            geometry: *geometry,
                            material: *material,
                            kind,
                            transparent: mat.is_transparent(),
                            render_order: node.render_order,
                            view_depth: camera.position.distance(world.w_axis.truncate()),
                        });
                    }
                }
            }
            for &child in node.children.iter().rev() {
                stack.push((child, world));
            }
        }

        sort_draw_items(&mut items);
        items
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cid) = stack.pop() {
            if let Some(node) = self.node(cid) {
                out.push(cid);
                stack.extend(node.children.iter().copied());
            }
        }
        out
    }

    /// Remove `id` and its descendants. Returns the geometries, materials and
    /// textures that nothing left in the scene references. Removing the root
    /// clears its children.
    pub fn remove_subtree(&mut self, id: NodeId) -> SceneResources {
        if !self.contains(id) {
            return SceneResources::default();
        }
        let targets: Vec<NodeId> = if id == self.root {
            self.node(id).map(|n| n.children.clone()).unwrap_or_default()
        } else {
            vec![id]
        };

        let mut geometries = FxHashSet::default();
        let mut materials = FxHashSet::default();
        for target in targets {
            if let Some(parent) = self.node(target).and_then(|n| n.parent)
                && let Some(p) = self.node_mut(parent)
            {
                p.children.retain(|c| *c != target);
                if let NodeKind::Lod { levels } = &mut p.kind {
                    levels.retain(|l| l.node != target);
                }
            }
            for nid in self.subtree(target) {
                let slot = &mut self.slots[nid.index as usize];
                if let Some(node) = slot.node.take() {
                    geometries.extend(node.geometry());
                    materials.extend(node.material());
                }
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(nid.index);
            }
        }

        for node in self.slots.iter().filter_map(|s| s.node.as_ref()) {
            if let Some(g) = node.geometry() {
                geometries.remove(&g);
            }
            if let Some(m) = node.material() {
                materials.remove(&m);
            }
        }

        let mut released = SceneResources {
            geometries: geometries.into_iter().collect(),
            ..Default::default()
        };
        for mid in materials {
            if let Some(removed) = self.remove_material(mid) {
                released.textures.extend(removed.textures);
                released.materials.push(mid);
            }
        }
        released.geometries.sort();
        released.materials.sort();
        released.textures.sort();
        released.textures.dedup();
        released
    }

    /// Remove a material. Textures still referenced by other materials are
    /// not reported.
    pub fn remove_material(&mut self, id: MaterialId) -> Option<SceneResources> {
        let material = self.materials.remove(&id)?;
        let still_used: FxHashSet<TextureId> =
            self.materials.values().flat_map(|m| m.textures()).collect();
        let mut textures: Vec<TextureId> = material
            .textures()
            .into_iter()
            .filter(|t| !still_used.contains(t))
            .collect();
        textures.sort();
        textures.dedup();
        Some(SceneResources {
            geometries: Vec::new(),
            materials: vec![id],
            textures,
        })
    }

    /// Remove a subtree and release its unreferenced GPU resources.
    pub fn dispose_subtree(&mut self, id: NodeId, backend: &mut dyn RenderBackend) {
        self.remove_subtree(id).release(backend);
    }

    /// Remove a detached material and release its unreferenced textures.
    pub fn dispose_material(&mut self, id: MaterialId, backend: &mut dyn RenderBackend) {
        if let Some(resources) = self.remove_material(id) {
            resources.release(backend);
        }
    }

    /// Remove every node and material, releasing all GPU resources.
    pub fn dispose_all(&mut self, backend: &mut dyn RenderBackend) {
        self.remove_subtree(self.root).release(backend);
        let orphans: Vec<MaterialId> = self.materials.keys().copied().collect();
        for id in orphans {
            self.dispose_material(id, backend);
        }
    }
}

fn sort_draw_items(items: &mut [DrawItem]) {
    items.sort_by(|a, b| {
        a.transparent
            .cmp(&b.transparent)
            .then(a.render_order.cmp(&b.render_order))
            .then_with(|| {
                if a.transparent {
                    b.view_depth.total_cmp(&a.view_depth)
                } else {
                    a.view_depth.total_cmp(&b.view_depth)
                }
            })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{BasicMaterial, StandardMaterial};

    fn geom(n: u64) -> GeometryId {
        GeometryId::from_raw(n)
    }

    fn opaque(scene: &mut Scene) -> MaterialId {
        scene.add_material(Material::Standard(StandardMaterial::default()))
    }

    fn camera_at(z: f32) -> Camera {
        let mut cam = Camera::default();
        cam.position = Vec3::new(0.0, 0.0, z);
        cam
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let group = scene.add(
            scene.root(),
            Node::group("g").with_transform(Transform::from_position(Vec3::new(1.0, 0.0, 0.0))),
        );
        let child = scene.add(
            group,
            Node::group("c").with_transform(Transform::from_position(Vec3::new(0.0, 2.0, 0.0))),
        );
        let world = scene.world_matrix(child).unwrap();
        assert_eq!(world.w_axis.truncate(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_stale_id_after_removal() {
        let mut scene = Scene::new();
        let a = scene.add(scene.root(), Node::group("a"));
        scene.remove_subtree(a);
        let b = scene.add(scene.root(), Node::group("b"));
        assert!(scene.node(a).is_none(), "stale handle must not alias the reused slot");
        assert_eq!(scene.node(b).unwrap().name, "b");
    }

    #[test]
    fn test_invisible_subtree_skipped() {
        let mut scene = Scene::new();
        let mat = opaque(&mut scene);
        let group = scene.add(scene.root(), Node::group("g"));
        scene.add(group, Node::mesh("m", geom(1), mat));
        assert_eq!(scene.draw_list(&camera_at(10.0)).len(), 1);
        scene.node_mut(group).unwrap().visible = false;
        assert!(scene.draw_list(&camera_at(10.0)).is_empty());
    }

    #[test]
    fn test_lod_picks_by_distance() {
        let mut scene = Scene::new();
        let mat = opaque(&mut scene);
        scene.add_lod(
            scene.root(),
            Node::group("moon"),
            vec![
                (Node::mesh("hi", geom(48), mat), 0.0),
                (Node::mesh("mid", geom(28), mat), 15.0),
                (Node::mesh("lo", geom(16), mat), 40.0),
            ],
        );
        let pick = |z: f32| scene.draw_list(&camera_at(z))[0].geometry;
        assert_eq!(pick(5.0), geom(48));
        assert_eq!(pick(20.0), geom(28));
        assert_eq!(pick(100.0), geom(16));
        assert_eq!(scene.draw_list(&camera_at(100.0)).len(), 1);
    }

    #[test]
    fn test_transparent_sorted_after_opaque_back_to_front() {
        let mut scene = Scene::new();
        let solid = opaque(&mut scene);
        let glass = scene.add_material(Material::Basic(BasicMaterial {
            transparent: true,
            opacity: 0.5,
            ..Default::default()
        }));
        let near = scene.add(
            scene.root(),
            Node::mesh("near", geom(1), glass).with_transform(Transform::from_position(Vec3::new(0.0, 0.0, 5.0))),
        );
        let far = scene.add(
            scene.root(),
            Node::mesh("far", geom(2), glass).with_transform(Transform::from_position(Vec3::new(0.0, 0.0, -5.0))),
        );
        let body = scene.add(scene.root(), Node::mesh("body", geom(3), solid));
        let order: Vec<NodeId> = scene.draw_list(&camera_at(10.0)).iter().map(|d| d.node).collect();
        assert_eq!(order, vec![body, far, near]);
    }

    #[test]
    fn test_zero_opacity_not_drawn() {
        let mut scene = Scene::new();
        let clouds = scene.add_material(Material::Standard(StandardMaterial {
            transparent: true,
            opacity: 0.0,
            ..Default::default()
        }));
        scene.add(scene.root(), Node::mesh("clouds", geom(1), clouds));
        assert!(scene.draw_list(&camera_at(10.0)).is_empty());
    }

    #[test]
    fn test_remove_subtree_reports_only_unshared_resources() {
        let mut scene = Scene::new();
        let tex_shared = TextureId::from_raw(1);
        let tex_own = TextureId::from_raw(2);
        let day = scene.add_material(Material::Standard(StandardMaterial {
            map: Some(tex_own),
            normal_map: Some(tex_shared),
            ..Default::default()
        }));
        let night = scene.add_material(Material::Standard(StandardMaterial {
            normal_map: Some(tex_shared),
            ..Default::default()
        }));
        let keep = scene.add(scene.root(), Node::mesh("keep", geom(7), night));
        let earth = scene.add(scene.root(), Node::mesh("earth", geom(7), day));
        let child = scene.add(earth, Node::mesh("child", geom(8), day));

        let released = scene.remove_subtree(earth);
        assert!(!scene.contains(child));
        assert!(scene.contains(keep));
        assert_eq!(released.geometries, vec![geom(8)], "geometry 7 is still used");
        assert_eq!(released.materials, vec![day]);
        assert_eq!(released.textures, vec![tex_own]);
    }

    #[test]
    fn test_dispose_all_empties_scene() {
        let mut scene = Scene::new();
        let mat = opaque(&mut scene);
        let detached = opaque(&mut scene);
        let g = scene.add(scene.root(), Node::group("g"));
        scene.add(g, Node::mesh("m", geom(1), mat));
        let mut backend = crate::headless::HeadlessBackend::default();
        scene.dispose_all(&mut backend);
        assert_eq!(scene.node_count(), 1);
        assert_eq!(scene.material_count(), 0);
        assert!(scene.material(detached).is_none());
    }

    #[test]
    fn test_find_and_effective_visibility() {
        let mut scene = Scene::new();
        let g = scene.add(scene.root(), Node::group("outer"));
        let inner = scene.add(g, Node::group("inner"));
        assert_eq!(scene.find("inner"), Some(inner));
        assert!(scene.is_effectively_visible(inner));
        scene.node_mut(g).unwrap().visible = false;
        assert!(!scene.is_effectively_visible(inner));
    }
}
