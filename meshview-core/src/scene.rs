/// Scene graph: helpers, lights and the models attached by asset loads.
use std::rc::Rc;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::animation::AnimationClip;
use crate::environment::EnvironmentMap;
use crate::geometry::{BoundingBox, Mesh};
use crate::projection::{Camera, ProjectionMode};
use crate::transform::Transform;

/// Linear RGB colour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Colour from a `0xRRGGBB` literal; channels are taken as sRGB
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn scale(&self, factor: f32) -> Self {
        Self::new(self.r * factor, self.g * factor, self.b * factor)
    }

    pub fn mul(&self, other: &Color) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    pub fn add(&self, other: &Color) -> Self {
        Self::new(self.r + other.r, self.g + other.g, self.b + other.b)
    }

    pub fn lerp(&self, other: &Color, t: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Phong-style surface parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub color: Color,
    pub specular: Color,
    pub shininess: f32,
}

impl Default for Material {
    /// Neutral grey used for geometry-only formats
    fn default() -> Self {
        Self {
            color: Color::from_hex(0xaaaaaa),
            specular: Color::from_hex(0x111111),
            shininess: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Sky colour from above blending into ground colour from below
    Hemisphere {
        sky: Color,
        ground: Color,
        intensity: f32,
    },
    /// Parallel light shining from `position` towards the origin
    Directional {
        position: Vector3<f32>,
        color: Color,
        intensity: f32,
    },
}

#[derive(Debug, Clone)]
pub enum Background {
    Color(Color),
    Environment(Rc<EnvironmentMap>),
}

/// Non-model scene content
#[derive(Debug, Clone)]
pub enum Helper {
    /// Red, green and blue lines along +X, +Y and +Z
    Axes { size: f32 },
}

/// A mesh with its material
#[derive(Debug, Clone)]
pub struct Primitive {
    pub mesh: Mesh,
    pub material: Material,
}

/// One node of a loaded model
#[derive(Debug, Clone)]
pub struct ModelNode {
    pub name: Option<String>,
    pub local: Transform,
    pub primitives: Vec<Primitive>,
    pub children: Vec<usize>,
    pub camera: Option<usize>,
}

impl ModelNode {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            local: Transform::identity(),
            primitives: Vec::new(),
            children: Vec::new(),
            camera: None,
        }
    }
}

/// A loaded subtree. Nodes live in an arena addressed by index so animation
/// channels can target them directly.
#[derive(Debug, Clone)]
pub struct Model {
    /// Placement of the whole model inside the scene
    pub root: Transform,
    pub nodes: Vec<ModelNode>,
    pub roots: Vec<usize>,
}

impl Model {
    pub fn new() -> Self {
        Self {
            root: Transform::identity(),
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// A single-node model around one mesh
    pub fn from_mesh(mesh: Mesh, material: Material) -> Self {
        let mut node = ModelNode::new(None);
        node.primitives.push(Primitive { mesh, material });
        Self {
            root: Transform::identity(),
            nodes: vec![node],
            roots: vec![0],
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|node| node.primitives.iter())
            .map(|primitive| primitive.mesh.triangles.len())
            .sum()
    }

    /// World matrix of every node, indexed like `nodes`.
    /// Nodes unreachable from a root keep the identity.
    pub fn world_matrices(&self) -> Vec<Matrix4<f32>> {
        let mut matrices = vec![Matrix4::identity(); self.nodes.len()];
        let mut stack: Vec<(usize, Matrix4<f32>)> = self
            .roots
            .iter()
            .map(|&root| (root, self.root.matrix()))
            .collect();
        let mut visited = vec![false; self.nodes.len()];

        while let Some((index, parent)) = stack.pop() {
            if index >= self.nodes.len() || visited[index] {
                continue;
            }
            visited[index] = true;
            let world = parent * self.nodes[index].local.matrix();
            matrices[index] = world;
            for &child in &self.nodes[index].children {
                stack.push((child, world));
            }
        }

        matrices
    }

    /// World-space bounds of all geometry
    pub fn bounding_box(&self) -> BoundingBox {
        let matrices = self.world_matrices();
        self.nodes
            .iter()
            .zip(matrices.iter())
            .flat_map(|(node, matrix)| {
                node.primitives
                    .iter()
                    .map(move |primitive| primitive.mesh.bounding_box(matrix))
            })
            .fold(BoundingBox::empty(), |acc, bounds| acc.union(&bounds))
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

/// Camera definition carried inside an asset
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedCamera {
    pub name: Option<String>,
    pub mode: ProjectionMode,
    /// Vertical field of view in radians (perspective only)
    pub fov: f32,
    pub near: f32,
    pub far: Option<f32>,
}

/// Result of a successful load
#[derive(Debug, Clone)]
pub struct Asset {
    pub model: Model,
    pub cameras: Vec<EmbeddedCamera>,
    pub animations: Vec<AnimationClip>,
}

impl Asset {
    pub fn from_model(model: Model) -> Self {
        Self {
            model,
            cameras: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// The first node that references a camera, with its world matrix
    pub fn first_camera(&self) -> Option<(&EmbeddedCamera, Matrix4<f32>)> {
        let matrices = self.model.world_matrices();
        self.model
            .nodes
            .iter()
            .enumerate()
            .find_map(|(index, node)| {
                let camera = self.cameras.get(node.camera?)?;
                Some((camera, matrices[index]))
            })
    }
}

/// Camera placement derived from an embedded camera: looks down the node's
/// -Z axis, at the point on that ray closest to `focus`
pub fn embedded_camera_pose(
    embedded: &EmbeddedCamera,
    world: &Matrix4<f32>,
    focus: &Point3<f32>,
    camera: &mut Camera,
) {
    let position = world.transform_point(&Point3::origin());
    let forward = world
        .transform_vector(&-Vector3::z())
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -Vector3::z());
    let along = (focus - position).dot(&forward);
    let distance = if along > embedded.near {
        along
    } else {
        (focus - position).norm().max(1.0)
    };

    camera.position = position;
    camera.target = position + forward * distance;
    camera.mode = embedded.mode;
    if embedded.mode == ProjectionMode::Perspective {
        camera.fov = embedded.fov;
    }
    camera.near = embedded.near;
    if let Some(far) = embedded.far {
        camera.far = far;
    }
}

/// Everything a renderer draws
#[derive(Debug, Clone)]
pub struct Scene {
    pub background: Background,
    /// Image-based ambient term; set together with an environment background
    pub environment: Option<Rc<EnvironmentMap>>,
    pub lights: Vec<Light>,
    pub helpers: Vec<Helper>,
    pub models: Vec<Model>,
}

impl Scene {
    pub fn new(background: Color) -> Self {
        Self {
            background: Background::Color(background),
            environment: None,
            lights: Vec::new(),
            helpers: Vec::new(),
            models: Vec::new(),
        }
    }

    /// White background, a warm hemisphere fill and one key light
    pub fn with_default_lighting() -> Self {
        let mut scene = Self::new(Color::WHITE);
        scene.lights.push(Light::Hemisphere {
            sky: Color::from_hex(0x8d7c7c),
            ground: Color::from_hex(0x494966),
            intensity: 3.0,
        });
        scene.lights.push(Light::Directional {
            position: Vector3::new(1.0, 1.0, 1.0),
            color: Color::WHITE,
            intensity: 3.5,
        });
        scene
    }

    pub fn add_axes(&mut self, size: f32) {
        self.helpers.push(Helper::Axes { size });
    }

    pub fn set_environment(&mut self, map: EnvironmentMap) {
        let map = Rc::new(map);
        self.background = Background::Environment(Rc::clone(&map));
        self.environment = Some(map);
    }

    /// Attach a model and return its index
    pub fn add_model(&mut self, model: Model) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    /// Lights, helpers and every node of every model
    pub fn node_count(&self) -> usize {
        self.lights.len()
            + self.helpers.len()
            + self.models.iter().map(Model::node_count).sum::<usize>()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.models
            .iter()
            .fold(BoundingBox::empty(), |acc, model| acc.union(&model.bounding_box()))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::with_default_lighting()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::EulerAngles;

    fn two_level_model() -> Model {
        let mut model = Model::from_mesh(Mesh::cube(2.0), Material::default());
        let mut child = ModelNode::new(Some("child".to_string()));
        child.local.translation = Vector3::new(10.0, 0.0, 0.0);
        child.primitives.push(Primitive {
            mesh: Mesh::cube(2.0),
            material: Material::default(),
        });
        model.nodes.push(child);
        model.nodes[0].children.push(1);
        model
    }

    #[test]
    fn test_default_scene_node_count() {
        let mut scene = Scene::with_default_lighting();
        assert_eq!(scene.node_count(), 2);
        scene.add_axes(5.0);
        assert_eq!(scene.node_count(), 3);
        scene.add_model(two_level_model());
        assert_eq!(scene.node_count(), 5);
    }

    #[test]
    fn test_children_inherit_parent_transform() {
        let mut model = two_level_model();
        model.root = Transform::from_parts([0.0, 1.0, 0.0], [0.5, 0.5, 0.5], EulerAngles::zero());
        let bounds = model.bounding_box();
        // parent cube [-0.5, 0.5] shifted up, child cube centred at x = 5
        assert!((bounds.min.x + 0.5).abs() < 1e-5);
        assert!((bounds.max.x - 5.5).abs() < 1e-5);
        assert!((bounds.center().y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cyclic_children_terminate() {
        let mut model = two_level_model();
        model.nodes[1].children.push(0);
        assert_eq!(model.world_matrices().len(), 2);
    }

    #[test]
    fn test_hex_colors_are_linearized() {
        let white = Color::from_hex(0xffffff);
        assert!((white.r - 1.0).abs() < 1e-6);
        let grey = Color::from_hex(0x808080);
        assert!(grey.r > 0.2 && grey.r < 0.23);
    }

    #[test]
    fn test_embedded_pose_looks_along_node_axis() {
        let embedded = EmbeddedCamera {
            name: None,
            mode: ProjectionMode::Perspective,
            fov: 0.5,
            near: 0.01,
            far: Some(50.0),
        };
        let world = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 4.0));
        let mut camera = Camera::default();
        embedded_camera_pose(&embedded, &world, &Point3::new(0.3, 0.0, 0.0), &mut camera);
        assert_eq!(camera.position, Point3::new(0.0, 0.0, 4.0));
        assert!((camera.target - Point3::new(0.0, 0.0, 0.0)).norm() < 1e-5);
        assert_eq!(camera.fov, 0.5);
        assert_eq!(camera.far, 50.0);
    }
}
