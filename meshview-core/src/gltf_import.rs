/// glTF 2.0 import: scene nodes, triangle meshes, base colours, cameras and
/// TRS animations.
use std::collections::HashMap;
use std::path::Path;

use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation as GltfInterpolation, Property};
use gltf::buffer::Source;
use gltf::camera::Projection;
use gltf::mesh::Mode;
use gltf::{Document, Gltf};
use nalgebra::Vector3;

use crate::animation::{rotation_from_xyzw, AnimationClip, Channel, Interpolation, Keyframes};
use crate::error::LoadError;
use crate::geometry::Mesh;
use crate::projection::ProjectionMode;
use crate::scene::{Asset, Color, EmbeddedCamera, Material, Model, ModelNode, Primitive};
use crate::transform::Transform;

/// Import a `.gltf` or `.glb` file, resolving external buffers next to it
pub fn import_file(path: &Path) -> Result<Asset, LoadError> {
    let (document, buffers, _images) = gltf::import(path)?;
    let slices: Vec<&[u8]> = buffers.iter().map(|data| data.0.as_slice()).collect();
    convert(&document, &slices)
}

/// Import a self-contained document: `.glb` or `.gltf` with data URIs
pub fn import_slice(bytes: &[u8]) -> Result<Asset, LoadError> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;
    let slices: Vec<&[u8]> = buffers.iter().map(|data| data.0.as_slice()).collect();
    convert(&document, &slices)
}

/// A parsed document whose URI buffers still have to be fetched
pub struct PendingGltf {
    gltf: Gltf,
}

impl PendingGltf {
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        Ok(Self {
            gltf: Gltf::from_slice(bytes)?,
        })
    }

    /// URIs of all buffers that are not stored in the GLB binary chunk, in
    /// buffer order
    pub fn buffer_uris(&self) -> Vec<String> {
        self.gltf
            .buffers()
            .filter_map(|buffer| match buffer.source() {
                Source::Uri(uri) => Some(uri.to_string()),
                Source::Bin => None,
            })
            .collect()
    }

    /// Finish the import with the contents of [`Self::buffer_uris`], in order
    pub fn finish(self, fetched: Vec<Vec<u8>>) -> Result<Asset, LoadError> {
        let mut fetched = fetched.into_iter();
        let mut buffers: Vec<Vec<u8>> = Vec::new();
        for buffer in self.gltf.buffers() {
            let data = match buffer.source() {
                Source::Bin => self
                    .gltf
                    .blob
                    .clone()
                    .ok_or(LoadError::MissingBuffer(buffer.index()))?,
                Source::Uri(_) => fetched
                    .next()
                    .ok_or(LoadError::MissingBuffer(buffer.index()))?,
            };
            if data.len() < buffer.length() {
                return Err(LoadError::MissingBuffer(buffer.index()));
            }
            buffers.push(data);
        }
        let slices: Vec<&[u8]> = buffers.iter().map(Vec::as_slice).collect();
        convert(&self.gltf.document, &slices)
    }
}

/// Build an [`Asset`] from the default scene. Nodes unreachable from that
/// scene are dropped and the rest are renumbered in depth-first order.
pub fn convert(document: &Document, buffers: &[&[u8]]) -> Result<Asset, LoadError> {
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or(LoadError::Empty)?;

    let mut model = Model::new();
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut stack: Vec<(gltf::Node, Option<usize>)> = scene.nodes().map(|n| (n, None)).collect();
    stack.reverse();

    while let Some((node, parent)) = stack.pop() {
        if remap.contains_key(&node.index()) {
            continue;
        }
        let index = model.nodes.len();
        remap.insert(node.index(), index);

        let mut converted = ModelNode::new(node.name().map(str::to_string));
        let (translation, rotation, scale) = node.transform().decomposed();
        converted.local = Transform::from_decomposed(translation, rotation, scale);
        converted.camera = node.camera().map(|camera| camera.index());
        if let Some(mesh) = node.mesh() {
            converted.primitives = convert_mesh(&mesh, buffers)?;
        }
        model.nodes.push(converted);

        match parent {
            Some(parent) => model.nodes[parent].children.push(index),
            None => model.roots.push(index),
        }
        for child in node.children().collect::<Vec<_>>().into_iter().rev() {
            stack.push((child, Some(index)));
        }
    }

    if model.triangle_count() == 0 {
        return Err(LoadError::Empty);
    }

    let cameras = document.cameras().map(|camera| convert_camera(&camera)).collect();
    let animations = document
        .animations()
        .map(|animation| convert_animation(&animation, buffers, &remap))
        .filter(|clip| !clip.channels.is_empty())
        .collect();

    Ok(Asset {
        model,
        cameras,
        animations,
    })
}

fn convert_mesh(mesh: &gltf::Mesh, buffers: &[&[u8]]) -> Result<Vec<Primitive>, LoadError> {
    let mut primitives = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            log::debug!("skipping {:?} primitive in mesh {}", primitive.mode(), mesh.index());
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).copied());

        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        primitives.push(Primitive {
            mesh: Mesh::from_indexed(&positions, normals.as_deref(), &indices),
            material: convert_material(&primitive.material()),
        });
    }
    Ok(primitives)
}

fn convert_material(material: &gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, _] = pbr.base_color_factor();
    let roughness = pbr.roughness_factor().clamp(0.0, 1.0);
    Material {
        color: Color::new(r, g, b),
        specular: Material::default().specular,
        shininess: ((1.0 - roughness) * 60.0).max(1.0),
    }
}

fn convert_camera(camera: &gltf::Camera) -> EmbeddedCamera {
    let name = camera.name().map(str::to_string);
    match camera.projection() {
        Projection::Perspective(perspective) => EmbeddedCamera {
            name,
            mode: ProjectionMode::Perspective,
            fov: perspective.yfov(),
            near: perspective.znear(),
            far: perspective.zfar(),
        },
        Projection::Orthographic(orthographic) => EmbeddedCamera {
            name,
            mode: ProjectionMode::Orthographic,
            fov: std::f32::consts::FRAC_PI_4,
            near: orthographic.znear(),
            far: Some(orthographic.zfar()),
        },
    }
}

fn convert_animation(
    animation: &gltf::Animation,
    buffers: &[&[u8]],
    remap: &HashMap<usize, usize>,
) -> AnimationClip {
    let mut channels = Vec::new();

    for channel in animation.channels() {
        let Some(&node) = remap.get(&channel.target().node().index()) else {
            continue;
        };
        let reader = channel.reader(|buffer| buffers.get(buffer.index()).copied());
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let (interpolation, cubic) = match channel.sampler().interpolation() {
            GltfInterpolation::Step => (Interpolation::Step, false),
            GltfInterpolation::Linear => (Interpolation::Linear, false),
            // tangents are dropped, the spline is sampled linearly
            GltfInterpolation::CubicSpline => (Interpolation::Linear, true),
        };

        let keyframes = match (channel.target().property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => Keyframes::Translation(
                spline_values(values.map(Vector3::from).collect(), cubic),
            ),
            (Property::Scale, ReadOutputs::Scales(values)) => {
                Keyframes::Scale(spline_values(values.map(Vector3::from).collect(), cubic))
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => Keyframes::Rotation(
                spline_values(values.into_f32().map(rotation_from_xyzw).collect(), cubic),
            ),
            (property, _) => {
                log::debug!("skipping unsupported animation channel {:?}", property);
                continue;
            }
        };

        channels.push(Channel {
            node,
            times,
            keyframes,
            interpolation,
        });
    }

    AnimationClip {
        name: animation.name().map(str::to_string),
        channels,
    }
}

/// Cubic-spline outputs are stored as (in-tangent, value, out-tangent)
fn spline_values<T: Clone>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if !cubic {
        return values;
    }
    values.chunks_exact(3).map(|triple| triple[1].clone()).collect()
}
