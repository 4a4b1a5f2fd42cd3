/// Depth-buffered triangle rasterizer shared by the terminal and canvas backends
use std::f32::consts::PI;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::projection::{Camera, ScreenPoint};
use crate::scene::{Background, Color, Helper, Light, Material, Scene};

/// Rasterizes a scene into linear colour. With `samples > 1` the internal
/// buffers are supersampled and [`Rasterizer::resolve`] box-filters them.
pub struct Rasterizer {
    width: usize,
    height: usize,
    samples: usize,
    depth_buffer: Vec<f32>,
    color_buffer: Vec<Color>,
}

struct ShadedVertex {
    screen: ScreenPoint,
    color: Color,
}

impl Rasterizer {
    pub fn new(width: usize, height: usize, samples: usize) -> Self {
        let mut rasterizer = Self {
            width: 0,
            height: 0,
            samples: samples.max(1),
            depth_buffer: Vec::new(),
            color_buffer: Vec::new(),
        };
        rasterizer.resize(width, height);
        rasterizer
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width.max(1);
        self.height = height.max(1);
        let size = self.buffer_width() * self.buffer_height();
        self.depth_buffer = vec![f32::INFINITY; size];
        self.color_buffer = vec![Color::BLACK; size];
    }

    fn buffer_width(&self) -> usize {
        self.width * self.samples
    }

    fn buffer_height(&self) -> usize {
        self.height * self.samples
    }

    /// Fill with the scene background and reset depth
    pub fn clear(&mut self, background: &Background, camera: &Camera) {
        self.depth_buffer.fill(f32::INFINITY);
        match background {
            Background::Color(color) => self.color_buffer.fill(*color),
            Background::Environment(map) => {
                let (bw, bh) = (self.buffer_width(), self.buffer_height());
                for y in 0..bh {
                    let ndc_y = 1.0 - 2.0 * (y as f32 + 0.5) / bh as f32;
                    for x in 0..bw {
                        let ndc_x = 2.0 * (x as f32 + 0.5) / bw as f32 - 1.0;
                        self.color_buffer[y * bw + x] = map.sample(&camera.ray_direction(ndc_x, ndc_y));
                    }
                }
            }
        }
    }

    pub fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.clear(&scene.background, camera);

        let view_projection = camera.view_projection();

        for helper in &scene.helpers {
            match helper {
                Helper::Axes { size } => self.render_axes(*size, camera, &view_projection),
            }
        }

        for model in &scene.models {
            let matrices = model.world_matrices();
            for (node, world) in model.nodes.iter().zip(matrices.iter()) {
                if node.primitives.is_empty() {
                    continue;
                }
                let normal_matrix = normal_matrix(world);
                for primitive in &node.primitives {
                    for triangle in &primitive.mesh.triangles {
                        let mut shaded = Vec::with_capacity(3);
                        for vertex in &triangle.vertices {
                            let position = world.transform_point(&vertex.position);
                            let Some(screen) = camera.project(
                                &view_projection,
                                &position,
                                self.buffer_width() as u32,
                                self.buffer_height() as u32,
                            ) else {
                                break;
                            };
                            let normal = normal_matrix * vertex.normal;
                            let color = shade(scene, camera, &primitive.material, &position, &normal);
                            shaded.push(ShadedVertex { screen, color });
                        }
                        // Triangle is clipped
                        if shaded.len() == 3 {
                            self.rasterize_triangle(&shaded);
                        }
                    }
                }
            }
        }
    }

    fn render_axes(&mut self, size: f32, camera: &Camera, view_projection: &Matrix4<f32>) {
        let origin = Point3::origin();
        let axes = [
            (Point3::new(size, 0.0, 0.0), Color::new(1.0, 0.0, 0.0)),
            (Point3::new(0.0, size, 0.0), Color::new(0.0, 1.0, 0.0)),
            (Point3::new(0.0, 0.0, size), Color::new(0.0, 0.0, 1.0)),
        ];
        let (bw, bh) = (self.buffer_width() as u32, self.buffer_height() as u32);
        for (end, color) in axes {
            let start = camera.project(view_projection, &origin, bw, bh);
            let end = camera.project(view_projection, &end, bw, bh);
            if let (Some(start), Some(end)) = (start, end) {
                self.draw_line(start, end, color);
            }
        }
    }

    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint, color: Color) {
        let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = a.x + (b.x - a.x) * t;
            let y = a.y + (b.y - a.y) * t;
            let depth = a.depth + (b.depth - a.depth) * t;
            self.plot(x.floor() as i64, y.floor() as i64, depth, color);
        }
    }

    fn plot(&mut self, x: i64, y: i64, depth: f32, color: Color) {
        let (bw, bh) = (self.buffer_width() as i64, self.buffer_height() as i64);
        if x < 0 || y < 0 || x >= bw || y >= bh {
            return;
        }
        let idx = (y * bw + x) as usize;
        if depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.color_buffer[idx] = color;
        }
    }

    fn rasterize_triangle(&mut self, vertices: &[ShadedVertex]) {
        let (v0, v1, v2) = (&vertices[0], &vertices[1], &vertices[2]);
        let (s0, s1, s2) = (v0.screen, v1.screen, v2.screen);

        // Bounding box
        let min_x = s0.x.min(s1.x).min(s2.x).floor() as i64;
        let max_x = s0.x.max(s1.x).max(s2.x).ceil() as i64;
        let min_y = s0.y.min(s1.y).min(s2.y).floor() as i64;
        let max_y = s0.y.max(s1.y).max(s2.y).ceil() as i64;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.buffer_width() as i64 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.buffer_height() as i64 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                if let Some((w0, w1, w2)) =
                    barycentric((s0.x, s0.y), (s1.x, s1.y), (s2.x, s2.y), (px, py))
                {
                    if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                        let depth = w0 * s0.depth + w1 * s1.depth + w2 * s2.depth;
                        let color = v0
                            .color
                            .scale(w0)
                            .add(&v1.color.scale(w1))
                            .add(&v2.color.scale(w2));
                        self.plot(x, y, depth, color);
                    }
                }
            }
        }
    }

    /// Final image at the output resolution
    pub fn resolve(&self) -> Vec<Color> {
        if self.samples == 1 {
            return self.color_buffer.clone();
        }
        let bw = self.buffer_width();
        let weight = 1.0 / (self.samples * self.samples) as f32;
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut sum = Color::BLACK;
                for sy in 0..self.samples {
                    for sx in 0..self.samples {
                        let idx = (y * self.samples + sy) * bw + x * self.samples + sx;
                        sum = sum.add(&self.color_buffer[idx]);
                    }
                }
                out.push(sum.scale(weight));
            }
        }
        out
    }

    /// Whether any sample was covered by geometry or a helper this frame
    pub fn has_coverage(&self) -> bool {
        self.depth_buffer.iter().any(|d| d.is_finite())
    }
}

fn normal_matrix(world: &Matrix4<f32>) -> Matrix3<f32> {
    let linear: Matrix3<f32> = world.fixed_view::<3, 3>(0, 0).into_owned();
    linear
        .try_inverse()
        .map(|inverse| inverse.transpose())
        .unwrap_or(linear)
}

/// Lambert diffuse plus Blinn-Phong highlight, lit from both sides
fn shade(
    scene: &Scene,
    camera: &Camera,
    material: &Material,
    position: &Point3<f32>,
    normal: &Vector3<f32>,
) -> Color {
    let view = (camera.position - position)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::z);
    let mut normal = normal.try_normalize(f32::EPSILON).unwrap_or(view);
    if normal.dot(&view) < 0.0 {
        normal = -normal;
    }

    let mut irradiance = Color::BLACK;
    let mut highlight = Color::BLACK;

    for light in &scene.lights {
        match light {
            Light::Hemisphere {
                sky,
                ground,
                intensity,
            } => {
                let weight = 0.5 * normal.y + 0.5;
                irradiance = irradiance.add(&ground.lerp(sky, weight).scale(*intensity));
            }
            Light::Directional {
                position: light_position,
                color,
                intensity,
            } => {
                let Some(direction) = light_position.try_normalize(f32::EPSILON) else {
                    continue;
                };
                let n_dot_l = normal.dot(&direction).max(0.0);
                if n_dot_l <= 0.0 {
                    continue;
                }
                irradiance = irradiance.add(&color.scale(intensity * n_dot_l));
                let half = (direction + view).normalize();
                let specular = normal.dot(&half).max(0.0).powf(material.shininess);
                highlight = highlight.add(&color.scale(intensity * specular * n_dot_l));
            }
        }
    }

    if let Some(environment) = &scene.environment {
        irradiance = irradiance.add(&environment.average().scale(PI));
    }

    material
        .color
        .mul(&irradiance)
        .scale(1.0 / PI)
        .add(&material.specular.mul(&highlight))
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
