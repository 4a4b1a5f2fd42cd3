/// Orbit controls: pointer input rotates the camera around a target point.
///
/// The camera offset from the target is kept in spherical coordinates with
/// `+Y` up. `theta` is the azimuth measured from `+Z` towards `+X`, `phi` is
/// the polar angle measured from `+Y`. Input accumulates a pending delta that
/// [`OrbitControls::update`] applies once per frame, either fully or (with
/// damping) a fraction per frame so motion eases out.
use std::f32::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{Point3, Vector3};

use crate::config::{AxisLock, ControlsConfig};
use crate::projection::Camera;

const EPS: f32 = 1e-6;

/// Camera offset from the orbit target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: &Vector3<f32>) -> Self {
        let radius = offset.norm();
        if radius < EPS {
            return Self {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
            theta: offset.x.atan2(offset.z),
        }
    }

    pub fn to_offset(&self) -> Vector3<f32> {
        let sin_phi = self.phi.sin();
        Vector3::new(
            self.radius * sin_phi * self.theta.sin(),
            self.radius * self.phi.cos(),
            self.radius * sin_phi * self.theta.cos(),
        )
    }

    /// Keep phi away from the poles where the view direction degenerates
    pub fn make_safe(&mut self) {
        self.phi = self.phi.clamp(EPS, PI - EPS);
    }
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_azimuth_angle: f32,
    pub max_azimuth_angle: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

impl OrbitControls {
    pub fn new() -> Self {
        Self {
            target: Point3::origin(),
            enable_damping: false,
            damping_factor: 0.05,
            auto_rotate: false,
            auto_rotate_speed: 2.0,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            min_azimuth_angle: f32::NEG_INFINITY,
            max_azimuth_angle: f32::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }

    pub fn from_config(config: &ControlsConfig) -> Self {
        let mut controls = Self::new();
        controls.enable_damping = config.damping;
        controls.damping_factor = config.damping_factor.clamp(0.0, 1.0);
        controls.auto_rotate = config.auto_rotate;
        controls.auto_rotate_speed = config.auto_rotate_speed;
        if let Some(lock) = config.axis_lock {
            controls.lock_axis(lock);
        }
        controls
    }

    /// Pin one angle so input only moves the camera along the other axis
    pub fn lock_axis(&mut self, lock: AxisLock) {
        match lock {
            AxisLock::Horizontal => {
                self.min_polar_angle = FRAC_PI_2;
                self.max_polar_angle = FRAC_PI_2;
            }
            AxisLock::Vertical => {
                self.min_azimuth_angle = 0.0;
                self.max_azimuth_angle = 0.0;
            }
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Pointer drag in pixels; a drag across the full surface height is one turn
    pub fn drag(&mut self, dx: f32, dy: f32, surface_height: f32) {
        let height = surface_height.max(1.0);
        self.rotate_left(TAU * dx / height * self.rotate_speed);
        self.rotate_up(TAU * dy / height * self.rotate_speed);
    }

    /// Wheel input; positive deltas move away from the target
    pub fn zoom(&mut self, wheel_delta: f32) {
        if wheel_delta == 0.0 {
            return;
        }
        let step = 0.95f32.powf(self.zoom_speed);
        if wheel_delta > 0.0 {
            self.scale /= step;
        } else {
            self.scale *= step;
        }
    }

    fn auto_rotation_angle(&self, elapsed: f32) -> f32 {
        TAU / 60.0 * self.auto_rotate_speed * elapsed
    }

    fn clamp_azimuth(&self, theta: f32) -> f32 {
        let (mut min, mut max) = (self.min_azimuth_angle, self.max_azimuth_angle);
        if !(min.is_finite() && max.is_finite()) {
            return theta;
        }
        if min < -PI {
            min += TAU;
        } else if min > PI {
            min -= TAU;
        }
        if max < -PI {
            max += TAU;
        } else if max > PI {
            max -= TAU;
        }
        if min <= max {
            theta.clamp(min, max)
        } else if theta > (min + max) / 2.0 {
            theta.max(min)
        } else {
            theta.min(max)
        }
    }

    /// Current camera angles around the target
    pub fn spherical(&self, camera: &Camera) -> Spherical {
        Spherical::from_offset(&(camera.position - self.target))
    }

    /// Apply pending input and auto-rotation, then place the camera.
    /// `elapsed` is in seconds. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera, elapsed: f32) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(&offset);

        if self.auto_rotate {
            self.rotate_left(self.auto_rotation_angle(elapsed));
        }

        if self.enable_damping {
            spherical.theta += self.delta_theta * self.damping_factor;
            spherical.phi += self.delta_phi * self.damping_factor;
        } else {
            spherical.theta += self.delta_theta;
            spherical.phi += self.delta_phi;
        }

        spherical.theta = self.clamp_azimuth(spherical.theta);
        spherical.phi = spherical.phi.clamp(self.min_polar_angle, self.max_polar_angle);
        spherical.make_safe();

        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        let new_position = self.target + spherical.to_offset();
        let moved = (new_position - camera.position).norm_squared() > EPS * EPS;
        camera.position = new_position;
        camera.target = self.target;

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;

        moved
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new()
    }
}
