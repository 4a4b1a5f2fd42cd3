/// Local transforms for scene nodes
use nalgebra::{Matrix4, UnitQuaternion, Vector3};

/// Euler rotation (in radians) applied in intrinsic X, Y, Z order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerAngles {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl EulerAngles {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f32> {
        let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), self.x);
        let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.y);
        let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.z);

        rx * ry * rz
    }
}

impl Default for EulerAngles {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<[f32; 3]> for EulerAngles {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

/// Translation, rotation and scale of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_parts(position: [f32; 3], scale: [f32; 3], rotation: EulerAngles) -> Self {
        Self {
            translation: Vector3::from(position),
            rotation: rotation.to_quaternion(),
            scale: Vector3::from(scale),
        }
    }

    /// glTF stores rotations as `[x, y, z, w]`
    pub fn from_decomposed(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let [x, y, z, w] = rotation;
        Self {
            translation: Vector3::from(translation),
            rotation: UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z)),
            scale: Vector3::from(scale),
        }
    }

    /// Compose as translate * rotate * scale
    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
