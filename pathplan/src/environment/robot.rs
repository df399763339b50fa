// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use nalgebra::{
    DMatrix, Isometry3, Matrix4, Rotation3, Translation3, UnitQuaternion, Vector3, Vector6,
};
use serde::{Deserialize, Serialize};

use crate::base::error::EnvironmentError;
use crate::base::{Config, DofType};

/// A workspace pose as `(x, y, z, rx, ry, rz)` with XYZ Euler angles.
pub type Pose = Vector6<f64>;

/// Builds the homogeneous matrix of a pose vector.
pub fn pose_to_matrix(pose: &Pose) -> Matrix4<f64> {
    let translation = Translation3::new(pose[0], pose[1], pose[2]);
    let rotation = UnitQuaternion::from_euler_angles(pose[3], pose[4], pose[5]);
    Isometry3::from_parts(translation, rotation).to_homogeneous()
}

/// Decomposes a homogeneous matrix into a pose vector.
pub fn matrix_to_pose(matrix: &Matrix4<f64>) -> Pose {
    let rotation = Rotation3::from_matrix(&matrix.fixed_view::<3, 3>(0, 0).into_owned());
    let (roll, pitch, yaw) = rotation.euler_angles();
    Vector6::new(
        matrix[(0, 3)],
        matrix[(1, 3)],
        matrix[(2, 3)],
        roll,
        pitch,
        yaw,
    )
}

/// Serializable summary of a robot model, used by the environment document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotDescriptor {
    pub name: String,
    pub kind: String,
    pub dim: usize,
    pub minimum: Vec<f64>,
    pub maximum: Vec<f64>,
    pub dof_types: Vec<DofType>,
    /// `(alpha, a, d)` rows for serial robots.
    pub dh_parameters: Option<Vec<(f64, f64, f64)>>,
}

/// Kinematic description the planner core needs from a robot.
pub trait RobotModel<const D: usize>: Send + Sync {
    fn name(&self) -> &str;

    /// Lower and upper joint boundaries.
    fn boundaries(&self) -> (&Config<D>, &Config<D>);

    fn dof_types(&self) -> &[DofType; D];

    fn base_pose(&self) -> &Isometry3<f64>;

    /// Homogeneous transform of the robot (mobile) or its tool frame
    /// (serial) for a configuration.
    fn transform(&self, config: &Config<D>) -> Matrix4<f64>;

    /// Workspace pose of the robot/tool frame for a configuration.
    fn tcp_pose(&self, config: &Config<D>) -> Pose {
        matrix_to_pose(&self.transform(config))
    }

    fn within_boundaries(&self, config: &Config<D>) -> bool {
        let (min, max) = self.boundaries();
        config.inside(min, max)
    }

    fn descriptor(&self) -> RobotDescriptor;
}

fn validate_bounds<const D: usize>(
    min: &Config<D>,
    max: &Config<D>,
) -> Result<(), EnvironmentError> {
    for i in 0..D {
        if min[i] > max[i] {
            return Err(EnvironmentError::InvalidBound {
                index: i,
                lower: min[i],
                upper: max[i],
            });
        }
    }
    Ok(())
}

/// A rigid robot whose configuration maps directly to a workspace pose.
///
/// Positional components fill the translation in order, rotational components
/// the Euler angles; a 2-D point robot is the degenerate case with two planar
/// position components.
pub struct MobileRobot<const D: usize> {
    name: String,
    min: Config<D>,
    max: Config<D>,
    dof_types: [DofType; D],
    pose: Isometry3<f64>,
}

impl<const D: usize> MobileRobot<D> {
    pub fn new(
        name: impl Into<String>,
        min: Config<D>,
        max: Config<D>,
        dof_types: [DofType; D],
    ) -> Result<Self, EnvironmentError> {
        validate_bounds(&min, &max)?;
        Ok(MobileRobot {
            name: name.into(),
            min,
            max,
            dof_types,
            pose: Isometry3::identity(),
        })
    }

    pub fn with_pose(mut self, pose: Isometry3<f64>) -> Self {
        self.pose = pose;
        self
    }
}

impl MobileRobot<2> {
    /// A planar point robot.
    pub fn point(
        name: impl Into<String>,
        min: Config<2>,
        max: Config<2>,
    ) -> Result<Self, EnvironmentError> {
        MobileRobot::new(name, min, max, [DofType::PlanarPos, DofType::PlanarPos])
    }
}

impl<const D: usize> RobotModel<D> for MobileRobot<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn boundaries(&self) -> (&Config<D>, &Config<D>) {
        (&self.min, &self.max)
    }

    fn dof_types(&self) -> &[DofType; D] {
        &self.dof_types
    }

    fn base_pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    fn transform(&self, config: &Config<D>) -> Matrix4<f64> {
        let mut pose = Vector6::zeros();
        let mut positions = 0;
        let mut rotations = 0;
        for i in 0..D {
            let dof = self.dof_types[i];
            if dof == DofType::PlanarRot {
                // A planar rotation is a yaw about the workspace z axis.
                pose[5] = config[i];
            } else if dof.is_rotational() {
                if rotations < 3 {
                    pose[3 + rotations] = config[i];
                    rotations += 1;
                }
            } else if positions < 3 {
                pose[positions] = config[i];
                positions += 1;
            }
        }
        self.pose.to_homogeneous() * pose_to_matrix(&pose)
    }

    fn descriptor(&self) -> RobotDescriptor {
        RobotDescriptor {
            name: self.name.clone(),
            kind: "mobile".to_string(),
            dim: D,
            minimum: self.min.values.to_vec(),
            maximum: self.max.values.to_vec(),
            dof_types: self.dof_types.to_vec(),
            dh_parameters: None,
        }
    }
}

/// One row of a Denavit-Hartenberg table; the joint variable is the rotation
/// about the local z axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DhParameter {
    pub alpha: f64,
    pub a: f64,
    pub d: f64,
}

impl DhParameter {
    pub fn new(alpha: f64, a: f64, d: f64) -> Self {
        DhParameter { alpha, a, d }
    }
}

/// A serial kinematic chain of `D` revolute joints.
pub struct SerialRobot<const D: usize> {
    name: String,
    min: Config<D>,
    max: Config<D>,
    dof_types: [DofType; D],
    pose: Isometry3<f64>,
    dh: [DhParameter; D],
}

impl<const D: usize> SerialRobot<D> {
    pub fn new(
        name: impl Into<String>,
        min: Config<D>,
        max: Config<D>,
        dh: [DhParameter; D],
    ) -> Result<Self, EnvironmentError> {
        validate_bounds(&min, &max)?;
        Ok(SerialRobot {
            name: name.into(),
            min,
            max,
            dof_types: [DofType::Joint; D],
            pose: Isometry3::identity(),
            dh,
        })
    }

    pub fn with_pose(mut self, pose: Isometry3<f64>) -> Self {
        self.pose = pose;
        self
    }

    /// Local transform of one joint for angle `q`.
    fn dh_transform(param: &DhParameter, q: f64) -> Matrix4<f64> {
        let (sin_alpha, cos_alpha) = param.alpha.sin_cos();
        let (sin_q, cos_q) = q.sin_cos();

        let mut t = Matrix4::zeros();
        t[(0, 0)] = cos_q;
        t[(0, 1)] = -sin_q * cos_alpha;
        t[(0, 2)] = sin_q * sin_alpha;
        t[(0, 3)] = param.a * cos_q;
        t[(1, 0)] = sin_q;
        t[(1, 1)] = cos_q * cos_alpha;
        t[(1, 2)] = -cos_q * sin_alpha;
        t[(1, 3)] = param.a * sin_q;
        t[(2, 1)] = sin_alpha;
        t[(2, 2)] = cos_alpha;
        t[(2, 3)] = param.d;
        t[(3, 3)] = 1.0;
        t
    }

    /// Local per-joint transforms for a configuration.
    pub fn link_transforms(&self, config: &Config<D>) -> Vec<Matrix4<f64>> {
        (0..D)
            .map(|i| Self::dh_transform(&self.dh[i], config[i]))
            .collect()
    }

    /// Cumulative base-to-joint transforms, ending at the tool frame.
    pub fn joint_frames(&self, config: &Config<D>) -> Vec<Matrix4<f64>> {
        let mut frames = Vec::with_capacity(D + 1);
        let mut current = self.pose.to_homogeneous();
        frames.push(current);
        for transform in self.link_transforms(config) {
            current *= transform;
            frames.push(current);
        }
        frames
    }

    pub fn tcp_matrix(&self, config: &Config<D>) -> Matrix4<f64> {
        *self
            .joint_frames(config)
            .last()
            .expect("chain has at least the base frame")
    }

    /// Geometric Jacobian of the tool frame, rows `(vx, vy, vz, wx, wy, wz)`.
    pub fn jacobian(&self, config: &Config<D>) -> DMatrix<f64> {
        let frames = self.joint_frames(config);
        let tcp: Vector3<f64> = frames[D].fixed_view::<3, 1>(0, 3).into_owned();

        let mut jacobian = DMatrix::zeros(6, D);
        for i in 0..D {
            let z: Vector3<f64> = frames[i].fixed_view::<3, 1>(0, 2).into_owned();
            let p: Vector3<f64> = frames[i].fixed_view::<3, 1>(0, 3).into_owned();
            let linear = z.cross(&(tcp - p));
            for row in 0..3 {
                jacobian[(row, i)] = linear[row];
                jacobian[(row + 3, i)] = z[row];
            }
        }
        jacobian
    }

    pub fn dh_parameters(&self) -> &[DhParameter; D] {
        &self.dh
    }
}

impl<const D: usize> RobotModel<D> for SerialRobot<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn boundaries(&self) -> (&Config<D>, &Config<D>) {
        (&self.min, &self.max)
    }

    fn dof_types(&self) -> &[DofType; D] {
        &self.dof_types
    }

    fn base_pose(&self) -> &Isometry3<f64> {
        &self.pose
    }

    fn transform(&self, config: &Config<D>) -> Matrix4<f64> {
        self.tcp_matrix(config)
    }

    fn descriptor(&self) -> RobotDescriptor {
        RobotDescriptor {
            name: self.name.clone(),
            kind: "serial".to_string(),
            dim: D,
            minimum: self.min.values.to_vec(),
            maximum: self.max.values.to_vec(),
            dof_types: self.dof_types.to_vec(),
            dh_parameters: Some(self.dh.iter().map(|p| (p.alpha, p.a, p.d)).collect()),
        }
    }
}
