// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use nalgebra::Vector6;

use crate::base::config::wrap_angle;
use crate::base::Config;
use crate::environment::{Pose, RobotModel, SerialRobot};

/// A task-space constraint a configuration can be projected onto.
///
/// The error vector is expressed in the workspace frame as
/// `(dx, dy, dz, drx, dry, drz)`; a configuration satisfies the constraint
/// iff its error is zero after clamping against the tolerance band.
pub trait Constraint<const D: usize>: Send + Sync {
    /// `true` iff `config` satisfies the constraint.
    fn check(&self, config: &Config<D>) -> bool;

    /// Task-space error of `config`, zero inside the tolerance band.
    fn euclidean_error(&self, config: &Config<D>) -> Vector6<f64>;

    /// `true` iff `config` respects the robot's joint boundaries.
    fn check_robot_bound(&self, config: &Config<D>) -> bool;
}

/// Constrains the tool frame of a serial robot to a target pose within a
/// `(lower, upper)` tolerance band per pose component.
pub struct PoseConstraint<const D: usize> {
    robot: Arc<SerialRobot<D>>,
    target: Pose,
    lower: Pose,
    upper: Pose,
}

impl<const D: usize> PoseConstraint<D> {
    pub fn new(robot: Arc<SerialRobot<D>>, target: Pose, lower: Pose, upper: Pose) -> Self {
        PoseConstraint {
            robot,
            target,
            lower,
            upper,
        }
    }

    /// A symmetric band of half-width `tolerance` around the target.
    pub fn with_tolerance(robot: Arc<SerialRobot<D>>, target: Pose, tolerance: f64) -> Self {
        Self::new(
            robot,
            target,
            Pose::from_element(-tolerance),
            Pose::from_element(tolerance),
        )
    }
}

impl<const D: usize> Constraint<D> for PoseConstraint<D> {
    fn check(&self, config: &Config<D>) -> bool {
        self.euclidean_error(config) == Vector6::zeros()
    }

    fn euclidean_error(&self, config: &Config<D>) -> Vector6<f64> {
        let pose = self.robot.tcp_pose(config);
        let mut error = Vector6::zeros();
        for i in 0..6 {
            let raw = if i < 3 {
                pose[i] - self.target[i]
            } else {
                wrap_angle(pose[i] - self.target[i])
            };
            // Only the part outside the band has to be corrected.
            if raw < self.lower[i] {
                error[i] = raw - self.lower[i];
            } else if raw > self.upper[i] {
                error[i] = raw - self.upper[i];
            }
        }
        error
    }

    fn check_robot_bound(&self, config: &Config<D>) -> bool {
        self.robot.within_boundaries(config)
    }
}
