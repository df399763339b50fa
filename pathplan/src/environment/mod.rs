// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

pub mod robot;

use std::sync::Arc;

use nalgebra::{Isometry3, Point3};

pub use robot::{DhParameter, MobileRobot, Pose, RobotDescriptor, RobotModel, SerialRobot};

/// Axis-aligned bounding box in workspace coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Builds a box from two corner points, sorting the coordinates.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Aabb {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn diagonal(&self) -> f64 {
        (self.max - self.min).norm()
    }
}

/// An obstacle in the workspace, described by its bounding box and pose.
///
/// Mesh geometry stays with the external collision backend; the core only
/// needs the box for broad-phase checks and serialization.
#[derive(Clone, Debug)]
pub struct Obstacle {
    pub name: String,
    pub aabb: Aabb,
    pub pose: Isometry3<f64>,
}

impl Obstacle {
    pub fn new(name: impl Into<String>, aabb: Aabb) -> Self {
        Obstacle {
            name: name.into(),
            aabb,
            pose: Isometry3::identity(),
        }
    }

    pub fn with_pose(mut self, pose: Isometry3<f64>) -> Self {
        self.pose = pose;
        self
    }
}

/// The world a planner runs in: workspace bounds, one robot and the obstacle
/// set.
pub struct Environment<const D: usize> {
    pub workspace: Aabb,
    pub robot: Arc<dyn RobotModel<D>>,
    pub obstacles: Vec<Obstacle>,
}

impl<const D: usize> Environment<D> {
    pub fn new(workspace: Aabb, robot: Arc<dyn RobotModel<D>>) -> Self {
        Environment {
            workspace,
            robot,
            obstacles: Vec::new(),
        }
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }

    pub fn obstacle_boxes(&self) -> Vec<Aabb> {
        self.obstacles.iter().map(|o| o.aabb).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_sorts_corners_and_contains() {
        let aabb = Aabb::new(Point3::new(1.0, 2.0, 3.0), Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(aabb.min, Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(aabb.max, Point3::new(1.0, 2.0, 3.0));
        assert!(aabb.contains(&Point3::new(0.0, 1.0, 1.5)));
        assert!(!aabb.contains(&Point3::new(2.0, 1.0, 1.5)));
    }
}
