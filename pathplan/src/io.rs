// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

//! Serializable documents for the artifacts peripheral tooling persists:
//! found paths, environment descriptions and planner statistics.

use serde::{Deserialize, Serialize};

use crate::base::Config;
use crate::environment::{Environment, RobotDescriptor, RobotModel};
use crate::statistic::StatsCollector;

/// A found path as peripheral tools persist it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathDocument {
    #[serde(rename = "Dimension")]
    pub dimension: usize,
    #[serde(rename = "NumberConfigurations")]
    pub number_configurations: usize,
    pub data: Vec<Vec<f64>>,
}

/// Builds the path document, scaling every component by `scale`.
pub fn path_document<const D: usize>(path: &[Config<D>], scale: f64) -> PathDocument {
    PathDocument {
        dimension: D,
        number_configurations: path.len(),
        data: path
            .iter()
            .map(|config| config.values.iter().map(|v| v * scale).collect())
            .collect(),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObstacleDocument {
    pub name: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
    /// `(x, y, z, rx, ry, rz)`.
    pub pose: [f64; 6],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentDocument {
    pub workspace_min: [f64; 3],
    pub workspace_max: [f64; 3],
    pub robot: RobotDescriptor,
    pub obstacles: Vec<ObstacleDocument>,
}

pub fn environment_document<const D: usize>(environment: &Environment<D>) -> EnvironmentDocument {
    EnvironmentDocument {
        workspace_min: environment.workspace.min.coords.into(),
        workspace_max: environment.workspace.max.coords.into(),
        robot: environment.robot.descriptor(),
        obstacles: environment
            .obstacles
            .iter()
            .map(|obstacle| {
                let translation = obstacle.pose.translation.vector;
                let (roll, pitch, yaw) = obstacle.pose.rotation.euler_angles();
                ObstacleDocument {
                    name: obstacle.name.clone(),
                    min: obstacle.aabb.min.coords.into(),
                    max: obstacle.aabb.max.coords.into(),
                    pose: [
                        translation.x,
                        translation.y,
                        translation.z,
                        roll,
                        pitch,
                        yaw,
                    ],
                }
            })
            .collect(),
    }
}

/// Serializes a statistics collector under its name.
pub fn stats_document(collector: &dyn StatsCollector) -> serde_json::Value {
    serde_json::json!({ collector.name(): collector.serialize() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Aabb, MobileRobot};
    use nalgebra::Point3;
    use std::sync::Arc;

    #[test]
    fn test_path_document_layout() {
        let path = [Config::new([1.0, 2.0]), Config::new([3.0, 4.0])];
        let document = path_document(&path, 10.0);
        assert_eq!(document.dimension, 2);
        assert_eq!(document.number_configurations, 2);
        assert_eq!(document.data, vec![vec![10.0, 20.0], vec![30.0, 40.0]]);

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["Dimension"], 2);
        assert_eq!(json["NumberConfigurations"], 2);
        assert!(json["data"].is_array());
    }

    #[test]
    fn test_path_document_roundtrip() {
        let path = [Config::new([0.5, -1.5])];
        let document = path_document(&path, 1.0);
        let json = serde_json::to_string(&document).unwrap();
        let recovered: PathDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered, document);
    }

    #[test]
    fn test_environment_document() {
        let robot =
            MobileRobot::point("dot", Config::new([0.0, 0.0]), Config::new([1.0, 1.0])).unwrap();
        let environment = Environment::new(
            Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)),
            Arc::new(robot),
        );
        let document = environment_document(&environment);
        assert_eq!(document.robot.kind, "mobile");
        assert_eq!(document.robot.dim, 2);
        assert_eq!(document.workspace_max, [1.0, 1.0, 1.0]);
    }
}
