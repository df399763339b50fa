// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use nalgebra::Point3;

use crate::base::Config;
use crate::environment::{Aabb, Environment, RobotModel};

/// Predicate over configurations: inside the joint box and free of collision
/// or constraint violation.
///
/// Checks are expected to be expensive, so callers keep invocation counts
/// low; `check_trajectory` exists so discretized motions can be rejected in
/// one call.
pub trait ValidityChecker<const D: usize>: Send + Sync {
    fn check(&self, config: &Config<D>) -> bool;

    /// `true` iff every element of the discretized trajectory is valid.
    fn check_trajectory(&self, configs: &[Config<D>]) -> bool {
        configs.iter().all(|config| self.check(config))
    }
}

/// Selects which computations a collision backend runs for one query.
#[derive(Clone, Copy, Debug)]
pub struct CollisionRequest {
    pub check_inter_robot: bool,
    pub check_obstacle: bool,
    pub compute_distance: bool,
    pub compute_penetration_depth: bool,
}

impl Default for CollisionRequest {
    fn default() -> Self {
        CollisionRequest {
            check_inter_robot: true,
            check_obstacle: true,
            compute_distance: false,
            compute_penetration_depth: false,
        }
    }
}

/// Answer of a collision backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct CollisionResult {
    pub in_collision: bool,
    pub distance: Option<f64>,
    pub penetration_depth: Option<f64>,
}

/// Boundary to external proximity engines (2-D grids, triangle tests,
/// FCL/PQP-style mesh queries). The core never looks behind this trait.
pub trait CollisionBackend<const D: usize>: Send + Sync {
    fn check(&self, config: &Config<D>, request: &CollisionRequest) -> CollisionResult;
}

/// Adapts a [`CollisionBackend`] plus joint bounds into a
/// [`ValidityChecker`].
pub struct BackendChecker<const D: usize> {
    backend: Arc<dyn CollisionBackend<D>>,
    request: CollisionRequest,
    min: Config<D>,
    max: Config<D>,
}

impl<const D: usize> BackendChecker<D> {
    pub fn new(environment: &Environment<D>, backend: Arc<dyn CollisionBackend<D>>) -> Self {
        let (min, max) = environment.robot.boundaries();
        BackendChecker {
            backend,
            request: CollisionRequest::default(),
            min: *min,
            max: *max,
        }
    }

    pub fn with_request(mut self, request: CollisionRequest) -> Self {
        self.request = request;
        self
    }
}

impl<const D: usize> ValidityChecker<D> for BackendChecker<D> {
    fn check(&self, config: &Config<D>) -> bool {
        config.inside(&self.min, &self.max)
            && !self.backend.check(config, &self.request).in_collision
    }
}

/// Joint-box check only; every in-bounds configuration is free. The checker
/// for obstacle-less worlds.
pub struct BoundsChecker<const D: usize> {
    min: Config<D>,
    max: Config<D>,
}

impl<const D: usize> BoundsChecker<D> {
    pub fn new(environment: &Environment<D>) -> Self {
        let (min, max) = environment.robot.boundaries();
        BoundsChecker {
            min: *min,
            max: *max,
        }
    }

    pub fn from_bounds(min: Config<D>, max: Config<D>) -> Self {
        BoundsChecker { min, max }
    }
}

impl<const D: usize> ValidityChecker<D> for BoundsChecker<D> {
    fn check(&self, config: &Config<D>) -> bool {
        config.inside(&self.min, &self.max)
    }
}

/// Point robot against the obstacle boxes of the environment. The first two
/// or three components are read as the workspace position.
pub struct AabbChecker<const D: usize> {
    obstacles: Vec<Aabb>,
    min: Config<D>,
    max: Config<D>,
}

impl<const D: usize> AabbChecker<D> {
    pub fn new(environment: &Environment<D>) -> Self {
        let (min, max) = environment.robot.boundaries();
        AabbChecker {
            obstacles: environment.obstacle_boxes(),
            min: *min,
            max: *max,
        }
    }
}

impl<const D: usize> ValidityChecker<D> for AabbChecker<D> {
    fn check(&self, config: &Config<D>) -> bool {
        if !config.inside(&self.min, &self.max) {
            return false;
        }
        let point = Point3::new(
            config[0],
            if D > 1 { config[1] } else { 0.0 },
            if D > 2 { config[2] } else { 0.0 },
        );
        !self.obstacles.iter().any(|aabb| aabb.contains(&point))
    }
}

/// Boolean occupancy grid over the workspace x/y plane for 2-D robots.
pub struct Grid2dChecker {
    occupied: Vec<bool>,
    columns: usize,
    rows: usize,
    origin: (f64, f64),
    cell_size: f64,
    min: Config<2>,
    max: Config<2>,
}

impl Grid2dChecker {
    /// `occupied` is row-major with `columns * rows` cells laid over the
    /// workspace starting at `origin`.
    pub fn new(
        environment: &Environment<2>,
        occupied: Vec<bool>,
        columns: usize,
        rows: usize,
        cell_size: f64,
    ) -> Self {
        assert_eq!(occupied.len(), columns * rows, "grid size mismatch");
        let (min, max) = environment.robot.boundaries();
        Grid2dChecker {
            occupied,
            columns,
            rows,
            origin: (environment.workspace.min.x, environment.workspace.min.y),
            cell_size,
            min: *min,
            max: *max,
        }
    }
}

impl ValidityChecker<2> for Grid2dChecker {
    fn check(&self, config: &Config<2>) -> bool {
        if !config.inside(&self.min, &self.max) {
            return false;
        }
        let column = ((config[0] - self.origin.0) / self.cell_size).floor();
        let row = ((config[1] - self.origin.1) / self.cell_size).floor();
        if column < 0.0 || row < 0.0 {
            return false;
        }
        let (column, row) = (column as usize, row as usize);
        if column >= self.columns || row >= self.rows {
            return false;
        }
        !self.occupied[row * self.columns + column]
    }
}
