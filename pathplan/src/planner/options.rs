// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;
use std::time::Duration;

use log::{error, warn};

use crate::evaluator::Evaluator;
use crate::metric::DistanceMetric;
use crate::planner::path_modifier::PathModifier;
use crate::sampling::Sampling;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// Immutable bundle of plug-ins and numeric parameters a planner is
/// constructed with.
///
/// Out-of-range numeric values are clamped to safe defaults with a log
/// message instead of failing construction.
pub struct PlannerOptions<const D: usize> {
    pub(crate) metric: Arc<dyn DistanceMetric<D>>,
    pub(crate) validity: Arc<dyn ValidityChecker<D>>,
    pub(crate) trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    pub(crate) sampling: Box<dyn Sampling<D>>,
    pub(crate) evaluator: Box<dyn Evaluator<D>>,
    pub(crate) path_modifier: Option<Arc<dyn PathModifier<D>>>,
    pub(crate) step_size: f64,
    pub(crate) traj_pos_res: f64,
    pub(crate) traj_ori_res: f64,
    pub(crate) sort_count: usize,
    pub(crate) sampling_attempts: u32,
    pub(crate) sampler_seed: String,
    pub(crate) evaluator_timeout: Duration,
    pub(crate) rotation_point: f64,
    pub(crate) prm_radius: f64,
}

impl<const D: usize> PlannerOptions<D> {
    pub fn new(
        metric: Arc<dyn DistanceMetric<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
        sampling: Box<dyn Sampling<D>>,
        evaluator: Box<dyn Evaluator<D>>,
    ) -> Self {
        PlannerOptions {
            metric,
            validity,
            trajectory,
            sampling,
            evaluator,
            path_modifier: None,
            step_size: 1.0,
            traj_pos_res: 1.0,
            traj_ori_res: 0.1,
            sort_count: 3000,
            sampling_attempts: 10,
            sampler_seed: String::new(),
            evaluator_timeout: Duration::from_secs(30),
            rotation_point: 0.5,
            prm_radius: 2.0,
        }
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        if step_size <= 0.0 {
            warn!("step size has to be larger than 0, it has been set to 1");
            self.step_size = 1.0;
        } else {
            self.step_size = step_size;
        }
        self
    }

    pub fn with_traj_resolution(mut self, pos_res: f64, ori_res: f64) -> Self {
        if pos_res <= 0.0 || ori_res <= 0.0 {
            warn!("trajectory resolutions have to be larger than 0, they have been set to 1/0.1");
            self.traj_pos_res = 1.0;
            self.traj_ori_res = 0.1;
        } else {
            self.traj_pos_res = pos_res;
            self.traj_ori_res = ori_res;
        }
        self
    }

    pub fn with_sort_count(mut self, sort_count: usize) -> Self {
        self.sort_count = sort_count;
        self
    }

    pub fn with_sampling_attempts(mut self, attempts: u32) -> Self {
        self.sampling_attempts = attempts;
        self
    }

    pub fn with_sampler_seed(mut self, seed: impl Into<String>) -> Self {
        self.sampler_seed = seed.into();
        self
    }

    pub fn with_evaluator_timeout(mut self, timeout: Duration) -> Self {
        self.evaluator_timeout = timeout;
        self
    }

    pub fn with_rotation_point(mut self, rotation_point: f64) -> Self {
        if rotation_point > 0.0 && rotation_point < 1.0 {
            self.rotation_point = rotation_point;
        } else {
            error!("rotation point has to be between 0 and 1, it has been set to 0.5");
            self.rotation_point = 0.5;
        }
        self
    }

    pub fn with_prm_radius(mut self, radius: f64) -> Self {
        if radius <= 0.0 {
            warn!("roadmap radius has to be larger than 0, it has been set to 2");
            self.prm_radius = 2.0;
        } else {
            self.prm_radius = radius;
        }
        self
    }

    pub fn with_path_modifier(mut self, modifier: Arc<dyn PathModifier<D>>) -> Self {
        self.path_modifier = Some(modifier);
        self
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn traj_pos_res(&self) -> f64 {
        self.traj_pos_res
    }

    pub fn traj_ori_res(&self) -> f64 {
        self.traj_ori_res
    }

    pub fn sort_count(&self) -> usize {
        self.sort_count
    }

    pub fn sampling_attempts(&self) -> u32 {
        self.sampling_attempts
    }

    pub fn sampler_seed(&self) -> &str {
        &self.sampler_seed
    }

    pub fn evaluator_timeout(&self) -> Duration {
        self.evaluator_timeout
    }

    pub fn rotation_point(&self) -> f64 {
        self.rotation_point
    }

    pub fn prm_radius(&self) -> f64 {
        self.prm_radius
    }
}
