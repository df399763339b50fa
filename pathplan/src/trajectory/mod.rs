// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::f64::consts::PI;

use log::{error, warn};

use crate::base::config::wrap_angle;
use crate::base::{Config, DofType};

/// Turns a pair of configurations into a finite sequence of intermediate
/// configurations at bounded resolution.
///
/// Both discretizations exclude the source and the target. `calc_traj_cont`
/// emits the points in path order; `calc_traj_bin` emits the same points in
/// binary-subdivision order (midpoint, quarters, eighths, ...) so a validity
/// checker can reject a blocked interval early.
pub trait TrajectoryDiscretizer<const D: usize>: Send + Sync {
    fn calc_traj_cont(&self, source: &Config<D>, target: &Config<D>) -> Vec<Config<D>>;

    fn calc_traj_bin(&self, source: &Config<D>, target: &Config<D>) -> Vec<Config<D>>;

    /// The same discretizer at different resolutions, used to densify final
    /// paths at caller-requested step sizes.
    fn with_resolution(&self, pos_res: f64, ori_res: f64) -> Box<dyn TrajectoryDiscretizer<D>>;
}

fn checked_resolution(resolution: f64, name: &str) -> f64 {
    if resolution <= 0.0 {
        warn!("{name} resolution has to be larger than 0, it has been set to 1");
        1.0
    } else {
        resolution
    }
}

/// Shortest-arc delta for angular components; ties at half a turn sweep in
/// the direction of the raw difference.
fn angular_delta(from: f64, to: f64) -> f64 {
    let delta = wrap_angle(to - from);
    if (delta + PI).abs() < 1e-12 && to > from {
        PI
    } else {
        delta
    }
}

fn split_distances<const D: usize>(
    source: &Config<D>,
    target: &Config<D>,
    ori_mask: &[bool; D],
) -> (f64, f64) {
    let mut pos_sq = 0.0;
    let mut ori_sq = 0.0;
    for i in 0..D {
        if ori_mask[i] {
            let delta = angular_delta(source[i], target[i]);
            ori_sq += delta * delta;
        } else {
            let delta = target[i] - source[i];
            pos_sq += delta * delta;
        }
    }
    (pos_sq.sqrt(), ori_sq.sqrt())
}

fn interpolate<const D: usize>(
    source: &Config<D>,
    target: &Config<D>,
    ori_mask: &[bool; D],
    t: f64,
) -> Config<D> {
    let mut config = Config::zeros();
    for i in 0..D {
        if ori_mask[i] {
            config[i] = wrap_angle(source[i] + angular_delta(source[i], target[i]) * t);
        } else {
            config[i] = source[i] + (target[i] - source[i]) * t;
        }
    }
    config
}

fn ori_mask_from<const D: usize>(dof_types: &[DofType; D]) -> [bool; D] {
    let mut mask = [false; D];
    for i in 0..D {
        mask[i] = dof_types[i].is_rotational();
    }
    mask
}

/// Straight-line discretization: linear in the linear components, shortest
/// arc in the angular ones.
pub struct LinearTrajectory<const D: usize> {
    pos_res: f64,
    ori_res: f64,
    ori_mask: [bool; D],
}

impl<const D: usize> LinearTrajectory<D> {
    pub fn new(pos_res: f64, ori_res: f64, dof_types: &[DofType; D]) -> Self {
        LinearTrajectory {
            pos_res: checked_resolution(pos_res, "position"),
            ori_res: checked_resolution(ori_res, "orientation"),
            ori_mask: ori_mask_from(dof_types),
        }
    }

    fn step_count(&self, source: &Config<D>, target: &Config<D>) -> usize {
        let (pos_dist, ori_dist) = split_distances(source, target, &self.ori_mask);
        let steps = (pos_dist / self.pos_res).max(ori_dist / self.ori_res).ceil();
        (steps as usize).max(1)
    }
}

impl<const D: usize> TrajectoryDiscretizer<D> for LinearTrajectory<D> {
    fn calc_traj_cont(&self, source: &Config<D>, target: &Config<D>) -> Vec<Config<D>> {
        let steps = self.step_count(source, target);
        (1..steps)
            .map(|i| interpolate(source, target, &self.ori_mask, i as f64 / steps as f64))
            .collect()
    }

    fn calc_traj_bin(&self, source: &Config<D>, target: &Config<D>) -> Vec<Config<D>> {
        let steps = self.step_count(source, target);
        let mut configs = Vec::with_capacity(steps.saturating_sub(1));
        // Level-order bisection of the segment index interval [0, steps]
        // emits every interior index exactly once.
        let mut queue = std::collections::VecDeque::from([(0usize, steps)]);
        while let Some((lo, hi)) = queue.pop_front() {
            let mid = (lo + hi) / 2;
            if mid > lo && mid < hi {
                configs.push(interpolate(
                    source,
                    target,
                    &self.ori_mask,
                    mid as f64 / steps as f64,
                ));
                queue.push_back((lo, mid));
                queue.push_back((mid, hi));
            }
        }
        configs
    }

    fn with_resolution(&self, pos_res: f64, ori_res: f64) -> Box<dyn TrajectoryDiscretizer<D>> {
        Box::new(LinearTrajectory {
            pos_res: checked_resolution(pos_res, "position"),
            ori_res: checked_resolution(ori_res, "orientation"),
            ori_mask: self.ori_mask,
        })
    }
}

/// Translate, rotate, translate: the translational profile keeps rotations
/// frozen at the source; the full rotational sweep is inserted at fraction
/// `s` of the translational segment with the position frozen at the join
/// configuration; trailing translation carries the target rotation.
pub struct RotateAtS<const D: usize> {
    pos_res: f64,
    ori_res: f64,
    ori_mask: [bool; D],
    rotation_point: f64,
}

impl<const D: usize> RotateAtS<D> {
    pub fn new(pos_res: f64, ori_res: f64, dof_types: &[DofType; D], rotation_point: f64) -> Self {
        RotateAtS {
            pos_res: checked_resolution(pos_res, "position"),
            ori_res: checked_resolution(ori_res, "orientation"),
            ori_mask: ori_mask_from(dof_types),
            rotation_point: Self::checked_rotation_point(rotation_point),
        }
    }

    fn checked_rotation_point(rotation_point: f64) -> f64 {
        if rotation_point > 0.0 && rotation_point < 1.0 {
            rotation_point
        } else {
            error!("rotation point has to be between 0 and 1, it has been set to 0.5");
            0.5
        }
    }

    pub fn rotation_point(&self) -> f64 {
        self.rotation_point
    }
}

impl<const D: usize> TrajectoryDiscretizer<D> for RotateAtS<D> {
    fn calc_traj_cont(&self, source: &Config<D>, target: &Config<D>) -> Vec<Config<D>> {
        let (pos_dist, ori_dist) = split_distances(source, target, &self.ori_mask);
        let no_rotation = [false; D];

        // Translational profile, rotations frozen at the source.
        let mut frozen_target = *target;
        for i in 0..D {
            if self.ori_mask[i] {
                frozen_target[i] = source[i];
            }
        }
        let pos_steps = ((pos_dist / self.pos_res).ceil() as usize).max(1);
        let translation: Vec<Config<D>> = (1..pos_steps)
            .map(|i| interpolate(source, &frozen_target, &no_rotation, i as f64 / pos_steps as f64))
            .collect();

        let join_index = ((translation.len() as f64 * self.rotation_point) as usize)
            .min(translation.len());
        let join = if join_index == 0 {
            *source
        } else {
            translation[join_index - 1]
        };

        let mut configs: Vec<Config<D>> = translation[..join_index].to_vec();

        // Rotational sweep at the frozen join position, ending on the target
        // rotation.
        let ori_steps = if ori_dist > 0.0 {
            ((ori_dist / self.ori_res).ceil() as usize).max(1)
        } else {
            0
        };
        for i in 1..=ori_steps {
            let t = i as f64 / ori_steps as f64;
            let mut config = join;
            for axis in 0..D {
                if self.ori_mask[axis] {
                    config[axis] =
                        wrap_angle(source[axis] + angular_delta(source[axis], target[axis]) * t);
                }
            }
            configs.push(config);
        }

        // Trailing translation with the target rotation.
        for config in &translation[join_index..] {
            let mut config = *config;
            for axis in 0..D {
                if self.ori_mask[axis] {
                    config[axis] = target[axis];
                }
            }
            configs.push(config);
        }

        if configs.last() == Some(target) {
            configs.pop();
        }
        configs
    }

    // TODO: emit the rotate-at-s profile in binary subdivision order instead
    // of delegating to the path-ordered variant.
    fn calc_traj_bin(&self, source: &Config<D>, target: &Config<D>) -> Vec<Config<D>> {
        self.calc_traj_cont(source, target)
    }

    fn with_resolution(&self, pos_res: f64, ori_res: f64) -> Box<dyn TrajectoryDiscretizer<D>> {
        Box::new(RotateAtS {
            pos_res: checked_resolution(pos_res, "position"),
            ori_res: checked_resolution(ori_res, "orientation"),
            ori_mask: self.ori_mask,
            rotation_point: self.rotation_point,
        })
    }
}
