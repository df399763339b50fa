// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

pub mod constraint;

use std::sync::Arc;

use nalgebra::DVector;

use crate::base::{Config, Graph};
use crate::environment::SerialRobot;
use crate::metric::DistanceMetric;
use crate::sampler::Sampler;
use crate::validity::ValidityChecker;

pub use constraint::{Constraint, PoseConstraint};

/// Higher-level sampling policy wrapping a [`Sampler`].
///
/// `sample` returns `None` when the policy could not produce a usable
/// configuration within its attempt budget; the expansion loop counts such
/// draws against the batch without creating a node.
pub trait Sampling<const D: usize>: Send {
    fn sample(&mut self) -> Option<Config<D>>;

    /// Forwards a new distribution origin to the wrapped sampler.
    fn set_origin(&mut self, _origin: &Config<D>) {}

    /// An identically configured strategy on a derived sampler stream, one
    /// per expansion worker.
    fn fork(&self, stream: u64) -> Box<dyn Sampling<D>>;
}

/// Returns the wrapped sampler's draw unchanged.
pub struct StraightSampling<const D: usize> {
    sampler: Box<dyn Sampler<D>>,
}

impl<const D: usize> StraightSampling<D> {
    pub fn new(sampler: Box<dyn Sampler<D>>) -> Self {
        StraightSampling { sampler }
    }
}

impl<const D: usize> Sampling<D> for StraightSampling<D> {
    fn sample(&mut self) -> Option<Config<D>> {
        Some(self.sampler.sample())
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.sampler.set_origin(origin);
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampling<D>> {
        Box::new(StraightSampling {
            sampler: self.sampler.fork(stream),
        })
    }
}

/// Pushes invalid draws toward the obstacle boundary: an invalid sample is
/// paired with a valid one and the segment between them is bisected for the
/// deepest valid configuration.
pub struct NearObstacleSampling<const D: usize> {
    sampler: Box<dyn Sampler<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    attempts: u32,
}

impl<const D: usize> NearObstacleSampling<D> {
    pub fn new(
        sampler: Box<dyn Sampler<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        attempts: u32,
    ) -> Self {
        NearObstacleSampling {
            sampler,
            validity,
            attempts,
        }
    }
}

impl<const D: usize> Sampling<D> for NearObstacleSampling<D> {
    fn sample(&mut self) -> Option<Config<D>> {
        let blocked = self.sampler.sample();
        if self.validity.check(&blocked) {
            return Some(blocked);
        }

        let mut valid = None;
        for _ in 0..self.attempts {
            let candidate = self.sampler.sample();
            if self.validity.check(&candidate) {
                valid = Some(candidate);
                break;
            }
        }

        let mut low = blocked;
        let mut high = valid?;
        for _ in 0..self.attempts {
            let mid = (low + high) / 2.0;
            if self.validity.check(&mid) {
                high = mid;
            } else {
                low = mid;
            }
        }
        Some(high)
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.sampler.set_origin(origin);
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampling<D>> {
        Box::new(NearObstacleSampling {
            sampler: self.sampler.fork(stream),
            validity: self.validity.clone(),
            attempts: self.attempts,
        })
    }
}

/// Returns the midpoint of two nearby invalid samples when it is valid,
/// i.e. a configuration bridging two obstacles.
pub struct BridgeSampling<const D: usize> {
    sampler: Box<dyn Sampler<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    distance: f64,
    attempts: u32,
}

impl<const D: usize> BridgeSampling<D> {
    pub fn new(
        sampler: Box<dyn Sampler<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        distance: f64,
        attempts: u32,
    ) -> Self {
        BridgeSampling {
            sampler,
            validity,
            distance,
            attempts,
        }
    }
}

impl<const D: usize> Sampling<D> for BridgeSampling<D> {
    fn sample(&mut self) -> Option<Config<D>> {
        for _ in 0..self.attempts {
            let first = self.sampler.sample();
            if self.validity.check(&first) {
                continue;
            }
            let displacement = self.sampler.random_ray() * (self.distance * self.sampler.random());
            let second = first + displacement;
            if self.validity.check(&second) {
                continue;
            }
            let midpoint = (first + second) / 2.0;
            if self.validity.check(&midpoint) {
                return Some(midpoint);
            }
        }
        None
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.sampler.set_origin(origin);
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampling<D>> {
        Box::new(BridgeSampling {
            sampler: self.sampler.fork(stream),
            validity: self.validity.clone(),
            distance: self.distance,
            attempts: self.attempts,
        })
    }
}

/// Gaussian pair test: a sample and its normally-scaled perturbation; the
/// valid one of an invalid/valid pair is returned, concentrating samples
/// near obstacle boundaries.
pub struct GaussianSampling<const D: usize> {
    sampler: Box<dyn Sampler<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    distance: f64,
    attempts: u32,
}

impl<const D: usize> GaussianSampling<D> {
    pub fn new(
        sampler: Box<dyn Sampler<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        distance: f64,
        attempts: u32,
    ) -> Self {
        GaussianSampling {
            sampler,
            validity,
            distance,
            attempts,
        }
    }
}

impl<const D: usize> Sampling<D> for GaussianSampling<D> {
    fn sample(&mut self) -> Option<Config<D>> {
        for _ in 0..self.attempts {
            let first = self.sampler.sample();
            let offset =
                self.sampler.random_ray() * (self.distance * self.sampler.random_normal()).abs();
            let second = first + offset;

            let first_valid = self.validity.check(&first);
            let second_valid = self.validity.check(&second);
            if first_valid && !second_valid {
                return Some(first);
            }
            if !first_valid && second_valid {
                return Some(second);
            }
        }
        None
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.sampler.set_origin(origin);
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampling<D>> {
        Box::new(GaussianSampling {
            sampler: self.sampler.fork(stream),
            validity: self.validity.clone(),
            distance: self.distance,
            attempts: self.attempts,
        })
    }
}

/// First-order projection of random samples onto a task-space constraint
/// manifold (serial robots only).
///
/// An invalid draw is pulled to at most one step from the nearest tree node,
/// then corrected iteratively with the pseudo-inverse Jacobian until the
/// constraint holds; the projection fails on joint-bound violation, runaway
/// from the tree or attempt exhaustion.
pub struct BerensonSampling<const D: usize> {
    sampler: Box<dyn Sampler<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    constraint: Arc<dyn Constraint<D>>,
    robot: Arc<SerialRobot<D>>,
    graph: Arc<Graph<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    attempts: u32,
    step_size: f64,
}

impl<const D: usize> BerensonSampling<D> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sampler: Box<dyn Sampler<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        constraint: Arc<dyn Constraint<D>>,
        robot: Arc<SerialRobot<D>>,
        graph: Arc<Graph<D>>,
        metric: Arc<dyn DistanceMetric<D>>,
        attempts: u32,
        step_size: f64,
    ) -> Self {
        BerensonSampling {
            sampler,
            validity,
            constraint,
            robot,
            graph,
            metric,
            attempts,
            step_size,
        }
    }

    fn project(&self, config: &mut Config<D>, near: &Config<D>) -> bool {
        let runaway = self.metric.simplify_dist(2.0 * self.step_size);
        for _ in 0..self.attempts {
            if self.constraint.check(config) {
                return true;
            }

            let error = self.constraint.euclidean_error(config);
            let jacobian = self.robot.jacobian(config);
            let Ok(pseudo_inverse) = jacobian.pseudo_inverse(1e-10) else {
                return false;
            };
            let correction = pseudo_inverse * DVector::from_column_slice(error.as_slice());
            for i in 0..D {
                config[i] -= correction[i];
            }

            if !self.constraint.check_robot_bound(config)
                || self.metric.simple_dist(config, near) > runaway
            {
                return false;
            }
        }
        false
    }
}

impl<const D: usize> Sampling<D> for BerensonSampling<D> {
    fn sample(&mut self) -> Option<Config<D>> {
        let rand = self.sampler.sample();
        if self.validity.check(&rand) {
            return Some(rand);
        }

        let near = self.graph.nearest(&rand)?;
        let near = *near.config();
        let dist = self.metric.dist(&rand, &near);
        let mut config = if dist > 1e-12 {
            near + (rand - near) * (self.step_size.min(dist) / dist)
        } else {
            rand
        };

        if self.project(&mut config, &near) && self.validity.check(&config) {
            Some(config)
        } else {
            None
        }
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.sampler.set_origin(origin);
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampling<D>> {
        Box::new(BerensonSampling {
            sampler: self.sampler.fork(stream),
            validity: self.validity.clone(),
            constraint: self.constraint.clone(),
            robot: self.robot.clone(),
            graph: self.graph.clone(),
            metric: self.metric.clone(),
            attempts: self.attempts,
            step_size: self.step_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Node;
    use crate::environment::{DhParameter, RobotModel};
    use crate::metric::L2Metric;
    use crate::sampler::UniformSampler;
    use crate::validity::BoundsChecker;
    use std::f64::consts::PI;

    struct SplitChecker;
    impl ValidityChecker<2> for SplitChecker {
        // Invalid band between x = 4 and x = 6.
        fn check(&self, config: &Config<2>) -> bool {
            config.inside(&Config::new([0.0, 0.0]), &Config::new([10.0, 10.0]))
                && !(config[0] > 4.0 && config[0] < 6.0)
        }
    }

    fn sampler() -> Box<dyn Sampler<2>> {
        Box::new(UniformSampler::new(
            Config::new([0.0, 0.0]),
            Config::new([10.0, 10.0]),
            17,
        ))
    }

    #[test]
    fn test_straight_passes_through() {
        let mut sampling = StraightSampling::new(sampler());
        for _ in 0..10 {
            assert!(sampling.sample().is_some());
        }
    }

    #[test]
    fn test_near_obstacle_returns_valid_configs() {
        let validity: Arc<dyn ValidityChecker<2>> = Arc::new(SplitChecker);
        let mut sampling = NearObstacleSampling::new(sampler(), validity.clone(), 10);
        for _ in 0..50 {
            if let Some(sample) = sampling.sample() {
                assert!(validity.check(&sample));
            }
        }
    }

    #[test]
    fn test_bridge_midpoints_are_valid() {
        let validity: Arc<dyn ValidityChecker<2>> = Arc::new(SplitChecker);
        let mut sampling = BridgeSampling::new(sampler(), validity.clone(), 3.0, 20);
        for _ in 0..20 {
            if let Some(sample) = sampling.sample() {
                assert!(validity.check(&sample));
            }
        }
    }

    #[test]
    fn test_gaussian_returns_valid_side() {
        let validity: Arc<dyn ValidityChecker<2>> = Arc::new(SplitChecker);
        let mut sampling = GaussianSampling::new(sampler(), validity.clone(), 2.0, 20);
        let mut produced = 0;
        for _ in 0..50 {
            if let Some(sample) = sampling.sample() {
                assert!(validity.check(&sample));
                produced += 1;
            }
        }
        assert!(produced > 0);
    }

    #[test]
    fn test_berenson_projects_onto_constraint() {
        let robot = Arc::new(
            SerialRobot::new(
                "planar2",
                Config::new([-PI, -PI]),
                Config::new([PI, PI]),
                [DhParameter::new(0.0, 1.0, 0.0), DhParameter::new(0.0, 1.0, 0.0)],
            )
            .unwrap(),
        );
        let metric: Arc<dyn DistanceMetric<2>> = Arc::new(L2Metric);
        let graph = Arc::new(Graph::new(0, metric.clone()));
        graph.add_node(Node::new(Config::new([0.2, 0.1])));

        let target = robot.tcp_pose(&Config::new([0.2, 0.1]));
        let constraint: Arc<dyn Constraint<2>> =
            Arc::new(PoseConstraint::with_tolerance(robot.clone(), target, 0.3));

        // Everything in bounds is collision free; only the constraint and the
        // projection loop decide.
        struct ConstraintChecker {
            constraint: Arc<dyn Constraint<2>>,
            bounds: BoundsChecker<2>,
        }
        impl ValidityChecker<2> for ConstraintChecker {
            fn check(&self, config: &Config<2>) -> bool {
                self.bounds.check(config) && self.constraint.check(config)
            }
        }
        let validity: Arc<dyn ValidityChecker<2>> = Arc::new(ConstraintChecker {
            constraint: constraint.clone(),
            bounds: BoundsChecker::from_bounds(Config::new([-PI, -PI]), Config::new([PI, PI])),
        });

        let joint_sampler: Box<dyn Sampler<2>> = Box::new(UniformSampler::new(
            Config::new([-PI, -PI]),
            Config::new([PI, PI]),
            23,
        ));
        let mut sampling = BerensonSampling::new(
            joint_sampler,
            validity,
            constraint.clone(),
            robot,
            graph,
            metric,
            30,
            0.8,
        );

        let mut produced = 0;
        for _ in 0..200 {
            if let Some(sample) = sampling.sample() {
                assert!(constraint.check(&sample));
                produced += 1;
            }
        }
        assert!(produced > 0, "projection never succeeded");
    }
}
