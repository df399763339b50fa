// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::base::{Config, Graph, Node, PlanningError};
use crate::environment::{Environment, Pose, RobotModel};
use crate::metric::DistanceMetric;
use crate::planner::{
    run_pose_query, run_query, steer, ExpandPolicy, MotionPlanner, PlannerOptions, TreePlannerBase,
};
use crate::sampler::{derive_seed, EllipsoidSampler};
use crate::sampling::{Sampling, StraightSampling};
use crate::statistic::PlannerStats;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// Asymptotically optimal RRT.
///
/// On top of the plain RRT extension it chooses the cheapest valid parent
/// among the near set and rewires near nodes through the new node whenever
/// that lowers their path cost, keeping descendant costs exact.
pub struct RrtStar<const D: usize> {
    pub(crate) base: TreePlannerBase<D>,
}

/// RRT* candidate computation: choose-parent plus rewire.
pub(crate) struct RrtStarExpansion<const D: usize> {
    graph: Arc<Graph<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    step_size: f64,
    rewire_lock: Arc<Mutex<()>>,
    stats: Arc<PlannerStats>,
}

impl<const D: usize> RrtStarExpansion<D> {
    pub fn new(base: &TreePlannerBase<D>) -> Self {
        Self::on_graph(base, base.graph.clone())
    }

    /// The same expansion against a different graph; used by the two-tree
    /// planner.
    pub fn on_graph(base: &TreePlannerBase<D>, graph: Arc<Graph<D>>) -> Self {
        RrtStarExpansion {
            graph,
            validity: base.validity.clone(),
            trajectory: base.trajectory.clone(),
            metric: base.metric.clone(),
            step_size: base.step_size,
            rewire_lock: base.rewire_lock.clone(),
            stats: base.stats.clone(),
        }
    }

    fn trajectory_valid(&self, from: &Config<D>, to: &Config<D>) -> bool {
        self.validity
            .check_trajectory(&self.trajectory.calc_traj_bin(from, to))
    }
}

impl<const D: usize> ExpandPolicy<D> for RrtStarExpansion<D> {
    fn compute_node(&self, rand: Config<D>) -> Option<Arc<Node<D>>> {
        let nearest = self.graph.nearest(&rand)?;
        let new_config = steer(nearest.config(), &rand, self.step_size);
        if !self.validity.check(&new_config) {
            return None;
        }

        let mut near_nodes = self.graph.near(&new_config, self.step_size);
        if !near_nodes.iter().any(|node| Arc::ptr_eq(node, &nearest)) {
            near_nodes.push(nearest);
        }

        // Choose parent: cheapest near node with a valid connecting
        // trajectory.
        near_nodes.sort_by(|a, b| {
            a.path_cost()
                .partial_cmp(&b.path_cost())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let parent = near_nodes
            .iter()
            .find(|node| self.trajectory_valid(node.config(), &new_config))?
            .clone();

        let edge_cost = self.metric.dist(parent.config(), &new_config);
        if edge_cost <= 0.0 {
            // Duplicate of an existing configuration.
            return None;
        }
        let node = {
            let _guard = self.rewire_lock.lock();
            Node::new_child(&parent, new_config, edge_cost)
        };

        // Rewire: route near nodes through the new node when that is
        // cheaper; the cost delta propagates into their subtrees.
        for near in &near_nodes {
            if Arc::ptr_eq(near, &parent) || near.is_root() {
                continue;
            }
            let edge = self.metric.dist(node.config(), near.config());
            if edge <= 0.0 {
                continue;
            }
            if node.path_cost() + edge + 1e-12 >= near.path_cost() {
                continue;
            }
            if !self.trajectory_valid(node.config(), near.config()) {
                continue;
            }
            let _guard = self.rewire_lock.lock();
            if node.path_cost() + edge < near.path_cost() {
                near.rewire(&node, edge);
                self.stats.rewires.increment();
            }
        }

        Some(node)
    }

    fn graph(&self) -> &Arc<Graph<D>> {
        &self.graph
    }
}

impl<const D: usize> RrtStar<D> {
    pub fn new(
        environment: Arc<Environment<D>>,
        options: PlannerOptions<D>,
        graph: Arc<Graph<D>>,
    ) -> Self {
        RrtStar {
            base: TreePlannerBase::new(environment, options, graph),
        }
    }

    /// Attaches `goal` under the lowest-path-cost node within twice the step
    /// size whose connecting trajectory validates.
    pub fn connect_goal_node(&mut self, goal: Config<D>) -> Result<(), PlanningError> {
        self.base.check_goal(&goal)?;

        let mut candidates = self.base.graph.near(&goal, self.base.step_size * 2.0);
        candidates.sort_by(|a, b| {
            a.path_cost()
                .partial_cmp(&b.path_cost())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for candidate in candidates {
            let trajectory = self.base.trajectory.calc_traj_bin(candidate.config(), &goal);
            if !self.base.validity.check_trajectory(&trajectory) {
                continue;
            }
            let edge_cost = self.base.metric.dist(candidate.config(), &goal);
            let goal_node = {
                let _guard = self.base.rewire_lock.lock();
                Node::new_child(&candidate, goal, edge_cost)
            };
            self.base.goal_node = Some(goal_node);
            self.base.path_planned = true;
            info!("goal is connected");
            return Ok(());
        }

        warn!("goal could not be connected");
        Err(PlanningError::NoConnection)
    }

    /// Keeps expanding after a plan exists, sampling from the informed
    /// ellipsoid spanned by the current best path cost, and re-attaches the
    /// goal whenever a cheaper connection appears. The best plan cost is
    /// non-increasing.
    pub fn optimize(
        &mut self,
        iterations: usize,
        num_nodes: usize,
        num_threads: usize,
    ) -> Result<(), PlanningError> {
        if !self.base.path_planned {
            warn!("no optimization possible, because no plan exists");
            return Err(PlanningError::NoPathPlanned);
        }
        debug!("running optimization");
        self.base.stats.optimization_time.start();

        let init = self
            .base
            .init_node
            .clone()
            .ok_or(PlanningError::Misuse("optimize called without init node"))?;
        let (min, max) = {
            let (min, max) = self.base.environment.robot.boundaries();
            (*min, *max)
        };

        for iteration in 0..iterations {
            let goal = self
                .base
                .goal_node
                .clone()
                .ok_or(PlanningError::Misuse("optimize called without goal node"))?;

            // Swap the informed sampler in for this batch.
            let mut informed = EllipsoidSampler::new(
                min,
                max,
                derive_seed(self.base.sampler_seed, 0x0e11 + iteration as u64),
            );
            informed.set_params(
                init.config(),
                goal.config(),
                goal.path_cost(),
                &*self.base.metric,
            );
            let informed_sampling: Box<dyn Sampling<D>> =
                Box::new(StraightSampling::new(Box::new(informed)));
            let straight = std::mem::replace(&mut self.base.sampling, informed_sampling);

            self.expand(num_nodes, num_threads);
            self.base.sampling = straight;

            self.improve_goal_connection();
        }

        self.base.stats.optimization_time.stop();
        Ok(())
    }

    /// Rewires the goal node under a cheaper near parent if one appeared.
    fn improve_goal_connection(&mut self) {
        let Some(goal) = self.base.goal_node.clone() else {
            return;
        };
        let mut candidates = self.base.graph.near(goal.config(), self.base.step_size * 2.0);
        candidates.sort_by(|a, b| {
            a.path_cost()
                .partial_cmp(&b.path_cost())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for candidate in candidates {
            if candidate.path_cost() >= goal.path_cost() {
                break;
            }
            let edge = self.base.metric.dist(candidate.config(), goal.config());
            if candidate.path_cost() + edge + 1e-12 >= goal.path_cost() {
                continue;
            }
            let trajectory = self
                .base
                .trajectory
                .calc_traj_bin(candidate.config(), goal.config());
            if !self.base.validity.check_trajectory(&trajectory) {
                continue;
            }
            let _guard = self.base.rewire_lock.lock();
            if candidate.path_cost() + edge < goal.path_cost() {
                goal.rewire(&candidate, edge);
            }
            return;
        }
    }

    /// See [`Rrt::compute_path_to_pose`].
    pub fn compute_path_to_pose(
        &mut self,
        start: Config<D>,
        goal_pose: Pose,
        tolerance: (Pose, Pose),
        num_nodes: usize,
        num_threads: usize,
    ) -> Result<(), PlanningError> {
        self.base.stats.planning_time.start();
        self.base.set_init_node(start)?;
        let result = run_pose_query(
            &mut self.base,
            goal_pose,
            &tolerance,
            num_nodes,
            num_threads,
            RrtStarExpansion::new,
        );
        self.base.stats.planning_time.stop();
        result
    }

    pub fn goal_node(&self) -> Option<Arc<Node<D>>> {
        self.base.goal_node.clone()
    }
}

impl<const D: usize> MotionPlanner<D> for RrtStar<D> {
    fn compute_path(
        &mut self,
        start: Config<D>,
        goal: Config<D>,
        num_nodes: usize,
        num_threads: usize,
    ) -> Result<(), PlanningError> {
        self.base.stats.planning_time.start();
        self.base.set_init_node(start)?;
        if start == goal {
            self.base.goal_node = self.base.init_node.clone();
            self.base.path_planned = true;
            self.base.stats.planning_time.stop();
            return Ok(());
        }
        self.base.check_goal(&goal)?;

        run_query(
            &mut self.base,
            goal,
            num_nodes,
            num_threads,
            RrtStarExpansion::new,
        )?;
        self.base.stats.planning_time.stop();
        self.connect_goal_node(goal)
    }

    fn expand(&mut self, num_nodes: usize, num_threads: usize) {
        let policy = RrtStarExpansion::new(&self.base);
        self.base.expand_batch(num_nodes, num_threads, &policy);
    }

    fn get_path_nodes(&self) -> Vec<Arc<Node<D>>> {
        self.base.path_nodes()
    }

    fn get_path(&self, pos_res: f64, ori_res: f64) -> Result<Vec<Config<D>>, PlanningError> {
        self.base.path(pos_res, ori_res)
    }

    fn graph(&self) -> Arc<Graph<D>> {
        self.base.graph.clone()
    }

    fn stats(&self) -> Arc<PlannerStats> {
        self.base.stats.clone()
    }
}
