// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use log::{info, warn};

use crate::base::{Config, Graph, Node, PlanningError};
use crate::environment::{Environment, Pose};
use crate::metric::DistanceMetric;
use crate::planner::{
    run_pose_query, run_query, steer, ExpandPolicy, MotionPlanner, PlannerOptions, TreePlannerBase,
};
use crate::statistic::PlannerStats;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// Single-tree rapidly-exploring random tree.
///
/// Each accepted sample is steered from its nearest tree node by at most the
/// step size, validated together with its connecting trajectory and attached
/// as a child of that node.
pub struct Rrt<const D: usize> {
    pub(crate) base: TreePlannerBase<D>,
}

/// The plain RRT candidate computation.
pub(crate) struct RrtExpansion<const D: usize> {
    graph: Arc<Graph<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    step_size: f64,
}

impl<const D: usize> RrtExpansion<D> {
    pub fn new(base: &TreePlannerBase<D>) -> Self {
        RrtExpansion {
            graph: base.graph.clone(),
            validity: base.validity.clone(),
            trajectory: base.trajectory.clone(),
            metric: base.metric.clone(),
            step_size: base.step_size,
        }
    }
}

impl<const D: usize> ExpandPolicy<D> for RrtExpansion<D> {
    fn compute_node(&self, rand: Config<D>) -> Option<Arc<Node<D>>> {
        let near = self.graph.nearest(&rand)?;
        let new_config = steer(near.config(), &rand, self.step_size);
        if new_config == *near.config() {
            return None;
        }
        if !self.validity.check(&new_config) {
            return None;
        }
        let trajectory = self.trajectory.calc_traj_bin(near.config(), &new_config);
        if !self.validity.check_trajectory(&trajectory) {
            return None;
        }

        let edge_cost = self.metric.dist(near.config(), &new_config);
        Some(Node::new_child(&near, new_config, edge_cost))
    }

    fn graph(&self) -> &Arc<Graph<D>> {
        &self.graph
    }
}

impl<const D: usize> Rrt<D> {
    pub fn new(
        environment: Arc<Environment<D>>,
        options: PlannerOptions<D>,
        graph: Arc<Graph<D>>,
    ) -> Self {
        Rrt {
            base: TreePlannerBase::new(environment, options, graph),
        }
    }

    /// Attaches `goal` under the closest tree node whose connecting
    /// trajectory validates.
    pub fn connect_goal_node(&mut self, goal: Config<D>) -> Result<(), PlanningError> {
        self.base.check_goal(&goal)?;

        let mut candidates = self.base.graph.near(&goal, self.base.step_size * 3.0);
        if candidates.is_empty() {
            candidates.extend(self.base.graph.nearest(&goal));
        }
        candidates.sort_by(|a, b| {
            let da = self.base.metric.simple_dist(a.config(), &goal);
            let db = self.base.metric.simple_dist(b.config(), &goal);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });

        for candidate in candidates {
            let trajectory = self.base.trajectory.calc_traj_bin(candidate.config(), &goal);
            if !self.base.validity.check_trajectory(&trajectory) {
                continue;
            }
            let edge_cost = self.base.metric.dist(candidate.config(), &goal);
            let goal_node = Node::new_child(&candidate, goal, edge_cost);
            self.base.goal_node = Some(goal_node);
            self.base.path_planned = true;
            info!("goal is connected");
            return Ok(());
        }

        warn!("goal could not be connected");
        Err(PlanningError::NoConnection)
    }

    /// Expands until a tree node's forward-kinematics pose enters the
    /// tolerance band around `goal_pose`, then installs the closest such
    /// node as the goal.
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
            RrtExpansion::new,
        );
        self.base.stats.planning_time.stop();
        result
    }

    pub fn init_node(&self) -> Option<Arc<Node<D>>> {
        self.base.init_node.clone()
    }

    pub fn goal_node(&self) -> Option<Arc<Node<D>>> {
        self.base.goal_node.clone()
    }
}

impl<const D: usize> MotionPlanner<D> for Rrt<D> {
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

        run_query(&mut self.base, goal, num_nodes, num_threads, RrtExpansion::new)?;
        self.base.stats.planning_time.stop();
        self.connect_goal_node(goal)
    }

    fn expand(&mut self, num_nodes: usize, num_threads: usize) {
        let policy = RrtExpansion::new(&self.base);
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
