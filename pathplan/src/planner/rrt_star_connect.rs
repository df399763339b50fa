// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;

use crate::base::{Config, Graph, Node, PlanningError};
use crate::environment::Environment;
use crate::metric::DistanceMetric;
use crate::planner::rrt_star::RrtStarExpansion;
use crate::planner::{
    densify, steer, ExpandPolicy, MotionPlanner, PlannerOptions, TreePlannerBase,
};
use crate::statistic::PlannerStats;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// A bridge between the two trees: `node_a` lives in the start tree,
/// `node_b` in the goal tree, and the canonical plan cost runs from the
/// start through the bridging configuration to the goal. Neither tree's
/// cached path costs are touched.
#[derive(Clone)]
struct TreeConnection<const D: usize> {
    node_a: Arc<Node<D>>,
    node_b: Arc<Node<D>>,
    cost: f64,
}

/// Bidirectional RRT*: one tree rooted at the start, one at the goal.
///
/// The trees take turns expanding RRT*-style; every accepted node triggers a
/// greedy steer-connect from the other tree. The reported path stitches the
/// start-tree chain, the bridge and the reversed goal-tree chain.
pub struct RrtStarConnect<const D: usize> {
    base: TreePlannerBase<D>,
    graph_b: Arc<Graph<D>>,
    goal_root: Option<Arc<Node<D>>>,
    connection: Arc<Mutex<Option<TreeConnection<D>>>>,
    path_nodes: Vec<Arc<Node<D>>>,
    grow_start_tree: bool,
}

/// RRT* expansion on one tree followed by a connect attempt from the other.
struct ConnectExpansion<const D: usize> {
    star: RrtStarExpansion<D>,
    own_is_start_tree: bool,
    other: Arc<Graph<D>>,
    connection: Arc<Mutex<Option<TreeConnection<D>>>>,
    metric: Arc<dyn DistanceMetric<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    step_size: f64,
}

impl<const D: usize> ConnectExpansion<D> {
    fn record(&self, own_node: &Arc<Node<D>>, other_node: &Arc<Node<D>>) {
        let (node_a, node_b) = if self.own_is_start_tree {
            (own_node.clone(), other_node.clone())
        } else {
            (other_node.clone(), own_node.clone())
        };
        let cost = node_a.path_cost()
            + self.metric.dist(node_a.config(), node_b.config())
            + node_b.path_cost();

        let mut connection = self.connection.lock();
        if connection.as_ref().map_or(true, |c| cost < c.cost) {
            *connection = Some(TreeConnection {
                node_a,
                node_b,
                cost,
            });
        }
    }

    /// Repeatedly steers the other tree toward `target` until the motion is
    /// blocked or the target configuration is reached.
    fn try_connect(&self, target: &Arc<Node<D>>) {
        let target_config = *target.config();
        let Some(mut current) = self.other.nearest(&target_config) else {
            return;
        };

        let remaining = self.metric.dist(current.config(), &target_config);
        let max_steps = (remaining / self.step_size).ceil() as usize + 2;
        for _ in 0..max_steps {
            let next = steer(current.config(), &target_config, self.step_size);
            if next == *current.config() {
                return;
            }
            if !self.validity.check(&next) {
                return;
            }
            let trajectory = self.trajectory.calc_traj_bin(current.config(), &next);
            if !self.validity.check_trajectory(&trajectory) {
                return;
            }

            let edge_cost = self.metric.dist(current.config(), &next);
            let node = Node::new_child(&current, next, edge_cost);
            self.other.add_node(node.clone());

            if next == target_config {
                self.record(target, &node);
                return;
            }
            current = node;
        }
    }
}

impl<const D: usize> ExpandPolicy<D> for ConnectExpansion<D> {
    fn compute_node(&self, rand: Config<D>) -> Option<Arc<Node<D>>> {
        let node = self.star.compute_node(rand)?;
        if self.connection.lock().is_none() {
            self.try_connect(&node);
        }
        Some(node)
    }

    fn graph(&self) -> &Arc<Graph<D>> {
        self.star.graph()
    }
}

impl<const D: usize> RrtStarConnect<D> {
    pub fn new(
        environment: Arc<Environment<D>>,
        options: PlannerOptions<D>,
        graph: Arc<Graph<D>>,
    ) -> Self {
        let graph_b = Arc::new(graph.empty_clone());
        Self::with_goal_graph(environment, options, graph, graph_b)
    }

    /// Builds the planner around a caller-supplied goal tree, so evaluators
    /// watching both graphs can be wired up beforehand.
    pub fn with_goal_graph(
        environment: Arc<Environment<D>>,
        options: PlannerOptions<D>,
        graph: Arc<Graph<D>>,
        goal_graph: Arc<Graph<D>>,
    ) -> Self {
        RrtStarConnect {
            base: TreePlannerBase::new(environment, options, graph),
            graph_b: goal_graph,
            goal_root: None,
            connection: Arc::new(Mutex::new(None)),
            path_nodes: Vec::new(),
            grow_start_tree: true,
        }
    }

    /// The tree rooted at the goal.
    pub fn goal_graph(&self) -> Arc<Graph<D>> {
        self.graph_b.clone()
    }

    fn expansion(&self, grow_start_tree: bool) -> ConnectExpansion<D> {
        let (own, other) = if grow_start_tree {
            (self.base.graph.clone(), self.graph_b.clone())
        } else {
            (self.graph_b.clone(), self.base.graph.clone())
        };
        ConnectExpansion {
            star: RrtStarExpansion::on_graph(&self.base, own),
            own_is_start_tree: grow_start_tree,
            other,
            connection: self.connection.clone(),
            metric: self.base.metric.clone(),
            validity: self.base.validity.clone(),
            trajectory: self.base.trajectory.clone(),
            step_size: self.base.step_size,
        }
    }

    /// Cross-tree sweep used when the evaluator fired before the greedy
    /// connector found a bridge.
    fn final_connect_scan(&self) {
        let policy = self.expansion(true);
        for node in self.base.graph.nodes() {
            if self.connection.lock().is_some() {
                return;
            }
            if let Some(candidate) = self.graph_b.nearest(node.config()) {
                let dist = self.base.metric.dist(node.config(), candidate.config());
                if dist <= self.base.step_size
                    && self.base.validity.check_trajectory(
                        &self
                            .base
                            .trajectory
                            .calc_traj_bin(node.config(), candidate.config()),
                    )
                {
                    policy.record(&node, &candidate);
                }
            }
        }
    }

    fn finish_path(&mut self) -> Result<(), PlanningError> {
        if self.connection.lock().is_none() {
            self.final_connect_scan();
        }
        let mut connection = match self.connection.lock().clone() {
            Some(connection) => connection,
            None => {
                warn!("trees could not be connected");
                return Err(PlanningError::NoConnection);
            }
        };

        // Rewires during the final batch may have changed either chain, so
        // the canonical cost is recomputed from the settled trees.
        connection.cost = connection.node_a.path_cost()
            + self
                .base
                .metric
                .dist(connection.node_a.config(), connection.node_b.config())
            + connection.node_b.path_cost();
        *self.connection.lock() = Some(connection.clone());

        let mut nodes = chain_to_root(&connection.node_a);
        nodes.reverse();
        let mut goal_chain = chain_to_root(&connection.node_b);
        if connection.node_a.config() == connection.node_b.config() {
            goal_chain.remove(0);
        }
        nodes.extend(goal_chain);

        info!(
            "trees connected, plan cost {:.3} over {} nodes",
            connection.cost,
            nodes.len()
        );
        self.path_nodes = nodes;
        self.base.goal_node = self.path_nodes.last().cloned();
        self.base.path_planned = true;
        Ok(())
    }

    /// The canonical cost of the current plan through the bridge.
    pub fn plan_cost(&self) -> Option<f64> {
        self.connection.lock().as_ref().map(|c| c.cost)
    }
}

fn chain_to_root<const D: usize>(node: &Arc<Node<D>>) -> Vec<Arc<Node<D>>> {
    let mut nodes = vec![node.clone()];
    let mut current = node.parent();
    while let Some(parent) = current {
        current = parent.parent();
        nodes.push(parent);
    }
    nodes
}

impl<const D: usize> MotionPlanner<D> for RrtStarConnect<D> {
    fn compute_path(
        &mut self,
        start: Config<D>,
        goal: Config<D>,
        num_nodes: usize,
        num_threads: usize,
    ) -> Result<(), PlanningError> {
        self.base.stats.planning_time.start();
        let start_changed = self
            .base
            .init_node
            .as_ref()
            .map_or(true, |init| *init.config() != start);
        self.base.set_init_node(start)?;
        if start == goal {
            self.base.goal_node = self.base.init_node.clone();
            self.base.path_planned = true;
            self.path_nodes = self.base.init_node.iter().cloned().collect();
            self.base.stats.planning_time.stop();
            return Ok(());
        }
        self.base.check_goal(&goal)?;

        let goal_changed = self
            .goal_root
            .as_ref()
            .map_or(true, |root| *root.config() != goal);
        if start_changed || goal_changed {
            *self.connection.lock() = None;
            self.path_nodes.clear();
            self.base.path_planned = false;
            self.base.goal_node = None;
        }
        if goal_changed {
            self.graph_b.reset();
            let root = Node::new(goal);
            self.graph_b.add_node(root.clone());
            self.goal_root = Some(root);
        }

        self.base.evaluator.set_query(vec![goal]);
        while self.connection.lock().is_none() && !self.base.evaluator.evaluate() {
            self.expand(num_nodes, num_threads);
        }

        self.base.stats.planning_time.stop();
        self.finish_path()
    }

    /// Expands one tree per call, alternating between the two.
    fn expand(&mut self, num_nodes: usize, num_threads: usize) {
        let policy = self.expansion(self.grow_start_tree);
        self.base.expand_batch(num_nodes, num_threads, &policy);
        self.grow_start_tree = !self.grow_start_tree;
    }

    fn get_path_nodes(&self) -> Vec<Arc<Node<D>>> {
        self.path_nodes.clone()
    }

    fn get_path(&self, pos_res: f64, ori_res: f64) -> Result<Vec<Config<D>>, PlanningError> {
        if !self.base.path_planned {
            warn!("path is not complete");
            return Err(PlanningError::NoPathPlanned);
        }
        let mut nodes = self.path_nodes.clone();
        if let Some(modifier) = &self.base.path_modifier {
            nodes = modifier.modify(nodes);
        }
        Ok(densify(&nodes, &*self.base.trajectory, pos_res, ori_res))
    }

    fn graph(&self) -> Arc<Graph<D>> {
        self.base.graph.clone()
    }

    fn stats(&self) -> Arc<PlannerStats> {
        self.base.stats.clone()
    }
}
