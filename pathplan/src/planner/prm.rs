// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use log::{info, warn};

use crate::base::{Config, Graph, Node, PlanningError};
use crate::environment::Environment;
use crate::metric::DistanceMetric;
use crate::planner::{
    densify, ExpandPolicy, MotionPlanner, PlannerOptions, TreePlannerBase,
};
use crate::statistic::PlannerStats;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// Probabilistic roadmap planner.
///
/// The build phase samples valid configurations and links each new node to
/// every near neighbor whose connecting trajectory validates, storing
/// bidirectional adjacency with metric edge costs. The query phase attaches
/// start and goal by the same local-planner rule and searches the roadmap
/// with A* under the metric heuristic.
pub struct Prm<const D: usize> {
    base: TreePlannerBase<D>,
    radius: f64,
    path_nodes: Vec<Arc<Node<D>>>,
}

/// Roadmap milestone creation: validate the sample, link it to its
/// neighborhood.
struct PrmExpansion<const D: usize> {
    graph: Arc<Graph<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    radius: f64,
}

impl<const D: usize> ExpandPolicy<D> for PrmExpansion<D> {
    fn compute_node(&self, rand: Config<D>) -> Option<Arc<Node<D>>> {
        if !self.validity.check(&rand) {
            return None;
        }
        let node = Node::new(rand);
        for near in self.graph.near(&rand, self.radius) {
            let trajectory = self.trajectory.calc_traj_bin(&rand, near.config());
            if self.validity.check_trajectory(&trajectory) {
                let cost = self.metric.dist(&rand, near.config());
                Node::add_edge(&node, &near, cost);
            }
        }
        Some(node)
    }

    fn graph(&self) -> &Arc<Graph<D>> {
        &self.graph
    }
}

impl<const D: usize> Prm<D> {
    pub fn new(
        environment: Arc<Environment<D>>,
        options: PlannerOptions<D>,
        graph: Arc<Graph<D>>,
    ) -> Self {
        let radius = options.prm_radius;
        Prm {
            base: TreePlannerBase::new(environment, options, graph),
            radius,
            path_nodes: Vec::new(),
        }
    }

    fn expansion(&self) -> PrmExpansion<D> {
        PrmExpansion {
            graph: self.base.graph.clone(),
            validity: self.base.validity.clone(),
            trajectory: self.base.trajectory.clone(),
            metric: self.base.metric.clone(),
            radius: self.radius,
        }
    }

    /// Links `config` into the roadmap by the local-planner rule and adds
    /// the new node to the graph.
    fn attach(&self, config: Config<D>) -> Option<Arc<Node<D>>> {
        let node = Node::new(config);
        let mut linked = false;
        for near in self.base.graph.near(&config, self.radius) {
            let trajectory = self.base.trajectory.calc_traj_bin(&config, near.config());
            if self.base.validity.check_trajectory(&trajectory) {
                let cost = self.base.metric.dist(&config, near.config());
                Node::add_edge(&node, &near, cost);
                linked = true;
            }
        }
        if !linked {
            warn!("configuration could not be linked into the roadmap");
            return None;
        }
        self.base.graph.add_node(node.clone());
        Some(node)
    }

    fn query_path(&mut self, start: Config<D>, goal: Config<D>) -> Result<(), PlanningError> {
        let start_node = self.attach(start).ok_or(PlanningError::NoConnection)?;
        let goal_node = self.attach(goal).ok_or(PlanningError::NoConnection)?;

        let nodes = astar(&start_node, &goal_node, &*self.base.metric)
            .ok_or(PlanningError::NoConnection)?;
        info!("roadmap query solved with {} nodes", nodes.len());
        self.path_nodes = nodes;
        self.base.init_node = Some(start_node);
        self.base.goal_node = Some(goal_node);
        self.base.path_planned = true;
        Ok(())
    }
}

/// A* over the roadmap adjacency with the metric distance to the goal as
/// heuristic.
fn astar<const D: usize>(
    start: &Arc<Node<D>>,
    goal: &Arc<Node<D>>,
    metric: &dyn DistanceMetric<D>,
) -> Option<Vec<Arc<Node<D>>>> {
    struct QueueEntry<const D: usize> {
        estimate: f64,
        node: Arc<Node<D>>,
    }
    impl<const D: usize> PartialEq for QueueEntry<D> {
        fn eq(&self, other: &Self) -> bool {
            self.estimate == other.estimate
        }
    }
    impl<const D: usize> Eq for QueueEntry<D> {}
    impl<const D: usize> PartialOrd for QueueEntry<D> {
        fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
            Some(self.cmp(other))
        }
    }
    impl<const D: usize> Ord for QueueEntry<D> {
        fn cmp(&self, other: &Self) -> std::cmp::Ordering {
            // Min-heap over the estimate.
            other
                .estimate
                .partial_cmp(&self.estimate)
                .unwrap_or(std::cmp::Ordering::Equal)
        }
    }

    let key = |node: &Arc<Node<D>>| Arc::as_ptr(node) as usize;
    let goal_key = key(goal);

    let mut best_cost: HashMap<usize, f64> = HashMap::new();
    let mut parents: HashMap<usize, Arc<Node<D>>> = HashMap::new();
    let mut queue = BinaryHeap::new();

    best_cost.insert(key(start), 0.0);
    queue.push(QueueEntry {
        estimate: metric.dist(start.config(), goal.config()),
        node: start.clone(),
    });

    while let Some(QueueEntry { node, .. }) = queue.pop() {
        let node_key = key(&node);
        if node_key == goal_key {
            let mut path = vec![node];
            while let Some(parent) = parents.get(&key(path.last().expect("non-empty path"))) {
                path.push(parent.clone());
            }
            path.reverse();
            return Some(path);
        }

        let node_cost = best_cost[&node_key];
        for (neighbor, edge_cost) in node.edges() {
            let candidate_cost = node_cost + edge_cost;
            let neighbor_key = key(&neighbor);
            if best_cost
                .get(&neighbor_key)
                .map_or(true, |&cost| candidate_cost < cost)
            {
                best_cost.insert(neighbor_key, candidate_cost);
                parents.insert(neighbor_key, node.clone());
                queue.push(QueueEntry {
                    estimate: candidate_cost + metric.dist(neighbor.config(), goal.config()),
                    node: neighbor,
                });
            }
        }
    }
    None
}

impl<const D: usize> MotionPlanner<D> for Prm<D> {
    fn compute_path(
        &mut self,
        start: Config<D>,
        goal: Config<D>,
        num_nodes: usize,
        num_threads: usize,
    ) -> Result<(), PlanningError> {
        self.base.stats.planning_time.start();
        if !self.base.validity.check(&start) {
            warn!("start configuration is not valid");
            self.base.stats.planning_time.stop();
            return Err(PlanningError::InvalidStart);
        }
        self.base.check_goal(&goal)?;

        if start == goal {
            let node = Node::new(start);
            self.base.graph.add_node(node.clone());
            self.base.init_node = Some(node.clone());
            self.base.goal_node = Some(node.clone());
            self.path_nodes = vec![node];
            self.base.path_planned = true;
            self.base.stats.planning_time.stop();
            return Ok(());
        }

        self.base.evaluator.initialize();
        self.base.evaluator.set_query(vec![start, goal]);
        while !self.base.evaluator.evaluate() {
            self.expand(num_nodes, num_threads);
        }

        let result = self.query_path(start, goal);
        self.base.stats.planning_time.stop();
        result
    }

    /// Build phase: one batch of roadmap milestones.
    fn expand(&mut self, num_nodes: usize, num_threads: usize) {
        let policy = self.expansion();
        self.base.expand_batch(num_nodes, num_threads, &policy);
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
