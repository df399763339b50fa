// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::base::config::wrap_angle;
use crate::base::{Config, Graph, Node};
use crate::environment::{Pose, RobotModel};
use crate::metric::DistanceMetric;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// Termination oracle consulted between expansion batches.
///
/// Evaluators never preempt a running batch; the cancellation latency of a
/// planner is therefore bounded by one batch.
pub trait Evaluator<const D: usize>: Send {
    /// `true` once the planner may stop expanding.
    fn evaluate(&mut self) -> bool;

    /// Resets internal state (timers, solved marks) before a new query.
    fn initialize(&mut self) {}

    /// Target configurations of the query. Calls carrying no targets or a
    /// NaN sentinel are ignored.
    fn set_query(&mut self, _targets: Vec<Config<D>>) {}

    /// Target workspace poses of the query.
    fn set_poses(&mut self, _poses: Vec<Pose>) {}
}

fn accepted_targets<const D: usize>(targets: &[Config<D>]) -> bool {
    !targets.is_empty() && targets.iter().all(|t| !t.has_nan())
}

/// Satisfied once the graph holds a node within `resolution` of every target
/// configuration.
pub struct TreeConfigEvaluator<const D: usize> {
    graph: Arc<Graph<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    simple_resolution: f64,
    targets: Vec<Config<D>>,
}

impl<const D: usize> TreeConfigEvaluator<D> {
    pub fn new(graph: Arc<Graph<D>>, metric: Arc<dyn DistanceMetric<D>>, resolution: f64) -> Self {
        let simple_resolution = metric.simplify_dist(resolution);
        TreeConfigEvaluator {
            graph,
            metric,
            simple_resolution,
            targets: Vec::new(),
        }
    }
}

impl<const D: usize> Evaluator<D> for TreeConfigEvaluator<D> {
    fn evaluate(&mut self) -> bool {
        !self.targets.is_empty()
            && self.targets.iter().all(|target| {
                self.graph
                    .nearest(target)
                    .map(|node| self.metric.simple_dist(target, node.config()) <= self.simple_resolution)
                    .unwrap_or(false)
            })
    }

    fn set_query(&mut self, targets: Vec<Config<D>>) {
        if accepted_targets(&targets) {
            self.targets = targets;
        }
    }
}

/// Satisfied once the wall-clock budget is spent.
pub struct TimeEvaluator {
    timeout: Duration,
    started: Option<Instant>,
}

impl TimeEvaluator {
    pub fn new(timeout: Duration) -> Self {
        TimeEvaluator {
            timeout,
            started: None,
        }
    }
}

impl<const D: usize> Evaluator<D> for TimeEvaluator {
    fn evaluate(&mut self) -> bool {
        let started = *self.started.get_or_insert_with(Instant::now);
        started.elapsed() > self.timeout
    }

    fn initialize(&mut self) {
        self.started = Some(Instant::now());
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposeOperation {
    And,
    Or,
}

/// Logical combination of evaluators. Every child is evaluated on each call
/// so stateful children (timers, cursors) keep advancing.
pub struct ComposeEvaluator<const D: usize> {
    evaluators: Vec<Box<dyn Evaluator<D>>>,
    operation: ComposeOperation,
}

impl<const D: usize> ComposeEvaluator<D> {
    pub fn new(evaluators: Vec<Box<dyn Evaluator<D>>>, operation: ComposeOperation) -> Self {
        ComposeEvaluator {
            evaluators,
            operation,
        }
    }
}

impl<const D: usize> Evaluator<D> for ComposeEvaluator<D> {
    fn evaluate(&mut self) -> bool {
        let results: Vec<bool> = self.evaluators.iter_mut().map(|e| e.evaluate()).collect();
        match self.operation {
            ComposeOperation::And => results.iter().all(|r| *r),
            ComposeOperation::Or => results.iter().any(|r| *r),
        }
    }

    fn initialize(&mut self) {
        for evaluator in &mut self.evaluators {
            evaluator.initialize();
        }
    }

    fn set_query(&mut self, targets: Vec<Config<D>>) {
        for evaluator in &mut self.evaluators {
            evaluator.set_query(targets.clone());
        }
    }

    fn set_poses(&mut self, poses: Vec<Pose>) {
        for evaluator in &mut self.evaluators {
            evaluator.set_poses(poses.clone());
        }
    }
}

/// Config-reached OR deadline-expired, the default tree-planner termination.
pub fn tree_config_or_time<const D: usize>(
    graph: Arc<Graph<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    resolution: f64,
    timeout: Duration,
) -> ComposeEvaluator<D> {
    ComposeEvaluator::new(
        vec![
            Box::new(TreeConfigEvaluator::new(graph, metric, resolution)),
            Box::new(TimeEvaluator::new(timeout)),
        ],
        ComposeOperation::Or,
    )
}

/// `true` iff `pose` deviates from `target` within the `(lower, upper)`
/// tolerance band, rotations compared on the circle.
pub fn pose_within_tolerance(pose: &Pose, target: &Pose, tolerance: &(Pose, Pose)) -> bool {
    let (lower, upper) = tolerance;
    for i in 0..6 {
        let error = if i < 3 {
            pose[i] - target[i]
        } else {
            wrap_angle(pose[i] - target[i])
        };
        if error < lower[i] || error > upper[i] {
            return false;
        }
    }
    true
}

/// Satisfied once some node's forward-kinematics pose lies inside the
/// tolerance band of every target pose. Scans only nodes added since the
/// last call.
pub struct TreePoseEvaluator<const D: usize> {
    graph: Arc<Graph<D>>,
    robot: Arc<dyn RobotModel<D>>,
    tolerance: (Pose, Pose),
    poses: Vec<Pose>,
    solved: Vec<bool>,
    cursor: usize,
}

impl<const D: usize> TreePoseEvaluator<D> {
    pub fn new(
        graph: Arc<Graph<D>>,
        robot: Arc<dyn RobotModel<D>>,
        tolerance: (Pose, Pose),
    ) -> Self {
        TreePoseEvaluator {
            graph,
            robot,
            tolerance,
            poses: Vec::new(),
            solved: Vec::new(),
            cursor: 0,
        }
    }
}

impl<const D: usize> Evaluator<D> for TreePoseEvaluator<D> {
    fn evaluate(&mut self) -> bool {
        if self.poses.is_empty() {
            return false;
        }
        let nodes = self.graph.nodes();
        for node in &nodes[self.cursor.min(nodes.len())..] {
            let pose = self.robot.tcp_pose(node.config());
            for (i, target) in self.poses.iter().enumerate() {
                if !self.solved[i] && pose_within_tolerance(&pose, target, &self.tolerance) {
                    self.solved[i] = true;
                }
            }
        }
        self.cursor = nodes.len();
        self.solved.iter().all(|s| *s)
    }

    fn initialize(&mut self) {
        self.cursor = 0;
        self.solved = vec![false; self.poses.len()];
    }

    fn set_poses(&mut self, poses: Vec<Pose>) {
        if poses.is_empty() {
            return;
        }
        self.solved = vec![false; poses.len()];
        self.poses = poses;
        self.cursor = 0;
    }
}

/// Two-tree termination: satisfied once the graphs hold a cross pair within
/// `resolution` whose connecting trajectory validates.
pub struct TreeConnectEvaluator<const D: usize> {
    graph_a: Arc<Graph<D>>,
    graph_b: Arc<Graph<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    simple_resolution: f64,
    cursor_a: usize,
    cursor_b: usize,
    connected: bool,
}

impl<const D: usize> TreeConnectEvaluator<D> {
    pub fn new(
        graph_a: Arc<Graph<D>>,
        graph_b: Arc<Graph<D>>,
        metric: Arc<dyn DistanceMetric<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
        resolution: f64,
    ) -> Self {
        let simple_resolution = metric.simplify_dist(resolution);
        TreeConnectEvaluator {
            graph_a,
            graph_b,
            metric,
            validity,
            trajectory,
            simple_resolution,
            cursor_a: 0,
            cursor_b: 0,
            connected: false,
        }
    }

    fn scan(&self, own: &[Arc<Node<D>>], other: &Graph<D>) -> bool {
        own.iter().any(|node| {
            other
                .nearest(node.config())
                .map(|candidate| {
                    self.metric.simple_dist(node.config(), candidate.config())
                        <= self.simple_resolution
                        && self.validity.check_trajectory(
                            &self
                                .trajectory
                                .calc_traj_bin(node.config(), candidate.config()),
                        )
                })
                .unwrap_or(false)
        })
    }
}

impl<const D: usize> Evaluator<D> for TreeConnectEvaluator<D> {
    fn evaluate(&mut self) -> bool {
        if self.connected {
            return true;
        }
        let nodes_a = self.graph_a.nodes();
        let nodes_b = self.graph_b.nodes();
        let fresh_a = &nodes_a[self.cursor_a.min(nodes_a.len())..];
        let fresh_b = &nodes_b[self.cursor_b.min(nodes_b.len())..];
        self.connected =
            self.scan(fresh_a, &self.graph_b) || self.scan(fresh_b, &self.graph_a);
        self.cursor_a = nodes_a.len();
        self.cursor_b = nodes_b.len();
        self.connected
    }

    fn initialize(&mut self) {
        self.cursor_a = 0;
        self.cursor_b = 0;
        self.connected = false;
    }
}

/// Roadmap connectivity: satisfied once every query target has an entry node
/// within `range` and all entries lie in one connected component.
pub struct PrmConnectEvaluator<const D: usize> {
    graph: Arc<Graph<D>>,
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    range: f64,
    targets: Vec<Config<D>>,
}

impl<const D: usize> PrmConnectEvaluator<D> {
    pub fn new(
        graph: Arc<Graph<D>>,
        validity: Arc<dyn ValidityChecker<D>>,
        trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
        range: f64,
    ) -> Self {
        PrmConnectEvaluator {
            graph,
            validity,
            trajectory,
            range,
            targets: Vec::new(),
        }
    }

    fn entry_nodes(&self, target: &Config<D>) -> Vec<Arc<Node<D>>> {
        self.graph
            .near(target, self.range)
            .into_iter()
            .filter(|node| {
                self.validity
                    .check_trajectory(&self.trajectory.calc_traj_bin(target, node.config()))
            })
            .collect()
    }
}

impl<const D: usize> Evaluator<D> for PrmConnectEvaluator<D> {
    fn evaluate(&mut self) -> bool {
        if self.targets.is_empty() {
            return false;
        }
        let entries: Vec<Vec<Arc<Node<D>>>> =
            self.targets.iter().map(|t| self.entry_nodes(t)).collect();
        if entries.iter().any(|e| e.is_empty()) {
            return false;
        }

        // Flood the component of the first target's entries.
        let mut visited: HashSet<usize> = HashSet::new();
        let mut queue: VecDeque<Arc<Node<D>>> = entries[0].iter().cloned().collect();
        for node in &queue {
            visited.insert(Arc::as_ptr(node) as usize);
        }
        while let Some(node) = queue.pop_front() {
            for (neighbor, _) in node.edges() {
                if visited.insert(Arc::as_ptr(&neighbor) as usize) {
                    queue.push_back(neighbor);
                }
            }
        }

        entries[1..].iter().all(|entry| {
            entry
                .iter()
                .any(|node| visited.contains(&(Arc::as_ptr(node) as usize)))
        })
    }

    fn set_query(&mut self, targets: Vec<Config<D>>) {
        if accepted_targets(&targets) {
            self.targets = targets;
        }
    }
}

/// A batch of target configurations; each is marked solved at most once and
/// the evaluator is satisfied when all are.
pub struct QueryEvaluator<const D: usize> {
    graph: Arc<Graph<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    simple_resolution: f64,
    targets: Vec<Config<D>>,
    solved: Vec<bool>,
}

impl<const D: usize> QueryEvaluator<D> {
    pub fn new(graph: Arc<Graph<D>>, metric: Arc<dyn DistanceMetric<D>>, resolution: f64) -> Self {
        let simple_resolution = metric.simplify_dist(resolution);
        QueryEvaluator {
            graph,
            metric,
            simple_resolution,
            targets: Vec::new(),
            solved: Vec::new(),
        }
    }
}

impl<const D: usize> Evaluator<D> for QueryEvaluator<D> {
    fn evaluate(&mut self) -> bool {
        if self.targets.is_empty() {
            return false;
        }
        for (i, target) in self.targets.iter().enumerate() {
            if self.solved[i] {
                continue;
            }
            if let Some(node) = self.graph.nearest(target) {
                if self.metric.simple_dist(target, node.config()) <= self.simple_resolution {
                    self.solved[i] = true;
                }
            }
        }
        self.solved.iter().all(|s| *s)
    }

    fn initialize(&mut self) {
        self.solved = vec![false; self.targets.len()];
    }

    fn set_query(&mut self, targets: Vec<Config<D>>) {
        if accepted_targets(&targets) {
            self.solved = vec![false; targets.len()];
            self.targets = targets;
        }
    }
}
