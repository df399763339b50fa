// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

pub mod options;
pub mod path_modifier;
pub mod prm;
pub mod rrt;
pub mod rrt_star;
pub mod rrt_star_connect;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::base::config::wrap_angle;
use crate::base::{Config, Graph, Node, PlanningError};
use crate::environment::{Environment, Pose, RobotModel};
use crate::evaluator::{pose_within_tolerance, Evaluator};
use crate::metric::DistanceMetric;
use crate::sampler::seed_from_str;
use crate::sampling::Sampling;
use crate::statistic::PlannerStats;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

pub use options::PlannerOptions;
pub use path_modifier::{NodeCutPathModifier, PathModifier};
pub use prm::Prm;
pub use rrt::Rrt;
pub use rrt_star::RrtStar;
pub use rrt_star_connect::RrtStarConnect;

/// The shared contract of all planners.
///
/// `compute_path` drives the evaluator/expansion loop until the query is
/// solved or the budget runs out; `get_path` walks the found node sequence
/// and densifies it with the trajectory discretizer at the requested
/// resolutions.
pub trait MotionPlanner<const D: usize> {
    fn compute_path(
        &mut self,
        start: Config<D>,
        goal: Config<D>,
        num_nodes: usize,
        num_threads: usize,
    ) -> Result<(), PlanningError>;

    /// Runs one expansion batch of `num_nodes` samples across
    /// `num_threads` workers.
    fn expand(&mut self, num_nodes: usize, num_threads: usize);

    /// Node sequence of the found path, empty while no plan exists.
    fn get_path_nodes(&self) -> Vec<Arc<Node<D>>>;

    fn get_path(&self, pos_res: f64, ori_res: f64) -> Result<Vec<Config<D>>, PlanningError>;

    fn graph(&self) -> Arc<Graph<D>>;

    fn stats(&self) -> Arc<PlannerStats>;
}

/// Moves from `from` toward `toward` by at most `step_size` along the
/// straight line in configuration space.
pub(crate) fn steer<const D: usize>(
    from: &Config<D>,
    toward: &Config<D>,
    step_size: f64,
) -> Config<D> {
    let diff = *toward - *from;
    let dist = diff.norm_l2();
    if dist <= step_size {
        *toward
    } else {
        *from + diff * (step_size / dist)
    }
}

/// How one candidate node is produced from a random sample; the part that
/// differs between the tree planners.
pub(crate) trait ExpandPolicy<const D: usize>: Sync {
    fn compute_node(&self, rand: Config<D>) -> Option<Arc<Node<D>>>;

    /// The graph freshly computed nodes are inserted into.
    fn graph(&self) -> &Arc<Graph<D>>;
}

fn worker_loop<const D: usize>(
    sampling: &mut Box<dyn Sampling<D>>,
    count: usize,
    policy: &impl ExpandPolicy<D>,
    stats: &PlannerStats,
) {
    for _ in 0..count {
        stats.samples_drawn.increment();
        let Some(rand) = sampling.sample() else {
            stats.samples_rejected.increment();
            continue;
        };
        match policy.compute_node(rand) {
            Some(node) => {
                policy.graph().add_node(node);
                stats.nodes_created.increment();
            }
            None => stats.samples_rejected.increment(),
        }
    }
}

/// State and machinery shared by the tree planners: the plug-in set, the
/// init/goal bookkeeping and the threaded expansion loop.
pub(crate) struct TreePlannerBase<const D: usize> {
    pub environment: Arc<Environment<D>>,
    pub graph: Arc<Graph<D>>,
    pub metric: Arc<dyn DistanceMetric<D>>,
    pub validity: Arc<dyn ValidityChecker<D>>,
    pub trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    pub sampling: Box<dyn Sampling<D>>,
    pub evaluator: Box<dyn Evaluator<D>>,
    pub path_modifier: Option<Arc<dyn PathModifier<D>>>,
    pub stats: Arc<PlannerStats>,
    pub step_size: f64,
    pub sampler_seed: u64,
    pub init_node: Option<Arc<Node<D>>>,
    pub goal_node: Option<Arc<Node<D>>>,
    pub path_planned: bool,
    pub rewire_lock: Arc<Mutex<()>>,
    epoch: AtomicU64,
}

impl<const D: usize> TreePlannerBase<D> {
    pub fn new(
        environment: Arc<Environment<D>>,
        options: PlannerOptions<D>,
        graph: Arc<Graph<D>>,
    ) -> Self {
        let step_size = options.step_size;
        let sampler_seed = seed_from_str(&options.sampler_seed);
        TreePlannerBase {
            environment,
            graph,
            metric: options.metric,
            validity: options.validity,
            trajectory: options.trajectory,
            sampling: options.sampling,
            evaluator: options.evaluator,
            path_modifier: options.path_modifier,
            stats: Arc::new(PlannerStats::new()),
            step_size,
            sampler_seed,
            init_node: None,
            goal_node: None,
            path_planned: false,
            rewire_lock: Arc::new(Mutex::new(())),
            epoch: AtomicU64::new(0),
        }
    }

    /// Installs `start` as the tree root.
    ///
    /// Repeated calls with the same start keep the tree; a different start
    /// resets the shared graph. An invalid start leaves no state behind.
    pub fn set_init_node(&mut self, start: Config<D>) -> Result<(), PlanningError> {
        if let Some(init) = &self.init_node {
            if *init.config() == start {
                debug!("equal start configuration, tree will be expanded");
                self.evaluator.initialize();
                return Ok(());
            }
            info!("new start configuration, a new tree will be created");
            self.graph.reset();
            self.init_node = None;
            self.goal_node = None;
            self.path_planned = false;
        }

        if !self.validity.check(&start) {
            warn!("start configuration could not be connected");
            return Err(PlanningError::InvalidStart);
        }

        self.evaluator.initialize();
        self.sampling.set_origin(&start);
        let init = Node::new(start);
        self.graph.add_node(init.clone());
        self.init_node = Some(init);
        Ok(())
    }

    pub fn check_goal(&self, goal: &Config<D>) -> Result<(), PlanningError> {
        if self.validity.check(goal) {
            Ok(())
        } else {
            error!("goal configuration is not valid");
            Err(PlanningError::InvalidGoal)
        }
    }

    /// Consumes `num_nodes` samples spread over `num_threads` workers, each
    /// worker drawing from its own forked sampling stream.
    pub fn expand_batch(
        &self,
        num_nodes: usize,
        num_threads: usize,
        policy: &(impl ExpandPolicy<D> + Sync),
    ) {
        let workers = num_threads.max(1);
        let per_worker = (num_nodes / workers).max(1);
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);

        if workers == 1 {
            let mut sampling = self.sampling.fork(epoch);
            worker_loop(&mut sampling, per_worker, policy, &self.stats);
            return;
        }

        let streams: Vec<Box<dyn Sampling<D>>> = (0..workers)
            .map(|worker| {
                self.sampling
                    .fork(epoch * workers as u64 + worker as u64)
            })
            .collect();
        let stats = &self.stats;
        std::thread::scope(|scope| {
            for mut sampling in streams {
                scope.spawn(move || worker_loop(&mut sampling, per_worker, policy, stats));
            }
        });
    }

    /// Parent-pointer walk from the goal node to the root, reversed.
    pub fn path_nodes(&self) -> Vec<Arc<Node<D>>> {
        if !self.path_planned {
            return Vec::new();
        }
        let Some(goal) = &self.goal_node else {
            return Vec::new();
        };

        let mut nodes = vec![goal.clone()];
        let mut current = goal.parent();
        while let Some(node) = current {
            current = node.parent();
            nodes.push(node);
        }
        nodes.reverse();
        info!("path has {} nodes", nodes.len());
        nodes
    }

    pub fn path(&self, pos_res: f64, ori_res: f64) -> Result<Vec<Config<D>>, PlanningError> {
        if !self.path_planned {
            warn!("path is not complete");
            return Err(PlanningError::NoPathPlanned);
        }
        let mut nodes = self.path_nodes();
        if let Some(modifier) = &self.path_modifier {
            nodes = modifier.modify(nodes);
        }
        Ok(densify(&nodes, &*self.trajectory, pos_res, ori_res))
    }
}

/// Expands the node sequence into configurations at the requested
/// resolutions, endpoints included.
pub(crate) fn densify<const D: usize>(
    nodes: &[Arc<Node<D>>],
    trajectory: &dyn TrajectoryDiscretizer<D>,
    pos_res: f64,
    ori_res: f64,
) -> Vec<Config<D>> {
    let discretizer = trajectory.with_resolution(pos_res, ori_res);
    let mut path = Vec::new();
    if let Some(first) = nodes.first() {
        path.push(*first.config());
    }
    for pair in nodes.windows(2) {
        path.extend(discretizer.calc_traj_cont(pair[0].config(), pair[1].config()));
        path.push(*pair[1].config());
    }
    info!("path has {} points", path.len());
    path
}

/// Evaluator-driven expansion loop shared by the single-tree planners.
pub(crate) fn run_query<const D: usize, P: ExpandPolicy<D> + Sync>(
    base: &mut TreePlannerBase<D>,
    goal: Config<D>,
    num_nodes: usize,
    num_threads: usize,
    make_policy: impl Fn(&TreePlannerBase<D>) -> P,
) -> Result<(), PlanningError> {
    base.evaluator.set_query(vec![goal]);
    let mut iteration = 1usize;
    while !base.evaluator.evaluate() {
        debug!("expansion iteration {iteration}");
        iteration += 1;
        let policy = make_policy(base);
        base.expand_batch(num_nodes, num_threads, &policy);
    }
    Ok(())
}

/// Pose-goal expansion loop: expand until the pose evaluator fires, then
/// install the minimum-displacement node inside the tolerance band as the
/// goal node.
pub(crate) fn run_pose_query<const D: usize, P: ExpandPolicy<D> + Sync>(
    base: &mut TreePlannerBase<D>,
    goal_pose: Pose,
    tolerance: &(Pose, Pose),
    num_nodes: usize,
    num_threads: usize,
    make_policy: impl Fn(&TreePlannerBase<D>) -> P,
) -> Result<(), PlanningError> {
    base.evaluator.set_poses(vec![goal_pose]);
    let mut iteration = 1usize;
    while !base.evaluator.evaluate() {
        debug!("expansion iteration {iteration}");
        iteration += 1;
        let policy = make_policy(base);
        base.expand_batch(num_nodes, num_threads, &policy);
    }

    let mut best: Option<(Arc<Node<D>>, f64)> = None;
    for node in base.graph.nodes() {
        let pose = base.environment.robot.tcp_pose(node.config());
        if !pose_within_tolerance(&pose, &goal_pose, tolerance) {
            continue;
        }
        let mut displacement = 0.0;
        for i in 0..6 {
            let err = if i < 3 {
                pose[i] - goal_pose[i]
            } else {
                wrap_angle(pose[i] - goal_pose[i])
            };
            displacement += err * err;
        }
        if best.as_ref().map_or(true, |(_, d)| displacement < *d) {
            best = Some((node, displacement));
        }
    }

    match best {
        Some((node, _)) => {
            base.goal_node = Some(node);
            base.path_planned = true;
            info!("goal pose reached");
            Ok(())
        }
        None => {
            warn!("no configuration reached the goal pose");
            Err(PlanningError::NoConnection)
        }
    }
}
