use std::sync::Arc;
use std::time::Duration;

use nalgebra::Point3;

use pathplan::base::{Config, Graph, Node, PlanningError};
use pathplan::environment::{Aabb, Environment, MobileRobot, Obstacle, RobotModel};
use pathplan::evaluator::tree_config_or_time;
use pathplan::metric::{DistanceMetric, L2Metric};
use pathplan::planner::{MotionPlanner, NodeCutPathModifier, PlannerOptions, Rrt};
use pathplan::sampler::{seed_from_str, UniformSampler};
use pathplan::sampling::StraightSampling;
use pathplan::trajectory::{LinearTrajectory, TrajectoryDiscretizer};
use pathplan::validity::{AabbChecker, BoundsChecker, ValidityChecker};

const MIN: Config<2> = Config {
    values: [0.0, 0.0],
};
const MAX: Config<2> = Config {
    values: [1000.0, 1000.0],
};

fn planar_environment(obstacles: Vec<Obstacle>) -> Arc<Environment<2>> {
    let robot = MobileRobot::point("dot", MIN, MAX).unwrap();
    let workspace = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1000.0, 1000.0, 0.0));
    let mut environment = Environment::new(workspace, Arc::new(robot));
    for obstacle in obstacles {
        environment.add_obstacle(obstacle);
    }
    Arc::new(environment)
}

fn wall() -> Obstacle {
    Obstacle::new(
        "wall",
        Aabb::new(Point3::new(400.0, 0.0, -1.0), Point3::new(600.0, 900.0, 1.0)),
    )
}

struct Setup {
    environment: Arc<Environment<2>>,
    validity: Arc<dyn ValidityChecker<2>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<2>>,
    metric: Arc<dyn DistanceMetric<2>>,
    graph: Arc<Graph<2>>,
}

fn planar_setup(obstacles: Vec<Obstacle>) -> Setup {
    let _ = env_logger::builder().is_test(true).try_init();
    let environment = planar_environment(obstacles);
    let validity: Arc<dyn ValidityChecker<2>> = if environment.obstacles.is_empty() {
        Arc::new(BoundsChecker::new(&environment))
    } else {
        Arc::new(AabbChecker::new(&environment))
    };
    let metric: Arc<dyn DistanceMetric<2>> = Arc::new(L2Metric);
    let trajectory: Arc<dyn TrajectoryDiscretizer<2>> = Arc::new(LinearTrajectory::new(
        1.0,
        0.1,
        environment.robot.dof_types(),
    ));
    let graph = Arc::new(Graph::new(500, metric.clone()));
    Setup {
        environment,
        validity,
        trajectory,
        metric,
        graph,
    }
}

fn rrt_planner(setup: &Setup, seed: &str, step_size: f64, timeout: Duration, shorten: bool) -> Rrt<2> {
    let sampler = UniformSampler::new(MIN, MAX, seed_from_str(seed));
    let sampling = StraightSampling::new(Box::new(sampler));
    let evaluator = tree_config_or_time(
        setup.graph.clone(),
        setup.metric.clone(),
        step_size,
        timeout,
    );
    let mut options = PlannerOptions::new(
        setup.metric.clone(),
        setup.validity.clone(),
        setup.trajectory.clone(),
        Box::new(sampling),
        Box::new(evaluator),
    )
    .with_step_size(step_size)
    .with_sampler_seed(seed);
    if shorten {
        options = options.with_path_modifier(Arc::new(NodeCutPathModifier::new(
            setup.validity.clone(),
            setup.trajectory.clone(),
        )));
    }
    Rrt::new(setup.environment.clone(), options, setup.graph.clone())
}

fn path_length(path: &[Config<2>]) -> f64 {
    path.windows(2)
        .map(|pair| (pair[1] - pair[0]).norm_l2())
        .sum()
}

fn assert_path_costs_consistent(graph: &Graph<2>) {
    for node in graph.nodes() {
        let mut expected = 0.0;
        let mut current = node.clone();
        while let Some((parent, edge_cost)) = current.parent_edge() {
            expected += edge_cost;
            current = parent;
        }
        assert!(
            (node.path_cost() - expected).abs() < 1e-9,
            "cached path cost {} deviates from chain sum {}",
            node.path_cost(),
            expected
        );
    }
}

#[test]
fn test_free_space_path_within_length_bound() {
    let setup = planar_setup(Vec::new());
    let mut planner = rrt_planner(&setup, "unit1", 30.0, Duration::from_secs(60), true);

    let start = Config::new([10.0, 10.0]);
    let goal = Config::new([990.0, 990.0]);
    let result = planner.compute_path(start, goal, 2000, 1);
    assert!(result.is_ok(), "planning failed: {:?}", result.err());

    let path = planner.get_path(1.0, 0.1).unwrap();
    assert_eq!(*path.first().unwrap(), start);
    assert_eq!(*path.last().unwrap(), goal);
    assert!(
        path_length(&path) <= 1500.0,
        "path length {} exceeds bound",
        path_length(&path)
    );

    assert_path_costs_consistent(&planner.graph());
}

#[test]
fn test_wall_path_avoids_obstacle() {
    let setup = planar_setup(vec![wall()]);
    let mut planner = rrt_planner(&setup, "unit2", 30.0, Duration::from_secs(120), false);

    let start = Config::new([50.0, 50.0]);
    let goal = Config::new([950.0, 50.0]);
    let result = planner.compute_path(start, goal, 4000, 1);
    assert!(result.is_ok(), "planning failed: {:?}", result.err());

    let path = planner.get_path(1.0, 0.1).unwrap();
    for config in &path {
        let inside_wall = config[0] >= 400.0
            && config[0] <= 600.0
            && config[1] >= 0.0
            && config[1] <= 900.0;
        assert!(!inside_wall, "path point {:?} intersects the wall", config);
    }
    assert_eq!(*path.first().unwrap(), start);
    assert_eq!(*path.last().unwrap(), goal);
}

#[test]
fn test_single_worker_runs_are_deterministic() {
    let start = Config::new([10.0, 10.0]);
    let goal = Config::new([990.0, 990.0]);

    let mut paths = Vec::new();
    for _ in 0..2 {
        let setup = planar_setup(Vec::new());
        let mut planner = rrt_planner(&setup, "determinism", 30.0, Duration::from_secs(60), false);
        planner.compute_path(start, goal, 2000, 1).unwrap();
        paths.push(planner.get_path(1.0, 0.1).unwrap());
    }
    assert_eq!(paths[0], paths[1]);
}

#[test]
fn test_start_equals_goal_yields_single_configuration() {
    let setup = planar_setup(Vec::new());
    let mut planner = rrt_planner(&setup, "unit3", 30.0, Duration::from_secs(10), false);

    let start = Config::new([500.0, 500.0]);
    assert!(planner.compute_path(start, start, 100, 1).is_ok());

    let path = planner.get_path(1.0, 0.1).unwrap();
    assert_eq!(path, vec![start]);
    assert_eq!(path_length(&path), 0.0);
}

#[test]
fn test_invalid_start_leaves_graph_empty() {
    let setup = planar_setup(Vec::new());
    let mut planner = rrt_planner(&setup, "unit4", 30.0, Duration::from_secs(10), false);

    let result = planner.compute_path(Config::new([-5.0, 10.0]), Config::new([500.0, 500.0]), 100, 1);
    assert_eq!(result, Err(PlanningError::InvalidStart));
    assert_eq!(planner.graph().size(), 0);
}

#[test]
fn test_invalid_goal_keeps_tree_reusable() {
    let setup = planar_setup(Vec::new());
    let mut planner = rrt_planner(&setup, "unit5", 30.0, Duration::from_secs(30), false);

    let start = Config::new([10.0, 10.0]);
    let result = planner.compute_path(start, Config::new([1500.0, 500.0]), 100, 1);
    assert_eq!(result, Err(PlanningError::InvalidGoal));
    // The init node survives an invalid goal.
    assert_eq!(planner.graph().size(), 1);

    let result = planner.compute_path(start, Config::new([400.0, 400.0]), 1000, 1);
    assert!(result.is_ok(), "replanning failed: {:?}", result.err());
}

#[test]
fn test_new_start_resets_the_tree() {
    let setup = planar_setup(Vec::new());
    let mut planner = rrt_planner(&setup, "unit6", 30.0, Duration::from_secs(30), false);

    let start = Config::new([10.0, 10.0]);
    let goal = Config::new([300.0, 300.0]);
    planner.compute_path(start, goal, 500, 1).unwrap();
    let grown_size = planner.graph().size();
    assert!(grown_size > 1);

    // Same start again: the tree is kept.
    planner.compute_path(start, goal, 500, 1).unwrap();
    assert!(planner.graph().size() >= grown_size);

    // A different start clears the graph before expanding again.
    let other_start = Config::new([900.0, 900.0]);
    planner.compute_path(other_start, goal, 500, 1).unwrap();
    let nodes = planner.graph().nodes();
    assert_eq!(*nodes[0].config(), other_start);
    assert!(nodes.iter().all(|n| *n.config() != start));
}

#[test]
fn test_multi_worker_expansion_grows_one_tree() {
    let setup = planar_setup(vec![wall()]);
    let mut planner = rrt_planner(&setup, "unit7", 30.0, Duration::from_secs(120), false);

    let start = Config::new([50.0, 50.0]);
    let goal = Config::new([950.0, 50.0]);
    let result = planner.compute_path(start, goal, 4000, 4);
    assert!(result.is_ok(), "planning failed: {:?}", result.err());
    assert_path_costs_consistent(&planner.graph());

    // Every non-root node hangs off the single root.
    let nodes = planner.graph().nodes();
    let roots: Vec<&Arc<Node<2>>> = nodes.iter().filter(|n| n.is_root()).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(*roots[0].config(), start);
}
