use std::f64::consts::{FRAC_PI_4, PI};
use std::sync::Arc;
use std::time::Duration;

use nalgebra::Point3;

use pathplan::base::{Config, Graph};
use pathplan::environment::{Aabb, DhParameter, Environment, Pose, RobotModel, SerialRobot};
use pathplan::evaluator::{
    tree_config_or_time, ComposeEvaluator, ComposeOperation, Evaluator, TimeEvaluator,
    TreePoseEvaluator,
};
use pathplan::metric::{DistanceMetric, L2Metric};
use pathplan::planner::{MotionPlanner, PlannerOptions, RrtStar};
use pathplan::sampler::{seed_from_str, UniformSampler};
use pathplan::sampling::StraightSampling;
use pathplan::trajectory::{LinearTrajectory, TrajectoryDiscretizer};
use pathplan::validity::{BoundsChecker, ValidityChecker};

const JOINT_MIN: Config<6> = Config { values: [-PI; 6] };
const JOINT_MAX: Config<6> = Config { values: [PI; 6] };

fn arm() -> Arc<SerialRobot<6>> {
    Arc::new(
        SerialRobot::new(
            "arm6",
            JOINT_MIN,
            JOINT_MAX,
            [
                DhParameter::new(PI / 2.0, 0.0, 0.4),
                DhParameter::new(0.0, 0.41, 0.0),
                DhParameter::new(PI / 2.0, 0.0, 0.0),
                DhParameter::new(PI / 2.0, 0.0, 0.25),
                DhParameter::new(PI / 2.0, 0.0, 0.0),
                DhParameter::new(0.0, 0.0, 0.16),
            ],
        )
        .unwrap(),
    )
}

struct Setup {
    environment: Arc<Environment<6>>,
    robot: Arc<SerialRobot<6>>,
    validity: Arc<dyn ValidityChecker<6>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<6>>,
    metric: Arc<dyn DistanceMetric<6>>,
    graph: Arc<Graph<6>>,
}

fn joint_space_setup() -> Setup {
    let _ = env_logger::builder().is_test(true).try_init();
    let robot = arm();
    let workspace = Aabb::new(Point3::new(-2.0, -2.0, -2.0), Point3::new(2.0, 2.0, 2.0));
    let environment = Arc::new(Environment::new(workspace, robot.clone()));
    let validity: Arc<dyn ValidityChecker<6>> = Arc::new(BoundsChecker::new(&environment));
    let metric: Arc<dyn DistanceMetric<6>> = Arc::new(L2Metric);
    let trajectory: Arc<dyn TrajectoryDiscretizer<6>> = Arc::new(LinearTrajectory::new(
        0.1,
        0.1,
        environment.robot.dof_types(),
    ));
    let graph = Arc::new(Graph::new(1000, metric.clone()));
    Setup {
        environment,
        robot,
        validity,
        trajectory,
        metric,
        graph,
    }
}

fn star_planner(setup: &Setup, seed: &str, evaluator: Box<dyn Evaluator<6>>) -> RrtStar<6> {
    let sampler = UniformSampler::new(JOINT_MIN, JOINT_MAX, seed_from_str(seed));
    let options = PlannerOptions::new(
        setup.metric.clone(),
        setup.validity.clone(),
        setup.trajectory.clone(),
        Box::new(StraightSampling::new(Box::new(sampler))),
        evaluator,
    )
    .with_step_size(FRAC_PI_4)
    .with_sampler_seed(seed);
    RrtStar::new(setup.environment.clone(), options, setup.graph.clone())
}

fn assert_path_costs_consistent(graph: &Graph<6>) {
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
fn test_six_dof_plan_and_optimize() {
    let setup = joint_space_setup();
    let evaluator = tree_config_or_time(
        setup.graph.clone(),
        setup.metric.clone(),
        FRAC_PI_4 * 2.0,
        Duration::from_secs(120),
    );
    let mut planner = star_planner(&setup, "unit8", Box::new(evaluator));

    let start = Config::new([0.0; 6]);
    let goal = Config::new([1.0; 6]);
    let result = planner.compute_path(start, goal, 800, 1);
    assert!(result.is_ok(), "planning failed: {:?}", result.err());
    assert_path_costs_consistent(&planner.graph());

    let before = planner.goal_node().unwrap().path_cost();
    let mut last = before;
    for _ in 0..5 {
        planner.optimize(1, 500, 1).unwrap();
        let cost = planner.goal_node().unwrap().path_cost();
        // The best plan cost never increases while optimizing.
        assert!(cost <= last + 1e-9, "cost increased from {last} to {cost}");
        last = cost;
    }
    assert!(
        last <= before * 0.99,
        "optimization did not reduce the path cost: {before} -> {last}"
    );
    assert_path_costs_consistent(&planner.graph());

    // The reported path still starts and ends at the query configurations.
    let path = planner.get_path(0.1, 0.1).unwrap();
    assert_eq!(*path.first().unwrap(), start);
    assert_eq!(*path.last().unwrap(), goal);
}

#[test]
fn test_rewiring_keeps_tree_rooted() {
    let setup = joint_space_setup();
    let evaluator = tree_config_or_time(
        setup.graph.clone(),
        setup.metric.clone(),
        FRAC_PI_4,
        Duration::from_secs(60),
    );
    let mut planner = star_planner(&setup, "unit9", Box::new(evaluator));

    let start = Config::new([-0.5; 6]);
    let goal = Config::new([0.8; 6]);
    planner.compute_path(start, goal, 600, 2).unwrap();

    let nodes = planner.graph().nodes();
    let roots: Vec<_> = nodes.iter().filter(|n| n.is_root()).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(*roots[0].config(), start);

    // Every parent chain terminates at the root in finitely many steps.
    for node in &nodes {
        let mut hops = 0;
        let mut current = node.clone();
        while let Some(parent) = current.parent() {
            current = parent;
            hops += 1;
            assert!(hops <= nodes.len(), "cycle in parent chain");
        }
        assert!(Arc::ptr_eq(&current, roots[0]));
    }
}

#[test]
fn test_plan_to_workspace_pose() {
    let setup = joint_space_setup();
    let tolerance = (
        Pose::new(-0.5, -0.5, -0.5, -1.0, -1.0, -1.0),
        Pose::new(0.5, 0.5, 0.5, 1.0, 1.0, 1.0),
    );
    let pose_evaluator = TreePoseEvaluator::new(
        setup.graph.clone(),
        setup.robot.clone(),
        tolerance,
    );
    let evaluator = ComposeEvaluator::new(
        vec![
            Box::new(pose_evaluator),
            Box::new(TimeEvaluator::new(Duration::from_secs(120))),
        ],
        ComposeOperation::Or,
    );
    let mut planner = star_planner(&setup, "unit10", Box::new(evaluator));

    let start = Config::new([0.0; 6]);
    let goal_pose = setup.robot.tcp_pose(&Config::new([0.6, 0.4, -0.3, 0.5, -0.2, 0.8]));
    let result = planner.compute_path_to_pose(start, goal_pose, tolerance, 800, 1);
    assert!(result.is_ok(), "pose planning failed: {:?}", result.err());

    let path = planner.get_path(0.1, 0.1).unwrap();
    assert_eq!(*path.first().unwrap(), start);
    let reached = setup.robot.tcp_pose(path.last().unwrap());
    for i in 0..3 {
        assert!((reached[i] - goal_pose[i]).abs() <= 0.5 + 1e-9);
    }
}
