use std::sync::Arc;
use std::time::Duration;

use nalgebra::Point3;

use pathplan::base::{Config, Graph, PlanningError};
use pathplan::environment::{Aabb, Environment, MobileRobot, Obstacle, RobotModel};
use pathplan::evaluator::{ComposeEvaluator, ComposeOperation, PrmConnectEvaluator, TimeEvaluator};
use pathplan::metric::{DistanceMetric, L2Metric};
use pathplan::planner::{MotionPlanner, PlannerOptions, Prm};
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

fn prm_planner(obstacles: Vec<Obstacle>, seed: &str, radius: f64) -> Prm<2> {
    let robot = MobileRobot::point("dot", MIN, MAX).unwrap();
    let workspace = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1000.0, 1000.0, 0.0));
    let mut environment = Environment::new(workspace, Arc::new(robot));
    for obstacle in obstacles {
        environment.add_obstacle(obstacle);
    }
    let environment = Arc::new(environment);

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

    let evaluator = ComposeEvaluator::new(
        vec![
            Box::new(PrmConnectEvaluator::new(
                graph.clone(),
                validity.clone(),
                trajectory.clone(),
                radius,
            )),
            Box::new(TimeEvaluator::new(Duration::from_secs(120))),
        ],
        ComposeOperation::Or,
    );

    let sampler = UniformSampler::new(MIN, MAX, seed_from_str(seed));
    let options = PlannerOptions::new(
        metric,
        validity,
        trajectory,
        Box::new(StraightSampling::new(Box::new(sampler))),
        Box::new(evaluator),
    )
    .with_sampler_seed(seed)
    .with_prm_radius(radius);
    Prm::new(environment, options, graph)
}

fn wall() -> Obstacle {
    Obstacle::new(
        "wall",
        Aabb::new(Point3::new(400.0, 0.0, -1.0), Point3::new(600.0, 900.0, 1.0)),
    )
}

#[test]
fn test_roadmap_path_around_wall() {
    let mut planner = prm_planner(vec![wall()], "unit13", 60.0);

    let start = Config::new([50.0, 50.0]);
    let goal = Config::new([950.0, 50.0]);
    let result = planner.compute_path(start, goal, 2000, 1);
    assert!(result.is_ok(), "planning failed: {:?}", result.err());

    let path = planner.get_path(1.0, 0.1).unwrap();
    assert_eq!(*path.first().unwrap(), start);
    assert_eq!(*path.last().unwrap(), goal);
    for config in &path {
        let inside_wall = config[0] >= 400.0
            && config[0] <= 600.0
            && config[1] >= 0.0
            && config[1] <= 900.0;
        assert!(!inside_wall, "path point {:?} intersects the wall", config);
    }

    // Roadmap adjacency is bidirectional along the reported node sequence.
    let nodes = planner.get_path_nodes();
    for pair in nodes.windows(2) {
        let forward = pair[0]
            .edges()
            .iter()
            .any(|(neighbor, _)| Arc::ptr_eq(neighbor, &pair[1]));
        let backward = pair[1]
            .edges()
            .iter()
            .any(|(neighbor, _)| Arc::ptr_eq(neighbor, &pair[0]));
        assert!(forward && backward, "roadmap edge missing along the path");
    }
}

#[test]
fn test_parallel_roadmap_build() {
    let mut planner = prm_planner(Vec::new(), "unit14", 80.0);

    let start = Config::new([100.0, 100.0]);
    let goal = Config::new([900.0, 900.0]);
    let result = planner.compute_path(start, goal, 2000, 4);
    assert!(result.is_ok(), "planning failed: {:?}", result.err());
    assert!(planner.graph().size() > 2);

    let path = planner.get_path(1.0, 0.1).unwrap();
    assert_eq!(*path.first().unwrap(), start);
    assert_eq!(*path.last().unwrap(), goal);
}

#[test]
fn test_unreachable_goal_reports_no_connection() {
    // A box sealed around the goal: the roadmap can never link it.
    let cage = Obstacle::new(
        "cage",
        Aabb::new(Point3::new(880.0, 880.0, -1.0), Point3::new(1000.0, 1000.0, 1.0)),
    );
    let mut planner = prm_planner(vec![cage], "unit15", 40.0);

    let start = Config::new([100.0, 100.0]);
    let goal = Config::new([940.0, 940.0]);
    let result = planner.compute_path(start, goal, 500, 1);
    assert!(matches!(
        result,
        Err(PlanningError::InvalidGoal) | Err(PlanningError::NoConnection)
    ));
}
