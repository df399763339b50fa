use std::sync::Arc;

use pathplan::base::{Config, Graph, Node};
use pathplan::metric::{DistanceMetric, L2Metric};
use pathplan::neighbor::KdTree;
use pathplan::sampler::{seed_from_str, Sampler, UniformSampler};

const MIN: Config<3> = Config {
    values: [0.0, 0.0, 0.0],
};
const MAX: Config<3> = Config {
    values: [100.0, 100.0, 100.0],
};

fn sample_configs(seed: &str, count: usize) -> Vec<Config<3>> {
    let mut sampler = UniformSampler::new(MIN, MAX, seed_from_str(seed));
    (0..count).map(|_| sampler.sample()).collect()
}

fn brute_force_nearest<'a>(
    configs: &'a [Config<3>],
    query: &Config<3>,
    metric: &dyn DistanceMetric<3>,
) -> (&'a Config<3>, f64) {
    configs
        .iter()
        .filter(|config| **config != *query)
        .map(|config| (config, metric.simple_dist(query, config)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .unwrap()
}

#[test]
fn test_nearest_matches_brute_force_over_fixed_insertions() {
    let metric: Arc<dyn DistanceMetric<3>> = Arc::new(L2Metric);
    let mut tree = KdTree::new(metric.clone());
    let configs = sample_configs("kdtree", 10_000);
    for config in &configs {
        tree.insert(Node::new(*config));
    }

    for query in sample_configs("queries", 1_000) {
        let found = tree.nearest(&query).expect("tree is not empty");
        let found_dist = metric.simple_dist(&query, found.config());
        let (_, brute_dist) = brute_force_nearest(&configs, &query, &*metric);
        assert!(
            (found_dist - brute_dist).abs() < 1e-12,
            "kd nearest {found_dist} deviates from brute force {brute_dist}"
        );
    }
}

#[test]
fn test_nearest_matches_brute_force_with_rebuilds() {
    // The graph rebuilds its tree sorted every 1024 insertions.
    let metric: Arc<dyn DistanceMetric<3>> = Arc::new(L2Metric);
    let graph = Graph::new(1024, metric.clone());
    let configs = sample_configs("kdtree-sorted", 10_000);
    for config in &configs {
        graph.add_node(Node::new(*config));
    }

    for query in sample_configs("queries-sorted", 1_000) {
        let found = graph.nearest(&query).expect("graph is not empty");
        let found_dist = metric.simple_dist(&query, found.config());
        let (_, brute_dist) = brute_force_nearest(&configs, &query, &*metric);
        assert!(
            (found_dist - brute_dist).abs() < 1e-12,
            "kd nearest {found_dist} deviates from brute force {brute_dist}"
        );
    }
}

#[test]
fn test_range_search_matches_brute_force() {
    let metric: Arc<dyn DistanceMetric<3>> = Arc::new(L2Metric);
    let mut tree = KdTree::new(metric.clone());
    let configs = sample_configs("ranges", 2_000);
    for config in &configs {
        tree.insert(Node::new(*config));
    }

    let radius = 12.0;
    for query in sample_configs("range-queries", 100) {
        let mut found: Vec<[f64; 3]> = tree
            .within(&query, radius)
            .iter()
            .map(|node| node.config().values)
            .collect();
        let mut expected: Vec<[f64; 3]> = configs
            .iter()
            .filter(|config| **config != query && metric.dist(&query, config) < radius)
            .map(|config| config.values)
            .collect();

        let ordering = |a: &[f64; 3], b: &[f64; 3]| a.partial_cmp(b).unwrap();
        found.sort_by(ordering);
        expected.sort_by(ordering);
        assert_eq!(found, expected);
    }
}

#[test]
fn test_nearest_never_returns_the_query_configuration() {
    let metric: Arc<dyn DistanceMetric<3>> = Arc::new(L2Metric);
    let mut tree = KdTree::new(metric);
    let configs = sample_configs("exclusion", 500);
    for config in &configs {
        tree.insert(Node::new(*config));
    }

    for query in configs.iter().take(100) {
        let found = tree.nearest(query).expect("tree has other nodes");
        assert_ne!(found.config(), query);
    }
}
