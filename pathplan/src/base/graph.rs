// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::base::{Config, Node};
use crate::metric::DistanceMetric;
use crate::neighbor::KdTree;

/// Container of all planner nodes together with the KD-tree indexing their
/// configurations.
///
/// One lock guards both: mutations (insert, rebuild, reset) take the write
/// side, nearest/range queries the read side, so queries may run concurrently
/// with each other while structural changes publish atomically.
///
/// `sort_count` controls the rebuild policy: whenever the node count passes a
/// multiple of it, the KD-tree is rebuilt balanced from the full node list;
/// in between, new configurations are appended as plain leaves. A
/// `sort_count` of zero disables rebuilds.
pub struct Graph<const D: usize> {
    inner: RwLock<GraphInner<D>>,
    metric: Arc<dyn DistanceMetric<D>>,
    sort_count: usize,
}

struct GraphInner<const D: usize> {
    nodes: Vec<Arc<Node<D>>>,
    kd_tree: KdTree<D>,
}

impl<const D: usize> Graph<D> {
    pub fn new(sort_count: usize, metric: Arc<dyn DistanceMetric<D>>) -> Self {
        Graph {
            inner: RwLock::new(GraphInner {
                nodes: Vec::new(),
                kd_tree: KdTree::new(metric.clone()),
            }),
            metric,
            sort_count,
        }
    }

    /// Appends a node and indexes its configuration, rebuilding the KD-tree
    /// when the sort threshold is crossed.
    pub fn add_node(&self, node: Arc<Node<D>>) {
        let mut inner = self.inner.write();
        inner.kd_tree.insert(node.clone());
        inner.nodes.push(node);
        if self.auto_sort() && inner.nodes.len() % self.sort_count == 0 {
            let GraphInner { nodes, kd_tree } = &mut *inner;
            kd_tree.rebuild(nodes);
            info!("KD-tree rebuilt sorted with {} nodes", nodes.len());
        }
    }

    /// Node whose configuration is closest to `config` under the metric,
    /// excluding an exact match of `config` itself.
    pub fn nearest(&self, config: &Config<D>) -> Option<Arc<Node<D>>> {
        self.inner.read().kd_tree.nearest(config)
    }

    /// All nodes with metric distance to `config` strictly below `range`.
    pub fn near(&self, config: &Config<D>, range: f64) -> Vec<Arc<Node<D>>> {
        self.inner.read().kd_tree.within(config, range)
    }

    pub fn size(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Snapshot of the node list.
    pub fn nodes(&self) -> Vec<Arc<Node<D>>> {
        self.inner.read().nodes.clone()
    }

    /// A fresh, empty graph sharing this graph's neighbor-finder
    /// configuration.
    pub fn empty_clone(&self) -> Graph<D> {
        Graph::new(self.sort_count, self.metric.clone())
    }

    /// Drops every node and the index, keeping the configuration. Used when a
    /// planner's start is replaced while evaluators still hold the graph.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.nodes.clear();
        inner.kd_tree = KdTree::new(self.metric.clone());
    }

    pub fn sort_count(&self) -> usize {
        self.sort_count
    }

    pub fn auto_sort(&self) -> bool {
        self.sort_count != 0
    }

    pub fn metric(&self) -> &Arc<dyn DistanceMetric<D>> {
        &self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::L2Metric;

    fn graph_with(sort_count: usize, points: &[[f64; 2]]) -> Graph<2> {
        let graph = Graph::new(sort_count, Arc::new(L2Metric));
        for point in points {
            graph.add_node(Node::new(Config::new(*point)));
        }
        graph
    }

    #[test]
    fn test_add_and_query() {
        let graph = graph_with(0, &[[0.0, 0.0], [10.0, 0.0], [0.5, 0.5]]);
        assert_eq!(graph.size(), 3);

        let nearest = graph.nearest(&Config::new([0.4, 0.4])).unwrap();
        assert_eq!(nearest.config().values, [0.5, 0.5]);

        let near = graph.near(&Config::new([0.0, 0.0]), 1.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].config().values, [0.5, 0.5]);
    }

    #[test]
    fn test_sorted_rebuild_preserves_queries() {
        // sort_count 8 forces several rebuilds while inserting 32 nodes.
        let points: Vec<[f64; 2]> = (0..32).map(|i| [(i * 13 % 31) as f64, i as f64]).collect();
        let graph = graph_with(8, &points);
        assert_eq!(graph.size(), 32);

        let query = Config::new([7.3, 11.8]);
        let brute = graph
            .nodes()
            .into_iter()
            .min_by(|a, b| {
                let da = (*a.config() - query).sq_norm();
                let db = (*b.config() - query).sq_norm();
                da.partial_cmp(&db).unwrap()
            })
            .unwrap();
        assert_eq!(graph.nearest(&query).unwrap().config(), brute.config());
    }

    #[test]
    fn test_empty_clone_and_reset() {
        let graph = graph_with(4, &[[1.0, 1.0], [2.0, 2.0]]);
        let clone = graph.empty_clone();
        assert_eq!(clone.size(), 0);
        assert_eq!(clone.sort_count(), 4);

        graph.reset();
        assert_eq!(graph.size(), 0);
        assert!(graph.nearest(&Config::new([1.0, 1.0])).is_none());
    }
}
