// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use crate::base::{Config, Node};
use crate::metric::DistanceMetric;

/// KD-tree over the live configurations of a graph.
///
/// Split axes cycle deterministically with depth: the root splits on axis 0,
/// nodes at depth `k` on `k mod D`, both for incremental appends and for the
/// balanced rebuild. All comparisons run in the metric's `simple_dist` space.
///
/// The tree itself is not synchronised; the owning graph sequences appends
/// and rebuilds against queries with its own lock.
pub struct KdTree<const D: usize> {
    root: Option<Box<KdTreeNode<D>>>,
    metric: Arc<dyn DistanceMetric<D>>,
}

struct KdTreeNode<const D: usize> {
    config: Config<D>,
    node: Arc<Node<D>>,
    axis: usize,
    value: f64,
    left: Option<Box<KdTreeNode<D>>>,
    right: Option<Box<KdTreeNode<D>>>,
}

impl<const D: usize> KdTreeNode<D> {
    fn new(node: Arc<Node<D>>, axis: usize) -> Box<Self> {
        let config = *node.config();
        Box::new(KdTreeNode {
            config,
            node,
            axis,
            value: config[axis],
            left: None,
            right: None,
        })
    }
}

impl<const D: usize> KdTree<D> {
    pub fn new(metric: Arc<dyn DistanceMetric<D>>) -> Self {
        KdTree { root: None, metric }
    }

    /// Builds a balanced tree from `nodes` in one pass.
    pub fn sorted(metric: Arc<dyn DistanceMetric<D>>, nodes: &[Arc<Node<D>>]) -> Self {
        let mut tree = KdTree::new(metric);
        tree.rebuild(nodes);
        tree
    }

    /// Discards the current tree and rebuilds it balanced from `nodes`:
    /// sort by the split axis, take the median as the subtree root, recurse
    /// with the next axis.
    pub fn rebuild(&mut self, nodes: &[Arc<Node<D>>]) {
        let mut nodes: Vec<Arc<Node<D>>> = nodes.to_vec();
        self.root = Self::build_sorted(&mut nodes, 0);
    }

    fn build_sorted(nodes: &mut [Arc<Node<D>>], axis: usize) -> Option<Box<KdTreeNode<D>>> {
        if nodes.is_empty() {
            return None;
        }
        nodes.sort_by(|a, b| {
            a.config()[axis]
                .partial_cmp(&b.config()[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let median = nodes.len() / 2;
        let mut kd_node = KdTreeNode::new(nodes[median].clone(), axis);

        let next_axis = (axis + 1) % D;
        let (left, rest) = nodes.split_at_mut(median);
        kd_node.left = Self::build_sorted(left, next_axis);
        kd_node.right = Self::build_sorted(&mut rest[1..], next_axis);
        Some(kd_node)
    }

    /// Appends a node as a plain leaf, descending on each visited node's
    /// split axis; the leaf's axis is the depth reached modulo `D`.
    pub fn insert(&mut self, node: Arc<Node<D>>) {
        let config = *node.config();
        let mut depth = 0;
        let mut slot = &mut self.root;
        loop {
            match slot {
                Some(kd_node) => {
                    slot = if config[kd_node.axis] < kd_node.value {
                        &mut kd_node.left
                    } else {
                        &mut kd_node.right
                    };
                    depth += 1;
                }
                None => {
                    *slot = Some(KdTreeNode::new(node, depth % D));
                    return;
                }
            }
        }
    }

    /// Returns the node whose configuration minimises the metric's
    /// `simple_dist` to `config`, excluding nodes whose configuration equals
    /// `config` exactly.
    pub fn nearest(&self, config: &Config<D>) -> Option<Arc<Node<D>>> {
        let root = self.root.as_deref()?;
        let mut best: Option<&KdTreeNode<D>> = None;
        let mut best_dist = f64::INFINITY;
        self.nearest_search(config, root, &mut best, &mut best_dist);
        best.map(|kd_node| kd_node.node.clone())
    }

    fn nearest_search<'a>(
        &self,
        config: &Config<D>,
        node: &'a KdTreeNode<D>,
        best: &mut Option<&'a KdTreeNode<D>>,
        best_dist: &mut f64,
    ) {
        let dist = self.metric.simple_dist(config, &node.config);
        if dist < *best_dist && node.config != *config {
            *best_dist = dist;
            *best = Some(node);
        }

        let gap = self
            .metric
            .simplify_dist(self.metric.axis_dist(node.axis, config[node.axis] - node.value));
        let (first, second) = if config[node.axis] <= node.value {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };
        if let Some(child) = first {
            self.nearest_search(config, child, best, best_dist);
        }
        if let Some(child) = second {
            if gap < *best_dist {
                self.nearest_search(config, child, best, best_dist);
            }
        }
    }

    /// Returns every node whose metric distance to `config` is strictly less
    /// than `range`, excluding exact matches of `config`.
    pub fn within(&self, config: &Config<D>, range: f64) -> Vec<Arc<Node<D>>> {
        let mut result = Vec::new();
        if let Some(root) = self.root.as_deref() {
            let simple_range = self.metric.simplify_dist(range);
            self.range_search(config, root, range, simple_range, &mut result);
        }
        result
    }

    fn range_search(
        &self,
        config: &Config<D>,
        node: &KdTreeNode<D>,
        range: f64,
        simple_range: f64,
        result: &mut Vec<Arc<Node<D>>>,
    ) {
        if self.metric.simple_dist(config, &node.config) < simple_range && node.config != *config {
            result.push(node.node.clone());
        }

        let descend_left = self.metric.axis_dist(node.axis, config[node.axis] - node.value) < range
            || config[node.axis] < node.value;
        let descend_right = self.metric.axis_dist(node.axis, config[node.axis] - node.value)
            < range
            || config[node.axis] >= node.value;
        if descend_left {
            if let Some(child) = &node.left {
                self.range_search(config, child, range, simple_range, result);
            }
        }
        if descend_right {
            if let Some(child) = &node.right {
                self.range_search(config, child, range, simple_range, result);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}
