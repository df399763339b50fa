// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::base::config::Config;

/// A graph node owning one configuration.
///
/// Tree links are asymmetric: children are held strongly, the parent weakly,
/// so the graph (which owns every node) is the only ownership root and parent
/// chains can never form reference cycles. Roadmap adjacency for PRM lives in
/// a separate edge list, weak in both directions for the same reason.
///
/// `path_cost` caches the sum of edge costs from the root. [`Node::rewire`]
/// keeps the cache consistent for the whole subtree when a parent changes.
pub struct Node<const D: usize> {
    config: Config<D>,
    inner: RwLock<NodeInner<D>>,
}

struct NodeInner<const D: usize> {
    parent: Option<(Weak<Node<D>>, f64)>,
    children: Vec<(Arc<Node<D>>, f64)>,
    edges: Vec<(Weak<Node<D>>, f64)>,
    path_cost: f64,
}

impl<const D: usize> Node<D> {
    /// Creates a root node with path cost zero.
    pub fn new(config: Config<D>) -> Arc<Self> {
        Arc::new(Node {
            config,
            inner: RwLock::new(NodeInner {
                parent: None,
                children: Vec::new(),
                edges: Vec::new(),
                path_cost: 0.0,
            }),
        })
    }

    /// Creates a node parented under `parent` with the given edge cost and
    /// registers it in the parent's children set.
    pub fn new_child(parent: &Arc<Node<D>>, config: Config<D>, edge_cost: f64) -> Arc<Self> {
        let node = Arc::new(Node {
            config,
            inner: RwLock::new(NodeInner {
                parent: Some((Arc::downgrade(parent), edge_cost)),
                children: Vec::new(),
                edges: Vec::new(),
                path_cost: parent.path_cost() + edge_cost,
            }),
        });
        parent.inner.write().children.push((node.clone(), edge_cost));
        node
    }

    pub fn config(&self) -> &Config<D> {
        &self.config
    }

    pub fn path_cost(&self) -> f64 {
        self.inner.read().path_cost
    }

    pub fn is_root(&self) -> bool {
        self.inner.read().parent.is_none()
    }

    pub fn parent(&self) -> Option<Arc<Node<D>>> {
        self.inner
            .read()
            .parent
            .as_ref()
            .and_then(|(weak, _)| weak.upgrade())
    }

    /// Parent together with the cost of the edge from the parent to this
    /// node.
    pub fn parent_edge(&self) -> Option<(Arc<Node<D>>, f64)> {
        self.inner
            .read()
            .parent
            .as_ref()
            .and_then(|(weak, cost)| weak.upgrade().map(|parent| (parent, *cost)))
    }

    /// Snapshot of the children set with edge costs.
    pub fn children(&self) -> Vec<(Arc<Node<D>>, f64)> {
        self.inner.read().children.clone()
    }

    /// Snapshot of the roadmap adjacency with edge costs.
    pub fn edges(&self) -> Vec<(Arc<Node<D>>, f64)> {
        self.inner
            .read()
            .edges
            .iter()
            .filter_map(|(weak, cost)| weak.upgrade().map(|node| (node, *cost)))
            .collect()
    }

    /// Adds a bidirectional roadmap edge between `a` and `b`.
    pub fn add_edge(a: &Arc<Node<D>>, b: &Arc<Node<D>>, cost: f64) {
        a.inner.write().edges.push((Arc::downgrade(b), cost));
        b.inner.write().edges.push((Arc::downgrade(a), cost));
    }

    /// Reassigns the parent of this node.
    ///
    /// Detaches the node from its old parent's children set, attaches it under
    /// `new_parent`, updates `path_cost` and propagates the resulting cost
    /// delta through the whole subtree so descendant caches stay exact.
    ///
    /// Callers racing other tree mutations must hold the planner's rewire
    /// lock.
    pub fn rewire(self: &Arc<Self>, new_parent: &Arc<Node<D>>, edge_cost: f64) {
        if let Some(old_parent) = self.parent() {
            old_parent
                .inner
                .write()
                .children
                .retain(|(child, _)| !Arc::ptr_eq(child, self));
        }

        let new_cost = new_parent.path_cost() + edge_cost;
        let delta = {
            let mut inner = self.inner.write();
            let delta = new_cost - inner.path_cost;
            inner.parent = Some((Arc::downgrade(new_parent), edge_cost));
            inner.path_cost = new_cost;
            delta
        };
        new_parent
            .inner
            .write()
            .children
            .push((self.clone(), edge_cost));

        self.propagate_cost_delta(delta);
    }

    /// Shifts the cached path cost of every descendant by `delta`.
    fn propagate_cost_delta(&self, delta: f64) {
        if delta == 0.0 {
            return;
        }
        let mut stack: Vec<Arc<Node<D>>> =
            self.inner.read().children.iter().map(|(c, _)| c.clone()).collect();
        while let Some(node) = stack.pop() {
            let mut inner = node.inner.write();
            inner.path_cost += delta;
            stack.extend(inner.children.iter().map(|(c, _)| c.clone()));
        }
    }
}

impl<const D: usize> std::fmt::Debug for Node<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("config", &self.config)
            .field("path_cost", &self.path_cost())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_cost_bookkeeping() {
        let root = Node::new(Config::new([0.0, 0.0]));
        let child = Node::new_child(&root, Config::new([1.0, 0.0]), 1.0);
        let grandchild = Node::new_child(&child, Config::new([2.0, 0.0]), 1.0);

        assert_eq!(root.path_cost(), 0.0);
        assert_eq!(child.path_cost(), 1.0);
        assert_eq!(grandchild.path_cost(), 2.0);
        assert!(root.is_root());
        assert!(!child.is_root());
        assert_eq!(root.children().len(), 1);
        assert!(Arc::ptr_eq(&grandchild.parent().unwrap(), &child));
    }

    #[test]
    fn test_rewire_moves_child_and_propagates() {
        let root = Node::new(Config::new([0.0, 0.0]));
        let a = Node::new_child(&root, Config::new([5.0, 0.0]), 5.0);
        let b = Node::new_child(&a, Config::new([6.0, 0.0]), 1.0);
        let c = Node::new_child(&b, Config::new([7.0, 0.0]), 1.0);
        let shortcut = Node::new_child(&root, Config::new([5.9, 0.1]), 2.0);

        assert_eq!(b.path_cost(), 6.0);
        b.rewire(&shortcut, 0.5);

        assert_eq!(b.path_cost(), 2.5);
        assert_eq!(c.path_cost(), 3.5);
        assert!(Arc::ptr_eq(&b.parent().unwrap(), &shortcut));
        assert!(a.children().is_empty());
        assert_eq!(shortcut.children().len(), 1);
    }

    #[test]
    fn test_roadmap_edges_are_bidirectional() {
        let a = Node::new(Config::new([0.0]));
        let b = Node::new(Config::new([1.0]));
        Node::add_edge(&a, &b, 1.0);
        assert_eq!(a.edges().len(), 1);
        assert_eq!(b.edges().len(), 1);
        assert!(Arc::ptr_eq(&a.edges()[0].0, &b));
    }
}
