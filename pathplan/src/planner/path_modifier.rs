// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::Arc;

use crate::base::Node;
use crate::trajectory::TrajectoryDiscretizer;
use crate::validity::ValidityChecker;

/// Post-processes the node sequence of a found path before densification.
pub trait PathModifier<const D: usize>: Send + Sync {
    fn modify(&self, nodes: Vec<Arc<Node<D>>>) -> Vec<Arc<Node<D>>>;
}

/// Node-cut shortening: repeatedly skips intermediate nodes whose removal
/// still yields a valid connecting trajectory, greedily taking the furthest
/// reachable node first.
pub struct NodeCutPathModifier<const D: usize> {
    validity: Arc<dyn ValidityChecker<D>>,
    trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
}

impl<const D: usize> NodeCutPathModifier<D> {
    pub fn new(
        validity: Arc<dyn ValidityChecker<D>>,
        trajectory: Arc<dyn TrajectoryDiscretizer<D>>,
    ) -> Self {
        NodeCutPathModifier {
            validity,
            trajectory,
        }
    }
}

impl<const D: usize> PathModifier<D> for NodeCutPathModifier<D> {
    fn modify(&self, nodes: Vec<Arc<Node<D>>>) -> Vec<Arc<Node<D>>> {
        if nodes.len() < 3 {
            return nodes;
        }

        let mut shortened = vec![nodes[0].clone()];
        let mut current = 0;
        while current + 1 < nodes.len() {
            let mut next = current + 1;
            for candidate in (current + 2..nodes.len()).rev() {
                let trajectory = self
                    .trajectory
                    .calc_traj_bin(nodes[current].config(), nodes[candidate].config());
                if self.validity.check_trajectory(&trajectory) {
                    next = candidate;
                    break;
                }
            }
            shortened.push(nodes[next].clone());
            current = next;
        }
        shortened
    }
}
