// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

pub mod config;
pub mod error;
pub mod graph;
pub mod node;

pub use config::{Config, DofType};
pub use error::PlanningError;
pub use graph::Graph;
pub use node::Node;
