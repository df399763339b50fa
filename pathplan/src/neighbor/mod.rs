// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

pub mod kd_tree;

pub use kd_tree::KdTree;
