// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use thiserror::Error;

/// Errors surfaced by the planners.
///
/// Rejected samples and invalid candidate edges inside the expansion loop are
/// discarded silently and never reach this type; only terminal conditions of
/// a whole query do.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanningError {
    /// The start configuration failed the validity check.
    #[error("start configuration is not valid")]
    InvalidStart,
    /// The goal configuration failed the validity check.
    #[error("goal configuration is not valid")]
    InvalidGoal,
    /// The goal could not be linked to the graph within the configured
    /// tolerance.
    #[error("goal could not be connected to the graph")]
    NoConnection,
    /// The expansion budget (batches, deadline or sampling attempts) ran out
    /// before a plan was found.
    #[error("planning budget exhausted before a plan was found")]
    BudgetExhausted,
    /// A path was requested before a plan was computed.
    #[error("no plan has been computed")]
    NoPathPlanned,
    /// The planner was driven outside its contract, e.g. with an
    /// uninitialised plug-in or a duplicate root.
    #[error("planner misuse: {0}")]
    Misuse(&'static str),
}

/// Errors raised while building environments and robot models.
#[derive(Debug, Error, PartialEq)]
pub enum EnvironmentError {
    #[error("lower bound {lower} exceeds upper bound {upper} on component {index}")]
    InvalidBound {
        index: usize,
        lower: f64,
        upper: f64,
    },
}
