// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::json;

/// A named statistics observer attached to a planner. Collectors never
/// influence planning results.
pub trait StatsCollector: Send + Sync {
    fn name(&self) -> &str;

    /// Resets the collector to its initial state.
    fn initialize(&self);

    fn serialize(&self) -> serde_json::Value;
}

/// Accumulating wall-clock timer.
pub struct StatsTimeCollector {
    name: String,
    inner: Mutex<TimeInner>,
}

#[derive(Default)]
struct TimeInner {
    started: Option<Instant>,
    elapsed: Duration,
}

impl StatsTimeCollector {
    pub fn new(name: impl Into<String>) -> Self {
        StatsTimeCollector {
            name: name.into(),
            inner: Mutex::new(TimeInner::default()),
        }
    }

    pub fn start(&self) {
        self.inner.lock().started = Some(Instant::now());
    }

    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(started) = inner.started.take() {
            inner.elapsed += started.elapsed();
        }
    }

    pub fn elapsed(&self) -> Duration {
        let inner = self.inner.lock();
        match inner.started {
            Some(started) => inner.elapsed + started.elapsed(),
            None => inner.elapsed,
        }
    }
}

impl StatsCollector for StatsTimeCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) {
        *self.inner.lock() = TimeInner::default();
    }

    fn serialize(&self) -> serde_json::Value {
        json!({ "seconds": self.elapsed().as_secs_f64() })
    }
}

/// Monotonic event counter, callable from any worker thread.
pub struct StatsCountCollector {
    name: String,
    count: AtomicUsize,
}

impl StatsCountCollector {
    pub fn new(name: impl Into<String>) -> Self {
        StatsCountCollector {
            name: name.into(),
            count: AtomicUsize::new(0),
        }
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, amount: usize) {
        self.count.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl StatsCollector for StatsCountCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    fn serialize(&self) -> serde_json::Value {
        json!(self.count())
    }
}

/// The collector set every planner carries.
pub struct PlannerStats {
    pub planning_time: StatsTimeCollector,
    pub optimization_time: StatsTimeCollector,
    pub nodes_created: StatsCountCollector,
    pub samples_drawn: StatsCountCollector,
    pub samples_rejected: StatsCountCollector,
    pub rewires: StatsCountCollector,
}

impl PlannerStats {
    pub fn new() -> Self {
        PlannerStats {
            planning_time: StatsTimeCollector::new("planning time"),
            optimization_time: StatsTimeCollector::new("optimization time"),
            nodes_created: StatsCountCollector::new("nodes created"),
            samples_drawn: StatsCountCollector::new("samples drawn"),
            samples_rejected: StatsCountCollector::new("samples rejected"),
            rewires: StatsCountCollector::new("rewires"),
        }
    }

    fn collectors(&self) -> [&dyn StatsCollector; 6] {
        [
            &self.planning_time,
            &self.optimization_time,
            &self.nodes_created,
            &self.samples_drawn,
            &self.samples_rejected,
            &self.rewires,
        ]
    }
}

impl Default for PlannerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector for PlannerStats {
    fn name(&self) -> &str {
        "planner"
    }

    fn initialize(&self) {
        for collector in self.collectors() {
            collector.initialize();
        }
    }

    fn serialize(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for collector in self.collectors() {
            map.insert(collector.name().to_string(), collector.serialize());
        }
        serde_json::Value::Object(map)
    }
}
