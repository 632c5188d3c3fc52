//! Bounded history of chart samples derived from snapshots.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::types::Snapshot;
use crate::view::clamp_percent;

/// Number of samples kept for charts (one per tick, ~1 minute).
pub const HISTORY_CAPACITY: usize = 60;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    dq.push_back(v);
    while dq.len() > cap {
        dq.pop_front();
    }
}

/// One reduced sample, as plotted by the CPU/memory and network charts.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    /// Wall-clock label taken when the snapshot was received.
    pub time: String,
    /// percent, clamped to 0..=100
    pub cpu: f32,
    pub memory: f32,
    /// bytes/sec
    pub network_in: f64,
    pub network_out: f64,
}

impl HistoryPoint {
    pub fn from_snapshot(s: &Snapshot, received_at: DateTime<Local>) -> Self {
        Self {
            time: received_at.format("%H:%M:%S").to_string(),
            cpu: clamp_percent(s.cpu.overall),
            memory: clamp_percent(s.memory.percent),
            network_in: s.network.bytes_recv_rate,
            network_out: s.network.bytes_sent_rate,
        }
    }
}

/// FIFO of [`HistoryPoint`]s, oldest first, never longer than its capacity.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    cap: usize,
}

impl HistoryBuffer {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            points: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn append(&mut self, point: HistoryPoint) {
        push_capped(&mut self.points, point, self.cap);
    }

    /// Immutable copy of the current contents, oldest to newest.
    pub fn snapshot(&self) -> Arc<[HistoryPoint]> {
        self.points.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
