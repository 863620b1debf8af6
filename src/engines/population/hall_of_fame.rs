use crate::engines::population::history::UpdateHistory;
use chrono::{DateTime, Utc};

use std::collections::HashSet;

/// A member as it was when it reached a notable metric.
#[derive(Clone, Debug)]
pub struct EliteSnapshot {
    pub member_id: usize,
    pub metric: f64,
    pub step: u64,
    pub history: UpdateHistory, // Hyperparameters that led here
    pub recorded_at: DateTime<Utc>,
}

impl EliteSnapshot {
    pub fn new(member_id: usize, metric: f64, step: u64, history: UpdateHistory) -> Self {
        Self {
            member_id,
            metric,
            step,
            history,
            recorded_at: Utc::now(),
        }
    }

    fn signature(&self) -> (usize, u64) {
        (self.member_id, self.step)
    }
}

/// The best snapshots seen over a whole training run, even after the members
/// that produced them have moved on or been overwritten by a copy.
pub struct HallOfFame {
    snapshots: Vec<EliteSnapshot>,
    max_size: usize,
    seen_signatures: HashSet<(usize, u64)>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            max_size,
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add a snapshot; a member is only recorded once per step
    pub fn try_add(&mut self, snapshot: EliteSnapshot) -> bool {
        if self.max_size == 0 || self.seen_signatures.contains(&snapshot.signature()) {
            return false;
        }
        if self.snapshots.len() >= self.max_size {
            let worst = self.snapshots.last().map(|s| s.metric).unwrap_or(f64::NEG_INFINITY);
            if snapshot.metric <= worst {
                return false;
            }
        }

        self.seen_signatures.insert(snapshot.signature());
        self.snapshots.push(snapshot);

        // Sort by metric (descending); stable, so earlier snapshots win ties
        self.snapshots.sort_by(|a, b| b.metric.total_cmp(&a.metric));

        while self.snapshots.len() > self.max_size {
            if let Some(removed) = self.snapshots.pop() {
                self.seen_signatures.remove(&removed.signature());
            }
        }
        true
    }

    /// Highest metric seen so far
    pub fn best(&self) -> Option<&EliteSnapshot> {
        self.snapshots.first()
    }

    pub fn get_all(&self) -> &[EliteSnapshot] {
        &self.snapshots
    }

    pub fn get_top_n(&self, n: usize) -> &[EliteSnapshot] {
        &self.snapshots[..n.min(self.snapshots.len())]
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
