//! In-flight delivery bookkeeping.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::event::Level;

/// One published event awaiting its broker acknowledgment.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub key: String,
    pub level: Level,
    pub service: String,
    pub submitted_at: Instant,
}

impl DeliveryRecord {
    pub fn age(&self) -> Duration {
        self.submitted_at.elapsed()
    }
}

/// Outstanding delivery records keyed by sequence number.
///
/// Acknowledgments may arrive in any order; records are only ever looked up
/// by their own sequence number.
#[derive(Debug, Default)]
pub struct DeliveryTracker {
    in_flight: HashMap<u64, DeliveryRecord>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, seq: u64, record: DeliveryRecord) {
        self.in_flight.insert(seq, record);
    }

    /// Remove and return the record an acknowledgment belongs to.
    pub fn settle(&mut self, seq: u64) -> Option<DeliveryRecord> {
        self.in_flight.remove(&seq)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Give up on every outstanding record, oldest sequence first.
    pub fn abandon_all(&mut self) -> Vec<(u64, DeliveryRecord)> {
        let mut abandoned: Vec<_> = self.in_flight.drain().collect();
        abandoned.sort_by_key(|(seq, _)| *seq);
        abandoned
    }
}
