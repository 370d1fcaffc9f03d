//! Bounded per-site reading history.
//!
//! Each site keeps at most `capacity` readings, oldest first. Appending to
//! a full buffer evicts the oldest entry; the newest is never dropped.

use std::collections::{HashMap, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::aging::{Metrics, NoiseProfile, SensorBounds};
use crate::models::Reading;

// ---

/// When history is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryMode {
    /// Every site on every sensor tick.
    Eager,
    /// Only inspected sites, backfilled from the aging model on first look.
    Lazy,
}

impl std::str::FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eager" => Ok(HistoryMode::Eager),
            "lazy" => Ok(HistoryMode::Lazy),
            other => Err(format!("unknown history mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    entries: HashMap<u32, VecDeque<Reading>>,
}

impl HistoryStore {
    /// A store retaining up to `capacity` readings per site (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn append(&mut self, site_id: u32, reading: Reading) {
        // ---
        let buf = self
            .entries
            .entry(site_id)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if buf.len() == self.capacity {
            buf.pop_front();
        }
        buf.push_back(reading);
    }

    /// Readings for a site, oldest to newest. Empty when untracked.
    pub fn get(&self, site_id: u32) -> Vec<Reading> {
        self.entries
            .get(&site_id)
            .map(|buf| buf.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_tracked(&self, site_id: u32) -> bool {
        self.entries.contains_key(&site_id)
    }

    /// Ids of all sites with recorded history, ascending.
    pub fn tracked(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear(&mut self, site_id: u32) {
        self.entries.remove(&site_id);
    }

    /// Synthesize plausible back-history for a site about to be inspected.
    ///
    /// Replays the aging model at `elapsed_days - k * interval_days` for
    /// `k = count..=1`, with fresh noise from `plan`. Days before zero are
    /// skipped. `anchor` supplies fallback values for non-finite output.
    pub fn backfill<R: Rng + ?Sized>(
        &mut self,
        site_id: u32,
        elapsed_days: u64,
        plan: &BackfillPlan,
        anchor: Metrics,
        rng: &mut R,
    ) {
        // ---
        let interval = plan.interval_days.max(1);
        for k in (1..=plan.count as u64).rev() {
            let Some(day) = elapsed_days.checked_sub(k * interval) else {
                continue;
            };
            let noisy = plan.noise.apply(Metrics::trend_at(day as f64), rng);
            let settled = plan.bounds.settle(noisy, anchor);
            self.append(site_id, Reading::from_metrics(day, settled));
        }
    }
}

/// How [`HistoryStore::backfill`] synthesizes past readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackfillPlan {
    /// Simulated days between synthesized readings.
    pub interval_days: u64,
    pub count: usize,
    pub noise: NoiseProfile,
    pub bounds: SensorBounds,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn plan(interval_days: u64, count: usize) -> BackfillPlan {
        BackfillPlan {
            interval_days,
            count,
            noise: NoiseProfile::TICK,
            bounds: SensorBounds::default(),
        }
    }

    fn reading(day: u64) -> Reading {
        Reading {
            day,
            ph: 7.0,
            lead: 20.0,
            pm25: 15.0,
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        // ---
        let mut store = HistoryStore::new(5);
        for day in 0..12 {
            store.append(1, reading(day));
        }
        let days: Vec<u64> = store.get(1).iter().map(|r| r.day).collect();
        assert_eq!(days, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_untracked_site_is_empty() {
        // ---
        let store = HistoryStore::new(5);
        assert!(store.get(99).is_empty());
        assert!(!store.is_tracked(99));
    }

    #[test]
    fn test_zero_capacity_keeps_newest() {
        // ---
        let mut store = HistoryStore::new(0);
        store.append(1, reading(1));
        store.append(1, reading(2));
        assert_eq!(store.get(1), vec![reading(2)]);
    }

    #[test]
    fn test_clear_and_tracked() {
        // ---
        let mut store = HistoryStore::new(3);
        store.append(3, reading(0));
        store.append(1, reading(0));
        assert_eq!(store.tracked(), vec![1, 3]);

        store.clear(3);
        assert_eq!(store.tracked(), vec![1]);
    }

    #[test]
    fn test_backfill_orders_past_days() {
        // ---
        let mut store = HistoryStore::new(30);
        let mut rng = StdRng::seed_from_u64(11);
        store.backfill(2, 140, &plan(7, 20), Metrics::trend_at(140.0), &mut rng);

        let history = store.get(2);
        assert_eq!(history.len(), 20);
        assert_eq!(history.first().map(|r| r.day), Some(0));
        assert_eq!(history.last().map(|r| r.day), Some(133));
        assert!(history.windows(2).all(|w| w[0].day < w[1].day));
    }

    #[test]
    fn test_backfill_skips_negative_days_and_respects_capacity() {
        // ---
        let mut store = HistoryStore::new(4);
        let mut rng = StdRng::seed_from_u64(5);
        store.backfill(1, 21, &plan(7, 20), Metrics::trend_at(21.0), &mut rng);

        let days: Vec<u64> = store.get(1).iter().map(|r| r.day).collect();
        assert_eq!(days, vec![0, 7, 14]);
    }

    #[test]
    fn test_backfill_uses_plan_noise() {
        // ---
        let mut store = HistoryStore::new(10);
        let mut rng = StdRng::seed_from_u64(9);
        let quiet = BackfillPlan {
            noise: NoiseProfile {
                ph: 0.0,
                lead: 0.0,
                pm25: 0.0,
            },
            ..plan(10, 3)
        };
        store.backfill(4, 30, &quiet, Metrics::trend_at(30.0), &mut rng);

        let bounds = SensorBounds::default();
        let expected: Vec<Reading> = [0u64, 10, 20]
            .iter()
            .map(|&day| {
                let m = Metrics::trend_at(day as f64);
                Reading::from_metrics(day, bounds.settle(m, m))
            })
            .collect();
        assert_eq!(store.get(4), expected);
    }
}
