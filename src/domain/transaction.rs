//! Session store (C4): active transactions plus the bounded ring of
//! completed sessions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::meter::MeterReading;

const COMPLETED_RING_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    Stop,
    Disconnect,
    HeartbeatTimeout,
    GhostZeroPower,
}

impl FinalizeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Disconnect => "disconnect",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::GhostZeroPower => "ghost_zero_power",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub station_id: String,
    pub connector_id: u32,
    pub start_time: DateTime<Utc>,
    pub power: f64,
    pub energy: f64,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    /// Last time power was known to be flowing: seeded from `start_time`
    /// and advanced on every positive `MeterValues` sample. The
    /// ghost-power sweep finalizes a transaction once this falls further
    /// behind than its timeout.
    pub last_nonzero_power_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// `last_nonzero_power_at` starts at `start_time` rather than `None`:
    /// a freshly opened transaction is optimistically assumed charging,
    /// so the ghost-power sweep's clock starts ticking immediately
    /// instead of only after the first positive sample arrives.
    fn new(id: String, station_id: String, connector_id: u32, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            station_id,
            connector_id,
            start_time,
            power: 0.0,
            energy: 0.0,
            voltage: 0.0,
            current: 0.0,
            temperature: 0.0,
            last_nonzero_power_at: Some(start_time),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub id: String,
    pub station_id: String,
    pub connector_id: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub power: f64,
    pub energy: f64,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub reason: FinalizeReason,
}

/// Monotonic transaction-id generator. Seeded from the millisecond
/// timestamp at process start and incremented per call: the value still
/// reads as a millisecond-scale integer but is always unique, which a
/// bare `now_millis()` call is not under same-millisecond concurrent
/// StartTransactions.
pub struct TransactionIdGenerator {
    next: AtomicI64,
}

impl TransactionIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for TransactionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TransactionStore {
    active: DashMap<String, Transaction>,
    completed: Mutex<VecDeque<CompletedSession>>,
    id_gen: TransactionIdGenerator,
}

impl TransactionStore {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            completed: Mutex::new(VecDeque::new()),
            id_gen: TransactionIdGenerator::new(),
        }
    }

    pub fn next_transaction_id(&self) -> String {
        self.id_gen.next_id().to_string()
    }

    pub fn open(&self, tx_id: String, station_id: String, connector_id: u32, now: DateTime<Utc>) {
        self.active
            .insert(tx_id.clone(), Transaction::new(tx_id, station_id, connector_id, now));
    }

    pub fn find_by_connector(&self, station_id: &str, connector_id: u32) -> Option<Transaction> {
        self.active
            .iter()
            .find(|t| t.station_id == station_id && t.connector_id == connector_id)
            .map(|t| t.clone())
    }

    pub fn find_by_tx(&self, tx_id: &str) -> Option<Transaction> {
        self.active.get(tx_id).map(|t| t.clone())
    }

    pub fn update_meter(&self, tx_id: &str, reading: MeterReading, now: DateTime<Utc>) {
        if let Some(mut tx) = self.active.get_mut(tx_id) {
            tx.power = reading.power;
            tx.energy = reading.energy;
            tx.voltage = reading.voltage;
            tx.current = reading.current;
            tx.temperature = reading.temperature;
            if reading.power > 0.0 {
                tx.last_nonzero_power_at = Some(now);
            }
        }
    }

    /// Finalize `tx_id` if it is still active. `DashMap::remove` is
    /// atomic, so this is also the mechanism that makes finalization
    /// idempotent across concurrent callers (StopTransaction, either
    /// sweep): the first to remove the entry is the one that wins, and
    /// everyone else observes it as already finalized.
    pub fn finalize(
        &self,
        tx_id: &str,
        reason: FinalizeReason,
        end_time: DateTime<Utc>,
        final_energy: Option<f64>,
    ) -> Option<CompletedSession> {
        let (_, tx) = self.active.remove(tx_id)?;

        let duration_minutes = (end_time - tx.start_time).num_seconds() / 60;
        let completed = CompletedSession {
            id: tx.id,
            station_id: tx.station_id,
            connector_id: tx.connector_id,
            start_time: tx.start_time,
            end_time,
            duration_minutes,
            power: tx.power,
            energy: final_energy.unwrap_or(tx.energy),
            voltage: tx.voltage,
            current: tx.current,
            temperature: tx.temperature,
            reason,
        };

        let mut ring = self.completed.lock().unwrap();
        ring.push_front(completed.clone());
        ring.truncate(COMPLETED_RING_CAP);

        Some(completed)
    }

    pub fn active_for_station(&self, station_id: &str) -> Vec<Transaction> {
        self.active
            .iter()
            .filter(|t| t.station_id == station_id)
            .map(|t| t.clone())
            .collect()
    }

    pub fn snapshot_active(&self) -> Vec<Transaction> {
        self.active.iter().map(|t| t.clone()).collect()
    }

    pub fn snapshot_completed(&self) -> Vec<CompletedSession> {
        self.completed.lock().unwrap().iter().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn open_then_find_by_connector() {
        let store = TransactionStore::new();
        store.open("1".into(), "CP01".into(), 3, now());
        let tx = store.find_by_connector("CP01", 3).unwrap();
        assert_eq!(tx.id, "1");
    }

    #[test]
    fn finalize_removes_from_active_and_prepends_completed() {
        let store = TransactionStore::new();
        let start = now();
        store.open("1".into(), "CP01".into(), 3, start);

        let end = start + chrono::Duration::seconds(3600);
        let completed = store.finalize("1", FinalizeReason::Stop, end, Some(3.6)).unwrap();

        assert_eq!(completed.energy, 3.6);
        assert_eq!(completed.duration_minutes, 60);
        assert!(store.find_by_tx("1").is_none());
        assert_eq!(store.snapshot_completed().len(), 1);
    }

    #[test]
    fn finalize_is_idempotent_under_race() {
        let store = TransactionStore::new();
        store.open("1".into(), "CP01".into(), 3, now());

        let first = store.finalize("1", FinalizeReason::Stop, now(), None);
        let second = store.finalize("1", FinalizeReason::GhostZeroPower, now(), None);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.snapshot_completed().len(), 1);
    }

    #[test]
    fn completed_ring_evicts_oldest_past_cap() {
        let store = TransactionStore::new();
        for i in 0..(COMPLETED_RING_CAP + 1) {
            let id = i.to_string();
            store.open(id.clone(), "CP01".into(), 1, now());
            store.finalize(&id, FinalizeReason::Stop, now(), None);
        }
        let completed = store.snapshot_completed();
        assert_eq!(completed.len(), COMPLETED_RING_CAP);
        // newest-first: the very first transaction (id "0") was evicted.
        assert!(completed.iter().all(|c| c.id != "0"));
    }

    #[test]
    fn update_meter_tracks_last_nonzero_power() {
        let store = TransactionStore::new();
        store.open("1".into(), "CP01".into(), 3, now());

        let t1 = now();
        store.update_meter("1", MeterReading { power: 1500.0, ..Default::default() }, t1);
        assert_eq!(store.find_by_tx("1").unwrap().last_nonzero_power_at, Some(t1));

        let t2 = t1 + chrono::Duration::seconds(5);
        store.update_meter("1", MeterReading { power: 0.0, ..Default::default() }, t2);
        assert_eq!(store.find_by_tx("1").unwrap().last_nonzero_power_at, Some(t1));
    }

    #[test]
    fn transaction_ids_are_unique_even_in_same_millisecond() {
        let gen = TransactionIdGenerator::new();
        let a = gen.next_id();
        let b = gen.next_id();
        assert_ne!(a, b);
        assert!(b > a);
    }
}
