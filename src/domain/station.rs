//! Station registry (C3): process-wide station-id -> station record map.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Sending half of a station's outbound channel. The one task reading
/// from the paired receiver is the sole writer to the socket, which is
/// what gives CALLRESULT frames their in-order delivery guarantee.
pub type OutboundSender = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone)]
pub struct Station {
    pub id: String,
    pub status: StationStatus,
    pub connected_at: DateTime<Utc>,
    pub vendor: String,
    pub model: String,
    pub firmware_version: String,
    pub last_heartbeat: DateTime<Utc>,
    sender: Option<OutboundSender>,
}

impl Station {
    fn new(id: String, sender: OutboundSender, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: StationStatus::Online,
            connected_at: now,
            vendor: "Unknown".to_string(),
            model: "Unknown".to_string(),
            firmware_version: "Unknown".to_string(),
            last_heartbeat: now,
            sender: Some(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == StationStatus::Online
    }
}

/// Process-wide station-id -> station record map. All operations are
/// atomic with respect to each other via `DashMap`'s per-shard locking.
#[derive(Default)]
pub struct StationRegistry {
    stations: DashMap<String, Station>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `id`. A fresh connect with the
    /// same id always wins; it is the caller's job (the liveness sweep
    /// or the connection handler's own close path) to have finalized
    /// the previous connection's sessions first.
    pub fn register(&self, id: &str, sender: OutboundSender, now: DateTime<Utc>) {
        self.stations
            .insert(id.to_string(), Station::new(id.to_string(), sender, now));
    }

    pub fn update_boot(&self, id: &str, vendor: &str, model: &str, firmware: &str, now: DateTime<Utc>) {
        if let Some(mut station) = self.stations.get_mut(id) {
            station.vendor = vendor.to_string();
            station.model = model.to_string();
            station.firmware_version = firmware.to_string();
            station.status = StationStatus::Online;
            station.last_heartbeat = now;
        }
    }

    pub fn touch(&self, id: &str, now: DateTime<Utc>) {
        if let Some(mut station) = self.stations.get_mut(id) {
            station.status = StationStatus::Online;
            station.last_heartbeat = now;
        }
    }

    /// Marks the station offline and invalidates its outbound sender so
    /// no further writes can reach a closed connection.
    pub fn mark_offline(&self, id: &str) {
        if let Some(mut station) = self.stations.get_mut(id) {
            station.status = StationStatus::Offline;
            station.sender = None;
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Station> {
        self.stations.get(id).map(|s| s.clone())
    }

    pub fn snapshot_all(&self) -> Vec<Station> {
        self.stations.iter().map(|s| s.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.stations.len()
    }

    pub fn count_online(&self) -> usize {
        self.stations.iter().filter(|s| s.is_online()).count()
    }

    /// Returns every station whose `last_heartbeat` is older than `cutoff`
    /// and is still marked online — candidates for the heartbeat sweep.
    pub fn stale_online_stations(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.stations
            .iter()
            .filter(|s| s.is_online() && s.last_heartbeat < cutoff)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Send a frame on `id`'s connection if it is online and writable.
    /// Returns `false` if the station is unknown, offline, or the send
    /// failed (the receiving task has already torn the socket down).
    pub fn send_to(&self, id: &str, frame: String) -> bool {
        match self.stations.get(id) {
            Some(station) => match &station.sender {
                Some(sender) => sender.send(frame).is_ok(),
                None => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn register_then_lookup_is_online() {
        let registry = StationRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("CP01", tx, now());

        let station = registry.lookup("CP01").unwrap();
        assert!(station.is_online());
        assert_eq!(station.vendor, "Unknown");
    }

    #[test]
    fn mark_offline_disables_sends() {
        let registry = StationRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("CP01", tx, now());
        registry.mark_offline("CP01");

        let station = registry.lookup("CP01").unwrap();
        assert!(!station.is_online());
        assert!(!registry.send_to("CP01", "frame".to_string()));
    }

    #[test]
    fn stale_online_stations_excludes_offline() {
        let registry = StationRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let old = now() - chrono::Duration::seconds(120);
        registry.register("CP01", tx, old);
        registry.mark_offline("CP01");

        assert!(registry.stale_online_stations(now()).is_empty());
    }

    #[test]
    fn reconnect_replaces_prior_record() {
        let registry = StationRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        registry.register("CP01", tx1, now());
        registry.update_boot("CP01", "ACME", "X", "1.0", now());

        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.register("CP01", tx2, now());

        // A fresh connect resets device identity back to "Unknown" since
        // it constructs a brand new record.
        assert_eq!(registry.lookup("CP01").unwrap().vendor, "Unknown");
        assert_eq!(registry.count(), 1);
    }
}
