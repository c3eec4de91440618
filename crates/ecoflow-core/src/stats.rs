// ── Per-device message accounting ──
//
// Counts broker messages and HTTP quota fetches per device serial. Safe to
// update from any task; a device's two counters are read together.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use ecoflow_api::broker::property_topic;

/// Per-device broker message count at which all counters are logged.
pub const DEFAULT_SNAPSHOT_EVERY: u64 = 350;

/// Message counts for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceCounters {
    pub broker: u64,
    pub http: u64,
}

#[derive(Debug)]
pub struct StatsTracker {
    devices: DashMap<String, Arc<Mutex<DeviceCounters>>>,
    snapshot_every: u64,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::with_snapshot_every(DEFAULT_SNAPSHOT_EVERY)
    }

    /// Log every device's counters whenever one device reaches a multiple of
    /// `every` broker messages. `0` disables periodic logging.
    pub fn with_snapshot_every(every: u64) -> Self {
        Self {
            devices: DashMap::new(),
            snapshot_every: every,
        }
    }

    fn counters(&self, serial: &str) -> Arc<Mutex<DeviceCounters>> {
        if let Some(entry) = self.devices.get(serial) {
            return Arc::clone(entry.value());
        }
        Arc::clone(self.devices.entry(serial.to_owned()).or_default().value())
    }

    /// Count one broker message. Returns the device's new broker count.
    pub fn record_broker_message(&self, serial: &str) -> u64 {
        let counters = self.counters(serial);
        let mut guard = counters.lock().unwrap_or_else(PoisonError::into_inner);
        guard.broker += 1;
        let current = *guard;
        drop(guard);

        if self.snapshot_due(current.broker) {
            self.log_snapshot();
        }
        current.broker
    }

    fn snapshot_due(&self, broker_count: u64) -> bool {
        self.snapshot_every > 0 && broker_count % self.snapshot_every == 0
    }

    /// One `info` line per topic seen so far. Returns the line count.
    fn log_snapshot(&self) -> usize {
        let snapshot = self.snapshot();
        for (serial, c) in &snapshot {
            info!(
                topic = %property_topic(serial),
                mqtt = c.broker,
                http = c.http,
                "device message counters"
            );
        }
        snapshot.len()
    }

    /// Count one HTTP parameter fetch.
    pub fn record_http_message(&self, serial: &str) -> u64 {
        let counters = self.counters(serial);
        let mut guard = counters.lock().unwrap_or_else(PoisonError::into_inner);
        guard.http += 1;
        guard.http
    }

    pub fn get(&self, serial: &str) -> Option<DeviceCounters> {
        let counters = Arc::clone(self.devices.get(serial)?.value());
        let guard = counters.lock().unwrap_or_else(PoisonError::into_inner);
        Some(*guard)
    }

    /// All devices' counters, sorted by serial.
    pub fn snapshot(&self) -> Vec<(String, DeviceCounters)> {
        let entries: Vec<(String, Arc<Mutex<DeviceCounters>>)> = self
            .devices
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut snapshot: Vec<(String, DeviceCounters)> = entries
            .into_iter()
            .map(|(serial, counters)| {
                let c = *counters.lock().unwrap_or_else(PoisonError::into_inner);
                (serial, c)
            })
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// One line per device:
    /// `  <serial> got http=<NNN> mqtt=<NNN> messages`.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (serial, c) in self.snapshot() {
            let _ = writeln!(out, "  {serial} got http={:03} mqtt={:03} messages", c.http, c.broker);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counts_per_device() {
        let stats = StatsTracker::new();
        assert_eq!(stats.record_broker_message("B"), 1);
        assert_eq!(stats.record_broker_message("B"), 2);
        assert_eq!(stats.record_http_message("A"), 1);

        assert_eq!(stats.get("B"), Some(DeviceCounters { broker: 2, http: 0 }));
        assert_eq!(stats.get("A"), Some(DeviceCounters { broker: 0, http: 1 }));
        assert_eq!(stats.get("C"), None);
    }

    #[test]
    fn report_is_sorted_and_padded() {
        let stats = StatsTracker::new();
        for _ in 0..12 {
            stats.record_broker_message("ZZZ");
        }
        stats.record_http_message("AAA");
        stats.record_broker_message("AAA");

        assert_eq!(
            stats.report(),
            "  AAA got http=001 mqtt=001 messages\n  ZZZ got http=000 mqtt=012 messages\n"
        );
    }

    #[test]
    fn snapshot_triggers_on_each_multiple() {
        let stats = StatsTracker::with_snapshot_every(3);
        assert!(!stats.snapshot_due(1));
        assert!(!stats.snapshot_due(2));
        assert!(stats.snapshot_due(3));
        assert!(!stats.snapshot_due(4));
        assert!(stats.snapshot_due(6));

        assert!(!StatsTracker::with_snapshot_every(0).snapshot_due(350));
        assert!(StatsTracker::new().snapshot_due(DEFAULT_SNAPSHOT_EVERY));
    }

    #[test]
    fn snapshot_covers_every_topic() {
        let stats = StatsTracker::with_snapshot_every(3);
        stats.record_broker_message("A");
        stats.record_broker_message("A");
        stats.record_broker_message("B");
        stats.record_http_message("C");
        assert_eq!(stats.record_broker_message("A"), 3);

        assert_eq!(stats.log_snapshot(), 3);
        assert_eq!(StatsTracker::new().log_snapshot(), 0);
    }

    #[test]
    fn empty_report() {
        assert_eq!(StatsTracker::new().report(), "");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let stats = StatsTracker::with_snapshot_every(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..500 {
                        stats.record_broker_message("DEV");
                        stats.record_http_message("DEV");
                    }
                });
            }
        });
        assert_eq!(stats.get("DEV"), Some(DeviceCounters { broker: 4000, http: 4000 }));
    }
}
