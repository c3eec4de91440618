// ── Known-device registry ──
//
// Replaced wholesale on every device-list refresh. Readers take a snapshot
// and never hold a lock across read and use.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use ecoflow_api::SubscriptionSource;

use crate::model::Device;

pub struct DeviceRegistry {
    devices: ArcSwap<Vec<Device>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (last_refresh, _) = watch::channel(None);
        Self {
            devices: ArcSwap::from_pointee(Vec::new()),
            last_refresh,
        }
    }

    /// Swap in a fresh device list. Returns the serials that were not in
    /// the previous list, in list order.
    pub fn replace(&self, devices: Vec<Device>) -> Vec<String> {
        let previous = self.devices.swap(Arc::new(devices));
        let known: HashSet<&str> = previous.iter().map(|d| d.serial.as_str()).collect();
        let added = self
            .devices
            .load()
            .iter()
            .filter(|d| !known.contains(d.serial.as_str()))
            .map(|d| d.serial.clone())
            .collect();
        self.last_refresh.send_replace(Some(Utc::now()));
        added
    }

    pub fn snapshot(&self) -> Arc<Vec<Device>> {
        self.devices.load_full()
    }

    pub fn get(&self, serial: &str) -> Option<Device> {
        self.devices.load().iter().find(|d| d.serial == serial).cloned()
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.devices.load().iter().any(|d| d.serial == serial)
    }

    pub fn len(&self) -> usize {
        self.devices.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.load().is_empty()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    pub fn subscribe_refresh(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_refresh.subscribe()
    }
}

impl SubscriptionSource for DeviceRegistry {
    fn serials(&self) -> Vec<String> {
        self.devices.load().iter().map(|d| d.serial.clone()).collect()
    }
}
