// ── Device domain type ──

use serde::Serialize;

use ecoflow_api::DeviceInfo;

/// A device bound to the developer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    /// Stable for the device's lifetime; also the broker topic suffix.
    pub serial: String,
    pub online: bool,
    pub name: Option<String>,
    pub product: Option<String>,
}

impl From<DeviceInfo> for Device {
    fn from(info: DeviceInfo) -> Self {
        Self {
            serial: info.sn,
            online: info.online == 1,
            name: info.device_name,
            product: info.product_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_flag_from_wire() {
        let info = DeviceInfo {
            sn: "ABC".into(),
            online: 1,
            device_name: Some("Balcony".into()),
            product_name: None,
        };
        let device = Device::from(info);
        assert_eq!(device.serial, "ABC");
        assert!(device.online);
        assert_eq!(device.name.as_deref(), Some("Balcony"));

        let offline = Device::from(DeviceInfo {
            sn: "DEF".into(),
            online: 0,
            device_name: None,
            product_name: None,
        });
        assert!(!offline.online);
    }
}
