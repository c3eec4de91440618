// Wire types for the EcoFlow open API.
//
// Every HTTP response is wrapped in `{ code, message, data }` where
// `code == "0"` means success. These types mirror the JSON exactly;
// `ecoflow-core` converts them into domain models.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Application code the vendor uses for success.
pub const SUCCESS_CODE: &str = "0";

/// The `{ code, message, data }` wrapper common to all vendor responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub eagle_eye_trace_id: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Convert a non-`"0"` code into [`Error::Remote`], keeping the
    /// vendor's message verbatim.
    pub fn into_result(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Remote {
                code: self.code,
                message: self.message,
            })
        }
    }
}

/// One entry of `GET /iot-open/sign/device/list`.
///
/// Shared devices are not included by the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub sn: String,
    /// `1` when the device is online. A JSON boolean is read as `1`/`0`.
    #[serde(default, deserialize_with = "online_flag")]
    pub online: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

fn online_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i32),
        Bool(bool),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Int(i) => i,
        Flag::Bool(b) => i32::from(b),
    })
}

/// Hardware module addressed by a set-parameter command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ModuleType {
    Pd,
    Bms,
    Inv,
    BmsSlave,
    Mppt,
}

impl From<ModuleType> for u8 {
    fn from(module: ModuleType) -> Self {
        match module {
            ModuleType::Pd => 1,
            ModuleType::Bms => 2,
            ModuleType::Inv => 3,
            ModuleType::BmsSlave => 4,
            ModuleType::Mppt => 5,
        }
    }
}

impl TryFrom<u8> for ModuleType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Pd),
            2 => Ok(Self::Bms),
            3 => Ok(Self::Inv),
            4 => Ok(Self::BmsSlave),
            5 => Ok(Self::Mppt),
            other => Err(format!("unknown module type {other}")),
        }
    }
}

/// Body of `PUT /iot-open/sign/device/quota`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CmdSetRequest {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operate_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_type: Option<ModuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd_code: Option<String>,
    pub sn: String,
    pub params: Map<String, Value>,
}

impl CmdSetRequest {
    /// Request with only the required fields set.
    pub fn new(id: impl Into<String>, sn: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            operate_type: None,
            module_type: None,
            cmd_code: None,
            sn: sn.into(),
            params,
        }
    }

    pub fn with_cmd_code(mut self, cmd_code: impl Into<String>) -> Self {
        self.cmd_code = Some(cmd_code.into());
        self
    }

    pub fn with_operate_type(mut self, operate_type: impl Into<String>) -> Self {
        self.operate_type = Some(operate_type.into());
        self
    }

    pub fn with_module_type(mut self, module_type: ModuleType) -> Self {
        self.module_type = Some(module_type);
        self
    }
}

/// Response of a set-parameter command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdSetResponse {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn device_list_envelope_parses() {
        let raw = r#"{"code":"0","message":"Success","data":[{"sn":"ABC","online":1}]}"#;
        let env: Envelope<Vec<DeviceInfo>> = serde_json::from_str(raw).unwrap();
        assert!(env.is_success());
        let devices = env.into_result().unwrap().data.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].sn, "ABC");
        assert_eq!(devices[0].online, 1);
    }

    #[test]
    fn online_flag_accepts_bool_or_integer() {
        let raw = json!([
            { "sn": "A", "online": true },
            { "sn": "B", "online": false },
            { "sn": "C", "online": 0 },
            { "sn": "D" }
        ]);
        let devices: Vec<DeviceInfo> = serde_json::from_value(raw).unwrap();
        let flags: Vec<i32> = devices.iter().map(|d| d.online).collect();
        assert_eq!(flags, vec![1, 0, 0, 0]);
    }

    #[test]
    fn error_envelope_without_data() {
        let raw = r#"{"code":"1","message":"bad key"}"#;
        let env: Envelope<Vec<DeviceInfo>> = serde_json::from_str(raw).unwrap();
        let err = env.into_result().unwrap_err();
        assert!(matches!(err, Error::Remote { ref code, ref message } if code == "1" && message == "bad key"));
    }

    #[test]
    fn set_request_omits_absent_optionals() {
        let mut params = Map::new();
        params.insert("permanentWatts".into(), json!(2000.0));
        let req = CmdSetRequest::new("1700000000000", "HW51", params)
            .with_cmd_code("WN511_SET_PERMANENT_WATTS_PACK");

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "1700000000000",
                "cmdCode": "WN511_SET_PERMANENT_WATTS_PACK",
                "sn": "HW51",
                "params": { "permanentWatts": 2000.0 }
            })
        );
    }

    #[test]
    fn module_type_serializes_as_code() {
        let req = CmdSetRequest::new("1", "SN", Map::new())
            .with_module_type(ModuleType::Mppt)
            .with_operate_type("TCP");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["moduleType"], json!(5));
        assert_eq!(value["operateType"], json!("TCP"));

        let parsed: ModuleType = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(parsed, ModuleType::Inv);
        assert!(serde_json::from_value::<ModuleType>(json!(9)).is_err());
    }
}
