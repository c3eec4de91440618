// ecoflow-core: Telemetry decoding, device registry and ingestion between ecoflow-api and consumers.

pub mod config;
pub mod controller;
pub mod decode;
pub mod error;
pub mod model;
pub mod proto;
pub mod sink;
pub mod stats;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AccountCredentials, ControllerConfig, DEFAULT_API_URL};
pub use controller::{Controller, PERMANENT_WATTS_CMD_CODE};
pub use decode::{CommandKind, DecodeError, PayloadDecoder};
pub use error::CoreError;
pub use sink::{ChannelSink, RecordSink};
pub use stats::{DeviceCounters, StatsTracker};
pub use store::DeviceRegistry;

pub use model::{
    Column, ColumnValue, Device, FieldValue, RecordSource, SERIAL_FIELD, TIMESTAMP_FIELD,
    TelemetryRecord,
};

// Wire types consumers need alongside the controller.
pub use ecoflow_api::{BrokerConfig, CmdSetRequest, CmdSetResponse, ModuleType, SessionState, TlsMode};
