// ── Domain model ──
//
// Types consumers (CLI, storage collaborators) depend on. Wire types from
// `ecoflow-api` are converted into these at the core boundary.

pub mod device;
pub mod record;
pub mod value;

pub use device::Device;
pub use record::{
    Column, ColumnValue, RecordSource, SERIAL_FIELD, TIMESTAMP_FIELD, TelemetryRecord, column_name,
};
pub use value::FieldValue;
