//! Broker payload decoding.
//!
//! A payload is either a JSON object or one or more concatenated protobuf
//! frames. JSON is tried first. Binary frames are split on occurrences of
//! the device serial: the serial is the last field of every frame header,
//! so each occurrence ends a frame. Nothing in the wire format forbids the
//! serial appearing inside `pdata`; a frame cut short that way fails to
//! decode and is dropped on its own.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use chrono::{DateTime, Utc};
use prost::Message;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{FieldValue, RecordSource, TelemetryRecord};
use crate::proto::{Header, InverterHeartbeat, PowerItem, PowerPack, SendHeaderMsg};

// ── CommandKind ──────────────────────────────────────────────────────

/// Binary frame command, from `Header.cmd_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// `1`: inverter heartbeat.
    Heartbeat,
    /// `32`: batch of power-stream samples.
    PowerPack,
    Unknown(i32),
}

impl From<i32> for CommandKind {
    fn from(cmd_id: i32) -> Self {
        match cmd_id {
            1 => Self::Heartbeat,
            32 => Self::PowerPack,
            other => Self::Unknown(other),
        }
    }
}

// ── DecodeError ──────────────────────────────────────────────────────

/// Failure to decode one binary frame. The frame is dropped; other frames
/// of the same payload are still decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame envelope: {0}")]
    Envelope(#[source] prost::DecodeError),

    #[error("frame carries no header")]
    MissingHeader,

    #[error("malformed {command} payload: {source}")]
    Payload {
        command: &'static str,
        #[source]
        source: prost::DecodeError,
    },
}

// ── PayloadDecoder ───────────────────────────────────────────────────

/// Turns raw broker payloads into [`TelemetryRecord`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadDecoder;

impl PayloadDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode every record in `payload`.
    ///
    /// Never fails: malformed binary frames are logged and skipped.
    pub fn decode(
        &self,
        serial: &str,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Vec<TelemetryRecord> {
        if let Some(record) = self.decode_json(serial, payload, received_at) {
            return vec![record];
        }

        let mut records = Vec::new();
        for (index, frame) in split_frames(payload, serial.as_bytes()).into_iter().enumerate() {
            match self.decode_frame(serial, frame, received_at) {
                Ok(decoded) => records.extend(decoded),
                Err(e) => warn!(serial, frame = index, error = %e, "dropping binary frame"),
            }
        }
        records
    }

    /// JSON property report, or `None` if `payload` is not a JSON object.
    ///
    /// A `params` object replaces the outer envelope as the field mapping.
    pub fn decode_json(
        &self,
        serial: &str,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Option<TelemetryRecord> {
        let mut object: Map<String, Value> = serde_json::from_slice(payload).ok()?;

        debug!(
            serial,
            cmd_id = ?object.get("cmdId"),
            cmd_func = ?object.get("cmdFunc"),
            "json payload"
        );

        if let Some(Value::Object(params)) = object.remove("params") {
            object = params;
        }

        let mut record = TelemetryRecord::new(serial, received_at, RecordSource::Json);
        for (name, value) in object {
            if let Some(value) = FieldValue::from_json(value) {
                record.fields.insert(name, value);
            }
        }
        record.inject_routing_fields();
        Some(record)
    }

    /// Decode a single binary frame.
    ///
    /// An unknown command is not an error: its header is logged and no
    /// record is produced.
    pub fn decode_frame(
        &self,
        serial: &str,
        frame: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Vec<TelemetryRecord>, DecodeError> {
        let envelope = SendHeaderMsg::decode(frame).map_err(DecodeError::Envelope)?;
        let header = envelope.msg.ok_or(DecodeError::MissingHeader)?;
        let pdata = header.pdata.as_deref().unwrap_or_default();

        match CommandKind::from(header.cmd_id.unwrap_or_default()) {
            CommandKind::Heartbeat => {
                let heartbeat =
                    InverterHeartbeat::decode(pdata).map_err(|source| DecodeError::Payload {
                        command: "heartbeat",
                        source,
                    })?;
                debug!(serial, ?heartbeat, "inverter heartbeat");
                Ok(vec![heartbeat_record(serial, &heartbeat, received_at)])
            }
            CommandKind::PowerPack => {
                let pack = PowerPack::decode(pdata).map_err(|source| DecodeError::Payload {
                    command: "power pack",
                    source,
                })?;
                debug!(serial, items = pack.sys_power_stream.len(), "power pack");
                Ok(pack
                    .sys_power_stream
                    .iter()
                    .map(|item| power_item_record(serial, item, received_at))
                    .collect())
            }
            CommandKind::Unknown(cmd_id) => {
                log_unknown(serial, cmd_id, &header, frame);
                Ok(Vec::new())
            }
        }
    }
}

fn log_unknown(serial: &str, cmd_id: i32, header: &Header, frame: &[u8]) {
    info!(
        serial,
        cmd_id,
        cmd_func = header.cmd_func,
        version = header.version,
        payload_ver = header.payload_ver,
        src = header.src,
        dest = header.dest,
        d_src = header.d_src,
        d_dest = header.d_dest,
        data_len = header.data_len,
        need_ack = header.need_ack,
        device_sn = header.device_sn.as_deref(),
        base64 = %STANDARD_NO_PAD.encode(frame),
        "unknown command id, skipping frame"
    );
}

// ── Framing ──────────────────────────────────────────────────────────

/// Split `payload` into frames, each ending just after an occurrence of
/// `marker`. Bytes after the last marker form a final frame; without any
/// marker the whole payload is one frame.
pub fn split_frames<'a>(payload: &'a [u8], marker: &[u8]) -> Vec<&'a [u8]> {
    if payload.is_empty() {
        return Vec::new();
    }
    if marker.is_empty() {
        return vec![payload];
    }

    let mut frames = Vec::new();
    let mut start = 0;
    while let Some(offset) = find(&payload[start..], marker) {
        let end = start + offset + marker.len();
        frames.push(&payload[start..end]);
        start = end;
    }
    if start < payload.len() {
        frames.push(&payload[start..]);
    }
    frames
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ── Record builders ──────────────────────────────────────────────────

fn put<T: Into<i64>>(record: &mut TelemetryRecord, name: &str, value: Option<T>) {
    if let Some(value) = value {
        record.insert(name, value.into());
    }
}

fn unix_seconds(secs: Option<u32>) -> Option<DateTime<Utc>> {
    secs.filter(|s| *s > 0)
        .and_then(|s| DateTime::from_timestamp(i64::from(s), 0))
}

fn heartbeat_record(
    serial: &str,
    hb: &InverterHeartbeat,
    received_at: DateTime<Utc>,
) -> TelemetryRecord {
    let at = unix_seconds(hb.timestamp).unwrap_or(received_at);
    let mut r = TelemetryRecord::new(serial, at, RecordSource::Heartbeat);

    put(&mut r, "inv_error_code", hb.inv_error_code);
    put(&mut r, "inv_warning_code", hb.inv_warning_code);
    put(&mut r, "pv1_error_code", hb.pv1_error_code);
    put(&mut r, "pv1_warning_code", hb.pv1_warning_code);
    put(&mut r, "pv2_error_code", hb.pv2_error_code);
    put(&mut r, "pv2_warning_code", hb.pv2_warning_code);
    put(&mut r, "bat_error_code", hb.bat_error_code);
    put(&mut r, "bat_warning_code", hb.bat_warning_code);
    put(&mut r, "pv1_status", hb.pv1_status);
    put(&mut r, "pv2_status", hb.pv2_status);
    put(&mut r, "bat_status", hb.bat_status);
    put(&mut r, "inv_status", hb.inv_status);
    put(&mut r, "pv1_input_volt", hb.pv1_input_volt);
    put(&mut r, "pv1_op_volt", hb.pv1_op_volt);
    put(&mut r, "pv1_input_cur", hb.pv1_input_cur);
    put(&mut r, "pv1_input_watts", hb.pv1_input_watts);
    put(&mut r, "pv1_temp", hb.pv1_temp);
    put(&mut r, "pv2_input_volt", hb.pv2_input_volt);
    put(&mut r, "pv2_op_volt", hb.pv2_op_volt);
    put(&mut r, "pv2_input_cur", hb.pv2_input_cur);
    put(&mut r, "pv2_input_watts", hb.pv2_input_watts);
    put(&mut r, "pv2_temp", hb.pv2_temp);
    put(&mut r, "bat_input_volt", hb.bat_input_volt);
    put(&mut r, "bat_op_volt", hb.bat_op_volt);
    put(&mut r, "bat_input_cur", hb.bat_input_cur);
    put(&mut r, "bat_input_watts", hb.bat_input_watts);
    put(&mut r, "bat_temp", hb.bat_temp);
    put(&mut r, "bat_soc", hb.bat_soc);
    put(&mut r, "inv_input_volt", hb.inv_input_volt);
    put(&mut r, "inv_op_volt", hb.inv_op_volt);
    put(&mut r, "inv_output_cur", hb.inv_output_cur);
    put(&mut r, "inv_output_watts", hb.inv_output_watts);
    put(&mut r, "inv_temp", hb.inv_temp);
    put(&mut r, "inv_freq", hb.inv_freq);
    put(&mut r, "install_country", hb.install_country);
    put(&mut r, "install_town", hb.install_town);
    put(&mut r, "permanent_watts", hb.permanent_watts);
    put(&mut r, "dynamic_watts", hb.dynamic_watts);
    put(&mut r, "supply_priority", hb.supply_priority);
    put(&mut r, "lower_limit", hb.lower_limit);
    put(&mut r, "upper_limit", hb.upper_limit);
    put(&mut r, "inv_on_off", hb.inv_on_off);
    put(&mut r, "inv_brightness", hb.inv_brightness);
    put(&mut r, "heartbeat_frequency", hb.heartbeat_frequency);
    put(&mut r, "rated_power", hb.rated_power);

    r.inject_routing_fields();
    r
}

fn power_item_record(
    serial: &str,
    item: &PowerItem,
    received_at: DateTime<Utc>,
) -> TelemetryRecord {
    let at = unix_seconds(item.timestamp).unwrap_or(received_at);
    let mut r = TelemetryRecord::new(serial, at, RecordSource::PowerStream);

    put(&mut r, "timezone", item.timezone);
    put(&mut r, "inv_to_grid_power", item.inv_to_grid_power);
    put(&mut r, "inv_to_plug_power", item.inv_to_plug_power);
    put(&mut r, "battery_power", item.battery_power);
    put(&mut r, "pv1_output_power", item.pv1_output_power);
    put(&mut r, "pv2_output_power", item.pv2_output_power);

    r.inject_routing_fields();
    r
}

// ── Tests ────────────────────────────────────────────────────────────
