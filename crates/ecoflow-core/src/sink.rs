// ── Record delivery ──
//
// Decoded records leave the core through a `RecordSink`. Storage and other
// consumers implement it; the ingestion task calls it once per record, in
// broker order for any one device.

use tokio::sync::mpsc;
use tracing::warn;

use crate::model::TelemetryRecord;

/// Receives decoded telemetry records.
///
/// Called from the ingestion task; implementations must not block.
pub trait RecordSink: Send + Sync + 'static {
    fn on_record(&self, record: TelemetryRecord);
}

impl<F> RecordSink for F
where
    F: Fn(TelemetryRecord) + Send + Sync + 'static,
{
    fn on_record(&self, record: TelemetryRecord) {
        self(record);
    }
}

/// Forwards records into a bounded channel, dropping them when it is full.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<TelemetryRecord>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<TelemetryRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl RecordSink for ChannelSink {
    fn on_record(&self, record: TelemetryRecord) {
        if let Err(e) = self.tx.try_send(record) {
            match e {
                mpsc::error::TrySendError::Full(r) => {
                    warn!(serial = %r.serial, "record channel full, dropping record");
                }
                mpsc::error::TrySendError::Closed(_) => {}
            }
        }
    }
}
