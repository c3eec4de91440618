// ── Controller abstraction ──
//
// Lifecycle for one developer account: signed API calls, the known-device
// registry and its periodic refresh, and the broker ingestion pipeline
// (queue → decoder → stats → sink).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ecoflow_api::{
    AccountClient, ApiClient, BrokerMessage, CmdSetRequest, CmdSetResponse, SessionState,
    SubscriptionSource, TelemetryConnection, TransportConfig, cancellable,
};

use crate::config::ControllerConfig;
use crate::decode::PayloadDecoder;
use crate::error::CoreError;
use crate::model::Device;
use crate::model::record::integral;
use crate::sink::RecordSink;
use crate::stats::StatsTracker;
use crate::store::DeviceRegistry;

/// Command code of the micro-inverter permanent output setting.
pub const PERMANENT_WATTS_CMD_CODE: &str = "WN511_SET_PERMANENT_WATTS_PACK";

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. HTTP operations work
/// without a broker session; [`connect()`](Self::connect) starts the
/// ingestion and refresh tasks, [`shutdown()`](Self::shutdown) stops them.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    api: ApiClient,
    account: AccountClient,
    registry: Arc<DeviceRegistry>,
    stats: Arc<StatsTracker>,
    decoder: PayloadDecoder,
    connection: Mutex<Option<Arc<TelemetryConnection>>>,
    /// Held for the whole of `connect` so concurrent callers share one session.
    connect_lock: Mutex<()>,
    session_state: watch::Sender<SessionState>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Build the HTTP clients. Does not contact the vendor.
    pub fn new(config: ControllerConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let api = ApiClient::new(
            config.api_url.clone(),
            config.access_key.clone(),
            config.secret_key.clone(),
            &transport,
        )?;
        let account = AccountClient::new(config.api_url.clone(), &transport)?;
        let (session_state, _) = watch::channel(SessionState::Disconnected);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                api,
                account,
                registry: Arc::new(DeviceRegistry::new()),
                stats: Arc::new(StatsTracker::new()),
                decoder: PayloadDecoder::new(),
                connection: Mutex::new(None),
                connect_lock: Mutex::new(()),
                session_state,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.inner.stats
    }

    // ── Devices ──────────────────────────────────────────────────

    /// Re-read the device list and replace the registry.
    ///
    /// Devices new since the previous refresh are subscribed on the live
    /// broker session, if there is one.
    pub async fn refresh_devices(&self) -> Result<Arc<Vec<Device>>, CoreError> {
        let infos = cancellable(&self.inner.cancel, self.inner.api.list_devices()).await?;
        let devices: Vec<Device> = infos.into_iter().map(Device::from).collect();
        let added = self.inner.registry.replace(devices);
        debug!(
            devices = self.inner.registry.len(),
            added = added.len(),
            "device list refreshed"
        );

        if !added.is_empty() {
            let connection = self.inner.connection.lock().await.clone();
            if let Some(connection) = connection {
                for serial in &added {
                    if let Err(e) = connection.subscribe_device(serial).await {
                        warn!(serial = %serial, error = %e, "failed to subscribe new device");
                    }
                }
            }
        }

        Ok(self.inner.registry.snapshot())
    }

    /// Devices from the last refresh.
    pub fn devices(&self) -> Arc<Vec<Device>> {
        self.inner.registry.snapshot()
    }

    // ── Parameters ───────────────────────────────────────────────

    /// Read a device's quotas, narrowed to `selector` (empty for the whole
    /// envelope).
    pub async fn device_parameters(
        &self,
        serial: &str,
        selector: &str,
    ) -> Result<Map<String, Value>, CoreError> {
        let params = cancellable(
            &self.inner.cancel,
            self.inner.api.get_device_parameters(serial, selector),
        )
        .await?;
        self.inner.stats.record_http_message(serial);
        Ok(params)
    }

    pub async fn device_all_parameters(
        &self,
        serial: &str,
    ) -> Result<Map<String, Value>, CoreError> {
        self.device_parameters(serial, "data").await
    }

    pub async fn set_device_parameter(
        &self,
        request: &CmdSetRequest,
    ) -> Result<CmdSetResponse, CoreError> {
        let response = cancellable(
            &self.inner.cancel,
            self.inner.api.set_device_parameter(request),
        )
        .await?;
        info!(serial = %request.sn, cmd_code = ?request.cmd_code, "device parameter set");
        Ok(response)
    }

    /// Set a micro-inverter's permanent output. The device takes
    /// deci-watts.
    pub async fn set_permanent_watts(
        &self,
        serial: &str,
        watts: f64,
    ) -> Result<CmdSetResponse, CoreError> {
        let request = permanent_watts_request(serial, watts)?;
        self.set_device_parameter(&request).await
    }

    // ── Broker session ───────────────────────────────────────────

    /// Open the broker session and start ingestion.
    ///
    /// Every decoded record is handed to `sink`. Loads the device list
    /// first if it has never been loaded. Calls made while a session is
    /// open, or while another call is opening one, return `Ok` without
    /// starting a second session; their sink is dropped.
    pub async fn connect<S: RecordSink>(&self, sink: S) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let account = config.account.as_ref().ok_or_else(|| CoreError::Config {
            message: "the broker session needs an account email and password".into(),
        })?;
        let _connecting = self.inner.connect_lock.lock().await;
        if self.inner.connection.lock().await.is_some() {
            return Ok(());
        }

        self.inner.session_state.send_replace(SessionState::Connecting);

        if self.inner.registry.last_refresh().is_none() {
            if let Err(e) = self.refresh_devices().await {
                self.inner.session_state.send_replace(SessionState::Disconnected);
                return Err(e);
            }
        }

        let subscriptions: Arc<dyn SubscriptionSource> = self.inner.registry.clone();
        let result = TelemetryConnection::connect(
            &self.inner.account,
            &account.email,
            &account.password,
            config.broker.clone(),
            subscriptions,
            self.inner.cancel.child_token(),
        )
        .await;
        let (connection, queue) = match result {
            Ok(pair) => pair,
            Err(e) => {
                self.inner.session_state.send_replace(SessionState::Disconnected);
                return Err(e.into());
            }
        };

        let connection = Arc::new(connection);
        let state_rx = connection.state_changes();
        *self.inner.connection.lock().await = Some(connection);
        self.inner.session_state.send_replace(*state_rx.borrow());

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(ingest_task(self.clone(), queue, Arc::new(sink))));
        handles.push(tokio::spawn(state_task(
            self.clone(),
            state_rx,
            self.inner.cancel.clone(),
        )));

        let interval = config.refresh_interval;
        if !interval.is_zero() {
            handles.push(tokio::spawn(refresh_task(
                self.clone(),
                interval,
                self.inner.cancel.clone(),
            )));
        }

        info!(devices = self.inner.registry.len(), "telemetry ingestion started");
        Ok(())
    }

    pub fn session_state(&self) -> SessionState {
        *self.inner.session_state.borrow()
    }

    /// Subscribe to broker session state changes.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.inner.session_state.subscribe()
    }

    /// Broker messages dropped because the ingestion queue was full.
    pub async fn dropped_messages(&self) -> u64 {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .map_or(0, |c| c.dropped())
    }

    /// Stop background tasks and close the broker session.
    ///
    /// In-flight HTTP calls return [`CoreError::Cancelled`]. The controller
    /// cannot be reconnected afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let connection = self.inner.connection.lock().await.take();
        if let Some(connection) = connection {
            connection.shutdown().await;
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        self.inner.session_state.send_replace(SessionState::Disconnected);
        debug!("controller shut down");
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Drain the broker queue: count, decode, deliver.
async fn ingest_task(
    controller: Controller,
    mut queue: mpsc::Receiver<BrokerMessage>,
    sink: Arc<dyn RecordSink>,
) {
    let cancel = controller.inner.cancel.clone();
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = queue.recv() => message,
        };
        let Some(message) = message else { break };

        controller.inner.stats.record_broker_message(&message.serial);
        let records =
            controller
                .inner
                .decoder
                .decode(&message.serial, &message.payload, message.received_at);
        debug!(serial = %message.serial, records = records.len(), "broker message decoded");
        for record in records {
            sink.on_record(record);
        }
    }
}

/// Mirror the session's state onto the controller's channel.
async fn state_task(
    controller: Controller,
    mut state_rx: watch::Receiver<SessionState>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                controller.inner.session_state.send_replace(state);
            }
        }
    }
}

async fn refresh_task(controller: Controller, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match controller.refresh_devices().await {
                    Ok(_) | Err(CoreError::Cancelled) => {}
                    Err(e) => warn!(error = %e, "periodic device refresh failed"),
                }
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn permanent_watts_request(serial: &str, watts: f64) -> Result<CmdSetRequest, CoreError> {
    let deci = watts * 10.0;
    if !deci.is_finite() || deci < 0.0 {
        return Err(CoreError::Config {
            message: format!("invalid permanent watts: {watts}"),
        });
    }
    let value = match integral(deci) {
        Some(i) => Value::from(i),
        None => Value::from(deci),
    };

    let mut params = Map::new();
    params.insert("permanentWatts".into(), value);

    Ok(CmdSetRequest::new(Utc::now().timestamp_millis().to_string(), serial, params)
        .with_cmd_code(PERMANENT_WATTS_CMD_CODE))
}
