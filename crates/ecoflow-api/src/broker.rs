//! MQTT telemetry session with auto-reconnect.
//!
//! Opens a broker session with credentials from
//! [`AccountClient`](crate::auth::AccountClient), subscribes one topic per
//! known device and pushes every inbound publish onto a bounded
//! [`tokio::sync::mpsc`] queue. A dedicated consumer drains the queue; the
//! broker read path never waits on it. When the queue is full the newest
//! message is dropped and counted.
//!
//! Subscriptions are reissued after every `ConnAck`, so a reconnect never
//! relies on the broker having kept session state.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ecoflow_api::broker::{BrokerConfig, TelemetryConnection};
//! use tokio_util::sync::CancellationToken;
//!
//! let serials: Arc<Vec<String>> = Arc::new(vec!["HW51ZEH49G9X1234".into()]);
//! let (conn, mut rx) = TelemetryConnection::connect(
//!     &account, "me@example.com", &password,
//!     BrokerConfig::default(), serials, CancellationToken::new(),
//! ).await?;
//!
//! while let Some(msg) = rx.recv().await {
//!     println!("{}: {} bytes", msg.serial, msg.payload.len());
//! }
//! conn.shutdown().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS, Transport,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::{AccountClient, BrokerCredentials};
use crate::error::Error;

const TOPIC_PREFIX: &str = "/app/device/property/";
const REQUEST_CHANNEL_CAPACITY: usize = 256;
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Quota dumps routinely exceed the rumqttc default of 10 KiB.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1024 * 1024;

// ── Topics ───────────────────────────────────────────────────────────

/// The per-device property topic, `/app/device/property/<serial>`.
pub fn property_topic(serial: &str) -> String {
    format!("{TOPIC_PREFIX}{serial}")
}

/// Device serial from a topic's trailing path segment.
pub fn serial_from_topic(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}

/// Broker client identifier: `<tag>_<uuid>_<user id>`.
pub fn client_id(tag: &str, user_id: &str) -> String {
    format!("{tag}_{}_{user_id}", uuid::Uuid::new_v4())
}

// ── SessionState ─────────────────────────────────────────────────────

/// Broker session state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

// ── BrokerMessage ────────────────────────────────────────────────────

/// One inbound publish, tagged with the device it belongs to.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    pub topic: String,
    /// Trailing topic segment.
    pub serial: String,
    pub payload: Bytes,
    pub retained: bool,
    pub received_at: DateTime<Utc>,
}

// ── BrokerConfig ─────────────────────────────────────────────────────

/// Broker session tuning.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_reconnect_delay: Duration,
    /// Upper bound on backoff delay. Default: 10 minutes.
    pub max_reconnect_interval: Duration,
    pub keep_alive: Duration,
    /// Capacity of the inbound message queue. Default: 1024.
    pub queue_capacity: usize,
    /// Largest MQTT packet accepted or sent, in bytes. Default: 1 MiB.
    ///
    /// A larger inbound publish fails the event loop and forces a reconnect.
    pub max_packet_size: usize,
    /// Platform tag leading the client identifier.
    pub client_tag: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_interval: Duration::from_secs(600),
            keep_alive: Duration::from_secs(60),
            queue_capacity: 1024,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            client_tag: "ANDROID".into(),
        }
    }
}

// ── SubscriptionSource ───────────────────────────────────────────────

/// Supplies the serials to subscribe after every (re)connect.
///
/// Read fresh on each `ConnAck`; implementations may change between reads.
pub trait SubscriptionSource: Send + Sync {
    fn serials(&self) -> Vec<String>;
}

impl SubscriptionSource for Vec<String> {
    fn serials(&self) -> Vec<String> {
        self.clone()
    }
}

// ── TelemetryConnection ──────────────────────────────────────────────

/// Handle to a running broker session.
///
/// Call [`shutdown`](Self::shutdown) to disconnect and join the session task.
pub struct TelemetryConnection {
    client: AsyncClient,
    client_id: String,
    state: watch::Receiver<SessionState>,
    dropped: Arc<AtomicU64>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryConnection {
    /// Log in, fetch broker credentials and open the session.
    pub async fn connect(
        account: &AccountClient,
        email: &str,
        password: &SecretString,
        config: BrokerConfig,
        subscriptions: Arc<dyn SubscriptionSource>,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<BrokerMessage>), Error> {
        let credentials =
            crate::cancellable(&cancel, account.broker_credentials(email, password)).await?;
        Self::connect_with_credentials(credentials, config, subscriptions, cancel).await
    }

    /// Open the session with already-exchanged credentials.
    ///
    /// Returns once the broker has acknowledged the first connect and the
    /// initial subscriptions are queued.
    pub async fn connect_with_credentials(
        credentials: BrokerCredentials,
        config: BrokerConfig,
        subscriptions: Arc<dyn SubscriptionSource>,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<BrokerMessage>), Error> {
        if credentials.uses_websocket() {
            return Err(Error::BrokerConnect(format!(
                "unsupported broker protocol `{}`",
                credentials.protocol
            )));
        }

        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
        let client_id = client_id(&config.client_tag, &credentials.user_id);
        let options = mqtt_options(&client_id, &credentials, &config);

        info!(
            host = %credentials.host,
            port = credentials.port,
            protocol = %credentials.protocol,
            client_id = %client_id,
            "connecting to broker"
        );

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        // Drive the event loop by hand until the first ConnAck so a bad
        // handshake surfaces to the caller instead of the retry loop.
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                event = eventloop.poll() => event,
            };
            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => break,
                Ok(_) => {}
                Err(e) => {
                    let _ = state_tx.send(SessionState::Disconnected);
                    return Err(Error::BrokerConnect(e.to_string()));
                }
            }
        }

        let _ = state_tx.send(SessionState::Connected);
        info!(client_id = %client_id, "broker connected");
        resubscribe(&client, subscriptions.as_ref());

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let session = Session {
            client: client.clone(),
            subscriptions,
            queue: queue_tx,
            state: state_tx,
            dropped: Arc::clone(&dropped),
            config,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(session.run(eventloop));

        Ok((
            Self {
                client,
                client_id,
                state: state_rx,
                dropped,
                cancel,
                task: Mutex::new(Some(task)),
            },
            queue_rx,
        ))
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Subscribe the property topic of one device on the live session.
    pub async fn subscribe_device(&self, serial: &str) -> Result<(), Error> {
        let topic = property_topic(serial);
        self.client
            .subscribe(topic.as_str(), QoS::AtLeastOnce)
            .await
            .map_err(|e| Error::BrokerSubscribe {
                topic: topic.clone(),
                reason: e.to_string(),
            })?;
        info!(serial, "subscribed to device properties");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Disconnect and wait for the session task to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
    }
}

fn mqtt_options(
    client_id: &str,
    credentials: &BrokerCredentials,
    config: &BrokerConfig,
) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, credentials.host.as_str(), credentials.port);
    options.set_credentials(
        credentials.account.as_str(),
        credentials.password.expose_secret(),
    );
    options.set_keep_alive(config.keep_alive);
    options.set_clean_session(true);
    options.set_max_packet_size(config.max_packet_size, config.max_packet_size);
    if credentials.uses_tls() {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

/// Queue a subscribe for every known serial.
///
/// Uses the non-blocking request path: this runs on the event-loop task,
/// which is the only thing draining the request channel.
fn resubscribe(client: &AsyncClient, subscriptions: &dyn SubscriptionSource) {
    for serial in subscriptions.serials() {
        let topic = property_topic(&serial);
        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => info!(serial = %serial, "subscribing to device properties"),
            Err(e) => error!(serial = %serial, error = %e, "unable to subscribe"),
        }
    }
}

// ── Background session loop ──────────────────────────────────────────

struct Session {
    client: AsyncClient,
    subscriptions: Arc<dyn SubscriptionSource>,
    queue: mpsc::Sender<BrokerMessage>,
    state: watch::Sender<SessionState>,
    dropped: Arc<AtomicU64>,
    config: BrokerConfig,
    cancel: CancellationToken,
}

impl Session {
    /// Main loop: poll → dispatch → on error, backoff → poll again.
    ///
    /// `rumqttc` reconnects on the next `poll()` after an error.
    async fn run(self, mut eventloop: EventLoop) {
        let mut attempt: u32 = 0;

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if attempt > 0 {
                        info!(attempt, "broker reconnected");
                    }
                    debug!(code = ?ack.code, session_present = ack.session_present, "connack");
                    attempt = 0;
                    let _ = self.state.send(SessionState::Connected);
                    resubscribe(&self.client, self.subscriptions.as_ref());
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    dispatch(&publish, &self.queue, &self.dropped);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(pkid = ack.pkid, "suback");
                }
                Ok(_) => {}
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    if attempt == 1 {
                        error!(error = %e, "broker connection lost");
                    } else {
                        warn!(error = %e, attempt, "broker reconnect failed");
                    }
                    let _ = self.state.send(SessionState::Reconnecting { attempt });

                    let delay = calculate_backoff(attempt - 1, &self.config);
                    debug!(
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        attempt,
                        "waiting before reconnect"
                    );
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                    info!(attempt, "reconnecting to broker");
                }
            }
        }

        self.disconnect(&mut eventloop).await;
        let _ = self.state.send(SessionState::Disconnected);
        debug!("broker session loop exiting");
    }

    /// Best-effort clean DISCONNECT.
    async fn disconnect(&self, eventloop: &mut EventLoop) {
        if self.client.try_disconnect().is_err() {
            return;
        }
        let flush = async {
            while let Ok(event) = eventloop.poll().await {
                if matches!(event, Event::Outgoing(Outgoing::Disconnect)) {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(DISCONNECT_GRACE, flush).await;
    }
}

/// Push one publish onto the queue without waiting.
///
/// Returns `false` when the message was dropped.
fn dispatch(publish: &Publish, queue: &mpsc::Sender<BrokerMessage>, dropped: &AtomicU64) -> bool {
    let message = BrokerMessage {
        serial: serial_from_topic(&publish.topic).to_owned(),
        topic: publish.topic.clone(),
        payload: publish.payload.clone(),
        retained: publish.retain,
        received_at: Utc::now(),
    };

    match queue.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                serial = %message.serial,
                dropped = total,
                "telemetry queue full, dropping message"
            );
            false
        }
        Err(mpsc::error::TrySendError::Closed(message)) => {
            debug!(serial = %message.serial, "telemetry queue closed, discarding message");
            false
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter, capped at `max_reconnect_interval`.
///
/// `delay = min(min(initial * 2^attempt, max) * jitter, max)`
fn calculate_backoff(attempt: u32, config: &BrokerConfig) -> Duration {
    let max = config.max_reconnect_interval.as_secs_f64();
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_reconnect_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(max);

    // Deterministic spread of +-25% seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).clamp(0.0, max);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
