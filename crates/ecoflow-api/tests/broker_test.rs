// Integration tests for the broker session against a minimal in-process
// MQTT 3.1.1 broker on a local TCP socket.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ecoflow_api::{
    AccountClient, BrokerConfig, BrokerCredentials, Error, SessionState, SubscriptionSource,
    TelemetryConnection, TransportConfig,
};

const WAIT: Duration = Duration::from_secs(5);

// ── Fake broker ─────────────────────────────────────────────────────

/// Read one MQTT control packet: fixed-header byte and body.
async fn read_packet(stream: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = stream.read_u8().await?;
    let mut len = 0_usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        len |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0; len];
    stream.read_exact(&mut body).await?;
    Ok((header, body))
}

fn encode_remaining_length(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = u8::try_from(len % 128).unwrap();
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

/// Accept a client, check its CONNECT and answer with an accepting CONNACK.
async fn accept_session(listener: &TcpListener) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    let (header, _) = read_packet(&mut stream).await.unwrap();
    assert_eq!(header >> 4, 1, "expected CONNECT, got {header:#04x}");
    stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
    stream
}

/// Wait for the next SUBSCRIBE, acknowledge it and return its topic.
async fn expect_subscribe(stream: &mut TcpStream) -> String {
    loop {
        let (header, body) = read_packet(stream).await.unwrap();
        if header >> 4 != 8 {
            continue;
        }
        let topic_len = usize::from(u16::from_be_bytes([body[2], body[3]]));
        let topic = String::from_utf8(body[4..4 + topic_len].to_vec()).unwrap();
        stream
            .write_all(&[0x90, 0x03, body[0], body[1], 0x01])
            .await
            .unwrap();
        return topic;
    }
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x30];
    encode_remaining_length(2 + topic.len() + payload.len(), &mut packet);
    packet.extend_from_slice(&u16::try_from(topic.len()).unwrap().to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

// ── Helpers ─────────────────────────────────────────────────────────

fn credentials(port: u16, protocol: &str) -> BrokerCredentials {
    BrokerCredentials {
        account: "acct".into(),
        password: SecretString::from("pw"),
        host: "127.0.0.1".into(),
        port,
        protocol: protocol.into(),
        user_id: "1234567890".into(),
    }
}

fn serials(list: &[&str]) -> Arc<dyn SubscriptionSource> {
    Arc::new(list.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>())
}

async fn local_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

// ── Delivery ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_publish_larger_than_rumqttc_default_is_delivered() {
    let (listener, port) = local_listener().await;
    let payload_len = 200 * 1024;

    let broker = tokio::spawn(async move {
        let mut stream = accept_session(&listener).await;
        let topic = expect_subscribe(&mut stream).await;
        let payload = vec![b'x'; payload_len];
        stream
            .write_all(&publish_packet(&topic, &payload))
            .await
            .unwrap();
        stream
    });

    let (conn, mut rx) = TelemetryConnection::connect_with_credentials(
        credentials(port, "mqtt"),
        BrokerConfig::default(),
        serials(&["DEV1"]),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let message = tokio::time::timeout(WAIT, rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.serial, "DEV1");
    assert_eq!(message.topic, "/app/device/property/DEV1");
    assert_eq!(message.payload.len(), payload_len);
    assert_eq!(conn.state(), SessionState::Connected);
    assert_eq!(conn.dropped(), 0);

    let _stream = broker.await.unwrap();
    conn.shutdown().await;
}

// ── Reconnect ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscriptions_reissued_after_reconnect() {
    let (listener, port) = local_listener().await;

    let broker = tokio::spawn(async move {
        let mut first = accept_session(&listener).await;
        let before = vec![
            expect_subscribe(&mut first).await,
            expect_subscribe(&mut first).await,
        ];
        drop(first);

        let mut second = accept_session(&listener).await;
        let after = vec![
            expect_subscribe(&mut second).await,
            expect_subscribe(&mut second).await,
        ];
        (before, after, second)
    });

    let config = BrokerConfig {
        initial_reconnect_delay: Duration::from_millis(300),
        ..BrokerConfig::default()
    };
    let (conn, _rx) = TelemetryConnection::connect_with_credentials(
        credentials(port, "mqtt"),
        config,
        serials(&["DEV1", "DEV2"]),
        CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(conn.state(), SessionState::Connected);

    let mut states = conn.state_changes();
    let reconnecting = tokio::time::timeout(
        WAIT,
        states.wait_for(|s| matches!(s, SessionState::Reconnecting { .. })),
    )
    .await
    .unwrap()
    .map(|s| *s)
    .unwrap();
    assert_eq!(reconnecting, SessionState::Reconnecting { attempt: 1 });

    tokio::time::timeout(WAIT, states.wait_for(|s| *s == SessionState::Connected))
        .await
        .unwrap()
        .unwrap();

    let (before, after, _stream) = tokio::time::timeout(WAIT, broker).await.unwrap().unwrap();
    let expected = vec![
        "/app/device/property/DEV1".to_owned(),
        "/app/device/property/DEV2".to_owned(),
    ];
    assert_eq!(before, expected);
    assert_eq!(after, expected);

    conn.shutdown().await;
    assert_eq!(conn.state(), SessionState::Disconnected);
}

// ── Connect failures ────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_during_login_cancels_connect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    let account =
        AccountClient::new(Url::parse(&server.uri()).unwrap(), &TransportConfig::default())
            .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        WAIT,
        TelemetryConnection::connect(
            &account,
            "user@example.com",
            &SecretString::from("hunter2"),
            BrokerConfig::default(),
            serials(&["DEV1"]),
            cancel,
        ),
    )
    .await
    .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_websocket_protocol_is_rejected() {
    let result = TelemetryConnection::connect_with_credentials(
        credentials(8084, "wss"),
        BrokerConfig::default(),
        serials(&["DEV1"]),
        CancellationToken::new(),
    )
    .await;
    match result {
        Err(Error::BrokerConnect(reason)) => assert!(reason.contains("wss"), "{reason}"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("websocket protocol should be rejected"),
    }
}
