// ecoflow-api: Async Rust client for the EcoFlow IoT open API and MQTT broker

pub mod auth;
pub mod broker;
pub mod client;
pub mod error;
pub mod models;
pub mod signing;
pub mod transport;

use std::future::Future;

use tokio_util::sync::CancellationToken;

pub use auth::{AccountClient, BrokerCredentials, LoginSession};
pub use broker::{
    BrokerConfig, BrokerMessage, DEFAULT_MAX_PACKET_SIZE, SessionState, SubscriptionSource, TelemetryConnection,
};
pub use client::ApiClient;
pub use error::Error;
pub use models::{CmdSetRequest, CmdSetResponse, DeviceInfo, ModuleType};
pub use signing::{SignedRequest, Signer};
pub use transport::{TlsMode, TransportConfig};

/// Race `fut` against `token`.
///
/// When the token fires first the future is dropped, which aborts any
/// in-flight HTTP call, and [`Error::Cancelled`] is returned.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn cancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), Error> = cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn completed_future_passes_through() {
        let token = CancellationToken::new();
        let result = cancellable(&token, async { Ok::<_, Error>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
