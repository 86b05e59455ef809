//! HTTP client for the Shelly Gen2 RPC status endpoint.

use std::time::Duration;

use tracing::trace;

use super::{
    error::DeviceError,
    traits::TelemetrySource,
    types::{DeviceResult, SwitchStatus, TelemetrySample},
};

/// RPC path appended to each device's base address.
pub const STATUS_PATH: &str = "/rpc/Switch.GetStatus?id=0";

/// Builds the status URL for a device base address.
pub fn status_url(address: &str) -> String {
    format!("{}{}", address.trim_end_matches('/'), STATUS_PATH)
}

/// Fetches `Switch.GetStatus` over plain HTTP with `reqwest`.
///
/// The underlying connection pool is shared by all devices and all cycles.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
}

impl HttpDeviceClient {
    /// # Errors
    ///
    /// Returns `DeviceError::ClientSetup` if the TLS backend or resolver
    /// cannot be initialised.
    pub fn new() -> DeviceResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shelly-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeviceError::ClientSetup)?;
        Ok(Self { http })
    }

    async fn request(&self, url: &str) -> DeviceResult<TelemetrySample> {
        let transport = |source| DeviceError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.http.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::UnexpectedStatus {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        trace!("Received {} bytes from {}", body.len(), url);

        let payload: SwitchStatus =
            serde_json::from_slice(&body).map_err(|source| DeviceError::Decode {
                url: url.to_string(),
                source,
            })?;

        Ok(payload.into())
    }
}

#[async_trait::async_trait]
impl TelemetrySource for HttpDeviceClient {
    async fn fetch(&self, address: &str, timeout: Duration) -> DeviceResult<TelemetrySample> {
        let url = status_url(address);

        // The deadline covers connect, headers and body alike.
        match tokio::time::timeout(timeout, self.request(&url)).await {
            Ok(result) => result,
            Err(_) => Err(DeviceError::Timeout {
                url,
                timeout_ms: timeout.as_millis(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);

    async fn device_returning(template: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rpc/Switch.GetStatus"))
            .and(query_param("id", "0"))
            .respond_with(template)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn status_url_joins_address_and_path() {
        assert_eq!(
            status_url("http://10.0.0.5"),
            "http://10.0.0.5/rpc/Switch.GetStatus?id=0"
        );
        assert_eq!(
            status_url("http://10.0.0.5/"),
            "http://10.0.0.5/rpc/Switch.GetStatus?id=0"
        );
    }

    #[tokio::test]
    async fn fetch_decodes_status_payload() {
        let server = device_returning(ResponseTemplate::new(200).set_body_json(json!({
            "id": 0,
            "source": "timer",
            "output": true,
            "apower": 12.5,
            "voltage": 230.1,
            "current": 0.054,
            "aenergy": {"total": 10.0, "by_minute": [0.0, 0.0, 0.0], "minute_ts": 1},
            "temperature": {"tC": 32.0, "tF": 89.6}
        })))
        .await;

        let client = HttpDeviceClient::new().unwrap();
        let sample = client.fetch(&server.uri(), TIMEOUT).await.unwrap();

        assert_eq!(sample.power, 12.5);
        assert_eq!(sample.voltage, 230.1);
        assert_eq!(sample.current, 0.054);
        assert_eq!(sample.temperature_celsius, 32.0);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_code() {
        let server = device_returning(ResponseTemplate::new(500)).await;

        let client = HttpDeviceClient::new().unwrap();
        let err = client.fetch(&server.uri(), TIMEOUT).await.unwrap_err();

        assert!(matches!(err, DeviceError::UnexpectedStatus { code: 500, .. }));
        assert_eq!(err.kind(), "unexpected_status");
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server =
            device_returning(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

        let client = HttpDeviceClient::new().unwrap();
        let err = client.fetch(&server.uri(), TIMEOUT).await.unwrap_err();

        assert!(matches!(err, DeviceError::Decode { .. }));
    }

    #[tokio::test]
    async fn slow_device_times_out() {
        let server = device_returning(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "apower": 1.0, "voltage": 1.0, "current": 1.0, "temperature": {"tC": 1.0}
                }))
                .set_delay(Duration::from_secs(5)),
        )
        .await;

        let client = HttpDeviceClient::new().unwrap();
        let started = std::time::Instant::now();
        let err = client
            .fetch(&server.uri(), Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::Timeout { timeout_ms: 200, .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpDeviceClient::new().unwrap();
        let err = client
            .fetch(&format!("http://{}", addr), TIMEOUT)
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::Transport { .. }));
    }
}
