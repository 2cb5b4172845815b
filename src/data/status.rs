//! Local network device status
//!
//! Devices are polled through the local control API; the network card is a
//! plain reachability probe.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::DeviceStatus;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("no api")]
    Unreachable(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct StatusClient {
    client: Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    online: bool,
    #[serde(default)]
    state: Option<String>,
}

impl StatusClient {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Fetch the status of one device
    ///
    /// A non-success answer or an unreadable body yields an unknown status
    /// rather than an error; only a missing API is an error.
    pub async fn fetch_device(&self, device_id: &str) -> Result<DeviceStatus, StatusError> {
        let url = format!(
            "{}/api/firetv/{}/status",
            self.api_url.trim_end_matches('/'),
            device_id
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(StatusError::Unreachable)?;

        if !response.status().is_success() {
            return Ok(unavailable());
        }
        match response.json::<StatusResponse>().await {
            Ok(body) => Ok(DeviceStatus {
                online: Some(body.online),
                state: body.state.unwrap_or_default(),
            }),
            Err(e) => {
                tracing::debug!(device = device_id, error = %e, "unreadable status body");
                Ok(unavailable())
            }
        }
    }

    /// Probe a URL and report the network as connected on any answer
    pub async fn probe_network(&self, probe_url: &str) -> DeviceStatus {
        match self.client.head(probe_url).send().await {
            Ok(_) => DeviceStatus {
                online: Some(true),
                state: "connected".to_string(),
            },
            Err(e) => {
                tracing::debug!(url = probe_url, error = %e, "network probe failed");
                DeviceStatus {
                    online: Some(false),
                    state: "disconnected".to_string(),
                }
            }
        }
    }
}

fn unavailable() -> DeviceStatus {
    DeviceStatus {
        online: None,
        state: "unavailable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Indicator;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_device_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/firetv/lounge/status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"online": true, "state": "on"})),
            )
            .mount(&mock_server)
            .await;

        let client = StatusClient::new(Client::new(), mock_server.uri());
        let status = client.fetch_device("lounge").await.expect("fetch failed");
        assert_eq!(status.indicator(), Indicator::Active);
    }

    #[tokio::test]
    async fn test_unknown_device_is_unavailable() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = StatusClient::new(Client::new(), mock_server.uri());
        let status = client.fetch_device("bedroom").await.expect("fetch failed");
        assert_eq!(status.online, None);
        assert_eq!(status.state, "unavailable");
    }

    #[tokio::test]
    async fn test_missing_api_is_error() {
        let client = StatusClient::new(Client::new(), "http://127.0.0.1:9");
        let err = client.fetch_device("lounge").await.unwrap_err();
        assert_eq!(err.to_string(), "no api");
    }

    #[tokio::test]
    async fn test_probe_network() {
        let mock_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = StatusClient::new(Client::new(), "");
        let up = client.probe_network(&mock_server.uri()).await;
        assert_eq!(up.indicator(), Indicator::Online);
        assert_eq!(up.state, "connected");

        let down = client.probe_network("http://127.0.0.1:9").await;
        assert_eq!(down.indicator(), Indicator::Offline);
    }
}
