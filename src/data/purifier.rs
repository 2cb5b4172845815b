//! Air purifier client for the local dashboard API

use reqwest::Client;
use thiserror::Error;

use super::PurifierData;

/// Errors that can occur when reading the purifier
#[derive(Debug, Error)]
pub enum PurifierError {
    /// The API answered but reported a device problem
    #[error("{0}")]
    Device(String),

    /// The API could not be reached or answered garbage
    #[error("Cannot connect to API")]
    Unreachable(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct PurifierClient {
    client: Client,
    api_url: String,
}

impl PurifierClient {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Fetch the current purifier state
    pub async fn fetch_status(&self) -> Result<PurifierData, PurifierError> {
        let url = format!("{}/api/purifier", self.api_url.trim_end_matches('/'));
        let data: PurifierData = self
            .client
            .get(url)
            .send()
            .await
            .map_err(PurifierError::Unreachable)?
            .json()
            .await
            .map_err(PurifierError::Unreachable)?;

        match data.error {
            Some(message) => Err(PurifierError::Device(message)),
            None => Ok(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: serde_json::Value) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/purifier"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[tokio::test]
    async fn test_fetch_status() {
        let mock_server = serve(serde_json::json!({
            "name": "Living room",
            "type": "Core 400S",
            "power": true,
            "mode": "auto",
            "fan_level": 2,
            "filter_life": 81,
            "display": true,
            "supports_air_quality": true,
            "air_quality": 1,
            "error": null
        }))
        .await;

        let client = PurifierClient::new(Client::new(), mock_server.uri());
        let data = client.fetch_status().await.expect("fetch failed");
        assert_eq!(data.name, "Living room");
        assert_eq!(data.fan_level, 2);
        assert_eq!(data.filter_life, 81);
    }

    #[tokio::test]
    async fn test_device_error_is_reported() {
        let mock_server = serve(serde_json::json!({"error": "Device offline"})).await;

        let client = PurifierClient::new(Client::new(), mock_server.uri());
        match client.fetch_status().await {
            Err(PurifierError::Device(message)) => assert_eq!(message, "Device offline"),
            other => panic!("Expected Device error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        // nothing listens on port 9 locally
        let client = PurifierClient::new(Client::new(), "http://127.0.0.1:9");
        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(err, PurifierError::Unreachable(_)));
        assert_eq!(err.to_string(), "Cannot connect to API");
    }
}
