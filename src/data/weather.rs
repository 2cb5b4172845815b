//! wttr.in weather API client
//!
//! This module fetches current conditions from wttr.in's JSON (`format=j1`)
//! endpoint and parses them into a `WeatherReport`.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::{WeatherCondition, WeatherReport};

/// Base URL for the wttr.in API
const WTTR_BASE_URL: &str = "https://wttr.in";

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Weather service returned HTTP {0}")]
    Status(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// A numeric field did not contain a number
    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Client for fetching weather data from wttr.in
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    location: String,
}

impl WeatherClient {
    /// Create a new WeatherClient for a location name, e.g. "Princes Risborough"
    pub fn new(client: Client, location: impl Into<String>) -> Self {
        Self {
            client,
            base_url: WTTR_BASE_URL.to_string(),
            location: location.into(),
        }
    }

    /// Point the client at another server (tests, mirrors)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn url(&self) -> String {
        format!(
            "{}/{}?format=j1",
            self.base_url.trim_end_matches('/'),
            self.location.trim().replace(' ', "+")
        )
    }

    /// Fetch current weather for the configured location
    pub async fn fetch_weather(&self) -> Result<WeatherReport, WeatherError> {
        let response = self.client.get(self.url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let api_response: WttrResponse = serde_json::from_str(&text)?;

        parse_response(api_response)
    }
}

/// Parse the wttr.in response into a WeatherReport
fn parse_response(response: WttrResponse) -> Result<WeatherReport, WeatherError> {
    let current = response
        .current_condition
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::MissingField("current_condition".to_string()))?;

    let description = current
        .weather_desc
        .first()
        .map(|d| d.value.trim().to_string())
        .unwrap_or_default();
    let code: u16 = parse_number("weatherCode", &current.weather_code)?;

    Ok(WeatherReport {
        temperature_c: parse_number("temp_C", &current.temp_c)?,
        feels_like_c: parse_number("FeelsLikeC", &current.feels_like_c)?,
        condition: condition_for(code, &description),
        humidity: parse_number("humidity", &current.humidity)?,
        wind_kmph: parse_number("windspeedKmph", &current.windspeed_kmph)?,
        description,
    })
}

/// wttr.in sends numbers as strings
fn parse_number<N: std::str::FromStr>(field: &'static str, value: &str) -> Result<N, WeatherError> {
    value
        .trim()
        .parse()
        .map_err(|_| WeatherError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

/// Map a WWO weather code to a WeatherCondition, falling back to the text
///
/// Codes used by wttr.in:
/// - 113: Clear/Sunny
/// - 116: Partly cloudy
/// - 119, 122: Cloudy, Overcast
/// - 143, 248, 260: Mist, Fog
/// - 176, 353-359: Rain showers
/// - 263-314: Drizzle, Rain (incl. freezing)
/// - 179-182, 227-230, 317-338, 350, 362-377: Snow, Sleet, Ice
/// - 200, 386-395: Thunder
pub fn condition_for(code: u16, description: &str) -> WeatherCondition {
    match code {
        113 => WeatherCondition::Clear,
        116 => WeatherCondition::PartlyCloudy,
        119 | 122 => WeatherCondition::Cloudy,
        143 | 248 | 260 => WeatherCondition::Fog,
        176 | 353..=359 => WeatherCondition::Showers,
        185 | 263..=314 => WeatherCondition::Rain,
        179 | 182 | 227 | 230 | 317..=338 | 350 | 362..=377 => WeatherCondition::Snow,
        200 | 386..=395 => WeatherCondition::Thunderstorm,
        _ => condition_from_description(description),
    }
}

fn condition_from_description(description: &str) -> WeatherCondition {
    let text = description.to_lowercase();
    if text.contains("thunder") {
        WeatherCondition::Thunderstorm
    } else if text.contains("snow") || text.contains("sleet") {
        WeatherCondition::Snow
    } else if text.contains("shower") {
        WeatherCondition::Showers
    } else if text.contains("rain") || text.contains("drizzle") {
        WeatherCondition::Rain
    } else if text.contains("fog") || text.contains("mist") {
        WeatherCondition::Fog
    } else if text.contains("cloud") || text.contains("overcast") {
        WeatherCondition::Cloudy
    } else if text.contains("sun") || text.contains("clear") {
        WeatherCondition::Clear
    } else {
        WeatherCondition::Cloudy
    }
}

/// wttr.in `format=j1` response structure
#[derive(Debug, Deserialize)]
struct WttrResponse {
    current_condition: Vec<CurrentCondition>,
}

#[derive(Debug, Deserialize)]
struct CurrentCondition {
    #[serde(rename = "temp_C")]
    temp_c: String,
    #[serde(rename = "FeelsLikeC")]
    feels_like_c: String,
    humidity: String,
    #[serde(rename = "weatherCode")]
    weather_code: String,
    #[serde(rename = "weatherDesc", default)]
    weather_desc: Vec<TextValue>,
    #[serde(rename = "windspeedKmph")]
    windspeed_kmph: String,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}
