//! Core data models for the home dashboard
//!
//! This module contains the data types shown on the dashboard cards and the
//! API clients that produce them. Every type here is persisted through the
//! cache, so each implements `Cacheable`.

pub mod calendar;
pub mod energy;
pub mod meals;
pub mod purifier;
pub mod status;
pub mod weather;

pub use calendar::{CalendarClient, CalendarError};
pub use energy::{EnergyClient, EnergyError, Meters, Tariff};
pub use meals::{MealsClient, MealsCredentials, MealsError};
pub use purifier::{PurifierClient, PurifierError};
pub use status::{StatusClient, StatusError};
pub use weather::{WeatherClient, WeatherError};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::cache::Cacheable;

/// Builds the HTTP client shared by all data clients
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("homedash/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            Client::new()
        })
}

/// Current weather conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Current temperature in Celsius
    pub temperature_c: f64,
    /// Feels-like temperature in Celsius
    pub feels_like_c: f64,
    /// Current weather condition
    pub condition: WeatherCondition,
    /// Provider's description, e.g. "Partly cloudy"
    pub description: String,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Wind speed in km/h
    pub wind_kmph: f64,
}

impl Cacheable for WeatherReport {}

/// Types of weather conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Rain,
    Showers,
    Thunderstorm,
    Snow,
    Fog,
}

/// Where an agenda line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Calendar,
    Meal,
}

/// A single agenda line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEvent {
    /// "All day" or a 24h "HH:MM" start time
    pub time: String,
    pub title: String,
    pub kind: EventKind,
}

/// Label used for events without a start time
pub const ALL_DAY: &str = "All day";

/// Calendar events for today and tomorrow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agenda {
    pub today: Vec<DashboardEvent>,
    pub tomorrow: Vec<DashboardEvent>,
}

impl Cacheable for Agenda {}

/// Dishes planned for one meal slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealSlot {
    /// Capitalized slot name, e.g. "Dinner"
    pub slot: String,
    pub dishes: Vec<String>,
}

/// Planned meals for today and tomorrow, in slot order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealPlan {
    pub today: Vec<MealSlot>,
    pub tomorrow: Vec<MealSlot>,
}

impl Cacheable for MealPlan {}

/// Metered fuel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyKind {
    Electricity,
    Gas,
}

impl EnergyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyKind::Electricity => "electricity",
            EnergyKind::Gas => "gas",
        }
    }
}

impl fmt::Display for EnergyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consumption window shown on an energy card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyPeriod {
    #[default]
    Day,
    Week,
    Month,
}

impl EnergyPeriod {
    /// Cycles Day -> Week -> Month -> Day
    pub fn next(self) -> Self {
        match self {
            EnergyPeriod::Day => EnergyPeriod::Week,
            EnergyPeriod::Week => EnergyPeriod::Month,
            EnergyPeriod::Month => EnergyPeriod::Day,
        }
    }

    /// Number of half-hourly readings covering the period
    pub fn half_hours(&self) -> u32 {
        match self {
            EnergyPeriod::Day => 48,
            EnergyPeriod::Week => 336,
            EnergyPeriod::Month => 1440,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyPeriod::Day => "day",
            EnergyPeriod::Week => "week",
            EnergyPeriod::Month => "month",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnergyPeriod::Day => "Day",
            EnergyPeriod::Week => "Week",
            EnergyPeriod::Month => "Month",
        }
    }
}

/// Consumption summary for one fuel over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyData {
    /// Total consumption, rounded to whole units
    pub value: u64,
    /// Cost in pounds, rounded to pence
    pub cost: f64,
    pub unit: String,
    /// Ten chronological points for the usage chart
    pub chart: Vec<f64>,
}

impl Cacheable for EnergyData {}

/// Air purifier state as reported by the local dashboard API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurifierData {
    pub name: String,
    #[serde(rename = "type")]
    pub model: String,
    pub power: bool,
    pub mode: Option<String>,
    pub fan_level: u8,
    /// Remaining filter life, percent
    pub filter_life: u8,
    pub display: bool,
    pub supports_air_quality: bool,
    pub air_quality: Option<u32>,
    pub error: Option<String>,
}

impl Cacheable for PurifierData {}

/// Reachability and state of a device on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// `None` when the status could not be determined
    pub online: Option<bool>,
    /// Free-form state such as "on", "standby", "connected"
    pub state: String,
}

impl Cacheable for DeviceStatus {}

/// Status light shown next to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Unknown,
    Offline,
    /// Online with the screen on
    Active,
    Online,
}

impl DeviceStatus {
    pub fn indicator(&self) -> Indicator {
        match self.online {
            None => Indicator::Unknown,
            Some(false) => Indicator::Offline,
            Some(true) if self.state == "on" => Indicator::Active,
            Some(true) => Indicator::Online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_period_cycles() {
        assert_eq!(EnergyPeriod::Day.next(), EnergyPeriod::Week);
        assert_eq!(EnergyPeriod::Week.next(), EnergyPeriod::Month);
        assert_eq!(EnergyPeriod::Month.next(), EnergyPeriod::Day);
    }

    #[test]
    fn test_energy_period_half_hours() {
        assert_eq!(EnergyPeriod::Day.half_hours(), 48);
        assert_eq!(EnergyPeriod::Week.half_hours(), 336);
        assert_eq!(EnergyPeriod::Month.half_hours(), 1440);
    }

    #[test]
    fn test_device_indicator() {
        let status = |online, state: &str| DeviceStatus {
            online,
            state: state.to_string(),
        };
        assert_eq!(status(None, "no api").indicator(), Indicator::Unknown);
        assert_eq!(status(Some(false), "").indicator(), Indicator::Offline);
        assert_eq!(status(Some(true), "on").indicator(), Indicator::Active);
        assert_eq!(status(Some(true), "standby").indicator(), Indicator::Online);
    }

    #[test]
    fn test_purifier_data_reads_type_field() {
        let json = r#"{
            "name": "Bedroom",
            "type": "Core 300S",
            "power": true,
            "mode": "sleep",
            "fan_level": 1,
            "filter_life": 64,
            "display": false,
            "supports_air_quality": true,
            "air_quality": 3
        }"#;
        let data: PurifierData = serde_json::from_str(json).expect("Failed to parse purifier");
        assert_eq!(data.model, "Core 300S");
        assert_eq!(data.mode.as_deref(), Some("sleep"));
        assert_eq!(data.air_quality, Some(3));
        assert!(data.error.is_none());
    }

    #[test]
    fn test_event_kind_serializes_lowercase() {
        let event = DashboardEvent {
            time: ALL_DAY.to_string(),
            title: "Bins".to_string(),
            kind: EventKind::Calendar,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"calendar""#));
    }
}
