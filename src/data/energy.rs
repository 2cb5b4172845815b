//! Octopus Energy consumption client
//!
//! Fetches half-hourly meter readings and summarises them into a total,
//! a cost at the configured unit rate, and a ten point usage chart.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::{EnergyData, EnergyKind, EnergyPeriod};

/// Base URL for the Octopus Energy API
const OCTOPUS_BASE_URL: &str = "https://api.octopus.energy";

/// Number of points in the usage chart
pub const CHART_POINTS: usize = 10;

/// Errors that can occur when fetching consumption
#[derive(Debug, Error)]
pub enum EnergyError {
    #[error("No Octopus API key configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Octopus API returned HTTP {0}")]
    Status(u16),
}

/// Unit rates and the gas volume conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tariff {
    /// £ per kWh
    pub electricity_rate: f64,
    /// £ per kWh
    pub gas_rate: f64,
    /// kWh per m³ of gas
    pub gas_conversion: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            electricity_rate: 0.2450,
            gas_rate: 0.0614,
            gas_conversion: 11.1868,
        }
    }
}

impl Tariff {
    fn rate(&self, kind: EnergyKind) -> f64 {
        match kind {
            EnergyKind::Electricity => self.electricity_rate,
            EnergyKind::Gas => self.gas_rate,
        }
    }

    /// Readings are kWh for electricity and m³ for gas
    fn to_kwh(&self, kind: EnergyKind, reading: f64) -> f64 {
        match kind {
            EnergyKind::Electricity => reading,
            EnergyKind::Gas => reading * self.gas_conversion,
        }
    }
}

/// Meter identifiers for both fuels
#[derive(Debug, Clone, Default)]
pub struct Meters {
    pub api_key: String,
    pub mpan: String,
    pub electricity_serial: String,
    pub mprn: String,
    pub gas_serial: String,
}

/// Client for the Octopus consumption endpoints
#[derive(Debug, Clone)]
pub struct EnergyClient {
    client: Client,
    base_url: String,
    meters: Meters,
    tariff: Tariff,
}

#[derive(Debug, Deserialize)]
struct ConsumptionPage {
    #[serde(default)]
    results: Vec<Reading>,
}

#[derive(Debug, Deserialize)]
struct Reading {
    consumption: f64,
}

impl EnergyClient {
    pub fn new(client: Client, meters: Meters, tariff: Tariff) -> Self {
        Self {
            client,
            base_url: OCTOPUS_BASE_URL.to_string(),
            meters,
            tariff,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, kind: EnergyKind, period: EnergyPeriod) -> String {
        let base = self.base_url.trim_end_matches('/');
        let meter_path = match kind {
            EnergyKind::Electricity => format!(
                "electricity-meter-points/{}/meters/{}",
                self.meters.mpan, self.meters.electricity_serial
            ),
            EnergyKind::Gas => format!(
                "gas-meter-points/{}/meters/{}",
                self.meters.mprn, self.meters.gas_serial
            ),
        };
        format!(
            "{}/v1/{}/consumption/?page_size={}",
            base,
            meter_path,
            period.half_hours()
        )
    }

    /// Fetch and summarise consumption for one fuel over one period
    pub async fn fetch_usage(
        &self,
        kind: EnergyKind,
        period: EnergyPeriod,
    ) -> Result<EnergyData, EnergyError> {
        if self.meters.api_key.trim().is_empty() {
            return Err(EnergyError::NotConfigured);
        }

        let response = self
            .client
            .get(self.url(kind, period))
            .basic_auth(&self.meters.api_key, Some(""))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnergyError::Status(status.as_u16()));
        }

        let page: ConsumptionPage = response.json().await?;
        let readings: Vec<f64> = page.results.iter().map(|r| r.consumption).collect();
        tracing::debug!(
            %kind,
            period = period.as_str(),
            readings = readings.len(),
            "consumption fetched"
        );

        Ok(summarize(&readings, kind, &self.tariff))
    }
}

/// Summarise newest-first readings into an `EnergyData`
///
/// # Arguments
/// * `readings` - Consumption values as returned by the API (newest first)
/// * `kind` - Fuel, gas readings are converted from m³ to kWh
/// * `tariff` - Unit rates and conversion factor
///
/// # Returns
/// Rounded total and cost plus ten chronological chart points
pub fn summarize(readings: &[f64], kind: EnergyKind, tariff: &Tariff) -> EnergyData {
    if readings.is_empty() {
        return EnergyData {
            value: 0,
            cost: 0.0,
            unit: "kWh".to_string(),
            chart: vec![0.0; CHART_POINTS],
        };
    }

    let total = tariff.to_kwh(kind, readings.iter().sum());
    let cost = total * tariff.rate(kind);

    let chunk = (readings.len() / CHART_POINTS).max(1);
    let mut chart: Vec<f64> = (0..CHART_POINTS)
        .map(|i| {
            let start = (i * chunk).min(readings.len());
            let end = ((i + 1) * chunk).min(readings.len());
            tariff.to_kwh(kind, readings[start..end].iter().sum())
        })
        .collect();
    chart.reverse();

    EnergyData {
        value: total.round().max(0.0) as u64,
        cost: (cost * 100.0).round() / 100.0,
        unit: "kWh".to_string(),
        chart,
    }
}
