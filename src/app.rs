//! Application state management for homedash
//!
//! This module contains the main application state: one cache handle per
//! dashboard card, keyboard handling, and the periodic revalidation driven by
//! the refresh ticker.

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use std::convert::Infallible;
use std::time::Duration;

use crate::cache::{fetcher, CacheHandle, Fetcher, SwrCache};
use crate::config::{Config, TtlConfig};
use crate::data::{
    http_client, Agenda, CalendarClient, DeviceStatus, EnergyClient, EnergyData, EnergyKind,
    EnergyPeriod, MealPlan, MealsClient, PurifierClient, PurifierData, StatusClient,
    WeatherClient, WeatherReport,
};

pub const WEATHER_KEY: &str = "weather-current";
pub const CALENDAR_KEY: &str = "calendar-events";
pub const MEALS_KEY: &str = "viki-meals";
pub const PURIFIER_KEY: &str = "purifier-status";
pub const NETWORK_KEY: &str = "network-status";

/// Cache key for one fuel and period, e.g. `energy-gas-week`
pub fn energy_key(kind: EnergyKind, period: EnergyPeriod) -> String {
    format!("energy-{}-{}", kind.as_str(), period.as_str())
}

/// Cache key for a local device
pub fn device_key(device_id: &str) -> String {
    format!("device-status-{}", device_id)
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// API clients shared by the cards
#[derive(Debug, Clone)]
pub struct Clients {
    pub weather: WeatherClient,
    pub calendar: CalendarClient,
    pub meals: MealsClient,
    pub energy: EnergyClient,
    pub purifier: PurifierClient,
    pub status: StatusClient,
}

impl Clients {
    pub fn from_config(config: &Config) -> Self {
        let http = http_client(config.http.timeout());
        Self {
            weather: WeatherClient::new(http.clone(), config.weather.location.clone()),
            calendar: CalendarClient::new(http.clone(), config.calendar.ics_url.clone()),
            meals: MealsClient::new(http.clone(), config.meals.credentials()),
            energy: EnergyClient::new(http.clone(), config.energy.meters(), config.energy.tariff()),
            purifier: PurifierClient::new(http.clone(), config.purifier.api_url.clone()),
            status: StatusClient::new(http, config.devices.api_url.clone()),
        }
    }
}

fn energy_fetcher(
    client: &EnergyClient,
    kind: EnergyKind,
    period: EnergyPeriod,
) -> Fetcher<EnergyData> {
    let client = client.clone();
    fetcher(move || {
        let client = client.clone();
        async move { client.fetch_usage(kind, period).await }
    })
}

/// An energy card and the period it currently shows
pub struct EnergyCard {
    pub kind: EnergyKind,
    pub period: EnergyPeriod,
    pub handle: CacheHandle<EnergyData>,
}

impl EnergyCard {
    fn watch(
        cache: &SwrCache,
        client: &EnergyClient,
        kind: EnergyKind,
        period: EnergyPeriod,
        ttl: Duration,
    ) -> Self {
        Self {
            kind,
            period,
            handle: cache.watch_with(
                energy_key(kind, period),
                ttl,
                energy_fetcher(client, kind, period),
            ),
        }
    }

    /// Switch to the next period; the new key is loaded from cache or fetched
    pub fn cycle_period(&mut self, client: &EnergyClient) {
        self.period = self.period.next();
        let ttl = self.handle.ttl();
        self.handle.reconfigure_with(
            energy_key(self.kind, self.period),
            ttl,
            energy_fetcher(client, self.kind, self.period),
        );
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            EnergyKind::Electricity => "Electricity",
            EnergyKind::Gas => "Gas",
        }
    }
}

/// What a status card watches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSource {
    Network,
    Device(String),
}

/// A device or network status tile
pub struct StatusCard {
    pub label: String,
    pub source: StatusSource,
    pub handle: CacheHandle<DeviceStatus>,
}

impl StatusCard {
    fn network(
        cache: &SwrCache,
        client: &StatusClient,
        label: &str,
        probe_url: &str,
        ttl: Duration,
    ) -> Self {
        let client = client.clone();
        let probe_url = probe_url.to_string();
        let handle = cache.watch(NETWORK_KEY, ttl, move || {
            let client = client.clone();
            let probe_url = probe_url.clone();
            async move { Ok::<_, Infallible>(client.probe_network(&probe_url).await) }
        });
        Self {
            label: label.to_string(),
            source: StatusSource::Network,
            handle,
        }
    }

    fn device(
        cache: &SwrCache,
        client: &StatusClient,
        id: &str,
        label: &str,
        ttl: Duration,
    ) -> Self {
        let client = client.clone();
        let device_id = id.to_string();
        let handle = cache.watch(device_key(id), ttl, move || {
            let client = client.clone();
            let device_id = device_id.clone();
            async move { client.fetch_device(&device_id).await }
        });
        Self {
            label: label.to_string(),
            source: StatusSource::Device(id.to_string()),
            handle,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.source {
            StatusSource::Network => "📡",
            StatusSource::Device(_) => "📺",
        }
    }
}

/// Main application struct managing state and data
pub struct App {
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// When the cards were last revalidated
    pub last_refresh: Option<DateTime<Local>>,
    pub weather: CacheHandle<WeatherReport>,
    pub calendar: CacheHandle<Agenda>,
    pub meals: CacheHandle<MealPlan>,
    pub purifier: CacheHandle<PurifierData>,
    pub electricity: EnergyCard,
    pub gas: EnergyCard,
    pub statuses: Vec<StatusCard>,
    clients: Clients,
}

impl App {
    /// Creates the app and starts watching every card.
    ///
    /// Cached values are shown immediately; missing or stale ones are fetched
    /// in the background. Must be called inside a tokio runtime.
    pub fn new(cache: SwrCache, config: &Config) -> Self {
        Self::with_clients(cache, config, Clients::from_config(config))
    }

    pub fn with_clients(cache: SwrCache, config: &Config, clients: Clients) -> Self {
        let ttl: &TtlConfig = &config.ttl;

        let weather = {
            let client = clients.weather.clone();
            cache.watch(WEATHER_KEY, secs(ttl.weather_secs), move || {
                let client = client.clone();
                async move { client.fetch_weather().await }
            })
        };
        let calendar = {
            let client = clients.calendar.clone();
            cache.watch(CALENDAR_KEY, secs(ttl.calendar_secs), move || {
                let client = client.clone();
                async move { client.fetch_agenda().await }
            })
        };
        let meals = {
            let client = clients.meals.clone();
            cache.watch(MEALS_KEY, secs(ttl.meals_secs), move || {
                let client = client.clone();
                async move { client.fetch_meal_plan().await }
            })
        };
        let purifier = {
            let client = clients.purifier.clone();
            cache.watch(PURIFIER_KEY, secs(ttl.purifier_secs), move || {
                let client = client.clone();
                async move { client.fetch_status().await }
            })
        };

        let period = config.energy.default_period;
        let energy_ttl = secs(ttl.energy_secs);
        let electricity = EnergyCard::watch(
            &cache,
            &clients.energy,
            EnergyKind::Electricity,
            period,
            energy_ttl,
        );
        let gas = EnergyCard::watch(
            &cache,
            &clients.energy,
            EnergyKind::Gas,
            period,
            energy_ttl,
        );

        let status_ttl = secs(ttl.status_secs);
        let mut statuses = vec![StatusCard::network(
            &cache,
            &clients.status,
            &config.network.label,
            &config.network.probe_url,
            status_ttl,
        )];
        statuses.extend(
            config
                .devices
                .list
                .iter()
                .map(|d| StatusCard::device(&cache, &clients.status, &d.id, &d.label, status_ttl)),
        );

        tracing::info!(devices = config.devices.list.len(), "dashboard started");

        Self {
            should_quit: false,
            show_help: false,
            last_refresh: Some(Local::now()),
            weather,
            calendar,
            meals,
            purifier,
            electricity,
            gas,
            statuses,
            clients,
        }
    }

    /// Re-runs the TTL check on every card; only stale cards fetch
    pub fn revalidate_all(&mut self) {
        self.weather.revalidate();
        self.calendar.revalidate();
        self.meals.revalidate();
        self.purifier.revalidate();
        self.electricity.handle.revalidate();
        self.gas.handle.revalidate();
        for card in &mut self.statuses {
            card.handle.revalidate();
        }
        self.last_refresh = Some(Local::now());
    }

    /// Fetches every card now, keeping current values on screen meanwhile
    pub fn force_refresh_all(&mut self) {
        tracing::info!("manual refresh of all cards");
        self.weather.force_refresh();
        self.calendar.force_refresh();
        self.meals.force_refresh();
        self.purifier.force_refresh();
        self.electricity.handle.force_refresh();
        self.gas.handle.force_refresh();
        for card in &mut self.statuses {
            card.handle.force_refresh();
        }
        self.last_refresh = Some(Local::now());
    }

    /// Whether any card has a fetch outstanding
    pub fn is_fetching(&self) -> bool {
        self.weather.is_fetching()
            || self.calendar.is_fetching()
            || self.meals.is_fetching()
            || self.purifier.is_fetching()
            || self.electricity.handle.is_fetching()
            || self.gas.handle.is_fetching()
            || self.statuses.iter().any(|c| c.handle.is_fetching())
    }

    /// Handles keyboard input
    ///
    /// # Key Bindings
    /// - `q` or `Esc`: Quit the application
    /// - `r`: Refresh all cards now
    /// - `e`: Cycle the electricity period
    /// - `g`: Cycle the gas period
    /// - `?`: Toggle help overlay
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        // Handle help overlay - intercepts all keys when shown
        if self.show_help {
            match key_event.code {
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => {
                    self.show_help = false;
                }
                _ => {} // Ignore other keys when help is shown
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('r') => {
                self.force_refresh_all();
            }
            KeyCode::Char('e') => {
                self.electricity.cycle_period(&self.clients.energy);
            }
            KeyCode::Char('g') => {
                self.gas.cycle_period(&self.clients.energy);
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheStorage, ManualClock, MemoryStorage};
    use crate::data::{EnergyData, Meters, Tariff};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::Arc;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: i64 = 1_700_000_000_000;

    /// Helper to create a KeyEvent for testing
    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn energy(value: u64) -> EnergyData {
        EnergyData {
            value,
            cost: 0.0,
            unit: "kWh".to_string(),
            chart: vec![0.0; 10],
        }
    }

    /// Every endpoint points at a local port nothing listens on, so fetches
    /// fail fast unless a test seeds the cache.
    fn offline_config() -> Config {
        let mut config = Config::default();
        config.purifier.api_url = "http://127.0.0.1:9".to_string();
        config.devices.api_url = "http://127.0.0.1:9".to_string();
        config.network.probe_url = "http://127.0.0.1:9".to_string();
        config
    }

    fn offline_clients(config: &Config) -> Clients {
        let mut clients = Clients::from_config(config);
        clients.weather = clients.weather.with_base_url("http://127.0.0.1:9");
        clients.energy = clients.energy.with_base_url("http://127.0.0.1:9");
        clients
    }

    fn app_with(storage: Arc<MemoryStorage>) -> App {
        let cache = SwrCache::new(storage).with_clock(Arc::new(ManualClock::new(NOW)));
        let config = offline_config();
        let clients = offline_clients(&config);
        App::with_clients(cache, &config, clients)
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(
            energy_key(EnergyKind::Electricity, EnergyPeriod::Day),
            "energy-electricity-day"
        );
        assert_eq!(energy_key(EnergyKind::Gas, EnergyPeriod::Month), "energy-gas-month");
        assert_eq!(device_key("bedroom"), "device-status-bedroom");
    }

    #[tokio::test]
    async fn test_q_quits() {
        let mut app = app_with(Arc::new(MemoryStorage::new()));
        app.handle_key(key_event(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_esc_quits() {
        let mut app = app_with(Arc::new(MemoryStorage::new()));
        app.handle_key(key_event(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_help_toggle_intercepts_keys() {
        let mut app = app_with(Arc::new(MemoryStorage::new()));
        app.handle_key(key_event(KeyCode::Char('?')));
        assert!(app.show_help);

        app.handle_key(key_event(KeyCode::Char('e')));
        assert_eq!(app.electricity.period, EnergyPeriod::Day);

        app.handle_key(key_event(KeyCode::Esc));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_status_cards_follow_config() {
        let app = app_with(Arc::new(MemoryStorage::new()));
        let labels: Vec<&str> = app.statuses.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Wi-Fi", "MainTV", "TV Bedroom"]);
        assert_eq!(app.statuses[1].handle.key(), "device-status-main");
        assert_eq!(app.statuses[0].icon(), "📡");
    }

    #[tokio::test]
    async fn test_cycle_energy_period_switches_key() {
        let storage = Arc::new(MemoryStorage::new());
        let week = CacheEntry::new(energy(42), NOW);
        storage
            .write("energy-gas-week", &week.encode().unwrap())
            .unwrap();

        let mut app = app_with(storage);
        assert_eq!(app.gas.handle.key(), "energy-gas-day");

        app.handle_key(key_event(KeyCode::Char('g')));
        assert_eq!(app.gas.period, EnergyPeriod::Week);
        assert_eq!(app.gas.handle.key(), "energy-gas-week");
        assert_eq!(app.gas.handle.state().data.map(|d| d.value), Some(42));
        assert_eq!(app.electricity.period, EnergyPeriod::Day);

        app.handle_key(key_event(KeyCode::Char('g')));
        app.handle_key(key_event(KeyCode::Char('g')));
        assert_eq!(app.gas.period, EnergyPeriod::Day);
    }

    #[tokio::test]
    async fn test_cached_cards_show_immediately() {
        let storage = Arc::new(MemoryStorage::new());
        let purifier = PurifierData {
            name: "Bedroom".to_string(),
            power: true,
            ..PurifierData::default()
        };
        storage
            .write(PURIFIER_KEY, &CacheEntry::new(purifier, NOW).encode().unwrap())
            .unwrap();

        let app = app_with(storage);
        let state = app.purifier.state();
        assert_eq!(state.data.map(|p| p.name), Some("Bedroom".to_string()));
        assert!(!state.loading);
        assert!(!app.purifier.is_fetching());

        let weather = app.weather.state();
        assert!(weather.loading);
        assert!(weather.data.is_none());
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_error_visible() {
        let mut app = app_with(Arc::new(MemoryStorage::new()));
        let state = app.purifier.settled().await;
        assert!(state.data.is_none());
        assert!(!state.loading);
        assert_eq!(
            state.error.map(|e| e.message().to_string()),
            Some("Cannot connect to API".to_string())
        );
    }

    #[tokio::test]
    async fn test_revalidate_all_refetches_energy_once_stale() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/v1/electricity-meter-points/.*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"consumption": 3.0}]
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(NOW));
        let cache = SwrCache::new(storage).with_clock(clock.clone());
        let config = offline_config();
        let mut clients = offline_clients(&config);
        let meters = Meters {
            api_key: "sk".to_string(),
            mpan: "1".to_string(),
            electricity_serial: "E".to_string(),
            ..Meters::default()
        };
        clients.energy = EnergyClient::new(reqwest::Client::new(), meters, Tariff::default())
            .with_base_url(mock_server.uri());

        let mut app = App::with_clients(cache, &config, clients);
        let first = app.electricity.handle.settled().await;
        assert_eq!(first.data.map(|d| d.value), Some(3));

        // within the TTL nothing is fetched
        app.revalidate_all();
        app.electricity.handle.settled().await;

        clock.advance(config.ttl.energy_secs as i64 * 1000 + 1);
        app.revalidate_all();
        app.electricity.handle.settled().await;
        // the mock's expect(2) is verified on drop
    }
}
