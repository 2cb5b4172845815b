//! Dashboard cards
//!
//! Each card follows the same rule for its cache state: "Loading..." while
//! nothing is known, the error (or "No data") when the fetch failed with
//! nothing cached, and otherwise the data, with a warning line when the last
//! refresh failed.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use super::colors;
use super::widgets::UsageSparkline;
use crate::app::{EnergyCard, StatusCard};
use crate::cache::CacheState;
use crate::data::{
    Agenda, DashboardEvent, DeviceStatus, Indicator, MealPlan, MealSlot, PurifierData,
    WeatherCondition, WeatherReport,
};

/// What a card should show for its current cache state
#[derive(Debug, PartialEq)]
pub enum CardBody<'a, T> {
    Loading,
    Unavailable(String),
    Ready {
        data: &'a T,
        warning: Option<&'a str>,
    },
}

pub fn card_body<T>(state: &CacheState<T>) -> CardBody<'_, T> {
    match &state.data {
        None if state.loading => CardBody::Loading,
        None => CardBody::Unavailable(
            state
                .error
                .as_ref()
                .map(|e| e.message().to_string())
                .unwrap_or_else(|| "No data".to_string()),
        ),
        Some(data) => CardBody::Ready {
            data,
            warning: state.error.as_ref().map(|e| e.message()),
        },
    }
}

fn card_block(title: &str) -> Block<'_> {
    Block::default()
        .title(Span::styled(
            format!(" {} ", title),
            Style::default()
                .fg(colors::HEADER)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::BORDER))
}

fn dim(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(colors::UNKNOWN)))
}

fn warning_line(message: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!("⚠ {}", message),
        Style::default().fg(colors::ADVISORY),
    ))
}

/// Lines for any card, given a builder for the data case
fn body_lines<T>(
    state: &CacheState<T>,
    build: impl FnOnce(&T) -> Vec<Line<'static>>,
) -> Vec<Line<'static>> {
    match card_body(state) {
        CardBody::Loading => vec![dim("Loading...")],
        CardBody::Unavailable(message) => vec![dim(message)],
        CardBody::Ready { data, warning } => {
            let mut lines = build(data);
            if let Some(message) = warning {
                lines.push(warning_line(message));
            }
            lines
        }
    }
}

fn condition_icon(condition: WeatherCondition) -> &'static str {
    match condition {
        WeatherCondition::Clear => "\u{2600}",        // ☀
        WeatherCondition::PartlyCloudy => "\u{26C5}", // ⛅
        WeatherCondition::Cloudy => "\u{2601}",       // ☁
        WeatherCondition::Rain => "\u{1F327}",        // 🌧
        WeatherCondition::Showers => "\u{1F326}",     // 🌦
        WeatherCondition::Thunderstorm => "\u{26C8}", // ⛈
        WeatherCondition::Snow => "\u{2744}",         // ❄
        WeatherCondition::Fog => "\u{1F32B}",         // 🌫
    }
}

fn temperature_color(temp: f64) -> Color {
    if temp >= 25.0 {
        Color::LightRed
    } else if temp >= 20.0 {
        Color::Yellow
    } else if temp >= 15.0 {
        Color::Green
    } else if temp >= 5.0 {
        Color::Cyan
    } else {
        Color::Blue
    }
}

pub fn weather_lines(state: &CacheState<WeatherReport>, location: &str) -> Vec<Line<'static>> {
    let location = location.to_string();
    body_lines(state, move |w| {
        vec![
            Line::from(vec![
                Span::raw(format!("{}  ", condition_icon(w.condition))),
                Span::styled(
                    format!("{:.0}°C", w.temperature_c),
                    Style::default()
                        .fg(temperature_color(w.temperature_c))
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(Span::styled(
                format!("Feels like {:.0}°C", w.feels_like_c),
                Style::default().fg(colors::SECONDARY),
            )),
            Line::from(Span::styled(
                w.description.clone(),
                Style::default().fg(colors::PRIMARY),
            )),
            Line::default(),
            Line::from(vec![
                Span::raw("Wind: "),
                Span::styled(
                    format!("{:.0} km/h", w.wind_kmph),
                    Style::default().fg(colors::PRIMARY),
                ),
            ]),
            Line::from(vec![
                Span::raw("Humidity: "),
                Span::styled(format!("{}%", w.humidity), Style::default().fg(colors::PRIMARY)),
            ]),
            Line::default(),
            dim(location),
        ]
    })
}

fn event_line(event: &DashboardEvent) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<8}", event.time), Style::default().fg(colors::HEADER)),
        Span::styled(event.title.clone(), Style::default().fg(colors::PRIMARY)),
    ])
}

fn meal_lines(slots: &[MealSlot]) -> Vec<Line<'static>> {
    slots
        .iter()
        .map(|slot| {
            Line::from(vec![
                Span::raw("🍽 "),
                Span::styled(format!("{:<10}", slot.slot), Style::default().fg(colors::SECONDARY)),
                Span::styled(slot.dishes.join(", "), Style::default().fg(colors::PRIMARY)),
            ])
        })
        .collect()
}

/// Which half of the agenda to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Today,
    Tomorrow,
}

/// Calendar events then meals for one day
///
/// Both sources feed one card, so it only shows "Loading..." while both are
/// still empty and loading. Source errors are listed on the today card.
pub fn events_lines(
    calendar: &CacheState<Agenda>,
    meals: &CacheState<MealPlan>,
    day: Day,
) -> Vec<Line<'static>> {
    let nothing_yet = calendar.data.is_none() && meals.data.is_none();
    if nothing_yet && calendar.loading && meals.loading {
        return vec![dim("Loading...")];
    }

    let events = calendar
        .data
        .as_ref()
        .map(|agenda| match day {
            Day::Today => agenda.today.as_slice(),
            Day::Tomorrow => agenda.tomorrow.as_slice(),
        })
        .unwrap_or_default();
    let slots = meals
        .data
        .as_ref()
        .map(|plan| match day {
            Day::Today => plan.today.as_slice(),
            Day::Tomorrow => plan.tomorrow.as_slice(),
        })
        .unwrap_or_default();

    let mut lines: Vec<Line<'static>> = if events.is_empty() {
        vec![dim("No events")]
    } else {
        events.iter().map(event_line).collect()
    };
    if !slots.is_empty() {
        lines.push(Line::default());
        lines.extend(meal_lines(slots));
    }
    if events.is_empty() && slots.is_empty() {
        lines.push(dim("Nothing planned"));
    }

    if day == Day::Today {
        for (source, error) in [("Calendar", &calendar.error), ("Meals", &meals.error)] {
            if let Some(e) = error {
                lines.push(warning_line(&format!("{}: {}", source, e)));
            }
        }
    }
    lines
}

fn mode_icon(mode: Option<&str>) -> &'static str {
    match mode {
        Some("sleep") => "🌙",
        Some("manual") => "⚙",
        Some("auto") => "🔄",
        _ => "💨",
    }
}

pub fn filter_color(percent: u8) -> Color {
    if percent > 50 {
        colors::SAFE
    } else if percent > 20 {
        colors::ADVISORY
    } else {
        colors::CLOSED
    }
}

fn fan_bars(level: u8) -> String {
    (1..=3).map(|i| if i <= level { '▮' } else { '▯' }).collect()
}

pub fn purifier_lines(state: &CacheState<PurifierData>) -> Vec<Line<'static>> {
    body_lines(state, |p| {
        let name = if p.model.is_empty() { "Air Purifier" } else { p.model.as_str() };
        let (dot, dot_color) = if p.power {
            ("●", colors::SAFE)
        } else {
            ("○", colors::UNKNOWN)
        };
        let mut lines = vec![Line::from(vec![
            Span::styled(format!("{} ", dot), Style::default().fg(dot_color)),
            Span::styled(name.to_string(), Style::default().fg(colors::PRIMARY)),
        ])];

        if !p.power {
            lines.push(dim("Purifier is off"));
            return lines;
        }

        lines.push(Line::from(vec![
            Span::raw(format!("{} ", mode_icon(p.mode.as_deref()))),
            Span::raw(p.mode.clone().unwrap_or_else(|| "Off".to_string())),
            Span::raw("   "),
            Span::styled(fan_bars(p.fan_level), Style::default().fg(colors::HEADER)),
            Span::raw(format!(" Speed {}", p.fan_level)),
        ]));
        let mut status = vec![
            Span::raw("Filter "),
            Span::styled(
                format!("{}%", p.filter_life),
                Style::default().fg(filter_color(p.filter_life)),
            ),
        ];
        if p.supports_air_quality {
            if let Some(aq) = p.air_quality {
                status.push(Span::raw(format!("   Air quality {}", aq)));
            }
        }
        lines.push(Line::from(status));
        lines
    })
}

pub fn energy_lines(
    card: &EnergyCard,
    state: &CacheState<crate::data::EnergyData>,
) -> Vec<Line<'static>> {
    let period = Line::from(Span::styled(
        format!("{} ▾", card.period.label()),
        Style::default().fg(colors::SECONDARY),
    ));
    let mut lines = vec![period];
    lines.extend(body_lines(state, |e| {
        vec![Line::from(vec![
            Span::styled(
                format!("{} {}", e.value, e.unit),
                Style::default()
                    .fg(colors::PRIMARY)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(format!("£{:.2}", e.cost), Style::default().fg(colors::SAFE)),
        ])]
    }));
    lines
}

fn indicator_style(indicator: Indicator) -> (&'static str, Color) {
    match indicator {
        Indicator::Unknown => ("●", colors::UNKNOWN),
        Indicator::Offline => ("●", colors::CLOSED),
        Indicator::Active => ("●", colors::SAFE),
        Indicator::Online => ("●", colors::HEADER),
    }
}

pub fn status_line(card: &StatusCard, state: &CacheState<DeviceStatus>) -> Line<'static> {
    let (indicator, text) = match card_body(state) {
        CardBody::Loading => (Indicator::Unknown, "...".to_string()),
        CardBody::Unavailable(message) => (Indicator::Unknown, message),
        CardBody::Ready { data, warning } => {
            let text = match warning {
                Some(w) => format!("{} ⚠ {}", data.state, w),
                None => data.state.clone(),
            };
            (data.indicator(), text)
        }
    };
    let (dot, color) = indicator_style(indicator);
    Line::from(vec![
        Span::styled(format!("{} ", dot), Style::default().fg(color)),
        Span::raw(format!("{} ", card.icon())),
        Span::styled(card.label.clone(), Style::default().fg(colors::PRIMARY)),
        Span::raw("  "),
        Span::styled(text, Style::default().fg(colors::SECONDARY)),
    ])
}

pub fn render_weather(
    frame: &mut Frame,
    area: Rect,
    state: &CacheState<WeatherReport>,
    location: &str,
) {
    let paragraph = Paragraph::new(weather_lines(state, location)).block(card_block("Weather"));
    frame.render_widget(paragraph, area);
}

pub fn render_events(
    frame: &mut Frame,
    area: Rect,
    calendar: &CacheState<Agenda>,
    meals: &CacheState<MealPlan>,
) {
    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let today = Paragraph::new(events_lines(calendar, meals, Day::Today))
        .block(card_block("Today"))
        .wrap(Wrap { trim: true });
    let tomorrow = Paragraph::new(events_lines(calendar, meals, Day::Tomorrow))
        .block(card_block("Tomorrow"))
        .wrap(Wrap { trim: true });
    frame.render_widget(today, halves[0]);
    frame.render_widget(tomorrow, halves[1]);
}

pub fn render_purifier(frame: &mut Frame, area: Rect, state: &CacheState<PurifierData>) {
    let paragraph = Paragraph::new(purifier_lines(state))
        .block(card_block("Air Purifier"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

pub fn render_energy(frame: &mut Frame, area: Rect, card: &EnergyCard) {
    let state = card.handle.state();
    let block = card_block(card.title());
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1)])
        .split(inner);

    frame.render_widget(Paragraph::new(energy_lines(card, &state)), rows[0]);
    if let Some(data) = &state.data {
        frame.render_widget(UsageSparkline::new(&data.chart), rows[1]);
    }
}

pub fn render_statuses(frame: &mut Frame, area: Rect, cards: &[StatusCard]) {
    let lines: Vec<Line<'static>> = cards
        .iter()
        .map(|card| status_line(card, &card.handle.state()))
        .collect();
    let paragraph = Paragraph::new(lines).block(card_block("Home"));
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchError;
    use crate::data::{EventKind, ALL_DAY};

    fn text(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn state<T>(data: Option<T>, loading: bool, error: Option<&str>) -> CacheState<T> {
        CacheState {
            data,
            loading,
            error: error.map(FetchError::new),
            updated_at: None,
            fetching: loading,
        }
    }

    #[test]
    fn test_card_body_rules() {
        assert_eq!(card_body(&state::<i32>(None, true, None)), CardBody::Loading);
        assert_eq!(
            card_body(&state::<i32>(None, false, None)),
            CardBody::Unavailable("No data".to_string())
        );
        assert_eq!(
            card_body(&state::<i32>(None, false, Some("offline"))),
            CardBody::Unavailable("offline".to_string())
        );
        assert_eq!(
            card_body(&state(Some(1), false, Some("offline"))),
            CardBody::Ready {
                data: &1,
                warning: Some("offline"),
            }
        );
    }

    #[test]
    fn test_stale_data_shows_warning() {
        let purifier = PurifierData {
            model: "Core 300S".to_string(),
            power: true,
            mode: Some("auto".to_string()),
            fan_level: 2,
            filter_life: 15,
            ..PurifierData::default()
        };
        let lines = purifier_lines(&state(Some(purifier), false, Some("Cannot connect to API")));
        let rendered = text(&lines);
        assert!(rendered.contains("Core 300S"));
        assert!(rendered.contains("▮▮▯"));
        assert!(rendered.contains("15%"));
        assert!(rendered.contains("⚠ Cannot connect to API"));
    }

    #[test]
    fn test_purifier_off() {
        let purifier = PurifierData {
            power: false,
            ..PurifierData::default()
        };
        let rendered = text(&purifier_lines(&state(Some(purifier), false, None)));
        assert!(rendered.contains("Purifier is off"));
        assert!(!rendered.contains("Filter"));
    }

    #[test]
    fn test_filter_colors() {
        assert_eq!(filter_color(80), colors::SAFE);
        assert_eq!(filter_color(50), colors::ADVISORY);
        assert_eq!(filter_color(20), colors::CLOSED);
    }

    #[test]
    fn test_weather_loading_then_error() {
        let loading = text(&weather_lines(&state(None, true, None), "London"));
        assert_eq!(loading, "Loading...");

        let failed = text(&weather_lines(&state(None, false, Some("HTTP 503")), "London"));
        assert_eq!(failed, "HTTP 503");
    }

    #[test]
    fn test_events_combine_calendar_and_meals() {
        let agenda = Agenda {
            today: vec![DashboardEvent {
                time: ALL_DAY.to_string(),
                title: "Bins".to_string(),
                kind: EventKind::Calendar,
            }],
            tomorrow: vec![],
        };
        let plan = MealPlan {
            today: vec![MealSlot {
                slot: "Dinner".to_string(),
                dishes: vec!["Curry".to_string(), "Rice".to_string()],
            }],
            tomorrow: vec![],
        };

        let today = text(&events_lines(
            &state(Some(agenda.clone()), false, None),
            &state(Some(plan.clone()), false, Some("Meal planner returned HTTP 500")),
            Day::Today,
        ));
        assert!(today.contains("Bins"));
        assert!(today.contains("Curry, Rice"));
        assert!(today.contains("⚠ Meals: Meal planner returned HTTP 500"));

        let tomorrow = text(&events_lines(
            &state(Some(agenda), false, None),
            &state(Some(plan), false, Some("boom")),
            Day::Tomorrow,
        ));
        assert!(tomorrow.contains("No events"));
        assert!(tomorrow.contains("Nothing planned"));
        assert!(!tomorrow.contains("⚠"));
    }

    #[test]
    fn test_events_loading_only_when_both_loading() {
        let both = text(&events_lines(
            &state(None, true, None),
            &state(None, true, None),
            Day::Today,
        ));
        assert_eq!(both, "Loading...");

        let one = text(&events_lines(
            &state(None, true, None),
            &state(None, false, Some("Meal planner credentials not configured")),
            Day::Today,
        ));
        assert!(one.contains("Nothing planned"));
    }
}
