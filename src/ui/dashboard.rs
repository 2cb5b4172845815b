//! Dashboard screen layout
//!
//! Header with date and clock, a main row of weather, events and the
//! purifier/energy column, a row of status lights, and a key hint footer.

use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{cards, colors, help_overlay};
use crate::app::App;

/// Header date, e.g. "Thu 16 Oct"
pub fn format_date(now: &DateTime<Local>) -> String {
    now.format("%a %-d %b").to_string()
}

/// Renders the whole dashboard
///
/// # Arguments
/// * `frame` - The ratatui frame to render into
/// * `app` - The application state
/// * `location` - Weather location shown on the weather card
pub fn render(frame: &mut Frame, app: &App, location: &str) {
    let area = frame.area();
    let now = Local::now();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(12),
            Constraint::Length(app.statuses.len() as u16 + 2),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(frame, rows[0], &now, app.is_fetching());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(28),
            Constraint::Percentage(40),
            Constraint::Percentage(32),
        ])
        .split(rows[1]);

    cards::render_weather(frame, columns[0], &app.weather.state(), location);
    cards::render_events(frame, columns[1], &app.calendar.state(), &app.meals.state());

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(30),
            Constraint::Percentage(30),
        ])
        .split(columns[2]);
    cards::render_purifier(frame, right[0], &app.purifier.state());
    cards::render_energy(frame, right[1], &app.electricity);
    cards::render_energy(frame, right[2], &app.gas);

    cards::render_statuses(frame, rows[2], &app.statuses);
    render_footer(frame, rows[3], app);

    if app.show_help {
        help_overlay::render(frame);
    }
}

fn render_header(frame: &mut Frame, area: Rect, now: &DateTime<Local>, fetching: bool) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut title = vec![
        Span::styled(
            "homedash",
            Style::default()
                .fg(colors::HEADER)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format_date(now), Style::default().fg(colors::PRIMARY)),
    ];
    if fetching {
        title.push(Span::styled("  ⟳", Style::default().fg(colors::SECONDARY)));
    }
    frame.render_widget(Paragraph::new(Line::from(title)), halves[0]);

    let clock = Paragraph::new(Span::styled(
        now.format("%H:%M").to_string(),
        Style::default()
            .fg(colors::PRIMARY)
            .add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Right);
    frame.render_widget(clock, halves[1]);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    for (key, label) in [
        ("r", "Refresh"),
        ("e", "Electricity period"),
        ("g", "Gas period"),
        ("?", "Help"),
        ("q", "Quit"),
    ] {
        spans.push(Span::styled(key, Style::default().fg(colors::HEADER)));
        spans.push(Span::styled(format!(" {}  ", label), Style::default().fg(colors::SECONDARY)));
    }
    if let Some(at) = app.last_refresh {
        spans.push(Span::styled(
            format!("checked {}", at.format("%H:%M:%S")),
            Style::default().fg(colors::UNKNOWN),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
