//! ICS calendar feed client
//!
//! Downloads an iCalendar feed and reduces it to the events touching today
//! and tomorrow. Only `SUMMARY`, `DTSTART` and `DTEND` are read; recurrence
//! rules are not expanded.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use thiserror::Error;

use super::{Agenda, DashboardEvent, EventKind, ALL_DAY};

/// Errors that can occur when fetching the calendar
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("No calendar URL configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Calendar server returned HTTP {0}")]
    Status(u16),

    #[error("Response is not an iCalendar feed")]
    InvalidFeed,
}

/// Client for an ICS calendar feed
#[derive(Debug, Clone)]
pub struct CalendarClient {
    client: Client,
    ics_url: Option<String>,
}

impl CalendarClient {
    pub fn new(client: Client, ics_url: Option<String>) -> Self {
        Self {
            client,
            ics_url: ics_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Fetch the feed and return today's and tomorrow's events
    pub async fn fetch_agenda(&self) -> Result<Agenda, CalendarError> {
        let url = self.ics_url.as_deref().ok_or(CalendarError::NotConfigured)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if !body.contains("BEGIN:VCALENDAR") {
            return Err(CalendarError::InvalidFeed);
        }

        Ok(parse_ics(&body, Local::now().date_naive()))
    }
}

/// Build the agenda for `today` and the following day from an ICS body
pub fn parse_ics(ics: &str, today: NaiveDate) -> Agenda {
    let tomorrow = today + Duration::days(1);
    let mut agenda = Agenda::default();

    for event in parse_events(ics) {
        let line = DashboardEvent {
            time: event.time_label(),
            title: event.summary.clone(),
            kind: EventKind::Calendar,
        };
        if event.covers(today) {
            agenda.today.push(line.clone());
        }
        if event.covers(tomorrow) {
            agenda.tomorrow.push(line);
        }
    }

    sort_events(&mut agenda.today);
    sort_events(&mut agenda.tomorrow);
    agenda
}

/// All-day events first, then by start time
pub fn sort_events(events: &mut [DashboardEvent]) {
    events.sort_by(|a, b| {
        (a.time != ALL_DAY)
            .cmp(&(b.time != ALL_DAY))
            .then_with(|| a.time.cmp(&b.time))
    });
}

#[derive(Debug, Clone, PartialEq)]
struct IcsEvent {
    summary: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    all_day: bool,
}

impl IcsEvent {
    fn covers(&self, day: NaiveDate) -> bool {
        self.start.date() <= day && day <= self.end.date()
    }

    fn time_label(&self) -> String {
        if self.all_day {
            ALL_DAY.to_string()
        } else {
            self.start.format("%H:%M").to_string()
        }
    }
}

fn parse_events(ics: &str) -> Vec<IcsEvent> {
    let mut events = Vec::new();
    let mut current: Option<RawEvent> = None;

    for line in unfold(ics) {
        if line == "BEGIN:VEVENT" {
            current = Some(RawEvent::default());
            continue;
        }
        if line == "END:VEVENT" {
            if let Some(event) = current.take().and_then(RawEvent::finish) {
                events.push(event);
            }
            continue;
        }
        let Some(raw) = current.as_mut() else {
            continue;
        };
        let Some((name, value)) = split_property(&line) else {
            continue;
        };
        match name {
            "SUMMARY" => raw.summary = Some(unescape(value)),
            "DTSTART" => raw.start = Some(value.trim().to_string()),
            "DTEND" => raw.end = Some(value.trim().to_string()),
            _ => {}
        }
    }

    events
}

#[derive(Debug, Default)]
struct RawEvent {
    summary: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

impl RawEvent {
    fn finish(self) -> Option<IcsEvent> {
        let summary = self.summary?;
        let (start, all_day) = parse_ics_time(self.start.as_deref()?)?;
        let end = self
            .end
            .as_deref()
            .and_then(parse_ics_time)
            .map(|(end, _)| end)
            .unwrap_or(start);
        Some(IcsEvent {
            summary,
            start,
            end,
            all_day,
        })
    }
}

/// Joins RFC 5545 continuation lines (those starting with a space or tab)
fn unfold(ics: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in ics.lines() {
        let line = line.trim_end_matches('\r');
        let continuation = line.strip_prefix(' ').or_else(|| line.strip_prefix('\t'));
        if let (Some(rest), Some(last)) = (continuation, lines.last_mut()) {
            last.push_str(rest);
            continue;
        }
        lines.push(line.to_string());
    }
    lines
}

/// Splits `NAME;PARAM=x:value` into the bare name and value
fn split_property(line: &str) -> Option<(&str, &str)> {
    let (head, value) = line.split_once(':')?;
    let name = head.split(';').next().unwrap_or(head);
    Some((name, value))
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.trim().chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a DTSTART/DTEND value, returning the local time and whether it is a date
fn parse_ics_time(value: &str) -> Option<(NaiveDateTime, bool)> {
    let value = value.trim();
    if value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some((date.and_hms_opt(0, 0, 0)?, true));
    }

    let (value, utc) = match value.strip_suffix('Z') {
        Some(v) => (v, true),
        None => (value, false),
    };
    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M"))
        .ok()?;

    if utc {
        Some((Utc.from_utc_datetime(&naive).with_timezone(&Local).naive_local(), false))
    } else {
        Some((naive, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20261016T183000\r\n\
DTEND:20261016T193000\r\n\
SUMMARY:Swimming\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20261016\r\n\
DTEND;VALUE=DATE:20261016\r\n\
SUMMARY:Bins\\, recycling\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;TZID=Europe/London:20261017T090000\r\n\
SUMMARY:Parkrun with\r\n  the kids\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART;VALUE=DATE:20261015\r\n\
DTEND;VALUE=DATE:20261017\r\n\
SUMMARY:Half term\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
DTSTART:20261020T100000\r\n\
SUMMARY:Dentist\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_today_and_tomorrow() {
        let agenda = parse_ics(FEED, day(2026, 10, 16));

        let today: Vec<(&str, &str)> = agenda
            .today
            .iter()
            .map(|e| (e.time.as_str(), e.title.as_str()))
            .collect();
        assert_eq!(
            today,
            vec![
                ("All day", "Bins, recycling"),
                ("All day", "Half term"),
                ("18:30", "Swimming"),
            ]
        );

        let tomorrow: Vec<(&str, &str)> = agenda
            .tomorrow
            .iter()
            .map(|e| (e.time.as_str(), e.title.as_str()))
            .collect();
        assert_eq!(
            tomorrow,
            vec![("All day", "Half term"), ("09:00", "Parkrun with the kids")]
        );
        assert!(agenda.today.iter().all(|e| e.kind == EventKind::Calendar));
    }

    #[test]
    fn test_event_outside_window_is_ignored() {
        let agenda = parse_ics(FEED, day(2026, 10, 16));
        assert!(agenda
            .today
            .iter()
            .chain(agenda.tomorrow.iter())
            .all(|e| e.title != "Dentist"));
    }

    #[test]
    fn test_event_without_summary_is_skipped() {
        let ics = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART:20261016\nEND:VEVENT\nEND:VCALENDAR\n";
        let agenda = parse_ics(ics, day(2026, 10, 16));
        assert!(agenda.today.is_empty());
    }

    #[test]
    fn test_sort_puts_all_day_first() {
        let event = |time: &str| DashboardEvent {
            time: time.to_string(),
            title: String::new(),
            kind: EventKind::Calendar,
        };
        let mut events = vec![event("14:00"), event(ALL_DAY), event("08:15")];
        sort_events(&mut events);
        let times: Vec<&str> = events.iter().map(|e| e.time.as_str()).collect();
        assert_eq!(times, vec![ALL_DAY, "08:15", "14:00"]);
    }

    #[test]
    fn test_parse_ics_time_forms() {
        let (date, all_day) = parse_ics_time("20261016").unwrap();
        assert!(all_day);
        assert_eq!(date.date(), day(2026, 10, 16));

        let (time, all_day) = parse_ics_time("20261016T0730").unwrap();
        assert!(!all_day);
        assert_eq!(time.format("%H:%M").to_string(), "07:30");

        assert!(parse_ics_time("20261016T120000Z").is_some());
        assert!(parse_ics_time("not-a-date").is_none());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"Tea\; cake\, jam\nand \\ more"), r"Tea; cake, jam and \ more");
    }

    #[tokio::test]
    async fn test_fetch_not_configured() {
        let client = CalendarClient::new(Client::new(), Some("  ".to_string()));
        assert!(matches!(
            client.fetch_agenda().await,
            Err(CalendarError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_calendar_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/basic.ics"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/basic.ics", mock_server.uri());
        let client = CalendarClient::new(Client::new(), Some(url));
        assert!(matches!(
            client.fetch_agenda().await,
            Err(CalendarError::InvalidFeed)
        ));
    }

    #[tokio::test]
    async fn test_fetch_valid_feed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/basic.ics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&mock_server)
            .await;

        let url = format!("{}/basic.ics", mock_server.uri());
        let client = CalendarClient::new(Client::new(), Some(url));
        assert!(client.fetch_agenda().await.is_ok());
    }
}
