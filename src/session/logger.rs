//! Interaction logger for exhibit sessions
//!
//! Records what a participant did during one session and exports it as
//! CSV. Logging is fire-and-forget: calls outside an active session are
//! dropped silently and nothing here ever fails into the caller.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

pub const SESSION_START: &str = "session_start";
pub const SESSION_END: &str = "session_end";

/// CSV columns, in order
pub const CSV_HEADERS: [&str; 22] = [
    "session_id",
    "time_elapsed_sec",
    "timestamp_readable",
    "event",
    "sdg",
    "year",
    "iso",
    "country",
    "position",
    "sdgs",
    "values",
    "from_position",
    "to_position",
    "dragged_country",
    "dragged_iso",
    "target_country",
    "target_iso",
    "tempo",
    "note_count",
    "note_count_before",
    "duration",
    "mode",
];

/// Structured event data. Every field is optional; each maps to a CSV column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdg: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdgs: Option<Vec<u8>>,
    /// Resolved values; `None` entries are missing data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_position: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_position: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dragged_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dragged_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_iso: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_count_before: Option<usize>,
    /// Milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: f64,
    pub event: String,
    pub data: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub session_id: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub total_events: usize,
    pub events: Vec<LoggedEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: String,
    pub duration: f64,
    pub total_events: usize,
    pub event_counts: BTreeMap<String, usize>,
}

fn to_datetime(ms: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_default()
}

/// Default session id, e.g. "session_20240315_1422" (UTC)
pub fn generate_session_id(now_ms: f64) -> String {
    to_datetime(now_ms).format("session_%Y%m%d_%H%M").to_string()
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct InteractionLogger {
    session_id: Option<String>,
    start_time: f64,
    end_time: Option<f64>,
    events: Vec<LoggedEvent>,
    recording: bool,
}

impl InteractionLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a session; previous events are discarded. Returns the session id.
    pub fn start_session(&mut self, session_id: Option<String>, now_ms: f64) -> String {
        let id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| generate_session_id(now_ms));
        self.session_id = Some(id.clone());
        self.start_time = now_ms;
        self.end_time = None;
        self.events.clear();
        self.recording = true;
        self.log(SESSION_START, EventPayload::default(), now_ms);
        log::info!("[Logger] Session started - {}", id);
        id
    }

    /// Close the session and return its export
    pub fn end_session(&mut self, now_ms: f64) -> Option<SessionExport> {
        if !self.recording {
            log::warn!("[Logger] No active session to end");
            return None;
        }
        self.log(SESSION_END, EventPayload::default(), now_ms);
        self.end_time = Some(now_ms);
        self.recording = false;
        log::info!("[Logger] Session ended - {} events", self.events.len());
        Some(self.export())
    }

    /// Record one event; ignored when no session is active
    pub fn log(&mut self, event: &str, data: EventPayload, now_ms: f64) {
        if !self.recording {
            return;
        }
        log::debug!("[Log] {} {:?}", event, data);
        self.events.push(LoggedEvent {
            timestamp: now_ms,
            event: event.to_string(),
            data,
        });
    }

    pub fn is_active(&self) -> bool {
        self.recording
    }

    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn export(&self) -> SessionExport {
        SessionExport {
            session_id: self.session_id.clone().unwrap_or_default(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.end_time.map(|end| end - self.start_time),
            total_events: self.events.len(),
            events: self.events.clone(),
        }
    }

    /// Counts per event name; `None` outside a session
    pub fn stats(&self, now_ms: f64) -> Option<SessionStats> {
        if !self.recording {
            return None;
        }
        let mut event_counts = BTreeMap::new();
        for event in &self.events {
            *event_counts.entry(event.event.clone()).or_insert(0) += 1;
        }
        Some(SessionStats {
            session_id: self.session_id.clone().unwrap_or_default(),
            duration: now_ms - self.start_time,
            total_events: self.events.len(),
            event_counts,
        })
    }

    fn csv_row(&self, event: &LoggedEvent) -> Vec<String> {
        let data = &event.data;
        let join = |items: Vec<String>| items.join(";");
        vec![
            self.session_id.clone().unwrap_or_default(),
            format!("{:.2}", (event.timestamp - self.start_time) / 1000.0),
            to_datetime(event.timestamp).to_rfc3339_opts(SecondsFormat::Millis, true),
            event.event.clone(),
            opt(&data.sdg),
            opt(&data.year),
            opt(&data.iso),
            opt(&data.country),
            opt(&data.position),
            data.sdgs
                .as_ref()
                .map(|s| join(s.iter().map(ToString::to_string).collect()))
                .unwrap_or_default(),
            data.values
                .as_ref()
                .map(|v| join(v.iter().map(opt).collect()))
                .unwrap_or_default(),
            opt(&data.from_position),
            opt(&data.to_position),
            opt(&data.dragged_country),
            opt(&data.dragged_iso),
            opt(&data.target_country),
            opt(&data.target_iso),
            opt(&data.tempo),
            opt(&data.note_count),
            opt(&data.note_count_before),
            opt(&data.duration),
            opt(&data.mode),
        ]
    }

    /// Write the session as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(CSV_HEADERS)?;
        for event in &self.events {
            csv_writer.write_record(self.csv_row(event))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = self.write_csv(&mut buffer) {
            log::error!("[Logger] CSV export failed: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Suggested download file name
    pub fn csv_file_name(&self) -> String {
        format!("{}.csv", self.session_id.as_deref().unwrap_or("session"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-03-15T14:22:00Z
    const T0: f64 = 1_710_512_520_000.0;

    #[test]
    fn test_generated_session_id() {
        assert_eq!(generate_session_id(T0), "session_20240315_1422");
    }

    #[test]
    fn test_events_ignored_without_session() {
        let mut logger = InteractionLogger::new();
        logger.log("note_added", EventPayload::default(), T0);
        assert!(logger.events().is_empty());
        assert!(logger.end_session(T0).is_none());
        assert!(logger.stats(T0).is_none());
    }

    #[test]
    fn test_session_lifecycle() {
        let mut logger = InteractionLogger::new();
        let id = logger.start_session(Some("P01".into()), T0);
        assert_eq!(id, "P01");
        logger.log(
            "note_added",
            EventPayload {
                position: Some(1),
                ..Default::default()
            },
            T0 + 1500.0,
        );
        let stats = logger.stats(T0 + 2000.0).unwrap();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.event_counts["note_added"], 1);

        let export = logger.end_session(T0 + 4000.0).unwrap();
        assert_eq!(export.total_events, 3);
        assert_eq!(export.duration, Some(4000.0));
        assert!(!logger.is_active());
        // later events are dropped
        logger.log("note_added", EventPayload::default(), T0 + 5000.0);
        assert_eq!(logger.events().len(), 3);
    }

    #[test]
    fn test_csv_rows_and_escaping() {
        let mut logger = InteractionLogger::new();
        logger.start_session(Some("P02".into()), T0);
        logger.log(
            "note_added",
            EventPayload {
                iso: Some("KOR".into()),
                country: Some("Korea, Republic of".into()),
                position: Some(3),
                sdgs: Some(vec![1, 13]),
                values: Some(vec![Some(45.5), None]),
                ..Default::default()
            },
            T0 + 1234.0,
        );
        let csv = logger.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADERS.join(","));
        assert!(lines[1].starts_with("P02,0.00,2024-03-15T14:22:00.000Z,session_start"));
        assert!(lines[2].contains("1.23,"));
        assert!(lines[2].contains("\"Korea, Republic of\""));
        assert!(lines[2].contains(",3,1;13,45.5;,"));
        assert_eq!(logger.csv_file_name(), "P02.csv");
    }
}
