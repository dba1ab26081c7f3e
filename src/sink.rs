use crate::alert::{AlertCategory, AlertEvent};
use crate::error::SinkError;
use fxhash::FxHashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Durable destination for stall alerts.
pub trait AlertSink {
    fn record(&mut self, alert: &AlertEvent) -> Result<(), SinkError>;
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn record(&mut self, alert: &AlertEvent) -> Result<(), SinkError> {
        (**self).record(alert)
    }
}

/// Appends `detected_at,message` rows to a CSV file.
///
/// The file is opened in append mode for every alert, so it can be rotated or
/// removed while the monitor runs.
#[derive(Debug, Clone)]
pub struct CsvAlertLog {
    path: PathBuf,
}

impl CsvAlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn format_row(alert: &AlertEvent) -> String {
        format!(
            "{},{}\n",
            csv_field(&alert.detected_at_text()),
            csv_field(&alert.message)
        )
    }
}

impl AlertSink for CsvAlertLog {
    fn record(&mut self, alert: &AlertEvent) -> Result<(), SinkError> {
        let row = Self::format_row(alert);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(row.as_bytes()))
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Sends each alert to the sink registered for its category.
#[derive(Default)]
pub struct AlertRouter {
    routes: FxHashMap<AlertCategory, Box<dyn AlertSink + Send>>,
}

impl AlertRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The usual layout: one CSV log per category.
    pub fn csv(smoker_log: impl Into<PathBuf>, food_log: impl Into<PathBuf>) -> Self {
        Self::new()
            .route(AlertCategory::SmokerStall, CsvAlertLog::new(smoker_log))
            .route(AlertCategory::FoodStall, CsvAlertLog::new(food_log))
    }

    pub fn route(mut self, category: AlertCategory, sink: impl AlertSink + Send + 'static) -> Self {
        self.routes.insert(category, Box::new(sink));
        self
    }
}

impl AlertSink for AlertRouter {
    fn record(&mut self, alert: &AlertEvent) -> Result<(), SinkError> {
        match self.routes.get_mut(&alert.category) {
            Some(sink) => sink.record(alert),
            None => Err(SinkError::NoRoute(alert.category)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;
    use crate::sensor::SensorStream;
    use crate::stall::StallMeasure;
    use chrono::{Local, TimeZone};

    fn smoker_alert() -> AlertEvent {
        AlertEvent::new(
            SensorStream::Smoker,
            Reading::untimed(84.0),
            StallMeasure::Drop {
                first: 100.0,
                last: 84.0,
                drop: 16.0,
            },
            15.0,
            5,
            Local.with_ymd_and_hms(2024, 3, 7, 14, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_log_appends_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CsvAlertLog::new(dir.path().join("Smoker_alerts.csv"));

        log.record(&smoker_alert()).unwrap();
        log.record(&smoker_alert()).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("2024-03-07 14:30:00,Smoker Alert! Temperature decreased by 16.0F"));
    }

    #[test]
    fn test_csv_log_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = CsvAlertLog::new(dir.path().join("missing").join("alerts.csv"));
        assert!(matches!(log.record(&smoker_alert()), Err(SinkError::Write { .. })));
    }

    #[test]
    fn test_router_without_route() {
        let mut router = AlertRouter::new();
        assert!(matches!(
            router.record(&smoker_alert()),
            Err(SinkError::NoRoute(AlertCategory::SmokerStall))
        ));
    }
}
