use crate::reading::Reading;
use crate::sensor::SensorStream;
use crate::stall::StallMeasure;
use chrono::{DateTime, Local};
use std::fmt;

/// Format used for detection timestamps in logs and alert files.
pub const DETECTION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertCategory {
    SmokerStall,
    FoodStall,
}

impl AlertCategory {
    pub fn default_log_file(self) -> &'static str {
        match self {
            AlertCategory::SmokerStall => "Smoker_alerts.csv",
            AlertCategory::FoodStall => "Food_stall_alerts.csv",
        }
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCategory::SmokerStall => f.write_str("Smoker-stall"),
            AlertCategory::FoodStall => f.write_str("Food-stall"),
        }
    }
}

/// A stall detected on one stream. Created once, handed to a sink, dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub detected_at: DateTime<Local>,
    pub category: AlertCategory,
    pub stream: SensorStream,
    pub reading: Reading,
    pub measure: StallMeasure,
    pub message: String,
}

impl AlertEvent {
    pub fn new(
        stream: SensorStream,
        reading: Reading,
        measure: StallMeasure,
        threshold: f64,
        window_len: usize,
        detected_at: DateTime<Local>,
    ) -> Self {
        let message = match measure {
            StallMeasure::Drop { drop, .. } => format!(
                "Smoker Alert! Temperature decreased by {:.1}F (threshold {:.1}F) over the last {} readings. Current Temp: {}F",
                drop, threshold, window_len, reading.temperature
            ),
            StallMeasure::Plateau { spread, .. } => format!(
                "Food Stall Alert for {}! Temperature changed {:.1}F (threshold {:.1}F) over the last {} readings. Current Temp: {}F",
                stream.label(),
                spread,
                threshold,
                window_len,
                reading.temperature
            ),
        };
        Self {
            detected_at,
            category: stream.category(),
            stream,
            reading,
            measure,
            message,
        }
    }

    pub fn detected_at_text(&self) -> String {
        self.detected_at.format(DETECTION_TIME_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Timestamp;
    use chrono::TimeZone;

    #[test]
    fn test_smoker_message() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 14, 30, 0).unwrap();
        let reading = Reading::new(Timestamp::new("03/07/24 14:30:00").unwrap(), 84.0);
        let alert = AlertEvent::new(
            SensorStream::Smoker,
            reading,
            StallMeasure::Drop {
                first: 100.0,
                last: 84.0,
                drop: 16.0,
            },
            15.0,
            5,
            at,
        );
        assert_eq!(alert.category, AlertCategory::SmokerStall);
        assert_eq!(
            alert.message,
            "Smoker Alert! Temperature decreased by 16.0F (threshold 15.0F) over the last 5 readings. Current Temp: 84F"
        );
        assert_eq!(alert.detected_at_text(), "2024-03-07 14:30:00");
    }

    #[test]
    fn test_food_message_names_stream() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 14, 30, 0).unwrap();
        let alert = AlertEvent::new(
            SensorStream::FoodB,
            Reading::untimed(150.5),
            StallMeasure::Plateau {
                min: 150.0,
                max: 150.9,
                spread: 0.9,
            },
            1.0,
            20,
            at,
        );
        assert_eq!(alert.category, AlertCategory::FoodStall);
        assert!(alert.message.starts_with("Food Stall Alert for Food B!"));
        assert!(alert.message.ends_with("Current Temp: 150.5F"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(AlertCategory::SmokerStall.to_string(), "Smoker-stall");
        assert_eq!(AlertCategory::FoodStall.to_string(), "Food-stall");
    }
}
