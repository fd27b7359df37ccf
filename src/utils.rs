/// Utility functions for formatting and summarising decoded data
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::models::{DatalogSession, Reading, Temperature, TemperatureUnit};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

fn format_temperature(t: &Temperature, unit: TemperatureUnit) -> String {
    if !t.is_valid() {
        return "--".to_string();
    }
    format!("{:.2}{}", t.in_unit(unit), unit.symbol())
}

/// One line per reading: `time : t1 : t2 : type : valid`.
pub fn format_reading(reading: &Reading, unit: TemperatureUnit) -> String {
    let sensor = reading
        .sensor_type
        .map(|s| s.to_string())
        .unwrap_or_else(|| "?".to_string());
    format!(
        "{} : {} : {} : {} : {}",
        format_datetime(&reading.timestamp),
        format_temperature(&reading.t1, unit),
        format_temperature(&reading.t2, unit),
        sensor,
        reading.valid
    )
}

/// Aggregate view of one datalog session, temperatures in Celsius.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub samples: usize,
    pub interval: Duration,
    pub span: Duration,
    pub t1_min: f64,
    pub t1_max: f64,
    pub t1_mean: f64,
    pub t2_min: f64,
    pub t2_max: f64,
    pub t2_mean: f64,
}

/// Summarise the valid readings of a session
///
/// Invalid records are skipped. Returns `None` when nothing valid remains.
/// Means are rounded to 2 decimal places.
pub fn summarize_session(session: &DatalogSession) -> Option<SessionSummary> {
    let valid: Vec<&Reading> = session.readings.iter().filter(|r| r.valid).collect();
    if valid.is_empty() {
        return None;
    }

    let count = valid.len() as f64;
    let (t1_min, t1_max, t1_sum) = min_max_sum(valid.iter().map(|r| r.t1.celsius()));
    let (t2_min, t2_max, t2_sum) = min_max_sum(valid.iter().map(|r| r.t2.celsius()));

    let span = match (session.readings.first(), session.readings.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => Duration::ZERO,
    };

    Some(SessionSummary {
        samples: valid.len(),
        interval: session.interval(),
        span,
        t1_min,
        t1_max,
        t1_mean: (t1_sum / count * 100.0).round() / 100.0,
        t2_min,
        t2_max,
        t2_mean: (t2_sum / count * 100.0).round() / 100.0,
    })
}

fn min_max_sum(values: impl Iterator<Item = f64>) -> (f64, f64, f64) {
    values.fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(min, max, sum), v| (min.min(v), max.max(v), sum + v),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SensorType;

    fn reading(secs: i64, t1: f64, t2: f64) -> Reading {
        Reading {
            timestamp: OffsetDateTime::from_unix_timestamp(secs).unwrap(),
            t1: Temperature::from_value(t1, TemperatureUnit::Celsius),
            t2: Temperature::from_value(t2, TemperatureUnit::Celsius),
            sensor_type: Some(SensorType::K),
            valid: true,
        }
    }

    #[test]
    fn test_format_datetime() {
        let dt = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(format_datetime(&dt), "01.01.1970 - 00:00:00");
    }

    #[test]
    fn test_format_reading() {
        let r = reading(0, 100.0, 0.0);
        assert_eq!(
            format_reading(&r, TemperatureUnit::Fahrenheit),
            "01.01.1970 - 00:00:00 : 212.00F : 32.00F : K : true"
        );

        let invalid = Reading::invalid(OffsetDateTime::from_unix_timestamp(0).unwrap());
        assert_eq!(
            format_reading(&invalid, TemperatureUnit::Celsius),
            "01.01.1970 - 00:00:00 : -- : -- : ? : false"
        );
    }

    #[test]
    fn test_summarize_session() {
        let mut session = DatalogSession::new(5);
        session.readings.push(reading(0, 20.0, 30.0));
        session.readings.push(Reading::invalid(OffsetDateTime::from_unix_timestamp(5).unwrap()));
        session.readings.push(reading(10, 21.0, 29.0));
        session.readings.push(reading(15, 22.5, 31.0));

        let summary = summarize_session(&session).unwrap();
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.interval, Duration::seconds(5));
        assert_eq!(summary.span, Duration::seconds(15));
        assert_eq!(summary.t1_min, 20.0);
        assert_eq!(summary.t1_max, 22.5);
        assert_eq!(summary.t1_mean, 21.17);
        assert_eq!(summary.t2_mean, 30.0);
    }

    #[test]
    fn test_summarize_empty_session() {
        assert_eq!(summarize_session(&DatalogSession::new(1)), None);
    }
}
