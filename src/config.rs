use log::info;
use std::env;
use std::time::Duration;

use crate::models::TemperatureUnit;

const DEFAULT_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub port: String,
    pub datalog_interval: Option<Duration>,
    pub display_unit: TemperatureUnit,
    pub channel_capacity: usize,
}

impl DeviceConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup, e.g. the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("EA15_PORT")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        let datalog_interval = match lookup("EA15_DATALOG_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| format!("EA15_DATALOG_INTERVAL_SECS is not a number: '{}'", raw))?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let display_unit = match lookup("EA15_DISPLAY_UNIT") {
            Some(raw) => raw
                .parse::<TemperatureUnit>()
                .map_err(|e| format!("EA15_DISPLAY_UNIT: {}", e))?,
            None => TemperatureUnit::Celsius,
        };

        let channel_capacity = match lookup("EA15_CHANNEL_CAPACITY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(format!(
                        "EA15_CHANNEL_CAPACITY must be a positive integer, got '{}'",
                        raw
                    )
                    .into())
                }
            },
            None => DEFAULT_CHANNEL_CAPACITY,
        };

        info!(
            "Config: port={}, datalog every {:?}, display unit {}",
            port,
            datalog_interval,
            display_unit.symbol()
        );

        Ok(DeviceConfig {
            port,
            datalog_interval,
            display_unit,
            channel_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<DeviceConfig, Box<dyn std::error::Error>> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeviceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, "/dev/ttyUSB0");
        assert_eq!(cfg.datalog_interval, None);
        assert_eq!(cfg.display_unit, TemperatureUnit::Celsius);
        assert_eq!(cfg.channel_capacity, 64);
    }

    #[test]
    fn test_all_keys() {
        let cfg = config(&[
            ("EA15_PORT", "/dev/ttyS3"),
            ("EA15_DATALOG_INTERVAL_SECS", "300"),
            ("EA15_DISPLAY_UNIT", "f"),
            ("EA15_CHANNEL_CAPACITY", "8"),
        ])
        .unwrap();
        assert_eq!(cfg.port, "/dev/ttyS3");
        assert_eq!(cfg.datalog_interval, Some(Duration::from_secs(300)));
        assert_eq!(cfg.display_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(cfg.channel_capacity, 8);
    }

    #[test]
    fn test_zero_interval_disables_requests() {
        let cfg = config(&[("EA15_DATALOG_INTERVAL_SECS", "0")]).unwrap();
        assert_eq!(cfg.datalog_interval, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("EA15_DATALOG_INTERVAL_SECS", "soon")]).is_err());
        assert!(config(&[("EA15_DISPLAY_UNIT", "R")]).is_err());
        assert!(config(&[("EA15_CHANNEL_CAPACITY", "0")]).is_err());
    }
}
