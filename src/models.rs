use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

/// Unit a temperature value is expressed in on the wire or on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Map the device's unit byte: 0 = C, 2 = K, 3 = F.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TemperatureUnit::Celsius),
            2 => Some(TemperatureUnit::Kelvin),
            3 => Some(TemperatureUnit::Fahrenheit),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
            TemperatureUnit::Kelvin => 'K',
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" => Ok(TemperatureUnit::Celsius),
            "F" => Ok(TemperatureUnit::Fahrenheit),
            "K" => Ok(TemperatureUnit::Kelvin),
            other => Err(format!("unknown temperature unit '{}'", other)),
        }
    }
}

/// One measured temperature, stored canonically in Celsius.
///
/// A value built from an unknown unit is kept as an invalid zero rather than
/// failing the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Temperature {
    celsius: f64,
    valid: bool,
}

impl Temperature {
    pub fn from_value(value: f64, unit: TemperatureUnit) -> Self {
        let celsius = match unit {
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => f_to_c(value),
            TemperatureUnit::Kelvin => k_to_c(value),
        };
        Temperature {
            celsius,
            valid: true,
        }
    }

    /// Build from a raw device unit byte; unknown codes yield an invalid value.
    pub fn from_unit_code(value: f64, code: u8) -> Self {
        match TemperatureUnit::from_code(code) {
            Some(unit) => Self::from_value(value, unit),
            None => Self::invalid(),
        }
    }

    pub fn invalid() -> Self {
        Temperature::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn celsius(&self) -> f64 {
        self.celsius
    }

    pub fn fahrenheit(&self) -> f64 {
        c_to_f(self.celsius)
    }

    pub fn kelvin(&self) -> f64 {
        c_to_k(self.celsius)
    }

    pub fn in_unit(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.celsius(),
            TemperatureUnit::Fahrenheit => self.fahrenheit(),
            TemperatureUnit::Kelvin => self.kelvin(),
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}C", self.celsius)
    }
}

fn f_to_c(v: f64) -> f64 {
    (v - 32.0) * 5.0 / 9.0
}

fn k_to_c(v: f64) -> f64 {
    v - 273.15
}

fn c_to_f(v: f64) -> f64 {
    v * 9.0 / 5.0 + 32.0
}

fn c_to_k(v: f64) -> f64 {
    v + 273.15
}

/// Thermocouple type selected on the meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    K,
    J,
    E,
    T,
    R,
    S,
    N,
}

impl SensorType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SensorType::K),
            1 => Some(SensorType::J),
            2 => Some(SensorType::E),
            3 => Some(SensorType::T),
            4 => Some(SensorType::R),
            5 => Some(SensorType::S),
            6 => Some(SensorType::N),
            _ => None,
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            SensorType::K => "K",
            SensorType::J => "J",
            SensorType::E => "E",
            SensorType::T => "T",
            SensorType::R => "R",
            SensorType::S => "S",
            SensorType::N => "N",
        };
        f.write_str(letter)
    }
}

/// A two-channel sample, either live or replayed from the datalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: OffsetDateTime,
    pub t1: Temperature,
    pub t2: Temperature,
    pub sensor_type: Option<SensorType>,
    pub valid: bool,
}

impl Reading {
    /// The placeholder returned for any frame that fails to decode.
    pub fn invalid(timestamp: OffsetDateTime) -> Self {
        Reading {
            timestamp,
            t1: Temperature::invalid(),
            t2: Temperature::invalid(),
            sensor_type: None,
            valid: false,
        }
    }
}

/// One logging run recovered from a datalog dump.
#[derive(Debug, Clone, PartialEq)]
pub struct DatalogSession {
    /// Raw interval byte from the device; used as seconds between samples.
    pub samples_per_second: u8,
    pub readings: Vec<Reading>,
}

impl DatalogSession {
    pub fn new(samples_per_second: u8) -> Self {
        DatalogSession {
            samples_per_second,
            readings: Vec::new(),
        }
    }

    pub fn interval(&self) -> time::Duration {
        time::Duration::seconds(i64::from(self.samples_per_second))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
