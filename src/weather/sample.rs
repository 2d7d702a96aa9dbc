use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// === Enums ===

/// The 8-point compass, in clockwise order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl WindDirection {
    pub const ALL: [WindDirection; 8] = [
        WindDirection::N,
        WindDirection::NE,
        WindDirection::E,
        WindDirection::SE,
        WindDirection::S,
        WindDirection::SW,
        WindDirection::W,
        WindDirection::NW,
    ];

    pub fn from_index(index: usize) -> WindDirection {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Step around the compass; positive is clockwise.
    pub fn rotate(self, steps: i32) -> WindDirection {
        let len = Self::ALL.len() as i32;
        let idx = (self.index() as i32 + steps).rem_euclid(len);
        Self::ALL[idx as usize]
    }

    pub fn label(self) -> &'static str {
        match self {
            WindDirection::N => "N",
            WindDirection::NE => "NE",
            WindDirection::E => "E",
            WindDirection::SE => "SE",
            WindDirection::S => "S",
            WindDirection::SW => "SW",
            WindDirection::W => "W",
            WindDirection::NW => "NW",
        }
    }
}

/// Per-day bias on how the condition chain moves through the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrontType {
    Cold,
    Warm,
}

impl FrontType {
    pub fn name(self) -> &'static str {
        match self {
            FrontType::Cold => "Cold",
            FrontType::Warm => "Warm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    FrontSummary,
    Heat,
    Freeze,
    SevereWeather,
}

// === Temperature envelope ===

/// Global temperature bounds every generated value is clamped into, in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min: i32,
    pub max: i32,
}

impl TemperatureRange {
    pub fn new(min: i32, max: i32) -> Self {
        TemperatureRange { min, max }
    }

    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl Default for TemperatureRange {
    fn default() -> Self {
        TemperatureRange { min: -5, max: 30 }
    }
}

// === Records ===

/// One hour of simulated weather.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    pub hour: u8,
    pub condition: String,
    pub icon: String,
    /// °C
    pub temperature: i32,
    /// Relative humidity, 0-100
    pub humidity: u8,
    /// km/h
    pub wind_speed: u32,
    pub wind_direction: WindDirection,
}

/// Summary of one day in the multi-day outlook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlookDay {
    pub day_offset: u32,
    pub date: NaiveDate,
    /// "Today" for offset 0, otherwise the weekday abbreviation
    pub label: String,
    pub max_temp: i32,
    pub min_temp: i32,
    pub condition: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub day_offset: u32,
    pub kind: WarningKind,
    pub message: String,
}

/// 12-hour clock label for an hour of the day ("12 AM", "3 PM").
pub fn hour_label(hour: u8) -> String {
    let hour = hour % 24;
    let display = if hour % 12 == 0 { 12 } else { hour % 12 };
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    format!("{} {}", display, suffix)
}
