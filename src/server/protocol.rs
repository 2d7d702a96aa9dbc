use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::simulation::{CurrentConditions, SimulationState};
use crate::weather::{hour_label, FrontType, HourlySample, OutlookDay, Warning, WindDirection};

/// Complete forecast sent to a client on connect and after every regeneration.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastSnapshot {
    pub message_type: &'static str,
    pub state_id: String,
    pub version: u64,
    pub location: String,
    pub forecast_date: NaiveDate,
    pub front: FrontType,
    pub current: Option<CurrentSnapshot>,
    /// 24 entries starting at the current hour
    pub hourly: Vec<HourlyEntry>,
    pub outlook: Vec<OutlookDay>,
    pub warnings: Vec<Warning>,
}

/// Interpolated values as shown in the "now" panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentSnapshot {
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    pub condition: String,
    pub icon: String,
}

/// One slot in the hourly strip.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyEntry {
    /// "Now" for the first slot, otherwise "3 PM" style
    pub label: String,
    pub hour: u8,
    pub condition: String,
    pub icon: String,
    pub temperature: i32,
    pub humidity: u8,
    pub wind_speed: u32,
    pub wind_direction: WindDirection,
}

/// Lightweight per-tick update carrying only the interpolated values.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackFrame {
    pub message_type: &'static str,
    pub state_id: String,
    pub version: u64,
    pub current: CurrentSnapshot,
}

/// Health endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub version: u64,
    pub ticks: u64,
    pub regenerations: u64,
    pub last_update: Option<NaiveDateTime>,
    pub location: String,
    pub playing: bool,
}

/// Commands a WebSocket client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientCommand {
    Regenerate,
}

impl ClientCommand {
    /// Accepts the bare word (`regenerate`) or the JSON form
    /// (`{"command":"regenerate"}`).
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("regenerate") {
            return Some(ClientCommand::Regenerate);
        }
        serde_json::from_str(trimmed).ok()
    }
}

impl From<&CurrentConditions> for CurrentSnapshot {
    fn from(c: &CurrentConditions) -> Self {
        CurrentSnapshot {
            time: c.time,
            temperature: round_tenth(c.temperature),
            humidity: round_tenth(c.humidity),
            wind_speed: round_tenth(c.wind_speed),
            wind_direction: c.wind_direction,
            condition: c.condition.clone(),
            icon: c.icon.clone(),
        }
    }
}

impl HourlyEntry {
    pub fn from_sample(sample: &HourlySample, label: String) -> Self {
        HourlyEntry {
            label,
            hour: sample.hour,
            condition: sample.condition.clone(),
            icon: sample.icon.clone(),
            temperature: sample.temperature,
            humidity: sample.humidity,
            wind_speed: sample.wind_speed,
            wind_direction: sample.wind_direction,
        }
    }
}

impl ForecastSnapshot {
    pub fn from_state(
        state: &SimulationState,
        current: Option<&CurrentConditions>,
        location: &str,
    ) -> Self {
        let current_hour = current.map(|c| c.time.hour()).unwrap_or(0);
        let hourly = state
            .forecast
            .rotated_from(current_hour)
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let label = if i == 0 {
                    "Now".to_string()
                } else {
                    hour_label(s.hour)
                };
                HourlyEntry::from_sample(s, label)
            })
            .collect();

        ForecastSnapshot {
            message_type: "ForecastSnapshot",
            state_id: state.id.to_string(),
            version: state.version,
            location: location.to_string(),
            forecast_date: state.forecast_date,
            front: state.front,
            current: current.map(CurrentSnapshot::from),
            hourly,
            outlook: state.outlook.clone(),
            warnings: state.warnings.clone(),
        }
    }
}

impl PlaybackFrame {
    pub fn new(state: &SimulationState, current: &CurrentConditions) -> Self {
        PlaybackFrame {
            message_type: "PlaybackFrame",
            state_id: state.id.to_string(),
            version: state.version,
            current: CurrentSnapshot::from(current),
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
