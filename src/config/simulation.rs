use serde::Deserialize;
use std::path::Path;

use crate::simulation::ForecastSettings;
use crate::weather::{Catalog, TemperatureRange};

/// Upper bound on the tick rate; keeps the tick period well above zero.
pub const MAX_TICK_RATE_HZ: f32 = 1000.0;

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,
    #[serde(default = "default_storage_directory")]
    pub storage_directory: String,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,
    #[serde(default = "default_websocket_bind")]
    pub websocket_bind: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_min_temperature")]
    pub min_temperature: i32,
    #[serde(default = "default_max_temperature")]
    pub max_temperature: i32,
    /// Probability that a generated day has a cold front
    #[serde(default = "default_front_bias")]
    pub front_bias: f64,
    #[serde(default = "default_outlook_days")]
    pub outlook_days: usize,
    /// 0 seeds from entropy
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_clock")]
    pub clock: String,
    #[serde(default = "default_accelerated_seconds_per_tick")]
    pub accelerated_seconds_per_tick: u32,
    #[serde(default)]
    pub catalog_file: Option<String>,
}

fn default_tick_rate() -> f32 {
    1.0
}
fn default_storage_directory() -> String {
    "./forecast".to_string()
}
fn default_storage_key() -> String {
    "daily-forecast".to_string()
}
fn default_websocket_port() -> u16 {
    8118
}
fn default_websocket_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_location() -> String {
    "Sim City, UK".to_string()
}
fn default_min_temperature() -> i32 {
    -5
}
fn default_max_temperature() -> i32 {
    30
}
fn default_front_bias() -> f64 {
    0.65
}
fn default_outlook_days() -> usize {
    5
}
fn default_clock() -> String {
    "wall".to_string()
}
fn default_accelerated_seconds_per_tick() -> u32 {
    3600
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_rate_hz: default_tick_rate(),
            storage_directory: default_storage_directory(),
            storage_key: default_storage_key(),
            websocket_port: default_websocket_port(),
            websocket_bind: default_websocket_bind(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            location: default_location(),
            min_temperature: default_min_temperature(),
            max_temperature: default_max_temperature(),
            front_bias: default_front_bias(),
            outlook_days: default_outlook_days(),
            seed: 0,
            clock: default_clock(),
            accelerated_seconds_per_tick: default_accelerated_seconds_per_tick(),
            catalog_file: None,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !self.tick_rate_hz.is_finite()
            || self.tick_rate_hz <= 0.0
            || self.tick_rate_hz > MAX_TICK_RATE_HZ
        {
            errors.push(format!(
                "tick_rate_hz must be > 0.0 and <= {}, got {}. Example: tick_rate_hz = 1.0",
                MAX_TICK_RATE_HZ, self.tick_rate_hz
            ));
        }

        if !(1024..=65535).contains(&self.websocket_port) {
            errors.push(format!(
                "websocket_port must be 1024-65535, got {}. Example: websocket_port = 8118",
                self.websocket_port
            ));
        }

        if let Err(e) = crate::persistence::store::validate_key(&self.storage_key) {
            errors.push(format!("{}. Example: storage_key = \"daily-forecast\"", e));
        }

        if self.min_temperature >= self.max_temperature {
            errors.push(format!(
                "min_temperature must be below max_temperature, got {} >= {}. \
                 Example: min_temperature = -5, max_temperature = 30",
                self.min_temperature, self.max_temperature
            ));
        }

        if !(0.0..=1.0).contains(&self.front_bias) {
            errors.push(format!(
                "front_bias must be within 0.0-1.0, got {}. Example: front_bias = 0.65",
                self.front_bias
            ));
        }

        if !(1..=14).contains(&self.outlook_days) {
            errors.push(format!(
                "outlook_days must be 1-14, got {}. Example: outlook_days = 5",
                self.outlook_days
            ));
        }

        let valid_clocks = ["wall", "accelerated"];
        if !valid_clocks.contains(&self.clock.as_str()) {
            errors.push(format!(
                "clock must be one of {:?}, got '{}'. Example: clock = \"wall\"",
                valid_clocks, self.clock
            ));
        }

        if self.accelerated_seconds_per_tick == 0 {
            errors.push(format!(
                "accelerated_seconds_per_tick must be > 0, got {}. \
                 Example: accelerated_seconds_per_tick = 3600",
                self.accelerated_seconds_per_tick
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            errors.push(format!(
                "log_format must be one of {:?}, got '{}'. Example: log_format = \"text\"",
                valid_formats, self.log_format
            ));
        }

        if self.location.trim().is_empty() {
            errors.push("location must not be empty. Example: location = \"Sim City, UK\"".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    pub fn temperature_range(&self) -> TemperatureRange {
        TemperatureRange::new(self.min_temperature, self.max_temperature)
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            range: self.temperature_range(),
            front_bias: self.front_bias,
            outlook_days: self.outlook_days,
        }
    }

    pub fn is_accelerated(&self) -> bool {
        self.clock == "accelerated"
    }

    /// The configured catalog file, or the built-in catalog when none is set.
    pub fn load_catalog(&self) -> Result<Catalog, String> {
        match &self.catalog_file {
            Some(path) => Catalog::from_file(Path::new(path)).map_err(|e| e.to_string()),
            None => Ok(Catalog::standard()),
        }
    }
}
