pub mod catalog;
pub mod sample;

use serde::Serialize;

pub use catalog::{Catalog, CatalogError, ConditionArchetype};
pub use sample::{
    hour_label, FrontType, HourlySample, OutlookDay, TemperatureRange, Warning, WarningKind,
    WindDirection,
};

pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForecastError {
    #[error("expected 24 hourly samples, got {0}")]
    WrongLength(usize),
    #[error("hour {0} is outside 0-23")]
    HourOutOfRange(u8),
    #[error("hour {0} appears more than once")]
    DuplicateHour(u8),
    #[error("hour {hour}: humidity {humidity} exceeds 100")]
    HumidityOutOfRange { hour: u8, humidity: u8 },
    #[error("hour {hour}: temperature {temperature}°C is outside {min}..={max}")]
    TemperatureOutOfRange {
        hour: u8,
        temperature: i32,
        min: i32,
        max: i32,
    },
}

/// One simulated day: exactly one sample for each hour 0..23, in hour order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    samples: Vec<HourlySample>,
}

impl DailyForecast {
    /// Build a forecast, rejecting anything that is not 24 unique hours.
    pub fn new(mut samples: Vec<HourlySample>) -> Result<Self, ForecastError> {
        if samples.len() != HOURS_PER_DAY {
            return Err(ForecastError::WrongLength(samples.len()));
        }

        let mut seen = [false; HOURS_PER_DAY];
        for s in &samples {
            let hour = s.hour as usize;
            if hour >= HOURS_PER_DAY {
                return Err(ForecastError::HourOutOfRange(s.hour));
            }
            if seen[hour] {
                return Err(ForecastError::DuplicateHour(s.hour));
            }
            if s.humidity > 100 {
                return Err(ForecastError::HumidityOutOfRange {
                    hour: s.hour,
                    humidity: s.humidity,
                });
            }
            seen[hour] = true;
        }

        samples.sort_by_key(|s| s.hour);
        Ok(DailyForecast { samples })
    }

    /// Wrap samples already known to cover hours 0..23 in order.
    pub(crate) fn from_ordered(samples: Vec<HourlySample>) -> Self {
        debug_assert!(
            samples.len() == HOURS_PER_DAY
                && samples.iter().enumerate().all(|(i, s)| s.hour as usize == i)
        );
        DailyForecast { samples }
    }

    /// Skip validation. Only for exercising the playback guards against a
    /// damaged forecast.
    #[cfg(test)]
    pub(crate) fn from_partial(samples: Vec<HourlySample>) -> Self {
        DailyForecast { samples }
    }

    /// Every sample must sit inside the global temperature envelope.
    pub fn check_envelope(&self, range: TemperatureRange) -> Result<(), ForecastError> {
        match self.samples.iter().find(|s| !range.contains(s.temperature)) {
            Some(s) => Err(ForecastError::TemperatureOutOfRange {
                hour: s.hour,
                temperature: s.temperature,
                min: range.min,
                max: range.max,
            }),
            None => Ok(()),
        }
    }

    pub fn samples(&self) -> &[HourlySample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<HourlySample> {
        self.samples
    }

    pub fn sample(&self, hour: u32) -> Option<&HourlySample> {
        self.samples.iter().find(|s| u32::from(s.hour) == hour)
    }

    pub fn max_temperature(&self) -> Option<i32> {
        self.samples.iter().map(|s| s.temperature).max()
    }

    pub fn min_temperature(&self) -> Option<i32> {
        self.samples.iter().map(|s| s.temperature).min()
    }

    /// The day's samples reordered to start at `hour`, wrapping past midnight.
    pub fn rotated_from(&self, hour: u32) -> Vec<HourlySample> {
        let start = self
            .samples
            .iter()
            .position(|s| u32::from(s.hour) == hour)
            .unwrap_or(0);
        let mut rotated = Vec::with_capacity(self.samples.len());
        rotated.extend_from_slice(&self.samples[start..]);
        rotated.extend_from_slice(&self.samples[..start]);
        rotated
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn new_sorts_samples_by_hour() {
        let samples: Vec<_> = (0..24u8).rev().map(|h| sample(h, "Clear", h as i32)).collect();
        let forecast = DailyForecast::new(samples).unwrap();
        let hours: Vec<u8> = forecast.samples().iter().map(|s| s.hour).collect();
        assert_eq!(hours, (0..24u8).collect::<Vec<_>>());
    }

    #[test]
    fn wrap_around_duplicate_hour_rejected() {
        let mut samples: Vec<_> = (0..23u8).map(|h| sample(h, "Clear", 10)).collect();
        samples.push(sample(0, "Clear", 11));
        assert_eq!(
            DailyForecast::new(samples).unwrap_err(),
            ForecastError::DuplicateHour(0)
        );
    }

    #[test]
    fn twenty_fifth_sample_rejected() {
        let mut samples: Vec<_> = (0..24u8).map(|h| sample(h, "Clear", 10)).collect();
        samples.push(sample(0, "Clear", 10));
        assert_eq!(
            DailyForecast::new(samples).unwrap_err(),
            ForecastError::WrongLength(25)
        );
    }

    #[test]
    fn hour_24_rejected() {
        let mut samples: Vec<_> = (1..24u8).map(|h| sample(h, "Clear", 10)).collect();
        samples.push(sample(24, "Clear", 10));
        assert_eq!(
            DailyForecast::new(samples).unwrap_err(),
            ForecastError::HourOutOfRange(24)
        );
    }

    #[test]
    fn max_and_min_temperature() {
        let forecast = uniform_day("Clear", |h| h as i32 - 4);
        assert_eq!(forecast.max_temperature(), Some(19));
        assert_eq!(forecast.min_temperature(), Some(-4));
    }

    #[test]
    fn rotated_from_starts_at_requested_hour() {
        let forecast = uniform_day("Clear", |h| h as i32);
        let rotated = forecast.rotated_from(22);
        assert_eq!(rotated.len(), 24);
        assert_eq!(rotated[0].hour, 22);
        assert_eq!(rotated[1].hour, 23);
        assert_eq!(rotated[2].hour, 0);
        assert_eq!(rotated[23].hour, 21);
    }

    #[test]
    fn envelope_check_names_first_offending_hour() {
        let forecast = uniform_day("Clear", |h| if h >= 14 { 45 } else { 20 });
        assert_eq!(forecast.check_envelope(TemperatureRange::new(-10, 50)), Ok(()));
        assert_eq!(
            forecast.check_envelope(TemperatureRange::new(-5, 30)),
            Err(ForecastError::TemperatureOutOfRange {
                hour: 14,
                temperature: 45,
                min: -5,
                max: 30,
            })
        );
    }

    #[test]
    fn sample_lookup_by_hour() {
        let forecast = uniform_day("Rain", |h| h as i32 * 2);
        assert_eq!(forecast.sample(7).map(|s| s.temperature), Some(14));
        assert!(forecast.sample(24).is_none());
    }
}
