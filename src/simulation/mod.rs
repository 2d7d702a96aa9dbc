pub mod clock;
pub mod generator;
pub mod outlook;
pub mod playback;
pub mod warnings;

use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::weather::{Catalog, DailyForecast, FrontType, OutlookDay, TemperatureRange, Warning};

pub use playback::{lerp, CurrentConditions, Playback, TickOutcome};

/// Parameters of a generation cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSettings {
    pub range: TemperatureRange,
    /// Probability of a cold front
    pub front_bias: f64,
    pub outlook_days: usize,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        ForecastSettings {
            range: TemperatureRange::default(),
            front_bias: 0.65,
            outlook_days: 5,
        }
    }
}

/// Everything one generation cycle produces.
///
/// Never edited in place: each regeneration builds a fresh value and swaps it
/// in whole, so readers always see a consistent forecast, outlook and warning
/// set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    pub id: Uuid,
    /// Increments on every regeneration or restore
    pub version: u64,
    /// Calendar day the hourly samples describe
    pub forecast_date: NaiveDate,
    pub front: FrontType,
    pub forecast: DailyForecast,
    pub outlook: Vec<OutlookDay>,
    pub warnings: Vec<Warning>,
}

/// Run the extrapolator and warning evaluator over a forecast and package the
/// result.
pub fn build_state<R: Rng + ?Sized>(
    forecast: DailyForecast,
    front: FrontType,
    forecast_date: NaiveDate,
    version: u64,
    catalog: &Catalog,
    settings: &ForecastSettings,
    rng: &mut R,
) -> SimulationState {
    let outlook = outlook::extrapolate(
        &forecast,
        settings.outlook_days,
        settings.range,
        forecast_date,
        rng,
    );
    let warnings = warnings::evaluate(&outlook, &forecast, front, settings.range, catalog);

    SimulationState {
        id: Uuid::from_bytes(rng.r#gen()),
        version,
        forecast_date,
        front,
        forecast,
        outlook,
        warnings,
    }
}

/// Full pipeline: generate a day, then derive its outlook and warnings.
pub fn generate_state<R: Rng + ?Sized>(
    forecast_date: NaiveDate,
    version: u64,
    catalog: &Catalog,
    settings: &ForecastSettings,
    rng: &mut R,
) -> SimulationState {
    let (forecast, front) =
        generator::generate(catalog, settings.range, settings.front_bias, rng);
    build_state(forecast, front, forecast_date, version, catalog, settings, rng)
}
