use std::f64::consts::PI;

use rand::Rng;

use crate::weather::catalog::MIN_WIND_SPEED;
use crate::weather::{
    Catalog, ConditionArchetype, DailyForecast, FrontType, HourlySample, TemperatureRange,
    WindDirection, HOURS_PER_DAY,
};

/// Chance per hour that the wind backs or veers one compass point.
pub const WIND_SHIFT_PROBABILITY: f64 = 0.15;

/// Maximum humidity jitter applied on top of the archetype's range.
pub const HUMIDITY_JITTER: i32 = 5;

/// Diurnal temperature factor in [0, 2]: zero at 06:00, rising through the
/// afternoon, peaking at 18:00.
pub fn diurnal_factor(hour: u32) -> f64 {
    1.0 - ((hour as f64 - 6.0) / 24.0 * 2.0 * PI).cos()
}

/// Temperature for one hour under an archetype, rounded and clamped into the
/// global envelope. Halves round up, so -2.5 becomes -2.
pub fn hourly_temperature<R: Rng + ?Sized>(
    archetype: &ConditionArchetype,
    hour: u32,
    range: TemperatureRange,
    rng: &mut R,
) -> i32 {
    let time_factor = diurnal_factor(hour);
    let base = archetype.min_temp + (archetype.max_temp - archetype.min_temp) * time_factor / 2.0;
    let noise = (rng.r#gen::<f64>() - 0.5) * archetype.variance;
    range.clamp((base + noise + 0.5).floor() as i32)
}

pub fn draw_front<R: Rng + ?Sized>(front_bias: f64, rng: &mut R) -> FrontType {
    if rng.gen_bool(front_bias) {
        FrontType::Cold
    } else {
        FrontType::Warm
    }
}

/// Generate one day of hourly samples.
///
/// The catalog must already be validated and `front_bias` must lie in [0, 1].
/// Every branch yields a valid sample, so generation cannot fail.
pub fn generate<R: Rng + ?Sized>(
    catalog: &Catalog,
    range: TemperatureRange,
    front_bias: f64,
    rng: &mut R,
) -> (DailyForecast, FrontType) {
    let front = draw_front(front_bias, rng);
    let mut current = rng.gen_range(0..catalog.calm_entries);
    let mut wind = WindDirection::from_index(rng.gen_range(0..WindDirection::ALL.len()));

    let mut samples = Vec::with_capacity(HOURS_PER_DAY);
    for hour in 0..HOURS_PER_DAY as u32 {
        let archetype = &catalog.archetypes[current];
        let temperature = hourly_temperature(archetype, hour, range, rng);
        let humidity = draw_humidity(archetype, rng);
        let wind_speed = rng.gen_range(MIN_WIND_SPEED..=archetype.max_wind);

        if rng.gen_bool(WIND_SHIFT_PROBABILITY) {
            wind = wind.rotate(if rng.gen_bool(0.5) { 1 } else { -1 });
        }

        if rng.gen_bool(archetype.transition) {
            current = next_condition(catalog, current, front, rng);
        }

        let condition = &catalog.archetypes[current];
        samples.push(HourlySample {
            hour: hour as u8,
            condition: condition.name.clone(),
            icon: condition.icon.clone(),
            temperature,
            humidity,
            wind_speed,
            wind_direction: wind,
        });
    }

    (DailyForecast::from_ordered(samples), front)
}

fn draw_humidity<R: Rng + ?Sized>(archetype: &ConditionArchetype, rng: &mut R) -> u8 {
    let base = rng.gen_range(archetype.humidity_min..=archetype.humidity_max) as i32;
    let jitter = rng.gen_range(-HUMIDITY_JITTER..=HUMIDITY_JITTER);
    (base + jitter).clamp(0, 100) as u8
}

/// Cold fronts push towards the severe end of the catalog; warm fronts
/// settle around the wet middle.
fn next_condition<R: Rng + ?Sized>(
    catalog: &Catalog,
    current: usize,
    front: FrontType,
    rng: &mut R,
) -> usize {
    let last = catalog.len() - 1;
    match front {
        FrontType::Cold => (current + rng.gen_range(0..=2)).min(last),
        FrontType::Warm => {
            let offset: i64 = rng.gen_range(-1..=1);
            (catalog.wet_middle as i64 + offset).clamp(0, last as i64) as usize
        }
    }
}
