use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime, Timelike};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::persistence::{self, ForecastStore};
use crate::simulation::{build_state, generate_state, generator, ForecastSettings, SimulationState};
use crate::weather::{Catalog, HourlySample, WindDirection, HOURS_PER_DAY};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Linear interpolation between `a` and `b` by `t` in [0, 1].
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// How far `minute:second` sits through the hour, in [0, 1).
pub fn interpolation_fraction(minute: u32, second: u32) -> f64 {
    f64::from(minute * 60 + second) / SECONDS_PER_HOUR
}

/// Smoothed values shown between two hourly samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub time: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    pub condition: String,
    pub icon: String,
}

impl CurrentConditions {
    /// Numeric fields are interpolated. Condition, icon and wind direction
    /// belong to the current hour and only change on the hour.
    pub fn between(
        current: &HourlySample,
        next: &HourlySample,
        t: f64,
        time: NaiveDateTime,
    ) -> Self {
        CurrentConditions {
            time,
            temperature: lerp(f64::from(current.temperature), f64::from(next.temperature), t),
            humidity: lerp(f64::from(current.humidity), f64::from(next.humidity), t),
            wind_speed: lerp(f64::from(current.wind_speed), f64::from(next.wind_speed), t),
            wind_direction: current.wind_direction,
            condition: current.condition.clone(),
            icon: current.icon.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum PlaybackState {
    /// No forecast loaded yet
    Idle,
    Playing(Arc<SimulationState>),
}

/// How the first activation obtained its forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Restored,
    Generated,
    AlreadyPlaying,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub activated: bool,
    /// The displayed values were refreshed
    pub updated: bool,
    pub regenerated: bool,
}

/// The real-time playback engine.
///
/// Owns the catalog, the injected RNG and the forecast store. A host loop
/// calls [`Playback::tick`] with the current time; all work happens
/// synchronously inside that call.
pub struct Playback<R: Rng, S: ForecastStore> {
    catalog: Catalog,
    settings: ForecastSettings,
    rng: R,
    store: S,
    storage_key: String,
    state: PlaybackState,
    display: Option<CurrentConditions>,
    next_version: u64,
    regenerations: u64,
}

impl<R: Rng, S: ForecastStore> Playback<R, S> {
    pub fn new(
        catalog: Catalog,
        settings: ForecastSettings,
        rng: R,
        store: S,
        storage_key: impl Into<String>,
    ) -> Self {
        Playback {
            catalog,
            settings,
            rng,
            store,
            storage_key: storage_key.into(),
            state: PlaybackState::Idle,
            display: None,
            next_version: 1,
            regenerations: 0,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing(_))
    }

    /// The current simulation state; `None` while idle.
    pub fn state(&self) -> Option<Arc<SimulationState>> {
        match &self.state {
            PlaybackState::Playing(state) => Some(Arc::clone(state)),
            PlaybackState::Idle => None,
        }
    }

    /// Values most recently emitted by a tick.
    pub fn current(&self) -> Option<&CurrentConditions> {
        self.display.as_ref()
    }

    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    /// Cold start: restore the stored forecast, or generate one if nothing
    /// usable is stored.
    pub fn activate(&mut self, now: NaiveDateTime) -> Activation {
        if self.is_playing() {
            return Activation::AlreadyPlaying;
        }

        match persistence::load_forecast(&self.store, &self.storage_key, self.settings.range) {
            Some(forecast) => {
                // The front is a generation parameter and is not stored; draw
                // a fresh one for the summary.
                let front = generator::draw_front(self.settings.front_bias, &mut self.rng);
                let version = self.take_version();
                let state = build_state(
                    forecast,
                    front,
                    now.date(),
                    version,
                    &self.catalog,
                    &self.settings,
                    &mut self.rng,
                );
                info!(version, front = front.name(), "Restored stored forecast");
                self.state = PlaybackState::Playing(Arc::new(state));
                Activation::Restored
            }
            None => {
                info!("No stored forecast, generating one");
                self.regenerate_for(now.date());
                Activation::Generated
            }
        }
    }

    /// Manual "regenerate now": same pipeline as the day boundary, without the
    /// clock check.
    pub fn regenerate(&mut self, now: NaiveDateTime) -> Arc<SimulationState> {
        self.regenerate_for(now.date())
    }

    /// Advance playback to `now`.
    pub fn tick(&mut self, now: NaiveDateTime) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if !self.is_playing() {
            self.activate(now);
            outcome.activated = true;
        }

        // A tick that missed the 23:59:59 boundary catches up here.
        if self.forecast_date().is_some_and(|d| now.date() > d) {
            debug!(date = %now.date(), "Forecast is stale, regenerating");
            self.regenerate_for(now.date());
            outcome.regenerated = true;
        }

        outcome.updated = self.update_display(now);

        if is_day_boundary(now) && self.forecast_date().is_some_and(|d| d <= now.date()) {
            let tomorrow = now.date() + Days::new(1);
            self.regenerate_for(tomorrow);
            outcome.regenerated = true;
        }

        outcome
    }

    fn forecast_date(&self) -> Option<NaiveDate> {
        match &self.state {
            PlaybackState::Playing(state) => Some(state.forecast_date),
            PlaybackState::Idle => None,
        }
    }

    fn update_display(&mut self, now: NaiveDateTime) -> bool {
        let Some(state) = self.state() else {
            return false;
        };

        let hour = now.hour();
        let next_hour = (hour + 1) % HOURS_PER_DAY as u32;
        let (Some(current), Some(next)) =
            (state.forecast.sample(hour), state.forecast.sample(next_hour))
        else {
            debug!(hour, next_hour, "Hourly sample missing, keeping previous values");
            return false;
        };

        let t = interpolation_fraction(now.minute(), now.second());
        self.display = Some(CurrentConditions::between(current, next, t, now));
        true
    }

    fn regenerate_for(&mut self, forecast_date: NaiveDate) -> Arc<SimulationState> {
        let version = self.take_version();
        let state = Arc::new(generate_state(
            forecast_date,
            version,
            &self.catalog,
            &self.settings,
            &mut self.rng,
        ));

        if let Err(e) =
            persistence::save_forecast(&mut self.store, &self.storage_key, &state.forecast)
        {
            warn!(key = %self.storage_key, error = %e, "Failed to persist forecast");
        }

        info!(
            version,
            date = %forecast_date,
            front = state.front.name(),
            warnings = state.warnings.len(),
            "Generated new daily forecast"
        );

        self.state = PlaybackState::Playing(Arc::clone(&state));
        self.regenerations += 1;
        state
    }

    fn take_version(&mut self) -> u64 {
        let version = self.next_version;
        self.next_version += 1;
        version
    }

    #[cfg(test)]
    pub(crate) fn install(&mut self, state: SimulationState) {
        self.state = PlaybackState::Playing(Arc::new(state));
    }
}

fn is_day_boundary(now: NaiveDateTime) -> bool {
    (now.hour(), now.minute(), now.second()) == (23, 59, 59)
}
