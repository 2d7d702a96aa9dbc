use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::SimulationConfig;
use crate::persistence::{self, FileStore, ForecastStore};
use crate::server::{self, ServerState, TickReport};
use crate::simulation::clock::{AcceleratedClock, Clock, SystemClock};
use crate::simulation::{self, generator, Playback, SimulationState};
use crate::weather::hour_label;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

/// Seeded generator, or one seeded from entropy when `seed` is 0.
pub fn make_rng(seed: u64) -> ChaCha8Rng {
    if seed == 0 {
        ChaCha8Rng::from_entropy()
    } else {
        ChaCha8Rng::seed_from_u64(seed)
    }
}

fn make_clock(config: &SimulationConfig) -> Box<dyn Clock> {
    if config.is_accelerated() {
        Box::new(AcceleratedClock::from_midnight(
            Local::now().date_naive(),
            config.accelerated_seconds_per_tick,
        ))
    } else {
        Box::new(SystemClock)
    }
}

/// Run playback: restore or generate the forecast, start the server, tick
/// until Ctrl-C.
pub async fn run_simulation(config: &SimulationConfig) -> Result<(), String> {
    // 1. Build the engine
    let catalog = config.load_catalog()?;
    let store = FileStore::new(&config.storage_directory);
    let mut playback = Playback::new(
        catalog,
        config.forecast_settings(),
        make_rng(config.seed),
        store,
        config.storage_key.clone(),
    );
    let mut clock = make_clock(config);

    // 2. First tick activates playback
    let mut last_now = clock.now();
    playback.tick(last_now);
    let initial = playback
        .state()
        .map(|s| server::build_snapshot_json(&s, playback.current(), &config.location))
        .unwrap_or_else(|| "{}".to_string());

    // 3. Start the server in the background
    let (regen_tx, mut regen_rx) = mpsc::channel(4);
    let state = Arc::new(ServerState::new(initial, config.location.clone(), regen_tx));

    let addr: SocketAddr = format!("{}:{}", config.websocket_bind, config.websocket_port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = server::start_server(server_state, addr).await {
            warn!("Server error: {}", e);
        }
    });

    // 4. Tick loop
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval = tokio::time::interval(Duration::from_secs_f32(1.0 / config.tick_rate_hz));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        tick_rate_hz = config.tick_rate_hz,
        clock = %config.clock,
        location = %config.location,
        "Playback running"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = clock.now();
                let hour_changed = now.hour() != last_now.hour() || now.date() != last_now.date();
                let outcome = playback.tick(now);
                let full = outcome.activated || outcome.regenerated || hour_changed;
                publish(&state, &playback, now, full, outcome.updated).await;
                last_now = now;
            }
            Some(()) = regen_rx.recv() => {
                let fresh = playback.regenerate(last_now);
                info!(version = fresh.version, "Manual regeneration complete");
                publish(&state, &playback, last_now, true, false).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!(regenerations = playback.regenerations(), "Playback stopped");
    Ok(())
}

async fn publish<R: Rng, S: ForecastStore>(
    server: &ServerState,
    playback: &Playback<R, S>,
    now: NaiveDateTime,
    full_snapshot: bool,
    updated: bool,
) {
    let Some(sim) = playback.state() else {
        return;
    };
    let current = playback.current();

    let snapshot =
        full_snapshot.then(|| server::build_snapshot_json(&sim, current, server.location()));
    let frame = current
        .filter(|_| updated)
        .map(|c| server::build_frame_json(&sim, c));

    server
        .on_tick(
            snapshot,
            frame,
            TickReport {
                version: sim.version,
                regenerations: playback.regenerations(),
                now,
                playing: playback.is_playing(),
                updated,
            },
        )
        .await;
}

/// Generate one day, print it, optionally persist it.
pub fn generate(config: &SimulationConfig, save: bool, seed: Option<u64>) -> Result<(), String> {
    let catalog = config.load_catalog()?;
    let mut rng = make_rng(seed.unwrap_or(config.seed));
    let state = simulation::generate_state(
        Local::now().date_naive(),
        1,
        &catalog,
        &config.forecast_settings(),
        &mut rng,
    );

    print_state(&state, &config.location);

    if save {
        let mut store = FileStore::new(&config.storage_directory);
        persistence::save_forecast(&mut store, &config.storage_key, &state.forecast)
            .map_err(|e| format!("Cannot save forecast: {}", e))?;
        println!("\nForecast saved to {}", store.path_for(&config.storage_key).display());
    }

    Ok(())
}

/// Print the stored forecast with its derived outlook and warnings.
pub fn inspect(config: &SimulationConfig) -> Result<(), String> {
    let catalog = config.load_catalog()?;
    let store = FileStore::new(&config.storage_directory);
    let range = config.temperature_range();

    let Some(forecast) = persistence::load_forecast(&store, &config.storage_key, range) else {
        println!(
            "No stored forecast at {}",
            store.path_for(&config.storage_key).display()
        );
        return Ok(());
    };

    let settings = config.forecast_settings();
    let mut rng = make_rng(config.seed);
    let front = generator::draw_front(settings.front_bias, &mut rng);
    let state = simulation::build_state(
        forecast,
        front,
        Local::now().date_naive(),
        1,
        &catalog,
        &settings,
        &mut rng,
    );

    print_state(&state, &config.location);
    Ok(())
}

/// Print the active catalog, calm to severe.
pub fn print_catalog(config: &SimulationConfig) -> Result<(), String> {
    let catalog = config.load_catalog()?;

    println!(
        "{:<3} {:<16} {:>12} {:>6} {:>9} {:>5} {:>6}  Flags",
        "#", "Condition", "Temp °C", "Var", "Humidity", "Wind", "Trans"
    );
    println!("{}", "-".repeat(72));
    for (i, a) in catalog.archetypes.iter().enumerate() {
        let mut flags = Vec::new();
        if i < catalog.calm_entries {
            flags.push("calm");
        }
        if i == catalog.wet_middle {
            flags.push("wet-middle");
        }
        if a.precipitation {
            flags.push("precip");
        }
        if a.severe {
            flags.push("severe");
        }
        println!(
            "{:<3} {:<16} {:>5.1}..{:<5.1} {:>6.1} {:>4}-{:<4} {:>5} {:>6.2}  {}",
            i,
            format!("{} {}", a.icon, a.name),
            a.min_temp,
            a.max_temp,
            a.variance,
            a.humidity_min,
            a.humidity_max,
            a.max_wind,
            a.transition,
            flags.join(",")
        );
    }
    println!("\n{} archetype(s)", catalog.len());
    Ok(())
}

fn print_state(state: &SimulationState, location: &str) {
    println!("=== {}, {} ===", location, state.forecast_date);
    println!("ID: {}", state.id);
    println!("Front: {}", state.front.name());
    println!();

    println!("--- Hourly ---");
    for s in state.forecast.samples() {
        println!(
            "  {:>5}  {:<2} {:<14} {:>4}°C  {:>3}%  {:>3} km/h {}",
            hour_label(s.hour),
            s.icon,
            s.condition,
            s.temperature,
            s.humidity,
            s.wind_speed,
            s.wind_direction.label()
        );
    }
    println!();

    println!("--- Outlook ---");
    for day in &state.outlook {
        println!(
            "  {:<6} {} {:<14} {:>4}°C / {:>4}°C",
            day.label, day.icon, day.condition, day.max_temp, day.min_temp
        );
    }
    println!();

    println!("--- Warnings ---");
    for w in &state.warnings {
        println!("  {}", w.message);
    }
}
