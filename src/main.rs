use clap::{Parser, Subcommand};
use std::path::Path;

use skyloop::cli::commands;
use skyloop::config::SimulationConfig;

#[derive(Parser)]
#[command(name = "skyloop")]
#[command(about = "A simulated daily weather timeline with real-time interpolated playback")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "skyloop.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start playback with the WebSocket server
    Run,

    /// Generate one day of weather and print it
    Generate {
        /// Persist the generated forecast to the configured storage
        #[arg(short, long)]
        save: bool,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the stored forecast with its outlook and warnings
    Inspect,

    /// Print the active condition catalog
    Catalog,
}

fn load_config(path: &str) -> SimulationConfig {
    match SimulationConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli.config);
    commands::init_logging(&config);

    let result = match cli.command {
        Commands::Run => commands::run_simulation(&config).await,
        Commands::Generate { save, seed } => commands::generate(&config, save, seed),
        Commands::Inspect => commands::inspect(&config),
        Commands::Catalog => commands::print_catalog(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
