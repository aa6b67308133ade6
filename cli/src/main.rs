mod commands;
mod util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rakshak_engine::Scenario;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "rakshak",
    version,
    about = "Rakshak CLI: run simulated track-tampering classification cycles and inspect the engine"
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "RAKSHAK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run classification cycles for one zone and print the outcomes
    Simulate {
        /// Track zone id (see `rakshak zones`)
        #[arg(long, default_value = "ZONE-001")]
        zone: String,
        /// Scenario id (see `rakshak scenarios`). Random mix if omitted.
        #[arg(long)]
        scenario: Option<Scenario>,
        /// Number of cycles to run
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        /// Seed for reproducible simulated evidence
        #[arg(long)]
        seed: Option<u64>,
        /// Bound on each evidence fetch, overriding pipeline.evidence_timeout_ms
        #[arg(long)]
        evidence_timeout_ms: Option<u64>,
    },
    /// Run cycles on an interval, check escalations each tick and stream push updates
    Watch {
        /// Track zone id. Cycles through every configured zone if omitted.
        #[arg(long)]
        zone: Option<String>,
        /// Scenario id. Random mix if omitted.
        #[arg(long)]
        scenario: Option<Scenario>,
        /// Seconds between ticks
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
        /// Stop after this many ticks (runs until Ctrl-C if omitted)
        #[arg(long)]
        max_ticks: Option<u64>,
        /// Seed for reproducible simulated evidence
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List the simulation scenarios
    Scenarios,
    /// List the configured track zones
    Zones,
    /// Print the effective, validated configuration
    Config,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Structured JSON logs on stderr; stdout carries command output only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rakshak_engine=info,rakshak_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = util::load_config(cli.config.as_deref());

    let code = match cli.command {
        Commands::Simulate {
            zone,
            scenario,
            cycles,
            seed,
            evidence_timeout_ms,
        } => {
            commands::simulate::run(&config, &zone, scenario, cycles, seed, evidence_timeout_ms)
                .await
        }
        Commands::Watch {
            zone,
            scenario,
            interval_secs,
            max_ticks,
            seed,
        } => {
            commands::watch::run(
                &config,
                zone.as_deref(),
                scenario,
                interval_secs,
                max_ticks,
                seed,
            )
            .await
        }
        Commands::Scenarios => commands::scenarios::run(),
        Commands::Zones => commands::zones::run(&config),
        Commands::Config => commands::config::run(&config),
    };

    std::process::exit(code);
}
