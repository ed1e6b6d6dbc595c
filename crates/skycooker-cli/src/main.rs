//! Command-line driver for SkyCooker multicookers.
//!
//! No BLE backend ships with this workspace, so the CLI drives a simulated
//! cooker over the in-memory transport. Every command prints the resulting
//! snapshot as JSON on stdout; logs go to stderr.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use skycooker_client::{Cooker, CookerConfig};
use skycooker_core::{AuthKey, CookingMode};
use skycooker_emulator::SimulatedCooker;
use skycooker_transport::MockTransport;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Redmond SkyCooker control utility", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device address, overrides the configuration file.
    #[arg(short, long)]
    address: Option<String>,

    /// Pre-shared key as 16 hex digits, overrides the configuration file.
    #[arg(short, long)]
    key: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Put the simulated cooker in pairing mode.
    #[arg(long)]
    pairing: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read the current status.
    Status,
    /// Select a program; `off` turns the cooker off.
    SetMode {
        mode: CookingMode,
        #[arg(short, long)]
        temperature: Option<u8>,
        #[arg(long)]
        hours: Option<u8>,
        #[arg(long)]
        minutes: Option<u8>,
    },
    /// Set the program temperature in °C.
    SetTemp { temperature: u8 },
    /// Set the cooking time.
    CookTime { hours: u8, minutes: u8 },
    /// Delay the start of the program.
    Delay { hours: u8, minutes: u8 },
    /// Enable or disable keep-warm after cooking.
    PostHeat {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Start the selected program.
    On,
    /// Stop cooking.
    Off,
    /// Run the connection self-test.
    SelfTest,
}

fn load_config(cli: &Cli) -> Result<CookerConfig> {
    let mut config = match &cli.config {
        Some(path) => CookerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CookerConfig::default(),
    };
    if let Some(address) = &cli.address {
        config.device.address = address.clone();
    }
    if let Some(key) = &cli.key {
        config.device.key = AuthKey::from_hex(key).context("parsing --key")?;
    }
    if config.device.address.is_empty() {
        config.device.address = "AA:BB:CC:DD:EE:FF".into();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    info!(
        address = %config.device.address,
        model = %config.device.model,
        "skycooker v{}",
        env!("CARGO_PKG_VERSION")
    );

    let (transport, link) = MockTransport::new(config.device.address.clone());
    let device = SimulatedCooker::new(config.device.key).attach(&link);
    device.set_pairing(cli.pairing);

    let cooker = Cooker::new(transport, &config)?;
    let tries = config.timing.update_tries;

    match cli.command {
        Commands::Status => {
            if !cooker.update(tries).await {
                bail!("status update failed");
            }
        }
        Commands::SetMode {
            mode,
            temperature,
            hours,
            minutes,
        } => cooker.set_mode(mode, temperature, hours, minutes).await?,
        Commands::SetTemp { temperature } => cooker.set_temperature(temperature).await?,
        Commands::CookTime { hours, minutes } => cooker.set_cooking_time(hours, minutes).await?,
        Commands::Delay { hours, minutes } => cooker.set_delay_time(hours, minutes).await?,
        Commands::PostHeat { enabled } => cooker.set_post_heat(enabled).await?,
        Commands::On => cooker.turn_on().await?,
        Commands::Off => cooker.turn_off().await?,
        Commands::SelfTest => {
            let report = cooker.self_test().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            cooker.stop().await;
            if !report.passed() {
                bail!("self-test failed");
            }
            return Ok(());
        }
    }

    println!("{}", serde_json::to_string_pretty(&cooker.snapshot())?);
    cooker.stop().await;
    Ok(())
}
