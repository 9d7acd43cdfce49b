use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use forecast_core::{
    Config, ErrorResponse, ForecastResponse, LocationQuery, PipelineError, ResolveMode,
    WeatherReading,
};
use inquire::{Password, Select};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Current weather for an address or postal code")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the lookup mode and the OpenWeatherMap API key.
    Configure,

    /// Show the current temperature for a location.
    Show {
        /// Address, or postal code in postal-code mode.
        location: String,

        /// Override the configured lookup mode.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Print the JSON response body instead of a summary line.
        #[arg(long)]
        json: bool,
    },

    /// Drop every cached geocode and weather reading.
    ClearCache,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Address,
    PostalCode,
}

impl From<ModeArg> for ResolveMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Address => ResolveMode::Address,
            ModeArg::PostalCode => ResolveMode::PostalCode,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location, mode, json } => show(location, mode, json).await,
            Command::ClearCache => clear_cache().await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut cfg = Config::load()?;

    let modes = vec![ResolveMode::Address, ResolveMode::PostalCode];
    let start = modes.iter().position(|m| *m == cfg.mode).unwrap_or(0);
    cfg.mode = Select::new("Look up weather by:", modes)
        .with_starting_cursor(start)
        .prompt()
        .context("Mode selection cancelled")?;

    let api_key = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()
        .context("API key prompt cancelled")?;
    if !api_key.trim().is_empty() {
        cfg.set_api_key(api_key.trim().to_string());
    }

    cfg.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(location: String, mode: Option<ModeArg>, json: bool) -> anyhow::Result<()> {
    let mut cfg = Config::load()?;
    if let Some(mode) = mode {
        cfg.mode = mode.into();
    }

    let cache = cfg.open_cache()?;
    let resolver = cfg.build_resolver(cache).map_err(|e| {
        anyhow::anyhow!(
            "{e}.\nHint: run `forecast configure` or set {}.",
            forecast_core::config::API_KEY_ENV
        )
    })?;

    let query = LocationQuery::for_mode(cfg.mode, location);
    match resolver.resolve(&query).await {
        Ok(reading) => {
            if json {
                println!("{}", serde_json::to_string(&ForecastResponse::from(reading))?);
            } else {
                println!("{}", summary(&reading, &cfg.weather.units));
            }
            Ok(())
        }
        Err(err) => report_failure(&err, json),
    }
}

fn report_failure(err: &PipelineError, json: bool) -> anyhow::Result<()> {
    tracing::error!(kind = ?err.kind(), code = ?err.code(), "Forecast failed: {err}");

    if json {
        println!("{}", serde_json::to_string(&ErrorResponse::from(err))?);
    } else {
        eprintln!("Forecast failed: {err}");
        for reason in err.reasons() {
            eprintln!("  - {reason}");
        }
    }

    std::process::exit(if err.is_client_error() { 2 } else { 1 });
}

async fn clear_cache() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    cfg.open_cache()?.clear().await?;
    println!("Forecast cache cleared");
    Ok(())
}

fn summary(reading: &WeatherReading, units: &str) -> String {
    let unit = match units {
        "metric" => "°C",
        "standard" => "K",
        _ => "°F",
    };
    let cached = if reading.cached { " (cached)" } else { "" };
    format!("{}{unit}{cached}", reading.temperature_current)
}
