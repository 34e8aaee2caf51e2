use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::Password;
use std::{path::PathBuf, sync::Arc};
use weather_core::{Config, Envelope, ProviderId, WeatherAggregationService};

use crate::routes;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather, forecast and air-quality aggregator")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "google" or "openweather".
        provider: String,
    },

    /// Run the HTTP server.
    Serve {
        /// Address to listen on, e.g. "127.0.0.1:3000".
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print current weather and air quality for a location.
    Current {
        /// Address or location name.
        location: String,
    },

    /// Print the day summary `days` days from today.
    Forecast {
        /// Address or location name.
        location: String,

        #[arg(long)]
        days: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => {
                let id = ProviderId::try_from(provider.as_str())?;
                configure(self.config, id)
            }
            Command::Serve { bind } => {
                let mut config = load_config(self.config.as_deref())?;
                if let Some(bind) = bind {
                    config.server.bind = bind;
                }
                serve(config).await
            }
            Command::Current { location } => {
                let service = build_service(self.config.as_deref())?;
                let result = service.current(&location).await;
                print_envelope(&Envelope::from_result(&result))
            }
            Command::Forecast { location, days } => {
                let service = build_service(self.config.as_deref())?;
                let result = service.forecast(&location, Some(days.as_str())).await;
                print_envelope(&Envelope::from_result(&result))
            }
        }
    }
}

/// File config overlaid with environment variables.
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(p) => Config::load_from(p)?,
        None => Config::load()?,
    };
    config.apply_env_overrides(|k| std::env::var(k).ok())?;
    Ok(config)
}

fn build_service(path: Option<&std::path::Path>) -> anyhow::Result<WeatherAggregationService> {
    let config = load_config(path)?;
    WeatherAggregationService::from_config(&config)
}

fn print_envelope<T: serde::Serialize>(envelope: &Envelope<T>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(envelope).context("Failed to serialize response")?;
    println!("{json}");

    // The message is already in the printed envelope.
    if !envelope.status {
        return Err(anyhow!("request failed"));
    }
    Ok(())
}

fn configure(path: Option<PathBuf>, id: ProviderId) -> anyhow::Result<()> {
    // Env overrides are not persisted, so read the file as-is.
    let mut config = match &path {
        Some(p) if p.exists() => Config::load_from(p)?,
        Some(_) => Config::default(),
        None => Config::load()?,
    };

    let api_key = Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key for '{id}' must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());

    let saved_to = match path {
        Some(p) => {
            config.save_to(&p)?;
            p
        }
        None => config.save()?,
    };

    tracing::info!(provider = %id, path = %saved_to.display(), "saved provider credentials");
    println!("Saved {id} API key to {}", saved_to.display());
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let service = Arc::new(WeatherAggregationService::from_config(&config)?);
    let max_forecast_days = service.max_forecast_days();
    let app = routes::router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    tracing::info!(
        bind = %config.server.bind,
        max_forecast_days,
        "weather server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("got Ctrl-C, shutting down");
}
