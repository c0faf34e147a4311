use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use hko_core::{
    Config, Coordinator, Entity, HttpTransport, Settings, Snapshot, Transport, build_entities,
    config::DEFAULT_STATION_ID,
};
use inquire::Text;
use tokio::sync::mpsc;
use tracing::info;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "hko", version, about = "Hong Kong Observatory weather poller")]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add or replace a named site.
    Configure {
        /// Site name, e.g. "home".
        name: String,

        /// Automatic weather station code; prompted for if absent.
        #[arg(long)]
        climate_station: Option<String>,

        /// Forecast area code; prompted for if absent.
        #[arg(long)]
        forecast_station: Option<String>,

        /// Make this the default site.
        #[arg(long)]
        default: bool,
    },

    /// Refresh once and print the current state.
    Show {
        /// Site name; the default site if absent.
        #[arg(long)]
        site: Option<String>,

        /// Print the raw snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Keep refreshing and print the state after every update.
    Watch {
        /// Site name; the default site if absent.
        #[arg(long)]
        site: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { name, climate_station, forecast_station, default } => {
                configure(name, climate_station, forecast_station, default)
            }
            Command::Show { site, json } => show(site.as_deref(), json).await,
            Command::Watch { site } => watch(site.as_deref()).await,
        }
    }
}

fn configure(
    name: String,
    climate_station: Option<String>,
    forecast_station: Option<String>,
    make_default: bool,
) -> Result<()> {
    let mut config = Config::load()?;

    let climate_station = match climate_station {
        Some(id) => id,
        None => prompt_station("Climate station ID:")?,
    };
    let forecast_station = match forecast_station {
        Some(id) => id,
        None => prompt_station("Forecast station ID:")?,
    };

    config.upsert_site(Settings::new(name.clone(), climate_station, forecast_station));
    if make_default {
        config.set_default_site(&name)?;
    }
    config.save()?;

    println!(
        "Saved site '{name}' to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

fn prompt_station(message: &str) -> Result<String> {
    Text::new(message)
        .with_default(DEFAULT_STATION_ID)
        .prompt()
        .context("Failed to read station ID")
}

fn resolve_site(site: Option<&str>) -> Result<Settings> {
    let config = Config::load()?;
    let settings = match site {
        Some(name) => config.site(name)?,
        None => config.default_site()?,
    };
    Ok(settings.clone())
}

fn transport_for(settings: &Settings) -> Result<Arc<dyn Transport>> {
    let transport =
        HttpTransport::new(settings.timeout()).context("Failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

async fn show(site: Option<&str>, json: bool) -> Result<()> {
    let settings = resolve_site(site)?;
    let transport = transport_for(&settings)?;
    let coordinator = Coordinator::configure(settings, transport);

    coordinator
        .first_refresh()
        .await
        .with_context(|| format!("Failed to refresh site '{}'", coordinator.name()))?;

    let snapshot = coordinator
        .current_snapshot()
        .context("Refresh succeeded but no snapshot was published")?;

    if json {
        let text =
            serde_json::to_string_pretty(&*snapshot).context("Failed to serialize snapshot")?;
        println!("{text}");
    } else {
        print_state(&build_entities(&coordinator), &snapshot);
    }

    Ok(())
}

async fn watch(site: Option<&str>) -> Result<()> {
    let settings = resolve_site(site)?;
    let transport = transport_for(&settings)?;
    let name = settings.name.clone();

    let coordinator = Coordinator::start(settings, transport)
        .await
        .with_context(|| format!("Failed to start site '{name}'"))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Snapshot>>();
    coordinator.on_snapshot_updated(move |snapshot| {
        let _ = tx.send(Arc::clone(snapshot));
    });

    let entities = build_entities(&coordinator);
    if let Some(snapshot) = coordinator.current_snapshot() {
        print_state(&entities, &snapshot);
    }

    loop {
        tokio::select! {
            Some(snapshot) = rx.recv() => print_state(&entities, &snapshot),
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    coordinator.teardown();
    info!(site = %name, "stopped");
    Ok(())
}

fn print_state(entities: &[Entity], snapshot: &Snapshot) {
    println!(
        "\n== observed {} (fetched {}) ==",
        snapshot.observation.last_updated.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        snapshot.fetched_at.with_timezone(&Local).format("%H:%M:%S"),
    );

    for entity in entities.iter().filter(|e| e.enabled_by_default()) {
        let state = entity
            .state()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let unit = entity.unit().unwrap_or("");
        println!("{:<36} {:<44} {state} {unit}", entity.entity_id(), entity.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_configure_with_station_flags() {
        let cli = Cli::try_parse_from([
            "hko",
            "configure",
            "home",
            "--climate-station",
            "KP",
            "--forecast-station",
            "HKO",
        ])
        .expect("arguments should parse");

        match cli.command {
            Command::Configure { name, climate_station, forecast_station, default } => {
                assert_eq!(name, "home");
                assert_eq!(climate_station.as_deref(), Some("KP"));
                assert_eq!(forecast_station.as_deref(), Some("HKO"));
                assert!(!default);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["hko", "show", "--json", "-v"]).expect("should parse");
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Show { site: None, json: true }));
    }
}
