use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Password, Select};
use weather_core::{
    Config, Dashboard, WeatherRecord, WeatherSource, available_locations, find_location,
    location::DEFAULT_CITY_NAME,
    provider::{client_from_config, sun_source_from_config},
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Taiwan weather dashboard")]
pub struct Cli {
    /// Path to the config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the weather card for the saved city, or for `--city`.
    Show {
        /// City to show instead of the saved one, e.g. "臺南市".
        #[arg(long)]
        city: Option<String>,

        /// Print the merged weather record as JSON.
        #[arg(long)]
        json: bool,

        /// Keep running and refresh the card every SECS seconds.
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        watch: Option<u64>,
    },

    /// Save the city selection and authorization key.
    Configure {
        /// City to save; prompts with the list of cities when absent.
        #[arg(long)]
        city: Option<String>,

        /// Authorization key; prompts when absent and none is stored.
        #[arg(long)]
        key: Option<String>,
    },

    /// List the selectable cities.
    Cities,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };

        match self.command {
            Command::Show { city, json, watch } => show(&config_path, city, json, watch).await,
            Command::Configure { city, key } => configure(&config_path, city, key).await,
            Command::Cities => {
                print!("{}", render::city_list());
                Ok(())
            }
        }
    }
}

async fn show(
    config_path: &Path,
    city: Option<String>,
    json: bool,
    watch: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = Config::load_from(config_path)?.with_env_overrides(std::env::vars());

    // A one-off `--city` is not persisted.
    if let Some(city) = &city {
        config.set_city_name(find_location(city)?.city_name);
    }

    let mut dashboard = dashboard_from_config(&config).await?;
    let record = dashboard.load().await.with_context(|| {
        format!("Failed to fetch weather for {}", dashboard.location().city_name)
    })?;
    print_record(&dashboard, &record, json)?;

    let Some(secs) = watch else {
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    // The first tick completes immediately; the initial load already ran.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        dashboard.recompute_moment_at(&Utc::now()).await;
        match dashboard.refresh().await {
            Ok(record) => print_record(&dashboard, &record, json)?,
            Err(err) => eprintln!("Refresh failed: {err}"),
        }
    }
}

fn print_record(
    dashboard: &Dashboard,
    record: &WeatherRecord,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
    } else {
        print!("{}", render::weather_card(dashboard, record));
    }
    Ok(())
}

async fn dashboard_from_config(config: &Config) -> anyhow::Result<Dashboard> {
    let client = client_from_config(config)?;
    let sun_times = sun_source_from_config(config, &client)?;
    let source: Arc<dyn WeatherSource> = Arc::new(client);

    Ok(Dashboard::from_config(config, source, sun_times).await)
}

async fn configure(
    config_path: &Path,
    city: Option<String>,
    key: Option<String>,
) -> anyhow::Result<()> {
    // Only the stored file is written back, so an exported key never lands on disk.
    let mut config = Config::load_from(config_path)?;

    let key = match key {
        Some(key) => Some(key),
        None if config.authorization_key().is_none() => Some(
            Password::new("Authorization key:")
                .without_confirmation()
                .prompt()
                .context("Failed to read authorization key")?,
        ),
        None => None,
    };
    if let Some(key) = key {
        config.authorization_key = Some(key.trim().to_string());
    }

    let runtime = config.clone().with_env_overrides(std::env::vars());
    let mut dashboard = dashboard_from_config(&runtime).await?;
    dashboard.open_settings();

    let city_name = match city {
        Some(city) => city,
        None => prompt_city(dashboard.location().city_name)?.to_string(),
    };
    dashboard.save_city(&city_name, &mut config, config_path).await?;

    println!("Saved {} to {}", dashboard.location().city_name, config_path.display());

    Ok(())
}

fn prompt_city(current: &str) -> anyhow::Result<&'static str> {
    let names: Vec<&'static str> = available_locations().iter().map(|l| l.city_name).collect();
    let cursor = names
        .iter()
        .position(|name| *name == current)
        .or_else(|| names.iter().position(|name| *name == DEFAULT_CITY_NAME))
        .unwrap_or(0);

    Select::new("City:", names)
        .with_starting_cursor(cursor)
        .prompt()
        .context("Failed to read city selection")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// Config pointing at a closed local port with an empty sun table, so no
    /// request leaves the machine.
    fn offline_config(dir: &Path) -> PathBuf {
        let table = dir.join("sun.json");
        std::fs::write(&table, "[]").unwrap();

        let path = dir.join("config.toml");
        let config = Config {
            base_url: Some("http://127.0.0.1:9".into()),
            request_timeout_secs: Some(2),
            sun_table_path: Some(table),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        path
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_show_with_city() {
        let cli =
            Cli::try_parse_from(["weather", "show", "--city", "臺南市", "--json"]).unwrap();
        match cli.command {
            Command::Show { city, json, watch } => {
                assert_eq!(city.as_deref(), Some("臺南市"));
                assert!(json);
                assert_eq!(watch, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_show_watch_interval() {
        let cli = Cli::try_parse_from(["weather", "show", "--watch", "60"]).unwrap();
        match cli.command {
            Command::Show { watch, .. } => assert_eq!(watch, Some(60)),
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["weather", "show", "--watch", "0"]).is_err());
    }

    #[tokio::test]
    async fn configure_with_flags_saves_without_prompting() {
        let dir = tempfile::tempdir().unwrap();
        let path = offline_config(dir.path());

        configure(&path, Some("宜蘭縣".into()), Some(" KEY ".into())).await.unwrap();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.city_name(), "宜蘭縣");
        assert_eq!(saved.authorization_key(), Some("KEY"));
        assert_eq!(saved.base_url(), "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn configure_rejects_unknown_city() {
        let dir = tempfile::tempdir().unwrap();
        let path = offline_config(dir.path());
        let before = Config::load_from(&path).unwrap();

        let err = configure(&path, Some("Atlantis".into()), Some("KEY".into())).await.unwrap_err();
        assert!(err.to_string().contains("Unknown location"));
        assert_eq!(Config::load_from(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn show_reports_the_city_when_fetch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = offline_config(dir.path());
        let mut config = Config::load_from(&path).unwrap();
        config.authorization_key = Some("KEY".into());
        config.save_to(&path).unwrap();

        let err = show(&path, Some("高雄市".into()), false, None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to fetch weather for 高雄市"), "{err:#}");
    }
}
