use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use inquire::{CustomType, Text};
use weather_handle::{Config, Registry, UpdatePolicy};

use crate::shell;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-shell", version, about = "Shell for cached OpenWeather API handles")]
pub struct Cli {
    /// Config file to use instead of the one in the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the interactive shell (the default).
    Shell,

    /// Set endpoint URLs, cache limit and refresh period interactively.
    Configure,

    /// Print current weather in a city as JSON, then exit.
    Get {
        /// OpenWeather API key.
        #[arg(long)]
        api_key: String,

        /// City name, e.g. "London".
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => Config::config_file_path()?,
        };
        let config = Config::load_from(&config_path)?;

        match self.command.unwrap_or(Command::Shell) {
            Command::Shell => shell::run(Registry::new(config)).await,
            Command::Configure => configure(config, &config_path),
            Command::Get { api_key, city } => {
                let registry = Registry::new(config);
                let handle = registry.create(api_key, UpdatePolicy::OnDemand)?;
                let weather = handle.get_weather(&city.join(" ")).await;
                registry.dispose_all();

                println!("{}", weather?);
                Ok(())
            }
        }
    }
}

fn configure(mut config: Config, path: &Path) -> anyhow::Result<()> {
    config.geocoding_url =
        Text::new("Geocoding API URL:").with_default(&config.geocoding_url).prompt()?;
    config.weather_url = Text::new("Weather API URL:").with_default(&config.weather_url).prompt()?;
    config.cache_limit = CustomType::<usize>::new("Cities cached per handle (0 disables caching):")
        .with_default(config.cache_limit)
        .with_error_message("Please enter a non-negative whole number")
        .prompt()?;
    config.refresh_period_secs = CustomType::<u64>::new("Refresh period in seconds:")
        .with_default(config.refresh_period_secs)
        .with_error_message("Please enter a non-negative whole number")
        .prompt()?;

    config.save_to(path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_is_the_default_command() {
        let cli = Cli::try_parse_from(["weather-shell"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn get_joins_multi_word_cities() {
        let cli = Cli::try_parse_from([
            "weather-shell",
            "get",
            "--api-key",
            "abc123",
            "New",
            "York",
            "--config",
            "/tmp/weather.toml",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Get { api_key, city }) => {
                assert_eq!(api_key, "abc123");
                assert_eq!(city.join(" "), "New York");
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/weather.toml")));
    }

    #[test]
    fn get_requires_a_city() {
        assert!(Cli::try_parse_from(["weather-shell", "get", "--api-key", "abc123"]).is_err());
    }
}
