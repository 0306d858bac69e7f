//! The interactive command shell.

use std::{collections::BTreeMap, io::Write as _};

use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::debug;
use weather_handle::{Registry, UpdatePolicy, WeatherHandle};

/// One line of shell input.
#[derive(Debug, Parser)]
#[command(
    no_binary_name = true,
    disable_version_flag = true,
    help_template = "Commands:\n{subcommands}"
)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    /// Create a new handle: new-hdl <name> <api-key> <d|p>
    #[command(name = "new-hdl")]
    NewHandle { name: String, api_key: String, mode: Mode },

    /// Dispose a handle and forget its name
    #[command(name = "del-hdl")]
    DeleteHandle { name: String },

    /// Dispose every handle
    #[command(name = "del-all")]
    DeleteAll,

    /// Print info about a handle
    #[command(name = "info-hdl")]
    InfoHandle { name: String },

    /// Print the settings shared by all handles
    #[command(name = "info-factory")]
    InfoFactory,

    /// Get current weather in a city as JSON: get-weather <name> <city>
    #[command(name = "get-weather")]
    GetWeather {
        name: String,
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },

    /// Dispose every handle and leave
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// On demand
    #[value(name = "d", alias = "on-demand")]
    OnDemand,
    /// Polling
    #[value(name = "p", alias = "polling")]
    Polling,
}

impl From<Mode> for UpdatePolicy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::OnDemand => UpdatePolicy::OnDemand,
            Mode::Polling => UpdatePolicy::Polling,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Print(String),
    Nothing,
    Exit,
}

const HANDLE_NOT_FOUND: &str = "No handle with the specified name";

/// Named handles on top of a registry.
pub struct Shell {
    registry: Registry,
    handles: BTreeMap<String, WeatherHandle>,
}

impl Shell {
    pub fn new(registry: Registry) -> Self {
        Self { registry, handles: BTreeMap::new() }
    }

    pub async fn execute(&mut self, line: &str) -> Reply {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Reply::Nothing;
        }

        let verb = words[0];
        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => return Reply::Print(e.render().to_string().trim_end().to_string()),
        };
        debug!(verb, "shell command");

        match command {
            ShellCommand::NewHandle { name, api_key, mode } => self.new_handle(name, api_key, mode),
            ShellCommand::DeleteHandle { name } => match self.handles.remove(&name) {
                Some(handle) => {
                    handle.dispose();
                    Reply::Print("Success".into())
                }
                None => Reply::Print(HANDLE_NOT_FOUND.into()),
            },
            ShellCommand::DeleteAll => {
                self.close();
                Reply::Print("Success".into())
            }
            ShellCommand::InfoHandle { name } => match self.handles.get(&name) {
                Some(handle) => Reply::Print(describe_handle(&name, handle).await),
                None => Reply::Print(HANDLE_NOT_FOUND.into()),
            },
            ShellCommand::InfoFactory => Reply::Print(self.describe_registry()),
            ShellCommand::GetWeather { name, city } => match self.handles.get(&name) {
                Some(handle) => match handle.get_weather(&city.join(" ")).await {
                    Ok(json) => Reply::Print(json),
                    Err(e) => Reply::Print(e.to_string()),
                },
                None => Reply::Print(HANDLE_NOT_FOUND.into()),
            },
            ShellCommand::Exit => {
                self.close();
                Reply::Exit
            }
        }
    }

    /// Dispose every handle created through this shell.
    pub fn close(&mut self) {
        self.registry.dispose_all();
        self.handles.clear();
    }

    fn new_handle(&mut self, name: String, api_key: String, mode: Mode) -> Reply {
        if self.handles.contains_key(&name) {
            return Reply::Print("Specified name is occupied".into());
        }

        let handle = match self.registry.create(api_key, mode.into()) {
            Ok(handle) => handle,
            Err(e) => return Reply::Print(e.to_string()),
        };

        if handle.policy() == UpdatePolicy::Polling {
            report_polling_errors(name.clone(), &handle);
        }
        self.handles.insert(name, handle);

        Reply::Print("Success".into())
    }

    fn describe_registry(&self) -> String {
        let config = self.registry.config();
        let now = self.registry.now_secs();
        let now_utc = DateTime::from_timestamp(now, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "out of range".into());

        format!(
            "\tRegistry:
Current UNIX UTC   = {now} s ({now_utc})
Geocoding API URL  = {}
Weather API URL    = {}
Cache limit        = {}
Refresh period     = {} s
Live handles       = {}",
            config.geocoding_url,
            config.weather_url,
            config.cache_limit,
            config.refresh_period_secs,
            self.registry.len(),
        )
    }
}

async fn describe_handle(name: &str, handle: &WeatherHandle) -> String {
    let cities = handle.cached_cities().await;

    format!(
        "\t{name}:
ApiKey        = {}
UpdatePolicy  = {}
Cached cities = [{}]",
        handle.credential(),
        handle.policy(),
        cities.join(", "),
    )
}

/// Print failures of a polling handle's background refresh as they happen.
fn report_polling_errors(name: String, handle: &WeatherHandle) {
    let mut errors = handle.subscribe_polling_errors();
    tokio::spawn(async move {
        loop {
            match errors.recv().await {
                Ok(e) => {
                    eprintln!("\nAn error occurred within the polling loop of '{name}': {e}: {}", e.error)
                }
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("\n'{name}' polling loop: {skipped} more errors were dropped")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

pub async fn run(registry: Registry) -> anyhow::Result<()> {
    let mut shell = Shell::new(registry);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type `help` for the list of commands.");
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match shell.execute(&line).await {
            Reply::Print(message) => println!("{message}"),
            Reply::Nothing => {}
            Reply::Exit => break,
        }
    }

    shell.close();
    Ok(())
}
