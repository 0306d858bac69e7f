use serde::{Deserialize, Serialize};

use crate::error::HandleError;

/// Update policy of a [`WeatherHandle`](crate::WeatherHandle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePolicy {
    /// Cached weather is re-fetched on lookup once it is older than the refresh period.
    OnDemand,
    /// Cached weather is re-fetched by a background task every refresh period.
    Polling,
}

impl UpdatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdatePolicy::OnDemand => "on-demand",
            UpdatePolicy::Polling => "polling",
        }
    }
}

impl std::fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u32,
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: u32,
    pub humidity: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sys {
    pub sunrise: i64,
    pub sunset: i64,
}

/// Current weather at a location, in the shape handed back to callers.
///
/// Fields the remote service sends beyond these are dropped on parse, so
/// serializing a record always yields the same literal form. The service
/// sometimes omits `visibility`; it and a few other optional readings fall
/// back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub coord: Coord,
    pub weather: Vec<Condition>,
    pub main: MainReadings,
    #[serde(default)]
    pub visibility: u32,
    pub wind: Wind,
    /// When the remote service produced the reading (UNIX seconds).
    pub dt: i64,
    pub sys: Sys,
    #[serde(default)]
    pub timezone: i32,
    #[serde(default)]
    pub name: String,
}

impl Weather {
    pub fn to_json(&self) -> Result<String, HandleError> {
        serde_json::to_string(self)
            .map_err(|source| HandleError::Json { context: "weather record", source })
    }

    pub fn from_json(json: &str) -> Result<Self, HandleError> {
        serde_json::from_str(json)
            .map_err(|source| HandleError::Json { context: "weather record", source })
    }
}
