//! Managed, cached handles to the OpenWeather API.
//!
//! This crate defines:
//! - A [`Registry`] handing out one live [`WeatherHandle`] per API key
//! - The per-handle weather cache with on-demand or polling refresh
//! - Translation of the geocoding and current-weather endpoints into typed results
//! - Configuration shared by all handles of a registry
//!
//! It is used by `weather-shell`, but can also be embedded in other binaries or services.

pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod model;
pub mod registry;
pub mod remote;
pub mod transport;

mod cache;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::HandleError;
pub use handle::{PollingError, WeatherHandle};
pub use model::{Coord, UpdatePolicy, Weather};
pub use registry::Registry;
pub use transport::{HttpTransport, RawResponse, Transport};
