//! Translation between the two OpenWeather endpoints and typed results.

use reqwest::{StatusCode, Url};
use std::sync::Arc;
use tracing::debug;

use crate::{
    config::Config,
    error::HandleError,
    model::{Coord, Weather},
    transport::{Transport, describe_request},
};

pub mod geocoding;
pub mod weather;

/// Endpoint URLs plus the transport used to reach them.
///
/// Cheap to clone; every handle created by a registry gets its own copy.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    geocoding_url: String,
    weather_url: String,
}

impl RemoteClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        geocoding_url: impl Into<String>,
        weather_url: impl Into<String>,
    ) -> Self {
        Self { transport, geocoding_url: geocoding_url.into(), weather_url: weather_url.into() }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(transport, config.geocoding_url.clone(), config.weather_url.clone())
    }

    pub async fn resolve_city(&self, credential: &str, city: &str) -> Result<Coord, HandleError> {
        geocoding::resolve_city(self.transport.as_ref(), &self.geocoding_url, credential, city)
            .await
    }

    pub async fn fetch_weather(
        &self,
        credential: &str,
        coord: Coord,
    ) -> Result<Weather, HandleError> {
        weather::fetch_weather(self.transport.as_ref(), &self.weather_url, credential, coord).await
    }

    /// Resolve the city name, then fetch weather at the resolved coordinates.
    pub async fn fetch_weather_in_city(
        &self,
        credential: &str,
        city: &str,
    ) -> Result<Weather, HandleError> {
        let coord = self.resolve_city(credential, city).await?;
        self.fetch_weather(credential, coord).await
    }
}

pub(crate) fn build_url(base: &str, params: &[(&str, &str)]) -> Result<Url, HandleError> {
    Url::parse_with_params(base, params)
        .map_err(|e| HandleError::InvalidUrl { url: base.to_string(), reason: e.to_string() })
}

/// Send a GET and map the status to the error taxonomy, returning the body on success.
pub(crate) async fn get_body(
    transport: &dyn Transport,
    url: &Url,
    credential: &str,
) -> Result<String, HandleError> {
    let res = transport.get(url).await?;
    debug!(request = %describe_request(url), status = %res.status, "remote call finished");

    match res.status {
        StatusCode::OK => Ok(res.body),
        StatusCode::UNAUTHORIZED => {
            Err(HandleError::InvalidCredential { credential: credential.to_string() })
        }
        status => Err(HandleError::UnexpectedStatus { status, request: describe_request(url) }),
    }
}
