use serde::Deserialize;

use crate::{error::HandleError, model::Coord, transport::Transport};

use super::{build_url, get_body};

#[derive(Debug, Deserialize)]
struct GeoLocation {
    lat: f64,
    lon: f64,
}

/// Resolve a city name to the coordinates of its best match.
pub async fn resolve_city(
    transport: &dyn Transport,
    base_url: &str,
    credential: &str,
    city: &str,
) -> Result<Coord, HandleError> {
    let url = build_url(base_url, &[("q", city), ("limit", "1"), ("appid", credential)])?;
    let body = get_body(transport, &url, credential).await?;

    let matches: Vec<GeoLocation> = serde_json::from_str(&body)
        .map_err(|source| HandleError::Json { context: "geocoding response", source })?;

    let first = matches
        .into_iter()
        .next()
        .ok_or_else(|| HandleError::LocationNotFound { city: city.to_string() })?;

    Ok(Coord { lat: first.lat, lon: first.lon })
}
