use crate::{
    error::HandleError,
    model::{Coord, Weather},
    transport::Transport,
};

use super::{build_url, get_body};

/// Fetch current weather at the given coordinates.
///
/// Coordinates go out in Rust's `Display` form for `f64`, which always uses a
/// period as decimal separator.
pub async fn fetch_weather(
    transport: &dyn Transport,
    base_url: &str,
    credential: &str,
    coord: Coord,
) -> Result<Weather, HandleError> {
    let lat = coord.lat.to_string();
    let lon = coord.lon.to_string();
    let url = build_url(
        base_url,
        &[("lat", lat.as_str()), ("lon", lon.as_str()), ("appid", credential)],
    )?;
    let body = get_body(transport, &url, credential).await?;

    serde_json::from_str(&body)
        .map_err(|source| HandleError::Json { context: "weather response", source })
}
