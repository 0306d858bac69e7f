//! Fakes and fixtures shared by the unit tests.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};

use crate::{
    clock::Clock,
    config::Config,
    error::HandleError,
    model::Weather,
    registry::Registry,
    transport::{RawResponse, Transport},
};

pub(crate) const GEOCODING_PATH: &str = "/geo/1.0/direct";
pub(crate) const WEATHER_PATH: &str = "/data/2.5/weather";

/// Cities the fake service knows, with the coordinates its weather endpoint reports.
pub(crate) const CITIES: &[(&str, f64, f64)] = &[
    ("London", 51.5074, -0.1278),
    ("Karaganda", 49.8019, 73.1021),
    ("Norilsk", 69.3535, 88.2027),
    ("Sydney", -33.8688, 151.2093),
];

type Responder = Box<dyn Fn(&Url) -> RawResponse + Send + Sync>;

/// Transport answering from a closure and counting calls per endpoint path.
pub(crate) struct FakeTransport {
    responder: Responder,
    geocoding_calls: AtomicUsize,
    weather_calls: AtomicUsize,
    other_calls: AtomicUsize,
}

impl std::fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeTransport")
            .field("geocoding_calls", &self.geocoding_calls)
            .field("weather_calls", &self.weather_calls)
            .finish_non_exhaustive()
    }
}

impl FakeTransport {
    pub fn new(responder: impl Fn(&Url) -> RawResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            geocoding_calls: AtomicUsize::new(0),
            weather_calls: AtomicUsize::new(0),
            other_calls: AtomicUsize::new(0),
        })
    }

    /// Serve fixed bodies from the geocoding and weather paths, 404 elsewhere.
    pub fn serving(geocoding_body: String, weather_body: String) -> Arc<Self> {
        Self::new(move |url| match url.path() {
            GEOCODING_PATH => RawResponse::ok(geocoding_body.clone()),
            WEATHER_PATH => RawResponse::ok(weather_body.clone()),
            _ => RawResponse::status(StatusCode::NOT_FOUND),
        })
    }

    /// A small fake of the whole service over [`CITIES`], reporting `dt` as the data timestamp.
    pub fn cities(dt: Arc<AtomicI64>) -> Arc<Self> {
        Self::cities_with(dt, |_| None)
    }

    /// Like [`cities`](Self::cities), but `fault` may answer a city's weather request
    /// with an error status instead.
    pub fn cities_with(
        dt: Arc<AtomicI64>,
        fault: impl Fn(&str) -> Option<StatusCode> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::new(move |url| {
            let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
            match url.path() {
                GEOCODING_PATH => {
                    let name = query["q"].as_str();
                    match CITIES.iter().find(|(city, _, _)| *city == name) {
                        Some((city, lat, lon)) => RawResponse::ok(geocoding_response(city, *lat, *lon)),
                        None => RawResponse::ok("[]"),
                    }
                }
                WEATHER_PATH => {
                    let lat: f64 = query["lat"].parse().expect("lat must be a number");
                    let (city, lat, lon) = CITIES
                        .iter()
                        .find(|(_, city_lat, _)| *city_lat == lat)
                        .expect("weather requested for unknown coordinates");
                    if let Some(status) = fault(*city) {
                        return RawResponse::status(status);
                    }
                    RawResponse::ok(weather_response(*lat, *lon, dt.load(Ordering::SeqCst), city))
                }
                _ => RawResponse::status(StatusCode::NOT_FOUND),
            }
        })
    }

    pub fn geocoding_calls(&self) -> usize {
        self.geocoding_calls.load(Ordering::SeqCst)
    }

    pub fn weather_calls(&self) -> usize {
        self.weather_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.geocoding_calls() + self.weather_calls() + self.other_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &Url) -> Result<RawResponse, HandleError> {
        let counter = match url.path() {
            GEOCODING_PATH => &self.geocoding_calls,
            WEATHER_PATH => &self.weather_calls,
            _ => &self.other_calls,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Ok((self.responder)(url))
    }
}

pub(crate) fn config(cache_limit: usize, refresh_period_secs: u64) -> Config {
    Config { cache_limit, refresh_period_secs, ..Config::default() }
}

pub(crate) fn registry(
    config: Config,
    transport: Arc<FakeTransport>,
    clock: Arc<dyn Clock>,
) -> Registry {
    Registry::with_parts(config, transport, clock)
}

pub(crate) fn geocoding_response(city: &str, lat: f64, lon: f64) -> String {
    format!(
        "[{{\"name\":\"{city}\",\"local_names\":{{}},\"lat\":{lat},\"lon\":{lon},\
         \"country\":\"GB\",\"state\":\"England\"}}]"
    )
}

/// A weather endpoint body, including fields the caller-facing record drops.
pub(crate) fn weather_response(lat: f64, lon: f64, dt: i64, city: &str) -> String {
    format!(
        "{{\"coord\":{{\"lon\":{lon},\"lat\":{lat}}},\"weather\":[{{\"id\":802,\"main\":\"Clouds\",\
         \"description\":\"scattered clouds\",\"icon\":\"03d\"}}],\"base\":\"stations\",\
         \"main\":{{\"temp\":281.75,\"feels_like\":279.92,\"temp_min\":279.7,\"temp_max\":283.15,\
         \"pressure\":1032,\"humidity\":77}},\"visibility\":10000,\"wind\":{{\"speed\":3.09,\"deg\":300}},\
         \"clouds\":{{\"all\":40}},\"dt\":{dt},\"sys\":{{\"type\":2,\"id\":2075535,\"country\":\"GB\",\
         \"sunrise\":1675927583,\"sunset\":1675962189}},\"timezone\":0,\"id\":2643743,\
         \"name\":\"{city}\",\"cod\":200}}"
    )
}

/// The caller-facing JSON for the same reading as [`weather_response`].
pub(crate) fn weather_json(lat: f64, lon: f64, dt: i64, city: &str) -> String {
    format!(
        "{{\"coord\":{{\"lat\":{lat},\"lon\":{lon}}},\"weather\":[{{\"id\":802,\"main\":\"Clouds\",\
         \"description\":\"scattered clouds\"}}],\"main\":{{\"temp\":281.75,\"feels_like\":279.92,\
         \"pressure\":1032,\"humidity\":77}},\"visibility\":10000,\"wind\":{{\"speed\":3.09,\"deg\":300}},\
         \"dt\":{dt},\"sys\":{{\"sunrise\":1675927583,\"sunset\":1675962189}},\"timezone\":0,\
         \"name\":\"{city}\"}}"
    )
}

pub(crate) fn sample_weather(city: &str, dt: i64) -> Weather {
    let (lat, lon) = CITIES
        .iter()
        .find(|(name, _, _)| *name == city)
        .map(|(_, lat, lon)| (*lat, *lon))
        .unwrap_or((10.5, 20.5));
    Weather::from_json(&weather_response(lat, lon, dt, city)).expect("fixture must parse")
}
