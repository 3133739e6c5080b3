use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::location::GeoPoint;
use crate::routing::TravelMode;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("routing request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("routing provider returned HTTP {0}")]
    HttpStatus(u16),

    #[error("routing provider rejected request: {0}")]
    Rejected(String),

    #[error("malformed routing response: {0}")]
    Malformed(String),
}

/// Route data exactly as the provider reported it.
#[derive(Debug, Clone)]
pub struct ProviderRoute {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub polyline: String,
}

#[async_trait]
pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        mode: TravelMode,
    ) -> Result<ProviderRoute, ProviderError>;
}

/// Directions API client (Google-compatible JSON).
pub struct HttpRouteProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpRouteProvider {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    overview_polyline: EncodedPolyline,
    legs: Vec<DirectionsLeg>,
}

#[derive(Deserialize)]
struct EncodedPolyline {
    points: String,
}

#[derive(Deserialize)]
struct DirectionsLeg {
    distance: ValueField,
    duration: ValueField,
}

#[derive(Deserialize)]
struct ValueField {
    value: u64,
}

#[async_trait]
impl RouteProvider for HttpRouteProvider {
    fn name(&self) -> &'static str {
        "directions_api"
    }

    async fn fetch_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        mode: TravelMode,
    ) -> Result<ProviderRoute, ProviderError> {
        let url = format!("{}/maps/api/directions/json", self.base_url);
        let origin = format!("{},{}", origin.lat, origin.lng);
        let destination = format!("{},{}", destination.lat, destination.lng);

        let response = self
            .client
            .get(url)
            .query(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", mode.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status().as_u16()));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Malformed(err.to_string()))?;

        if body.status != "OK" {
            return Err(ProviderError::Rejected(
                body.error_message.unwrap_or(body.status),
            ));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no routes".to_string()))?;

        if route.legs.is_empty() {
            return Err(ProviderError::Malformed("route has no legs".to_string()));
        }

        let (distance_meters, duration_seconds) = route
            .legs
            .iter()
            .fold((0, 0), |(distance, duration), leg| {
                (distance + leg.distance.value, duration + leg.duration.value)
            });

        Ok(ProviderRoute {
            distance_meters,
            duration_seconds,
            polyline: route.overview_polyline.points,
        })
    }
}
