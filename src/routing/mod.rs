//! Route lookups with a deterministic offline fallback.
//!
//! Every routing call in the service goes through [`RouteService`]. Provider
//! trouble (missing key, timeout, quota, garbage response) is logged and
//! replaced by a straight-line estimate; callers never see it.

pub mod polyline;
pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RoutingConfig;
use crate::error::AppError;
use crate::geo;
use crate::models::location::GeoPoint;
use crate::observability::metrics::Metrics;
use crate::routing::provider::{HttpRouteProvider, RouteProvider};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Bicycling,
    Walking,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Walking => "walking",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResult {
    pub route_id: String,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub polyline: String,
    pub map_link: String,
    pub source: RouteSource,
}

pub struct RouteService {
    provider: Option<Arc<dyn RouteProvider>>,
    timeout: Duration,
    metrics: Metrics,
}

impl RouteService {
    pub fn new(
        provider: Option<Arc<dyn RouteProvider>>,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            provider,
            timeout,
            metrics,
        }
    }

    pub fn from_config(config: &RoutingConfig, timeout: Duration, metrics: Metrics) -> Self {
        let provider = config.api_key.as_ref().and_then(|key| {
            match HttpRouteProvider::new(config.base_url.clone(), key.clone(), timeout) {
                Ok(provider) => Some(Arc::new(provider) as Arc<dyn RouteProvider>),
                Err(err) => {
                    warn!(error = %err, "routing provider disabled");
                    None
                }
            }
        });

        if provider.is_none() {
            debug!("no routing credentials; using straight-line routes");
        }

        Self::new(provider, timeout, metrics)
    }

    /// Only invalid coordinates are surfaced; everything else degrades to the
    /// straight-line estimate.
    pub async fn compute_route(
        &self,
        origin: &GeoPoint,
        destination: &GeoPoint,
        mode: TravelMode,
    ) -> Result<RouteResult, AppError> {
        geo::validate_point(origin)?;
        geo::validate_point(destination)?;

        let map_link = map_link(origin, destination, mode);

        if let Some(provider) = &self.provider {
            let lookup = provider.fetch_route(origin, destination, mode);
            match tokio::time::timeout(self.timeout, lookup).await {
                Ok(Ok(route)) => {
                    self.metrics
                        .route_requests_total
                        .with_label_values(&["provider"])
                        .inc();
                    return Ok(RouteResult {
                        route_id: Uuid::new_v4().to_string(),
                        distance_km: route.distance_meters as f64 / 1000.0,
                        duration_seconds: route.duration_seconds,
                        polyline: route.polyline,
                        map_link,
                        source: RouteSource::Provider,
                    });
                }
                Ok(Err(err)) => {
                    warn!(provider = provider.name(), error = %err, "routing provider failed; falling back");
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "routing provider timed out; falling back"
                    );
                }
            }
        }

        self.metrics
            .route_requests_total
            .with_label_values(&["fallback"])
            .inc();
        fallback_route(origin, destination, map_link)
    }
}

fn fallback_route(
    origin: &GeoPoint,
    destination: &GeoPoint,
    map_link: String,
) -> Result<RouteResult, AppError> {
    let distance_km = geo::distance_km(origin, destination)?;
    let eta_minutes = geo::eta_minutes(distance_km)?;

    Ok(RouteResult {
        route_id: format!(
            "straight:{:.5},{:.5}:{:.5},{:.5}",
            origin.lat, origin.lng, destination.lat, destination.lng
        ),
        distance_km,
        duration_seconds: u64::from(eta_minutes) * 60,
        polyline: polyline::encode(&[*origin, *destination]),
        map_link,
        source: RouteSource::Fallback,
    })
}

/// Browser-openable directions link; needs no credentials.
pub fn map_link(origin: &GeoPoint, destination: &GeoPoint, mode: TravelMode) -> String {
    format!(
        "https://www.google.com/maps/dir/?api=1&origin={},{}&destination={},{}&travelmode={}",
        origin.lat,
        origin.lng,
        destination.lat,
        destination.lng,
        mode.as_str()
    )
}
