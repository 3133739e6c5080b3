use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A single position report from a partner's device. Only the newest sample
/// per delivery is kept; everything else is broadcast and dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    pub delivery_id: Uuid,
    pub partner_id: Uuid,
    pub position: GeoPoint,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
