use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo;
use crate::models::location::GeoPoint;
use crate::routing::{RouteResult, TravelMode};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote/fee", get(quote_fee))
        .route("/routes", post(compute_route))
}

#[derive(Deserialize)]
pub struct FeeQuery {
    pub distance_km: f64,
}

#[derive(Serialize)]
pub struct FeeQuote {
    pub distance_km: f64,
    pub fee: u32,
    pub eta_minutes: u32,
}

#[derive(Deserialize)]
pub struct RouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    #[serde(default)]
    pub mode: TravelMode,
}

async fn quote_fee(Query(query): Query<FeeQuery>) -> Result<Json<FeeQuote>, AppError> {
    Ok(Json(FeeQuote {
        distance_km: query.distance_km,
        fee: geo::fee_for_distance(query.distance_km)?,
        eta_minutes: geo::eta_minutes(query.distance_km)?,
    }))
}

async fn compute_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<RouteResult>, AppError> {
    let route = state
        .routes
        .compute_route(&payload.origin, &payload.destination, payload.mode)
        .await?;
    Ok(Json(route))
}
