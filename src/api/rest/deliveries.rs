use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::coordinator::OfferSummary;
use crate::error::AppError;
use crate::models::delivery::{Actor, Delivery, DeliveryStatus, StatusEvent};
use crate::models::location::{GeoPoint, LocationSample};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders/:id/offer", post(offer_delivery))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/timeline", get(timeline))
        .route("/deliveries/:id/accept", post(accept_offer))
        .route("/deliveries/:id/reject", post(reject_offer))
        .route("/deliveries/:id/status", post(update_status))
        .route("/deliveries/:id/location", post(report_location))
        .route("/deliveries/:id/fee", post(recompute_fee))
}

#[derive(Deserialize)]
pub struct OfferRequest {
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct PartnerRequest {
    pub partner_id: Uuid,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: DeliveryStatus,
    pub actor: Actor,
}

#[derive(Deserialize)]
pub struct LocationRequest {
    pub partner_id: Uuid,
    pub position: GeoPoint,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct LocationResponse {
    pub accepted: bool,
}

async fn offer_delivery(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OfferRequest>,
) -> Result<Json<OfferSummary>, AppError> {
    let summary = state
        .coordinator
        .offer_delivery(order_id, payload.actor)
        .await?;
    Ok(Json(summary))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.coordinator.get_delivery(id).await?))
}

async fn timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusEvent>>, AppError> {
    Ok(Json(state.coordinator.timeline(id).await?))
}

async fn accept_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .coordinator
        .accept_offer(id, payload.partner_id)
        .await?;
    Ok(Json(delivery))
}

async fn reject_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PartnerRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .coordinator
        .reject_offer(id, payload.partner_id)
        .await?;
    Ok(Json(serde_json::json!({ "rejected": true })))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .coordinator
        .update_status(id, payload.status, payload.actor)
        .await?;
    Ok(Json(delivery))
}

async fn report_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LocationRequest>,
) -> Result<Json<LocationResponse>, AppError> {
    let sample = LocationSample {
        delivery_id: id,
        partner_id: payload.partner_id,
        position: payload.position,
        heading: payload.heading,
        speed: payload.speed,
        accuracy: payload.accuracy,
        timestamp: payload.timestamp.unwrap_or_else(Utc::now),
    };

    let accepted = state.coordinator.report_location(sample).await?;
    Ok(Json(LocationResponse { accepted }))
}

async fn recompute_fee(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    Ok(Json(state.coordinator.recompute_fee(id).await?))
}
