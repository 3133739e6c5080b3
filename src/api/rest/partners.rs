use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::location::GeoPoint;
use crate::models::partner::{ApprovalStatus, DeliveryPartner, Vehicle};
use crate::state::AppState;
use crate::store::DataStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/partners", post(register_partner).get(list_partners))
        .route("/partners/:id/approval", patch(set_approval))
}

#[derive(Deserialize)]
pub struct RegisterPartnerRequest {
    pub user_id: Uuid,
    pub name: String,
    pub vehicle: Vehicle,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default = "default_rating")]
    pub rating: f64,
}

fn default_rating() -> f64 {
    5.0
}

#[derive(Deserialize)]
pub struct ApprovalRequest {
    pub approval: ApprovalStatus,
}

async fn register_partner(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterPartnerRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if let Some(location) = &payload.location {
        geo::validate_point(location)?;
    }
    if state
        .store
        .find_partner_by_user(payload.user_id)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(format!(
            "user {} is already a delivery partner",
            payload.user_id
        )));
    }

    let partner = DeliveryPartner {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        name: payload.name,
        is_available: true,
        approval: ApprovalStatus::Pending,
        vehicle: payload.vehicle,
        rating: payload.rating.clamp(0.0, 5.0),
        completed_deliveries: 0,
        last_known_location: payload.location,
        updated_at: Utc::now(),
    };

    state.store.insert_partner(partner.clone());
    tracing::info!(partner_id = %partner.id, user_id = %partner.user_id, "delivery partner registered");
    Ok(Json(partner))
}

async fn list_partners(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeliveryPartner>>, AppError> {
    Ok(Json(state.store.list_delivery_partners().await?))
}

async fn set_approval(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApprovalRequest>,
) -> Result<Json<DeliveryPartner>, AppError> {
    let partner = state
        .store
        .set_partner_approval(id, payload.approval)
        .await?;
    tracing::info!(partner_id = %id, approval = ?payload.approval, "partner approval changed");
    Ok(Json(partner))
}
