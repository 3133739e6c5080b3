use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo;
use crate::models::location::GeoPoint;
use crate::models::notification::{ChannelKind, NotificationRecord, PushRegistration};
use crate::models::order::{Order, OrderStatus, Store, User};
use crate::state::AppState;
use crate::store::DataStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user))
        .route("/users/:id/push", post(register_push))
        .route("/users/:id/notifications", get(list_notifications))
        .route("/stores", post(create_store))
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct PushRegistrationRequest {
    pub channel: ChannelKind,
    pub endpoint: String,
}

#[derive(Deserialize)]
pub struct CreateStoreRequest {
    pub owner_user_id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub delivery_address: String,
    pub delivery_location: GeoPoint,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
    };
    state.store.insert_user(user.clone());
    Ok(Json(user))
}

async fn register_push(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<PushRegistrationRequest>,
) -> Result<Json<PushRegistration>, AppError> {
    if state.store.get_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {user_id} not found")));
    }
    if payload.endpoint.trim().is_empty() {
        return Err(AppError::BadRequest("endpoint cannot be empty".to_string()));
    }

    let registration = PushRegistration {
        id: Uuid::new_v4(),
        user_id,
        channel: payload.channel,
        endpoint: payload.endpoint,
        created_at: Utc::now(),
    };
    state.store.add_push_registration(registration.clone());
    Ok(Json(registration))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<NotificationRecord>>, AppError> {
    Ok(Json(state.store.list_notifications(user_id).await?))
}

async fn create_store(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateStoreRequest>,
) -> Result<Json<Store>, AppError> {
    geo::validate_point(&payload.location)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let shop = Store {
        id: Uuid::new_v4(),
        owner_user_id: payload.owner_user_id,
        name: payload.name,
        address: payload.address,
        location: payload.location,
    };
    state.store.insert_store(shop.clone());
    Ok(Json(shop))
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    geo::validate_point(&payload.delivery_location)?;
    if state.store.get_store(payload.store_id).await?.is_none() {
        return Err(AppError::NotFound(format!("store {} not found", payload.store_id)));
    }

    let order = Order {
        id: Uuid::new_v4(),
        store_id: payload.store_id,
        customer_id: payload.customer_id,
        delivery_address: payload.delivery_address,
        delivery_location: payload.delivery_location,
        status: OrderStatus::Placed,
        created_at: Utc::now(),
    };
    state.store.insert_order(order.clone());
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .store
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    Ok(Json(order))
}
