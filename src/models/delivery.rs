use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

/// Delivery lifecycle. Variant order is the allowed forward order, so the
/// derived `Ord` doubles as the monotonicity check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    ReadyForPickup,
    Assigned,
    EnRoutePickup,
    PickedUp,
    EnRouteDelivery,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn next(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Pending => Some(DeliveryStatus::ReadyForPickup),
            DeliveryStatus::ReadyForPickup => Some(DeliveryStatus::Assigned),
            DeliveryStatus::Assigned => Some(DeliveryStatus::EnRoutePickup),
            DeliveryStatus::EnRoutePickup => Some(DeliveryStatus::PickedUp),
            DeliveryStatus::PickedUp => Some(DeliveryStatus::EnRouteDelivery),
            DeliveryStatus::EnRouteDelivery => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered | DeliveryStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// A partner is on the road for this delivery and streams its position.
    pub fn is_active_leg(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Assigned
                | DeliveryStatus::EnRoutePickup
                | DeliveryStatus::PickedUp
                | DeliveryStatus::EnRouteDelivery
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::ReadyForPickup => "ready_for_pickup",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::EnRoutePickup => "en_route_pickup",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::EnRouteDelivery => "en_route_delivery",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Delivery created",
            DeliveryStatus::ReadyForPickup => "Order is ready for pickup",
            DeliveryStatus::Assigned => "Delivery partner assigned",
            DeliveryStatus::EnRoutePickup => "Partner is heading to the store",
            DeliveryStatus::PickedUp => "Order picked up",
            DeliveryStatus::EnRouteDelivery => "Order is on the way",
            DeliveryStatus::Delivered => "Order delivered",
            DeliveryStatus::Cancelled => "Delivery cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Customer(Uuid),
    Shopkeeper(Uuid),
    Partner(Uuid),
    Admin,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub order_id: Uuid,
    pub store_id: Uuid,
    pub customer_id: Uuid,
    pub shopkeeper_id: Uuid,
    pub status: DeliveryStatus,
    pub partner_id: Option<Uuid>,
    pub pickup_address: String,
    pub pickup_location: GeoPoint,
    pub delivery_address: String,
    pub delivery_location: GeoPoint,
    pub fee: u32,
    pub distance_km: f64,
    pub eta_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Append-only timeline entry; one per status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub status: DeliveryStatus,
    pub description: String,
    pub location: Option<GeoPoint>,
    pub actor: Actor,
    pub created_at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        delivery_id: Uuid,
        status: DeliveryStatus,
        actor: Actor,
        location: Option<GeoPoint>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            status,
            description: status.description().to_string(),
            location,
            actor,
            created_at: Utc::now(),
        }
    }
}
