use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::location::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Bicycle,
    Scooter,
    Motorcycle,
    Car,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub kind: VehicleKind,
    #[serde(default)]
    pub registration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPartner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_available: bool,
    pub approval: ApprovalStatus,
    pub vehicle: Vehicle,
    pub rating: f64,
    pub completed_deliveries: u32,
    pub last_known_location: Option<GeoPoint>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryPartner {
    pub fn can_take_offers(&self) -> bool {
        self.is_available && self.approval == ApprovalStatus::Approved
    }
}
