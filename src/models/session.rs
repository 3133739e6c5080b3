use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Shopkeeper,
    DeliveryPartner,
}

impl Role {
    /// Roles allowed to see a partner's live position.
    pub fn receives_location(self) -> bool {
        matches!(self, Role::Customer | Role::Shopkeeper)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Customer => "customer",
            Role::Shopkeeper => "shopkeeper",
            Role::DeliveryPartner => "delivery_partner",
        };
        f.write_str(name)
    }
}

/// Persisted view of a live session; the registry keeps the in-memory side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub is_active: bool,
    pub connected_at: DateTime<Utc>,
    pub disconnected_at: Option<DateTime<Utc>>,
}
