use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DeliveryOffer,
    OfferWithdrawn,
    DeliveryAssigned,
    StatusUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// In-app notification row, owned by the data store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub delivery_id: Uuid,
    pub order_id: Uuid,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn from_payload(user_id: Uuid, payload: &NotificationPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind: payload.kind,
            title: payload.title.clone(),
            body: payload.body.clone(),
            delivery_id: payload.delivery_id,
            order_id: payload.order_id,
            data: payload.data.clone(),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    WebPush,
    MobilePush,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::WebPush => "web_push",
            ChannelKind::MobilePush => "mobile_push",
        }
    }
}

/// A device/browser registration for one push channel. For web push the
/// endpoint is the push service URL; for mobile push it is the device token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRegistration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel: ChannelKind,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

/// An assignment offer broadcast to several partners at once. At most one
/// candidate can turn it into a claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationOffer {
    pub id: Uuid,
    pub order_id: Uuid,
    pub delivery_id: Uuid,
    pub candidate_partner_ids: Vec<Uuid>,
    /// User ids of the candidates, index-aligned with `candidate_partner_ids`.
    pub recipient_user_ids: Vec<Uuid>,
    pub rejected_partner_ids: HashSet<Uuid>,
    pub payload: NotificationPayload,
    pub round: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NotificationOffer {
    pub fn is_candidate(&self, partner_id: Uuid) -> bool {
        self.candidate_partner_ids.contains(&partner_id)
            && !self.rejected_partner_ids.contains(&partner_id)
    }

    pub fn user_for(&self, partner_id: Uuid) -> Option<Uuid> {
        self.candidate_partner_ids
            .iter()
            .position(|id| *id == partner_id)
            .and_then(|idx| self.recipient_user_ids.get(idx).copied())
    }

    /// Drops rejected partners, and the users they map to, from the candidates.
    pub fn drop_rejected_candidates(&mut self) {
        let (partners, users): (Vec<Uuid>, Vec<Uuid>) = self
            .candidate_partner_ids
            .iter()
            .zip(&self.recipient_user_ids)
            .filter(|(partner_id, _)| !self.rejected_partner_ids.contains(partner_id))
            .map(|(partner_id, user_id)| (*partner_id, *user_id))
            .unzip();
        self.candidate_partner_ids = partners;
        self.recipient_user_ids = users;
    }

    pub fn all_rejected(&self) -> bool {
        self.candidate_partner_ids
            .iter()
            .all(|id| self.rejected_partner_ids.contains(id))
    }
}
