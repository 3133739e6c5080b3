//! Boundary to the order/store/user database.
//!
//! The tracking core never owns these records; it reads them and issues the
//! narrow writes listed here. Partner availability is only ever changed
//! through [`DataStore::try_reserve_partner`] and [`DataStore::release_partner`].

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::delivery::StatusEvent;
use crate::models::location::GeoPoint;
use crate::models::notification::{NotificationRecord, PushRegistration};
use crate::models::order::{Order, OrderStatus, Store, User};
use crate::models::partner::{ApprovalStatus, DeliveryPartner};
use crate::models::session::SessionRecord;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, StoreError>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StoreError>;

    async fn get_delivery_partner(&self, id: Uuid)
    -> Result<Option<DeliveryPartner>, StoreError>;
    async fn find_partner_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DeliveryPartner>, StoreError>;
    async fn list_delivery_partners(&self) -> Result<Vec<DeliveryPartner>, StoreError>;

    /// Conditional update: flips `is_available` to false only if the partner
    /// is currently available and approved. Returns whether it flipped.
    async fn try_reserve_partner(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Makes the partner available again; `completed` bumps their stats.
    async fn release_partner(&self, id: Uuid, completed: bool) -> Result<(), StoreError>;

    async fn update_partner_location(&self, id: Uuid, location: GeoPoint)
    -> Result<(), StoreError>;
    async fn set_partner_approval(
        &self,
        id: Uuid,
        approval: ApprovalStatus,
    ) -> Result<DeliveryPartner, StoreError>;

    async fn create_notification(&self, record: NotificationRecord) -> Result<(), StoreError>;

    /// Marks unread offer notifications for a delivery as read. `only_user`
    /// narrows it to one recipient, `keep_user` is left untouched. Returns
    /// the number of rows changed.
    async fn void_offer_notifications(
        &self,
        delivery_id: Uuid,
        only_user: Option<Uuid>,
        keep_user: Option<Uuid>,
    ) -> Result<usize, StoreError>;
    async fn list_notifications(&self, user_id: Uuid)
    -> Result<Vec<NotificationRecord>, StoreError>;

    async fn create_status_event(&self, event: StatusEvent) -> Result<(), StoreError>;
    async fn list_status_events(&self, delivery_id: Uuid) -> Result<Vec<StatusEvent>, StoreError>;

    async fn upsert_session(&self, record: SessionRecord) -> Result<(), StoreError>;
    async fn mark_session_inactive(&self, session_id: Uuid) -> Result<(), StoreError>;

    async fn push_registrations(&self, user_id: Uuid)
    -> Result<Vec<PushRegistration>, StoreError>;
    async fn remove_push_registration(&self, id: Uuid) -> Result<(), StoreError>;
}
