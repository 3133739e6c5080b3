use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::delivery::StatusEvent;
use crate::models::location::GeoPoint;
use crate::models::notification::{NotificationKind, NotificationRecord, PushRegistration};
use crate::models::order::{Order, OrderStatus, Store, User};
use crate::models::partner::{ApprovalStatus, DeliveryPartner};
use crate::models::session::SessionRecord;
use crate::store::{DataStore, StoreError};

/// In-process store used by the binary and the tests.
#[derive(Default)]
pub struct MemoryStore {
    orders: DashMap<Uuid, Order>,
    stores: DashMap<Uuid, Store>,
    users: DashMap<Uuid, User>,
    partners: DashMap<Uuid, DeliveryPartner>,
    notifications: DashMap<Uuid, NotificationRecord>,
    status_events: DashMap<Uuid, Vec<StatusEvent>>,
    sessions: DashMap<Uuid, SessionRecord>,
    push_registrations: DashMap<Uuid, PushRegistration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn insert_store(&self, store: Store) {
        self.stores.insert(store.id, store);
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_partner(&self, partner: DeliveryPartner) {
        self.partners.insert(partner.id, partner);
    }

    pub fn add_push_registration(&self, registration: PushRegistration) {
        self.push_registrations
            .insert(registration.id, registration);
    }

    pub fn session(&self, id: Uuid) -> Option<SessionRecord> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn has_push_registration(&self, id: Uuid) -> bool {
        self.push_registrations.contains_key(&id)
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_store(&self, id: Uuid) -> Result<Option<Store>, StoreError> {
        Ok(self.stores.get(&id).map(|entry| entry.value().clone()))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), StoreError> {
        let mut order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("order {id}")))?;
        order.status = status;
        Ok(())
    }

    async fn get_delivery_partner(
        &self,
        id: Uuid,
    ) -> Result<Option<DeliveryPartner>, StoreError> {
        Ok(self.partners.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_partner_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DeliveryPartner>, StoreError> {
        Ok(self
            .partners
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone()))
    }

    async fn list_delivery_partners(&self) -> Result<Vec<DeliveryPartner>, StoreError> {
        Ok(self
            .partners
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn try_reserve_partner(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut partner = self
            .partners
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("partner {id}")))?;

        if !partner.can_take_offers() {
            return Ok(false);
        }

        partner.is_available = false;
        partner.updated_at = Utc::now();
        Ok(true)
    }

    async fn release_partner(&self, id: Uuid, completed: bool) -> Result<(), StoreError> {
        let mut partner = self
            .partners
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("partner {id}")))?;

        partner.is_available = true;
        if completed {
            partner.completed_deliveries = partner.completed_deliveries.saturating_add(1);
        }
        partner.updated_at = Utc::now();
        Ok(())
    }

    async fn update_partner_location(
        &self,
        id: Uuid,
        location: GeoPoint,
    ) -> Result<(), StoreError> {
        let mut partner = self
            .partners
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("partner {id}")))?;

        partner.last_known_location = Some(location);
        partner.updated_at = Utc::now();
        Ok(())
    }

    async fn set_partner_approval(
        &self,
        id: Uuid,
        approval: ApprovalStatus,
    ) -> Result<DeliveryPartner, StoreError> {
        let mut partner = self
            .partners
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("partner {id}")))?;

        partner.approval = approval;
        partner.updated_at = Utc::now();
        Ok(partner.clone())
    }

    async fn create_notification(&self, record: NotificationRecord) -> Result<(), StoreError> {
        self.notifications.insert(record.id, record);
        Ok(())
    }

    async fn void_offer_notifications(
        &self,
        delivery_id: Uuid,
        only_user: Option<Uuid>,
        keep_user: Option<Uuid>,
    ) -> Result<usize, StoreError> {
        let mut voided = 0;
        for mut entry in self.notifications.iter_mut() {
            let record = entry.value_mut();
            let matches = record.delivery_id == delivery_id
                && record.kind == NotificationKind::DeliveryOffer
                && !record.is_read
                && only_user.is_none_or(|user| record.user_id == user)
                && keep_user != Some(record.user_id);

            if matches {
                record.is_read = true;
                voided += 1;
            }
        }
        Ok(voided)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let mut records: Vec<NotificationRecord> = self
            .notifications
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn create_status_event(&self, event: StatusEvent) -> Result<(), StoreError> {
        self.status_events
            .entry(event.delivery_id)
            .or_default()
            .push(event);
        Ok(())
    }

    async fn list_status_events(&self, delivery_id: Uuid) -> Result<Vec<StatusEvent>, StoreError> {
        Ok(self
            .status_events
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn upsert_session(&self, record: SessionRecord) -> Result<(), StoreError> {
        self.sessions.insert(record.id, record);
        Ok(())
    }

    async fn mark_session_inactive(&self, session_id: Uuid) -> Result<(), StoreError> {
        let mut session = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;

        session.is_active = false;
        session.disconnected_at = Some(Utc::now());
        Ok(())
    }

    async fn push_registrations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PushRegistration>, StoreError> {
        let mut registrations: Vec<PushRegistration> = self
            .push_registrations
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        registrations.sort_by_key(|registration| registration.created_at);
        Ok(registrations)
    }

    async fn remove_push_registration(&self, id: Uuid) -> Result<(), StoreError> {
        self.push_registrations.remove(&id);
        Ok(())
    }
}
