use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::StatusEvent;
use crate::models::location::LocationSample;
use crate::models::notification::NotificationPayload;
use crate::models::session::{Role, SessionRecord};
use crate::observability::metrics::Metrics;
use crate::store::DataStore;

/// Server-to-client frames, serialized as `type`-tagged JSON.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Authenticated { session_id: Uuid },
    Subscribed { delivery_id: Uuid },
    Location(LocationSample),
    Status(StatusEvent),
    Notification(NotificationPayload),
    Error { code: String, message: String },
}

/// What the connection task should write to the socket next.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    Ping,
    Close,
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

struct SessionEntry {
    connection_id: Uuid,
    user_id: Uuid,
    role: Role,
    sender: OutboundSender,
    subscriptions: HashSet<Uuid>,
    alive: bool,
    connected_at: DateTime<Utc>,
}

/// Live sessions keyed by session id. Callers only get the publish and
/// lifecycle operations; the map itself never leaves this type.
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionEntry>,
    by_connection: DashMap<Uuid, Uuid>,
    store: Arc<dyn DataStore>,
    metrics: Metrics,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn DataStore>, metrics: Metrics) -> Self {
        Self {
            sessions: DashMap::new(),
            by_connection: DashMap::new(),
            store,
            metrics,
        }
    }

    /// Registers the session for a connection. Calling it again on the same
    /// connection with the same identity returns the existing session.
    pub async fn authenticate(
        &self,
        connection_id: Uuid,
        user_id: Option<Uuid>,
        role: Option<Role>,
        sender: OutboundSender,
    ) -> Result<Uuid, AppError> {
        let user_id =
            user_id.ok_or_else(|| AppError::BadRequest("user_id is required".to_string()))?;
        let role = role.ok_or_else(|| AppError::BadRequest("role is required".to_string()))?;

        let session_id = match self.by_connection.entry(connection_id) {
            Entry::Occupied(existing) => {
                let session_id = *existing.get();
                let same_identity = self
                    .sessions
                    .get(&session_id)
                    .is_some_and(|entry| entry.user_id == user_id && entry.role == role);

                if same_identity {
                    return Ok(session_id);
                }
                return Err(AppError::Unauthorized(
                    "connection is already authenticated as another identity".to_string(),
                ));
            }
            Entry::Vacant(slot) => {
                let session_id = Uuid::new_v4();
                self.sessions.insert(
                    session_id,
                    SessionEntry {
                        connection_id,
                        user_id,
                        role,
                        sender,
                        subscriptions: HashSet::new(),
                        alive: true,
                        connected_at: Utc::now(),
                    },
                );
                slot.insert(session_id);
                session_id
            }
        };

        self.metrics.active_sessions.inc();

        let record = SessionRecord {
            id: session_id,
            user_id,
            role,
            is_active: true,
            connected_at: Utc::now(),
            disconnected_at: None,
        };
        if let Err(err) = self.store.upsert_session(record).await {
            warn!(session_id = %session_id, error = %err, "failed to persist session");
        }

        info!(session_id = %session_id, user_id = %user_id, role = %role, "session authenticated");
        Ok(session_id)
    }

    pub fn identity(&self, session_id: Uuid) -> Option<(Uuid, Role)> {
        self.sessions
            .get(&session_id)
            .map(|entry| (entry.user_id, entry.role))
    }

    pub fn subscribe(&self, session_id: Uuid, delivery_id: Uuid) -> Result<(), AppError> {
        let mut entry = self
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound(format!("session {session_id} not found")))?;

        entry.subscriptions.insert(delivery_id);
        debug!(session_id = %session_id, delivery_id = %delivery_id, "subscribed to delivery");
        Ok(())
    }

    pub fn unsubscribe(&self, session_id: Uuid, delivery_id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.subscriptions.remove(&delivery_id);
        }
    }

    /// Sends the sample to subscribed customers and shopkeepers only. Returns
    /// the number of sessions reached.
    pub fn publish_location(&self, sample: &LocationSample) -> usize {
        let message = Outbound::Message(ServerMessage::Location(sample.clone()));
        self.fan_out(&message, |entry| {
            entry.role.receives_location() && entry.subscriptions.contains(&sample.delivery_id)
        })
    }

    /// Sends the event to every session subscribed to the delivery.
    pub fn publish_status(&self, event: &StatusEvent) -> usize {
        let message = Outbound::Message(ServerMessage::Status(event.clone()));
        self.fan_out(&message, |entry| {
            entry.subscriptions.contains(&event.delivery_id)
        })
    }

    pub fn send_to_user(&self, user_id: Uuid, payload: &NotificationPayload) -> usize {
        let message = Outbound::Message(ServerMessage::Notification(payload.clone()));
        self.fan_out(&message, |entry| entry.user_id == user_id)
    }

    fn fan_out<F>(&self, message: &Outbound, audience: F) -> usize
    where
        F: Fn(&SessionEntry) -> bool,
    {
        let mut delivered = 0;
        for entry in self.sessions.iter() {
            if audience(entry.value()) && entry.sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn mark_alive(&self, session_id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.alive = true;
        }
    }

    /// Removes the session and marks its persisted record inactive. Returns
    /// false if it was already gone.
    pub async fn disconnect(&self, session_id: Uuid) -> bool {
        let Some((_, entry)) = self.sessions.remove(&session_id) else {
            return false;
        };
        self.by_connection.remove(&entry.connection_id);
        self.metrics.active_sessions.dec();

        if let Err(err) = self.store.mark_session_inactive(session_id).await {
            warn!(session_id = %session_id, error = %err, "failed to mark session inactive");
        }

        let connected_for = Utc::now() - entry.connected_at;
        info!(
            session_id = %session_id,
            user_id = %entry.user_id,
            connected_secs = connected_for.num_seconds(),
            "session closed"
        );
        true
    }

    pub async fn disconnect_connection(&self, connection_id: Uuid) -> bool {
        let session_id = self.by_connection.get(&connection_id).map(|entry| *entry);
        match session_id {
            Some(session_id) => self.disconnect(session_id).await,
            None => false,
        }
    }

    /// Closes a connection that has not authenticated yet. Such sockets hold
    /// no session, so the heartbeat never sees them.
    pub fn close_if_anonymous(&self, connection_id: Uuid, sender: &OutboundSender) -> bool {
        if self.by_connection.contains_key(&connection_id) {
            return false;
        }
        let _ = sender.send(Outbound::Close);
        true
    }

    /// One heartbeat cycle: sessions that did not answer the previous ping
    /// are closed and removed, the rest are pinged again. A session pinged
    /// right after it last spoke is therefore closed between one and two
    /// intervals after going silent.
    pub async fn sweep(&self) -> usize {
        let mut stale = Vec::new();
        for mut entry in self.sessions.iter_mut() {
            if entry.alive {
                entry.alive = false;
                if entry.sender.send(Outbound::Ping).is_err() {
                    stale.push(*entry.key());
                }
            } else {
                let _ = entry.sender.send(Outbound::Close);
                stale.push(*entry.key());
            }
        }

        let mut removed = 0;
        for session_id in stale {
            if self.disconnect(session_id).await {
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "closed unresponsive sessions");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::{Outbound, ServerMessage, SessionRegistry};
    use crate::error::AppError;
    use crate::models::delivery::{Actor, DeliveryStatus, StatusEvent};
    use crate::models::location::{GeoPoint, LocationSample};
    use crate::models::session::Role;
    use crate::observability::metrics::Metrics;
    use crate::store::MemoryStore;

    fn registry() -> (SessionRegistry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionRegistry::new(store.clone(), Metrics::new()), store)
    }

    async fn connect(
        registry: &SessionRegistry,
        role: Role,
    ) -> (Uuid, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session_id = registry
            .authenticate(Uuid::new_v4(), Some(Uuid::new_v4()), Some(role), tx)
            .await
            .unwrap();
        (session_id, rx)
    }

    fn sample(delivery_id: Uuid) -> LocationSample {
        LocationSample {
            delivery_id,
            partner_id: Uuid::new_v4(),
            position: GeoPoint::new(12.97, 77.59),
            heading: Some(90.0),
            speed: Some(18.0),
            accuracy: Some(5.0),
            timestamp: Utc::now(),
        }
    }

    fn drain_locations(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> usize {
        let mut count = 0;
        while let Ok(message) = rx.try_recv() {
            if matches!(message, Outbound::Message(ServerMessage::Location(_))) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn authenticate_is_idempotent_per_connection() {
        let (registry, store) = registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Uuid::new_v4();
        let user = Uuid::new_v4();

        let first = registry
            .authenticate(connection, Some(user), Some(Role::Customer), tx.clone())
            .await
            .unwrap();
        let second = registry
            .authenticate(connection, Some(user), Some(Role::Customer), tx.clone())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.session_count(), 1);
        assert!(store.session(first).unwrap().is_active);

        let other = registry
            .authenticate(connection, Some(Uuid::new_v4()), Some(Role::Customer), tx)
            .await;
        assert!(matches!(other, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn authenticate_requires_user_and_role() {
        let (registry, _) = registry();
        let (tx, _rx) = mpsc::unbounded_channel();

        let missing_role = registry
            .authenticate(Uuid::new_v4(), Some(Uuid::new_v4()), None, tx.clone())
            .await;
        let missing_user = registry
            .authenticate(Uuid::new_v4(), None, Some(Role::Shopkeeper), tx)
            .await;

        assert!(matches!(missing_role, Err(AppError::BadRequest(_))));
        assert!(matches!(missing_user, Err(AppError::BadRequest(_))));
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn location_never_reaches_delivery_partners() {
        let (registry, _) = registry();
        let delivery = Uuid::new_v4();
        let other_delivery = Uuid::new_v4();

        let (customer, mut customer_rx) = connect(&registry, Role::Customer).await;
        let (shop, mut shop_rx) = connect(&registry, Role::Shopkeeper).await;
        let (partner, mut partner_rx) = connect(&registry, Role::DeliveryPartner).await;
        let (bystander, mut bystander_rx) = connect(&registry, Role::Customer).await;

        registry.subscribe(customer, delivery).unwrap();
        registry.subscribe(shop, delivery).unwrap();
        registry.subscribe(partner, delivery).unwrap();
        registry.subscribe(bystander, other_delivery).unwrap();

        let reached = registry.publish_location(&sample(delivery));

        assert_eq!(reached, 2);
        assert_eq!(drain_locations(&mut customer_rx), 1);
        assert_eq!(drain_locations(&mut shop_rx), 1);
        assert_eq!(drain_locations(&mut partner_rx), 0);
        assert_eq!(drain_locations(&mut bystander_rx), 0);
    }

    #[tokio::test]
    async fn status_reaches_every_subscribed_role() {
        let (registry, _) = registry();
        let delivery = Uuid::new_v4();

        let (customer, _c) = connect(&registry, Role::Customer).await;
        let (partner, _p) = connect(&registry, Role::DeliveryPartner).await;
        let (_unsubscribed, _u) = connect(&registry, Role::Shopkeeper).await;
        registry.subscribe(customer, delivery).unwrap();
        registry.subscribe(partner, delivery).unwrap();

        let event = StatusEvent::new(delivery, DeliveryStatus::PickedUp, Actor::System, None);
        assert_eq!(registry.publish_status(&event), 2);
    }

    #[tokio::test]
    async fn sweep_closes_sessions_that_miss_a_heartbeat() {
        let (registry, store) = registry();
        let (responsive, mut responsive_rx) = connect(&registry, Role::Customer).await;
        let (silent, mut silent_rx) = connect(&registry, Role::Customer).await;

        assert_eq!(registry.sweep().await, 0);
        assert!(matches!(responsive_rx.try_recv(), Ok(Outbound::Ping)));
        assert!(matches!(silent_rx.try_recv(), Ok(Outbound::Ping)));

        registry.mark_alive(responsive);
        assert_eq!(registry.sweep().await, 1);

        assert!(matches!(silent_rx.try_recv(), Ok(Outbound::Close)));
        assert_eq!(registry.session_count(), 1);
        assert!(registry.identity(responsive).is_some());
        assert!(!store.session(silent).unwrap().is_active);
    }

    #[tokio::test]
    async fn disconnect_deregisters_and_is_idempotent() {
        let (registry, store) = registry();
        let (session, _rx) = connect(&registry, Role::Shopkeeper).await;

        assert!(registry.disconnect(session).await);
        assert!(!registry.disconnect(session).await);
        assert_eq!(registry.session_count(), 0);
        assert!(matches!(
            registry.subscribe(session, Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
        assert!(store.session(session).unwrap().disconnected_at.is_some());
    }

    #[tokio::test]
    async fn anonymous_connections_are_closed() {
        let (registry, _) = registry();
        let (anonymous_tx, mut anonymous_rx) = mpsc::unbounded_channel();
        assert!(registry.close_if_anonymous(Uuid::new_v4(), &anonymous_tx));
        assert!(matches!(anonymous_rx.try_recv(), Ok(Outbound::Close)));

        let connection_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .authenticate(connection_id, Some(Uuid::new_v4()), Some(Role::Customer), tx.clone())
            .await
            .unwrap();
        while rx.try_recv().is_ok() {}

        assert!(!registry.close_if_anonymous(connection_id, &tx));
        assert!(rx.try_recv().is_err());
    }
}
