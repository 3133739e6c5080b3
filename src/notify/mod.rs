//! Notification fan-out.
//!
//! Each recipient gets an in-app record (plus a frame on any live session)
//! and then one push through the first channel in the chain that is
//! configured, has a registration for them, and accepts the message.
//! Recipients are handled independently; nothing here aborts a sibling.

pub mod mobile_push;
pub mod web_push;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::notification::{
    ChannelKind, NotificationPayload, NotificationRecord, PushRegistration,
};
use crate::observability::metrics::Metrics;
use crate::realtime::SessionRegistry;
use crate::store::DataStore;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum PushError {
    /// Endpoint expired or unregistered (HTTP 404/410).
    #[error("push endpoint is gone")]
    Gone,

    #[error("transient push failure: {0}")]
    Transient(String),

    #[error("push rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for PushError {
    fn from(err: reqwest::Error) -> Self {
        PushError::Transient(err.to_string())
    }
}

/// Maps a push provider's HTTP status onto the retry policy.
pub fn classify_status(status: u16) -> Result<(), PushError> {
    match status {
        200..=299 => Ok(()),
        404 | 410 => Err(PushError::Gone),
        408 | 429 | 500..=599 => Err(PushError::Transient(format!("HTTP {status}"))),
        other => Err(PushError::Rejected(format!("HTTP {other}"))),
    }
}

#[async_trait]
pub trait PushChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// False when the provider credentials are missing.
    fn is_configured(&self) -> bool;

    async fn send(
        &self,
        registration: &PushRegistration,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    Skipped { reason: String },
    Delivered,
    Unsubscribed,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelAttempt {
    pub channel: ChannelKind,
    #[serde(flatten)]
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientOutcome {
    pub user_id: Uuid,
    pub in_app_recorded: bool,
    pub live_sessions: usize,
    pub delivered_via: Option<ChannelKind>,
    pub attempts: Vec<ChannelAttempt>,
}

impl RecipientOutcome {
    pub fn reached(&self) -> bool {
        self.in_app_recorded || self.live_sessions > 0 || self.delivered_via.is_some()
    }
}

pub struct NotificationDispatcher {
    store: Arc<dyn DataStore>,
    sessions: Arc<SessionRegistry>,
    channels: Vec<Arc<dyn PushChannel>>,
    retry_attempts: u32,
    timeout: Duration,
    metrics: Metrics,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn DataStore>,
        sessions: Arc<SessionRegistry>,
        channels: Vec<Arc<dyn PushChannel>>,
        retry_attempts: u32,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            sessions,
            channels,
            retry_attempts: retry_attempts.max(1),
            timeout,
            metrics,
        }
    }

    /// Not transactional: the report lists one outcome per distinct
    /// recipient, in the order given.
    pub async fn dispatch(
        &self,
        recipients: &[Uuid],
        payload: &NotificationPayload,
    ) -> Vec<RecipientOutcome> {
        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = recipients
            .iter()
            .copied()
            .filter(|user_id| seen.insert(*user_id))
            .collect();

        let outcomes = join_all(
            unique
                .iter()
                .map(|user_id| self.dispatch_one(*user_id, payload)),
        )
        .await;

        let reached = outcomes.iter().filter(|outcome| outcome.reached()).count();
        info!(
            kind = ?payload.kind,
            delivery_id = %payload.delivery_id,
            recipients = outcomes.len(),
            reached,
            "notification dispatched"
        );
        outcomes
    }

    async fn dispatch_one(&self, user_id: Uuid, payload: &NotificationPayload) -> RecipientOutcome {
        let record = NotificationRecord::from_payload(user_id, payload);
        let in_app_recorded = match self.store.create_notification(record).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to record in-app notification");
                false
            }
        };
        self.count("in_app", if in_app_recorded { "delivered" } else { "failed" });

        let live_sessions = self.sessions.send_to_user(user_id, payload);

        let registrations = match self.store.push_registrations(user_id).await {
            Ok(registrations) => registrations,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to load push registrations");
                Vec::new()
            }
        };

        let mut attempts = Vec::new();
        let mut delivered_via = None;

        'chain: for channel in &self.channels {
            let kind = channel.kind();
            if !channel.is_configured() {
                attempts.push(ChannelAttempt {
                    channel: kind,
                    status: AttemptStatus::Skipped {
                        reason: "not configured".to_string(),
                    },
                });
                continue;
            }

            let targets: Vec<&PushRegistration> = registrations
                .iter()
                .filter(|registration| registration.channel == kind)
                .collect();
            if targets.is_empty() {
                attempts.push(ChannelAttempt {
                    channel: kind,
                    status: AttemptStatus::Skipped {
                        reason: "no registration".to_string(),
                    },
                });
                continue;
            }

            for registration in targets {
                let status = match self.send_with_retry(channel.as_ref(), registration, payload).await {
                    Ok(()) => AttemptStatus::Delivered,
                    Err(PushError::Gone) => {
                        self.unsubscribe(registration).await;
                        AttemptStatus::Unsubscribed
                    }
                    Err(err) => {
                        warn!(
                            user_id = %user_id,
                            channel = kind.as_str(),
                            error = %err,
                            "push delivery failed"
                        );
                        AttemptStatus::Failed {
                            error: err.to_string(),
                        }
                    }
                };

                let delivered = status == AttemptStatus::Delivered;
                self.count(
                    kind.as_str(),
                    match &status {
                        AttemptStatus::Delivered => "delivered",
                        AttemptStatus::Unsubscribed => "unsubscribed",
                        _ => "failed",
                    },
                );
                attempts.push(ChannelAttempt {
                    channel: kind,
                    status,
                });

                if delivered {
                    delivered_via = Some(kind);
                    break 'chain;
                }
            }
        }

        RecipientOutcome {
            user_id,
            in_app_recorded,
            live_sessions,
            delivered_via,
            attempts,
        }
    }

    async fn send_with_retry(
        &self,
        channel: &dyn PushChannel,
        registration: &PushRegistration,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let mut last_err = PushError::Transient("no attempt made".to_string());

        for attempt in 1..=self.retry_attempts {
            let result = match tokio::time::timeout(self.timeout, channel.send(registration, payload)).await {
                Ok(result) => result,
                Err(_) => Err(PushError::Transient("timed out".to_string())),
            };

            match result {
                Ok(()) => return Ok(()),
                Err(PushError::Transient(reason)) => {
                    debug!(
                        attempt,
                        channel = channel.kind().as_str(),
                        reason = %reason,
                        "push attempt failed"
                    );
                    last_err = PushError::Transient(reason);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                    }
                }
                Err(other) => return Err(other),
            }
        }

        Err(last_err)
    }

    async fn unsubscribe(&self, registration: &PushRegistration) {
        debug!(
            user_id = %registration.user_id,
            channel = registration.channel.as_str(),
            "push endpoint expired; removing registration"
        );
        if let Err(err) = self.store.remove_push_registration(registration.id).await {
            warn!(registration_id = %registration.id, error = %err, "failed to remove push registration");
        }
    }

    fn count(&self, channel: &str, outcome: &str) {
        self.metrics
            .notifications_total
            .with_label_values(&[channel, outcome])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::{
        classify_status, AttemptStatus, NotificationDispatcher, PushChannel, PushError,
    };
    use crate::models::notification::{
        ChannelKind, NotificationKind, NotificationPayload, PushRegistration,
    };
    use crate::observability::metrics::Metrics;
    use crate::realtime::SessionRegistry;
    use crate::store::{DataStore, MemoryStore};

    type Responder = Box<dyn Fn(&PushRegistration) -> Result<(), PushError> + Send + Sync>;

    struct FakeChannel {
        kind: ChannelKind,
        configured: bool,
        respond: Responder,
        calls: AtomicUsize,
    }

    impl FakeChannel {
        fn new(kind: ChannelKind, configured: bool, respond: Responder) -> Arc<Self> {
            Arc::new(Self {
                kind,
                configured,
                respond,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PushChannel for FakeChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn send(
            &self,
            registration: &PushRegistration,
            _payload: &NotificationPayload,
        ) -> Result<(), PushError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(registration)
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            kind: NotificationKind::DeliveryOffer,
            title: "New delivery".to_string(),
            body: "Pickup at Corner Bakery".to_string(),
            delivery_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            data: serde_json::json!({ "fee": 30 }),
        }
    }

    fn register(store: &MemoryStore, user_id: Uuid, channel: ChannelKind, endpoint: &str) -> Uuid {
        let registration = PushRegistration {
            id: Uuid::new_v4(),
            user_id,
            channel,
            endpoint: endpoint.to_string(),
            created_at: Utc::now(),
        };
        let id = registration.id;
        store.add_push_registration(registration);
        id
    }

    fn dispatcher(
        store: Arc<MemoryStore>,
        channels: Vec<Arc<dyn PushChannel>>,
    ) -> NotificationDispatcher {
        let metrics = Metrics::new();
        let sessions = Arc::new(SessionRegistry::new(store.clone(), metrics.clone()));
        NotificationDispatcher::new(
            store,
            sessions,
            channels,
            2,
            Duration::from_millis(200),
            metrics,
        )
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(201).is_ok());
        assert!(matches!(classify_status(410), Err(PushError::Gone)));
        assert!(matches!(classify_status(404), Err(PushError::Gone)));
        assert!(matches!(classify_status(503), Err(PushError::Transient(_))));
        assert!(matches!(classify_status(400), Err(PushError::Rejected(_))));
    }

    #[tokio::test]
    async fn first_successful_channel_satisfies_delivery() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        register(&store, user, ChannelKind::WebPush, "https://push.example/a");
        register(&store, user, ChannelKind::MobilePush, "device-token");

        let web = FakeChannel::new(ChannelKind::WebPush, true, Box::new(|_| Ok(())));
        let mobile = FakeChannel::new(ChannelKind::MobilePush, true, Box::new(|_| Ok(())));
        let svc = dispatcher(store.clone(), vec![web.clone() as Arc<dyn PushChannel>, mobile.clone()]);

        let outcomes = svc.dispatch(&[user], &payload()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].delivered_via, Some(ChannelKind::WebPush));
        assert!(outcomes[0].in_app_recorded);
        assert_eq!(web.calls.load(Ordering::SeqCst), 1);
        assert_eq!(mobile.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.list_notifications(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_channel_is_skipped_not_failed() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        register(&store, user, ChannelKind::WebPush, "https://push.example/a");
        register(&store, user, ChannelKind::MobilePush, "device-token");

        let web = FakeChannel::new(ChannelKind::WebPush, false, Box::new(|_| Ok(())));
        let mobile = FakeChannel::new(ChannelKind::MobilePush, true, Box::new(|_| Ok(())));
        let svc = dispatcher(store, vec![web.clone() as Arc<dyn PushChannel>, mobile]);

        let outcome = svc.dispatch(&[user], &payload()).await.remove(0);

        assert_eq!(outcome.delivered_via, Some(ChannelKind::MobilePush));
        assert_eq!(web.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            outcome.attempts[0].status,
            AttemptStatus::Skipped { .. }
        ));
    }

    #[tokio::test]
    async fn gone_endpoint_is_unsubscribed_and_chain_continues() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let expired = register(&store, user, ChannelKind::WebPush, "https://push.example/old");
        register(&store, user, ChannelKind::MobilePush, "device-token");

        let web = FakeChannel::new(ChannelKind::WebPush, true, Box::new(|_| Err(PushError::Gone)));
        let mobile = FakeChannel::new(ChannelKind::MobilePush, true, Box::new(|_| Ok(())));
        let svc = dispatcher(store.clone(), vec![web.clone() as Arc<dyn PushChannel>, mobile]);

        let outcome = svc.dispatch(&[user], &payload()).await.remove(0);

        assert_eq!(outcome.delivered_via, Some(ChannelKind::MobilePush));
        assert_eq!(outcome.attempts[0].status, AttemptStatus::Unsubscribed);
        assert!(!store.has_push_registration(expired));
        // Gone is final; no retry.
        assert_eq!(web.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_recipient_failing_does_not_abort_others() {
        let store = Arc::new(MemoryStore::new());
        let healthy = Uuid::new_v4();
        let broken = Uuid::new_v4();
        let unregistered = Uuid::new_v4();
        register(&store, healthy, ChannelKind::WebPush, "https://push.example/ok");
        register(&store, broken, ChannelKind::WebPush, "https://push.example/broken");

        let web = FakeChannel::new(
            ChannelKind::WebPush,
            true,
            Box::new(|registration| {
                if registration.endpoint.ends_with("broken") {
                    Err(PushError::Transient("HTTP 503".to_string()))
                } else {
                    Ok(())
                }
            }),
        );
        let svc = dispatcher(store, vec![web.clone() as Arc<dyn PushChannel>]);

        let outcomes = svc
            .dispatch(&[healthy, broken, unregistered, healthy], &payload())
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].delivered_via, Some(ChannelKind::WebPush));
        assert_eq!(outcomes[1].delivered_via, None);
        assert!(matches!(
            outcomes[1].attempts[0].status,
            AttemptStatus::Failed { .. }
        ));
        assert_eq!(outcomes[2].delivered_via, None);
        assert!(outcomes.iter().all(|outcome| outcome.in_app_recorded));
        // healthy once, broken retried twice
        assert_eq!(web.calls.load(Ordering::SeqCst), 3);
    }
}
