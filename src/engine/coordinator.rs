//! Delivery state machine and the first-accept-first-serve claim.
//!
//! Every delivery lives behind its own async mutex. All status changes,
//! including the claim, run under that lock, which totally orders the
//! transitions of one delivery while leaving different deliveries fully
//! concurrent. Provider I/O (routing, push) never runs under the lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OfferPolicy;
use crate::engine::offers::OfferBook;
use crate::engine::scoring::{rank_candidates, RankedCandidate};
use crate::engine::state_machine::{authorize, check_transition};
use crate::error::AppError;
use crate::geo;
use crate::models::delivery::{Actor, Delivery, DeliveryStatus, StatusEvent};
use crate::models::location::LocationSample;
use crate::models::notification::{NotificationKind, NotificationOffer, NotificationPayload};
use crate::models::order::OrderStatus;
use crate::notify::{NotificationDispatcher, RecipientOutcome};
use crate::observability::metrics::Metrics;
use crate::realtime::SessionRegistry;
use crate::routing::{map_link, RouteService, TravelMode};
use crate::store::DataStore;

#[derive(Debug, Clone, Serialize)]
pub struct OfferSummary {
    pub delivery: Delivery,
    pub offer_id: Uuid,
    pub round: u32,
    pub expires_at: DateTime<Utc>,
    pub candidates: Vec<RankedCandidate>,
    pub notifications: Vec<RecipientOutcome>,
}

pub struct AssignmentCoordinator {
    deliveries: DashMap<Uuid, Arc<Mutex<Delivery>>>,
    by_order: DashMap<Uuid, Uuid>,
    latest_locations: DashMap<Uuid, LocationSample>,
    offers: OfferBook,
    store: Arc<dyn DataStore>,
    sessions: Arc<SessionRegistry>,
    notifier: Arc<NotificationDispatcher>,
    routes: Arc<RouteService>,
    policy: OfferPolicy,
    metrics: Metrics,
}

impl AssignmentCoordinator {
    pub fn new(
        store: Arc<dyn DataStore>,
        sessions: Arc<SessionRegistry>,
        notifier: Arc<NotificationDispatcher>,
        routes: Arc<RouteService>,
        policy: OfferPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            deliveries: DashMap::new(),
            by_order: DashMap::new(),
            latest_locations: DashMap::new(),
            offers: OfferBook::new(),
            store,
            sessions,
            notifier,
            routes,
            policy,
            metrics,
        }
    }

    fn handle(&self, delivery_id: Uuid) -> Result<Arc<Mutex<Delivery>>, AppError> {
        self.deliveries
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))
    }

    pub async fn get_delivery(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        let handle = self.handle(delivery_id)?;
        let delivery = handle.lock().await;
        Ok(delivery.clone())
    }

    pub fn delivery_for_order(&self, order_id: Uuid) -> Option<Uuid> {
        self.by_order.get(&order_id).map(|entry| *entry)
    }

    pub async fn timeline(&self, delivery_id: Uuid) -> Result<Vec<StatusEvent>, AppError> {
        self.handle(delivery_id)?;
        Ok(self.store.list_status_events(delivery_id).await?)
    }

    pub fn latest_location(&self, delivery_id: Uuid) -> Option<LocationSample> {
        self.latest_locations
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
    }

    pub fn open_offer(&self, delivery_id: Uuid) -> Option<NotificationOffer> {
        self.offers.get(delivery_id)
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.len()
    }

    pub fn open_offer_count(&self) -> usize {
        self.offers.len()
    }

    /// Returns the delivery for an order, creating it in `pending` on first
    /// use from the order's drop-off and its store's pickup point.
    pub async fn ensure_delivery(&self, order_id: Uuid) -> Result<Uuid, AppError> {
        if let Some(existing) = self.delivery_for_order(order_id) {
            return Ok(existing);
        }

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Delivered) {
            return Err(AppError::BadRequest(format!(
                "order {order_id} is already closed"
            )));
        }

        let shop = self
            .store
            .get_store(order.store_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("store {} not found", order.store_id)))?;

        let distance_km = geo::distance_km(&shop.location, &order.delivery_location)?;
        let fee = geo::fee_for_distance(distance_km)?;
        let eta_minutes = geo::eta_minutes(distance_km)?;

        let now = Utc::now();
        let delivery = Delivery {
            id: Uuid::new_v4(),
            order_id,
            store_id: shop.id,
            customer_id: order.customer_id,
            shopkeeper_id: shop.owner_user_id,
            status: DeliveryStatus::Pending,
            partner_id: None,
            pickup_address: shop.address,
            pickup_location: shop.location,
            delivery_address: order.delivery_address,
            delivery_location: order.delivery_location,
            fee,
            distance_km,
            eta_minutes,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        match self.by_order.entry(order_id) {
            Entry::Occupied(existing) => Ok(*existing.get()),
            Entry::Vacant(slot) => {
                let delivery_id = delivery.id;
                self.deliveries
                    .insert(delivery_id, Arc::new(Mutex::new(delivery)));
                slot.insert(delivery_id);
                info!(order_id = %order_id, delivery_id = %delivery_id, fee, distance_km, "delivery created");
                Ok(delivery_id)
            }
        }
    }

    /// Moves the order's delivery to `ready_for_pickup` (creating it if
    /// needed) and broadcasts an offer to every current candidate.
    pub async fn offer_delivery(&self, order_id: Uuid, actor: Actor) -> Result<OfferSummary, AppError> {
        let delivery_id = self.ensure_delivery(order_id).await?;
        self.mark_ready(delivery_id, actor).await
    }

    async fn mark_ready(&self, delivery_id: Uuid, actor: Actor) -> Result<OfferSummary, AppError> {
        let handle = self.handle(delivery_id)?;

        let (snapshot, event) = {
            let mut delivery = handle.lock().await;
            authorize(&delivery, DeliveryStatus::ReadyForPickup, &actor)?;

            match delivery.status {
                DeliveryStatus::Pending => {
                    let event = StatusEvent::new(delivery_id, DeliveryStatus::ReadyForPickup, actor, None);
                    self.store.create_status_event(event.clone()).await?;
                    delivery.status = DeliveryStatus::ReadyForPickup;
                    delivery.updated_at = event.created_at;
                    (delivery.clone(), Some(event))
                }
                // Re-offer of an unclaimed delivery; no status change.
                DeliveryStatus::ReadyForPickup => (delivery.clone(), None),
                _ if delivery.partner_id.is_some() && !delivery.status.is_terminal() => {
                    return Err(AppError::AlreadyAssigned(delivery_id));
                }
                from => {
                    return Err(AppError::InvalidTransition {
                        from,
                        to: DeliveryStatus::ReadyForPickup,
                    });
                }
            }
        };

        if let Some(event) = &event {
            self.after_transition(&snapshot, event).await;
        }

        let round = 1;
        self.broadcast_offer(
            &snapshot,
            round,
            self.radius_for_round(round),
            self.offers.rejected(delivery_id),
        )
        .await
    }

    fn radius_for_round(&self, round: u32) -> Option<f64> {
        if round >= self.policy.max_rounds {
            None
        } else {
            Some(self.policy.initial_radius_km * 2f64.powi(round as i32 - 1))
        }
    }

    async fn broadcast_offer(
        &self,
        delivery: &Delivery,
        round: u32,
        radius_km: Option<f64>,
        rejected: HashSet<Uuid>,
    ) -> Result<OfferSummary, AppError> {
        let partners = self.store.list_delivery_partners().await?;
        let mut candidates = rank_candidates(&partners, &delivery.pickup_location, radius_km, &rejected);

        let link = match self
            .routes
            .compute_route(&delivery.pickup_location, &delivery.delivery_location, TravelMode::Driving)
            .await
        {
            Ok(route) => route.map_link,
            Err(_) => map_link(
                &delivery.pickup_location,
                &delivery.delivery_location,
                TravelMode::Driving,
            ),
        };

        let payload = NotificationPayload {
            kind: NotificationKind::DeliveryOffer,
            title: "New delivery request".to_string(),
            body: format!(
                "Pickup at {} for {} ({:.1} km, fee {})",
                delivery.pickup_address, delivery.delivery_address, delivery.distance_km, delivery.fee
            ),
            delivery_id: delivery.id,
            order_id: delivery.order_id,
            data: json!({
                "pickup_address": delivery.pickup_address,
                "pickup_location": delivery.pickup_location,
                "delivery_address": delivery.delivery_address,
                "delivery_location": delivery.delivery_location,
                "fee": delivery.fee,
                "distance_km": delivery.distance_km,
                "eta_minutes": delivery.eta_minutes,
                "map_link": link,
                "round": round,
            }),
        };

        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.policy.ttl)
            .map_err(|err| AppError::Internal(format!("invalid offer ttl: {err}")))?;
        let offer = NotificationOffer {
            id: Uuid::new_v4(),
            order_id: delivery.order_id,
            delivery_id: delivery.id,
            candidate_partner_ids: candidates.iter().map(|c| c.partner_id).collect(),
            recipient_user_ids: candidates.iter().map(|c| c.user_id).collect(),
            rejected_partner_ids: rejected,
            payload: payload.clone(),
            round,
            created_at: now,
            expires_at: now + ttl,
        };
        let offer_id = offer.id;
        let expires_at = offer.expires_at;

        // A claim or a rejection may have landed while candidates were being ranked.
        let opened = {
            let handle = self.handle(delivery.id)?;
            let current = handle.lock().await;
            if current.partner_id.is_some() {
                return Err(AppError::AlreadyAssigned(delivery.id));
            }
            if current.status != DeliveryStatus::ReadyForPickup {
                return Err(AppError::InvalidTransition {
                    from: current.status,
                    to: DeliveryStatus::ReadyForPickup,
                });
            }
            self.offers.open(offer)
        };
        let recipients = opened.recipient_user_ids;
        candidates.retain(|candidate| opened.candidate_partner_ids.contains(&candidate.partner_id));

        if candidates.is_empty() {
            warn!(delivery_id = %delivery.id, round, ?radius_km, "no candidate partners for offer");
        } else {
            info!(
                delivery_id = %delivery.id,
                round,
                candidates = candidates.len(),
                "offer broadcast"
            );
        }

        let notifications = self.notifier.dispatch(&recipients, &payload).await;

        Ok(OfferSummary {
            delivery: delivery.clone(),
            offer_id,
            round,
            expires_at,
            candidates,
            notifications,
        })
    }

    /// First accepted request wins. The check of "unclaimed and ready" and
    /// the binding happen under the delivery's lock, so concurrent callers
    /// see exactly one success and `AlreadyAssigned` for everyone else.
    pub async fn accept_offer(&self, delivery_id: Uuid, partner_id: Uuid) -> Result<Delivery, AppError> {
        let started = Instant::now();
        let result = self.claim(delivery_id, partner_id).await;

        let outcome = match &result {
            Ok(_) => "won",
            Err(AppError::AlreadyAssigned(_)) => "lost",
            Err(_) => "rejected",
        };
        self.metrics.claims_total.with_label_values(&[outcome]).inc();
        self.metrics
            .claim_latency_seconds
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        let (delivery, event) = match result {
            Ok(claimed) => claimed,
            Err(err) => {
                debug!(delivery_id = %delivery_id, partner_id = %partner_id, error = %err, "claim refused");
                return Err(err);
            }
        };

        info!(delivery_id = %delivery_id, partner_id = %partner_id, "delivery claimed");
        self.after_transition(&delivery, &event).await;

        if let Some(offer) = self.offers.forget(delivery_id) {
            self.retire_offer(offer, Some(partner_id));
        }

        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let customer_id = delivery.customer_id;
        let payload = NotificationPayload {
            kind: NotificationKind::DeliveryAssigned,
            title: "Delivery partner assigned".to_string(),
            body: format!("Pickup at {}", delivery.pickup_address),
            delivery_id,
            order_id: delivery.order_id,
            data: json!({ "partner_id": partner_id, "eta_minutes": delivery.eta_minutes }),
        };
        tokio::spawn(async move {
            let mut recipients = vec![customer_id];
            match store.get_delivery_partner(partner_id).await {
                Ok(Some(partner)) => recipients.insert(0, partner.user_id),
                Ok(None) => warn!(partner_id = %partner_id, "assigned partner vanished"),
                Err(err) => warn!(partner_id = %partner_id, error = %err, "failed to load assigned partner"),
            }
            notifier.dispatch(&recipients, &payload).await;
        });

        Ok(delivery)
    }

    async fn claim(&self, delivery_id: Uuid, partner_id: Uuid) -> Result<(Delivery, StatusEvent), AppError> {
        let handle = self.handle(delivery_id)?;
        let mut delivery = handle.lock().await;

        if delivery.partner_id.is_some() {
            return Err(AppError::AlreadyAssigned(delivery_id));
        }
        check_transition(delivery.status, DeliveryStatus::Assigned)?;

        if !self.offers.is_candidate(delivery_id, partner_id) {
            return Err(AppError::Unauthorized(format!(
                "partner {partner_id} has no pending offer for delivery {delivery_id}"
            )));
        }

        if !self.store.try_reserve_partner(partner_id).await? {
            return Err(AppError::PartnerUnavailable(partner_id));
        }

        let event = StatusEvent::new(delivery_id, DeliveryStatus::Assigned, Actor::Partner(partner_id), None);
        if let Err(err) = self.store.create_status_event(event.clone()).await {
            if let Err(release_err) = self.store.release_partner(partner_id, false).await {
                warn!(partner_id = %partner_id, error = %release_err, "failed to release partner after aborted claim");
            }
            return Err(err.into());
        }

        delivery.partner_id = Some(partner_id);
        delivery.status = DeliveryStatus::Assigned;
        delivery.assigned_at = Some(event.created_at);
        delivery.updated_at = event.created_at;

        Ok((delivery.clone(), event))
    }

    pub async fn reject_offer(&self, delivery_id: Uuid, partner_id: Uuid) -> Result<(), AppError> {
        self.handle(delivery_id)?;
        let offer = self.offers.reject(delivery_id, partner_id)?;

        if let Some(user_id) = offer.user_for(partner_id)
            && let Err(err) = self
                .store
                .void_offer_notifications(delivery_id, Some(user_id), None)
                .await
        {
            warn!(delivery_id = %delivery_id, error = %err, "failed to void rejected offer notification");
        }

        info!(delivery_id = %delivery_id, partner_id = %partner_id, "offer rejected");
        if offer.all_rejected() {
            info!(delivery_id = %delivery_id, round = offer.round, "every candidate rejected; waiting for re-broadcast");
        }
        Ok(())
    }

    /// Single entry point for every status change after creation.
    /// `ready_for_pickup` goes through the offer flow, `assigned` only
    /// through [`accept_offer`](Self::accept_offer).
    pub async fn update_status(
        &self,
        delivery_id: Uuid,
        to: DeliveryStatus,
        actor: Actor,
    ) -> Result<Delivery, AppError> {
        if to == DeliveryStatus::ReadyForPickup {
            return self.mark_ready(delivery_id, actor).await.map(|summary| summary.delivery);
        }

        let handle = self.handle(delivery_id)?;
        let (snapshot, event) = {
            let mut delivery = handle.lock().await;
            let from = delivery.status;
            check_transition(from, to)?;
            if to == DeliveryStatus::Assigned {
                return Err(AppError::InvalidTransition { from, to });
            }
            authorize(&delivery, to, &actor)?;

            let location = self
                .latest_locations
                .get(&delivery_id)
                .map(|sample| sample.position);
            let event = StatusEvent::new(delivery_id, to, actor, location);
            self.store.create_status_event(event.clone()).await?;

            delivery.status = to;
            delivery.updated_at = event.created_at;
            match to {
                DeliveryStatus::PickedUp => delivery.picked_up_at = Some(event.created_at),
                DeliveryStatus::Delivered => delivery.delivered_at = Some(event.created_at),
                DeliveryStatus::Cancelled => delivery.cancelled_at = Some(event.created_at),
                _ => {}
            }

            if to.is_terminal()
                && let Some(partner_id) = delivery.partner_id
                && let Err(err) = self
                    .store
                    .release_partner(partner_id, to == DeliveryStatus::Delivered)
                    .await
            {
                warn!(partner_id = %partner_id, error = %err, "failed to release partner");
            }

            (delivery.clone(), event)
        };

        if to.is_terminal() {
            self.latest_locations.remove(&delivery_id);
            if let Some(offer) = self.offers.forget(delivery_id) {
                self.retire_offer(offer, None);
            }
        }

        self.after_transition(&snapshot, &event).await;
        self.notify_status(&snapshot);
        Ok(snapshot)
    }

    /// Accepts a position report from the bound partner. Returns false when
    /// the sample is older than the latest one already broadcast.
    pub async fn report_location(&self, sample: LocationSample) -> Result<bool, AppError> {
        geo::validate_point(&sample.position)?;
        let handle = self.handle(sample.delivery_id)?;

        {
            let delivery = handle.lock().await;
            if delivery.partner_id != Some(sample.partner_id) {
                return Err(AppError::Unauthorized(format!(
                    "partner {} is not assigned to delivery {}",
                    sample.partner_id, delivery.id
                )));
            }
            if !delivery.status.is_active_leg() {
                return Err(AppError::BadRequest(format!(
                    "delivery {} is {}; not tracking",
                    delivery.id, delivery.status
                )));
            }
        }

        match self.latest_locations.entry(sample.delivery_id) {
            Entry::Occupied(mut latest) => {
                if latest.get().timestamp > sample.timestamp {
                    debug!(delivery_id = %sample.delivery_id, "discarding out-of-order location sample");
                    return Ok(false);
                }
                latest.insert(sample.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(sample.clone());
            }
        }

        if let Err(err) = self
            .store
            .update_partner_location(sample.partner_id, sample.position)
            .await
        {
            warn!(partner_id = %sample.partner_id, error = %err, "failed to store partner location");
        }

        self.sessions.publish_location(&sample);
        Ok(true)
    }

    /// Re-derives distance, fee and ETA from the route service while the
    /// delivery is still unassigned.
    pub async fn recompute_fee(&self, delivery_id: Uuid) -> Result<Delivery, AppError> {
        let handle = self.handle(delivery_id)?;
        let (pickup, dropoff) = {
            let delivery = handle.lock().await;
            ensure_fee_editable(&delivery)?;
            (delivery.pickup_location, delivery.delivery_location)
        };

        let route = self
            .routes
            .compute_route(&pickup, &dropoff, TravelMode::Driving)
            .await?;
        let fee = geo::fee_for_distance(route.distance_km)?;
        let eta_minutes = geo::eta_minutes(route.distance_km)?;

        let mut delivery = handle.lock().await;
        ensure_fee_editable(&delivery)?;
        delivery.distance_km = route.distance_km;
        delivery.fee = fee;
        delivery.eta_minutes = eta_minutes;
        delivery.updated_at = Utc::now();

        info!(delivery_id = %delivery_id, fee, distance_km = route.distance_km, source = ?route.source, "delivery fee recomputed");
        Ok(delivery.clone())
    }

    /// Re-broadcasts expired offers with a wider radius, or drops them once
    /// the round limit is reached. Returns how many were re-broadcast.
    pub async fn sweep_expired_offers(&self, now: DateTime<Utc>) -> usize {
        let mut rebroadcast = 0;

        for offer in self.offers.expired(now) {
            let snapshot = match self.get_delivery(offer.delivery_id).await {
                Ok(delivery) => delivery,
                Err(_) => {
                    self.offers.forget(offer.delivery_id);
                    continue;
                }
            };

            let still_open =
                snapshot.status == DeliveryStatus::ReadyForPickup && snapshot.partner_id.is_none();
            if !still_open {
                self.offers.forget(offer.delivery_id);
                continue;
            }

            if let Err(err) = self
                .store
                .void_offer_notifications(offer.delivery_id, None, None)
                .await
            {
                warn!(delivery_id = %offer.delivery_id, error = %err, "failed to void expired offer notifications");
            }

            if offer.round >= self.policy.max_rounds {
                self.offers.close(offer.delivery_id);
                warn!(
                    delivery_id = %offer.delivery_id,
                    rounds = offer.round,
                    "offer expired without taker; delivery stays ready_for_pickup"
                );
                continue;
            }

            let round = offer.round + 1;
            match self
                .broadcast_offer(
                    &snapshot,
                    round,
                    self.radius_for_round(round),
                    self.offers.rejected(offer.delivery_id),
                )
                .await
            {
                Ok(_) => rebroadcast += 1,
                Err(err) => {
                    self.offers.close(offer.delivery_id);
                    warn!(delivery_id = %offer.delivery_id, error = %err, "failed to re-broadcast offer");
                }
            }
        }

        rebroadcast
    }

    async fn after_transition(&self, delivery: &Delivery, event: &StatusEvent) {
        self.metrics
            .transitions_total
            .with_label_values(&[event.status.as_str()])
            .inc();
        self.sessions.publish_status(event);

        if let Some(order_status) = order_status_for(event.status)
            && let Err(err) = self
                .store
                .update_order_status(delivery.order_id, order_status)
                .await
        {
            warn!(order_id = %delivery.order_id, error = %err, "failed to update order status");
        }

        info!(
            delivery_id = %delivery.id,
            status = %event.status,
            actor = ?event.actor,
            "delivery status changed"
        );
    }

    /// Voids the offer's outstanding notifications and tells the candidates
    /// that did not win. Best effort; runs in the background.
    fn retire_offer(&self, offer: NotificationOffer, winner: Option<Uuid>) {
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let winner_user = winner.and_then(|partner_id| offer.user_for(partner_id));

        tokio::spawn(async move {
            if let Err(err) = store
                .void_offer_notifications(offer.delivery_id, None, winner_user)
                .await
            {
                warn!(delivery_id = %offer.delivery_id, error = %err, "failed to void offer notifications");
            }

            let losers: Vec<Uuid> = offer
                .recipient_user_ids
                .iter()
                .copied()
                .filter(|user_id| Some(*user_id) != winner_user)
                .collect();
            if losers.is_empty() {
                return;
            }

            let payload = NotificationPayload {
                kind: NotificationKind::OfferWithdrawn,
                title: "Delivery no longer available".to_string(),
                body: "This delivery has been taken or cancelled".to_string(),
                delivery_id: offer.delivery_id,
                order_id: offer.order_id,
                data: serde_json::Value::Null,
            };
            notifier.dispatch(&losers, &payload).await;
        });
    }

    fn notify_status(&self, delivery: &Delivery) {
        let mut recipients = vec![delivery.customer_id];
        if delivery.status == DeliveryStatus::Cancelled {
            recipients.push(delivery.shopkeeper_id);
        }

        let payload = NotificationPayload {
            kind: NotificationKind::StatusUpdate,
            title: delivery.status.description().to_string(),
            body: format!("Order {} is now {}", delivery.order_id, delivery.status),
            delivery_id: delivery.id,
            order_id: delivery.order_id,
            data: json!({ "status": delivery.status }),
        };

        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let partner_id = delivery.partner_id;
        let cancelled = delivery.status == DeliveryStatus::Cancelled;
        tokio::spawn(async move {
            if cancelled
                && let Some(partner_id) = partner_id
                && let Ok(Some(partner)) = store.get_delivery_partner(partner_id).await
            {
                recipients.push(partner.user_id);
            }
            notifier.dispatch(&recipients, &payload).await;
        });
    }
}

fn ensure_fee_editable(delivery: &Delivery) -> Result<(), AppError> {
    if delivery.status > DeliveryStatus::ReadyForPickup {
        return Err(AppError::BadRequest(format!(
            "fee of delivery {} is fixed once it is {}",
            delivery.id, delivery.status
        )));
    }
    Ok(())
}

fn order_status_for(status: DeliveryStatus) -> Option<OrderStatus> {
    match status {
        DeliveryStatus::ReadyForPickup => Some(OrderStatus::ReadyForPickup),
        DeliveryStatus::PickedUp => Some(OrderStatus::OutForDelivery),
        DeliveryStatus::Delivered => Some(OrderStatus::Delivered),
        DeliveryStatus::Cancelled => Some(OrderStatus::Cancelled),
        DeliveryStatus::Pending
        | DeliveryStatus::Assigned
        | DeliveryStatus::EnRoutePickup
        | DeliveryStatus::EnRouteDelivery => None,
    }
}
