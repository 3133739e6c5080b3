use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::coordinator::AssignmentCoordinator;
use crate::error::AppError;
use crate::models::notification::NotificationOffer;

/// Open offers, one per delivery. A newer round replaces the older one.
///
/// Rejections are kept per delivery apart from the open offer, so a partner
/// who turned a delivery down is left out of every later round, including
/// manual re-offers after the automatic rounds ran out.
#[derive(Default)]
pub struct OfferBook {
    offers: DashMap<Uuid, NotificationOffer>,
    rejections: DashMap<Uuid, HashSet<Uuid>>,
}

impl OfferBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partners that rejected the delivery in any earlier round.
    pub fn rejected(&self, delivery_id: Uuid) -> HashSet<Uuid> {
        self.rejections
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Stores the offer as the delivery's open round and returns what was
    /// stored. Recorded rejections are merged in and rejected partners are
    /// dropped from the candidates, even if they were ranked before the
    /// rejection landed.
    pub fn open(&self, mut offer: NotificationOffer) -> NotificationOffer {
        // Lock order is offers, then rejections, same as `reject`.
        let slot = self.offers.entry(offer.delivery_id);
        if let Some(rejected) = self.rejections.get(&offer.delivery_id) {
            offer.rejected_partner_ids.extend(rejected.iter().copied());
        }
        offer.drop_rejected_candidates();
        slot.insert(offer.clone());
        offer
    }

    pub fn get(&self, delivery_id: Uuid) -> Option<NotificationOffer> {
        self.offers.get(&delivery_id).map(|entry| entry.value().clone())
    }

    /// Removes the open round. Rejections stay on record.
    pub fn close(&self, delivery_id: Uuid) -> Option<NotificationOffer> {
        self.offers.remove(&delivery_id).map(|(_, offer)| offer)
    }

    /// Removes the open round and the rejection record once the delivery can
    /// no longer be offered.
    pub fn forget(&self, delivery_id: Uuid) -> Option<NotificationOffer> {
        let offer = self.close(delivery_id);
        self.rejections.remove(&delivery_id);
        offer
    }

    pub fn is_candidate(&self, delivery_id: Uuid, partner_id: Uuid) -> bool {
        self.offers
            .get(&delivery_id)
            .is_some_and(|offer| offer.is_candidate(partner_id))
    }

    /// Records a rejection and returns the updated offer.
    pub fn reject(&self, delivery_id: Uuid, partner_id: Uuid) -> Result<NotificationOffer, AppError> {
        let mut offer = self
            .offers
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("no open offer for delivery {delivery_id}")))?;

        if !offer.is_candidate(partner_id) {
            return Err(AppError::Unauthorized(format!(
                "partner {partner_id} has no pending offer for delivery {delivery_id}"
            )));
        }

        self.rejections.entry(delivery_id).or_default().insert(partner_id);
        offer.rejected_partner_ids.insert(partner_id);
        Ok(offer.clone())
    }

    pub fn expired(&self, now: DateTime<Utc>) -> Vec<NotificationOffer> {
        self.offers
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// Periodically re-broadcasts offers nobody accepted before they expired.
pub fn start_offer_sweeper(
    coordinator: Arc<AssignmentCoordinator>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let rebroadcast = coordinator.sweep_expired_offers(Utc::now()).await;
            if rebroadcast > 0 {
                tracing::info!(rebroadcast, "expired offers re-broadcast");
            }
        }
    })
}
