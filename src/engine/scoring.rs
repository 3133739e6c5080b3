use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::geo::distance_km;
use crate::models::location::GeoPoint;
use crate::models::partner::DeliveryPartner;

const DISTANCE_WEIGHT: f64 = 0.60;
const RATING_WEIGHT: f64 = 0.30;
const EXPERIENCE_WEIGHT: f64 = 0.10;

/// Completed deliveries after which experience stops adding to the score.
const EXPERIENCE_SATURATION: f64 = 200.0;

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
    pub experience_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub partner_id: Uuid,
    pub user_id: Uuid,
    pub distance_km: Option<f64>,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

pub fn compute_score(partner: &DeliveryPartner, pickup: &GeoPoint) -> (f64, Option<f64>, ScoreBreakdown) {
    let distance = partner
        .last_known_location
        .as_ref()
        .and_then(|location| distance_km(location, pickup).ok());

    let breakdown = ScoreBreakdown {
        distance_score: distance.map(distance_score).unwrap_or(0.0),
        rating_score: rating_score(partner.rating),
        experience_score: experience_score(partner.completed_deliveries),
    };

    (weighted_score(&breakdown), distance, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.distance_score * DISTANCE_WEIGHT)
        + (breakdown.rating_score * RATING_WEIGHT)
        + (breakdown.experience_score * EXPERIENCE_WEIGHT)
}

/// Available, approved partners within `radius_km` of the pickup, best
/// first. Partners without a known position are kept but rank below anyone
/// with one.
pub fn rank_candidates(
    partners: &[DeliveryPartner],
    pickup: &GeoPoint,
    radius_km: Option<f64>,
    excluded: &HashSet<Uuid>,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = partners
        .iter()
        .filter(|partner| partner.can_take_offers() && !excluded.contains(&partner.id))
        .filter_map(|partner| {
            let (score, distance, breakdown) = compute_score(partner, pickup);
            let in_range = match (radius_km, distance) {
                (Some(radius), Some(distance)) => distance <= radius,
                _ => true,
            };

            in_range.then(|| RankedCandidate {
                partner_id: partner.id,
                user_id: partner.user_id,
                distance_km: distance,
                score,
                score_breakdown: breakdown,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.distance_km
            .is_some()
            .cmp(&a.distance_km.is_some())
            .then(b.score.total_cmp(&a.score))
    });
    ranked
}

fn distance_score(distance_km: f64) -> f64 {
    1.0 / (1.0 + distance_km.max(0.0))
}

fn rating_score(rating: f64) -> f64 {
    (rating / 5.0).clamp(0.0, 1.0)
}

fn experience_score(completed: u32) -> f64 {
    (completed as f64 / EXPERIENCE_SATURATION).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use uuid::Uuid;

    use super::{compute_score, rank_candidates};
    use crate::models::location::GeoPoint;
    use crate::models::partner::{ApprovalStatus, DeliveryPartner, Vehicle, VehicleKind};

    fn partner(id_seed: u128, location: Option<(f64, f64)>, rating: f64) -> DeliveryPartner {
        DeliveryPartner {
            id: Uuid::from_u128(id_seed),
            user_id: Uuid::from_u128(id_seed + 1_000),
            name: "test-partner".to_string(),
            is_available: true,
            approval: ApprovalStatus::Approved,
            vehicle: Vehicle {
                kind: VehicleKind::Scooter,
                registration: None,
            },
            rating,
            completed_deliveries: 10,
            last_known_location: location.map(|(lat, lng)| GeoPoint::new(lat, lng)),
            updated_at: Utc::now(),
        }
    }

    fn pickup() -> GeoPoint {
        GeoPoint::new(53.5511, 9.9937)
    }

    #[test]
    fn closer_partner_gets_higher_score_when_other_factors_match() {
        let near = partner(1, Some((53.5512, 9.9938)), 4.5);
        let far = partner(2, Some((53.7, 10.2)), 4.5);

        let (near_score, _, _) = compute_score(&near, &pickup());
        let (far_score, _, _) = compute_score(&far, &pickup());

        assert!(near_score > far_score);
    }

    #[test]
    fn unavailable_unapproved_and_excluded_partners_are_dropped() {
        let mut busy = partner(1, Some((53.5512, 9.9938)), 4.5);
        busy.is_available = false;
        let mut pending = partner(2, Some((53.5512, 9.9938)), 4.5);
        pending.approval = ApprovalStatus::Pending;
        let rejected_before = partner(3, Some((53.5512, 9.9938)), 4.5);
        let eligible = partner(4, Some((53.5512, 9.9938)), 4.5);

        let excluded = HashSet::from([rejected_before.id]);
        let ranked = rank_candidates(
            &[busy, pending, rejected_before, eligible.clone()],
            &pickup(),
            None,
            &excluded,
        );

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].partner_id, eligible.id);
    }

    #[test]
    fn radius_filters_known_positions_only() {
        let near = partner(1, Some((53.5512, 9.9938)), 3.0);
        let far = partner(2, Some((53.7, 10.2)), 5.0);
        let unknown = partner(3, None, 5.0);

        let ranked = rank_candidates(&[far, unknown.clone(), near.clone()], &pickup(), Some(5.0), &HashSet::new());

        let ids: Vec<Uuid> = ranked.iter().map(|c| c.partner_id).collect();
        assert_eq!(ids, vec![near.id, unknown.id]);
    }
}
