use crate::error::AppError;
use crate::models::delivery::{Actor, Delivery, DeliveryStatus};

/// Forward moves go exactly one step along the fixed order; `Cancelled` is
/// reachable from any non-terminal state. Nothing leaves a terminal state.
pub fn check_transition(from: DeliveryStatus, to: DeliveryStatus) -> Result<(), AppError> {
    let allowed = !from.is_terminal()
        && (from.next() == Some(to) || to == DeliveryStatus::Cancelled);

    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}

/// Who may drive the delivery into `to`.
pub fn authorize(delivery: &Delivery, to: DeliveryStatus, actor: &Actor) -> Result<(), AppError> {
    match to {
        DeliveryStatus::Pending => Err(AppError::InvalidTransition {
            from: delivery.status,
            to,
        }),
        DeliveryStatus::ReadyForPickup => match actor {
            Actor::Shopkeeper(user_id) if *user_id == delivery.shopkeeper_id => Ok(()),
            Actor::Admin | Actor::System => Ok(()),
            _ => Err(AppError::Unauthorized(
                "only the store can mark an order ready for pickup".to_string(),
            )),
        },
        DeliveryStatus::Assigned
        | DeliveryStatus::EnRoutePickup
        | DeliveryStatus::PickedUp
        | DeliveryStatus::EnRouteDelivery
        | DeliveryStatus::Delivered => match actor {
            Actor::Partner(partner_id) if delivery.partner_id == Some(*partner_id) => Ok(()),
            Actor::Partner(_) if to == DeliveryStatus::Assigned => Ok(()),
            _ => Err(AppError::Unauthorized(format!(
                "only the assigned partner can move delivery {} to {to}",
                delivery.id
            ))),
        },
        DeliveryStatus::Cancelled => match actor {
            Actor::Customer(user_id) if *user_id == delivery.customer_id => Ok(()),
            Actor::Shopkeeper(user_id) if *user_id == delivery.shopkeeper_id => Ok(()),
            Actor::Admin | Actor::System => Ok(()),
            _ => Err(AppError::Unauthorized(format!(
                "actor may not cancel delivery {}",
                delivery.id
            ))),
        },
    }
}
