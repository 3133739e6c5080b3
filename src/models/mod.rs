pub mod delivery;
pub mod location;
pub mod notification;
pub mod order;
pub mod partner;
pub mod session;
