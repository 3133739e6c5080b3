pub mod heartbeat;
pub mod registry;

pub use registry::{Outbound, OutboundSender, ServerMessage, SessionRegistry};
