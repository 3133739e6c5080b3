pub mod coordinator;
pub mod offers;
pub mod scoring;
pub mod state_machine;
