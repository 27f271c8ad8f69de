//! Application layer orchestrating the intent, escrow and settlement flows.
//!
//! Each service owns its ports and validates preconditions before forwarding
//! to the gateway, which stays the single writer of authoritative state.

pub mod escrow;
pub mod intents;
pub mod poller;
pub mod settlement;
