//! # velonet-shared
//!
//! Types shared between the Velonet store and server crates: domain enums,
//! the realtime event protocol, protocol constants, and the interaction-score
//! function.
//!
//! The crate is deliberately free of I/O so that every rule expressed here
//! (enum round-trips, score decay, event wire format) is unit-testable in
//! isolation.

pub mod constants;
pub mod events;
pub mod score;
pub mod types;

mod error;

pub use error::SharedError;
pub use types::*;
