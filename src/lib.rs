//! Scrypt-jane mining core
//!
//! The computational heart of a GPU-accelerated proof-of-work searcher for
//! scrypt-jane coins (Yacoin and friends):
//! - From-scratch Keccak-512 sponge, HMAC and single-round PBKDF2 primitives
//! - Timestamp-driven N-factor difficulty schedule with a coin profile table
//! - Double-buffered search pipeline overlapping CPU key derivation with
//!   asynchronous memory-hard mixing on a device
//! - CPU re-verification of every candidate before it is reported
//!
//! The memory-hard mixing step itself is an external collaborator; this crate
//! only defines its contract (see [`mix`]).

pub mod crypto;
pub mod error;
pub mod mix;
pub mod nfactor;
pub mod pipeline;
pub mod types;
pub mod worker;

pub use error::{Error, Result};
pub use mix::{MixDevice, ReferenceMix, Slot, CHUNK_BYTES};
pub use nfactor::{CoinProfile, ScheduleParams, MAX_COST_EXPONENT};
pub use pipeline::{ScanOutcome, SearchPipeline};
pub use types::{Nonce, Target, Work};
pub use worker::DeviceWorker;

/// Application information
pub const APP_NAME: &str = "scrypt-jane-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
