//! Use cases built on top of [`sealed_engine`].
//!
//! Every contract follows the same pattern: public preconditions are
//! checked first, the encrypted work runs inside one engine execution, and
//! the contract's own state only changes once that execution committed.
//! Settling a contract consumes a verified reveal, so a replayed
//! decryption is refused by the engine before any payout happens twice.

pub mod auction;
pub mod error;
pub mod escrow;
pub mod kyc;
pub mod lottery;
pub mod payout;
pub mod voting;

pub use crate::{
    auction::{AuctionOutcome, BlindAuction, Winner},
    error::ContractError,
    escrow::{Escrow, Parties},
    kyc::AgeGate,
    lottery::Lottery,
    payout::{Payment, Payouts},
    voting::{ConfidentialVote, Tally},
};
