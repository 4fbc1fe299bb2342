//! The error taxonomy of §7. Every fallible public operation on the engine returns
//! `Result<T, EngineError>`; the HTTP collaborator (outside this crate) maps each variant to a
//! status code, exactly as §7's propagation policy requires.

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Internal — should halt the coordinator (§7). Never returned for caller-input mistakes.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Persistence unavailable; the coordinator retries once with backoff before surfacing this.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether the propagation policy in §7 allows this error to surface to the caller as-is
    /// (i.e. it is not an internal failure that must halt the coordinator).
    pub fn is_caller_facing(&self) -> bool {
        !matches!(self, EngineError::InvariantViolation(_))
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::StaleVersion { entity, id } => EngineError::StateConflict(format!(
                "stale version writing {entity} {id}; callers on the hot CAS path (e.g. record_bid) retry once against fresh state before surfacing this"
            )),
            StoreError::ConstraintViolation(reason) => EngineError::StateConflict(reason),
            StoreError::Backend(reason) => EngineError::Transient(reason),
        }
    }
}

/// The bid-rejection reasons of §4.4/§8, carried separately from [`EngineError`] because a
/// rejected bid is not a failed operation: it is a successful arbitration whose outcome is
/// "reject", delivered privately to the bidder (§7 "User-visible failure behavior").
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BidRejectionReason {
    #[error("auction_not_live")]
    AuctionNotLive,
    #[error("no_player_live")]
    NoPlayerLive,
    #[error("team_inactive_or_foreign")]
    TeamInactiveOrForeign,
    #[error("already_highest_bidder")]
    AlreadyHighestBidder,
    #[error("squad_full")]
    SquadFull,
    #[error("bid_not_next_increment")]
    BidNotNextIncrement,
    #[error("insufficient_purse_for_min_squad")]
    InsufficientPurseForMinSquad,
    #[error("insufficient_purse")]
    InsufficientPurse,
}
