use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AuctionId, EventId};

/// Authoritative type taxonomy from §4.2. Kept as a plain enum (not a trait object) so the
/// journal can match on it exhaustively when deciding reversibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionEventType {
    AuctionCreated,
    AuctionConfigured,
    AuctionStarted,
    AuctionPaused,
    AuctionResumed,
    AuctionCompleted,
    TradeWindowOpened,
    AuctionFinalized,
    PlayerLive,
    BidAccepted,
    BidRejected,
    PhaseAdvanced,
    PlayerSold,
    PlayerUnsold,
    PlayerReturnedToPool,
    PlayerDisqualified,
    AdminPurseAdjusted,
    TradeExecuted,
    ManualOverride,
    UndoApplied,
}

impl ActionEventType {
    /// The reversible subset from §4.2.
    pub fn is_reversible(self) -> bool {
        matches!(
            self,
            ActionEventType::PlayerSold
                | ActionEventType::PlayerUnsold
                | ActionEventType::PlayerDisqualified
                | ActionEventType::TradeExecuted
                | ActionEventType::AdminPurseAdjusted
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: EventId,
    pub auction_id: AuctionId,
    pub sequence_number: u64,
    pub event_type: ActionEventType,
    pub payload: Value,
    pub reversal_payload: Option<Value>,
    pub performed_by: String,
    pub is_public: bool,
    pub public_message: Option<String>,
    /// Once an `UNDO_APPLIED` has consumed this event's reversal, it is frozen and can never be
    /// reversed again, even if it is still within `max_undo_actions` of the tail (§4.2).
    pub reversal_consumed: bool,
    pub created_at: DateTime<Utc>,
}
