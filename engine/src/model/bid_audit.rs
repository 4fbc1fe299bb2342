use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AuctionId, PlayerId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidAuditType {
    BidAccepted,
    BidRejected,
    BidVoided,
}

/// Every bid attempt, accepted or rejected (§3). Never rewritten except voiding, so this is
/// append-only from the engine's point of view just like the event journal, but it is not part
/// of the reversible-event machinery — undo never touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidAuditEntry {
    pub auction_id: AuctionId,
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub attempted_amount: i64,
    pub entry_type: BidAuditType,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}
