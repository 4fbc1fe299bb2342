use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AuctionId, PlayerId, TeamId};

/// One lot a team has bought, kept denormalized on the team so roster reads don't need a join
/// (§4.1 "assign-player-to-team" appends here atomically with the player/auction updates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedLot {
    pub player_id: PlayerId,
    pub bought_at: i64,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetainedPlayer {
    pub player_id: PlayerId,
    pub retention_cost: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionTeam {
    pub id: TeamId,
    pub auction_id: AuctionId,
    pub version: u64,

    pub name: String,
    pub short_name: String,
    pub is_active: bool,

    pub purse_value: i64,
    pub purse_remaining: i64,

    pub players: Vec<OwnedLot>,
    pub retained_players: Vec<RetainedPlayer>,

    pub access_credential_hash: String,
    pub magic_token: String,
}

impl AuctionTeam {
    pub fn new(
        auction_id: AuctionId,
        name: impl Into<String>,
        short_name: impl Into<String>,
        purse_value: i64,
    ) -> Self {
        Self {
            id: TeamId::new(),
            auction_id,
            version: 0,
            name: name.into(),
            short_name: short_name.into(),
            is_active: true,
            purse_value,
            purse_remaining: purse_value,
            players: Vec::new(),
            retained_players: Vec::new(),
            access_credential_hash: String::new(),
            magic_token: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn squad_size(&self) -> u32 {
        self.players.len() as u32
    }

    pub fn owns(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|lot| lot.player_id == player_id)
    }
}
