use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{AuctionId, PlayerId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Pool,
    Live,
    Sold,
    Unsold,
    Disqualified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionPlayer {
    pub id: PlayerId,
    pub auction_id: AuctionId,
    pub version: u64,

    pub player_number: u32,
    pub name: String,
    pub role: String,
    pub fields: HashMap<String, Value>,

    pub status: PlayerStatus,
    pub sold_to: Option<TeamId>,
    pub sold_amount: Option<i64>,
    pub sold_in_round: Option<u32>,
    pub is_disqualified: bool,
}

impl AuctionPlayer {
    pub fn new(auction_id: AuctionId, player_number: u32, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(),
            auction_id,
            version: 0,
            player_number,
            name: name.into(),
            role: role.into(),
            fields: HashMap::new(),
            status: PlayerStatus::Pool,
            sold_to: None,
            sold_amount: None,
            sold_in_round: None,
            is_disqualified: false,
        }
    }
}
