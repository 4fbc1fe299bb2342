use serde::{Deserialize, Serialize};

use crate::ids::{AuctionId, PlayerId, TeamId, TradeId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlayer {
    pub player_id: PlayerId,
    pub name: String,
    pub role: String,
    pub sold_amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    PendingCounterparty,
    BothAgreed,
    Executed,
    Rejected,
    Withdrawn,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementDirection {
    InitiatorPays,
    CounterpartyPays,
    Even,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionTrade {
    pub id: TradeId,
    pub auction_id: AuctionId,
    pub version: u64,

    pub initiator_team_id: TeamId,
    pub counterparty_team_id: TeamId,
    pub initiator_players: Vec<TradePlayer>,
    pub counterparty_players: Vec<TradePlayer>,

    pub status: TradeStatus,

    pub initiator_total_value: i64,
    pub counterparty_total_value: i64,
    pub settlement_amount: i64,
    pub settlement_direction: SettlementDirection,
    pub purse_settlement_enabled: bool,

    pub public_announcement: Option<String>,
    pub status_reason: Option<String>,
}

impl AuctionTrade {
    pub fn compute_settlement(
        initiator_players: &[TradePlayer],
        counterparty_players: &[TradePlayer],
    ) -> (i64, i64, i64, SettlementDirection) {
        let initiator_total: i64 = initiator_players.iter().map(|p| p.sold_amount).sum();
        let counterparty_total: i64 = counterparty_players.iter().map(|p| p.sold_amount).sum();
        let diff = initiator_total - counterparty_total;
        let direction = if diff > 0 {
            SettlementDirection::CounterpartyPays
        } else if diff < 0 {
            SettlementDirection::InitiatorPays
        } else {
            SettlementDirection::Even
        };
        (initiator_total, counterparty_total, diff.abs(), direction)
    }

    /// Players on *this* trade that are, as of proposal/accept time, considered locked: the
    /// initiator's side always, the counterparty's side only once `both_agreed` (§4.6).
    pub fn locked_player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.initiator_players.iter().map(|p| p.player_id).collect();
        if matches!(self.status, TradeStatus::BothAgreed | TradeStatus::Executed) {
            ids.extend(self.counterparty_players.iter().map(|p| p.player_id));
        }
        ids
    }
}
