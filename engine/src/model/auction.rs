use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::ids::{AuctionId, PlayerId, TeamId};

/// A single tier of `{threshold, increment}` from §3. The increment that applies to a bid of
/// amount `x` is the increment of the largest threshold `<= x`; tiers are kept sorted ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidIncrementTier {
    pub threshold: i64,
    pub increment: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerOrderPolicy {
    Sequential,
    Randomized,
}

impl Default for PlayerOrderPolicy {
    fn default() -> Self {
        PlayerOrderPolicy::Sequential
    }
}

/// Where a returned-to-pool player is re-inserted into `remaining_player_ids` (§9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeuePolicy {
    Head,
    Tail,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        RequeuePolicy::Head
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Draft,
    Configured,
    Live,
    Paused,
    Completed,
    TradeWindow,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Running,
    GoingOnce,
    GoingTwice,
}

/// The immutable-once-configured knobs of §3. Kept as its own type so `configure` can validate
/// and freeze it in one assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionConfig {
    pub base_price: i64,
    pub purse_value: i64,
    pub bid_increment_tiers: Vec<BidIncrementTier>,
    pub timer_duration_secs: u64,
    pub bid_reset_timer_secs: u64,
    pub going_once_timer_secs: u64,
    pub going_twice_timer_secs: u64,
    pub min_squad_size: u32,
    pub max_squad_size: u32,
    pub retention_enabled: bool,
    pub max_retentions: u32,
    pub retention_cost: i64,
    pub trade_window_hours: i64,
    pub max_trades_per_team: u32,
    pub trade_settlement_enabled: bool,
    pub max_undo_actions: u32,
    pub player_order_policy: PlayerOrderPolicy,
    pub requeue_policy: RequeuePolicy,
}

impl AuctionConfig {
    /// The increment that applies on top of `current_bid` (§4.4 rule 6).
    pub fn increment_for(&self, current_bid: i64) -> i64 {
        self.bid_increment_tiers
            .iter()
            .filter(|tier| tier.threshold <= current_bid)
            .map(|tier| tier.increment)
            .last()
            .unwrap_or_else(|| {
                self.bid_increment_tiers
                    .first()
                    .map(|t| t.increment)
                    .unwrap_or(self.base_price)
            })
    }

    pub fn expected_next_bid(&self, current_bid: Option<i64>) -> i64 {
        match current_bid {
            None => self.base_price,
            Some(bid) => bid + self.increment_for(bid),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub slug: String,
    pub version: u64,

    pub config: AuctionConfig,
    pub status: AuctionStatus,

    pub current_player_id: Option<PlayerId>,
    pub current_bid_amount: Option<i64>,
    pub current_bidder_team_id: Option<TeamId>,
    pub current_timer_phase: Option<TimerPhase>,

    pub remaining_player_ids: VecDeque<PlayerId>,

    pub trade_window_ends_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Auction {
    pub fn new(slug: impl Into<String>, config: AuctionConfig) -> Self {
        Self {
            id: AuctionId::new(),
            slug: slug.into(),
            version: 0,
            config,
            status: AuctionStatus::Draft,
            current_player_id: None,
            current_bid_amount: None,
            current_bidder_team_id: None,
            current_timer_phase: None,
            remaining_player_ids: VecDeque::new(),
            trade_window_ends_at: None,
            finalized_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_live_or_paused(&self) -> bool {
        matches!(self.status, AuctionStatus::Live | AuctionStatus::Paused)
    }
}
