//! The Auction State Store (C1, §4.1): typed reads and atomic, conditional writes over the
//! entities in §3. Two implementations exist: [`memory::MemoryStore`] (tests, local dev) and
//! [`postgres::PostgresStore`] (the document-shaped realization of §7a). Both implement the same
//! trait so the rest of the engine is storage-agnostic, per the "Persistence handle" design note
//! in §9.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::ids::{AuctionId, EventId, PlayerId, TeamId, TradeId};
use crate::model::{
    ActionEvent, ActionEventType, Auction, AuctionPlayer, AuctionTeam, AuctionTrade,
    BidAuditEntry, PlayerStatus, TradeStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("stale version writing {entity} {id}")]
    StaleVersion { entity: &'static str, id: String },

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// The atomic "assign player to team" operation of §4.1(d): a sale and the corresponding return
/// to the journal and pool queue commit together or not at all.
pub struct AssignPlayerToTeam {
    pub auction: Auction,
    pub player: AuctionPlayer,
    pub team: AuctionTeam,
    pub event: NewEvent,
}

/// An event awaiting a sequence number, assigned atomically by the store on append (§4.2).
pub struct NewEvent {
    pub auction_id: AuctionId,
    pub event_type: ActionEventType,
    pub payload: Value,
    pub reversal_payload: Option<Value>,
    pub performed_by: String,
    pub is_public: bool,
    pub public_message: Option<String>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn create_auction(&self, auction: Auction) -> Result<Auction, StoreError>;
    async fn get_auction(&self, id: AuctionId) -> Result<Auction, StoreError>;
    async fn cas_update_auction(&self, auction: Auction) -> Result<Auction, StoreError>;

    async fn create_team(&self, team: AuctionTeam) -> Result<AuctionTeam, StoreError>;
    async fn get_team(&self, auction_id: AuctionId, id: TeamId) -> Result<AuctionTeam, StoreError>;
    async fn find_teams_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionTeam>, StoreError>;
    async fn cas_update_team(&self, team: AuctionTeam) -> Result<AuctionTeam, StoreError>;

    async fn create_player(&self, player: AuctionPlayer) -> Result<AuctionPlayer, StoreError>;
    async fn get_player(&self, auction_id: AuctionId, id: PlayerId) -> Result<AuctionPlayer, StoreError>;
    async fn find_players_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionPlayer>, StoreError>;
    async fn find_players_by_auction_and_status(
        &self,
        auction_id: AuctionId,
        status: PlayerStatus,
    ) -> Result<Vec<AuctionPlayer>, StoreError>;
    async fn cas_update_player(&self, player: AuctionPlayer) -> Result<AuctionPlayer, StoreError>;

    /// §4.1(d): sets player status/sold fields, decrements team purse, appends to
    /// `team.players`, updates `auction.remaining_player_ids`, and appends the event — all, or
    /// none of it, atomically.
    async fn assign_player_to_team(&self, op: AssignPlayerToTeam) -> Result<ActionEvent, StoreError>;

    async fn append_event(&self, event: NewEvent) -> Result<ActionEvent, StoreError>;
    async fn tail_events(&self, auction_id: AuctionId, k: usize) -> Result<Vec<ActionEvent>, StoreError>;
    /// The newest reversible, not-yet-consumed event, if any is still within `max_undo_actions`
    /// of the tail (§4.2).
    async fn latest_undoable_event(
        &self,
        auction_id: AuctionId,
        max_undo_actions: u32,
    ) -> Result<Option<ActionEvent>, StoreError>;
    async fn mark_event_reversal_consumed(&self, id: EventId) -> Result<(), StoreError>;

    async fn create_trade(&self, trade: AuctionTrade) -> Result<AuctionTrade, StoreError>;
    async fn get_trade(&self, auction_id: AuctionId, id: TradeId) -> Result<AuctionTrade, StoreError>;
    async fn find_trades_by_auction_and_status(
        &self,
        auction_id: AuctionId,
        status: TradeStatus,
    ) -> Result<Vec<AuctionTrade>, StoreError>;
    async fn find_trades_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionTrade>, StoreError>;
    async fn cas_update_trade(&self, trade: AuctionTrade) -> Result<AuctionTrade, StoreError>;

    async fn append_bid_audit(&self, entry: BidAuditEntry) -> Result<(), StoreError>;
}
