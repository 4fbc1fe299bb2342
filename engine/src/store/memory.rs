//! An in-memory [`StateStore`] backing unit/integration tests and local development without a
//! running database (§2a "Test tooling"). Cross-entity atomicity for the operations that touch
//! more than one collection (`assign_player_to_team`, `append_event`) is provided by a single
//! coarse write lock — acceptable here because, unlike the Postgres-backed store, this
//! implementation never serves more than one process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::ids::{AuctionId, EventId, PlayerId, TeamId, TradeId};
use crate::model::{
    ActionEvent, Auction, AuctionPlayer, AuctionTeam, AuctionTrade, BidAuditEntry, PlayerStatus,
    TradeStatus,
};

use super::{AssignPlayerToTeam, NewEvent, StateStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    auctions: DashMap<AuctionId, Auction>,
    teams: DashMap<(AuctionId, TeamId), AuctionTeam>,
    players: DashMap<(AuctionId, PlayerId), AuctionPlayer>,
    trades: DashMap<(AuctionId, TradeId), AuctionTrade>,
    events: DashMap<AuctionId, Vec<ActionEvent>>,
    bid_audits: DashMap<AuctionId, Vec<BidAuditEntry>>,
    sequence_numbers: DashMap<AuctionId, AtomicU64>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence_number(&self, auction_id: AuctionId) -> u64 {
        self.sequence_numbers
            .entry(auction_id)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst)
            + 1
    }

    fn build_event(&self, new_event: NewEvent) -> ActionEvent {
        let sequence_number = self.next_sequence_number(new_event.auction_id);
        ActionEvent {
            id: EventId::new(),
            auction_id: new_event.auction_id,
            sequence_number,
            event_type: new_event.event_type,
            payload: new_event.payload,
            reversal_payload: new_event.reversal_payload,
            performed_by: new_event.performed_by,
            is_public: new_event.is_public,
            public_message: new_event.public_message,
            reversal_consumed: false,
            created_at: chrono::Utc::now(),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn create_auction(&self, auction: Auction) -> Result<Auction, StoreError> {
        self.auctions.insert(auction.id, auction.clone());
        Ok(auction)
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Auction, StoreError> {
        self.auctions
            .get(&id)
            .map(|a| a.clone())
            .ok_or(StoreError::NotFound { entity: "auction", id: id.to_string() })
    }

    async fn cas_update_auction(&self, mut auction: Auction) -> Result<Auction, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut slot = self
            .auctions
            .get_mut(&auction.id)
            .ok_or(StoreError::NotFound { entity: "auction", id: auction.id.to_string() })?;
        if slot.version != auction.version {
            return Err(StoreError::StaleVersion { entity: "auction", id: auction.id.to_string() });
        }
        auction.version += 1;
        *slot = auction.clone();
        Ok(auction)
    }

    async fn create_team(&self, team: AuctionTeam) -> Result<AuctionTeam, StoreError> {
        self.teams.insert((team.auction_id, team.id), team.clone());
        Ok(team)
    }

    async fn get_team(&self, auction_id: AuctionId, id: TeamId) -> Result<AuctionTeam, StoreError> {
        self.teams
            .get(&(auction_id, id))
            .map(|t| t.clone())
            .ok_or(StoreError::NotFound { entity: "team", id: id.to_string() })
    }

    async fn find_teams_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionTeam>, StoreError> {
        Ok(self
            .teams
            .iter()
            .filter(|entry| entry.key().0 == auction_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn cas_update_team(&self, mut team: AuctionTeam) -> Result<AuctionTeam, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = (team.auction_id, team.id);
        let mut slot = self
            .teams
            .get_mut(&key)
            .ok_or(StoreError::NotFound { entity: "team", id: team.id.to_string() })?;
        if slot.version != team.version {
            return Err(StoreError::StaleVersion { entity: "team", id: team.id.to_string() });
        }
        team.version += 1;
        *slot = team.clone();
        Ok(team)
    }

    async fn create_player(&self, player: AuctionPlayer) -> Result<AuctionPlayer, StoreError> {
        self.players.insert((player.auction_id, player.id), player.clone());
        Ok(player)
    }

    async fn get_player(&self, auction_id: AuctionId, id: PlayerId) -> Result<AuctionPlayer, StoreError> {
        self.players
            .get(&(auction_id, id))
            .map(|p| p.clone())
            .ok_or(StoreError::NotFound { entity: "player", id: id.to_string() })
    }

    async fn find_players_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionPlayer>, StoreError> {
        Ok(self
            .players
            .iter()
            .filter(|entry| entry.key().0 == auction_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_players_by_auction_and_status(
        &self,
        auction_id: AuctionId,
        status: PlayerStatus,
    ) -> Result<Vec<AuctionPlayer>, StoreError> {
        Ok(self
            .players
            .iter()
            .filter(|entry| entry.key().0 == auction_id && entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn cas_update_player(&self, mut player: AuctionPlayer) -> Result<AuctionPlayer, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = (player.auction_id, player.id);
        let mut slot = self
            .players
            .get_mut(&key)
            .ok_or(StoreError::NotFound { entity: "player", id: player.id.to_string() })?;
        if slot.version != player.version {
            return Err(StoreError::StaleVersion { entity: "player", id: player.id.to_string() });
        }
        player.version += 1;
        *slot = player.clone();
        Ok(player)
    }

    async fn assign_player_to_team(&self, op: AssignPlayerToTeam) -> Result<ActionEvent, StoreError> {
        let _guard = self.write_lock.lock().unwrap();

        let auction_key = op.auction.id;
        let team_key = (op.team.auction_id, op.team.id);
        let player_key = (op.player.auction_id, op.player.id);

        {
            let existing = self
                .auctions
                .get(&auction_key)
                .ok_or(StoreError::NotFound { entity: "auction", id: auction_key.to_string() })?;
            if existing.version != op.auction.version {
                return Err(StoreError::StaleVersion { entity: "auction", id: auction_key.to_string() });
            }
        }
        {
            let existing = self
                .teams
                .get(&team_key)
                .ok_or(StoreError::NotFound { entity: "team", id: op.team.id.to_string() })?;
            if existing.version != op.team.version {
                return Err(StoreError::StaleVersion { entity: "team", id: op.team.id.to_string() });
            }
        }
        {
            let existing = self
                .players
                .get(&player_key)
                .ok_or(StoreError::NotFound { entity: "player", id: op.player.id.to_string() })?;
            if existing.version != op.player.version {
                return Err(StoreError::StaleVersion { entity: "player", id: op.player.id.to_string() });
            }
        }

        let mut auction = op.auction;
        auction.version += 1;
        let mut team = op.team;
        team.version += 1;
        let mut player = op.player;
        player.version += 1;

        self.auctions.insert(auction_key, auction);
        self.teams.insert(team_key, team);
        self.players.insert(player_key, player);

        let event = self.build_event(op.event);
        self.events.entry(event.auction_id).or_insert_with(Vec::new).push(event.clone());
        Ok(event)
    }

    async fn append_event(&self, new_event: NewEvent) -> Result<ActionEvent, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let event = self.build_event(new_event);
        self.events.entry(event.auction_id).or_insert_with(Vec::new).push(event.clone());
        Ok(event)
    }

    async fn tail_events(&self, auction_id: AuctionId, k: usize) -> Result<Vec<ActionEvent>, StoreError> {
        let events = self.events.get(&auction_id).map(|v| v.clone()).unwrap_or_default();
        Ok(events.into_iter().rev().take(k).collect())
    }

    async fn latest_undoable_event(
        &self,
        auction_id: AuctionId,
        max_undo_actions: u32,
    ) -> Result<Option<ActionEvent>, StoreError> {
        let events = self.events.get(&auction_id).map(|v| v.clone()).unwrap_or_default();
        // Walk back from the tail; the reversible-and-not-yet-consumed events within the last
        // `max_undo_actions` positions of the journal are eligible (§4.2).
        let window: Vec<&ActionEvent> = events.iter().rev().take(max_undo_actions.max(1) as usize).collect();
        Ok(window
            .into_iter()
            .find(|e| e.event_type.is_reversible() && !e.reversal_consumed)
            .cloned())
    }

    async fn mark_event_reversal_consumed(&self, id: EventId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        for mut events in self.events.iter_mut() {
            if let Some(event) = events.value_mut().iter_mut().find(|e| e.id == id) {
                event.reversal_consumed = true;
                return Ok(());
            }
        }
        Err(StoreError::NotFound { entity: "event", id: id.to_string() })
    }

    async fn create_trade(&self, trade: AuctionTrade) -> Result<AuctionTrade, StoreError> {
        self.trades.insert((trade.auction_id, trade.id), trade.clone());
        Ok(trade)
    }

    async fn get_trade(&self, auction_id: AuctionId, id: TradeId) -> Result<AuctionTrade, StoreError> {
        self.trades
            .get(&(auction_id, id))
            .map(|t| t.clone())
            .ok_or(StoreError::NotFound { entity: "trade", id: id.to_string() })
    }

    async fn find_trades_by_auction_and_status(
        &self,
        auction_id: AuctionId,
        status: TradeStatus,
    ) -> Result<Vec<AuctionTrade>, StoreError> {
        Ok(self
            .trades
            .iter()
            .filter(|entry| entry.key().0 == auction_id && entry.value().status == status)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_trades_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionTrade>, StoreError> {
        Ok(self
            .trades
            .iter()
            .filter(|entry| entry.key().0 == auction_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn cas_update_trade(&self, mut trade: AuctionTrade) -> Result<AuctionTrade, StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = (trade.auction_id, trade.id);
        let mut slot = self
            .trades
            .get_mut(&key)
            .ok_or(StoreError::NotFound { entity: "trade", id: trade.id.to_string() })?;
        if slot.version != trade.version {
            return Err(StoreError::StaleVersion { entity: "trade", id: trade.id.to_string() });
        }
        trade.version += 1;
        *slot = trade.clone();
        Ok(trade)
    }

    async fn append_bid_audit(&self, entry: BidAuditEntry) -> Result<(), StoreError> {
        self.bid_audits.entry(entry.auction_id).or_insert_with(Vec::new).push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auction, AuctionConfig, BidIncrementTier, PlayerOrderPolicy, RequeuePolicy};

    fn config() -> AuctionConfig {
        AuctionConfig {
            base_price: 100,
            purse_value: 1000,
            bid_increment_tiers: vec![BidIncrementTier { threshold: 0, increment: 50 }],
            timer_duration_secs: 10,
            bid_reset_timer_secs: 5,
            going_once_timer_secs: 3,
            going_twice_timer_secs: 3,
            min_squad_size: 1,
            max_squad_size: 5,
            retention_enabled: false,
            max_retentions: 0,
            retention_cost: 0,
            trade_window_hours: 48,
            max_trades_per_team: 3,
            trade_settlement_enabled: true,
            max_undo_actions: 5,
            player_order_policy: PlayerOrderPolicy::Sequential,
            requeue_policy: RequeuePolicy::Head,
        }
    }

    /// §4.1 "writes return a typed error distinguishing ... stale_version": a second writer
    /// holding a version already superseded by a concurrent update is rejected, not silently
    /// overwritten.
    #[tokio::test]
    async fn cas_update_auction_rejects_a_stale_version() {
        let store = MemoryStore::new();
        let auction = store.create_auction(Auction::new("s1", config())).await.unwrap();

        let mut first_writer = auction.clone();
        first_writer.status = crate::model::AuctionStatus::Configured;
        store.cas_update_auction(first_writer).await.unwrap();

        let mut second_writer = auction;
        second_writer.status = crate::model::AuctionStatus::Draft;
        let result = store.cas_update_auction(second_writer).await;
        assert!(matches!(result, Err(StoreError::StaleVersion { entity: "auction", .. })));
    }

    /// §4.1 `assign_player_to_team`: a stale version on any one of the three rows aborts the whole
    /// operation — the player must not end up sold with no matching purse deduction.
    #[tokio::test]
    async fn assign_player_to_team_aborts_entirely_on_a_stale_team_version() {
        let store = MemoryStore::new();
        let auction = store.create_auction(Auction::new("s1", config())).await.unwrap();
        let team = store.create_team(AuctionTeam::new(auction.id, "A", "A", 1000)).await.unwrap();
        let player = store.create_player(AuctionPlayer::new(auction.id, 1, "P", "BAT")).await.unwrap();

        // A concurrent write bumps the team's version out from under the pending assignment.
        let mut concurrently_updated_team = team.clone();
        concurrently_updated_team.purse_remaining = 999;
        store.cas_update_team(concurrently_updated_team).await.unwrap();

        let mut sold_player = player.clone();
        sold_player.status = PlayerStatus::Sold;
        sold_player.sold_to = Some(team.id);
        sold_player.sold_amount = Some(100);

        let mut purchasing_team = team.clone();
        purchasing_team.purse_remaining -= 100;

        let result = store
            .assign_player_to_team(AssignPlayerToTeam {
                auction: auction.clone(),
                player: sold_player,
                team: purchasing_team,
                event: NewEvent {
                    auction_id: auction.id,
                    event_type: crate::model::ActionEventType::PlayerSold,
                    payload: serde_json::json!({}),
                    reversal_payload: Some(serde_json::json!({})),
                    performed_by: "system".into(),
                    is_public: true,
                    public_message: None,
                },
            })
            .await;
        assert!(matches!(result, Err(StoreError::StaleVersion { entity: "team", .. })));

        // Nothing committed: the player is still in its pre-assignment state.
        let player_after = store.get_player(auction.id, player.id).await.unwrap();
        assert_eq!(player_after.status, PlayerStatus::Pool);
        assert!(store.tail_events(auction.id, 10).await.unwrap().is_empty());
    }

    /// The success path of the same operation: all three rows update and the event lands in the
    /// journal, in one atomic unit.
    #[tokio::test]
    async fn assign_player_to_team_commits_all_rows_together() {
        let store = MemoryStore::new();
        let auction = store.create_auction(Auction::new("s1", config())).await.unwrap();
        let team = store.create_team(AuctionTeam::new(auction.id, "A", "A", 1000)).await.unwrap();
        let player = store.create_player(AuctionPlayer::new(auction.id, 1, "P", "BAT")).await.unwrap();

        let mut sold_player = player.clone();
        sold_player.status = PlayerStatus::Sold;
        sold_player.sold_to = Some(team.id);
        sold_player.sold_amount = Some(100);

        let mut purchasing_team = team.clone();
        purchasing_team.purse_remaining -= 100;

        let event = store
            .assign_player_to_team(AssignPlayerToTeam {
                auction: auction.clone(),
                player: sold_player,
                team: purchasing_team,
                event: NewEvent {
                    auction_id: auction.id,
                    event_type: crate::model::ActionEventType::PlayerSold,
                    payload: serde_json::json!({}),
                    reversal_payload: Some(serde_json::json!({})),
                    performed_by: "system".into(),
                    is_public: true,
                    public_message: None,
                },
            })
            .await
            .unwrap();

        assert_eq!(event.sequence_number, 1);
        let team_after = store.get_team(auction.id, team.id).await.unwrap();
        assert_eq!(team_after.purse_remaining, 900);
        let player_after = store.get_player(auction.id, player.id).await.unwrap();
        assert_eq!(player_after.status, PlayerStatus::Sold);
    }
}
