//! The Trade Protocol (C6, §4.6): bilateral player swaps between teams during the trade window,
//! with the asymmetric locking rule as the core correctness property — an initiator's offered
//! players are locked the moment they propose, but a counterparty's requested players stay
//! offerable elsewhere until they actually accept.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::errors::EngineError;
use crate::ids::{AuctionId, PlayerId, TeamId, TradeId};
use crate::journal::EventJournal;
use crate::model::{
    ActionEventType, AuctionStatus, AuctionTrade, OwnedLot, PlayerStatus, SettlementDirection,
    TradePlayer, TradeStatus,
};
use crate::store::StateStore;

fn to_trade_players(store_players: &[crate::model::AuctionPlayer]) -> Vec<TradePlayer> {
    store_players
        .iter()
        .map(|p| TradePlayer {
            player_id: p.id,
            name: p.name.clone(),
            role: p.role.clone(),
            sold_amount: p.sold_amount.unwrap_or(0),
        })
        .collect()
}

async fn players_locked_elsewhere(
    store: &Arc<dyn StateStore>,
    auction_id: AuctionId,
    player_ids: &[PlayerId],
    excluding: Option<TradeId>,
) -> Result<bool, EngineError> {
    let all_trades = store.find_trades_by_auction(auction_id).await?;
    for trade in all_trades {
        if Some(trade.id) == excluding {
            continue;
        }
        if !matches!(trade.status, TradeStatus::PendingCounterparty | TradeStatus::BothAgreed) {
            continue;
        }
        if trade.locked_player_ids().iter().any(|id| player_ids.contains(id)) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProposeTrade {
    pub initiator_team_id: TeamId,
    pub counterparty_team_id: TeamId,
    pub initiator_player_ids: Vec<PlayerId>,
    pub counterparty_player_ids: Vec<PlayerId>,
    pub message: Option<String>,
}

pub async fn propose(
    store: &Arc<dyn StateStore>,
    journal: &Arc<EventJournal>,
    auction_id: AuctionId,
    request: ProposeTrade,
) -> Result<AuctionTrade, EngineError> {
    let auction = store.get_auction(auction_id).await?;
    if auction.status != AuctionStatus::TradeWindow {
        return Err(EngineError::StateConflict("trades can only be proposed during the trade window".into()));
    }
    if let Some(ends_at) = auction.trade_window_ends_at {
        if chrono::Utc::now() >= ends_at {
            return Err(EngineError::StateConflict("trade window has expired".into()));
        }
    }

    let executed_trades = store.find_trades_by_auction(auction_id).await?;
    for (team_id, label) in [(request.initiator_team_id, "initiator"), (request.counterparty_team_id, "counterparty")] {
        let executed_count = executed_trades
            .iter()
            .filter(|t| t.status == TradeStatus::Executed && (t.initiator_team_id == team_id || t.counterparty_team_id == team_id))
            .count();
        if executed_count as u32 >= auction.config.max_trades_per_team {
            return Err(EngineError::ResourceExhausted(format!("{label} team has reached its trade cap")));
        }
    }

    let initiator_team = store.get_team(auction_id, request.initiator_team_id).await?;
    let counterparty_team = store.get_team(auction_id, request.counterparty_team_id).await?;

    let mut initiator_players = Vec::with_capacity(request.initiator_player_ids.len());
    for player_id in &request.initiator_player_ids {
        let player = store.get_player(auction_id, *player_id).await?;
        if player.is_disqualified || player.sold_to != Some(request.initiator_team_id) || !initiator_team.owns(*player_id) {
            return Err(EngineError::Validation(format!("player {player_id} is not owned by the initiator")));
        }
        initiator_players.push(player);
    }
    let mut counterparty_players = Vec::with_capacity(request.counterparty_player_ids.len());
    for player_id in &request.counterparty_player_ids {
        let player = store.get_player(auction_id, *player_id).await?;
        if player.is_disqualified || player.sold_to != Some(request.counterparty_team_id) || !counterparty_team.owns(*player_id) {
            return Err(EngineError::Validation(format!("player {player_id} is not owned by the counterparty")));
        }
        counterparty_players.push(player);
    }

    if players_locked_elsewhere(store, auction_id, &request.initiator_player_ids, None).await? {
        return Err(EngineError::StateConflict("one or more initiator players are already locked in another trade".into()));
    }

    let initiator_players = to_trade_players(&initiator_players);
    let counterparty_players = to_trade_players(&counterparty_players);
    let (initiator_total, counterparty_total, settlement_amount, settlement_direction) =
        AuctionTrade::compute_settlement(&initiator_players, &counterparty_players);

    let trade = AuctionTrade {
        id: TradeId::new(),
        auction_id,
        version: 0,
        initiator_team_id: request.initiator_team_id,
        counterparty_team_id: request.counterparty_team_id,
        initiator_players,
        counterparty_players,
        status: TradeStatus::PendingCounterparty,
        initiator_total_value: initiator_total,
        counterparty_total_value: counterparty_total,
        settlement_amount,
        settlement_direction,
        purse_settlement_enabled: auction.config.trade_settlement_enabled,
        public_announcement: request.message,
        status_reason: None,
    };
    let trade = store.create_trade(trade).await?;

    journal
        .append(EventJournal::record(
            ActionEventType::ManualOverride,
            auction_id,
            json!({ "kind": "trade_proposed", "trade_id": trade.id }),
            None,
            request.initiator_team_id.to_string(),
            false,
            None,
        ))
        .await?;

    Ok(trade)
}

/// §4.6 `accept`: re-validates the counterparty's side, locks it, and auto-cancels any other
/// `pending_counterparty` trade that names one of those players as a counterparty candidate.
pub async fn accept(
    store: &Arc<dyn StateStore>,
    journal: &Arc<EventJournal>,
    auction_id: AuctionId,
    trade_id: TradeId,
) -> Result<AuctionTrade, EngineError> {
    let mut trade = store.get_trade(auction_id, trade_id).await?;
    if trade.status != TradeStatus::PendingCounterparty {
        return Err(EngineError::StateConflict("trade is not awaiting counterparty acceptance".into()));
    }

    let counterparty_team = store.get_team(auction_id, trade.counterparty_team_id).await?;
    for tp in &trade.counterparty_players {
        let player = store.get_player(auction_id, tp.player_id).await?;
        if player.is_disqualified || !counterparty_team.owns(tp.player_id) {
            trade.status = TradeStatus::Rejected;
            trade.status_reason = Some("counterparty no longer owns the requested players".into());
            return Ok(store.cas_update_trade(trade).await?);
        }
    }
    let counterparty_player_ids: Vec<PlayerId> = trade.counterparty_players.iter().map(|p| p.player_id).collect();
    if players_locked_elsewhere(store, auction_id, &counterparty_player_ids, Some(trade_id)).await? {
        trade.status = TradeStatus::Rejected;
        trade.status_reason = Some("counterparty players are already locked in another trade".into());
        return Ok(store.cas_update_trade(trade).await?);
    }

    trade.status = TradeStatus::BothAgreed;
    let trade = store.cas_update_trade(trade).await?;

    let all_trades = store.find_trades_by_auction(auction_id).await?;
    for mut other in all_trades {
        if other.id == trade_id || other.status != TradeStatus::PendingCounterparty {
            continue;
        }
        let overlaps = other.counterparty_players.iter().any(|p| counterparty_player_ids.contains(&p.player_id));
        if overlaps {
            other.status = TradeStatus::Cancelled;
            other.status_reason = Some(format!("players committed to trade {trade_id}"));
            store.cas_update_trade(other).await?;
        }
    }

    journal
        .append(EventJournal::record(
            ActionEventType::ManualOverride,
            auction_id,
            json!({ "kind": "trade_accepted", "trade_id": trade.id }),
            None,
            trade.counterparty_team_id.to_string(),
            false,
            None,
        ))
        .await?;

    Ok(trade)
}

async fn terminate(
    store: &Arc<dyn StateStore>,
    auction_id: AuctionId,
    trade_id: TradeId,
    status: TradeStatus,
    reason: impl Into<String>,
) -> Result<AuctionTrade, EngineError> {
    let mut trade = store.get_trade(auction_id, trade_id).await?;
    if matches!(trade.status, TradeStatus::Executed | TradeStatus::Rejected | TradeStatus::Withdrawn | TradeStatus::Cancelled | TradeStatus::Expired) {
        return Err(EngineError::StateConflict("trade is already in a terminal state".into()));
    }
    trade.status = status;
    trade.status_reason = Some(reason.into());
    Ok(store.cas_update_trade(trade).await?)
}

pub async fn reject(store: &Arc<dyn StateStore>, auction_id: AuctionId, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
    terminate(store, auction_id, trade_id, TradeStatus::Rejected, "rejected by counterparty").await
}

pub async fn withdraw(store: &Arc<dyn StateStore>, auction_id: AuctionId, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
    terminate(store, auction_id, trade_id, TradeStatus::Withdrawn, "withdrawn by initiator").await
}

pub async fn admin_reject(store: &Arc<dyn StateStore>, auction_id: AuctionId, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
    terminate(store, auction_id, trade_id, TradeStatus::Rejected, "rejected by admin").await
}

/// The ownership swap shared by `execute` and `admin_initiate`: re-validates ownership, swaps
/// `soldTo` and each team's `players[]` entries, and applies purse settlement iff enabled and
/// affordable (§4.6 `execute`).
async fn apply_execution(
    store: &Arc<dyn StateStore>,
    journal: &Arc<EventJournal>,
    mut trade: AuctionTrade,
) -> Result<AuctionTrade, EngineError> {
    let mut initiator_team = store.get_team(trade.auction_id, trade.initiator_team_id).await?;
    let mut counterparty_team = store.get_team(trade.auction_id, trade.counterparty_team_id).await?;

    for tp in &trade.initiator_players {
        if !initiator_team.owns(tp.player_id) {
            trade.status = TradeStatus::Rejected;
            trade.status_reason = Some("ownership changed".into());
            return Ok(store.cas_update_trade(trade).await?);
        }
    }
    for tp in &trade.counterparty_players {
        if !counterparty_team.owns(tp.player_id) {
            trade.status = TradeStatus::Rejected;
            trade.status_reason = Some("ownership changed".into());
            return Ok(store.cas_update_trade(trade).await?);
        }
    }

    let now = chrono::Utc::now();
    for tp in &trade.initiator_players {
        initiator_team.players.retain(|lot| lot.player_id != tp.player_id);
        counterparty_team.players.push(OwnedLot { player_id: tp.player_id, bought_at: tp.sold_amount, round: counterparty_team.squad_size() + 1, timestamp: now });
        let mut player = store.get_player(trade.auction_id, tp.player_id).await?;
        player.sold_to = Some(trade.counterparty_team_id);
        store.cas_update_player(player).await?;
    }
    for tp in &trade.counterparty_players {
        counterparty_team.players.retain(|lot| lot.player_id != tp.player_id);
        initiator_team.players.push(OwnedLot { player_id: tp.player_id, bought_at: tp.sold_amount, round: initiator_team.squad_size() + 1, timestamp: now });
        let mut player = store.get_player(trade.auction_id, tp.player_id).await?;
        player.sold_to = Some(trade.initiator_team_id);
        store.cas_update_player(player).await?;
    }

    let mut settlement_applied = false;
    if trade.purse_settlement_enabled && trade.settlement_amount > 0 {
        let (payer, payee) = match trade.settlement_direction {
            SettlementDirection::InitiatorPays => (&mut initiator_team, &mut counterparty_team),
            SettlementDirection::CounterpartyPays => (&mut counterparty_team, &mut initiator_team),
            SettlementDirection::Even => (&mut initiator_team, &mut counterparty_team),
        };
        if !matches!(trade.settlement_direction, SettlementDirection::Even) && payer.purse_remaining >= trade.settlement_amount {
            payer.purse_remaining -= trade.settlement_amount;
            payee.purse_remaining += trade.settlement_amount;
            settlement_applied = true;
        }
    }

    store.cas_update_team(initiator_team).await?;
    store.cas_update_team(counterparty_team).await?;

    trade.status = TradeStatus::Executed;
    let trade = store.cas_update_trade(trade).await?;

    journal
        .append(EventJournal::record(
            ActionEventType::TradeExecuted,
            trade.auction_id,
            json!({
                "trade_id": trade.id,
                "initiator_team_id": trade.initiator_team_id,
                "counterparty_team_id": trade.counterparty_team_id,
                "settlement_applied": settlement_applied,
            }),
            Some(json!({ "trade_id": trade.id })),
            "admin",
            true,
            trade.public_announcement.clone(),
        ))
        .await?;

    Ok(trade)
}

pub async fn execute(store: &Arc<dyn StateStore>, journal: &Arc<EventJournal>, auction_id: AuctionId, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
    let trade = store.get_trade(auction_id, trade_id).await?;
    if !matches!(trade.status, TradeStatus::BothAgreed) {
        return Err(EngineError::StateConflict("trade must be both_agreed before it can execute".into()));
    }
    apply_execution(store, journal, trade).await
}

/// §4.6 `admin-initiate`: bypasses counterparty acceptance, valid in `trade_window`, `completed`,
/// or `paused`.
pub async fn admin_initiate(
    store: &Arc<dyn StateStore>,
    journal: &Arc<EventJournal>,
    auction_id: AuctionId,
    request: ProposeTrade,
) -> Result<AuctionTrade, EngineError> {
    let auction = store.get_auction(auction_id).await?;
    if !matches!(auction.status, AuctionStatus::TradeWindow | AuctionStatus::Completed | AuctionStatus::Paused) {
        return Err(EngineError::StateConflict("admin-initiated trades require trade_window, completed, or paused".into()));
    }

    let initiator_team = store.get_team(auction_id, request.initiator_team_id).await?;
    let counterparty_team = store.get_team(auction_id, request.counterparty_team_id).await?;

    let mut initiator_players = Vec::with_capacity(request.initiator_player_ids.len());
    for player_id in &request.initiator_player_ids {
        let player = store.get_player(auction_id, *player_id).await?;
        if !initiator_team.owns(*player_id) {
            return Err(EngineError::Validation(format!("player {player_id} is not owned by the initiator")));
        }
        initiator_players.push(player);
    }
    let mut counterparty_players = Vec::with_capacity(request.counterparty_player_ids.len());
    for player_id in &request.counterparty_player_ids {
        let player = store.get_player(auction_id, *player_id).await?;
        if !counterparty_team.owns(*player_id) {
            return Err(EngineError::Validation(format!("player {player_id} is not owned by the counterparty")));
        }
        counterparty_players.push(player);
    }

    let initiator_players = to_trade_players(&initiator_players);
    let counterparty_players = to_trade_players(&counterparty_players);
    let (initiator_total, counterparty_total, settlement_amount, settlement_direction) =
        AuctionTrade::compute_settlement(&initiator_players, &counterparty_players);

    let trade = AuctionTrade {
        id: TradeId::new(),
        auction_id,
        version: 0,
        initiator_team_id: request.initiator_team_id,
        counterparty_team_id: request.counterparty_team_id,
        initiator_players,
        counterparty_players,
        status: TradeStatus::BothAgreed,
        initiator_total_value: initiator_total,
        counterparty_total_value: counterparty_total,
        settlement_amount,
        settlement_direction,
        purse_settlement_enabled: auction.config.trade_settlement_enabled,
        public_announcement: request.message,
        status_reason: None,
    };
    let trade = store.create_trade(trade).await?;
    apply_execution(store, journal, trade).await
}

/// §4.5 `finalize`: every trade still open when the auction finalizes expires.
pub async fn expire_pending(store: &Arc<dyn StateStore>, auction_id: AuctionId) -> Result<(), EngineError> {
    let trades = store.find_trades_by_auction(auction_id).await?;
    for mut trade in trades {
        if matches!(trade.status, TradeStatus::PendingCounterparty | TradeStatus::BothAgreed) {
            trade.status = TradeStatus::Expired;
            trade.status_reason = Some("auction finalized".into());
            store.cas_update_trade(trade).await?;
        }
    }
    Ok(())
}

/// Unwinds a `TRADE_EXECUTED` event: swaps ownership back and reverses any purse settlement.
pub async fn undo_execution(store: &Arc<dyn StateStore>, auction_id: AuctionId, payload: &serde_json::Value) -> Result<(), EngineError> {
    let trade_id: TradeId = serde_json::from_value(payload["trade_id"].clone())
        .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
    let trade = store.get_trade(auction_id, trade_id).await?;
    if trade.status != TradeStatus::Executed {
        return Err(EngineError::InvariantViolation("trade is not in an executed state to undo".into()));
    }

    let mut initiator_team = store.get_team(auction_id, trade.initiator_team_id).await?;
    let mut counterparty_team = store.get_team(auction_id, trade.counterparty_team_id).await?;
    let now = chrono::Utc::now();

    for tp in &trade.initiator_players {
        counterparty_team.players.retain(|lot| lot.player_id != tp.player_id);
        initiator_team.players.push(OwnedLot { player_id: tp.player_id, bought_at: tp.sold_amount, round: initiator_team.squad_size() + 1, timestamp: now });
        let mut player = store.get_player(auction_id, tp.player_id).await?;
        player.sold_to = Some(trade.initiator_team_id);
        store.cas_update_player(player).await?;
    }
    for tp in &trade.counterparty_players {
        initiator_team.players.retain(|lot| lot.player_id != tp.player_id);
        counterparty_team.players.push(OwnedLot { player_id: tp.player_id, bought_at: tp.sold_amount, round: counterparty_team.squad_size() + 1, timestamp: now });
        let mut player = store.get_player(auction_id, tp.player_id).await?;
        player.sold_to = Some(trade.counterparty_team_id);
        store.cas_update_player(player).await?;
    }

    if trade.purse_settlement_enabled && trade.settlement_amount > 0 {
        match trade.settlement_direction {
            SettlementDirection::InitiatorPays => {
                initiator_team.purse_remaining += trade.settlement_amount;
                counterparty_team.purse_remaining -= trade.settlement_amount;
            }
            SettlementDirection::CounterpartyPays => {
                counterparty_team.purse_remaining += trade.settlement_amount;
                initiator_team.purse_remaining -= trade.settlement_amount;
            }
            SettlementDirection::Even => {}
        }
    }

    store.cas_update_team(initiator_team).await?;
    store.cas_update_team(counterparty_team).await?;

    let mut trade = trade;
    trade.status = TradeStatus::Cancelled;
    trade.status_reason = Some("reversed by undo".into());
    store.cas_update_trade(trade).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Auction, AuctionConfig, AuctionPlayer, AuctionTeam, BidIncrementTier, OwnedLot};
    use crate::store::MemoryStore;

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
            player_order_policy: Default::default(),
            requeue_policy: Default::default(),
        }
    }

    /// Sets up a `trade_window` auction with three teams (A, B, C) and one sold player owned by
    /// each of A and B, priced so that a trade between them settles for a non-zero amount.
    async fn setup() -> (Arc<dyn StateStore>, Arc<EventJournal>, AuctionId, TeamId, TeamId, TeamId, PlayerId, PlayerId) {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let journal = Arc::new(EventJournal::new(store.clone()));

        let mut auction = Auction::new("trades", config());
        auction.status = AuctionStatus::TradeWindow;
        auction.trade_window_ends_at = Some(chrono::Utc::now() + chrono::Duration::hours(48));
        let auction = store.create_auction(auction).await.unwrap();

        let team_a = store.create_team(AuctionTeam::new(auction.id, "Team A", "A", 1000)).await.unwrap();
        let team_b = store.create_team(AuctionTeam::new(auction.id, "Team B", "B", 1000)).await.unwrap();
        let team_c = store.create_team(AuctionTeam::new(auction.id, "Team C", "C", 1000)).await.unwrap();

        let mut player_a = AuctionPlayer::new(auction.id, 1, "Player A", "BAT");
        player_a.status = PlayerStatus::Sold;
        player_a.sold_to = Some(team_a.id);
        player_a.sold_amount = Some(200);
        let player_a = store.create_player(player_a).await.unwrap();

        let mut player_b = AuctionPlayer::new(auction.id, 2, "Player B", "BOWL");
        player_b.status = PlayerStatus::Sold;
        player_b.sold_to = Some(team_b.id);
        player_b.sold_amount = Some(150);
        let player_b = store.create_player(player_b).await.unwrap();

        let mut team_a = store.get_team(auction.id, team_a.id).await.unwrap();
        team_a.players.push(OwnedLot { player_id: player_a.id, bought_at: 200, round: 1, timestamp: chrono::Utc::now() });
        store.cas_update_team(team_a).await.unwrap();

        let mut team_b = store.get_team(auction.id, team_b.id).await.unwrap();
        team_b.players.push(OwnedLot { player_id: player_b.id, bought_at: 150, round: 1, timestamp: chrono::Utc::now() });
        store.cas_update_team(team_b).await.unwrap();

        (store, journal, auction.id, team_a.id, team_b.id, team_c.id, player_a.id, player_b.id)
    }

    fn propose_a_for_b(team_a: TeamId, team_b: TeamId, player_a: PlayerId, player_b: PlayerId) -> ProposeTrade {
        ProposeTrade {
            initiator_team_id: team_a,
            counterparty_team_id: team_b,
            initiator_player_ids: vec![player_a],
            counterparty_player_ids: vec![player_b],
            message: None,
        }
    }

    /// §8 scenario S3: the initiator's player is locked out from other trades immediately on
    /// proposal, but the counterparty's player stays available until they accept — at which
    /// point a competing trade naming that same player is auto-cancelled.
    #[tokio::test]
    async fn asymmetric_locking_cancels_the_losing_competing_trade_on_accept() {
        let (store, journal, auction_id, team_a, team_b, team_c, player_a, player_b) = setup().await;

        let first = propose(&store, &journal, auction_id, propose_a_for_b(team_a, team_b, player_a, player_b)).await.unwrap();
        assert_eq!(first.status, TradeStatus::PendingCounterparty);

        // A second trade for player_b (still unlocked on the counterparty side) is allowed.
        let mut player_c = AuctionPlayer::new(auction_id, 3, "Player C", "ALL");
        player_c.status = PlayerStatus::Sold;
        player_c.sold_to = Some(team_c.id);
        player_c.sold_amount = Some(120);
        let player_c = store.create_player(player_c).await.unwrap();
        let mut team_c_row = store.get_team(auction_id, team_c).await.unwrap();
        team_c_row.players.push(OwnedLot { player_id: player_c.id, bought_at: 120, round: 1, timestamp: chrono::Utc::now() });
        store.cas_update_team(team_c_row).await.unwrap();

        let second = propose(&store, &journal, auction_id, ProposeTrade {
            initiator_team_id: team_c,
            counterparty_team_id: team_b,
            initiator_player_ids: vec![player_c.id],
            counterparty_player_ids: vec![player_b],
            message: None,
        })
        .await
        .unwrap();
        assert_eq!(second.status, TradeStatus::PendingCounterparty);

        // Accepting the first trade locks player_b on the counterparty side and auto-cancels the
        // second trade, which named the same now-committed player.
        let accepted = accept(&store, &journal, auction_id, first.id).await.unwrap();
        assert_eq!(accepted.status, TradeStatus::BothAgreed);

        let second_after = store.get_trade(auction_id, second.id).await.unwrap();
        assert_eq!(second_after.status, TradeStatus::Cancelled);
        assert!(second_after.status_reason.as_ref().unwrap().contains(&first.id.to_string()));
    }

    /// Proposing an initiator offer that's already locked as someone else's initiator offer is
    /// rejected outright (`players_locked_elsewhere` covers both proposal sides).
    #[tokio::test]
    async fn proposing_an_already_locked_initiator_player_is_rejected() {
        let (store, journal, auction_id, team_a, team_b, _team_c, player_a, player_b) = setup().await;
        propose(&store, &journal, auction_id, propose_a_for_b(team_a, team_b, player_a, player_b)).await.unwrap();

        let mut player_a2 = AuctionPlayer::new(auction_id, 9, "Player A2", "BAT");
        player_a2.status = PlayerStatus::Sold;
        player_a2.sold_to = Some(team_a);
        player_a2.sold_amount = Some(80);
        let player_a2 = store.create_player(player_a2).await.unwrap();
        let mut team_a_row = store.get_team(auction_id, team_a).await.unwrap();
        team_a_row.players.push(OwnedLot { player_id: player_a2.id, bought_at: 80, round: 2, timestamp: chrono::Utc::now() });
        store.cas_update_team(team_a_row).await.unwrap();

        let result = propose(&store, &journal, auction_id, ProposeTrade {
            initiator_team_id: team_a,
            counterparty_team_id: team_b,
            initiator_player_ids: vec![player_a, player_a2.id],
            counterparty_player_ids: vec![player_b],
            message: None,
        })
        .await;
        assert!(matches!(result, Err(EngineError::StateConflict(_))));
    }

    /// Full propose -> accept -> execute flow settles ownership swap and purse delta (player_a
    /// sold for 200, player_b for 150, so team_b owes team_a 50 on execution).
    #[tokio::test]
    async fn propose_accept_execute_swaps_ownership_and_settles_purses() {
        let (store, journal, auction_id, team_a, team_b, _team_c, player_a, player_b) = setup().await;

        let trade = propose(&store, &journal, auction_id, propose_a_for_b(team_a, team_b, player_a, player_b)).await.unwrap();
        let trade = accept(&store, &journal, auction_id, trade.id).await.unwrap();
        assert_eq!(trade.settlement_direction, SettlementDirection::CounterpartyPays);
        assert_eq!(trade.settlement_amount, 50);

        let executed = execute(&store, &journal, auction_id, trade.id).await.unwrap();
        assert_eq!(executed.status, TradeStatus::Executed);

        let team_a_after = store.get_team(auction_id, team_a).await.unwrap();
        let team_b_after = store.get_team(auction_id, team_b).await.unwrap();
        assert!(team_a_after.owns(player_b));
        assert!(team_b_after.owns(player_a));
        assert!(!team_a_after.owns(player_a));
        assert!(!team_b_after.owns(player_b));
        assert_eq!(team_a_after.purse_remaining, 1050);
        assert_eq!(team_b_after.purse_remaining, 950);

        let player_a_after = store.get_player(auction_id, player_a).await.unwrap();
        let player_b_after = store.get_player(auction_id, player_b).await.unwrap();
        assert_eq!(player_a_after.sold_to, Some(team_b));
        assert_eq!(player_b_after.sold_to, Some(team_a));
    }

    /// §4.5 `finalize`: any trade still `pending_counterparty` or `both_agreed` when the auction
    /// finalizes is swept to `expired` rather than left dangling.
    #[tokio::test]
    async fn finalize_expires_pending_trades() {
        let (store, journal, auction_id, team_a, team_b, _team_c, player_a, player_b) = setup().await;
        let trade = propose(&store, &journal, auction_id, propose_a_for_b(team_a, team_b, player_a, player_b)).await.unwrap();

        expire_pending(&store, auction_id).await.unwrap();

        let after = store.get_trade(auction_id, trade.id).await.unwrap();
        assert_eq!(after.status, TradeStatus::Expired);
    }
}
