//! The Lifecycle Coordinator (C5, §4.5): drives the auction status machine, player progression,
//! and the reversible operations (sale/unsold, return-to-pool, disqualify, admin purse
//! adjustment, undo). Every method here assumes it is being called from inside the owning
//! auction's single-threaded coordinator loop (§5) — none of it takes its own lock, because the
//! coordinator's FIFO inbox is the lock.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use serde_json::json;

use crate::arbiter::{self, BidAttempt, BidOutcome};
use crate::errors::{BidRejectionReason, EngineError};
use crate::ids::{AuctionId, PlayerId, TeamId};
use crate::journal::EventJournal;
use crate::model::{
    ActionEventType, Auction, AuctionConfig, AuctionPlayer, AuctionStatus, AuctionTeam,
    OwnedLot, PlayerOrderPolicy, PlayerStatus, RequeuePolicy, TimerPhase,
};
use crate::store::{AssignPlayerToTeam, StateStore};
use crate::timer::PhaseTimer;

#[derive(Debug, Serialize)]
pub struct BidResult {
    pub auction: Auction,
    pub accepted: bool,
    pub rejection: Option<BidRejectionReason>,
}

pub struct TerminalOutcome {
    pub auction: Auction,
    pub player: AuctionPlayer,
    pub team: Option<AuctionTeam>,
    pub sold: bool,
}

pub struct Lifecycle {
    store: Arc<dyn StateStore>,
    journal: Arc<EventJournal>,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn StateStore>, journal: Arc<EventJournal>) -> Self {
        Self { store, journal }
    }

    pub async fn create_auction(&self, slug: impl Into<String>, config: AuctionConfig) -> Result<Auction, EngineError> {
        let auction = Auction::new(slug, config);
        let auction = self.store.create_auction(auction).await?;
        self.journal
            .append(EventJournal::record(
                ActionEventType::AuctionCreated,
                auction.id,
                json!({ "slug": auction.slug }),
                None,
                "system",
                true,
                None,
            ))
            .await?;
        Ok(auction)
    }

    pub async fn update_config(&self, auction_id: AuctionId, config: AuctionConfig) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if auction.status != AuctionStatus::Draft {
            return Err(EngineError::StateConflict("config can only change while draft".into()));
        }
        auction.config = config;
        Ok(self.store.cas_update_auction(auction).await?)
    }

    /// §4.5 `configure`: requires >= 2 active teams and |pool players| >= |teams|.
    pub async fn configure(&self, auction_id: AuctionId) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if auction.status != AuctionStatus::Draft {
            return Err(EngineError::StateConflict("auction must be draft to configure".into()));
        }

        let teams = self.store.find_teams_by_auction(auction_id).await?;
        let active_teams = teams.iter().filter(|t| t.is_active).count();
        if active_teams < 2 {
            return Err(EngineError::Validation("at least 2 active teams are required".into()));
        }

        let pool = self.store.find_players_by_auction_and_status(auction_id, PlayerStatus::Pool).await?;
        if pool.len() < active_teams {
            return Err(EngineError::Validation("pool must have at least as many players as teams".into()));
        }

        auction.status = AuctionStatus::Configured;
        let auction = self.store.cas_update_auction(auction).await?;
        self.journal
            .append(EventJournal::record(
                ActionEventType::AuctionConfigured,
                auction.id,
                json!({}),
                None,
                "admin",
                true,
                None,
            ))
            .await?;
        Ok(auction)
    }

    /// §4.5 `start`: snapshots the pool into `remainingPlayerIds`, arms the timer for the first
    /// player.
    pub async fn go_live(&self, auction_id: AuctionId, timer: &mut PhaseTimer) -> Result<(Auction, AuctionPlayer), EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if auction.status != AuctionStatus::Configured {
            return Err(EngineError::StateConflict("auction must be configured to go live".into()));
        }

        let mut pool = self.store.find_players_by_auction_and_status(auction_id, PlayerStatus::Pool).await?;
        match auction.config.player_order_policy {
            PlayerOrderPolicy::Sequential => pool.sort_by_key(|p| p.player_number),
            PlayerOrderPolicy::Randomized => pool.shuffle(&mut rand::thread_rng()),
        }
        let mut order: VecDeque<PlayerId> = pool.iter().map(|p| p.id).collect();

        let first_id = order.pop_front().ok_or_else(|| EngineError::Validation("no players in pool".into()))?;
        let mut first_player = self.store.get_player(auction_id, first_id).await?;
        first_player.status = PlayerStatus::Live;
        let first_player = self.store.cas_update_player(first_player).await?;

        auction.status = AuctionStatus::Live;
        auction.remaining_player_ids = order;
        auction.current_player_id = Some(first_id);
        auction.current_bid_amount = None;
        auction.current_bidder_team_id = None;
        auction.current_timer_phase = Some(TimerPhase::Running);
        let auction = self.store.cas_update_auction(auction).await?;

        timer.arm_for_live_player();

        self.journal
            .append(EventJournal::record(
                ActionEventType::AuctionStarted,
                auction.id,
                json!({}),
                None,
                "admin",
                true,
                None,
            ))
            .await?;
        self.journal
            .append(EventJournal::record(
                ActionEventType::PlayerLive,
                auction.id,
                json!({ "player_id": first_id }),
                None,
                "system",
                true,
                None,
            ))
            .await?;

        Ok((auction, first_player))
    }

    /// §4.4: runs the Arbiter's preconditions and, on acceptance, commits the new bid; on
    /// rejection, only the audit log is written and the timer is left untouched.
    pub async fn record_bid(
        &self,
        auction_id: AuctionId,
        attempt: BidAttempt,
        timer: &mut PhaseTimer,
    ) -> Result<BidResult, EngineError> {
        let auction = self.store.get_auction(auction_id).await?;
        let player_id = auction
            .current_player_id
            .ok_or(EngineError::StateConflict("no player is currently live".into()))?;
        let player = self.store.get_player(auction_id, player_id).await?;
        let team = self.store.get_team(auction_id, attempt.team_id).await?;

        match arbiter::evaluate(&auction, &player, &team, &attempt) {
            BidOutcome::Rejected(reason) => {
                self.store
                    .append_bid_audit(crate::model::BidAuditEntry {
                        auction_id,
                        player_id,
                        team_id: attempt.team_id,
                        attempted_amount: attempt.attempted_amount,
                        entry_type: crate::model::BidAuditType::BidRejected,
                        reason: Some(reason.to_string()),
                        timestamp: chrono::Utc::now(),
                    })
                    .await?;
                self.journal
                    .append(EventJournal::record(
                        ActionEventType::BidRejected,
                        auction_id,
                        json!({ "player_id": player_id, "team_id": attempt.team_id, "attempted_amount": attempt.attempted_amount, "reason": reason }),
                        None,
                        attempt.team_id.to_string(),
                        false,
                        None,
                    ))
                    .await?;
                Ok(BidResult { auction, accepted: false, rejection: Some(reason) })
            }
            BidOutcome::Accepted(accepted) => {
                let mut attempted_write = auction.clone();
                attempted_write.current_bid_amount = Some(accepted.amount);
                attempted_write.current_bidder_team_id = Some(accepted.bidder_team_id);
                attempted_write.current_timer_phase = Some(TimerPhase::Running);

                // §4.1 "a stale-version CAS collision retries at most once": someone else wrote
                // this auction between our read and our write (e.g. a concurrent admin action).
                // Re-fetch and re-run the Arbiter against current state before giving up.
                let (auction, accepted) = match self.store.cas_update_auction(attempted_write).await {
                    Ok(auction) => (auction, accepted),
                    Err(crate::store::StoreError::StaleVersion { .. }) => {
                        let auction = self.store.get_auction(auction_id).await?;
                        let player = self.store.get_player(auction_id, player_id).await?;
                        let team = self.store.get_team(auction_id, attempt.team_id).await?;
                        match arbiter::evaluate(&auction, &player, &team, &attempt) {
                            BidOutcome::Rejected(reason) => {
                                self.store
                                    .append_bid_audit(crate::model::BidAuditEntry {
                                        auction_id,
                                        player_id,
                                        team_id: attempt.team_id,
                                        attempted_amount: attempt.attempted_amount,
                                        entry_type: crate::model::BidAuditType::BidRejected,
                                        reason: Some(reason.to_string()),
                                        timestamp: chrono::Utc::now(),
                                    })
                                    .await?;
                                self.journal
                                    .append(EventJournal::record(
                                        ActionEventType::BidRejected,
                                        auction_id,
                                        json!({ "player_id": player_id, "team_id": attempt.team_id, "attempted_amount": attempt.attempted_amount, "reason": reason }),
                                        None,
                                        attempt.team_id.to_string(),
                                        false,
                                        None,
                                    ))
                                    .await?;
                                return Ok(BidResult { auction, accepted: false, rejection: Some(reason) });
                            }
                            BidOutcome::Accepted(accepted) => {
                                let mut retried_write = auction.clone();
                                retried_write.current_bid_amount = Some(accepted.amount);
                                retried_write.current_bidder_team_id = Some(accepted.bidder_team_id);
                                retried_write.current_timer_phase = Some(TimerPhase::Running);
                                let auction = self.store.cas_update_auction(retried_write).await?;
                                (auction, accepted)
                            }
                        }
                    }
                    Err(err) => return Err(err.into()),
                };

                timer.reset_on_bid();

                self.store
                    .append_bid_audit(crate::model::BidAuditEntry {
                        auction_id,
                        player_id,
                        team_id: accepted.bidder_team_id,
                        attempted_amount: accepted.amount,
                        entry_type: crate::model::BidAuditType::BidAccepted,
                        reason: None,
                        timestamp: chrono::Utc::now(),
                    })
                    .await?;
                self.journal
                    .append(EventJournal::record(
                        ActionEventType::BidAccepted,
                        auction_id,
                        json!({ "player_id": player_id, "team_id": accepted.bidder_team_id, "amount": accepted.amount }),
                        None,
                        accepted.bidder_team_id.to_string(),
                        true,
                        None,
                    ))
                    .await?;

                Ok(BidResult { auction, accepted: true, rejection: None })
            }
        }
    }

    /// Called by the coordinator when the armed phase's deadline elapses with no intervening bid
    /// (§4.3). Returns `Some` while the timer just advanced to the next phase; `None` once
    /// `going_twice` itself expired, in which case the terminal outcome has already been applied.
    pub async fn phase_expired(
        &self,
        auction_id: AuctionId,
        timer: &mut PhaseTimer,
    ) -> Result<Option<TerminalOutcome>, EngineError> {
        if let Some(next_phase) = timer.advance() {
            let mut auction = self.store.get_auction(auction_id).await?;
            auction.current_timer_phase = Some(next_phase);
            let auction = self.store.cas_update_auction(auction).await?;
            self.journal
                .append(EventJournal::record(
                    ActionEventType::PhaseAdvanced,
                    auction_id,
                    json!({ "phase": next_phase }),
                    None,
                    "system",
                    true,
                    None,
                ))
                .await?;
            let _ = auction;
            return Ok(None);
        }

        Ok(Some(self.declare_terminal_outcome(auction_id).await?))
    }

    /// §4.5 "terminal outcome on timer expiry": sale if there's a standing bid, otherwise unsold.
    async fn declare_terminal_outcome(&self, auction_id: AuctionId) -> Result<TerminalOutcome, EngineError> {
        let auction = self.store.get_auction(auction_id).await?;
        let player_id = auction
            .current_player_id
            .ok_or(EngineError::InvariantViolation("timer expired with no live player".into()))?;
        let player = self.store.get_player(auction_id, player_id).await?;

        let outcome = if let Some(bidder_id) = auction.current_bidder_team_id {
            let team = self.store.get_team(auction_id, bidder_id).await?;
            let amount = auction
                .current_bid_amount
                .ok_or(EngineError::InvariantViolation("bidder set without a bid amount".into()))?;

            let mut sold_player = player.clone();
            sold_player.status = PlayerStatus::Sold;
            sold_player.sold_to = Some(bidder_id);
            sold_player.sold_amount = Some(amount);
            sold_player.sold_in_round = Some(team.squad_size() + 1);

            let mut sold_team = team.clone();
            sold_team.purse_remaining -= amount;
            sold_team.players.push(OwnedLot {
                player_id,
                bought_at: amount,
                round: sold_team.squad_size() + 1,
                timestamp: chrono::Utc::now(),
            });

            let mut next_auction = auction.clone();
            next_auction.current_player_id = None;
            next_auction.current_bid_amount = None;
            next_auction.current_bidder_team_id = None;
            next_auction.current_timer_phase = None;

            let event = self
                .store
                .assign_player_to_team(AssignPlayerToTeam {
                    auction: next_auction,
                    player: sold_player.clone(),
                    team: sold_team.clone(),
                    event: crate::store::NewEvent {
                        auction_id,
                        event_type: ActionEventType::PlayerSold,
                        payload: json!({ "player_id": player_id, "team_id": bidder_id, "amount": amount }),
                        reversal_payload: Some(json!({
                            "player_id": player_id,
                            "team_id": bidder_id,
                            "amount": amount,
                            "previous_status": "live",
                        })),
                        performed_by: "system".into(),
                        is_public: true,
                        public_message: None,
                    },
                })
                .await?;
            let _ = event;

            TerminalOutcome {
                auction: self.store.get_auction(auction_id).await?,
                player: sold_player,
                team: Some(sold_team),
                sold: true,
            }
        } else {
            let mut unsold_player = player.clone();
            unsold_player.status = PlayerStatus::Unsold;

            let unsold_player = self.store.cas_update_player(unsold_player).await?;

            let mut next_auction = auction.clone();
            next_auction.current_player_id = None;
            next_auction.current_bid_amount = None;
            next_auction.current_bidder_team_id = None;
            next_auction.current_timer_phase = None;
            let next_auction = self.store.cas_update_auction(next_auction).await?;

            self.journal
                .append(EventJournal::record(
                    ActionEventType::PlayerUnsold,
                    auction_id,
                    json!({ "player_id": player_id }),
                    Some(json!({ "player_id": player_id, "previous_status": "live" })),
                    "system",
                    true,
                    None,
                ))
                .await?;

            TerminalOutcome { auction: next_auction, player: unsold_player, team: None, sold: false }
        };

        Ok(outcome)
    }

    /// §4.5 `next-player`: called by the coordinator right after a terminal outcome. Selects the
    /// head of `remainingPlayerIds`, skipping any disqualified along the way; completes the
    /// auction once the queue is empty.
    pub async fn advance_to_next_player(
        &self,
        auction_id: AuctionId,
        timer: &mut PhaseTimer,
    ) -> Result<Option<AuctionPlayer>, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;

        loop {
            let Some(candidate_id) = auction.remaining_player_ids.pop_front() else {
                timer.disarm();
                auction.status = AuctionStatus::Completed;
                auction.current_timer_phase = None;
                let auction = self.store.cas_update_auction(auction).await?;
                self.journal
                    .append(EventJournal::record(
                        ActionEventType::AuctionCompleted,
                        auction.id,
                        json!({}),
                        None,
                        "system",
                        true,
                        None,
                    ))
                    .await?;
                return Ok(None);
            };

            let candidate = self.store.get_player(auction_id, candidate_id).await?;
            if candidate.status != PlayerStatus::Pool {
                continue;
            }

            let mut live = candidate;
            live.status = PlayerStatus::Live;
            let live = self.store.cas_update_player(live).await?;

            auction.current_player_id = Some(live.id);
            auction.current_bid_amount = None;
            auction.current_bidder_team_id = None;
            auction.current_timer_phase = Some(TimerPhase::Running);
            self.store.cas_update_auction(auction).await?;

            timer.arm_for_live_player();

            self.journal
                .append(EventJournal::record(
                    ActionEventType::PlayerLive,
                    auction_id,
                    json!({ "player_id": live.id }),
                    None,
                    "system",
                    true,
                    None,
                ))
                .await?;

            return Ok(Some(live));
        }
    }

    pub async fn pause(&self, auction_id: AuctionId, timer: &mut PhaseTimer) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if auction.status != AuctionStatus::Live {
            return Err(EngineError::StateConflict("auction must be live to pause".into()));
        }
        timer.disarm();
        auction.status = AuctionStatus::Paused;
        auction.current_timer_phase = None;
        let auction = self.store.cas_update_auction(auction).await?;
        self.journal
            .append(EventJournal::record(ActionEventType::AuctionPaused, auction.id, json!({}), None, "admin", true, None))
            .await?;
        Ok(auction)
    }

    /// §4.5 `resume`: does not reuse any remaining time — a fresh `running` phase begins.
    pub async fn resume(&self, auction_id: AuctionId, timer: &mut PhaseTimer) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if auction.status != AuctionStatus::Paused {
            return Err(EngineError::StateConflict("auction must be paused to resume".into()));
        }
        auction.status = AuctionStatus::Live;
        auction.current_timer_phase = Some(TimerPhase::Running);
        let auction = self.store.cas_update_auction(auction).await?;
        timer.arm_for_live_player();
        self.journal
            .append(EventJournal::record(ActionEventType::AuctionResumed, auction.id, json!({}), None, "admin", true, None))
            .await?;
        Ok(auction)
    }

    /// §4.5 `return-to-pool`: the inverse of a sale. Reversible.
    pub async fn return_to_pool(
        &self,
        auction_id: AuctionId,
        player_id: PlayerId,
        performed_by: impl Into<String>,
    ) -> Result<(Auction, AuctionPlayer), EngineError> {
        let performed_by = performed_by.into();
        let mut player = self.store.get_player(auction_id, player_id).await?;
        if player.status != PlayerStatus::Sold {
            return Err(EngineError::StateConflict("only a sold player can be returned to pool".into()));
        }
        let sold_to = player.sold_to.ok_or(EngineError::InvariantViolation("sold player missing sold_to".into()))?;
        let sold_amount = player.sold_amount.ok_or(EngineError::InvariantViolation("sold player missing sold_amount".into()))?;

        let mut team = self.store.get_team(auction_id, sold_to).await?;
        team.purse_remaining += sold_amount;
        team.players.retain(|lot| lot.player_id != player_id);
        let team = self.store.cas_update_team(team).await?;

        player.status = PlayerStatus::Pool;
        player.sold_to = None;
        player.sold_amount = None;
        player.sold_in_round = None;
        let player = self.store.cas_update_player(player).await?;

        let mut auction = self.store.get_auction(auction_id).await?;
        match auction.config.requeue_policy {
            RequeuePolicy::Head => auction.remaining_player_ids.push_front(player_id),
            RequeuePolicy::Tail => auction.remaining_player_ids.push_back(player_id),
        }
        let auction = self.store.cas_update_auction(auction).await?;

        self.journal
            .append(EventJournal::record(
                ActionEventType::PlayerReturnedToPool,
                auction_id,
                json!({ "player_id": player_id, "refunded_to": sold_to, "amount": sold_amount }),
                Some(json!({ "player_id": player_id, "team_id": sold_to, "amount": sold_amount })),
                performed_by,
                true,
                None,
            ))
            .await?;

        let _ = team;
        Ok((auction, player))
    }

    /// §4.5 `disqualify`: if sold, refunds the purse and removes the player from the squad. If
    /// the player is the one currently live, disarms the timer and hands off to the next player
    /// in the same step, so `status = live ⇔ auction.currentPlayerId = id` (§3) never dangles.
    /// Reversible.
    pub async fn disqualify(
        &self,
        auction_id: AuctionId,
        player_id: PlayerId,
        performed_by: impl Into<String>,
        timer: &mut PhaseTimer,
    ) -> Result<AuctionPlayer, EngineError> {
        let performed_by = performed_by.into();
        let mut player = self.store.get_player(auction_id, player_id).await?;
        let previous_status = player.status;
        let previous_sold_to = player.sold_to;
        let previous_sold_amount = player.sold_amount;
        let mut refunded_team = None;

        if let (PlayerStatus::Sold, Some(sold_to), Some(sold_amount)) = (player.status, player.sold_to, player.sold_amount) {
            let mut team = self.store.get_team(auction_id, sold_to).await?;
            team.purse_remaining += sold_amount;
            team.players.retain(|lot| lot.player_id != player_id);
            refunded_team = Some(self.store.cas_update_team(team).await?);
        }

        player.status = PlayerStatus::Disqualified;
        player.is_disqualified = true;
        player.sold_to = None;
        let player = self.store.cas_update_player(player).await?;

        self.journal
            .append(EventJournal::record(
                ActionEventType::PlayerDisqualified,
                auction_id,
                json!({ "player_id": player_id, "previous_status": previous_status }),
                Some(json!({
                    "player_id": player_id,
                    "previous_status": previous_status,
                    "team_id": previous_sold_to,
                    "amount": previous_sold_amount,
                })),
                performed_by,
                true,
                None,
            ))
            .await?;

        let _ = refunded_team;

        if previous_status == PlayerStatus::Live {
            let mut auction = self.store.get_auction(auction_id).await?;
            if auction.current_player_id == Some(player_id) {
                timer.disarm();
                auction.current_player_id = None;
                auction.current_bid_amount = None;
                auction.current_bidder_team_id = None;
                auction.current_timer_phase = None;
                self.store.cas_update_auction(auction).await?;
                self.advance_to_next_player(auction_id, timer).await?;
            }
        }

        Ok(player)
    }

    /// §4.5 `undo`: asks the journal for the latest reversible, unconsumed event and unwinds it.
    pub async fn undo(&self, auction_id: AuctionId, performed_by: impl Into<String>) -> Result<(), EngineError> {
        let performed_by = performed_by.into();
        let auction = self.store.get_auction(auction_id).await?;
        let event = self
            .journal
            .latest_undoable(auction_id, auction.config.max_undo_actions)
            .await?
            .ok_or_else(|| EngineError::ResourceExhausted("no reversible event left to undo".into()))?;

        let payload = event
            .reversal_payload
            .clone()
            .ok_or_else(|| EngineError::InvariantViolation("reversible event missing reversal payload".into()))?;

        match event.event_type {
            ActionEventType::PlayerSold => self.undo_sale(auction_id, &payload).await?,
            ActionEventType::PlayerUnsold => self.undo_unsold(auction_id, &payload).await?,
            ActionEventType::PlayerDisqualified => self.undo_disqualify(auction_id, &payload).await?,
            ActionEventType::AdminPurseAdjusted => self.undo_purse_adjustment(auction_id, &payload).await?,
            ActionEventType::TradeExecuted => self.undo_trade(auction_id, &payload).await?,
            _ => return Err(EngineError::InvariantViolation("non-reversible event reached undo".into())),
        }

        self.journal.freeze_reversal(event.id).await?;
        self.journal
            .append(EventJournal::record(
                ActionEventType::UndoApplied,
                auction_id,
                json!({ "reverses_event_id": event.id, "reversed_type": event.event_type }),
                None,
                performed_by,
                true,
                None,
            ))
            .await?;
        Ok(())
    }

    async fn undo_sale(&self, auction_id: AuctionId, payload: &serde_json::Value) -> Result<(), EngineError> {
        let player_id: PlayerId = serde_json::from_value(payload["player_id"].clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        let team_id: TeamId = serde_json::from_value(payload["team_id"].clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        let amount: i64 = payload["amount"].as_i64().ok_or_else(|| EngineError::InvariantViolation("missing amount".into()))?;

        let mut player = self.store.get_player(auction_id, player_id).await?;
        player.status = PlayerStatus::Live;
        player.sold_to = None;
        player.sold_amount = None;
        player.sold_in_round = None;
        self.store.cas_update_player(player).await?;

        let mut team = self.store.get_team(auction_id, team_id).await?;
        team.purse_remaining += amount;
        team.players.retain(|lot| lot.player_id != player_id);
        self.store.cas_update_team(team).await?;

        let mut auction = self.store.get_auction(auction_id).await?;
        auction.current_player_id = Some(player_id);
        auction.current_bid_amount = None;
        auction.current_bidder_team_id = None;
        self.store.cas_update_auction(auction).await?;
        Ok(())
    }

    async fn undo_unsold(&self, auction_id: AuctionId, payload: &serde_json::Value) -> Result<(), EngineError> {
        let player_id: PlayerId = serde_json::from_value(payload["player_id"].clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        let mut player = self.store.get_player(auction_id, player_id).await?;
        player.status = PlayerStatus::Live;
        self.store.cas_update_player(player).await?;

        let mut auction = self.store.get_auction(auction_id).await?;
        auction.current_player_id = Some(player_id);
        self.store.cas_update_auction(auction).await?;
        Ok(())
    }

    async fn undo_disqualify(&self, auction_id: AuctionId, payload: &serde_json::Value) -> Result<(), EngineError> {
        let player_id: PlayerId = serde_json::from_value(payload["player_id"].clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        let mut player = self.store.get_player(auction_id, player_id).await?;
        player.is_disqualified = false;

        let previous_status: PlayerStatus = serde_json::from_value(payload["previous_status"].clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        player.status = previous_status;

        if previous_status == PlayerStatus::Sold {
            let team_id: TeamId = serde_json::from_value(payload["team_id"].clone())
                .map_err(|e| EngineError::InvariantViolation("disqualify reversal missing team_id".into()))?;
            let amount: i64 = payload["amount"]
                .as_i64()
                .ok_or_else(|| EngineError::InvariantViolation("disqualify reversal missing amount".into()))?;

            player.sold_to = Some(team_id);
            player.sold_amount = Some(amount);

            let mut team = self.store.get_team(auction_id, team_id).await?;
            team.purse_remaining -= amount;
            team.players.push(OwnedLot { player_id, bought_at: amount, round: team.squad_size() + 1, timestamp: chrono::Utc::now() });
            self.store.cas_update_team(team).await?;
        }

        self.store.cas_update_player(player).await?;
        Ok(())
    }

    async fn undo_purse_adjustment(&self, auction_id: AuctionId, payload: &serde_json::Value) -> Result<(), EngineError> {
        let team_id: TeamId = serde_json::from_value(payload["team_id"].clone())
            .map_err(|e| EngineError::InvariantViolation(e.to_string()))?;
        let delta: i64 = payload["delta"].as_i64().ok_or_else(|| EngineError::InvariantViolation("missing delta".into()))?;
        let mut team = self.store.get_team(auction_id, team_id).await?;
        team.purse_remaining -= delta;
        self.store.cas_update_team(team).await?;
        Ok(())
    }

    async fn undo_trade(&self, auction_id: AuctionId, payload: &serde_json::Value) -> Result<(), EngineError> {
        // Trade reversal touches both teams' squads and is delegated to `crate::trade` so this
        // module doesn't need to know the trade shape; wired up in `trade::undo_execution`.
        crate::trade::undo_execution(&self.store, auction_id, payload).await
    }

    /// §4.5 `complete`: terminates the timer and marks the auction completed outright (used by
    /// the admin-initiated `/complete` route; the timer-driven path goes through
    /// `advance_to_next_player`'s empty-queue branch instead).
    pub async fn complete(&self, auction_id: AuctionId, timer: &mut PhaseTimer) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if !auction.is_live_or_paused() {
            return Err(EngineError::StateConflict("auction must be live or paused to complete".into()));
        }
        timer.disarm();
        auction.status = AuctionStatus::Completed;
        auction.current_player_id = None;
        auction.current_bid_amount = None;
        auction.current_bidder_team_id = None;
        auction.current_timer_phase = None;
        let auction = self.store.cas_update_auction(auction).await?;
        self.journal
            .append(EventJournal::record(ActionEventType::AuctionCompleted, auction.id, json!({}), None, "admin", true, None))
            .await?;
        Ok(auction)
    }

    pub async fn open_trade_window(&self, auction_id: AuctionId) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if auction.status != AuctionStatus::Completed {
            return Err(EngineError::StateConflict("auction must be completed to open a trade window".into()));
        }
        auction.status = AuctionStatus::TradeWindow;
        auction.trade_window_ends_at = Some(chrono::Utc::now() + chrono::Duration::hours(auction.config.trade_window_hours));
        let auction = self.store.cas_update_auction(auction).await?;
        self.journal
            .append(EventJournal::record(
                ActionEventType::TradeWindowOpened,
                auction.id,
                json!({ "ends_at": auction.trade_window_ends_at }),
                None,
                "admin",
                true,
                None,
            ))
            .await?;
        Ok(auction)
    }

    /// §4.5 `finalize`: sweeps pending trades to `expired`, freezes the event journal.
    pub async fn finalize(&self, auction_id: AuctionId) -> Result<Auction, EngineError> {
        let mut auction = self.store.get_auction(auction_id).await?;
        if !matches!(auction.status, AuctionStatus::Completed | AuctionStatus::TradeWindow) {
            return Err(EngineError::StateConflict("auction must be completed or in its trade window to finalize".into()));
        }

        crate::trade::expire_pending(&self.store, auction_id).await?;

        auction.status = AuctionStatus::Finalized;
        auction.finalized_at = Some(chrono::Utc::now());
        let auction = self.store.cas_update_auction(auction).await?;
        self.journal
            .append(EventJournal::record(ActionEventType::AuctionFinalized, auction.id, json!({}), None, "admin", true, None))
            .await?;
        Ok(auction)
    }

    /// §4.5 "admin purse adjustment": a direct delta to `team.purseRemaining`, e.g. a correction.
    /// Reversible; never touches any player or sale.
    pub async fn admin_adjust_purse(
        &self,
        auction_id: AuctionId,
        team_id: TeamId,
        delta: i64,
        performed_by: impl Into<String>,
    ) -> Result<AuctionTeam, EngineError> {
        let mut team = self.store.get_team(auction_id, team_id).await?;
        team.purse_remaining += delta;
        let team = self.store.cas_update_team(team).await?;

        self.journal
            .append(EventJournal::record(
                ActionEventType::AdminPurseAdjusted,
                auction_id,
                json!({ "team_id": team_id, "delta": delta }),
                Some(json!({ "team_id": team_id, "delta": delta })),
                performed_by,
                false,
                None,
            ))
            .await?;
        Ok(team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BidIncrementTier;
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
            min_squad_size: 2,
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

    async fn setup() -> (Lifecycle, Arc<dyn StateStore>, AuctionId, TeamId, TeamId) {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let journal = Arc::new(EventJournal::new(store.clone()));
        let lifecycle = Lifecycle::new(store.clone(), journal);

        let auction = lifecycle.create_auction("s1", config()).await.unwrap();

        let team_a = store.create_team(AuctionTeam::new(auction.id, "Team A", "A", 1000)).await.unwrap();
        let team_b = store.create_team(AuctionTeam::new(auction.id, "Team B", "B", 1000)).await.unwrap();
        store.create_player(AuctionPlayer::new(auction.id, 1, "Player One", "BAT")).await.unwrap();
        store.create_player(AuctionPlayer::new(auction.id, 2, "Player Two", "BOWL")).await.unwrap();

        (lifecycle, store, auction.id, team_a.id, team_b.id)
    }

    /// §8 scenario S1: alternating bids settle on the higher bidder at timer expiry.
    #[tokio::test]
    async fn s1_sale_to_highest_bidder_conserves_purses() {
        let (lifecycle, store, auction_id, team_a, team_b) = setup().await;
        lifecycle.configure(auction_id).await.unwrap();
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        let (_, player) = lifecycle.go_live(auction_id, &mut timer).await.unwrap();

        let result = lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_a, attempted_amount: 100 }, &mut timer)
            .await
            .unwrap();
        assert!(result.accepted);

        let result = lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_b, attempted_amount: 150 }, &mut timer)
            .await
            .unwrap();
        assert!(result.accepted);

        let result = lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_a, attempted_amount: 200 }, &mut timer)
            .await
            .unwrap();
        assert!(result.accepted);

        // No more bids: walk the timer to going_twice expiry and declare the terminal outcome.
        timer.advance();
        timer.advance();
        let outcome = lifecycle.phase_expired(auction_id, &mut timer).await.unwrap().unwrap();
        assert!(outcome.sold);
        assert_eq!(outcome.player.id, player.id);
        assert_eq!(outcome.player.sold_amount, Some(200));
        assert_eq!(outcome.player.sold_to, Some(team_a));

        let a = store.get_team(auction_id, team_a).await.unwrap();
        let b = store.get_team(auction_id, team_b).await.unwrap();
        assert_eq!(a.purse_remaining, 800);
        assert_eq!(b.purse_remaining, 1000);
        assert!(a.owns(player.id));
    }

    /// §8 scenario S2: undoing a sale restores the purse and returns the player to `live`.
    #[tokio::test]
    async fn s2_undo_reverses_a_sale() {
        let (lifecycle, store, auction_id, team_a, _team_b) = setup().await;
        lifecycle.configure(auction_id).await.unwrap();
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        let (_, player) = lifecycle.go_live(auction_id, &mut timer).await.unwrap();

        lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_a, attempted_amount: 100 }, &mut timer)
            .await
            .unwrap();
        timer.advance();
        timer.advance();
        lifecycle.phase_expired(auction_id, &mut timer).await.unwrap();

        let a_before_undo = store.get_team(auction_id, team_a).await.unwrap();
        assert_eq!(a_before_undo.purse_remaining, 900);

        lifecycle.undo(auction_id, "admin").await.unwrap();

        let a_after_undo = store.get_team(auction_id, team_a).await.unwrap();
        assert_eq!(a_after_undo.purse_remaining, 1000);
        assert!(!a_after_undo.owns(player.id));

        let player_after_undo = store.get_player(auction_id, player.id).await.unwrap();
        assert_eq!(player_after_undo.status, PlayerStatus::Live);

        let auction = store.get_auction(auction_id).await.unwrap();
        assert_eq!(auction.current_player_id, Some(player.id));
    }

    /// §8 boundary: a bid that would strand the team below what it needs to fill its minimum
    /// squad is rejected with `insufficient_purse_for_min_squad`, even though the bid itself is
    /// affordable in isolation.
    #[tokio::test]
    async fn min_squad_reserve_blocks_an_otherwise_affordable_bid() {
        let (lifecycle, store, auction_id, team_a, _team_b) = setup().await;
        lifecycle.configure(auction_id).await.unwrap();
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        lifecycle.go_live(auction_id, &mut timer).await.unwrap();

        let mut team = store.get_team(auction_id, team_a).await.unwrap();
        team.purse_remaining = 150;
        store.cas_update_team(team).await.unwrap();

        // min_squad_size=2, team has 0 players: a base-price bid of 100 would leave only 50,
        // short of the 100 reserve needed for the one other mandatory slot.
        let result = lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_a, attempted_amount: 100 }, &mut timer)
            .await
            .unwrap();
        assert!(!result.accepted);
        assert_eq!(result.rejection, Some(BidRejectionReason::InsufficientPurseForMinSquad));
    }

    /// §4.5 `disqualify`: a sold player's purse is refunded and `undo` restores the sale.
    #[tokio::test]
    async fn disqualify_then_undo_restores_the_sale() {
        let (lifecycle, store, auction_id, team_a, _team_b) = setup().await;
        lifecycle.configure(auction_id).await.unwrap();
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        let (_, player) = lifecycle.go_live(auction_id, &mut timer).await.unwrap();
        lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_a, attempted_amount: 100 }, &mut timer)
            .await
            .unwrap();
        timer.advance();
        timer.advance();
        lifecycle.phase_expired(auction_id, &mut timer).await.unwrap();

        lifecycle.disqualify(auction_id, player.id, "admin", &mut timer).await.unwrap();
        let team = store.get_team(auction_id, team_a).await.unwrap();
        assert_eq!(team.purse_remaining, 1000);
        assert!(!team.owns(player.id));

        lifecycle.undo(auction_id, "admin").await.unwrap();
        let player_after = store.get_player(auction_id, player.id).await.unwrap();
        assert_eq!(player_after.status, PlayerStatus::Sold);
        assert_eq!(player_after.sold_to, Some(team_a));
        assert_eq!(player_after.sold_amount, Some(100));

        let team_after = store.get_team(auction_id, team_a).await.unwrap();
        assert_eq!(team_after.purse_remaining, 900);
        assert!(team_after.owns(player.id));
    }

    /// §3 invariant "status = live ⇔ auction.currentPlayerId = id": disqualifying the player
    /// currently up for auction must disarm the timer and hand off to the next player, not leave
    /// `currentPlayerId` pointing at a disqualified player.
    #[tokio::test]
    async fn disqualify_of_the_live_player_advances_to_the_next_player() {
        let (lifecycle, store, auction_id, team_a, _team_b) = setup().await;
        lifecycle.configure(auction_id).await.unwrap();
        let mut timer = PhaseTimer::new(10, 5, 3, 3);
        let (_, live_player) = lifecycle.go_live(auction_id, &mut timer).await.unwrap();
        lifecycle
            .record_bid(auction_id, BidAttempt { team_id: team_a, attempted_amount: 100 }, &mut timer)
            .await
            .unwrap();
        assert!(timer.is_armed());

        lifecycle.disqualify(auction_id, live_player.id, "admin", &mut timer).await.unwrap();

        let disqualified = store.get_player(auction_id, live_player.id).await.unwrap();
        assert_eq!(disqualified.status, PlayerStatus::Disqualified);

        let auction = store.get_auction(auction_id).await.unwrap();
        assert_ne!(auction.current_player_id, Some(live_player.id));
        assert!(auction.current_player_id.is_some());
        assert_eq!(auction.current_bid_amount, None);
        assert_eq!(auction.current_bidder_team_id, None);
        assert_eq!(timer.current_phase(), Some(TimerPhase::Running));
    }
}
