//! The per-auction coordinator (§5): one tokio task per auction, the only thing ever allowed to
//! touch that auction's [`PhaseTimer`] or issue [`Lifecycle`]/trade calls against its state.
//! Everything routes through an `mpsc` inbox of [`Command`]s with a `oneshot` reply channel each —
//! the same request/response shape this codebase's actors use — so the inbox itself is the lock:
//! two commands for the same auction can never race each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::arbiter::BidAttempt;
use crate::errors::EngineError;
use crate::ids::{AuctionId, PlayerId, TeamId, TradeId};
use crate::journal::EventJournal;
use crate::lifecycle::{BidResult, Lifecycle};
use crate::model::{Auction, AuctionConfig, AuctionPlayer, AuctionStatus, AuctionTeam, AuctionTrade};
use crate::store::StateStore;
use crate::timer::PhaseTimer;
use crate::{broadcast::Broadcaster, metrics, trade};

const INBOX_CAPACITY: usize = 256;
const JOURNAL_TAIL_WINDOW: usize = 32;
const TICK_INTERVAL: Duration = Duration::from_secs(1);
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// §7 "a transient persistence error retries once with backoff" — the only automatic retry a
/// coordinator performs; every other error surfaces to the caller on the first attempt.
macro_rules! with_retry {
    ($self:ident, $call:expr) => {{
        match $call.await {
            Err(EngineError::Transient(reason)) => {
                log::warn!("auction {}: transient store failure, retrying once: {reason}", $self.auction_id);
                tokio::time::sleep(RETRY_BACKOFF).await;
                $call.await
            }
            other => other,
        }
    }};
}

pub enum Command {
    UpdateConfig { config: AuctionConfig, reply: Reply<Auction> },
    Configure { reply: Reply<Auction> },
    GoLive { reply: Reply<Auction> },
    PlaceBid { team_id: TeamId, amount: i64, reply: Reply<BidResult> },
    Pause { reply: Reply<Auction> },
    Resume { reply: Reply<Auction> },
    Complete { reply: Reply<Auction> },
    OpenTradeWindow { reply: Reply<Auction> },
    Finalize { reply: Reply<Auction> },
    Undo { performed_by: String, reply: Reply<()> },
    ReturnToPool { player_id: PlayerId, performed_by: String, reply: Reply<(Auction, AuctionPlayer)> },
    Disqualify { player_id: PlayerId, performed_by: String, reply: Reply<AuctionPlayer> },
    AdjustPurse { team_id: TeamId, delta: i64, performed_by: String, reply: Reply<AuctionTeam> },
    ProposeTrade { request: trade::ProposeTrade, reply: Reply<AuctionTrade> },
    AcceptTrade { trade_id: TradeId, reply: Reply<AuctionTrade> },
    RejectTrade { trade_id: TradeId, reply: Reply<AuctionTrade> },
    WithdrawTrade { trade_id: TradeId, reply: Reply<AuctionTrade> },
    AdminRejectTrade { trade_id: TradeId, reply: Reply<AuctionTrade> },
    ExecuteTrade { trade_id: TradeId, reply: Reply<AuctionTrade> },
    AdminInitiateTrade { request: trade::ProposeTrade, reply: Reply<AuctionTrade> },
    Shutdown,
}

/// A cheaply-cloneable front door to one auction's coordinator task. Every method here is a
/// request/response round trip through the inbox; none of them touch the store directly.
#[derive(Clone)]
pub struct CoordinatorHandle {
    auction_id: AuctionId,
    sender: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub fn auction_id(&self) -> AuctionId {
        self.auction_id
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown).await;
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| EngineError::Transient("coordinator inbox is closed".into()))?;
        rx.await.map_err(|_| EngineError::Transient("coordinator dropped the reply channel".into()))?
    }

    pub async fn update_config(&self, config: AuctionConfig) -> Result<Auction, EngineError> {
        self.call(|reply| Command::UpdateConfig { config, reply }).await
    }

    pub async fn configure(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::Configure { reply }).await
    }

    pub async fn go_live(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::GoLive { reply }).await
    }

    pub async fn place_bid(&self, team_id: TeamId, amount: i64) -> Result<BidResult, EngineError> {
        self.call(|reply| Command::PlaceBid { team_id, amount, reply }).await
    }

    pub async fn pause(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::Resume { reply }).await
    }

    pub async fn complete(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::Complete { reply }).await
    }

    pub async fn open_trade_window(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::OpenTradeWindow { reply }).await
    }

    pub async fn finalize(&self) -> Result<Auction, EngineError> {
        self.call(|reply| Command::Finalize { reply }).await
    }

    pub async fn undo(&self, performed_by: impl Into<String>) -> Result<(), EngineError> {
        let performed_by = performed_by.into();
        self.call(|reply| Command::Undo { performed_by, reply }).await
    }

    pub async fn return_to_pool(
        &self,
        player_id: PlayerId,
        performed_by: impl Into<String>,
    ) -> Result<(Auction, AuctionPlayer), EngineError> {
        let performed_by = performed_by.into();
        self.call(|reply| Command::ReturnToPool { player_id, performed_by, reply }).await
    }

    pub async fn disqualify(
        &self,
        player_id: PlayerId,
        performed_by: impl Into<String>,
    ) -> Result<AuctionPlayer, EngineError> {
        let performed_by = performed_by.into();
        self.call(|reply| Command::Disqualify { player_id, performed_by, reply }).await
    }

    pub async fn adjust_purse(
        &self,
        team_id: TeamId,
        delta: i64,
        performed_by: impl Into<String>,
    ) -> Result<AuctionTeam, EngineError> {
        let performed_by = performed_by.into();
        self.call(|reply| Command::AdjustPurse { team_id, delta, performed_by, reply }).await
    }

    pub async fn propose_trade(&self, request: trade::ProposeTrade) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::ProposeTrade { request, reply }).await
    }

    pub async fn accept_trade(&self, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::AcceptTrade { trade_id, reply }).await
    }

    pub async fn reject_trade(&self, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::RejectTrade { trade_id, reply }).await
    }

    pub async fn withdraw_trade(&self, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::WithdrawTrade { trade_id, reply }).await
    }

    pub async fn admin_reject_trade(&self, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::AdminRejectTrade { trade_id, reply }).await
    }

    pub async fn execute_trade(&self, trade_id: TradeId) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::ExecuteTrade { trade_id, reply }).await
    }

    pub async fn admin_initiate_trade(&self, request: trade::ProposeTrade) -> Result<AuctionTrade, EngineError> {
        self.call(|reply| Command::AdminInitiateTrade { request, reply }).await
    }
}

pub struct Coordinator {
    auction_id: AuctionId,
    store: Arc<dyn StateStore>,
    journal: Arc<EventJournal>,
    lifecycle: Arc<Lifecycle>,
    broadcaster: Arc<Broadcaster>,
    timer: PhaseTimer,
    last_broadcast_seq: u64,
    inbox: mpsc::Receiver<Command>,
    /// §7: once an `InvariantViolation` surfaces, this coordinator stops accepting commands and
    /// waits for manual intervention rather than risk compounding corrupted state.
    healthy: bool,
}

impl Coordinator {
    /// Spawns the task and returns a handle to it. `auction` is the auction's state as of
    /// spawn time — used only to size the timer and re-arm it if the auction was already live
    /// when the process (re)started.
    pub fn spawn(
        auction: &Auction,
        store: Arc<dyn StateStore>,
        journal: Arc<EventJournal>,
        lifecycle: Arc<Lifecycle>,
        broadcaster: Arc<Broadcaster>,
    ) -> CoordinatorHandle {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let mut timer = PhaseTimer::new(
            auction.config.timer_duration_secs,
            auction.config.bid_reset_timer_secs,
            auction.config.going_once_timer_secs,
            auction.config.going_twice_timer_secs,
        );
        if auction.status == AuctionStatus::Live {
            timer.arm_for_live_player();
        }

        let coordinator = Coordinator {
            auction_id: auction.id,
            store,
            journal,
            lifecycle,
            broadcaster,
            timer,
            last_broadcast_seq: 0,
            inbox,
            healthy: true,
        };
        metrics::ACTIVE_AUCTIONS.inc();
        tokio::spawn(coordinator.run());
        CoordinatorHandle { auction_id: auction.id, sender }
    }

    async fn run(mut self) {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                received = self.inbox.recv() => {
                    match received {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                    metrics::COORDINATOR_INBOX_DEPTH
                        .with_label_values(&[&self.auction_id.to_string()])
                        .set(self.inbox.len() as i64);
                    if !self.healthy {
                        log::error!("auction {}: halting coordinator after invariant violation", self.auction_id);
                        break;
                    }
                }
                _ = self.timer.tick() => {
                    self.handle_phase_expired().await;
                    if !self.healthy {
                        log::error!("auction {}: halting coordinator after invariant violation", self.auction_id);
                        break;
                    }
                }
                _ = tick.tick() => {
                    self.broadcast_timer_tick();
                }
            }
        }
        metrics::ACTIVE_AUCTIONS.dec();
    }

    fn broadcast_timer_tick(&self) {
        if !self.timer.is_armed() {
            return;
        }
        let remaining_ms = self.timer.remaining().map(|d| d.as_millis() as u64).unwrap_or(0);
        self.broadcaster
            .publish_timer_tick(self.auction_id, self.timer.current_phase(), remaining_ms);
    }

    async fn handle_phase_expired(&mut self) {
        match self.lifecycle.phase_expired(self.auction_id, &mut self.timer).await {
            Ok(Some(_terminal_outcome)) => {
                if let Err(err) = self.lifecycle.advance_to_next_player(self.auction_id, &mut self.timer).await {
                    log::error!("auction {}: advance_to_next_player failed: {err}", self.auction_id);
                    self.note_failure(&err);
                }
            }
            Ok(None) => {}
            Err(err) => {
                log::error!("auction {}: phase_expired failed: {err}", self.auction_id);
                self.note_failure(&err);
            }
        }
        self.flush_events().await;
    }

    /// §7: an `InvariantViolation` halts this coordinator and broadcasts an unhealthy notice;
    /// every other error is left for the caller to see and is not fatal to the coordinator itself.
    fn note_failure(&mut self, err: &EngineError) {
        if let EngineError::InvariantViolation(reason) = err {
            self.healthy = false;
            self.broadcaster.publish_unhealthy(self.auction_id, reason.clone());
        }
    }

    /// Tails the journal and broadcasts whatever has appeared since the last flush. Cheaper than
    /// threading broadcast payloads back out of every `Lifecycle`/`trade` call, and correct as
    /// long as this coordinator is the only writer to its own auction's events — which the
    /// single-inbox design already guarantees (§5).
    async fn flush_events(&mut self) {
        let tail = match self.journal.tail(self.auction_id, JOURNAL_TAIL_WINDOW).await {
            Ok(tail) => tail,
            Err(err) => {
                log::error!("auction {}: failed to tail journal: {err}", self.auction_id);
                return;
            }
        };
        let mut fresh: Vec<_> = tail.into_iter().filter(|e| e.sequence_number > self.last_broadcast_seq).collect();
        fresh.sort_by_key(|e| e.sequence_number);
        for event in &fresh {
            self.broadcaster.publish_event(self.auction_id, event);
        }
        if let Some(last) = fresh.last() {
            self.last_broadcast_seq = last.sequence_number;
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Shutdown => {}
            Command::UpdateConfig { config, reply } => {
                let result = with_retry!(self, self.lifecycle.update_config(self.auction_id, config.clone()));
                self.respond(result, reply).await;
            }
            Command::Configure { reply } => {
                let result = with_retry!(self, self.lifecycle.configure(self.auction_id));
                self.respond(result, reply).await;
            }
            Command::GoLive { reply } => {
                let result = with_retry!(self, self.lifecycle.go_live(self.auction_id, &mut self.timer))
                    .map(|(auction, _first_player)| auction);
                self.respond(result, reply).await;
            }
            Command::PlaceBid { team_id, amount, reply } => {
                let attempt = BidAttempt { team_id, attempted_amount: amount };
                let result = with_retry!(self, self.lifecycle.record_bid(self.auction_id, attempt, &mut self.timer));
                self.record_bid_metrics(team_id, amount, &result);
                self.respond(result, reply).await;
            }
            Command::Pause { reply } => {
                let result = with_retry!(self, self.lifecycle.pause(self.auction_id, &mut self.timer));
                self.respond(result, reply).await;
            }
            Command::Resume { reply } => {
                let result = with_retry!(self, self.lifecycle.resume(self.auction_id, &mut self.timer));
                self.respond(result, reply).await;
            }
            Command::Complete { reply } => {
                let result = with_retry!(self, self.lifecycle.complete(self.auction_id, &mut self.timer));
                self.respond(result, reply).await;
            }
            Command::OpenTradeWindow { reply } => {
                let result = with_retry!(self, self.lifecycle.open_trade_window(self.auction_id));
                self.respond(result, reply).await;
            }
            Command::Finalize { reply } => {
                let result = with_retry!(self, self.lifecycle.finalize(self.auction_id));
                self.respond(result, reply).await;
            }
            Command::Undo { performed_by, reply } => {
                let result = with_retry!(self, self.lifecycle.undo(self.auction_id, performed_by.clone()));
                self.respond(result, reply).await;
            }
            Command::ReturnToPool { player_id, performed_by, reply } => {
                let result =
                    with_retry!(self, self.lifecycle.return_to_pool(self.auction_id, player_id, performed_by.clone()));
                self.respond(result, reply).await;
            }
            Command::Disqualify { player_id, performed_by, reply } => {
                let result = with_retry!(
                    self,
                    self.lifecycle.disqualify(self.auction_id, player_id, performed_by.clone(), &mut self.timer)
                );
                self.respond(result, reply).await;
            }
            Command::AdjustPurse { team_id, delta, performed_by, reply } => {
                let result = with_retry!(
                    self,
                    self.lifecycle.admin_adjust_purse(self.auction_id, team_id, delta, performed_by.clone())
                );
                self.respond(result, reply).await;
            }
            Command::ProposeTrade { request, reply } => {
                let result =
                    with_retry!(self, trade::propose(&self.store, &self.journal, self.auction_id, request.clone()));
                self.respond(result, reply).await;
            }
            Command::AcceptTrade { trade_id, reply } => {
                let result = with_retry!(self, trade::accept(&self.store, &self.journal, self.auction_id, trade_id));
                self.respond(result, reply).await;
            }
            Command::RejectTrade { trade_id, reply } => {
                let result = with_retry!(self, trade::reject(&self.store, self.auction_id, trade_id));
                self.respond(result, reply).await;
            }
            Command::WithdrawTrade { trade_id, reply } => {
                let result = with_retry!(self, trade::withdraw(&self.store, self.auction_id, trade_id));
                self.respond(result, reply).await;
            }
            Command::AdminRejectTrade { trade_id, reply } => {
                let result = with_retry!(self, trade::admin_reject(&self.store, self.auction_id, trade_id));
                self.respond(result, reply).await;
            }
            Command::ExecuteTrade { trade_id, reply } => {
                let result = with_retry!(self, trade::execute(&self.store, &self.journal, self.auction_id, trade_id));
                self.respond(result, reply).await;
            }
            Command::AdminInitiateTrade { request, reply } => {
                let result = with_retry!(
                    self,
                    trade::admin_initiate(&self.store, &self.journal, self.auction_id, request.clone())
                );
                self.respond(result, reply).await;
            }
        }
    }

    fn record_bid_metrics(&self, team_id: TeamId, amount: i64, result: &Result<BidResult, EngineError>) {
        let auction_label = self.auction_id.to_string();
        match result {
            Ok(bid_result) if bid_result.accepted => {
                metrics::BIDS_ACCEPTED_TOTAL.with_label_values(&[&auction_label]).inc();
            }
            Ok(bid_result) => {
                if let Some(reason) = bid_result.rejection {
                    metrics::BIDS_REJECTED_TOTAL.with_label_values(&[&auction_label, reason.to_string().as_str()]).inc();
                    if let Some(player_id) = bid_result.auction.current_player_id {
                        self.broadcaster.publish_bid_rejected(self.auction_id, player_id, team_id, amount, reason);
                    }
                }
            }
            Err(_) => {}
        }
    }

    async fn respond<T>(&mut self, result: Result<T, EngineError>, reply: Reply<T>) {
        self.flush_events().await;
        if let Err(err) = &result {
            self.note_failure(err);
        }
        let _ = reply.send(result);
    }
}
