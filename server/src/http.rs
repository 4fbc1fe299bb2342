//! HTTP routes (§6): one handler per auction operation, each a thin translation from a request
//! body/path into an [`Engine`] call and back into the `{ok, data}` envelope.

use std::sync::Arc;

use auction_engine::ids::{AuctionId, PlayerId, TeamId, TradeId};
use auction_engine::model::AuctionConfig;
use auction_engine::trade::ProposeTrade;
use auction_engine::{AuctionSnapshot, Engine, NewAuction, NewPlayer, NewTeam};
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::errors::{ApiError, Envelope};
use crate::ws::ws_handler;

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/auctions", post(create_auction))
        .route("/auctions/:auction_id", get(get_auction))
        .route("/auctions/:auction_id/config", patch(update_config))
        .route("/auctions/:auction_id/configure", post(configure))
        .route("/auctions/:auction_id/go-live", post(go_live))
        .route("/auctions/:auction_id/pause", post(pause))
        .route("/auctions/:auction_id/resume", post(resume))
        .route("/auctions/:auction_id/complete", post(complete))
        .route("/auctions/:auction_id/open-trade-window", post(open_trade_window))
        .route("/auctions/:auction_id/finalize", post(finalize))
        .route("/auctions/:auction_id/undo", post(undo))
        .route("/auctions/:auction_id/teams", post(create_team))
        .route("/auctions/:auction_id/teams/:team_id", get(get_team))
        .route("/auctions/:auction_id/teams/:team_id/adjust-purse", post(adjust_purse))
        .route("/auctions/:auction_id/players", post(create_player))
        .route("/auctions/:auction_id/players/:player_id/return-to-pool", post(return_to_pool))
        .route("/auctions/:auction_id/players/:player_id/disqualify", post(disqualify))
        .route("/auctions/:auction_id/bids", post(place_bid))
        .route("/auctions/:auction_id/trades", post(propose_trade))
        .route("/auctions/:auction_id/trades/admin-initiate", post(admin_initiate_trade))
        .route("/auctions/:auction_id/trades/:trade_id/accept", patch(accept_trade))
        .route("/auctions/:auction_id/trades/:trade_id/reject", patch(reject_trade))
        .route("/auctions/:auction_id/trades/:trade_id/withdraw", patch(withdraw_trade))
        .route("/auctions/:auction_id/trades/:trade_id/admin-reject", patch(admin_reject_trade))
        .route("/auctions/:auction_id/trades/:trade_id/admin-approve", patch(admin_approve_trade))
        .route("/auctions/:auction_id/ws", get(ws_handler))
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
struct PlaceBidBody {
    team_id: TeamId,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct PerformedByBody {
    performed_by: String,
}

#[derive(Debug, Deserialize)]
struct AdjustPurseBody {
    delta: i64,
    performed_by: String,
}

async fn create_auction(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<NewAuction>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.create_auction(body).await?))
}

async fn get_auction(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<AuctionSnapshot>, ApiError> {
    Ok(Envelope(engine.snapshot(auction_id).await?))
}

async fn update_config(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(config): Json<AuctionConfig>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.update_config(auction_id, config).await?))
}

async fn configure(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.configure(auction_id).await?))
}

async fn go_live(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.go_live(auction_id).await?))
}

async fn pause(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.pause(auction_id).await?))
}

async fn resume(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.resume(auction_id).await?))
}

async fn complete(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.complete(auction_id).await?))
}

async fn open_trade_window(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.open_trade_window(auction_id).await?))
}

async fn finalize(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
) -> Result<Envelope<auction_engine::model::Auction>, ApiError> {
    Ok(Envelope(engine.finalize(auction_id).await?))
}

async fn undo(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(body): Json<PerformedByBody>,
) -> Result<Envelope<()>, ApiError> {
    engine.undo(auction_id, body.performed_by).await?;
    Ok(Envelope(()))
}

async fn create_team(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(body): Json<NewTeam>,
) -> Result<Envelope<auction_engine::model::AuctionTeam>, ApiError> {
    Ok(Envelope(engine.create_team(auction_id, body).await?))
}

async fn get_team(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, team_id)): Path<(AuctionId, TeamId)>,
) -> Result<Envelope<auction_engine::model::AuctionTeam>, ApiError> {
    Ok(Envelope(engine.get_team(auction_id, team_id).await?))
}

async fn adjust_purse(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, team_id)): Path<(AuctionId, TeamId)>,
    Json(body): Json<AdjustPurseBody>,
) -> Result<Envelope<auction_engine::model::AuctionTeam>, ApiError> {
    Ok(Envelope(engine.adjust_purse(auction_id, team_id, body.delta, body.performed_by).await?))
}

async fn create_player(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(body): Json<NewPlayer>,
) -> Result<Envelope<auction_engine::model::AuctionPlayer>, ApiError> {
    Ok(Envelope(engine.create_player(auction_id, body).await?))
}

async fn return_to_pool(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, player_id)): Path<(AuctionId, PlayerId)>,
    Json(body): Json<PerformedByBody>,
) -> Result<Envelope<auction_engine::model::AuctionPlayer>, ApiError> {
    let (_, player) = engine.return_to_pool(auction_id, player_id, body.performed_by).await?;
    Ok(Envelope(player))
}

async fn disqualify(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, player_id)): Path<(AuctionId, PlayerId)>,
    Json(body): Json<PerformedByBody>,
) -> Result<Envelope<auction_engine::model::AuctionPlayer>, ApiError> {
    Ok(Envelope(engine.disqualify(auction_id, player_id, body.performed_by).await?))
}

async fn place_bid(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(body): Json<PlaceBidBody>,
) -> Result<Envelope<auction_engine::lifecycle::BidResult>, ApiError> {
    Ok(Envelope(engine.place_bid(auction_id, body.team_id, body.amount).await?))
}

async fn propose_trade(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(body): Json<ProposeTrade>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.propose_trade(auction_id, body).await?))
}

async fn admin_initiate_trade(
    State(engine): State<Arc<Engine>>,
    Path(auction_id): Path<AuctionId>,
    Json(body): Json<ProposeTrade>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.admin_initiate_trade(auction_id, body).await?))
}

async fn accept_trade(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, trade_id)): Path<(AuctionId, TradeId)>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.accept_trade(auction_id, trade_id).await?))
}

async fn reject_trade(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, trade_id)): Path<(AuctionId, TradeId)>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.reject_trade(auction_id, trade_id).await?))
}

async fn withdraw_trade(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, trade_id)): Path<(AuctionId, TradeId)>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.withdraw_trade(auction_id, trade_id).await?))
}

async fn admin_reject_trade(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, trade_id)): Path<(AuctionId, TradeId)>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.admin_reject_trade(auction_id, trade_id).await?))
}

async fn admin_approve_trade(
    State(engine): State<Arc<Engine>>,
    Path((auction_id, trade_id)): Path<(AuctionId, TradeId)>,
) -> Result<Envelope<auction_engine::model::AuctionTrade>, ApiError> {
    Ok(Envelope(engine.execute_trade(auction_id, trade_id).await?))
}
