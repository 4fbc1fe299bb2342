//! The realtime surface (§6a): a single WebSocket upgrade per room. The connection is
//! send-only from the server's point of view — incoming frames are only read to notice the
//! client closing the socket.

use std::sync::Arc;

use auction_engine::broadcast::Broadcaster;
use auction_engine::ids::{AuctionId, TeamId};
use auction_engine::Engine;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WsRoom {
    #[default]
    Auction,
    Admin,
    Team,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub room: WsRoom,
    pub team_id: Option<TeamId>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(auction_id): Path<AuctionId>,
    Query(query): Query<WsQuery>,
    State(engine): State<Arc<Engine>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, auction_id, query, engine))
}

async fn handle_socket(mut socket: WebSocket, auction_id: AuctionId, query: WsQuery, engine: Arc<Engine>) {
    let room = match (query.room, query.team_id) {
        (WsRoom::Auction, _) => Broadcaster::auction_room(auction_id),
        (WsRoom::Admin, _) => Broadcaster::admin_room(auction_id),
        (WsRoom::Team, Some(team_id)) => Broadcaster::team_room(auction_id, team_id),
        (WsRoom::Team, None) => {
            let _ = socket.send(Message::Text("team_id is required for the team room".into())).await;
            return;
        }
    };

    // Subscribe before fetching the snapshot so no event can land in the gap between the two (§4.7
    // "on reconnect, the client receives a fresh snapshot").
    let mut receiver = engine.broadcaster().subscribe(&room);

    match engine.snapshot(auction_id).await {
        Ok(snapshot) => {
            let message = json!({ "type": "state_snapshot", "data": snapshot }).to_string();
            if socket.send(Message::Text(message)).await.is_err() {
                return;
            }
        }
        Err(err) => {
            let _ = socket.send(Message::Text(json!({ "type": "error", "message": err.to_string() }).to_string())).await;
            return;
        }
    }

    loop {
        tokio::select! {
            message = receiver.recv() => match message {
                Ok(message) => {
                    let Ok(text) = serde_json::to_string(message.as_ref()) else { continue };
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}
