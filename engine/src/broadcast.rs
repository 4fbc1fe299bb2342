//! The Broadcast Fabric (C7, §6a): fans out public journal events and transient notices (bid
//! rejections, timer ticks) to whichever WebSocket connections are subscribed to a room. A room is
//! just a string key — `auction:{id}` for the public feed, `admin:{id}` for the admin feed (which
//! also sees non-public events), `team:{auctionId}:{teamId}` for a single team's private channel.
//!
//! Built on [`tokio::sync::broadcast`] rather than a custom fan-out: messages that arrive with no
//! subscriber listening on a room are simply dropped, which is the correct behavior for a feed
//! that only matters to connections that are actually watching it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::errors::BidRejectionReason;
use crate::ids::{AuctionId, PlayerId, TeamId};
use crate::model::{ActionEvent, ActionEventType, TimerPhase};

const ROOM_CAPACITY: usize = 256;

/// One journal event, reshaped for the wire: `event_type` becomes the bare `type` field callers
/// match on, and the bookkeeping-only `reversal_payload`/`reversal_consumed` fields are dropped —
/// a subscriber never needs to know whether an event is still undoable.
#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub event_type: ActionEventType,
    pub auction_id: AuctionId,
    pub sequence_number: u64,
    pub payload: serde_json::Value,
    pub performed_by: String,
    pub public_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&ActionEvent> for EventMessage {
    fn from(event: &ActionEvent) -> Self {
        Self {
            event_type: event.event_type,
            auction_id: event.auction_id,
            sequence_number: event.sequence_number,
            payload: event.payload.clone(),
            performed_by: event.performed_by.clone(),
            public_message: event.public_message.clone(),
            created_at: event.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BidRejectedMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub auction_id: AuctionId,
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub attempted_amount: i64,
    pub reason: BidRejectionReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerTickMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub auction_id: AuctionId,
    pub phase: Option<TimerPhase>,
    pub remaining_ms: u64,
}

/// §7 "`invariant_violation` → emit a final broadcast marking the auction unhealthy": the last
/// thing a coordinator ever publishes before it halts and waits for manual intervention.
#[derive(Debug, Clone, Serialize)]
pub struct AuctionUnhealthyMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub auction_id: AuctionId,
    pub reason: String,
}

/// The four message shapes a connection can receive. `#[serde(untagged)]` is safe here because
/// we only ever serialize outbound — there is no inbound variant to disambiguate.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WsMessage {
    Event(EventMessage),
    BidRejected(BidRejectedMessage),
    TimerTick(TimerTickMessage),
    Unhealthy(AuctionUnhealthyMessage),
}

pub struct Broadcaster {
    rooms: DashMap<String, broadcast::Sender<Arc<WsMessage>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self { rooms: DashMap::new() }
    }

    pub fn auction_room(auction_id: AuctionId) -> String {
        format!("auction:{auction_id}")
    }

    pub fn admin_room(auction_id: AuctionId) -> String {
        format!("admin:{auction_id}")
    }

    pub fn team_room(auction_id: AuctionId, team_id: TeamId) -> String {
        format!("team:{auction_id}:{team_id}")
    }

    /// Subscribes to a room, creating its channel on first use. The returned receiver only ever
    /// sees messages published after this call.
    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<Arc<WsMessage>> {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    fn publish(&self, room: &str, message: Arc<WsMessage>) {
        if let Some(sender) = self.rooms.get(room) {
            // No receivers is not an error: the room may simply have nobody watching right now.
            let _ = sender.send(message);
        }
    }

    /// Fans a journal event out to the auction's public room and its admin room. Non-public
    /// events (e.g. admin purse adjustments) only reach the admin room.
    pub fn publish_event(&self, auction_id: AuctionId, event: &ActionEvent) {
        let message = Arc::new(WsMessage::Event(EventMessage::from(event)));
        if event.is_public {
            self.publish(&Self::auction_room(auction_id), message.clone());
        }
        self.publish(&Self::admin_room(auction_id), message);
    }

    /// A rejected bid is private to the bidder (§7 "user-visible failure behavior") — it goes only
    /// to that team's room, never the public auction feed.
    pub fn publish_bid_rejected(
        &self,
        auction_id: AuctionId,
        player_id: PlayerId,
        team_id: TeamId,
        attempted_amount: i64,
        reason: BidRejectionReason,
    ) {
        let message = Arc::new(WsMessage::BidRejected(BidRejectedMessage {
            kind: "BID_REJECTED",
            auction_id,
            player_id,
            team_id,
            attempted_amount,
            reason,
        }));
        self.publish(&Self::team_room(auction_id, team_id), message);
    }

    pub fn publish_timer_tick(&self, auction_id: AuctionId, phase: Option<TimerPhase>, remaining_ms: u64) {
        let message = Arc::new(WsMessage::TimerTick(TimerTickMessage {
            kind: "TIMER_TICK",
            auction_id,
            phase,
            remaining_ms,
        }));
        self.publish(&Self::auction_room(auction_id), message);
    }

    /// §7 "an invariant violation halts the coordinator": every participant, not just admins,
    /// needs to know the auction is no longer being serviced.
    pub fn publish_unhealthy(&self, auction_id: AuctionId, reason: String) {
        let message = Arc::new(WsMessage::Unhealthy(AuctionUnhealthyMessage {
            kind: "AUCTION_UNHEALTHY",
            auction_id,
            reason,
        }));
        self.publish(&Self::auction_room(auction_id), message.clone());
        self.publish(&Self::admin_room(auction_id), message);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AuctionId;

    fn sample_event(auction_id: AuctionId, is_public: bool) -> ActionEvent {
        ActionEvent {
            id: crate::ids::EventId::new(),
            auction_id,
            sequence_number: 1,
            event_type: ActionEventType::AdminPurseAdjusted,
            payload: serde_json::json!({}),
            reversal_payload: None,
            performed_by: "admin".into(),
            is_public,
            public_message: None,
            reversal_consumed: false,
            created_at: Utc::now(),
        }
    }

    /// §4.7: a public event reaches both the auction room and the admin room.
    #[test]
    fn public_event_reaches_auction_and_admin_rooms() {
        let broadcaster = Broadcaster::new();
        let auction_id = AuctionId::new();
        let mut auction_rx = broadcaster.subscribe(&Broadcaster::auction_room(auction_id));
        let mut admin_rx = broadcaster.subscribe(&Broadcaster::admin_room(auction_id));

        broadcaster.publish_event(auction_id, &sample_event(auction_id, true));

        assert!(auction_rx.try_recv().is_ok());
        assert!(admin_rx.try_recv().is_ok());
    }

    /// A non-public event (e.g. an admin purse adjustment) only reaches the admin room.
    #[test]
    fn non_public_event_is_admin_only() {
        let broadcaster = Broadcaster::new();
        let auction_id = AuctionId::new();
        let mut auction_rx = broadcaster.subscribe(&Broadcaster::auction_room(auction_id));
        let mut admin_rx = broadcaster.subscribe(&Broadcaster::admin_room(auction_id));

        broadcaster.publish_event(auction_id, &sample_event(auction_id, false));

        assert!(auction_rx.try_recv().is_err());
        assert!(admin_rx.try_recv().is_ok());
    }

    /// §7 "a rejected bid yields a private message to the bidding team": it must not leak into
    /// the public auction room.
    #[test]
    fn bid_rejected_is_private_to_the_bidding_team() {
        let broadcaster = Broadcaster::new();
        let auction_id = AuctionId::new();
        let team_id = TeamId::new();
        let player_id = PlayerId::new();
        let mut team_rx = broadcaster.subscribe(&Broadcaster::team_room(auction_id, team_id));
        let mut auction_rx = broadcaster.subscribe(&Broadcaster::auction_room(auction_id));

        broadcaster.publish_bid_rejected(auction_id, player_id, team_id, 150, BidRejectionReason::BidNotNextIncrement);

        assert!(team_rx.try_recv().is_ok());
        assert!(auction_rx.try_recv().is_err());
    }

    /// §7: an unhealthy notice reaches both the public auction room and the admin room.
    #[test]
    fn unhealthy_notice_reaches_auction_and_admin_rooms() {
        let broadcaster = Broadcaster::new();
        let auction_id = AuctionId::new();
        let mut auction_rx = broadcaster.subscribe(&Broadcaster::auction_room(auction_id));
        let mut admin_rx = broadcaster.subscribe(&Broadcaster::admin_room(auction_id));

        broadcaster.publish_unhealthy(auction_id, "invariant violation".into());

        assert!(auction_rx.try_recv().is_ok());
        assert!(admin_rx.try_recv().is_ok());
    }

    /// A message published with nobody subscribed to a room is simply dropped, not an error.
    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let broadcaster = Broadcaster::new();
        let auction_id = AuctionId::new();
        broadcaster.publish_event(auction_id, &sample_event(auction_id, true));
        broadcaster.publish_timer_tick(auction_id, None, 0);
    }
}
