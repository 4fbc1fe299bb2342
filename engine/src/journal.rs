//! The Event Journal (C2, §4.2): the single append-only record of everything that has ever
//! happened to an auction. Every other component reaches the store's event table only through
//! here, so "strictly monotonic, gap-free `sequence_number`" and "reversible events freeze once
//! consumed" are enforced in one place instead of at each call site.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::EngineError;
use crate::ids::{AuctionId, EventId};
use crate::model::{ActionEvent, ActionEventType};
use crate::store::{NewEvent, StateStore};

pub struct EventJournal {
    store: Arc<dyn StateStore>,
}

impl EventJournal {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn record(
        event_type: ActionEventType,
        auction_id: AuctionId,
        payload: Value,
        reversal_payload: Option<Value>,
        performed_by: impl Into<String>,
        is_public: bool,
        public_message: Option<String>,
    ) -> NewEvent {
        NewEvent {
            auction_id,
            event_type,
            payload,
            reversal_payload,
            performed_by: performed_by.into(),
            is_public,
            public_message,
        }
    }

    pub async fn append(&self, event: NewEvent) -> Result<ActionEvent, EngineError> {
        Ok(self.store.append_event(event).await?)
    }

    pub async fn tail(&self, auction_id: AuctionId, k: usize) -> Result<Vec<ActionEvent>, EngineError> {
        Ok(self.store.tail_events(auction_id, k).await?)
    }

    /// The event `applyReversal` would pop, without mutating anything: finding the target is the
    /// journal's job, but actually unwinding it touches the auction/team/player entities, which
    /// is the Lifecycle Coordinator's responsibility (§4.5 `undo`) since it alone knows how to
    /// interpret each event type's `reversalPayload`.
    pub async fn latest_undoable(
        &self,
        auction_id: AuctionId,
        max_undo_actions: u32,
    ) -> Result<Option<ActionEvent>, EngineError> {
        Ok(self.store.latest_undoable_event(auction_id, max_undo_actions).await?)
    }

    pub async fn freeze_reversal(&self, id: EventId) -> Result<(), EngineError> {
        Ok(self.store.mark_event_reversal_consumed(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AuctionId;
    use crate::store::MemoryStore;

    fn player_sold_event(auction_id: AuctionId) -> NewEvent {
        EventJournal::record(
            ActionEventType::PlayerSold,
            auction_id,
            serde_json::json!({}),
            Some(serde_json::json!({})),
            "system",
            true,
            None,
        )
    }

    /// §3/§8 invariant 3: sequence numbers are strictly monotonic and gap-free per auction.
    #[tokio::test]
    async fn sequence_numbers_are_monotonic_and_gap_free() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let journal = EventJournal::new(store);
        let auction_id = AuctionId::new();

        let mut seen = Vec::new();
        for _ in 0..5 {
            let event = journal.append(player_sold_event(auction_id)).await.unwrap();
            seen.push(event.sequence_number);
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    /// Two auctions' sequences are independent (§5 "between auctions there is no ordering").
    #[tokio::test]
    async fn sequence_numbers_are_independent_per_auction() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let journal = EventJournal::new(store);
        let a = AuctionId::new();
        let b = AuctionId::new();

        journal.append(player_sold_event(a)).await.unwrap();
        let first_b = journal.append(player_sold_event(b)).await.unwrap();
        let second_a = journal.append(player_sold_event(a)).await.unwrap();

        assert_eq!(first_b.sequence_number, 1);
        assert_eq!(second_a.sequence_number, 2);
    }

    /// §4.2: only the last `max_undo_actions` reversible events are eligible; once one is
    /// consumed, `latest_undoable` skips past it to the next unconsumed reversible event.
    #[tokio::test]
    async fn latest_undoable_respects_window_and_consumption() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let journal = EventJournal::new(store);
        let auction_id = AuctionId::new();

        let first = journal.append(player_sold_event(auction_id)).await.unwrap();
        let second = journal.append(player_sold_event(auction_id)).await.unwrap();

        let undoable = journal.latest_undoable(auction_id, 5).await.unwrap().unwrap();
        assert_eq!(undoable.id, second.id);

        journal.freeze_reversal(second.id).await.unwrap();
        let undoable = journal.latest_undoable(auction_id, 5).await.unwrap().unwrap();
        assert_eq!(undoable.id, first.id);

        journal.freeze_reversal(first.id).await.unwrap();
        assert!(journal.latest_undoable(auction_id, 5).await.unwrap().is_none());
    }

    /// A reversible event older than the `max_undo_actions` window is frozen out even though it
    /// was never explicitly consumed.
    #[tokio::test]
    async fn events_outside_the_undo_window_are_unreachable() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let journal = EventJournal::new(store);
        let auction_id = AuctionId::new();

        journal.append(player_sold_event(auction_id)).await.unwrap();
        // Two non-reversible fillers push the reversible event outside a window of 1.
        journal
            .append(EventJournal::record(ActionEventType::PhaseAdvanced, auction_id, serde_json::json!({}), None, "system", true, None))
            .await
            .unwrap();
        journal
            .append(EventJournal::record(ActionEventType::PhaseAdvanced, auction_id, serde_json::json!({}), None, "system", true, None))
            .await
            .unwrap();

        assert!(journal.latest_undoable(auction_id, 1).await.unwrap().is_none());
        assert!(journal.latest_undoable(auction_id, 3).await.unwrap().is_some());
    }
}
