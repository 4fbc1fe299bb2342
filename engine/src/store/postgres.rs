//! The Postgres-backed realization of the document store assumed by §7a: each of the five
//! collections in §6a is a table keyed by id, carrying its document as a JSONB payload plus the
//! `version` counter CAS writes compare against. The migration-embedding style (SQL baked in via
//! `include_str!`-equivalent constants, applied idempotently against a tracking table) mirrors
//! this codebase's existing `Migration` runner for the other ambient storages.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::ids::{AuctionId, EventId, PlayerId, TeamId, TradeId};
use crate::model::{
    ActionEvent, Auction, AuctionPlayer, AuctionTeam, AuctionTrade, BidAuditEntry, PlayerStatus,
    TradeStatus,
};

use super::{AssignPlayerToTeam, NewEvent, StateStore, StoreError};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "00000000000000_create_collections",
        r#"
        CREATE TABLE IF NOT EXISTS auctions (
            id TEXT PRIMARY KEY,
            slug TEXT UNIQUE NOT NULL,
            version BIGINT NOT NULL,
            doc JSONB NOT NULL
        );
        CREATE TABLE IF NOT EXISTS auction_teams (
            id TEXT PRIMARY KEY,
            auction_id TEXT NOT NULL,
            version BIGINT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            doc JSONB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS auction_teams_by_auction_active ON auction_teams (auction_id, is_active);
        CREATE TABLE IF NOT EXISTS auction_players (
            id TEXT PRIMARY KEY,
            auction_id TEXT NOT NULL,
            version BIGINT NOT NULL,
            status TEXT NOT NULL,
            doc JSONB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS auction_players_by_auction_status ON auction_players (auction_id, status);
        CREATE TABLE IF NOT EXISTS action_events (
            id TEXT PRIMARY KEY,
            auction_id TEXT NOT NULL,
            sequence_number BIGINT NOT NULL,
            doc JSONB NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS action_events_by_auction_seq ON action_events (auction_id, sequence_number);
        CREATE TABLE IF NOT EXISTS auction_event_counters (
            auction_id TEXT PRIMARY KEY,
            next_seq BIGINT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS auction_trades (
            id TEXT PRIMARY KEY,
            auction_id TEXT NOT NULL,
            version BIGINT NOT NULL,
            status TEXT NOT NULL,
            doc JSONB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS auction_trades_by_auction_status ON auction_trades (auction_id, status);
        CREATE TABLE IF NOT EXISTS bid_audit_logs (
            id TEXT PRIMARY KEY,
            auction_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            doc JSONB NOT NULL
        );
        CREATE INDEX IF NOT EXISTS bid_audit_logs_by_auction_time ON bid_audit_logs (auction_id, created_at DESC);
        "#,
    ),
];

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS __schema_migrations (
                version TEXT PRIMARY KEY,
                run_on TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        for (version, script) in MIGRATIONS {
            let already_applied: Option<(String,)> =
                sqlx::query_as("SELECT version FROM __schema_migrations WHERE version = $1")
                    .bind(version)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;

            if already_applied.is_none() {
                log::info!("running migration {version}");
                sqlx::query(script)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                sqlx::query("INSERT INTO __schema_migrations (version) VALUES ($1)")
                    .bind(version)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn next_sequence_number(
        executor: &mut sqlx::PgConnection,
        auction_id: AuctionId,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "INSERT INTO auction_event_counters (auction_id, next_seq) VALUES ($1, 1)
             ON CONFLICT (auction_id) DO UPDATE SET next_seq = auction_event_counters.next_seq + 1
             RETURNING next_seq",
        )
        .bind(auction_id.to_string())
        .fetch_one(executor)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        let next_seq: i64 = row.try_get("next_seq").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(next_seq as u64)
    }
}

fn to_json(value: &impl serde::Serialize) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl StateStore for PostgresStore {
    async fn create_auction(&self, auction: Auction) -> Result<Auction, StoreError> {
        let doc = to_json(&auction)?;
        sqlx::query("INSERT INTO auctions (id, slug, version, doc) VALUES ($1, $2, $3, $4)")
            .bind(auction.id.to_string())
            .bind(&auction.slug)
            .bind(auction.version as i64)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(auction)
    }

    async fn get_auction(&self, id: AuctionId) -> Result<Auction, StoreError> {
        let row = sqlx::query("SELECT doc FROM auctions WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound { entity: "auction", id: id.to_string() })?;
        let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
        from_json(doc)
    }

    async fn cas_update_auction(&self, mut auction: Auction) -> Result<Auction, StoreError> {
        let expected_version = auction.version as i64;
        auction.version += 1;
        let doc = to_json(&auction)?;
        let result = sqlx::query(
            "UPDATE auctions SET doc = $1, version = $2, slug = $3 WHERE id = $4 AND version = $5",
        )
        .bind(doc)
        .bind(auction.version as i64)
        .bind(&auction.slug)
        .bind(auction.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            self.get_auction(auction.id).await?;
            return Err(StoreError::StaleVersion { entity: "auction", id: auction.id.to_string() });
        }
        Ok(auction)
    }

    async fn create_team(&self, team: AuctionTeam) -> Result<AuctionTeam, StoreError> {
        let doc = to_json(&team)?;
        sqlx::query(
            "INSERT INTO auction_teams (id, auction_id, version, is_active, doc) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(team.id.to_string())
        .bind(team.auction_id.to_string())
        .bind(team.version as i64)
        .bind(team.is_active)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(team)
    }

    async fn get_team(&self, auction_id: AuctionId, id: TeamId) -> Result<AuctionTeam, StoreError> {
        let row = sqlx::query("SELECT doc FROM auction_teams WHERE auction_id = $1 AND id = $2")
            .bind(auction_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound { entity: "team", id: id.to_string() })?;
        let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
        from_json(doc)
    }

    async fn find_teams_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionTeam>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM auction_teams WHERE auction_id = $1")
            .bind(auction_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
                from_json(doc)
            })
            .collect()
    }

    async fn cas_update_team(&self, mut team: AuctionTeam) -> Result<AuctionTeam, StoreError> {
        let expected_version = team.version as i64;
        team.version += 1;
        let doc = to_json(&team)?;
        let result = sqlx::query(
            "UPDATE auction_teams SET doc = $1, version = $2, is_active = $3 WHERE id = $4 AND version = $5",
        )
        .bind(doc)
        .bind(team.version as i64)
        .bind(team.is_active)
        .bind(team.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StaleVersion { entity: "team", id: team.id.to_string() });
        }
        Ok(team)
    }

    async fn create_player(&self, player: AuctionPlayer) -> Result<AuctionPlayer, StoreError> {
        let doc = to_json(&player)?;
        sqlx::query(
            "INSERT INTO auction_players (id, auction_id, version, status, doc) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(player.id.to_string())
        .bind(player.auction_id.to_string())
        .bind(player.version as i64)
        .bind(status_label(player.status))
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(player)
    }

    async fn get_player(&self, auction_id: AuctionId, id: PlayerId) -> Result<AuctionPlayer, StoreError> {
        let row = sqlx::query("SELECT doc FROM auction_players WHERE auction_id = $1 AND id = $2")
            .bind(auction_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound { entity: "player", id: id.to_string() })?;
        let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
        from_json(doc)
    }

    async fn find_players_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionPlayer>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM auction_players WHERE auction_id = $1")
            .bind(auction_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
                from_json(doc)
            })
            .collect()
    }

    async fn find_players_by_auction_and_status(
        &self,
        auction_id: AuctionId,
        status: PlayerStatus,
    ) -> Result<Vec<AuctionPlayer>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM auction_players WHERE auction_id = $1 AND status = $2")
            .bind(auction_id.to_string())
            .bind(status_label(status))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
                from_json(doc)
            })
            .collect()
    }

    async fn cas_update_player(&self, mut player: AuctionPlayer) -> Result<AuctionPlayer, StoreError> {
        let expected_version = player.version as i64;
        player.version += 1;
        let doc = to_json(&player)?;
        let result = sqlx::query(
            "UPDATE auction_players SET doc = $1, version = $2, status = $3 WHERE id = $4 AND version = $5",
        )
        .bind(doc)
        .bind(player.version as i64)
        .bind(status_label(player.status))
        .bind(player.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StaleVersion { entity: "player", id: player.id.to_string() });
        }
        Ok(player)
    }

    async fn assign_player_to_team(&self, op: AssignPlayerToTeam) -> Result<ActionEvent, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut auction = op.auction;
        let auction_expected = auction.version as i64;
        auction.version += 1;
        let auction_doc = to_json(&auction)?;
        let result = sqlx::query("UPDATE auctions SET doc = $1, version = $2 WHERE id = $3 AND version = $4")
            .bind(auction_doc)
            .bind(auction.version as i64)
            .bind(auction.id.to_string())
            .bind(auction_expected)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::StaleVersion { entity: "auction", id: auction.id.to_string() });
        }

        let mut team = op.team;
        let team_expected = team.version as i64;
        team.version += 1;
        let team_doc = to_json(&team)?;
        let result = sqlx::query("UPDATE auction_teams SET doc = $1, version = $2 WHERE id = $3 AND version = $4")
            .bind(team_doc)
            .bind(team.version as i64)
            .bind(team.id.to_string())
            .bind(team_expected)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::StaleVersion { entity: "team", id: team.id.to_string() });
        }

        let mut player = op.player;
        let player_expected = player.version as i64;
        player.version += 1;
        let player_doc = to_json(&player)?;
        let result = sqlx::query(
            "UPDATE auction_players SET doc = $1, version = $2, status = $3 WHERE id = $4 AND version = $5",
        )
        .bind(player_doc)
        .bind(player.version as i64)
        .bind(status_label(player.status))
        .bind(player.id.to_string())
        .bind(player_expected)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::StaleVersion { entity: "player", id: player.id.to_string() });
        }

        let sequence_number = Self::next_sequence_number(&mut tx, op.event.auction_id).await?;
        let event = ActionEvent {
            id: EventId::new(),
            auction_id: op.event.auction_id,
            sequence_number,
            event_type: op.event.event_type,
            payload: op.event.payload,
            reversal_payload: op.event.reversal_payload,
            performed_by: op.event.performed_by,
            is_public: op.event.is_public,
            public_message: op.event.public_message,
            reversal_consumed: false,
            created_at: chrono::Utc::now(),
        };
        let event_doc = to_json(&event)?;
        sqlx::query("INSERT INTO action_events (id, auction_id, sequence_number, doc) VALUES ($1, $2, $3, $4)")
            .bind(event.id.to_string())
            .bind(event.auction_id.to_string())
            .bind(event.sequence_number as i64)
            .bind(event_doc)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(event)
    }

    async fn append_event(&self, new_event: NewEvent) -> Result<ActionEvent, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        let sequence_number = Self::next_sequence_number(&mut tx, new_event.auction_id).await?;
        let event = ActionEvent {
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
        };
        let doc = to_json(&event)?;
        sqlx::query("INSERT INTO action_events (id, auction_id, sequence_number, doc) VALUES ($1, $2, $3, $4)")
            .bind(event.id.to_string())
            .bind(event.auction_id.to_string())
            .bind(event.sequence_number as i64)
            .bind(doc)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(event)
    }

    async fn tail_events(&self, auction_id: AuctionId, k: usize) -> Result<Vec<ActionEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM action_events WHERE auction_id = $1 ORDER BY sequence_number DESC LIMIT $2",
        )
        .bind(auction_id.to_string())
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
                from_json(doc)
            })
            .collect()
    }

    async fn latest_undoable_event(
        &self,
        auction_id: AuctionId,
        max_undo_actions: u32,
    ) -> Result<Option<ActionEvent>, StoreError> {
        let window = self.tail_events(auction_id, max_undo_actions.max(1) as usize).await?;
        Ok(window.into_iter().find(|e| e.event_type.is_reversible() && !e.reversal_consumed))
    }

    async fn mark_event_reversal_consumed(&self, id: EventId) -> Result<(), StoreError> {
        let row = sqlx::query("SELECT doc FROM action_events WHERE id = $1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound { entity: "event", id: id.to_string() })?;
        let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
        let mut event: ActionEvent = from_json(doc)?;
        event.reversal_consumed = true;
        let doc = to_json(&event)?;
        sqlx::query("UPDATE action_events SET doc = $1 WHERE id = $2")
            .bind(doc)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn create_trade(&self, trade: AuctionTrade) -> Result<AuctionTrade, StoreError> {
        let doc = to_json(&trade)?;
        sqlx::query(
            "INSERT INTO auction_trades (id, auction_id, version, status, doc) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(trade.id.to_string())
        .bind(trade.auction_id.to_string())
        .bind(trade.version as i64)
        .bind(trade_status_label(trade.status))
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(trade)
    }

    async fn get_trade(&self, auction_id: AuctionId, id: TradeId) -> Result<AuctionTrade, StoreError> {
        let row = sqlx::query("SELECT doc FROM auction_trades WHERE auction_id = $1 AND id = $2")
            .bind(auction_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .ok_or(StoreError::NotFound { entity: "trade", id: id.to_string() })?;
        let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
        from_json(doc)
    }

    async fn find_trades_by_auction_and_status(
        &self,
        auction_id: AuctionId,
        status: TradeStatus,
    ) -> Result<Vec<AuctionTrade>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM auction_trades WHERE auction_id = $1 AND status = $2")
            .bind(auction_id.to_string())
            .bind(trade_status_label(status))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
                from_json(doc)
            })
            .collect()
    }

    async fn find_trades_by_auction(&self, auction_id: AuctionId) -> Result<Vec<AuctionTrade>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM auction_trades WHERE auction_id = $1")
            .bind(auction_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let doc: serde_json::Value = row.try_get("doc").map_err(|e| StoreError::Backend(e.to_string()))?;
                from_json(doc)
            })
            .collect()
    }

    async fn cas_update_trade(&self, mut trade: AuctionTrade) -> Result<AuctionTrade, StoreError> {
        let expected_version = trade.version as i64;
        trade.version += 1;
        let doc = to_json(&trade)?;
        let result = sqlx::query(
            "UPDATE auction_trades SET doc = $1, version = $2, status = $3 WHERE id = $4 AND version = $5",
        )
        .bind(doc)
        .bind(trade.version as i64)
        .bind(trade_status_label(trade.status))
        .bind(trade.id.to_string())
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StaleVersion { entity: "trade", id: trade.id.to_string() });
        }
        Ok(trade)
    }

    async fn append_bid_audit(&self, entry: BidAuditEntry) -> Result<(), StoreError> {
        let doc = to_json(&entry)?;
        sqlx::query("INSERT INTO bid_audit_logs (id, auction_id, created_at, doc) VALUES ($1, $2, $3, $4)")
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(entry.auction_id.to_string())
            .bind(entry.timestamp)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

fn status_label(status: PlayerStatus) -> &'static str {
    match status {
        PlayerStatus::Pool => "pool",
        PlayerStatus::Live => "live",
        PlayerStatus::Sold => "sold",
        PlayerStatus::Unsold => "unsold",
        PlayerStatus::Disqualified => "disqualified",
    }
}

fn trade_status_label(status: TradeStatus) -> &'static str {
    match status {
        TradeStatus::PendingCounterparty => "pending_counterparty",
        TradeStatus::BothAgreed => "both_agreed",
        TradeStatus::Executed => "executed",
        TradeStatus::Rejected => "rejected",
        TradeStatus::Withdrawn => "withdrawn",
        TradeStatus::Cancelled => "cancelled",
        TradeStatus::Expired => "expired",
    }
}
