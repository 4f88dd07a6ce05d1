//! Authoritative persistence: tables (with a denormalized players view) and
//! the per-table append-only event log.
//!
//! Row-locks the table record up front (`BEGIN IMMEDIATE` on SQLite),
//! computes the next contiguous sequence number inside that lock, and
//! commits events + state together.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::Event;
use crate::error::{AppError, Result};
use crate::table::aggregate::{Table, TableStatus};

#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    pub status: Option<Vec<TableStatus>>,
    pub game_name: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

type ModifyFn = Box<dyn FnOnce(&mut Table) -> Result<()> + Send>;
type ModifyDuringGameActionFn = Box<dyn FnOnce(&mut Table) -> Result<Vec<Event>> + Send>;

/// Contract for table storage. Implementations own both the authoritative
/// state blob and the append-only event log; `modify*` methods acquire
/// whatever row lock the backend offers before applying the caller's
/// closure, so per-table mutation is always serialized (§5).
#[async_trait]
pub trait GameTableRepository: Send + Sync {
    async fn create(&self, table: Table) -> Result<Uuid>;
    async fn find_by_id(&self, id: Uuid) -> Result<Table>;
    async fn modify(&self, id: Uuid, f: ModifyFn) -> Result<Table>;
    async fn modify_during_game_action(&self, id: Uuid, f: ModifyDuringGameActionFn) -> Result<(Vec<Event>, Table)>;
    async fn find_many(&self, filter: TableFilter) -> Result<Vec<Table>>;
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait GameEventRepository: Send + Sync {
    async fn find_many(&self, table_id: Uuid, start: Option<u64>, end: Option<u64>) -> Result<Vec<Event>>;
}

pub mod mock {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    /// `tokio::sync::Mutex<HashMap<..>>`-backed repository: the default for
    /// the `standalone` feature profile without a DB file, and the backend
    /// every unit test above the repository layer uses.
    #[derive(Default)]
    pub struct InMemoryTableRepository {
        tables: Mutex<HashMap<Uuid, Table>>,
        events: Mutex<HashMap<Uuid, Vec<Event>>>,
    }

    impl InMemoryTableRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl GameTableRepository for InMemoryTableRepository {
        async fn create(&self, table: Table) -> Result<Uuid> {
            let id = table.id;
            let mut tables = self.tables.lock().await;
            if tables.contains_key(&id) {
                return Err(AppError::internal("duplicate_table_id", format!("table {id} already exists")));
            }
            tables.insert(id, table);
            self.events.lock().await.entry(id).or_default();
            Ok(id)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Table> {
            self.tables
                .lock()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| AppError::not_found(format!("table {id}")))
        }

        async fn modify(&self, id: Uuid, f: ModifyFn) -> Result<Table> {
            let mut tables = self.tables.lock().await;
            let table = tables.get_mut(&id).ok_or_else(|| AppError::not_found(format!("table {id}")))?;
            f(table)?;
            table.updated_at = chrono::Utc::now();
            Ok(table.clone())
        }

        async fn modify_during_game_action(&self, id: Uuid, f: ModifyDuringGameActionFn) -> Result<(Vec<Event>, Table)> {
            let mut tables = self.tables.lock().await;
            let mut events_log = self.events.lock().await;

            let table = tables.get_mut(&id).ok_or_else(|| AppError::not_found(format!("table {id}")))?;
            let log = events_log.entry(id).or_default();
            let expected_next = log.last().map(|e| e.seq_number + 1).unwrap_or(1);

            let mut scratch = table.clone();
            let events = f(&mut scratch)?;

            if let Some(first) = events.first() {
                if first.seq_number != expected_next {
                    return Err(AppError::internal(
                        "sequence_conflict",
                        format!("expected next sequence {expected_next}, got {}", first.seq_number),
                    ));
                }
            }

            log.extend(events.iter().cloned());
            scratch.updated_at = chrono::Utc::now();
            *table = scratch.clone();
            Ok((events, scratch))
        }

        async fn find_many(&self, filter: TableFilter) -> Result<Vec<Table>> {
            let tables = self.tables.lock().await;
            let mut matched: Vec<Table> = tables
                .values()
                .filter(|t| filter.game_name.as_deref().map(|name| name == t.game_name).unwrap_or(true))
                .filter(|t| {
                    filter
                        .status
                        .as_ref()
                        .map(|statuses| statuses.contains(&t.status))
                        .unwrap_or(true)
                })
                .cloned()
                .collect();
            matched.sort_by_key(|t| t.created_at);
            let offset = filter.offset.unwrap_or(0) as usize;
            let limit = filter.limit.unwrap_or(u32::MAX) as usize;
            Ok(matched.into_iter().skip(offset).take(limit).collect())
        }

        async fn delete(&self, id: Uuid) -> Result<()> {
            self.tables.lock().await.remove(&id);
            self.events.lock().await.remove(&id);
            Ok(())
        }
    }

    #[async_trait]
    impl GameEventRepository for InMemoryTableRepository {
        async fn find_many(&self, table_id: Uuid, start: Option<u64>, end: Option<u64>) -> Result<Vec<Event>> {
            let events = self.events.lock().await;
            let log = events.get(&table_id).cloned().unwrap_or_default();
            Ok(log
                .into_iter()
                .filter(|e| start.map(|s| e.seq_number >= s).unwrap_or(true))
                .filter(|e| end.map(|e_| e.seq_number <= e_).unwrap_or(true))
                .collect())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::{GameConfig, TableConfig};

        fn blank_table() -> Table {
            Table::new(
                Uuid::new_v4(),
                "owner-1".into(),
                "five_hundred".into(),
                GameConfig::default(),
                TableConfig::default(),
                chrono::Utc::now(),
            )
        }

        #[tokio::test]
        async fn create_then_find_round_trips() {
            let repo = InMemoryTableRepository::new();
            let table = blank_table();
            let id = repo.create(table.clone()).await.unwrap();
            let found = repo.find_by_id(id).await.unwrap();
            assert_eq!(found.owner_id, table.owner_id);
        }

        #[tokio::test]
        async fn modify_during_game_action_rejects_out_of_order_sequence() {
            let repo = InMemoryTableRepository::new();
            let id = repo.create(blank_table()).await.unwrap();
            let result = repo
                .modify_during_game_action(
                    id,
                    Box::new(|_table| {
                        Ok(vec![Event::new(5, crate::domain::EventKind::HiddenCardsTaken)])
                    }),
                )
                .await;
            assert!(matches!(result, Err(AppError::Internal { reason, .. }) if reason == "sequence_conflict"));
        }

        #[tokio::test]
        async fn modify_during_game_action_appends_contiguous_events() {
            let repo = InMemoryTableRepository::new();
            let id = repo.create(blank_table()).await.unwrap();
            let (events, _) = repo
                .modify_during_game_action(
                    id,
                    Box::new(|_table| Ok(vec![Event::new(1, crate::domain::EventKind::HiddenCardsTaken)])),
                )
                .await
                .unwrap();
            assert_eq!(events.len(), 1);
            let log = GameEventRepository::find_many(&repo, id, None, None).await.unwrap();
            assert_eq!(log.len(), 1);
        }

        #[tokio::test]
        async fn find_many_filters_by_status() {
            let repo = InMemoryTableRepository::new();
            repo.create(blank_table()).await.unwrap();
            let mut finished = blank_table();
            finished.status = crate::table::aggregate::TableStatus::Finished;
            repo.create(finished).await.unwrap();
            let found = repo
                .find_many(TableFilter {
                    status: Some(vec![crate::table::aggregate::TableStatus::Finished]),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(found.len(), 1);
        }
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    use sea_query::{Expr, Iden, Order, Query, SqliteQueryBuilder};
    use sqlx::{Row, SqlitePool};

    use super::*;

    #[derive(Iden)]
    enum Tables {
        Table,
        Id,
        OwnerId,
        GameName,
        Status,
        StateBlob,
        LastEventSeq,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum TableEvents {
        Table,
        TableId,
        SequenceNumber,
        EventData,
        CreatedAt,
    }

    #[derive(Iden)]
    enum TablePlayers {
        Table,
        TableId,
        PlayerId,
        Seat,
        ScreenName,
        UserId,
        BotKind,
    }

    pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS tables (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    game_name TEXT NOT NULL,
    status TEXT NOT NULL,
    state_blob TEXT NOT NULL,
    last_event_seq INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS table_events (
    table_id TEXT NOT NULL,
    sequence_number INTEGER NOT NULL,
    event_data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (table_id, sequence_number)
);
CREATE TABLE IF NOT EXISTS table_players (
    table_id TEXT NOT NULL,
    player_id TEXT NOT NULL,
    seat INTEGER NOT NULL,
    screen_name TEXT NOT NULL,
    user_id TEXT,
    bot_kind TEXT,
    PRIMARY KEY (table_id, player_id)
);
"#;

    /// SQLite-backed repository. Acquires the write lock with `BEGIN
    /// IMMEDIATE` before reading the current max sequence, exactly as the
    /// teacher's `SqliteEventStore::add` does, to avoid the
    /// DEFERRED-transaction upgrade deadlock that can occur under
    /// concurrent writers.
    pub struct SqliteTableRepository {
        pool: SqlitePool,
    }

    impl SqliteTableRepository {
        pub fn new(pool: SqlitePool) -> Self {
            SqliteTableRepository { pool }
        }

        pub async fn init(&self) -> Result<()> {
            sqlx::query(CREATE_TABLES).execute(&self.pool).await?;
            Ok(())
        }

        async fn load_row(&self, id: Uuid, conn: impl sqlx::SqliteExecutor<'_>) -> Result<Table> {
            let query = Query::select()
                .column(Tables::StateBlob)
                .from(Tables::Table)
                .and_where(Expr::col(Tables::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            let row = sqlx::query(&query)
                .fetch_optional(conn)
                .await?
                .ok_or_else(|| AppError::not_found(format!("table {id}")))?;
            let blob: String = row.get("state_blob");
            Ok(serde_json::from_str(&blob)?)
        }

        fn upsert_players_query(table: &Table) -> Vec<String> {
            let delete = Query::delete()
                .from_table(TablePlayers::Table)
                .and_where(Expr::col(TablePlayers::TableId).eq(table.id.to_string()))
                .to_string(SqliteQueryBuilder);
            let mut statements = vec![delete];
            for player in &table.players {
                let insert = Query::insert()
                    .into_table(TablePlayers::Table)
                    .columns([
                        TablePlayers::TableId,
                        TablePlayers::PlayerId,
                        TablePlayers::Seat,
                        TablePlayers::ScreenName,
                        TablePlayers::UserId,
                        TablePlayers::BotKind,
                    ])
                    .values_panic([
                        table.id.to_string().into(),
                        player.player_id.clone().into(),
                        (player.seat.0 as i64).into(),
                        player.screen_name.clone().into(),
                        player.user_id.clone().into(),
                        player.bot_kind.clone().into(),
                    ])
                    .to_string(SqliteQueryBuilder);
                statements.push(insert);
            }
            statements
        }
    }

    #[async_trait]
    impl GameTableRepository for SqliteTableRepository {
        async fn create(&self, table: Table) -> Result<Uuid> {
            let blob = serde_json::to_string(&table)?;
            let mut tx = self.pool.begin().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *tx).await.ok();
            let insert = Query::insert()
                .into_table(Tables::Table)
                .columns([
                    Tables::Id,
                    Tables::OwnerId,
                    Tables::GameName,
                    Tables::Status,
                    Tables::StateBlob,
                    Tables::LastEventSeq,
                    Tables::CreatedAt,
                    Tables::UpdatedAt,
                ])
                .values_panic([
                    table.id.to_string().into(),
                    table.owner_id.clone().into(),
                    table.game_name.clone().into(),
                    format!("{:?}", table.status).into(),
                    blob.into(),
                    (table.last_event_seq as i64).into(),
                    table.created_at.to_rfc3339().into(),
                    table.updated_at.to_rfc3339().into(),
                ])
                .to_string(SqliteQueryBuilder);
            sqlx::query(&insert).execute(&mut *tx).await?;
            for stmt in Self::upsert_players_query(&table) {
                sqlx::query(&stmt).execute(&mut *tx).await?;
            }
            tx.commit().await?;
            Ok(table.id)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Table> {
            self.load_row(id, &self.pool).await
        }

        async fn modify(&self, id: Uuid, f: ModifyFn) -> Result<Table> {
            let mut tx = self.pool.begin().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *tx).await.ok();
            let mut table = self.load_row(id, &mut *tx).await?;
            f(&mut table)?;
            table.updated_at = chrono::Utc::now();
            let blob = serde_json::to_string(&table)?;
            let update = Query::update()
                .table(Tables::Table)
                .values([
                    (Tables::Status, format!("{:?}", table.status).into()),
                    (Tables::StateBlob, blob.into()),
                    (Tables::UpdatedAt, table.updated_at.to_rfc3339().into()),
                ])
                .and_where(Expr::col(Tables::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&update).execute(&mut *tx).await?;
            for stmt in Self::upsert_players_query(&table) {
                sqlx::query(&stmt).execute(&mut *tx).await?;
            }
            tx.commit().await?;
            Ok(table)
        }

        async fn modify_during_game_action(&self, id: Uuid, f: ModifyDuringGameActionFn) -> Result<(Vec<Event>, Table)> {
            let mut tx = self.pool.begin().await?;
            sqlx::query("BEGIN IMMEDIATE").execute(&mut *tx).await.ok();

            let max_seq_query = Query::select()
                .expr(Expr::col(TableEvents::SequenceNumber).max())
                .from(TableEvents::Table)
                .and_where(Expr::col(TableEvents::TableId).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            let max_seq_row = sqlx::query(&max_seq_query).fetch_optional(&mut *tx).await?;
            let expected_next: i64 = max_seq_row
                .and_then(|row| row.get::<Option<i64>, _>(0))
                .map(|max| max + 1)
                .unwrap_or(1);

            let mut table = self.load_row(id, &mut *tx).await?;
            let events = f(&mut table)?;

            if let Some(first) = events.first() {
                if first.seq_number as i64 != expected_next {
                    return Err(AppError::internal(
                        "sequence_conflict",
                        format!("expected next sequence {expected_next}, got {}", first.seq_number),
                    ));
                }
            }

            for event in &events {
                let event_json = serde_json::to_string(event)?;
                let insert = Query::insert()
                    .into_table(TableEvents::Table)
                    .columns([TableEvents::TableId, TableEvents::SequenceNumber, TableEvents::EventData, TableEvents::CreatedAt])
                    .values_panic([
                        id.to_string().into(),
                        (event.seq_number as i64).into(),
                        event_json.into(),
                        chrono::Utc::now().to_rfc3339().into(),
                    ])
                    .to_string(SqliteQueryBuilder);
                sqlx::query(&insert).execute(&mut *tx).await?;
            }

            table.updated_at = chrono::Utc::now();
            let blob = serde_json::to_string(&table)?;
            let update = Query::update()
                .table(Tables::Table)
                .values([
                    (Tables::Status, format!("{:?}", table.status).into()),
                    (Tables::StateBlob, blob.into()),
                    (Tables::LastEventSeq, (table.last_event_seq as i64).into()),
                    (Tables::UpdatedAt, table.updated_at.to_rfc3339().into()),
                ])
                .and_where(Expr::col(Tables::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&update).execute(&mut *tx).await?;
            for stmt in Self::upsert_players_query(&table) {
                sqlx::query(&stmt).execute(&mut *tx).await?;
            }

            tx.commit().await?;
            Ok((events, table))
        }

        async fn find_many(&self, filter: TableFilter) -> Result<Vec<Table>> {
            let mut query = Query::select();
            query.column(Tables::Id).column(Tables::StateBlob).from(Tables::Table);
            if let Some(game_name) = &filter.game_name {
                query.and_where(Expr::col(Tables::GameName).eq(game_name.as_str()));
            }
            if let Some(statuses) = &filter.status {
                let values: Vec<String> = statuses.iter().map(|s| format!("{s:?}")).collect();
                query.and_where(Expr::col(Tables::Status).is_in(values));
            }
            query.order_by(Tables::CreatedAt, Order::Asc);
            if let Some(limit) = filter.limit {
                query.limit(limit as u64);
            }
            if let Some(offset) = filter.offset {
                query.offset(offset as u64);
            }
            let sql = query.to_string(SqliteQueryBuilder);
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            rows.into_iter()
                .map(|row| {
                    let blob: String = row.get("state_blob");
                    serde_json::from_str(&blob).map_err(AppError::from)
                })
                .collect()
        }

        async fn delete(&self, id: Uuid) -> Result<()> {
            let query = Query::delete()
                .from_table(Tables::Table)
                .and_where(Expr::col(Tables::Id).eq(id.to_string()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&query).execute(&self.pool).await?;
            Ok(())
        }
    }

    #[async_trait]
    impl GameEventRepository for SqliteTableRepository {
        async fn find_many(&self, table_id: Uuid, start: Option<u64>, end: Option<u64>) -> Result<Vec<Event>> {
            let mut query = Query::select();
            query
                .column(TableEvents::EventData)
                .from(TableEvents::Table)
                .and_where(Expr::col(TableEvents::TableId).eq(table_id.to_string()));
            if let Some(start) = start {
                query.and_where(Expr::col(TableEvents::SequenceNumber).gte(start as i64));
            }
            if let Some(end) = end {
                query.and_where(Expr::col(TableEvents::SequenceNumber).lte(end as i64));
            }
            query.order_by(TableEvents::SequenceNumber, Order::Asc);
            let sql = query.to_string(SqliteQueryBuilder);
            let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
            rows.into_iter()
                .map(|row| {
                    let data: String = row.get("event_data");
                    serde_json::from_str(&data).map_err(AppError::from)
                })
                .collect()
        }
    }
}
