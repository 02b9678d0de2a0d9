//! SQLite-backed implementation of [`ModerationRepository`].
//!
//! `bans` and `mutes` share one row layout, `(player, time, reason,
//! moderator)`, so every operation is written once against the table name
//! returned by [`ModerationKind::table`].

use sqlx::SqliteConnection;

use super::{codec, log_failure, Database};
use crate::model::{ModerationKind, ModerationRecord, PlayerId};
use crate::traits::{ConnectionProvider, ModerationRepository};
use crate::StoreError;

type ModerationRow = (String, i64, String, Option<String>);

pub struct SqliteModerationRepository<P = Database> {
    provider: P,
}

impl<P: ConnectionProvider> SqliteModerationRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

fn record_from_row(
    (player, time, reason, moderator): ModerationRow,
) -> Result<ModerationRecord, StoreError> {
    Ok(ModerationRecord {
        player: player.parse()?,
        expiry: codec::decode_expiry(time),
        reason,
        moderator,
    })
}

async fn upsert_record(
    conn: &mut SqliteConnection,
    table: &str,
    record: &ModerationRecord,
) -> Result<(), StoreError> {
    let query =
        format!("INSERT OR REPLACE INTO {table} (player, time, reason, moderator) VALUES (?, ?, ?, ?)");
    sqlx::query(&query)
        .bind(record.player.to_string())
        .bind(codec::encode_expiry(record.expiry))
        .bind(&record.reason)
        .bind(&record.moderator)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl<P: ConnectionProvider> ModerationRepository for SqliteModerationRepository<P> {
    async fn get(
        &self,
        kind: ModerationKind,
        player: PlayerId,
    ) -> Result<Option<ModerationRecord>, StoreError> {
        let table = kind.table()?;
        async {
            let mut conn = self.provider.acquire().await?;
            let query =
                format!("SELECT player, time, reason, moderator FROM {table} WHERE player = ?");
            let row: Option<ModerationRow> = sqlx::query_as(&query)
                .bind(player.to_string())
                .fetch_optional(&mut *conn)
                .await?;
            row.map(record_from_row).transpose()
        }
        .await
        .inspect_err(log_failure("get", table))
    }

    async fn list(
        &self,
        kind: ModerationKind,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ModerationRecord>, StoreError> {
        let table = kind.table()?;
        async {
            let mut conn = self.provider.acquire().await?;
            let query =
                format!("SELECT player, time, reason, moderator FROM {table} LIMIT ? OFFSET ?");
            let rows: Vec<ModerationRow> = sqlx::query_as(&query)
                .bind(i64::from(limit))
                .bind(i64::from(offset))
                .fetch_all(&mut *conn)
                .await?;

            let records: Vec<ModerationRecord> = rows
                .into_iter()
                .filter_map(|row| match record_from_row(row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(table, error = %e, "Skipping moderation row with malformed player");
                        None
                    }
                })
                .collect();
            Ok::<_, StoreError>(records)
        }
        .await
        .inspect_err(log_failure("list", table))
    }

    async fn upsert(&self, kind: ModerationKind, record: &ModerationRecord) -> Result<(), StoreError> {
        let table = kind.table()?;
        async {
            let mut conn = self.provider.acquire().await?;
            upsert_record(&mut conn, table, record).await
        }
        .await
        .inspect_err(log_failure("upsert", table))
    }

    async fn delete(&self, kind: ModerationKind, player: PlayerId) -> Result<(), StoreError> {
        let table = kind.table()?;
        async {
            let mut conn = self.provider.acquire().await?;
            let query = format!("DELETE FROM {table} WHERE player = ?");
            sqlx::query(&query)
                .bind(player.to_string())
                .execute(&mut *conn)
                .await?;
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(log_failure("delete", table))
    }

    async fn count(&self, kind: ModerationKind) -> Result<u64, StoreError> {
        let table = kind.table()?;
        async {
            let mut conn = self.provider.acquire().await?;
            let query = format!("SELECT COUNT(*) FROM {table}");
            let row: (i64,) = sqlx::query_as(&query).fetch_one(&mut *conn).await?;
            Ok::<_, StoreError>(row.0 as u64)
        }
        .await
        .inspect_err(log_failure("count", table))
    }

    async fn players(&self, kind: ModerationKind) -> Result<Vec<PlayerId>, StoreError> {
        let table = kind.table()?;
        async {
            let mut conn = self.provider.acquire().await?;
            let query = format!("SELECT player FROM {table}");
            let rows: Vec<(Option<String>,)> =
                sqlx::query_as(&query).fetch_all(&mut *conn).await?;

            let players: Vec<PlayerId> = rows
                .into_iter()
                .filter_map(|(player,)| {
                    player?
                        .parse::<PlayerId>()
                        .inspect_err(|e| {
                            tracing::warn!(table, error = %e, "Skipping malformed player id");
                        })
                        .ok()
                })
                .collect();
            Ok::<_, StoreError>(players)
        }
        .await
        .inspect_err(log_failure("players", table))
    }
}
