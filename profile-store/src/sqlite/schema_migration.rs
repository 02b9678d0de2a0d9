//! One-shot migration of the legacy `players` layout.
//!
//! Older releases kept mutes and temporary bans inline on the player row
//! (`mute_time`, `mute_reason`, `tempban_time`, `tempban_reason`) and had no
//! toggle columns. The migration copies every inline record that has a
//! reason into `mutes` / `bans`, adds the toggle and `warns` columns, and
//! drops the inline ones.
//!
//! There is no transaction and no rollback: the first failing statement stops
//! the run and the schema is left as far as it got. Each step checks the live
//! column set first, so running it again over a migrated (or half-migrated)
//! schema only performs the steps still outstanding.

use std::collections::HashSet;

use sqlx::SqliteConnection;
use tracing::{debug, error, info};

use crate::model::{ChatFeature, ModerationKind};
use crate::traits::ConnectionProvider;
use crate::StoreError;

/// Inline moderation columns of the legacy layout, per target kind.
struct InlineRecordColumns {
    kind: ModerationKind,
    time: &'static str,
    reason: &'static str,
}

const INLINE_MUTE: InlineRecordColumns = InlineRecordColumns {
    kind: ModerationKind::Mute,
    time: "mute_time",
    reason: "mute_reason",
};

const INLINE_BAN: InlineRecordColumns = InlineRecordColumns {
    kind: ModerationKind::Ban,
    time: "tempban_time",
    reason: "tempban_reason",
};

const WARNS_COLUMN: (&str, &str) = ("warns", "varchar(32)");
const TOGGLE_COLUMN_TYPE: &str = "varchar(11)";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The probe reported a current schema and nothing was inspected.
    pub skipped: bool,
    pub mutes_migrated: u64,
    pub bans_migrated: u64,
    pub columns_added: Vec<&'static str>,
    pub columns_dropped: Vec<&'static str>,
}

impl MigrationReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn changed_anything(&self) -> bool {
        self.mutes_migrated > 0
            || self.bans_migrated > 0
            || !self.columns_added.is_empty()
            || !self.columns_dropped.is_empty()
    }
}

/// Report whether `players` still carries the inline moderation columns.
pub async fn detect_legacy_schema<P: ConnectionProvider>(provider: &P) -> Result<bool, StoreError> {
    let mut conn = provider.acquire().await?;
    let columns = players_columns(&mut conn).await?;
    Ok([INLINE_MUTE, INLINE_BAN]
        .iter()
        .any(|inline| columns.contains(inline.time) || columns.contains(inline.reason)))
}

/// Run the migration only when the startup probe reports a legacy schema.
///
/// Must be awaited to completion before any repository is used.
pub async fn run_startup_migration<P: ConnectionProvider>(
    provider: &P,
    legacy: bool,
) -> Result<MigrationReport, StoreError> {
    if !legacy {
        debug!("Schema is current, skipping legacy migration");
        return Ok(MigrationReport::skipped());
    }
    migrate_legacy_schema(provider).await
}

/// Migrate the legacy `players` layout unconditionally.
pub async fn migrate_legacy_schema<P: ConnectionProvider>(
    provider: &P,
) -> Result<MigrationReport, StoreError> {
    info!("Starting legacy schema migration");

    let result = async {
        let mut conn = provider.acquire().await?;
        migrate_on(&mut conn).await
    }
    .await;

    match &result {
        Ok(report) => info!(
            mutes = report.mutes_migrated,
            bans = report.bans_migrated,
            columns_added = report.columns_added.len(),
            columns_dropped = report.columns_dropped.len(),
            "Legacy schema migration completed"
        ),
        Err(e) => error!(
            error = %e,
            "Legacy schema migration aborted, players table may be partially migrated"
        ),
    }

    result
}

async fn migrate_on(conn: &mut SqliteConnection) -> Result<MigrationReport, StoreError> {
    let columns = players_columns(conn).await?;
    let mut report = MigrationReport {
        mutes_migrated: migrate_inline_records(conn, &columns, &INLINE_MUTE).await?,
        bans_migrated: migrate_inline_records(conn, &columns, &INLINE_BAN).await?,
        ..MigrationReport::default()
    };

    let added = std::iter::once(WARNS_COLUMN).chain(
        ChatFeature::ALL
            .iter()
            .map(|feature| (feature.column(), TOGGLE_COLUMN_TYPE)),
    );
    for (column, column_type) in added {
        if columns.contains(column) {
            continue;
        }
        sqlx::raw_sql(&format!("ALTER TABLE players ADD COLUMN {column} {column_type}"))
            .execute(&mut *conn)
            .await?;
        debug!(column, "Added players column");
        report.columns_added.push(column);
    }

    for inline in [&INLINE_MUTE, &INLINE_BAN] {
        for column in [inline.time, inline.reason] {
            if !columns.contains(column) {
                continue;
            }
            sqlx::raw_sql(&format!("ALTER TABLE players DROP COLUMN {column}"))
                .execute(&mut *conn)
                .await?;
            debug!(column, "Dropped legacy players column");
            report.columns_dropped.push(column);
        }
    }

    Ok(report)
}

/// Copy every inline record with a non-null reason into its table. A null
/// time reads as `0`; the moderator is unknown for these records.
async fn migrate_inline_records(
    conn: &mut SqliteConnection,
    columns: &HashSet<String>,
    inline: &InlineRecordColumns,
) -> Result<u64, StoreError> {
    if !columns.contains(inline.reason) {
        return Ok(0);
    }
    let table = inline.kind.table()?;
    let time = if columns.contains(inline.time) {
        inline.time
    } else {
        "NULL"
    };

    let query = format!(
        "SELECT uuid, {time}, {reason} FROM players WHERE {reason} IS NOT NULL",
        reason = inline.reason
    );
    let rows: Vec<(String, Option<i64>, String)> =
        sqlx::query_as(&query).fetch_all(&mut *conn).await?;

    let insert = format!(
        "INSERT OR REPLACE INTO {table} (player, time, reason, moderator) VALUES (?, ?, ?, NULL)"
    );
    for (player, time, reason) in &rows {
        sqlx::query(&insert)
            .bind(player)
            .bind(time.unwrap_or(0))
            .bind(reason)
            .execute(&mut *conn)
            .await?;
    }

    debug!(table, count = rows.len(), "Migrated inline moderation records");
    Ok(rows.len() as u64)
}

async fn players_columns(conn: &mut SqliteConnection) -> Result<HashSet<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('players')")
        .persistent(false)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}
