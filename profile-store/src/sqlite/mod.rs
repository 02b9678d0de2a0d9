//! SQLite-backed repository implementations.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with WAL journaling and
//! implements [`ConnectionProvider`](crate::traits::ConnectionProvider).
//! `sqlx::migrate!` applies `migrations/001_initial_schema.sql` when
//! [`Database::open`] is called. The base schema is idempotent and leaves a
//! legacy `players` table untouched.
//!
//! ## Repository types
//!
//! Each `Sqlite*Repository` holds a connection provider and implements the
//! corresponding trait from [`crate::traits`]:
//!
//! | Type | Trait | Tables |
//! |------|-------|--------|
//! | [`SqliteProfileRepository`] | `ProfileRepository` | `players` (+ `mails` reads) |
//! | [`SqliteModerationRepository`] | `ModerationRepository` | `bans`, `mutes`, `warns` |
//! | [`SqliteMailRepository`] | `MailRepository` | `mails` |
//!
//! Lists, tri-state toggles, colors and expiry sentinels are converted to and
//! from their column encodings in [`codec`] only.
//!
//! ## Legacy schema migration
//!
//! [`run_startup_migration`] moves moderation data that older releases kept
//! inline on `players` into `bans`/`mutes`, adds the toggle columns and drops
//! the inline ones. It must finish before the repositories see traffic;
//! [`open_stores`] does this in the right order.

pub mod codec;
mod database;
mod mail_repo;
mod moderation_repo;
mod profile_repo;
mod schema_migration;
mod stores;
#[cfg(test)]
mod integration_tests;

pub use database::Database;
pub use mail_repo::SqliteMailRepository;
pub use moderation_repo::SqliteModerationRepository;
pub use profile_repo::SqliteProfileRepository;
pub use schema_migration::{
    detect_legacy_schema, migrate_legacy_schema, run_startup_migration, MigrationReport,
};
pub use stores::{open_stores, Stores};

use crate::StoreError;

/// Log a failed store operation with the context needed to diagnose it.
pub(crate) fn log_failure(
    operation: &'static str,
    table: &'static str,
) -> impl FnOnce(&StoreError) {
    move |e| tracing::error!(operation, table, error = %e, "Store operation failed")
}
