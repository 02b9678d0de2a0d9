//! Async repository trait definitions for the store layer.
//!
//! Each trait abstracts over one table family so the host can hold the
//! stores behind generics. Methods return `impl Future + Send` rather than
//! using `async fn` so that the futures are guaranteed `Send` and can be
//! handed to `tokio::spawn` off the game thread.

use sqlx::pool::PoolConnection;
use sqlx::Sqlite;
use std::future::Future;

use crate::model::{
    MailId, MailMessage, ModerationKind, ModerationRecord, PlayerId, PlayerProfile, ProfileField,
};
use crate::StoreError;

/// Source of database connections.
///
/// Every store operation acquires one connection, runs all of its statements
/// on it and drops it before returning, on success and on error alike.
pub trait ConnectionProvider: Send + Sync {
    fn acquire(
        &self,
    ) -> impl Future<Output = Result<PoolConnection<Sqlite>, StoreError>> + Send;
}

/// Repository for the `players` table.
pub trait ProfileRepository: Send + Sync {
    /// Create a bare row for `id` unless one exists. Safe to call on every
    /// connect.
    fn ensure_exists(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Load and decode a profile. Mail references that no longer resolve are
    /// left out of the result.
    fn load(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = Result<Option<PlayerProfile>, StoreError>> + Send;
    /// Persist exactly one logical field of `profile`.
    fn save_field(
        &self,
        profile: &PlayerProfile,
        field: ProfileField,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn count(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;
}

/// Repository for the `bans`, `mutes` and `warns` tables.
///
/// Implementations hold at most one record per player and kind; `upsert`
/// replaces rather than accumulates. Every operation on
/// [`ModerationKind::Warn`] fails with [`StoreError::UnsupportedOperation`].
pub trait ModerationRepository: Send + Sync {
    fn get(
        &self,
        kind: ModerationKind,
        player: PlayerId,
    ) -> impl Future<Output = Result<Option<ModerationRecord>, StoreError>> + Send;
    /// One page of records in storage order. The order is not stable across
    /// writes.
    fn list(
        &self,
        kind: ModerationKind,
        limit: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<ModerationRecord>, StoreError>> + Send;
    fn upsert(
        &self,
        kind: ModerationKind,
        record: &ModerationRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn delete(
        &self,
        kind: ModerationKind,
        player: PlayerId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn count(
        &self,
        kind: ModerationKind,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
    /// Every player holding a record of this kind.
    fn players(
        &self,
        kind: ModerationKind,
    ) -> impl Future<Output = Result<Vec<PlayerId>, StoreError>> + Send;
}

/// Repository for the `mails` table.
pub trait MailRepository: Send + Sync {
    fn upsert(
        &self,
        mail: &MailMessage,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    fn get(
        &self,
        id: MailId,
    ) -> impl Future<Output = Result<Option<MailMessage>, StoreError>> + Send;
    fn delete(&self, id: MailId) -> impl Future<Output = Result<(), StoreError>> + Send;
}
