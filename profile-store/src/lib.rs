//! Persistence layer for player profiles, moderation records and mail.
//!
//! The crate is organised the same way the stores are used by the host:
//!
//! - [`model`] holds the in-memory domain types (profiles, moderation
//!   records, mail messages and their identifiers).
//! - [`traits`] defines the repository seams and the [`ConnectionProvider`]
//!   capability every store acquires its connections from.
//! - [`sqlite`] implements those traits on top of a `sqlx::SqlitePool`,
//!   including the one-shot migration of the legacy `players` layout.
//! - [`config`] resolves runtime tunables from the environment.
//!
//! Every store operation returns a [`StoreError`] on failure, so callers can
//! tell a missing row (`Ok(None)`) apart from a storage failure.

pub mod config;
pub mod model;
pub mod sqlite;
pub mod traits;

pub use config::StoreConfig;
pub use model::{
    ChatColors, ChatFeature, ChatSettings, Expiry, MailId, MailMessage, ModerationKind,
    ModerationRecord, PlayerId, PlayerProfile, ProfileField,
};
pub use traits::{ConnectionProvider, MailRepository, ModerationRepository, ProfileRepository};

use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A connection could not be acquired or a statement failed to execute.
    #[error("Database error: {0}")]
    Connection(#[from] sqlx::Error),
    /// The embedded base schema could not be applied.
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),
    /// A mail reference points at a message that no longer exists.
    #[error("Dangling mail reference: {0}")]
    DanglingReference(MailId),
    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),
}

/// Get the current unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
