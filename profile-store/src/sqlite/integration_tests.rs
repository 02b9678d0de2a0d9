use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use super::{open_stores, Database, SqliteMailRepository, SqliteModerationRepository, SqliteProfileRepository};
use crate::config::StoreConfig;
use crate::model::{
    ChatFeature, Expiry, MailMessage, ModerationKind, ModerationRecord, PlayerId, PlayerProfile,
    ProfileField,
};
use crate::traits::{MailRepository, ModerationRepository, ProfileRepository};
use crate::StoreError;

const U1: &str = "11111111-1111-1111-1111-111111111111";
const U2: &str = "22222222-2222-2222-2222-222222222222";
const U3: &str = "33333333-3333-3333-3333-333333333333";

fn player(raw: &str) -> PlayerId {
    raw.parse().unwrap()
}

struct TestStores {
    profiles: SqliteProfileRepository,
    moderation: SqliteModerationRepository,
    mails: SqliteMailRepository,
}

async fn in_memory_stores() -> TestStores {
    let db = Database::new_in_memory().await.unwrap();
    TestStores {
        profiles: SqliteProfileRepository::new(db.clone()),
        moderation: SqliteModerationRepository::new(db.clone()),
        mails: SqliteMailRepository::new(db),
    }
}

/// Write a players table in the old inline-moderation layout to `path`.
async fn write_legacy_database(path: &Path, rows: &[(&str, Option<i64>, Option<&str>)]) {
    let mut conn = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::raw_sql(
        "CREATE TABLE players (
            uuid varchar(36) PRIMARY KEY,
            colors varchar(32),
            ignore_list text,
            mails text,
            chat varchar(16),
            mute_time INTEGER,
            mute_reason text,
            tempban_time INTEGER,
            tempban_reason text
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    for (uuid, mute_time, mute_reason) in rows {
        sqlx::query("INSERT INTO players (uuid, colors, mute_time, mute_reason) VALUES (?, '&c,&4', ?, ?)")
            .bind(*uuid)
            .bind(*mute_time)
            .bind(*mute_reason)
            .execute(&mut conn)
            .await
            .unwrap();
    }
    conn.close().await.unwrap();
}

// ── Profiles and moderation ────────────────────────────────────────────

#[tokio::test]
async fn test_new_player_has_no_ban() {
    let stores = in_memory_stores().await;
    let u1 = player(U1);

    stores.profiles.ensure_exists(u1).await.unwrap();

    assert!(stores.profiles.load(u1).await.unwrap().is_some());
    assert_eq!(stores.moderation.get(ModerationKind::Ban, u1).await.unwrap(), None);
}

#[tokio::test]
async fn test_ban_roundtrip_and_expiry() {
    let stores = in_memory_stores().await;
    let record = ModerationRecord {
        player: player(U1),
        expiry: Expiry::At(100),
        reason: "spam".to_string(),
        moderator: Some("modA".to_string()),
    };

    stores.moderation.upsert(ModerationKind::Ban, &record).await.unwrap();

    let loaded = stores
        .moderation
        .get(ModerationKind::Ban, player(U1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, record);
    assert_eq!(stores.moderation.count(ModerationKind::Ban).await.unwrap(), 1);
    assert!(loaded.is_expired(crate::now_timestamp()));
}

#[tokio::test]
async fn test_ignore_list_roundtrip_is_order_insensitive() {
    let stores = in_memory_stores().await;
    let u1 = player(U1);
    stores.profiles.ensure_exists(u1).await.unwrap();

    let mut profile = stores.profiles.load(u1).await.unwrap().unwrap();
    profile.set_ignore_list([player(U2), player(U3)]);
    stores
        .profiles
        .save_field(&profile, ProfileField::IgnoreList)
        .await
        .unwrap();

    let loaded = stores.profiles.load(u1).await.unwrap().unwrap();
    let mut ignored = loaded.ignore_list().to_vec();
    ignored.sort();
    assert_eq!(ignored, vec![player(U2), player(U3)]);
}

// ── Mail ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_claimed_mail_disappears_from_profile() {
    let stores = in_memory_stores().await;
    let (sender, receiver) = (player(U2), player(U1));
    stores.profiles.ensure_exists(receiver).await.unwrap();

    let mut profile = stores.profiles.load(receiver).await.unwrap().unwrap();
    let kept = MailMessage::compose(sender, receiver, "meet at spawn");
    let claimed = MailMessage::compose(sender, receiver, "diamonds inside");
    profile.add_mail(kept.clone());
    profile.add_mail(claimed.clone());
    stores
        .profiles
        .save_field(&profile, ProfileField::Mails)
        .await
        .unwrap();

    // Deleting the message leaves the reference on the players row behind
    stores.mails.delete(claimed.id).await.unwrap();

    let loaded = stores.profiles.load(receiver).await.unwrap().unwrap();
    assert_eq!(loaded.mails(), std::slice::from_ref(&kept));
    assert_eq!(stores.mails.get(claimed.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_mail_saved_through_profile_is_readable_directly() {
    let stores = in_memory_stores().await;
    let receiver = player(U1);
    stores.profiles.ensure_exists(receiver).await.unwrap();

    let mut profile = PlayerProfile::new(receiver);
    let mail = MailMessage::compose(player(U3), receiver, "gg");
    profile.add_mail(mail.clone());
    stores
        .profiles
        .save_field(&profile, ProfileField::Mails)
        .await
        .unwrap();

    assert_eq!(stores.mails.get(mail.id).await.unwrap(), Some(mail));
}

// ── Startup ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_legacy_database_is_migrated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("players.db");
    write_legacy_database(&path, &[(U1, Some(500), Some("toxic")), (U2, Some(900), None)]).await;

    let stores = open_stores(&StoreConfig::at_path(&path)).await.unwrap();
    assert!(!stores.migration.skipped);
    assert_eq!(stores.migration.mutes_migrated, 1);

    let mute = stores
        .moderation
        .get(ModerationKind::Mute, player(U1))
        .await
        .unwrap();
    assert_eq!(
        mute,
        Some(ModerationRecord {
            player: player(U1),
            expiry: Expiry::At(500),
            reason: "toxic".to_string(),
            moderator: None,
        })
    );
    assert_eq!(stores.moderation.get(ModerationKind::Mute, player(U2)).await.unwrap(), None);

    let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('players')")
        .fetch_all(stores.database.pool())
        .await
        .unwrap();
    assert!(columns.iter().all(|(name,)| name != "mute_time" && name != "mute_reason"));

    // Existing data survives and the new toggle columns read as enabled
    let profile = stores.profiles.load(player(U1)).await.unwrap().unwrap();
    assert_eq!(profile.colors.foreground, "&c");
    assert!(ChatFeature::ALL.iter().all(|f| profile.chat.is_enabled(*f)));
}

#[tokio::test]
async fn test_reopening_migrated_database_skips_migration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("players.db");
    write_legacy_database(&path, &[(U1, Some(500), Some("toxic"))]).await;

    let first = open_stores(&StoreConfig::at_path(&path)).await.unwrap();
    first.database.pool().close().await;

    let second = open_stores(&StoreConfig::at_path(&path)).await.unwrap();
    assert!(second.migration.skipped);
    assert_eq!(second.moderation.count(ModerationKind::Mute).await.unwrap(), 1);
}

#[tokio::test]
async fn test_forced_skip_leaves_legacy_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("players.db");
    write_legacy_database(&path, &[(U1, Some(500), Some("toxic"))]).await;

    let mut config = StoreConfig::at_path(&path);
    config.legacy_schema = Some(false);
    let stores = open_stores(&config).await.unwrap();

    assert!(stores.migration.skipped);
    assert_eq!(stores.moderation.count(ModerationKind::Mute).await.unwrap(), 0);
    // The toggle columns are missing, so loading a profile is a storage error
    let result = stores.profiles.load(player(U1)).await;
    assert!(
        matches!(result, Err(StoreError::Connection(_))),
        "expected a database error, got {:?}",
        result
    );
}
