//! Startup wiring: open the database, settle the schema, build the stores.

use super::{
    detect_legacy_schema, run_startup_migration, Database, MigrationReport,
    SqliteMailRepository, SqliteModerationRepository, SqliteProfileRepository,
};
use crate::config::StoreConfig;
use crate::StoreError;

/// The three stores sharing one pool, plus what the startup migration did.
pub struct Stores {
    pub database: Database,
    pub profiles: SqliteProfileRepository,
    pub moderation: SqliteModerationRepository,
    pub mails: SqliteMailRepository,
    pub migration: MigrationReport,
}

/// Open the database and return stores that are safe to use.
///
/// The legacy migration runs to completion before any store is built. When
/// `config.legacy_schema` is unset the live `players` columns decide.
pub async fn open_stores(config: &StoreConfig) -> Result<Stores, StoreError> {
    let database = Database::open(config).await?;

    let legacy = match config.legacy_schema {
        Some(forced) => {
            tracing::info!(legacy = forced, "Legacy schema probe overridden by configuration");
            forced
        }
        None => detect_legacy_schema(&database).await?,
    };
    let migration = run_startup_migration(&database, legacy).await?;

    Ok(Stores {
        profiles: SqliteProfileRepository::new(database.clone())
            .with_default_colors(config.default_colors.clone()),
        moderation: SqliteModerationRepository::new(database.clone()),
        mails: SqliteMailRepository::new(database.clone()),
        database,
        migration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChatColors, PlayerId};
    use crate::traits::ProfileRepository;

    #[tokio::test]
    async fn test_fresh_database_skips_migration() {
        let dir = tempfile::tempdir().unwrap();
        let stores = open_stores(&StoreConfig::at_path(dir.path().join("players.db")))
            .await
            .unwrap();
        assert!(stores.migration.skipped);
        assert_eq!(stores.profiles.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_forced_probe_on_current_schema_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::at_path(dir.path().join("players.db"));
        config.legacy_schema = Some(true);

        let stores = open_stores(&config).await.unwrap();
        assert!(!stores.migration.skipped);
        assert!(!stores.migration.changed_anything());
    }

    #[tokio::test]
    async fn test_default_colors_reach_profile_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::at_path(dir.path().join("players.db"));
        config.default_colors = ChatColors::new("&b", "&3");

        let stores = open_stores(&config).await.unwrap();
        let id = PlayerId::random();
        stores.profiles.ensure_exists(id).await.unwrap();
        let profile = stores.profiles.load(id).await.unwrap().unwrap();
        assert_eq!(profile.colors, ChatColors::new("&b", "&3"));
    }
}
