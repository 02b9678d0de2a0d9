//! Operator tool for the profile database.
//!
//! Opens the stores with the same configuration the host uses (see
//! `profile_store::config` for the environment variables), so running any
//! subcommand also performs the startup schema migration when it is due.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use profile_store::sqlite::{open_stores, Stores};
use profile_store::{
    now_timestamp, Expiry, ModerationKind, ModerationRepository, PlayerId, ProfileRepository,
    StoreConfig,
};

#[derive(Parser)]
#[command(name = "profile-admin", about = "Inspect and migrate the player profile database")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the legacy schema migration and print what it changed.
    Migrate {
        /// Whether to treat the database as legacy. `auto` inspects the
        /// `players` columns.
        #[arg(long, value_enum, default_value_t = LegacyMode::Auto)]
        legacy: LegacyMode,
    },
    /// Print row counts for profiles, bans and mutes.
    Stats,
    /// Print one player's profile as JSON.
    Show {
        /// Player UUID.
        player: PlayerId,
    },
    /// List active bans or mutes, one page at a time.
    Moderation {
        kind: KindArg,
        /// 1-based page number.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
        #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=500))]
        page_size: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LegacyMode {
    Auto,
    Yes,
    No,
}

impl LegacyMode {
    fn as_override(self) -> Option<bool> {
        match self {
            LegacyMode::Auto => None,
            LegacyMode::Yes => Some(true),
            LegacyMode::No => Some(false),
        }
    }
}

/// Moderation kinds that have a readable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Ban,
    Mute,
}

impl From<KindArg> for ModerationKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Ban => ModerationKind::Ban,
            KindArg::Mute => ModerationKind::Mute,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no profile stored for player {0}")]
    ProfileNotFound(PlayerId),
}

fn page_offset(page: u32, page_size: u32) -> u32 {
    page.saturating_sub(1).saturating_mul(page_size)
}

fn describe_expiry(expiry: Expiry, now: i64) -> String {
    match expiry {
        Expiry::Permanent => "permanent".to_string(),
        Expiry::At(time) if time <= now => format!("expired at {time}"),
        Expiry::At(time) => format!("until {time}"),
    }
}

async fn handle_migrate(mut config: StoreConfig, legacy: LegacyMode) -> anyhow::Result<()> {
    if let Some(forced) = legacy.as_override() {
        config.legacy_schema = Some(forced);
    }
    let stores = open_stores(&config)
        .await
        .context("failed to open profile database")?;

    let report = &stores.migration;
    if report.skipped {
        println!("Schema is current, nothing to migrate.");
        return Ok(());
    }
    println!("Mutes migrated:  {}", report.mutes_migrated);
    println!("Bans migrated:   {}", report.bans_migrated);
    println!("Columns added:   {}", report.columns_added.join(", "));
    println!("Columns dropped: {}", report.columns_dropped.join(", "));
    Ok(())
}

async fn handle_stats(stores: &Stores) -> anyhow::Result<()> {
    let profiles = stores.profiles.count().await?;
    let bans = stores.moderation.count(ModerationKind::Ban).await?;
    let mutes = stores.moderation.count(ModerationKind::Mute).await?;

    println!("Profiles: {profiles}");
    println!("Bans:     {bans}");
    println!("Mutes:    {mutes}");
    Ok(())
}

async fn handle_show(stores: &Stores, player: PlayerId) -> anyhow::Result<()> {
    let profile = stores
        .profiles
        .load(player)
        .await?
        .ok_or(CliError::ProfileNotFound(player))?;
    let json = serde_json::to_string_pretty(&profile).context("failed to render profile")?;
    println!("{json}");
    Ok(())
}

async fn handle_moderation(
    stores: &Stores,
    kind: ModerationKind,
    page: u32,
    page_size: u32,
) -> anyhow::Result<()> {
    let total = stores.moderation.count(kind).await?;
    let records = stores
        .moderation
        .list(kind, page_size, page_offset(page, page_size))
        .await?;

    let now = now_timestamp();
    for record in &records {
        println!(
            "{}  {}  by {}  {}",
            record.player,
            describe_expiry(record.expiry, now),
            record.moderator.as_deref().unwrap_or("-"),
            record.reason
        );
    }
    let pages = total.div_ceil(u64::from(page_size)).max(1);
    println!("Page {page}/{pages} ({total} total)");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StoreConfig::from_env();
    tracing::debug!(path = %config.database_path.display(), "Using profile database");

    if let Commands::Migrate { legacy } = cli.command {
        return handle_migrate(config, legacy).await;
    }

    let stores = open_stores(&config)
        .await
        .context("failed to open profile database")?;

    match cli.command {
        Commands::Migrate { .. } => Ok(()),
        Commands::Stats => handle_stats(&stores).await,
        Commands::Show { player } => handle_show(&stores, player).await,
        Commands::Moderation {
            kind,
            page,
            page_size,
        } => handle_moderation(&stores, kind.into(), page, page_size).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_defaults_to_auto() {
        let cli = Cli::try_parse_from(["profile-admin", "migrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { legacy: LegacyMode::Auto }));

        let cli = Cli::try_parse_from(["profile-admin", "migrate", "--legacy", "no"]).unwrap();
        assert!(matches!(cli.command, Commands::Migrate { legacy: LegacyMode::No }));
    }

    #[test]
    fn test_parse_show_requires_uuid() {
        let id = PlayerId::random();
        let cli = Cli::try_parse_from(["profile-admin", "show", &id.to_string()]).unwrap();
        assert!(matches!(cli.command, Commands::Show { player } if player == id));

        assert!(Cli::try_parse_from(["profile-admin", "show", "Notch"]).is_err());
    }

    #[test]
    fn test_parse_moderation_paging() {
        let cli = Cli::try_parse_from([
            "profile-admin",
            "moderation",
            "mute",
            "--page",
            "3",
            "--page-size",
            "50",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Moderation {
                kind: KindArg::Mute,
                page: 3,
                page_size: 50
            }
        ));

        assert!(Cli::try_parse_from(["profile-admin", "moderation", "warn"]).is_err());
        assert!(Cli::try_parse_from(["profile-admin", "moderation", "ban", "--page", "0"]).is_err());
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 50), 100);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn test_legacy_mode_override() {
        assert_eq!(LegacyMode::Auto.as_override(), None);
        assert_eq!(LegacyMode::Yes.as_override(), Some(true));
        assert_eq!(LegacyMode::No.as_override(), Some(false));
    }

    #[test]
    fn test_describe_expiry() {
        assert_eq!(describe_expiry(Expiry::Permanent, 10), "permanent");
        assert_eq!(describe_expiry(Expiry::At(5), 10), "expired at 5");
        assert_eq!(describe_expiry(Expiry::At(50), 10), "until 50");
    }
}
