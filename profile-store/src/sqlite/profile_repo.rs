//! SQLite-backed implementation of [`ProfileRepository`].
//!
//! Each [`ProfileField`] has its own `UPDATE` so that saving one field never
//! clobbers another field written concurrently from a different call site.
//! Mail references are append-only on save: the stored list is read back and
//! only ids it does not already hold are added.

use sqlx::{Row, SqliteConnection};

use super::mail_repo::{fetch_mail, upsert_mail};
use super::{codec, log_failure, Database};
use crate::model::{
    ChatColors, ChatFeature, ChatSettings, MailId, MailMessage, PlayerId, PlayerProfile,
    ProfileField, DEFAULT_CHAT_TYPE,
};
use crate::traits::{ConnectionProvider, ProfileRepository};
use crate::StoreError;

const TABLE: &str = "players";

pub struct SqliteProfileRepository<P = Database> {
    provider: P,
    default_colors: ChatColors,
}

impl<P: ConnectionProvider> SqliteProfileRepository<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            default_colors: ChatColors::default(),
        }
    }

    /// Colors handed out when a row has none stored.
    pub fn with_default_colors(mut self, colors: ChatColors) -> Self {
        self.default_colors = colors;
        self
    }

    async fn load_on(
        &self,
        conn: &mut SqliteConnection,
        id: PlayerId,
    ) -> Result<Option<PlayerProfile>, StoreError> {
        let toggle_columns: Vec<&str> = ChatFeature::ALL.iter().map(|f| f.column()).collect();
        let query = format!(
            "SELECT colors, ignore_list, mails, chat, {} FROM players WHERE uuid = ?",
            toggle_columns.join(", ")
        );
        let Some(row) = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let colors: Option<String> = row.try_get("colors")?;
        let ignore_list: Option<String> = row.try_get("ignore_list")?;
        let mails: Option<String> = row.try_get("mails")?;
        let chat_type: Option<String> = row.try_get("chat")?;

        let mut chat =
            ChatSettings::new(chat_type.unwrap_or_else(|| DEFAULT_CHAT_TYPE.to_string()));
        for feature in ChatFeature::ALL {
            let raw: Option<String> = row.try_get(feature.column())?;
            chat.set_enabled(feature, codec::decode_tristate(raw.as_deref()));
        }

        let mut profile = PlayerProfile::new(id);
        profile.colors = codec::decode_colors(colors.as_deref(), &self.default_colors);
        profile.chat = chat;
        profile.set_ignore_list(codec::decode_list_lossy(ignore_list.as_deref(), "ignore_list"));

        let mail_ids: Vec<MailId> = codec::decode_list_lossy(mails.as_deref(), "mails");
        for mail_id in mail_ids {
            match fetch_mail(conn, mail_id).await {
                Ok(mail) => {
                    profile.add_mail(mail);
                }
                Err(StoreError::DanglingReference(mail_id)) => {
                    tracing::debug!(player = %id, mail = %mail_id, "Skipping dangling mail reference");
                }
                Err(StoreError::MalformedIdentifier(token)) => {
                    tracing::warn!(
                        player = %id,
                        mail = %mail_id,
                        token = %token,
                        "Skipping mail with malformed participant"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Some(profile))
    }
}

async fn update_column(
    conn: &mut SqliteConnection,
    column: &str,
    value: Option<String>,
    player: PlayerId,
) -> Result<(), StoreError> {
    let query = format!("UPDATE players SET {column} = ? WHERE uuid = ?");
    let result = sqlx::query(&query)
        .bind(value)
        .bind(player.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        tracing::warn!(player = %player, column, "No players row to update");
    }
    Ok(())
}

async fn save_mails(conn: &mut SqliteConnection, profile: &PlayerProfile) -> Result<(), StoreError> {
    if profile.mails().is_empty() {
        return update_column(conn, "mails", None, profile.id).await;
    }

    let stored: Option<(Option<String>,)> = sqlx::query_as("SELECT mails FROM players WHERE uuid = ?")
        .bind(profile.id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    let Some((stored,)) = stored else {
        tracing::warn!(player = %profile.id, "No players row to update");
        return Ok(());
    };

    let references: Vec<MailId> = codec::decode_list_lossy(stored.as_deref(), "mails");
    let appended: Vec<&MailMessage> = profile
        .mails()
        .iter()
        .filter(|mail| !references.contains(&mail.id))
        .collect();
    if appended.is_empty() {
        return Ok(());
    }

    // Messages first, so a failure in between never leaves a reference
    // without its row.
    for mail in &appended {
        upsert_mail(conn, mail).await?;
    }
    let appended_ids: Vec<MailId> = appended.iter().map(|mail| mail.id).collect();
    let merged = codec::append_list(stored.as_deref(), &appended_ids);
    update_column(conn, "mails", merged, profile.id).await
}

async fn save_chat(conn: &mut SqliteConnection, profile: &PlayerProfile) -> Result<(), StoreError> {
    let assignments: Vec<String> = ChatFeature::ALL
        .iter()
        .map(|feature| format!("{} = ?", feature.column()))
        .collect();
    let query = format!(
        "UPDATE players SET chat = ?, {} WHERE uuid = ?",
        assignments.join(", ")
    );

    let mut statement = sqlx::query(&query).bind(&profile.chat.chat_type);
    for feature in ChatFeature::ALL {
        statement = statement.bind(codec::encode_tristate(profile.chat.is_enabled(feature)));
    }
    let result = statement
        .bind(profile.id.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        tracing::warn!(player = %profile.id, column = "chat", "No players row to update");
    }
    Ok(())
}

impl<P: ConnectionProvider> ProfileRepository for SqliteProfileRepository<P> {
    async fn ensure_exists(&self, id: PlayerId) -> Result<(), StoreError> {
        async {
            let mut conn = self.provider.acquire().await?;
            sqlx::query("INSERT OR IGNORE INTO players (uuid) VALUES (?)")
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?;
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(log_failure("ensure_exists", TABLE))
    }

    async fn load(&self, id: PlayerId) -> Result<Option<PlayerProfile>, StoreError> {
        async {
            let mut conn = self.provider.acquire().await?;
            self.load_on(&mut conn, id).await
        }
        .await
        .inspect_err(log_failure("load", TABLE))
    }

    async fn save_field(&self, profile: &PlayerProfile, field: ProfileField) -> Result<(), StoreError> {
        async {
            let mut conn = self.provider.acquire().await?;
            match field {
                ProfileField::Colors => {
                    let colors = codec::encode_colors(&profile.colors);
                    update_column(&mut conn, "colors", Some(colors), profile.id).await
                }
                ProfileField::IgnoreList => {
                    let ignored = codec::encode_list(profile.ignore_list());
                    update_column(&mut conn, "ignore_list", ignored, profile.id).await
                }
                ProfileField::Mails => save_mails(&mut conn, profile).await,
                ProfileField::Chat => save_chat(&mut conn, profile).await,
            }
        }
        .await
        .inspect_err(|e| {
            tracing::error!(
                operation = "save_field",
                table = TABLE,
                field = field.name(),
                player = %profile.id,
                error = %e,
                "Store operation failed"
            )
        })
    }

    async fn count(&self) -> Result<u64, StoreError> {
        async {
            let mut conn = self.provider.acquire().await?;
            let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM players")
                .fetch_one(&mut *conn)
                .await?;
            Ok::<_, StoreError>(row.0 as u64)
        }
        .await
        .inspect_err(log_failure("count", TABLE))
    }
}
