//! SQLite-backed implementation of [`MailRepository`].

use sqlx::SqliteConnection;

use super::{log_failure, Database};
use crate::model::{MailId, MailMessage};
use crate::traits::{ConnectionProvider, MailRepository};
use crate::StoreError;

const TABLE: &str = "mails";

pub struct SqliteMailRepository<P = Database> {
    provider: P,
}

impl<P: ConnectionProvider> SqliteMailRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

/// Fetch one message over an already-acquired connection. A missing row is
/// reported as [`StoreError::DanglingReference`].
pub(super) async fn fetch_mail(
    conn: &mut SqliteConnection,
    id: MailId,
) -> Result<MailMessage, StoreError> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT sender, receiver, message FROM mails WHERE uuid = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

    let (sender, receiver, body) = row.ok_or(StoreError::DanglingReference(id))?;
    Ok(MailMessage {
        id,
        sender: sender.parse()?,
        receiver: receiver.parse()?,
        body,
    })
}

/// Insert or replace one message over an already-acquired connection.
pub(super) async fn upsert_mail(
    conn: &mut SqliteConnection,
    mail: &MailMessage,
) -> Result<(), StoreError> {
    sqlx::query("REPLACE INTO mails (uuid, sender, receiver, message) VALUES (?, ?, ?, ?)")
        .bind(mail.id.to_string())
        .bind(mail.sender.to_string())
        .bind(mail.receiver.to_string())
        .bind(&mail.body)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl<P: ConnectionProvider> MailRepository for SqliteMailRepository<P> {
    async fn upsert(&self, mail: &MailMessage) -> Result<(), StoreError> {
        async {
            let mut conn = self.provider.acquire().await?;
            upsert_mail(&mut conn, mail).await
        }
        .await
        .inspect_err(log_failure("upsert", TABLE))
    }

    async fn get(&self, id: MailId) -> Result<Option<MailMessage>, StoreError> {
        let result = async {
            let mut conn = self.provider.acquire().await?;
            fetch_mail(&mut conn, id).await
        }
        .await;

        match result {
            Ok(mail) => Ok(Some(mail)),
            Err(StoreError::DanglingReference(_)) => Ok(None),
            Err(e) => {
                log_failure("get", TABLE)(&e);
                Err(e)
            }
        }
    }

    async fn delete(&self, id: MailId) -> Result<(), StoreError> {
        async {
            let mut conn = self.provider.acquire().await?;
            sqlx::query("DELETE FROM mails WHERE uuid = ?")
                .bind(id.to_string())
                .execute(&mut *conn)
                .await?;
            Ok::<_, StoreError>(())
        }
        .await
        .inspect_err(log_failure("delete", TABLE))
    }
}
