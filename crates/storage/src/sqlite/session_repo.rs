use async_trait::async_trait;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, exec_err, ser, user_id_from_i64, user_id_to_i64};
use crate::repository::{SessionRecord, SessionRepository, StorageError};

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO sessions (token, user_id, expires_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(&record.token)
        .bind(user_id_to_i64(record.user)?)
        .bind(record.expires_at)
        .execute(self.pool())
        .await
        .map_err(exec_err)?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query("SELECT token, user_id, expires_at FROM sessions WHERE token = ?1")
            .bind(token)
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?;

        match row {
            Some(row) => Ok(Some(SessionRecord {
                token: row.try_get("token").map_err(ser)?,
                user: user_id_from_i64(row.try_get::<i64, _>("user_id").map_err(ser)?)?,
                expires_at: row.try_get("expires_at").map_err(ser)?,
            })),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(self.pool())
            .await
            .map_err(conn)?;
        Ok(())
    }
}
