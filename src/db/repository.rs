use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub credential: String,
    pub role: String,
    pub updated_at: String,
}

pub async fn fetch_session(db: &SqlitePool) -> Result<Option<SessionRow>, sqlx::Error> {
    sqlx::query_as::<_, SessionRow>(
        r#"
        SELECT credential, role, updated_at
        FROM session
        WHERE id = 1
        "#,
    )
    .fetch_optional(db)
    .await
}

/// Writes credential and role in one statement so a crash never leaves one
/// without the other.
pub async fn save_session(db: &SqlitePool, credential: &str, role: &str) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO session (id, credential, role, updated_at)
        VALUES (1, ?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET
            credential = excluded.credential,
            role = excluded.role,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(credential)
    .bind(role)
    .bind(now)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn clear_session(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM session WHERE id = 1")
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
