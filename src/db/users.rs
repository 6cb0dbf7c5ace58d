use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, PageParams};
use crate::auth::Role;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Unknown roles get the least privilege.
    pub fn role(&self) -> Role { self.role.parse().unwrap_or(Role::Staff) }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn list(&self, params: PageParams) -> Result<Page<UserRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2")
            .bind(params.limit()).bind(params.offset())
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        Ok(Page::new(rows, total.0, params))
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        Ok(row.0)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email).fetch_optional(&self.pool).await
    }

    pub async fn create(&self, email: &str, name: &str, password_hash: &str, role: Role) -> Result<UserRow, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (id, email, name, password_hash, role, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7()).bind(email).bind(name).bind(password_hash).bind(role.as_str())
        .fetch_one(&self.pool).await
    }

    /// `password_hash` of `None` keeps the current password.
    pub async fn update(
        &self,
        id: Uuid,
        name: &str,
        role: Role,
        active: bool,
        password_hash: Option<&str>,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            "UPDATE users SET name = $2, role = $3, active = $4, password_hash = COALESCE($5, password_hash), updated_at = NOW()
             WHERE id = $1 RETURNING *",
        )
        .bind(id).bind(name).bind(role.as_str()).bind(active).bind(password_hash)
        .fetch_optional(&self.pool).await
    }

    pub async fn set_avatar(&self, id: Uuid, avatar_url: Option<&str>) -> Result<Option<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>("UPDATE users SET avatar_url = $2, updated_at = NOW() WHERE id = $1 RETURNING *")
            .bind(id).bind(avatar_url).fetch_optional(&self.pool).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
