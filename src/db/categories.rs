use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: PgPool,
}

impl CategoryRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn list(&self) -> Result<Vec<CategoryRow>, sqlx::Error> {
        sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool).await
    }

    pub async fn create(&self, name: &str, slug: &str, description: Option<&str>) -> Result<CategoryRow, sqlx::Error> {
        sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (id, name, slug, description, created_at, updated_at)
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING *",
        )
        .bind(Uuid::now_v7()).bind(name).bind(slug).bind(description)
        .fetch_one(&self.pool).await
    }

    pub async fn update(&self, id: Uuid, name: &str, slug: &str, description: Option<&str>) -> Result<Option<CategoryRow>, sqlx::Error> {
        sqlx::query_as::<_, CategoryRow>(
            "UPDATE categories SET name = $2, slug = $3, description = $4, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id).bind(name).bind(slug).bind(description)
        .fetch_optional(&self.pool).await
    }

    /// Products in the category become uncategorised.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
