// ABOUTME: Category database operations for post and product taxonomies
// ABOUTME: CRUD plus lookup by id or slug within a category kind

use chrono::SecondsFormat;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{get_datetime, get_enum, get_uuid, Database};
use crate::errors::AppResult;
use crate::models::{Category, CategoryKind};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, kind, created_at";

impl Database {
    pub(super) async fn migrate_categories(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL,
                description TEXT,
                kind TEXT NOT NULL CHECK (kind IN ('post', 'product')),
                created_at TEXT NOT NULL,
                UNIQUE (slug, kind)
            )
            ",
        ])
        .await
    }

    /// Insert a category
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the slug is taken within the kind
    pub async fn create_category(&self, category: &Category) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO categories (id, name, slug, description, kind, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.kind.as_str())
        .bind(category.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a category by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_category(&self, category_id: Uuid) -> AppResult<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(category_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_category).transpose()
    }

    /// Resolve a category reference (UUID or slug) of the given kind
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn find_category(
        &self,
        reference: &str,
        kind: CategoryKind,
    ) -> AppResult<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE (id = $1 OR slug = $1) AND kind = $2"
        ))
        .bind(reference.trim().to_lowercase())
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_category).transpose()
    }

    /// List categories, optionally restricted to one kind
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_categories(&self, kind: Option<CategoryKind>) -> AppResult<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE ($1 IS NULL OR kind = $1) ORDER BY kind, name"
        ))
        .bind(kind.map(|k| k.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_category).collect()
    }

    /// Update name, slug and description
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_ALREADY_EXISTS` if the new slug collides
    pub async fn update_category(&self, category: &Category) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE categories SET name = $1, slug = $2, description = $3 WHERE id = $4",
        )
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(category.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a category; posts and products keep existing with no category
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_category(&self, category_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(category_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_category(row: &SqliteRow) -> AppResult<Category> {
    Ok(Category {
        id: get_uuid(row, "id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        kind: get_enum(row, "kind")?,
        created_at: get_datetime(row, "created_at")?,
    })
}
