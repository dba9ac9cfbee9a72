// ABOUTME: Tag storage shared by posts and products
// ABOUTME: Upserts tags by slug, replaces join rows and batch-loads tags for listed rows

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::{get_uuid, Database};
use crate::errors::AppResult;
use crate::models::Tag;
use crate::utils::validation::slugify;

/// Join table linking tags to a taggable table
#[derive(Debug, Clone, Copy)]
pub(super) enum TagLink {
    Post,
    Product,
}

impl TagLink {
    const fn table(self) -> &'static str {
        match self {
            Self::Post => "post_tags",
            Self::Product => "product_tags",
        }
    }

    const fn owner_column(self) -> &'static str {
        match self {
            Self::Post => "post_id",
            Self::Product => "product_id",
        }
    }
}

impl Database {
    pub(super) async fn migrate_tags(&self) -> AppResult<()> {
        self.execute_ddl(&[r"
            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                created_at TEXT NOT NULL
            )
            "])
        .await
    }

    /// All tags ordered by name
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_tags(&self) -> AppResult<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name, slug FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_tag).collect()
    }

    /// Get a tag by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_tag(&self, tag_id: Uuid) -> AppResult<Option<Tag>> {
        let row = sqlx::query("SELECT id, name, slug FROM tags WHERE id = $1")
            .bind(tag_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_tag).transpose()
    }

    /// Delete a tag; join rows cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_tag(&self, tag_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Batch-load tags for a set of owners
    pub(super) async fn load_tags(
        &self,
        link: TagLink,
        owner_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<Tag>>> {
        let mut tags_by_owner: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        if owner_ids.is_empty() {
            return Ok(tags_by_owner);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT j.{owner} AS owner_id, t.id, t.name, t.slug FROM {table} j \
             JOIN tags t ON t.id = j.tag_id WHERE j.{owner} IN (",
            owner = link.owner_column(),
            table = link.table(),
        ));
        let mut separated = builder.separated(", ");
        for id in owner_ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ORDER BY t.name");

        let rows = builder.build().fetch_all(&self.pool).await?;
        for row in &rows {
            let owner_id = get_uuid(row, "owner_id")?;
            tags_by_owner.entry(owner_id).or_default().push(row_to_tag(row)?);
        }
        Ok(tags_by_owner)
    }
}

/// Upsert tags by slug and point the owner's join rows at exactly this set
pub(super) async fn replace_tags(
    conn: &mut SqliteConnection,
    link: TagLink,
    owner_id: Uuid,
    names: &[String],
) -> AppResult<Vec<Tag>> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        link.table(),
        link.owner_column()
    ))
    .bind(owner_id.to_string())
    .execute(&mut *conn)
    .await?;

    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let slug = slugify(name);
        sqlx::query(
            "INSERT INTO tags (id, name, slug, created_at) VALUES ($1, $2, $3, $4) ON CONFLICT(slug) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .bind(&slug)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query("SELECT id, name, slug FROM tags WHERE slug = $1")
            .bind(&slug)
            .fetch_one(&mut *conn)
            .await?;
        let tag = row_to_tag(&row)?;

        sqlx::query(&format!(
            "INSERT OR IGNORE INTO {} ({}, tag_id) VALUES ($1, $2)",
            link.table(),
            link.owner_column()
        ))
        .bind(owner_id.to_string())
        .bind(tag.id.to_string())
        .execute(&mut *conn)
        .await?;

        if !tags.iter().any(|t: &Tag| t.id == tag.id) {
            tags.push(tag);
        }
    }
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tags)
}

fn row_to_tag(row: &SqliteRow) -> AppResult<Tag> {
    Ok(Tag {
        id: get_uuid(row, "id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
    })
}
