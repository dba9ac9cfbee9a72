// ABOUTME: Uploaded image database operations
// ABOUTME: Stores image rows attached to posts or products and records optimization results

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{get_datetime, get_enum, get_opt_uuid, get_uuid, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Image, ImageParent, ImageStatus};

const IMAGE_COLUMNS: &str = "id, owner_id, post_id, product_id, file_name, original_path, \
    optimized_path, mime_type, size_bytes, optimized_size_bytes, width, height, alt_text, \
    status, last_error, created_at, updated_at";

impl Database {
    pub(super) async fn migrate_images(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id TEXT REFERENCES posts(id) ON DELETE CASCADE,
                product_id TEXT REFERENCES products(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                original_path TEXT NOT NULL,
                optimized_path TEXT,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                optimized_size_bytes INTEGER,
                width INTEGER,
                height INTEGER,
                alt_text TEXT,
                status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'ready', 'failed')),
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((post_id IS NULL) <> (product_id IS NULL))
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_images_post ON images(post_id)",
            "CREATE INDEX IF NOT EXISTS idx_images_product ON images(product_id)",
        ])
        .await
    }

    /// Insert an image row
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the parent row vanished
    pub async fn create_image(&self, image: &Image) -> AppResult<()> {
        let (post_id, product_id) = match image.parent {
            ImageParent::Post(id) => (Some(id.to_string()), None),
            ImageParent::Product(id) => (None, Some(id.to_string())),
        };

        sqlx::query(
            r"
            INSERT INTO images (
                id, owner_id, post_id, product_id, file_name, original_path, optimized_path,
                mime_type, size_bytes, optimized_size_bytes, width, height, alt_text,
                status, last_error, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ",
        )
        .bind(image.id.to_string())
        .bind(image.owner_id.to_string())
        .bind(post_id)
        .bind(product_id)
        .bind(&image.file_name)
        .bind(&image.original_path)
        .bind(&image.optimized_path)
        .bind(&image.mime_type)
        .bind(image.size_bytes)
        .bind(image.optimized_size_bytes)
        .bind(image.width)
        .bind(image.height)
        .bind(&image.alt_text)
        .bind(image.status.as_str())
        .bind(&image.last_error)
        .bind(image.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(image.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get an image by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_image(&self, image_id: Uuid) -> AppResult<Option<Image>> {
        let row = sqlx::query(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"))
            .bind(image_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_image).transpose()
    }

    /// Images attached to a post or product, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_images(&self, parent: ImageParent) -> AppResult<Vec<Image>> {
        let (column, id) = match parent {
            ImageParent::Post(id) => ("post_id", id),
            ImageParent::Product(id) => ("product_id", id),
        };
        let rows = sqlx::query(&format!(
            "SELECT {IMAGE_COLUMNS} FROM images WHERE {column} = $1 ORDER BY created_at, id"
        ))
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_image).collect()
    }

    /// Record a successful optimization
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the image was deleted meanwhile
    pub async fn mark_image_ready(
        &self,
        image_id: Uuid,
        optimized_path: &str,
        optimized_size_bytes: i64,
        width: i64,
        height: i64,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r"
            UPDATE images SET
                optimized_path = $1, optimized_size_bytes = $2, width = $3, height = $4,
                status = $5, last_error = NULL, updated_at = $6
            WHERE id = $7
            ",
        )
        .bind(optimized_path)
        .bind(optimized_size_bytes)
        .bind(width)
        .bind(height)
        .bind(ImageStatus::Ready.as_str())
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(image_id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Image"));
        }
        Ok(())
    }

    /// Record that optimization gave up
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn mark_image_failed(&self, image_id: Uuid, error: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE images SET status = $1, last_error = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(ImageStatus::Failed.as_str())
        .bind(error)
        .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(image_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an image row
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_image(&self, image_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(image_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_image(row: &SqliteRow) -> AppResult<Image> {
    let parent = match (get_opt_uuid(row, "post_id")?, get_opt_uuid(row, "product_id")?) {
        (Some(post_id), None) => ImageParent::Post(post_id),
        (None, Some(product_id)) => ImageParent::Product(product_id),
        _ => return Err(AppError::database("Image row has no single parent")),
    };

    Ok(Image {
        id: get_uuid(row, "id")?,
        owner_id: get_uuid(row, "owner_id")?,
        parent,
        file_name: row.try_get("file_name")?,
        original_path: row.try_get("original_path")?,
        optimized_path: row.try_get("optimized_path")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        optimized_size_bytes: row.try_get("optimized_size_bytes")?,
        width: row.try_get("width")?,
        height: row.try_get("height")?,
        alt_text: row.try_get("alt_text")?,
        status: get_enum::<ImageStatus>(row, "status")?,
        last_error: row.try_get("last_error")?,
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}
