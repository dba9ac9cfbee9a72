// ABOUTME: Product catalogue database operations
// ABOUTME: Filtered listing with visibility rules, tag-aware create/update and cascading delete

use chrono::SecondsFormat;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use super::tags::{replace_tags, TagLink};
use super::{count_to_u64, get_datetime, get_enum, get_opt_uuid, get_uuid, Database, Visibility};
use crate::errors::{AppError, AppResult};
use crate::models::{Product, ProductStatus};
use crate::pagination::PageParams;

pub(super) const PRODUCT_COLUMNS: &str = "p.id, p.seller_id, p.category_id, p.title, p.slug, \
    p.body, p.price_cents, p.currency, p.stock, p.status, p.created_at, p.updated_at";

/// Query filters for listing products
#[derive(Debug, Clone)]
pub struct ProductFilter {
    /// Restrict to a category
    pub category_id: Option<Uuid>,
    /// Restrict to products carrying this tag slug
    pub tag: Option<String>,
    /// Restrict to one seller
    pub seller_id: Option<Uuid>,
    /// Restrict to a status (still subject to visibility)
    pub status: Option<ProductStatus>,
    /// Only products with stock left
    pub in_stock: bool,
    /// Rows the caller may see
    pub visibility: Visibility,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            tag: None,
            seller_id: None,
            status: None,
            in_stock: false,
            visibility: Visibility::PublicOnly,
        }
    }
}

impl Database {
    pub(super) async fn migrate_products(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                seller_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                currency TEXT NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
                status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'active', 'archived')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS product_tags (
                product_id TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (product_id, tag_id)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_products_seller ON products(seller_id)",
            "CREATE INDEX IF NOT EXISTS idx_products_status_created ON products(status, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_product_tags_tag ON product_tags(tag_id)",
        ])
        .await
    }

    /// Whether a product already uses this slug
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn product_slug_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE slug = $1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Insert a product together with its tags in one transaction
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for a dangling seller or category and
    /// `RESOURCE_ALREADY_EXISTS` for a slug collision
    pub async fn create_product(&self, product: &Product, tag_names: &[String]) -> AppResult<Product> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO products (
                id, seller_id, category_id, title, slug, body, price_cents,
                currency, stock, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(product.id.to_string())
        .bind(product.seller_id.to_string())
        .bind(product.category_id.map(|id| id.to_string()))
        .bind(&product.title)
        .bind(&product.slug)
        .bind(&product.body)
        .bind(product.price_cents)
        .bind(&product.currency)
        .bind(product.stock)
        .bind(product.status.as_str())
        .bind(product.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(product.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;

        let tags = replace_tags(&mut *tx, TagLink::Product, product.id, tag_names).await?;
        tx.commit().await?;

        Ok(Product {
            stock: product.stock,
            tags,
            ..product.clone()
        })
    }

    /// Get a product with its tags
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(product_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut product = row_to_product(&row)?;
        product.tags = self
            .load_tags(TagLink::Product, &[product.id])
            .await?
            .remove(&product.id)
            .unwrap_or_default();
        Ok(Some(product))
    }

    /// List products newest first, returning the page and the unpaged total
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageParams,
    ) -> AppResult<(Vec<Product>, u64)> {
        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM products p WHERE 1 = 1");
        push_product_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut list_query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE 1 = 1"));
        push_product_filters(&mut list_query, filter);
        list_query
            .push(" ORDER BY p.created_at DESC, p.id LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));

        let rows = list_query.build().fetch_all(&self.pool).await?;
        let mut products = rows
            .iter()
            .map(row_to_product)
            .collect::<AppResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut tags = self.load_tags(TagLink::Product, &ids).await?;
        for product in &mut products {
            product.tags = tags.remove(&product.id).unwrap_or_default();
        }
        Ok((products, count_to_u64(total)))
    }

    /// Persist the editable columns; `tag_names` replaces the tag set when given
    ///
    /// `stock` is only written when `stock` is `Some`. Checkout decrements
    /// stock concurrently, so the copy in `product` may already be stale.
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the product vanished
    pub async fn update_product(
        &self,
        product: &Product,
        stock: Option<i64>,
        tag_names: Option<&[String]>,
    ) -> AppResult<Product> {
        let mut tx = self.pool.begin().await?;

        let current_stock: i64 = sqlx::query_scalar(
            r"
            UPDATE products SET
                category_id = $1, title = $2, slug = $3, body = $4, price_cents = $5,
                currency = $6, stock = COALESCE($7, stock), status = $8, updated_at = $9
            WHERE id = $10
            RETURNING stock
            ",
        )
        .bind(product.category_id.map(|id| id.to_string()))
        .bind(&product.title)
        .bind(&product.slug)
        .bind(&product.body)
        .bind(product.price_cents)
        .bind(&product.currency)
        .bind(stock)
        .bind(product.status.as_str())
        .bind(product.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(product.id.to_string())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

        let tags = match tag_names {
            Some(names) => replace_tags(&mut *tx, TagLink::Product, product.id, names).await?,
            None => product.tags.clone(),
        };
        tx.commit().await?;

        Ok(Product {
            stock: current_stock,
            tags,
            ..product.clone()
        })
    }

    /// Delete a product; order lines keep their snapshot with no product link
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_product(&self, product_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_product_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    match filter.visibility {
        Visibility::PublicOnly => {
            builder.push(" AND p.status = 'active'");
        }
        Visibility::PublicOrOwnedBy(user_id) => {
            builder
                .push(" AND (p.status = 'active' OR p.seller_id = ")
                .push_bind(user_id.to_string())
                .push(")");
        }
        Visibility::All => {}
    }
    if let Some(category_id) = filter.category_id {
        builder
            .push(" AND p.category_id = ")
            .push_bind(category_id.to_string());
    }
    if let Some(seller_id) = filter.seller_id {
        builder
            .push(" AND p.seller_id = ")
            .push_bind(seller_id.to_string());
    }
    if let Some(status) = filter.status {
        builder.push(" AND p.status = ").push_bind(status.as_str());
    }
    if filter.in_stock {
        builder.push(" AND p.stock > 0");
    }
    if let Some(tag) = &filter.tag {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM product_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.product_id = p.id AND t.slug = ",
            )
            .push_bind(tag.clone())
            .push(")");
    }
}

pub(super) fn row_to_product(row: &SqliteRow) -> AppResult<Product> {
    Ok(Product {
        id: get_uuid(row, "id")?,
        seller_id: get_uuid(row, "seller_id")?,
        category_id: get_opt_uuid(row, "category_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        body: row.try_get("body")?,
        price_cents: row.try_get("price_cents")?,
        currency: row.try_get("currency")?,
        stock: row.try_get("stock")?,
        status: get_enum(row, "status")?,
        tags: Vec::new(),
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}
