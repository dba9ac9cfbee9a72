// ABOUTME: Post database operations
// ABOUTME: Filtered listing with visibility rules, tag-aware create/update and cascading delete

use chrono::SecondsFormat;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use super::tags::{replace_tags, TagLink};
use super::{
    count_to_u64, get_datetime, get_enum, get_opt_datetime, get_opt_uuid, get_uuid, Database,
    Visibility,
};
use crate::errors::{AppError, AppResult};
use crate::models::{Post, PostStatus, PostType};
use crate::pagination::PageParams;

const POST_COLUMNS: &str = "p.id, p.author_id, p.category_id, p.title, p.slug, p.content, \
    p.excerpt, p.post_type, p.status, p.published_at, p.created_at, p.updated_at";

/// Query filters for listing posts
#[derive(Debug, Clone)]
pub struct PostFilter {
    /// Restrict to a category
    pub category_id: Option<Uuid>,
    /// Restrict to posts carrying this tag slug
    pub tag: Option<String>,
    /// Restrict to a post type
    pub post_type: Option<PostType>,
    /// Restrict to one author
    pub author_id: Option<Uuid>,
    /// Restrict to a status (still subject to visibility)
    pub status: Option<PostStatus>,
    /// Rows the caller may see
    pub visibility: Visibility,
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            tag: None,
            post_type: None,
            author_id: None,
            status: None,
            visibility: Visibility::PublicOnly,
        }
    }
}

impl Database {
    pub(super) async fn migrate_posts(&self) -> AppResult<()> {
        self.execute_ddl(&[
            r"
            CREATE TABLE IF NOT EXISTS posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
                title TEXT NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                content TEXT NOT NULL,
                excerpt TEXT NOT NULL DEFAULT '',
                post_type TEXT NOT NULL DEFAULT 'article' CHECK (post_type IN ('article', 'news', 'page')),
                status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'published')),
                published_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            r"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (post_id, tag_id)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
            "CREATE INDEX IF NOT EXISTS idx_posts_status_created ON posts(status, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags(tag_id)",
        ])
        .await
    }

    /// Whether a post already uses this slug
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn post_slug_exists(&self, slug: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a post together with its tags in one transaction
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for a dangling author or category and
    /// `RESOURCE_ALREADY_EXISTS` for a slug collision
    pub async fn create_post(&self, post: &Post, tag_names: &[String]) -> AppResult<Post> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO posts (
                id, author_id, category_id, title, slug, content, excerpt,
                post_type, status, published_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(post.id.to_string())
        .bind(post.author_id.to_string())
        .bind(post.category_id.map(|id| id.to_string()))
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.post_type.as_str())
        .bind(post.status.as_str())
        .bind(post.published_at.map(|at| at.to_rfc3339_opts(SecondsFormat::Micros, true)))
        .bind(post.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(post.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&mut *tx)
        .await?;

        let tags = replace_tags(&mut *tx, TagLink::Post, post.id, tag_names).await?;
        tx.commit().await?;

        Ok(Post {
            tags,
            ..post.clone()
        })
    }

    /// Get a post with its tags
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_post(&self, post_id: Uuid) -> AppResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"))
            .bind(post_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut post = row_to_post(&row)?;
        post.tags = self
            .load_tags(TagLink::Post, &[post.id])
            .await?
            .remove(&post.id)
            .unwrap_or_default();
        Ok(Some(post))
    }

    /// List posts newest first, returning the page and the unpaged total
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_posts(
        &self,
        filter: &PostFilter,
        page: PageParams,
    ) -> AppResult<(Vec<Post>, u64)> {
        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1 = 1");
        push_post_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut list_query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts p WHERE 1 = 1"));
        push_post_filters(&mut list_query, filter);
        list_query
            .push(" ORDER BY p.created_at DESC, p.id LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));

        let rows = list_query.build().fetch_all(&self.pool).await?;
        let mut posts = rows.iter().map(row_to_post).collect::<AppResult<Vec<_>>>()?;

        let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        let mut tags = self.load_tags(TagLink::Post, &ids).await?;
        for post in &mut posts {
            post.tags = tags.remove(&post.id).unwrap_or_default();
        }
        Ok((posts, count_to_u64(total)))
    }

    /// Persist every mutable column; `tag_names` replaces the tag set when given
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` if the post vanished
    pub async fn update_post(&self, post: &Post, tag_names: Option<&[String]>) -> AppResult<Post> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE posts SET
                category_id = $1, title = $2, slug = $3, content = $4, excerpt = $5,
                post_type = $6, status = $7, published_at = $8, updated_at = $9
            WHERE id = $10
            ",
        )
        .bind(post.category_id.map(|id| id.to_string()))
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.post_type.as_str())
        .bind(post.status.as_str())
        .bind(post.published_at.map(|at| at.to_rfc3339_opts(SecondsFormat::Micros, true)))
        .bind(post.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(post.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Post"));
        }

        let tags = match tag_names {
            Some(names) => replace_tags(&mut *tx, TagLink::Post, post.id, names).await?,
            None => post.tags.clone(),
        };
        tx.commit().await?;

        Ok(Post {
            tags,
            ..post.clone()
        })
    }

    /// Delete a post; tags links and images cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn delete_post(&self, post_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_post_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    match filter.visibility {
        Visibility::PublicOnly => {
            builder.push(" AND p.status = 'published'");
        }
        Visibility::PublicOrOwnedBy(user_id) => {
            builder
                .push(" AND (p.status = 'published' OR p.author_id = ")
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
    if let Some(author_id) = filter.author_id {
        builder
            .push(" AND p.author_id = ")
            .push_bind(author_id.to_string());
    }
    if let Some(post_type) = filter.post_type {
        builder
            .push(" AND p.post_type = ")
            .push_bind(post_type.as_str());
    }
    if let Some(status) = filter.status {
        builder.push(" AND p.status = ").push_bind(status.as_str());
    }
    if let Some(tag) = &filter.tag {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.slug = ",
            )
            .push_bind(tag.clone())
            .push(")");
    }
}

fn row_to_post(row: &SqliteRow) -> AppResult<Post> {
    Ok(Post {
        id: get_uuid(row, "id")?,
        author_id: get_uuid(row, "author_id")?,
        category_id: get_opt_uuid(row, "category_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        content: row.try_get("content")?,
        excerpt: row.try_get("excerpt")?,
        post_type: get_enum(row, "post_type")?,
        status: get_enum(row, "status")?,
        published_at: get_opt_datetime(row, "published_at")?,
        tags: Vec::new(),
        created_at: get_datetime(row, "created_at")?,
        updated_at: get_datetime(row, "updated_at")?,
    })
}
