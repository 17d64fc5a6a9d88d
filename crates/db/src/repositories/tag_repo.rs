//! Repository for the `tags` table.

use colorbook_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::tag::{CreateTag, Tag, UpdateTag};

/// Column list for `tags` queries.
const COLUMNS: &str = "id, slug, name, created_at, updated_at";

/// Provides CRUD operations for tags.
pub struct TagRepo;

impl TagRepo {
    pub async fn create(pool: &PgPool, input: &CreateTag) -> Result<Tag, sqlx::Error> {
        let query = format!(
            "INSERT INTO tags (slug, name) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tag>(&query)
            .bind(&input.slug)
            .bind(Json(&input.name))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Tag>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tags WHERE id = $1");
        sqlx::query_as::<_, Tag>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All tags ordered by slug.
    pub async fn list(pool: &PgPool) -> Result<Vec<Tag>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tags ORDER BY slug");
        sqlx::query_as::<_, Tag>(&query).fetch_all(pool).await
    }

    /// Tags attached to one content item.
    pub async fn list_for_item(pool: &PgPool, item_id: DbId) -> Result<Vec<Tag>, sqlx::Error> {
        let query = format!(
            "SELECT {cols} FROM tags t \
             JOIN content_item_tags ct ON ct.tag_id = t.id \
             WHERE ct.content_item_id = $1 \
             ORDER BY t.slug",
            cols = prefixed("t"),
        );
        sqlx::query_as::<_, Tag>(&query)
            .bind(item_id)
            .fetch_all(pool)
            .await
    }

    /// Returns `None` if no tag with the given ID exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTag,
    ) -> Result<Option<Tag>, sqlx::Error> {
        let query = format!(
            "UPDATE tags SET \
                 slug = COALESCE($2, slug), \
                 name = COALESCE($3, name) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tag>(&query)
            .bind(id)
            .bind(input.slug.as_deref())
            .bind(input.name.as_ref().map(Json))
            .fetch_optional(pool)
            .await
    }

    /// Delete a tag. Links to content items cascade.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// `COLUMNS` qualified with a table alias.
fn prefixed(alias: &str) -> String {
    COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
