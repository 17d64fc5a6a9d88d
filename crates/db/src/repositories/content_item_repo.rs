//! Repository for the `content_items` and `content_item_tags` tables.

use colorbook_core::content::{DEFAULT_ASPECT_RATIO, DEFAULT_OUTPUT_FORMAT};
use colorbook_core::params::ImageModel;
use colorbook_core::types::DbId;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::content_item::{
    ContentItem, ContentListParams, CreateContentItem, UpdateContentItem,
};

/// Column list for `content_items` queries.
const COLUMNS: &str = "\
    id, client_key, name, title, description, prompt, body, \
    line_art_url, colored_url, user_color_url, \
    aspect_ratio, image_model, output_format, category_id, \
    is_public, is_online, hotness, created_at, updated_at";

/// Default page size for content listing.
const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for content listing.
const MAX_LIMIT: i64 = 200;

/// Provides CRUD operations for content items and their tag links.
pub struct ContentItemRepo;

impl ContentItemRepo {
    /// Insert a new content item and attach `input.tag_ids` in one transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateContentItem,
    ) -> Result<ContentItem, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO content_items \
                 (client_key, name, title, description, prompt, body, \
                  line_art_url, colored_url, user_color_url, \
                  aspect_ratio, image_model, output_format, category_id, \
                  is_public, is_online, hotness) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, \
                     COALESCE($10, '{DEFAULT_ASPECT_RATIO}'), \
                     COALESCE($11, '{model}'), \
                     COALESCE($12, '{DEFAULT_OUTPUT_FORMAT}'), \
                     $13, COALESCE($14, FALSE), COALESCE($15, FALSE), COALESCE($16, 0)) \
             RETURNING {COLUMNS}",
            model = ImageModel::default().as_str(),
        );
        let item = sqlx::query_as::<_, ContentItem>(&query)
            .bind(input.client_key.as_deref())
            .bind(Json(&input.name))
            .bind(Json(&input.title))
            .bind(Json(&input.description))
            .bind(Json(&input.prompt))
            .bind(Json(&input.body))
            .bind(input.line_art_url.as_deref())
            .bind(input.colored_url.as_deref())
            .bind(input.user_color_url.as_deref())
            .bind(input.aspect_ratio.as_deref())
            .bind(input.image_model.as_deref())
            .bind(input.output_format.as_deref())
            .bind(input.category_id)
            .bind(input.is_public)
            .bind(input.is_online)
            .bind(input.hotness)
            .fetch_one(&mut *tx)
            .await?;

        insert_tags(&mut tx, item.id, &input.tag_ids).await?;
        tx.commit().await?;
        Ok(item)
    }

    /// Find a content item by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ContentItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM content_items WHERE id = $1");
        sqlx::query_as::<_, ContentItem>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List content items, hottest first. Every filter is optional.
    pub async fn list(
        pool: &PgPool,
        params: &ContentListParams,
    ) -> Result<Vec<ContentItem>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM content_items c \
             WHERE ($1::BIGINT IS NULL OR c.category_id = $1) \
               AND ($2::BOOLEAN IS NULL OR c.is_online = $2) \
               AND ($3::BIGINT IS NULL OR EXISTS ( \
                     SELECT 1 FROM content_item_tags t \
                     WHERE t.content_item_id = c.id AND t.tag_id = $3)) \
             ORDER BY c.hotness DESC, c.id DESC \
             LIMIT $4 OFFSET $5"
        );
        sqlx::query_as::<_, ContentItem>(&query)
            .bind(params.category_id)
            .bind(params.is_online)
            .bind(params.tag_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Partially update a content item.
    ///
    /// Uses `COALESCE` so only provided fields are changed. The image URLs
    /// and `category_id` are double options: an explicit `None` inside
    /// clears the column.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateContentItem,
    ) -> Result<Option<ContentItem>, sqlx::Error> {
        let query = format!(
            "UPDATE content_items SET \
                 client_key = COALESCE($2, client_key), \
                 name = COALESCE($3, name), \
                 title = COALESCE($4, title), \
                 description = COALESCE($5, description), \
                 prompt = COALESCE($6, prompt), \
                 body = COALESCE($7, body), \
                 line_art_url = CASE WHEN $8 THEN $9 ELSE line_art_url END, \
                 colored_url = CASE WHEN $10 THEN $11 ELSE colored_url END, \
                 user_color_url = CASE WHEN $12 THEN $13 ELSE user_color_url END, \
                 aspect_ratio = COALESCE($14, aspect_ratio), \
                 image_model = COALESCE($15, image_model), \
                 output_format = COALESCE($16, output_format), \
                 category_id = CASE WHEN $17 THEN $18 ELSE category_id END, \
                 is_public = COALESCE($19, is_public), \
                 is_online = COALESCE($20, is_online), \
                 hotness = COALESCE($21, hotness) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ContentItem>(&query)
            .bind(id)
            .bind(input.client_key.as_deref())
            .bind(input.name.as_ref().map(Json))
            .bind(input.title.as_ref().map(Json))
            .bind(input.description.as_ref().map(Json))
            .bind(input.prompt.as_ref().map(Json))
            .bind(input.body.as_ref().map(Json))
            .bind(input.line_art_url.is_some())
            .bind(input.line_art_url.as_ref().and_then(|v| v.as_deref()))
            .bind(input.colored_url.is_some())
            .bind(input.colored_url.as_ref().and_then(|v| v.as_deref()))
            .bind(input.user_color_url.is_some())
            .bind(input.user_color_url.as_ref().and_then(|v| v.as_deref()))
            .bind(input.aspect_ratio.as_deref())
            .bind(input.image_model.as_deref())
            .bind(input.output_format.as_deref())
            .bind(input.category_id.is_some())
            .bind(input.category_id.flatten())
            .bind(input.is_public)
            .bind(input.is_online)
            .bind(input.hotness)
            .fetch_optional(pool)
            .await
    }

    /// Delete a content item. Tag links cascade.
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM content_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Tag links
    // -----------------------------------------------------------------------

    /// Replace the full tag set of an item.
    ///
    /// Returns the new tag ids, or `None` if the item does not exist.
    pub async fn set_tags(
        pool: &PgPool,
        id: DbId,
        tag_ids: &[DbId],
    ) -> Result<Option<Vec<DbId>>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let exists = sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM content_items WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM content_item_tags WHERE content_item_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_tags(&mut tx, id, tag_ids).await?;

        let ids = sqlx::query_scalar::<_, DbId>(
            "SELECT tag_id FROM content_item_tags WHERE content_item_id = $1 ORDER BY tag_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(ids))
    }

    /// Tag ids attached to an item, ascending.
    pub async fn tag_ids(pool: &PgPool, id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT tag_id FROM content_item_tags WHERE content_item_id = $1 ORDER BY tag_id",
        )
        .bind(id)
        .fetch_all(pool)
        .await
    }
}

async fn insert_tags(
    tx: &mut Transaction<'_, Postgres>,
    item_id: DbId,
    tag_ids: &[DbId],
) -> Result<(), sqlx::Error> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "INSERT INTO content_item_tags (content_item_id, tag_id) \
         SELECT $1, UNNEST($2::BIGINT[]) \
         ON CONFLICT DO NOTHING",
    )
    .bind(item_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
