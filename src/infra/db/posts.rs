use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::{HeadingRecord, PostRecord};
use crate::domain::types::PostStatus;

use super::PgRepositories;
use super::util::map_sqlx_error;

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    slug: String,
    title: String,
    description: String,
    content: String,
    category: String,
    keywords: String,
    status: PostStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        PostRecord {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            content: row.content,
            category: row.category,
            keywords: row.keywords,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HeadingRow {
    id: Uuid,
    post_id: Uuid,
    title: String,
    slug: String,
    level: i16,
    position: i32,
}

impl From<HeadingRow> for HeadingRecord {
    fn from(row: HeadingRow) -> Self {
        HeadingRecord {
            id: row.id,
            post_id: row.post_id,
            title: row.title,
            slug: row.slug,
            level: row.level,
            position: row.position,
        }
    }
}

const POST_COLUMNS: &str = "id, slug, title, description, content, category, keywords, status, \
     created_at, updated_at";

#[async_trait]
impl PostsRepo for PgRepositories {
    async fn find_published(&self) -> Result<Vec<PostRecord>, RepoError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE status = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(PostStatus::Published)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_published_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = $1 AND status = $2");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(slug)
            .bind(PostStatus::Published)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_headings(&self, post_id: Uuid) -> Result<Vec<HeadingRecord>, RepoError> {
        let rows = sqlx::query_as::<_, HeadingRow>(
            "SELECT id, post_id, title, slug, level, position \
             FROM post_headings WHERE post_id = $1 ORDER BY position",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(HeadingRecord::from).collect())
    }
}
