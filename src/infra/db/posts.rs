use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{PostQueryFilter, PostsRepo, RepoError, Slice};
use crate::domain::entities::PostRecord;
use crate::domain::posts::PublishDay;
use crate::domain::types::PostStatus;

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str =
    "p.id, p.title, p.slug, p.author, p.body, p.status, p.publish, p.created_at, p.updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    title: String,
    slug: String,
    author: String,
    body: String,
    status: PostStatus,
    publish: OffsetDateTime,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            author: row.author,
            body: row.body,
            status: row.status,
            publish: row.publish,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_published_scope(&mut qb);
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: Slice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let limit = Self::convert_bound(slice.limit, "limit")?;
        let offset = Self::convert_bound(slice.offset, "offset")?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM posts p WHERE 1=1 ");
        Self::apply_published_scope(&mut qb);
        Self::apply_post_filter(&mut qb, filter);
        qb.push(" ORDER BY p.publish DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn find_published(
        &self,
        day: PublishDay,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError> {
        let Some((start, end)) = day.utc_bounds() else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p \
             WHERE p.status = $1 AND p.slug = $2 AND p.publish >= $3 AND p.publish < $4 \
             ORDER BY p.publish DESC LIMIT 1"
        );

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(PostStatus::Published)
            .bind(slug)
            .bind(start)
            .bind(end)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_published_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1 AND p.status = $2");

        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(PostStatus::Published)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }
}
