//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};
use crate::domain::posts::PublishDay;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Restricts a published-post listing. `tag` holds a tag slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostQueryFilter {
    pub tag: Option<String>,
}

impl PostQueryFilter {
    pub fn tagged(slug: impl Into<String>) -> Self {
        Self {
            tag: Some(slug.into()),
        }
    }
}

/// Offset window over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub name: String,
    pub email: String,
    pub body: String,
}

/// Read access to posts. Every method only ever returns published posts.
#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError>;

    /// Published posts ordered by publish time, newest first.
    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: Slice,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn find_published(
        &self,
        day: PublishDay,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn find_published_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Active comments on a post, oldest first.
    async fn list_active_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError>;
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError>;
}
