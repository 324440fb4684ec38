//! Public blog operations: listing, detail, comments and sharing.

use std::{num::NonZeroU32, sync::Arc};

use metrics::counter;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::forms::{CommentForm, EmailPostForm, FormErrors, ShareInput};
use crate::application::mail::{MailError, Mailer, OutgoingMail};
use crate::application::pagination::{PageWindow, Paginator};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, PostQueryFilter, PostsRepo, RepoError, TagsRepo,
};
use crate::domain::entities::{CommentRecord, PostRecord, TagRecord};
use crate::domain::posts::PublishDay;

pub const DEFAULT_PAGE_SIZE: u32 = 1;

pub const COMMENTS_CREATED_METRIC: &str = "quire_comments_created_total";
pub const SHARE_EMAILS_SENT_METRIC: &str = "quire_share_emails_sent_total";

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("unknown tag `{0}`")]
    UnknownTag(String),
    #[error("post not found")]
    PostNotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Mail(#[from] MailError),
}

#[derive(Debug, Clone)]
pub struct BlogOptions {
    pub title: String,
    pub public_url: String,
    pub page_size: NonZeroU32,
}

impl Default for BlogOptions {
    fn default() -> Self {
        Self {
            title: "Quire".to_string(),
            public_url: "http://localhost:3000".to_string(),
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostWithTags {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone)]
pub struct PostListing {
    pub posts: Vec<PostWithTags>,
    pub window: PageWindow,
    pub tag: Option<TagRecord>,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostRecord,
    pub tags: Vec<TagRecord>,
    pub comments: Vec<CommentRecord>,
}

/// Result of a comment submission. The form is echoed back either way.
#[derive(Debug, Clone)]
pub struct CommentSubmission {
    pub post: PostRecord,
    pub form: CommentForm,
    pub outcome: Result<CommentRecord, FormErrors>,
}

#[derive(Debug, Clone)]
pub struct ShareSubmission {
    pub form: EmailPostForm,
    pub outcome: Result<OutgoingMail, FormErrors>,
}

impl ShareSubmission {
    pub fn sent(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[derive(Clone)]
pub struct BlogService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    tags: Arc<dyn TagsRepo>,
    mailer: Arc<dyn Mailer>,
    options: BlogOptions,
}

impl BlogService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        tags: Arc<dyn TagsRepo>,
        mailer: Arc<dyn Mailer>,
        options: BlogOptions,
    ) -> Self {
        Self {
            posts,
            comments,
            tags,
            mailer,
            options,
        }
    }

    pub fn options(&self) -> &BlogOptions {
        &self.options
    }

    /// One page of published posts, optionally restricted to a tag slug.
    pub async fn list_posts(
        &self,
        tag_slug: Option<&str>,
        page: Option<&str>,
    ) -> Result<PostListing, BlogError> {
        let (tag, filter) = match tag_slug {
            Some(slug) => {
                let tag = self
                    .tags
                    .find_by_slug(slug)
                    .await?
                    .ok_or_else(|| BlogError::UnknownTag(slug.to_string()))?;
                let filter = PostQueryFilter::tagged(tag.slug.clone());
                (Some(tag), filter)
            }
            None => (None, PostQueryFilter::default()),
        };

        let total = self.posts.count_published(&filter).await?;
        let paginator = Paginator::new(total, u64::from(self.options.page_size.get()));
        let window = paginator.resolve(page);

        let records = self.posts.list_published(&filter, window.slice()).await?;
        let mut posts = Vec::with_capacity(records.len());
        for post in records {
            let tags = self.tags.list_for_post(post.id).await?;
            posts.push(PostWithTags { post, tags });
        }

        Ok(PostListing { posts, window, tag })
    }

    pub async fn post_detail(&self, day: PublishDay, slug: &str) -> Result<PostDetail, BlogError> {
        let post = self
            .posts
            .find_published(day, slug)
            .await?
            .ok_or(BlogError::PostNotFound)?;

        let tags = self.tags.list_for_post(post.id).await?;
        let comments = self.comments.list_active_for_post(post.id).await?;

        Ok(PostDetail {
            post,
            tags,
            comments,
        })
    }

    pub async fn published_post(&self, id: Uuid) -> Result<PostRecord, BlogError> {
        self.posts
            .find_published_by_id(id)
            .await?
            .ok_or(BlogError::PostNotFound)
    }

    /// Validate and store a comment on a published post.
    pub async fn submit_comment(
        &self,
        post_id: Uuid,
        form: CommentForm,
    ) -> Result<CommentSubmission, BlogError> {
        let post = self.published_post(post_id).await?;

        let outcome = match form.clean() {
            Ok(input) => {
                let comment = self
                    .comments
                    .create_comment(CreateCommentParams {
                        post_id: post.id,
                        name: input.name,
                        email: input.email,
                        body: input.body,
                    })
                    .await?;
                counter!(COMMENTS_CREATED_METRIC).increment(1);
                info!(
                    target = "quire::blog::comments",
                    post_id = %post.id,
                    comment_id = %comment.id,
                    "comment created"
                );
                Ok(comment)
            }
            Err(errors) => Err(errors),
        };

        Ok(CommentSubmission {
            post,
            form,
            outcome,
        })
    }

    /// Validate a share request and email the post link to the recipient.
    pub async fn share_post(
        &self,
        post: &PostRecord,
        form: EmailPostForm,
    ) -> Result<ShareSubmission, BlogError> {
        let input = match form.clean() {
            Ok(input) => input,
            Err(errors) => {
                return Ok(ShareSubmission {
                    form,
                    outcome: Err(errors),
                });
            }
        };

        let mail = self.compose_share_mail(post, &input);
        self.mailer.send(mail.clone()).await?;
        counter!(SHARE_EMAILS_SENT_METRIC).increment(1);
        info!(
            target = "quire::blog::share",
            post_id = %post.id,
            "post recommendation sent"
        );

        Ok(ShareSubmission {
            form,
            outcome: Ok(mail),
        })
    }

    pub fn absolute_post_url(&self, post: &PostRecord) -> String {
        absolute_url(&self.options.public_url, &post.canonical_path())
    }

    fn compose_share_mail(&self, post: &PostRecord, input: &ShareInput) -> OutgoingMail {
        let url = self.absolute_post_url(post);
        OutgoingMail {
            to: input.to.clone(),
            subject: format!("{} recommends you read {}", input.name, post.title),
            body: format!(
                "Read {} at {}\n\n{}'s comments: {}",
                post.title, url, input.name, input.comments
            ),
        }
    }
}

/// Join a site root and an absolute path without doubling slashes.
pub fn absolute_url(base: &str, path: &str) -> String {
    let root = base.trim_end_matches('/');
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        format!("{root}/")
    } else {
        format!("{root}/{trimmed}")
    }
}
