use crate::application::{
    blog::{BlogOptions, CommentSubmission, PostDetail, PostListing, ShareSubmission, absolute_url},
    error::{ErrorReport, HttpError},
    forms::{CommentForm, EmailPostForm, FormErrors},
    pagination::PageWindow,
};
use crate::domain::{
    entities::{CommentRecord, PostRecord, TagRecord},
    posts::{format_human_date, format_human_datetime, truncate_words},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;

const EXCERPT_WORDS: usize = 30;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub canonical: String,
}

impl PageMetaView {
    pub fn with_canonical(self, canonical: String) -> Self {
        Self { canonical, ..self }
    }

    pub fn with_title(self, title: String) -> Self {
        Self { title, ..self }
    }
}

/// Site-wide framing shared by every page.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub meta: PageMetaView,
    public_url: String,
}

impl LayoutChrome {
    pub fn from_options(options: &BlogOptions) -> Self {
        Self {
            brand: BrandView {
                title: options.title.clone(),
                href: "/".to_string(),
            },
            meta: PageMetaView {
                title: options.title.clone(),
                canonical: absolute_url(&options.public_url, "/"),
            },
            public_url: options.public_url.clone(),
        }
    }

    /// Point the canonical link at `path` and prefix the site title with `page_title`.
    pub fn for_page(self, path: &str, page_title: Option<&str>) -> Self {
        let canonical = absolute_url(&self.public_url, path);
        let title = match page_title {
            Some(page_title) => format!("{page_title} | {}", self.brand.title),
            None => self.brand.title.clone(),
        };
        Self {
            meta: self.meta.with_canonical(canonical).with_title(title),
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            meta: chrome.meta,
            content,
        }
    }
}

#[derive(Clone)]
pub struct TagBadge {
    pub name: String,
    pub href: String,
}

pub fn build_tag_badges(tags: &[TagRecord]) -> Vec<TagBadge> {
    tags.iter().map(tag_badge).collect()
}

fn tag_badge(tag: &TagRecord) -> TagBadge {
    TagBadge {
        name: tag.name.clone(),
        href: tag_path(&tag.slug),
    }
}

pub fn tag_path(slug: &str) -> String {
    format!("/tag/{slug}/")
}

#[derive(Clone)]
pub struct PostCard {
    pub href: String,
    pub title: String,
    pub author: String,
    pub excerpt: String,
    pub iso_date: String,
    pub published: String,
    pub badges: Vec<TagBadge>,
}

pub struct PaginationView {
    pub number: u64,
    pub num_pages: u64,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
}

impl PaginationView {
    pub fn new(window: &PageWindow, base_path: &str) -> Self {
        let href = |page: u64| format!("{base_path}?page={page}");
        Self {
            number: window.number(),
            num_pages: window.num_pages(),
            previous_href: window.previous_page_number().map(href),
            next_href: window.next_page_number().map(href),
        }
    }
}

pub struct PostListView {
    pub posts: Vec<PostCard>,
    pub tag: Option<TagBadge>,
    pub pagination: PaginationView,
}

impl PostListView {
    pub fn from_listing(listing: &PostListing) -> Self {
        let base_path = listing
            .tag
            .as_ref()
            .map(|tag| tag_path(&tag.slug))
            .unwrap_or_else(|| "/".to_string());

        let posts = listing
            .posts
            .iter()
            .map(|entry| PostCard {
                href: entry.post.canonical_path(),
                title: entry.post.title.clone(),
                author: entry.post.author.clone(),
                excerpt: truncate_words(&entry.post.body, EXCERPT_WORDS),
                iso_date: iso_date(&entry.post),
                published: format_human_datetime(entry.post.publish),
                badges: build_tag_badges(&entry.tags),
            })
            .collect();

        Self {
            posts,
            tag: listing.tag.as_ref().map(tag_badge),
            pagination: PaginationView::new(&listing.window, &base_path),
        }
    }

    /// Canonical path of the listing's first page.
    pub fn base_path(&self) -> &str {
        self.tag.as_ref().map(|tag| tag.href.as_str()).unwrap_or("/")
    }
}

#[derive(Template)]
#[template(path = "list.html")]
pub struct PostListTemplate {
    pub view: LayoutContext<PostListView>,
}

/// Post header shared by detail, comment and share pages.
pub struct PostSummaryView {
    pub id: String,
    pub href: String,
    pub title: String,
    pub author: String,
    pub iso_date: String,
    pub published: String,
}

impl PostSummaryView {
    pub fn new(post: &PostRecord) -> Self {
        Self {
            id: post.id.to_string(),
            href: post.canonical_path(),
            title: post.title.clone(),
            author: post.author.clone(),
            iso_date: iso_date(post),
            published: format_human_datetime(post.publish),
        }
    }

    pub fn comment_action(&self) -> String {
        format!("/{}/comment/", self.id)
    }

    pub fn share_href(&self) -> String {
        format!("/{}/share/", self.id)
    }
}

pub struct CommentView {
    pub number: usize,
    pub name: String,
    pub created: String,
    pub paragraphs: Vec<String>,
}

impl CommentView {
    fn new(number: usize, comment: &CommentRecord) -> Self {
        Self {
            number,
            name: comment.name.clone(),
            created: format_human_date(comment.created_at),
            paragraphs: paragraphs(&comment.body),
        }
    }
}

/// One rendered form field: submitted value plus its errors.
pub struct FieldView {
    pub value: String,
    pub errors: Vec<String>,
}

impl FieldView {
    fn new(value: &str, errors: Option<&FormErrors>, field: &str) -> Self {
        Self {
            value: value.to_string(),
            errors: errors
                .map(|errors| errors.for_field(field).to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub struct CommentFormView {
    pub action: String,
    pub name: FieldView,
    pub email: FieldView,
    pub body: FieldView,
}

impl CommentFormView {
    pub fn new(post: &PostSummaryView, form: &CommentForm, errors: Option<&FormErrors>) -> Self {
        Self {
            action: post.comment_action(),
            name: FieldView::new(&form.name, errors, "name"),
            email: FieldView::new(&form.email, errors, "email"),
            body: FieldView::new(&form.body, errors, "body"),
        }
    }
}

pub struct PostDetailView {
    pub post: PostSummaryView,
    pub paragraphs: Vec<String>,
    pub tags: Vec<TagBadge>,
    pub comments: Vec<CommentView>,
    pub comment_count: usize,
    pub form: CommentFormView,
}

impl PostDetailView {
    pub fn from_detail(detail: &PostDetail) -> Self {
        let post = PostSummaryView::new(&detail.post);
        let form = CommentFormView::new(&post, &CommentForm::default(), None);
        let comments: Vec<CommentView> = detail
            .comments
            .iter()
            .enumerate()
            .map(|(index, comment)| CommentView::new(index + 1, comment))
            .collect();

        Self {
            paragraphs: paragraphs(&detail.post.body),
            tags: build_tag_badges(&detail.tags),
            comment_count: comments.len(),
            comments,
            form,
            post,
        }
    }
}

#[derive(Template)]
#[template(path = "detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct CommentResultView {
    pub post: PostSummaryView,
    pub created: Option<CommentView>,
    pub form: CommentFormView,
}

impl CommentResultView {
    pub fn from_submission(submission: &CommentSubmission) -> Self {
        let post = PostSummaryView::new(&submission.post);
        let (created, form) = match &submission.outcome {
            Ok(comment) => (
                Some(CommentView::new(1, comment)),
                CommentFormView::new(&post, &CommentForm::default(), None),
            ),
            Err(errors) => (
                None,
                CommentFormView::new(&post, &submission.form, Some(errors)),
            ),
        };

        Self {
            post,
            created,
            form,
        }
    }
}

#[derive(Template)]
#[template(path = "comment.html")]
pub struct CommentTemplate {
    pub view: LayoutContext<CommentResultView>,
}

pub struct ShareView {
    pub post: PostSummaryView,
    pub action: String,
    pub sent: bool,
    pub recipient: String,
    pub name: FieldView,
    pub email: FieldView,
    pub to: FieldView,
    pub comments: FieldView,
}

impl ShareView {
    pub fn empty(post: &PostRecord) -> Self {
        Self::build(post, &EmailPostForm::default(), None, false)
    }

    pub fn from_submission(post: &PostRecord, submission: &ShareSubmission) -> Self {
        match &submission.outcome {
            Ok(_) => Self::build(post, &submission.form, None, true),
            Err(errors) => Self::build(post, &submission.form, Some(errors), false),
        }
    }

    fn build(
        post: &PostRecord,
        form: &EmailPostForm,
        errors: Option<&FormErrors>,
        sent: bool,
    ) -> Self {
        let post = PostSummaryView::new(post);
        Self {
            action: post.share_href(),
            post,
            sent,
            recipient: form.to.trim().to_string(),
            name: FieldView::new(&form.name, errors, "name"),
            email: FieldView::new(&form.email, errors, "email"),
            to: FieldView::new(&form.to, errors, "to"),
            comments: FieldView::new(&form.comments, errors, "comments"),
        }
    }
}

#[derive(Template)]
#[template(path = "share.html")]
pub struct ShareTemplate {
    pub view: LayoutContext<ShareView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to all posts".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

fn iso_date(post: &PostRecord) -> String {
    post.publish.format(&Rfc3339).unwrap_or_default()
}

/// Split plain text on blank lines, keeping single line breaks inside a paragraph.
fn paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::Paginator;

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let parts = paragraphs("First line\nstill first\r\n\r\nSecond\n\n\n");
        assert_eq!(parts, vec!["First line\nstill first", "Second"]);
    }

    #[test]
    fn pagination_links_keep_base_path() {
        let window = Paginator::new(5, 2).resolve(Some("2"));
        let view = PaginationView::new(&window, "/tag/rust/");
        assert_eq!(view.number, 2);
        assert_eq!(view.num_pages, 3);
        assert_eq!(view.previous_href.as_deref(), Some("/tag/rust/?page=1"));
        assert_eq!(view.next_href.as_deref(), Some("/tag/rust/?page=3"));
    }

    #[test]
    fn chrome_prefixes_page_titles() {
        let chrome = LayoutChrome::from_options(&BlogOptions::default())
            .for_page("/2024/1/2/hello/", Some("Hello"));
        assert_eq!(chrome.meta.title, "Hello | Quire");
        assert_eq!(
            chrome.meta.canonical,
            "http://localhost:3000/2024/1/2/hello/"
        );
    }
}
