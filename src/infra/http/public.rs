use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    application::{
        blog::{BlogError, BlogService},
        error::{ErrorReport, HttpError},
        forms::{CommentForm, EmailPostForm},
    },
    domain::{entities::PostRecord, posts::PublishDay},
    presentation::views::{
        CommentResultView, CommentTemplate, LayoutChrome, LayoutContext, PostDetailTemplate,
        PostDetailView, PostListTemplate, PostListView, ShareTemplate, ShareView,
        render_not_found_response, render_template_response,
    },
};

use super::{
    HealthProbe, db_health_response,
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub blog: Arc<BlogService>,
    pub health: Arc<dyn HealthProbe>,
}

impl HttpState {
    fn chrome(&self) -> LayoutChrome {
        LayoutChrome::from_options(self.blog.options())
    }
}

/// Public routes. The first path segment is either a publish year or a post id.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(post_list))
        .route("/tag/{tag_slug}/", get(post_list_by_tag))
        .route("/{lead}/{month}/{day}/{slug}/", get(post_detail))
        .route("/{lead}/comment/", post(post_comment))
        .route("/{lead}/share/", get(post_share_form).post(post_share))
        .route("/_health/db", get(public_health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    page: Option<String>,
}

async fn post_list(State(state): State<HttpState>, Query(query): Query<PageQuery>) -> Response {
    render_post_list(&state, None, query.page.as_deref()).await
}

async fn post_list_by_tag(
    State(state): State<HttpState>,
    Path(tag_slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    render_post_list(&state, Some(&tag_slug), query.page.as_deref()).await
}

async fn render_post_list(state: &HttpState, tag_slug: Option<&str>, page: Option<&str>) -> Response {
    let chrome = state.chrome();

    match state.blog.list_posts(tag_slug, page).await {
        Ok(listing) => {
            let content = PostListView::from_listing(&listing);
            let title = content.tag.as_ref().map(|tag| format!("Posts tagged with {}", tag.name));
            let chrome = chrome.for_page(content.base_path(), title.as_deref());
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostListTemplate { view }, StatusCode::OK)
        }
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Path((year, month, day, slug)): Path<(String, String, String, String)>,
) -> Response {
    let chrome = state.chrome();

    let day = match PublishDay::parse(&year, &month, &day) {
        Ok(day) => day,
        Err(err) => return not_found_with_report(chrome, "infra::http::public::post_detail", &err),
    };

    match state.blog.post_detail(day, &slug).await {
        Ok(detail) => {
            let content = PostDetailView::from_detail(&detail);
            let chrome = chrome.for_page(&content.post.href, Some(&content.post.title));
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn post_comment(
    State(state): State<HttpState>,
    Path(lead): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = state.chrome();
    let Some(post_id) = parse_post_id(&lead) else {
        return render_not_found_response(chrome);
    };

    match state.blog.submit_comment(post_id, form).await {
        Ok(submission) => {
            let content = CommentResultView::from_submission(&submission);
            let chrome = chrome.for_page(&content.post.href, Some(&content.post.title));
            let view = LayoutContext::new(chrome, content);
            render_template_response(CommentTemplate { view }, StatusCode::OK)
        }
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn post_share_form(State(state): State<HttpState>, Path(lead): Path<String>) -> Response {
    let chrome = state.chrome();
    let post = match load_shared_post(&state, &lead).await {
        Ok(post) => post,
        Err(err) => return blog_error_to_response(err, chrome),
    };

    render_share(chrome, ShareView::empty(&post))
}

async fn post_share(
    State(state): State<HttpState>,
    Path(lead): Path<String>,
    Form(form): Form<EmailPostForm>,
) -> Response {
    let chrome = state.chrome();
    let post = match load_shared_post(&state, &lead).await {
        Ok(post) => post,
        Err(err) => return blog_error_to_response(err, chrome),
    };

    match state.blog.share_post(&post, form).await {
        Ok(submission) => render_share(chrome, ShareView::from_submission(&post, &submission)),
        Err(err) => blog_error_to_response(err, chrome),
    }
}

async fn load_shared_post(state: &HttpState, lead: &str) -> Result<PostRecord, BlogError> {
    let post_id = parse_post_id(lead).ok_or(BlogError::PostNotFound)?;
    state.blog.published_post(post_id).await
}

fn render_share(chrome: LayoutChrome, content: ShareView) -> Response {
    let title = format!("Share {}", content.post.title);
    let chrome = chrome.for_page(&content.post.href, Some(&title));
    let view = LayoutContext::new(chrome, content);
    render_template_response(ShareTemplate { view }, StatusCode::OK)
}

async fn public_health(State(state): State<HttpState>) -> Response {
    db_health_response(state.health.check().await)
}

async fn fallback(State(state): State<HttpState>) -> Response {
    render_not_found_response(state.chrome())
}

fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn blog_error_to_response(err: BlogError, chrome: LayoutChrome) -> Response {
    match err {
        BlogError::UnknownTag(_) | BlogError::PostNotFound => {
            not_found_with_report(chrome, "infra::http::public::blog_error_to_response", &err)
        }
        err => HttpError::from(err).into_response(),
    }
}

fn not_found_with_report(
    chrome: LayoutChrome,
    source: &'static str,
    err: &dyn std::error::Error,
) -> Response {
    let mut response = render_not_found_response(chrome);
    ErrorReport::from_error(source, StatusCode::NOT_FOUND, err).attach(&mut response);
    response
}
