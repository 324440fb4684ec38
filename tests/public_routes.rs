use std::sync::Arc;
use std::num::NonZeroU32;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use time::{OffsetDateTime, macros::datetime};
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use quire::application::blog::{BlogOptions, BlogService};
use quire::application::mail::{MailError, Mailer, OutgoingMail};
use quire::application::repos::{
    CommentsRepo, CreateCommentParams, PostQueryFilter, PostsRepo, RepoError, Slice, TagsRepo,
};
use quire::domain::entities::{CommentRecord, PostRecord, TagRecord};
use quire::domain::posts::PublishDay;
use quire::domain::types::PostStatus;
use quire::infra::http::{HealthProbe, HttpState, build_router};

#[derive(Default)]
struct MemoryStore {
    posts: Vec<PostRecord>,
    tags: Vec<TagRecord>,
    post_tags: Vec<(Uuid, Uuid)>,
    comments: Mutex<Vec<CommentRecord>>,
}

impl MemoryStore {
    fn published(&self, filter: &PostQueryFilter) -> Vec<PostRecord> {
        let tag_id = filter
            .tag
            .as_deref()
            .and_then(|slug| self.tags.iter().find(|tag| tag.slug == slug))
            .map(|tag| tag.id);

        let mut posts: Vec<PostRecord> = self
            .posts
            .iter()
            .filter(|post| post.status == PostStatus::Published)
            .filter(|post| match (&filter.tag, tag_id) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(_), Some(tag_id)) => self.post_tags.contains(&(post.id, tag_id)),
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.publish.cmp(&a.publish));
        posts
    }

    async fn comment_count(&self, post_id: Uuid) -> usize {
        self.comments
            .lock()
            .await
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .count()
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn count_published(&self, filter: &PostQueryFilter) -> Result<u64, RepoError> {
        Ok(self.published(filter).len() as u64)
    }

    async fn list_published(
        &self,
        filter: &PostQueryFilter,
        slice: Slice,
    ) -> Result<Vec<PostRecord>, RepoError> {
        Ok(self
            .published(filter)
            .into_iter()
            .skip(slice.offset as usize)
            .take(slice.limit as usize)
            .collect())
    }

    async fn find_published(
        &self,
        day: PublishDay,
        slug: &str,
    ) -> Result<Option<PostRecord>, RepoError> {
        let Some((start, end)) = day.utc_bounds() else {
            return Ok(None);
        };
        Ok(self
            .published(&PostQueryFilter::default())
            .into_iter()
            .find(|post| post.slug == slug && post.publish >= start && post.publish < end))
    }

    async fn find_published_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .published(&PostQueryFilter::default())
            .into_iter()
            .find(|post| post.id == id))
    }
}

#[async_trait]
impl CommentsRepo for MemoryStore {
    async fn list_active_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let mut comments: Vec<CommentRecord> = self
            .comments
            .lock()
            .await
            .iter()
            .filter(|comment| comment.post_id == post_id && comment.active)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = CommentRecord {
            id: Uuid::new_v4(),
            post_id: params.post_id,
            name: params.name,
            email: params.email,
            body: params.body,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.comments.lock().await.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl TagsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        Ok(self.tags.iter().find(|tag| tag.slug == slug).cloned())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        Ok(self
            .tags
            .iter()
            .filter(|tag| self.post_tags.contains(&(post_id, tag.id)))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

struct StaticHealth(bool);

#[async_trait]
impl HealthProbe for StaticHealth {
    async fn check(&self) -> Result<(), sqlx::Error> {
        if self.0 {
            Ok(())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
    router: Router,
    hello: PostRecord,
    second: PostRecord,
    draft: PostRecord,
}

fn post(slug: &str, status: PostStatus, publish: OffsetDateTime) -> PostRecord {
    PostRecord {
        id: Uuid::new_v4(),
        title: format!("Post {slug}"),
        slug: slug.to_string(),
        author: "editor".to_string(),
        body: format!("Body of {slug}.\n\nSecond paragraph."),
        status,
        publish,
        created_at: publish,
        updated_at: publish,
    }
}

fn tag(slug: &str) -> TagRecord {
    TagRecord {
        id: Uuid::new_v4(),
        name: slug.to_string(),
        slug: slug.to_string(),
    }
}

fn comment(post_id: Uuid, name: &str, active: bool, created_at: OffsetDateTime) -> CommentRecord {
    CommentRecord {
        id: Uuid::new_v4(),
        post_id,
        name: name.to_string(),
        email: format!("{name}@example.com"),
        body: format!("Comment from {name}"),
        active,
        created_at,
        updated_at: created_at,
    }
}

fn fixture_with(mailer: RecordingMailer, healthy: bool) -> Fixture {
    let hello = post("hello", PostStatus::Published, datetime!(2024-01-02 10:00 UTC));
    let second = post("second", PostStatus::Published, datetime!(2024-02-03 23:30 UTC));
    let draft = post("secret", PostStatus::Draft, datetime!(2024-03-04 08:00 UTC));
    let rust = tag("rust");
    let life = tag("life");

    let comments = vec![
        comment(hello.id, "visible", true, datetime!(2024-01-03 09:00 UTC)),
        comment(hello.id, "hidden", false, datetime!(2024-01-03 10:00 UTC)),
    ];

    let store = Arc::new(MemoryStore {
        posts: vec![hello.clone(), second.clone(), draft.clone()],
        post_tags: vec![(hello.id, rust.id), (draft.id, rust.id), (second.id, life.id)],
        tags: vec![rust, life],
        comments: Mutex::new(comments),
    });
    let mailer = Arc::new(mailer);

    let blog = BlogService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        mailer.clone(),
        BlogOptions {
            title: "Quire".to_string(),
            public_url: "https://blog.example".to_string(),
            page_size: NonZeroU32::new(1).expect("non-zero"),
        },
    );

    let router = build_router(HttpState {
        blog: Arc::new(blog),
        health: Arc::new(StaticHealth(healthy)),
    });

    Fixture {
        store,
        mailer,
        router,
        hello,
        second,
        draft,
    }
}

fn fixture() -> Fixture {
    fixture_with(RecordingMailer::default(), true)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}

async fn post_form(router: &Router, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(router, request).await
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn list_shows_newest_published_post_first() {
    let fx = fixture();
    let (status, body) = get(&fx.router, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Post second"));
    assert!(!body.contains("Post hello"));
    assert!(!body.contains("Post secret"));
    assert!(body.contains("Page 1 of 2."));
    assert!(body.contains("href=\"/2024/2/3/second/\""));
}

#[tokio::test]
async fn non_integer_page_yields_first_page() {
    let fx = fixture();
    let (status, body) = get(&fx.router, "/?page=abc").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Page 1 of 2."));
    assert!(body.contains("Post second"));
}

#[tokio::test]
async fn out_of_range_page_yields_last_page() {
    let fx = fixture();

    for uri in ["/?page=99", "/?page=0", "/?page=-3"] {
        let (status, body) = get(&fx.router, uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body.contains("Page 2 of 2."), "{uri}");
        assert!(body.contains("Post hello"), "{uri}");
    }
}

#[tokio::test]
async fn tag_filter_only_lists_tagged_published_posts() {
    let fx = fixture();
    let (status, body) = get(&fx.router, "/tag/rust/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Posts tagged with &#34;rust&#34;") || body.contains("Posts tagged with \"rust\""));
    assert!(body.contains("Post hello"));
    assert!(!body.contains("Post second"));
    assert!(!body.contains("Post secret"));
    assert!(body.contains("Page 1 of 1."));
}

#[tokio::test]
async fn unknown_tag_yields_not_found() {
    let fx = fixture();
    let (status, body) = get(&fx.router, "/tag/missing/").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Page Not Found"));
}

#[tokio::test]
async fn detail_renders_post_with_active_comments_only() {
    let fx = fixture();
    let (status, body) = get(&fx.router, "/2024/1/2/hello/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Post hello"));
    assert!(body.contains("Comment from visible"));
    assert!(!body.contains("Comment from hidden"));
    assert!(body.contains("1 comment<"));
    assert!(body.contains(&format!("action=\"/{}/comment/\"", fx.hello.id)));
}

#[tokio::test]
async fn detail_matches_zero_padded_dates() {
    let fx = fixture();
    let (status, _) = get(&fx.router, "/2024/01/02/hello/").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn detail_for_draft_missing_or_impossible_date_is_not_found() {
    let fx = fixture();

    for uri in [
        "/2024/3/4/secret/",
        "/2024/1/3/hello/",
        "/2024/1/2/nope/",
        "/2024/13/2/hello/",
        "/2024/2/30/hello/",
        "/9999/12/31/hello/",
        "/year/1/2/hello/",
    ] {
        let (status, _) = get(&fx.router, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert_eq!(fx.draft.status, PostStatus::Draft);
}

#[tokio::test]
async fn valid_comment_adds_exactly_one_row() {
    let fx = fixture();
    let before = fx.store.comment_count(fx.hello.id).await;

    let (status, body) = post_form(
        &fx.router,
        &format!("/{}/comment/", fx.hello.id),
        "name=Ada&email=ada%40example.com&body=Great+post",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Your comment has been added."));
    assert!(body.contains("Great post"));
    assert_eq!(fx.store.comment_count(fx.hello.id).await, before + 1);

    let (_, detail) = get(&fx.router, "/2024/1/2/hello/").await;
    assert!(detail.contains("2 comments"));
}

#[tokio::test]
async fn invalid_comment_rerenders_form_without_writing() {
    let fx = fixture();
    let before = fx.store.comment_count(fx.hello.id).await;

    let (status, body) = post_form(
        &fx.router,
        &format!("/{}/comment/", fx.hello.id),
        "name=Ada&email=not-an-email&body=",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("Your comment has been added."));
    assert!(body.contains("Enter a valid email address."));
    assert!(body.contains("This field is required."));
    assert!(body.contains("value=\"Ada\""));
    assert_eq!(fx.store.comment_count(fx.hello.id).await, before);
}

#[tokio::test]
async fn comment_with_null_character_rerenders_form() {
    let fx = fixture();
    let before = fx.store.comment_count(fx.hello.id).await;

    let (status, body) = post_form(
        &fx.router,
        &format!("/{}/comment/", fx.hello.id),
        "name=Ada&email=ada%40example.com&body=hi%00there",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("Your comment has been added."));
    assert!(body.contains("Null characters are not allowed."));
    assert_eq!(fx.store.comment_count(fx.hello.id).await, before);
}

#[tokio::test]
async fn comment_endpoint_rejects_get() {
    let fx = fixture();
    let (status, _) = get(&fx.router, &format!("/{}/comment/", fx.hello.id)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn comment_on_draft_or_unknown_post_is_not_found() {
    let fx = fixture();
    let body = "name=Ada&email=ada%40example.com&body=Hi";

    for uri in [
        format!("/{}/comment/", fx.draft.id),
        format!("/{}/comment/", Uuid::new_v4()),
        "/not-a-uuid/comment/".to_string(),
    ] {
        let (status, _) = post_form(&fx.router, &uri, body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    assert_eq!(fx.store.comment_count(fx.draft.id).await, 0);
}

#[tokio::test]
async fn share_form_starts_unsent() {
    let fx = fixture();
    let (status, body) = get(&fx.router, &format!("/{}/share/", fx.second.id)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("by e-mail"));
    assert!(!body.contains("E-mail successfully sent"));
    assert!(fx.mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn valid_share_sends_exactly_one_email() {
    let fx = fixture();
    let (status, body) = post_form(
        &fx.router,
        &format!("/{}/share/", fx.hello.id),
        "name=Ada&email=ada%40example.com&to=bob%40example.com&comments=Worth+a+read",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("E-mail successfully sent"));
    assert!(body.contains("bob@example.com"));

    let sent = fx.mailer.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@example.com");
    assert_eq!(sent[0].subject, "Ada recommends you read Post hello");
    assert_eq!(
        sent[0].body,
        "Read Post hello at https://blog.example/2024/1/2/hello/\n\nAda's comments: Worth a read"
    );
}

#[tokio::test]
async fn invalid_share_sends_nothing() {
    let fx = fixture();
    let (status, body) = post_form(
        &fx.router,
        &format!("/{}/share/", fx.hello.id),
        "name=Ada&email=ada%40example.com&to=nobody",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("E-mail successfully sent"));
    assert!(body.contains("Enter a valid email address."));
    assert!(fx.mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn share_with_null_character_sends_nothing() {
    let fx = fixture();
    let (status, body) = post_form(
        &fx.router,
        &format!("/{}/share/", fx.hello.id),
        "name=Ada&email=ada%40example.com&to=bob%40example.com&comments=a%00b",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("E-mail successfully sent"));
    assert!(body.contains("Null characters are not allowed."));
    assert!(fx.mailer.sent.lock().await.is_empty());
}

#[tokio::test]
async fn share_of_draft_is_not_found() {
    let fx = fixture();
    let (status, _) = get(&fx.router, &format!("/{}/share/", fx.draft.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mail_transport_failure_is_a_server_error() {
    let fx = fixture_with(
        RecordingMailer {
            fail: true,
            ..Default::default()
        },
        true,
    );
    let (status, _) = post_form(
        &fx.router,
        &format!("/{}/share/", fx.hello.id),
        "name=Ada&email=ada%40example.com&to=bob%40example.com",
    )
    .await;

    assert!(status.is_server_error());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let fx = fixture();

    let request = Request::builder()
        .uri("/")
        .header("x-request-id", "edge-7")
        .body(Body::empty())
        .expect("request");
    let response = fx.router.clone().oneshot(request).await.expect("response");
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("edge-7")
    );

    let request = Request::builder()
        .uri("/does/not/exist")
        .body(Body::empty())
        .expect("request");
    let response = fx.router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let generated = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("generated request id");
    assert!(Uuid::parse_str(generated).is_ok());
}

#[tokio::test]
async fn unmatched_path_renders_not_found_page() {
    let fx = fixture();
    let (status, body) = get(&fx.router, "/does/not/exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Back to all posts"));
}

#[tokio::test]
async fn health_reports_database_state() {
    let fx = fixture();
    let (status, _) = get(&fx.router, "/_health/db").await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let down = fixture_with(RecordingMailer::default(), false);
    let (status, _) = get(&down.router, "/_health/db").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
