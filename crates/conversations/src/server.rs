//! HTTP API.
//!
//! Provides REST endpoints for:
//! - Health checks
//! - The conversation list and per-conversation messages
//! - Posting comments, editing labels and opening issues
//! - Tracked-repository settings

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::assembler::{build_conversation, ConversationAssembler, ConversationDetail};
use crate::display::extract_issue_title;
use crate::error::ConversationError;
use crate::github::{GitHubProvider, NewIssue, Repository};
use crate::models::{Conversation, Message, RepoRef};
use crate::normalizer::comment_message;
use crate::store::RepoStore;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// State shared across handlers.
pub struct AppState {
    pub assembler: ConversationAssembler,
    pub provider: Arc<dyn GitHubProvider>,
    pub store: Arc<dyn RepoStore>,
}

impl AppState {
    pub fn new(provider: Arc<dyn GitHubProvider>, store: Arc<dyn RepoStore>) -> Self {
        Self {
            assembler: ConversationAssembler::new(Arc::clone(&provider)),
            provider,
            store,
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/conversations", get(conversations_handler))
        .route(
            "/api/conversations/{owner}/{repo}/{number}",
            get(conversation_detail_handler),
        )
        .route(
            "/api/messages",
            get(messages_handler).post(post_message_handler),
        )
        .route(
            "/api/labels",
            get(labels_handler)
                .post(add_label_handler)
                .delete(remove_label_handler),
        )
        .route("/api/issues", post(create_issue_handler))
        .route("/api/repos", get(repos_handler))
        .route(
            "/api/settings",
            get(settings_handler).put(update_settings_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the address.
pub async fn run_server(state: Arc<AppState>, addr: &str) -> std::io::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Conversations API listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response: a status code and `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(err: &ConversationError) -> StatusCode {
    match err.root() {
        ConversationError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ConversationError::Unauthorized => StatusCode::UNAUTHORIZED,
        ConversationError::NotFound(_) => StatusCode::NOT_FOUND,
        ConversationError::InvalidRepository(_) => StatusCode::BAD_REQUEST,
        ConversationError::Http(_) | ConversationError::Api { .. } => StatusCode::BAD_GATEWAY,
        ConversationError::Repository { .. }
        | ConversationError::InvalidUrl(_)
        | ConversationError::Storage(_)
        | ConversationError::Serialization(_)
        | ConversationError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        let status = status_for(&err);
        let upstream = err.is_upstream();
        if status.is_server_error() {
            error!(status = status.as_u16(), upstream, "Request failed: {err}");
        } else {
            warn!(status = status.as_u16(), upstream, "Request rejected: {err}");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request/Response types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// `owner`, `repo` and `number` of one issue or pull request.
#[derive(Debug, Deserialize)]
pub struct IssueTarget {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueTarget {
    fn repo_ref(&self) -> Result<RepoRef, ApiError> {
        parse_repo(&self.owner, &self.repo)
    }
}

fn parse_repo(owner: &str, repo: &str) -> Result<RepoRef, ApiError> {
    if owner.trim().is_empty() || repo.trim().is_empty() {
        return Err(ApiError::bad_request("owner and repo are required"));
    }
    Ok(format!("{owner}/{repo}").parse()?)
}

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(flatten)]
    pub target: IssueTarget,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    #[serde(flatten)]
    pub target: IssueTarget,
    pub label: String,
}

#[derive(Debug, Serialize)]
struct LabelsResponse {
    labels: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateIssueRequest {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub tracked_repos: Vec<RepoRef>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn conversations_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Conversation>> {
    let repos = state.store.tracked_repos().await?;
    if repos.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let conversations = state.assembler.list_conversations(&repos).await?;
    Ok(Json(conversations))
}

async fn conversation_detail_handler(
    State(state): State<Arc<AppState>>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
) -> ApiResult<ConversationDetail> {
    let repo = parse_repo(&owner, &repo)?;
    Ok(Json(state.assembler.conversation_detail(&repo, number).await?))
}

async fn messages_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<IssueTarget>, QueryRejection>,
) -> ApiResult<Vec<Message>> {
    let Query(target) = query?;
    let repo = target.repo_ref()?;
    Ok(Json(state.assembler.list_messages(&repo, target.number).await?))
}

async fn post_message_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PostMessageRequest>, JsonRejection>,
) -> ApiResult<Message> {
    let Json(request) = request?;
    require(&request.body, "body")?;
    let repo = request.target.repo_ref()?;

    let comment = state
        .provider
        .create_comment(&repo, request.target.number, &request.body)
        .await?;
    info!(repo = %repo, number = request.target.number, "Posted comment");
    Ok(Json(comment_message(&comment)))
}

async fn labels_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<IssueTarget>, QueryRejection>,
) -> ApiResult<LabelsResponse> {
    let Query(target) = query?;
    let repo = target.repo_ref()?;
    let labels = state.provider.list_labels(&repo, target.number).await?;
    Ok(Json(LabelsResponse { labels }))
}

async fn add_label_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<LabelRequest>, JsonRejection>,
) -> ApiResult<OkResponse> {
    let Json(request) = request?;
    require(&request.label, "label")?;
    let repo = request.target.repo_ref()?;

    state
        .provider
        .add_labels(&repo, request.target.number, &[request.label.clone()])
        .await?;
    info!(repo = %repo, number = request.target.number, label = %request.label, "Added label");
    Ok(Json(OkResponse { ok: true }))
}

async fn remove_label_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<LabelRequest>, JsonRejection>,
) -> ApiResult<OkResponse> {
    let Json(request) = request?;
    require(&request.label, "label")?;
    let repo = request.target.repo_ref()?;

    state
        .provider
        .remove_label(&repo, request.target.number, &request.label)
        .await?;
    info!(repo = %repo, number = request.target.number, label = %request.label, "Removed label");
    Ok(Json(OkResponse { ok: true }))
}

async fn create_issue_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<CreateIssueRequest>, JsonRejection>,
) -> ApiResult<Conversation> {
    let Json(request) = request?;
    require(&request.body, "body")?;
    let repo = parse_repo(&request.owner, &request.repo)?;

    let title = match request.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => extract_issue_title(&request.body),
    };
    if title.is_empty() {
        return Err(ApiError::bad_request("title could not be derived from body"));
    }

    let issue = state
        .provider
        .create_issue(
            &repo,
            &NewIssue {
                title,
                body: request.body,
                labels: request.labels,
            },
        )
        .await?;
    info!(repo = %repo, number = issue.number, "Created issue");
    Ok(Json(build_conversation(&repo, &issue)))
}

async fn repos_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Repository>> {
    Ok(Json(state.provider.list_user_repos().await?))
}

async fn settings_handler(State(state): State<Arc<AppState>>) -> ApiResult<Settings> {
    Ok(Json(Settings {
        tracked_repos: state.store.tracked_repos().await?,
    }))
}

async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<Settings>, JsonRejection>,
) -> ApiResult<Settings> {
    let Json(settings) = request?;
    state.store.set_tracked_repos(settings.tracked_repos).await?;
    let tracked_repos = state.store.tracked_repos().await?;
    info!(count = tracked_repos.len(), "Updated tracked repositories");
    Ok(Json(Settings { tracked_repos }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::github::fake::{comment, issue, pull_request, user, FakeProvider};
    use crate::store::MemoryRepoStore;

    fn widgets() -> RepoRef {
        RepoRef::new("acme", "widgets")
    }

    fn provider() -> FakeProvider {
        FakeProvider::new()
            .with_issue(&widgets(), issue(1, "2024-01-01T00:00:00Z", "2024-01-01T00:00:00Z", &["blocked"]))
            .with_issue(&widgets(), pull_request(2, "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z", &[]))
            .with_comments(
                &widgets(),
                1,
                vec![comment(10, user("bob", false), "@claude go", "2024-01-01T01:00:00Z")],
            )
    }

    async fn app_with(provider: FakeProvider, tracked: Vec<RepoRef>) -> (Router, Arc<AppState>) {
        let store = Arc::new(MemoryRepoStore::new());
        store.set_tracked_repos(tracked).await.unwrap();
        let state = Arc::new(AppState::new(Arc::new(provider), store));
        (build_router(Arc::clone(&state)), state)
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(FakeProvider::new(), vec![]).await;
        let (status, body) = send(app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_conversations_empty_without_tracked_repos() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, body) = send(app, Method::GET, "/api/conversations", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_conversations_list() {
        let (app, _) = app_with(provider(), vec![widgets()]).await;
        let (status, body) = send(app, Method::GET, "/api/conversations", None).await;

        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["id"], "acme-widgets-pr-2");
        assert_eq!(list[0]["type"], "pull_request");
        assert_eq!(list[0]["attentionLevel"], "review");
        assert_eq!(list[1]["attentionLevel"], "urgent");
        assert_eq!(list[1]["repo"], "acme/widgets");
        assert_eq!(list[1]["lastMessage"], Value::Null);
    }

    #[tokio::test]
    async fn test_failing_repo_is_bad_gateway() {
        let gadgets = RepoRef::new("acme", "gadgets");
        let (app, _) = app_with(provider().failing(&gadgets), vec![widgets(), gadgets]).await;
        let (status, body) = send(app, Method::GET, "/api/conversations", None).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("acme/gadgets"));
    }

    #[tokio::test]
    async fn test_messages() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, body) = send(
            app,
            Method::GET,
            "/api/messages?owner=acme&repo=widgets&number=1",
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "issue_body");
        assert_eq!(messages[1]["author"]["login"], "bob");
        assert_eq!(messages[1]["agentType"], Value::Null);
    }

    #[tokio::test]
    async fn test_messages_bad_params() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, body) = send(app.clone(), Method::GET, "/api/messages?owner=acme&repo=widgets", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(
            app.clone(),
            Method::GET,
            "/api/messages?owner=acme&repo=widgets&number=abc",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app, Method::GET, "/api/messages?owner=&repo=widgets&number=1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_issue_is_not_found() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, _) = send(app, Method::GET, "/api/conversations/acme/widgets/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conversation_detail() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, body) = send(app, Method::GET, "/api/conversations/acme/widgets/1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation"]["lastMessage"]["id"], 10);
        assert_eq!(body["conversation"]["attentionLevel"], "urgent");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_post_message() {
        let fake = Arc::new(provider());
        let state = Arc::new(AppState::new(fake.clone(), Arc::new(MemoryRepoStore::new())));
        let app = build_router(state);
        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/api/messages",
            Some(json!({"owner": "acme", "repo": "widgets", "number": 1, "body": "@claude continue"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], "@claude continue");
        assert_eq!(body["type"], "comment");

        let (status, _) = send(
            app,
            Method::POST,
            "/api/messages",
            Some(json!({"owner": "acme", "repo": "widgets", "number": 1, "body": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // the blank body never reached GitHub
        let posted = fake.posted_comments.lock().unwrap();
        assert_eq!(
            *posted,
            vec![((widgets(), 1), "@claude continue".to_string())]
        );
    }

    #[tokio::test]
    async fn test_label_round_trip() {
        let (app, _) = app_with(provider(), vec![]).await;
        let target = json!({"owner": "acme", "repo": "widgets", "number": 1, "label": "planning"});

        let (status, body) = send(app.clone(), Method::POST, "/api/labels", Some(target.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (_, body) = send(
            app.clone(),
            Method::GET,
            "/api/labels?owner=acme&repo=widgets&number=1",
            None,
        )
        .await;
        assert_eq!(body, json!({"labels": ["planning"]}));

        let (status, _) = send(app.clone(), Method::DELETE, "/api/labels", Some(target.clone())).await;
        assert_eq!(status, StatusCode::OK);
        // removing again still succeeds
        let (status, _) = send(app.clone(), Method::DELETE, "/api/labels", Some(target)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(
            app,
            Method::GET,
            "/api/labels?owner=acme&repo=widgets&number=1",
            None,
        )
        .await;
        assert_eq!(body, json!({"labels": []}));
    }

    #[tokio::test]
    async fn test_create_issue_derives_title() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/api/issues",
            Some(json!({"owner": "acme", "repo": "widgets", "body": "Add dark mode. Users keep asking."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Add dark mode");
        assert_eq!(body["number"], 77);

        let (status, body) = send(
            app,
            Method::POST,
            "/api/issues",
            Some(json!({"owner": "acme", "repo": "widgets", "title": "Explicit", "body": "Details"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Explicit");
    }

    #[tokio::test]
    async fn test_repos() {
        let (app, _) = app_with(provider(), vec![]).await;
        let (status, body) = send(app, Method::GET, "/api/repos", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["fullName"], "acme/widgets");
        assert_eq!(body[0]["openIssueCount"], 1);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let (app, state) = app_with(provider(), vec![]).await;

        let (status, body) = send(app.clone(), Method::GET, "/api/settings", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"trackedRepos": []}));

        let (status, body) = send(
            app.clone(),
            Method::PUT,
            "/api/settings",
            Some(json!({"trackedRepos": ["acme/widgets", "acme/widgets"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"trackedRepos": ["acme/widgets"]}));
        assert_eq!(state.store.tracked_repos().await.unwrap(), vec![widgets()]);

        let (status, _) = send(
            app,
            Method::PUT,
            "/api/settings",
            Some(json!({"trackedRepos": ["not-a-repo"]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_status_mapping() {
        use std::time::Duration;

        let cases = [
            (ConversationError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ConversationError::RateLimited {
                    reset_in: Duration::from_secs(1),
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (ConversationError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (
                ConversationError::InvalidRepository("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ConversationError::Api {
                    status: 500,
                    message: "boom".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ConversationError::Storage("disk".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err.for_repository("acme/widgets")), expected);
        }
    }
}
