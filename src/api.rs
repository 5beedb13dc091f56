//! HTTP client for the task/team REST API.
//!
//! Every call carries `Content-Type: application/json` and, when the session
//! holds a token, `Authorization: Bearer <token>`. Non-2xx replies become
//! `ApiError::Status { status, data }` with the body parsed as JSON on a
//! best-effort basis (`{}` when it isn't JSON). A 401 or 403 ends the
//! session before the error is returned.

use crate::model::{
    AuthResponse, Credentials, Invite, NewTeam, Task, TaskDraft, TaskId, TaskPatch, Team,
    TeamId, TeamMember, MemberId, User, UserId,
};
use crate::session::Session;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered outside 2xx.
    #[error("HTTP {status}: {}", message_of(.data).unwrap_or("request failed"))]
    Status { status: u16, data: Value },
    /// A 2xx body that did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// Blocked before sending.
    #[error("{0}")]
    Validation(String),
    /// The task running the request died before it produced a response.
    #[error("request aborted: {0}")]
    Aborted(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Text fit for an inline message: the server's `error` or `message`
    /// field when it sent one.
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { data, .. } => match message_of(data) {
                Some(m) => m.to_string(),
                None => self.to_string(),
            },
            other => other.to_string(),
        }
    }
}

fn message_of(data: &Value) -> Option<&str> {
    data.get("error")
        .and_then(Value::as_str)
        .or_else(|| data.get("message").and_then(Value::as_str))
        .or_else(|| data.as_str())
}

pub type ApiResult<T> = Result<T, ApiError>;

// ── Client ─────────────────────────────────────────────────────

/// Cheap to clone; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        ApiClient {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Auth ───────────────────────────────────────────────────

    pub async fn register(&self, username: &str, password: &str) -> ApiResult<User> {
        check_credentials(username, password)?;
        self.authenticate("/auth/register", username, password).await
    }

    /// Any previous session is torn down first so stale credentials never
    /// ride along with the login request. Blank input leaves it alone.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<User> {
        check_credentials(username, password)?;
        self.session.end();
        self.authenticate("/auth/login", username, password).await
    }

    pub fn logout(&self) {
        self.session.end();
    }

    pub async fn me(&self) -> ApiResult<User> {
        self.get("/auth/me").await
    }

    async fn authenticate(&self, path: &str, username: &str, password: &str) -> ApiResult<User> {
        let body = Credentials { username, password };
        let reply: AuthResponse = self.fetch(self.request(Method::POST, path).json(&body)).await?;
        let (Some(user), Some(token)) = (reply.user, reply.token) else {
            return Err(ApiError::Decode("auth response is missing user or token".into()));
        };
        self.session.begin(token, user.clone());
        Ok(user)
    }

    // ── Tasks ──────────────────────────────────────────────────

    pub async fn list_tasks(&self, user_id: UserId, mode: Option<&str>) -> ApiResult<Vec<Task>> {
        let mut query = vec![("userId", user_id.to_string())];
        if let Some(mode) = mode {
            query.push(("mode", mode.to_string()));
        }
        self.fetch(self.request(Method::GET, "/tasks").query(&query)).await
    }

    pub async fn personal_tasks(&self) -> ApiResult<Vec<Task>> {
        self.get("/tasks/personal").await
    }

    pub async fn all_tasks(&self) -> ApiResult<Vec<Task>> {
        self.get("/tasks/all").await
    }

    pub async fn create_task(
        &self,
        user_id: UserId,
        team_id: Option<TeamId>,
        draft: &TaskDraft,
    ) -> ApiResult<Task> {
        let mut query = vec![("userId", user_id.to_string())];
        if let Some(team_id) = team_id {
            query.push(("teamId", team_id.to_string()));
        }
        self.fetch(self.request(Method::POST, "/tasks").query(&query).json(draft)).await
    }

    /// The reply body is not read: local state is already what was sent.
    pub async fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> ApiResult<()> {
        let request = self.request(Method::PUT, &format!("/tasks/{task_id}")).json(patch);
        self.execute(request).await.map(drop)
    }

    pub async fn delete_task(&self, task_id: TaskId) -> ApiResult<()> {
        self.discard(Method::DELETE, &format!("/tasks/{task_id}")).await
    }

    // ── Teams ──────────────────────────────────────────────────

    pub async fn teams(&self) -> ApiResult<Vec<Team>> {
        self.get("/teams").await
    }

    pub async fn create_team(&self, name: &str, description: &str) -> ApiResult<Team> {
        let body = NewTeam { name, description };
        self.fetch(self.request(Method::POST, "/teams").json(&body)).await
    }

    pub async fn team(&self, team_id: TeamId) -> ApiResult<Team> {
        self.get(&format!("/teams/{team_id}")).await
    }

    pub async fn delete_team(&self, team_id: TeamId) -> ApiResult<()> {
        self.discard(Method::DELETE, &format!("/teams/{team_id}")).await
    }

    pub async fn team_tasks(&self, team_id: TeamId) -> ApiResult<Vec<Task>> {
        self.get(&format!("/teams/{team_id}/tasks")).await
    }

    pub async fn create_team_task(&self, team_id: TeamId, draft: &TaskDraft) -> ApiResult<Task> {
        let path = format!("/teams/{team_id}/tasks");
        self.fetch(self.request(Method::POST, &path).json(draft)).await
    }

    pub async fn team_members(&self, team_id: TeamId) -> ApiResult<Vec<TeamMember>> {
        self.get(&format!("/teams/{team_id}/members")).await
    }

    pub async fn invite_member(&self, team_id: TeamId, username: &str) -> ApiResult<TeamMember> {
        let path = format!("/teams/{team_id}/members");
        self.fetch(self.request(Method::POST, &path).json(&Invite { username })).await
    }

    pub async fn remove_member(&self, team_id: TeamId, member_id: MemberId) -> ApiResult<()> {
        self.discard(Method::DELETE, &format!("/teams/{team_id}/members/{member_id}"))
            .await
    }

    // ── Plumbing ───────────────────────────────────────────────

    /// A request to `base_url + path` carrying the JSON and auth headers.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "request");
        self.authorize(self.http.request(method, &url))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.fetch(self.request(Method::GET, path)).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let bytes = self.execute(request).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// For endpoints whose 2xx body carries nothing we need.
    async fn discard(&self, method: Method, path: &str) -> ApiResult<()> {
        self.execute(self.request(method, path)).await.map(drop)
    }

    async fn execute(&self, request: RequestBuilder) -> ApiResult<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(self.reject(status, &bytes));
        }
        Ok(bytes.to_vec())
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(CONTENT_TYPE, "application/json");
        match self.session.token() {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    fn reject(&self, status: StatusCode, body: &[u8]) -> ApiError {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, "authentication rejected, clearing session");
            self.session.end();
        }
        let data = serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Default::default()));
        ApiError::Status { status: status.as_u16(), data }
    }
}

fn check_credentials(username: &str, password: &str) -> ApiResult<()> {
    if username.trim().is_empty() || password.is_empty() {
        return Err(ApiError::Validation("username and password are required".into()));
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────
