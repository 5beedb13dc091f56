//! In-process stand-in for the task/team REST API, served by axum on an
//! ephemeral port. State lives behind one mutex; switches make selected
//! endpoints fail on demand.

#![allow(dead_code)]

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use taskdeck::model::{
    MemberId, Role, Task, TaskDraft, TaskId, TaskPatch, TaskStatus, Team, TeamId, TeamMember,
    TeamRef, User, UserId, UserRef,
};
use taskdeck::{ApiClient, Session};

type Fail = (StatusCode, Json<Value>);
type Reply<T> = Result<Json<T>, Fail>;
type Shared = Arc<Mutex<Data>>;

fn fail(status: StatusCode, message: &str) -> Fail {
    (status, Json(json!({ "error": message })))
}

/// Creation time stamped on every fake account.
pub fn joined() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 5)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap()
}

// ── Backend state ──────────────────────────────────────────────

#[derive(Default)]
struct Data {
    users: Vec<(User, String)>,
    tokens: HashMap<String, UserId>,
    tasks: BTreeMap<TaskId, Task>,
    teams: BTreeMap<TeamId, Team>,
    members: Vec<(TeamId, TeamMember)>,
    next_id: i64,
    fail_updates: bool,
    fail_deletes: bool,
    reject_tokens: bool,
    bare_update_replies: bool,
    authorization: Vec<Option<String>>,
    list_queries: Vec<String>,
}

impl Data {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.users.iter().map(|(u, _)| u).find(|u| u.id == id)
    }

    fn user_ref(&self, id: UserId) -> UserRef {
        let username = self.user(id).map(|u| u.username.clone()).unwrap_or_default();
        UserRef { id, username, email: None }
    }

    fn add_user(&mut self, username: &str, password: &str) -> UserId {
        let id = self.next_id();
        let user = User { id, username: username.to_string(), email: None, created_at: Some(joined()) };
        self.users.push((user, password.to_string()));
        id
    }

    fn issue(&mut self, user_id: UserId) -> Value {
        let token = format!("token-{user_id}-{}", self.tokens.len() + 1);
        self.tokens.insert(token.clone(), user_id);
        json!({ "user": self.user(user_id), "token": token })
    }

    /// Records the Authorization header of every authenticated call.
    fn authorize(&mut self, headers: &HeaderMap) -> Result<UserId, Fail> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.authorization.push(header.clone());
        if self.reject_tokens {
            return Err(fail(StatusCode::UNAUTHORIZED, "token expired"));
        }
        header
            .as_deref()
            .and_then(|h| h.strip_prefix("Bearer "))
            .and_then(|t| self.tokens.get(t))
            .copied()
            .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "authentication required"))
    }

    fn role(&self, team_id: TeamId, user_id: UserId) -> Option<Role> {
        self.members
            .iter()
            .find(|(t, m)| *t == team_id && m.user.id == user_id)
            .map(|(_, m)| m.role)
    }

    fn add_member(&mut self, team_id: TeamId, user_id: UserId, role: Role) -> TeamMember {
        let member = TeamMember {
            id: self.next_id(),
            team: None,
            user: self.user_ref(user_id),
            role,
            joined_at: None,
        };
        self.members.push((team_id, member.clone()));
        member
    }

    fn new_task(&mut self, owner: UserId, team_id: Option<TeamId>, draft: TaskDraft) -> Task {
        let team = team_id.and_then(|id| self.teams.get(&id)).map(|t| TeamRef {
            id: t.id,
            name: t.name.clone(),
        });
        let task = Task {
            id: self.next_id(),
            title: draft.title,
            description: draft.description,
            status: draft.status,
            assignee: draft.assignee,
            due_date: draft.due_date,
            owner: Some(self.user_ref(owner)),
            team,
            assigned_to: None,
        };
        self.tasks.insert(task.id, task.clone());
        task
    }
}

// ── Handle used by tests ───────────────────────────────────────

pub struct FakeBackend {
    data: Shared,
    base_url: String,
}

impl FakeBackend {
    pub async fn start() -> FakeBackend {
        let data = Shared::default();
        let app = router(data.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        FakeBackend { data, base_url: format!("http://{addr}/api") }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A client with a fresh in-memory session.
    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.base_url.clone(), Session::in_memory())
    }

    /// A client already signed in as a new user.
    pub async fn signed_in(&self, username: &str) -> (ApiClient, User) {
        let api = self.client();
        let user = api.register(username, "secret").await.unwrap();
        (api, user)
    }

    pub fn add_user(&self, username: &str) -> UserId {
        self.lock().add_user(username, "secret")
    }

    pub fn seed_task(&self, owner: UserId, title: &str, status: TaskStatus) -> TaskId {
        self.lock().new_task(owner, None, TaskDraft::new(title, status)).id
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.lock().tasks.get(&id).cloned()
    }

    pub fn team_exists(&self, id: TeamId) -> bool {
        self.lock().teams.contains_key(&id)
    }

    pub fn fail_updates(&self, on: bool) {
        self.lock().fail_updates = on;
    }

    pub fn fail_deletes(&self, on: bool) {
        self.lock().fail_deletes = on;
    }

    pub fn reject_tokens(&self, on: bool) {
        self.lock().reject_tokens = on;
    }

    /// Answer successful updates with an acknowledgement instead of the task.
    pub fn bare_update_replies(&self, on: bool) {
        self.lock().bare_update_replies = on;
    }

    /// Raw query string of the latest `GET /tasks`.
    pub fn last_list_query(&self) -> Option<String> {
        self.lock().list_queries.last().cloned()
    }

    /// Authorization header of the latest authenticated call.
    pub fn last_authorization(&self) -> Option<String> {
        self.lock().authorization.last().cloned().flatten()
    }

    fn lock(&self) -> MutexGuard<'_, Data> {
        self.data.lock().unwrap()
    }
}

// ── Routes ─────────────────────────────────────────────────────

fn router(data: Shared) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/personal", get(personal_tasks))
        .route("/api/tasks/all", get(all_tasks))
        .route("/api/tasks/:id", put(update_task).delete(delete_task))
        .route("/api/teams", get(list_teams).post(create_team))
        .route("/api/teams/:id", get(get_team).delete(delete_team))
        .route("/api/teams/:id/tasks", get(team_tasks).post(create_team_task))
        .route("/api/teams/:id/members", get(list_members).post(invite))
        .route("/api/teams/:id/members/:member_id", delete(remove_member))
        .with_state(data)
}

#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuery {
    user_id: UserId,
    team_id: Option<TeamId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    user_id: UserId,
    mode: Option<String>,
}

#[derive(Deserialize)]
struct TeamBody {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct InviteBody {
    username: String,
}

// ── Auth handlers ──────────────────────────────────────────────

async fn register(State(data): State<Shared>, Json(body): Json<CredentialsBody>) -> Reply<Value> {
    let mut data = data.lock().unwrap();
    if data.users.iter().any(|(u, _)| u.username == body.username) {
        return Err(fail(StatusCode::BAD_REQUEST, "username already exists"));
    }
    let id = data.add_user(&body.username, &body.password);
    Ok(Json(data.issue(id)))
}

async fn login(State(data): State<Shared>, Json(body): Json<CredentialsBody>) -> Reply<Value> {
    let mut data = data.lock().unwrap();
    let id = data
        .users
        .iter()
        .find(|(u, pw)| u.username == body.username && *pw == body.password)
        .map(|(u, _)| u.id)
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Invalid credentials"))?;
    Ok(Json(data.issue(id)))
}

async fn me(State(data): State<Shared>, headers: HeaderMap) -> Reply<User> {
    let mut data = data.lock().unwrap();
    let id = data.authorize(&headers)?;
    data.user(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "user not found"))
}

// ── Task handlers ──────────────────────────────────────────────

async fn personal_tasks(State(data): State<Shared>, headers: HeaderMap) -> Reply<Vec<Task>> {
    let mut data = data.lock().unwrap();
    let uid = data.authorize(&headers)?;
    let tasks = data
        .tasks
        .values()
        .filter(|t| t.team.is_none() && t.owner.as_ref().is_some_and(|o| o.id == uid))
        .cloned()
        .collect();
    Ok(Json(tasks))
}

async fn all_tasks(State(data): State<Shared>, headers: HeaderMap) -> Reply<Vec<Task>> {
    let mut data = data.lock().unwrap();
    let uid = data.authorize(&headers)?;
    let tasks = data
        .tasks
        .values()
        .filter(|t| match &t.team {
            Some(team) => data.role(team.id, uid).is_some(),
            None => t.owner.as_ref().is_some_and(|o| o.id == uid),
        })
        .cloned()
        .collect();
    Ok(Json(tasks))
}

async fn list_tasks(
    State(data): State<Shared>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
    Query(query): Query<ListQuery>,
) -> Reply<Vec<Task>> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    data.list_queries.push(raw.unwrap_or_default());
    let uid = query.user_id;
    let tasks = data
        .tasks
        .values()
        .filter(|t| match &t.team {
            Some(team) => data.role(team.id, uid).is_some(),
            None => t.owner.as_ref().is_some_and(|o| o.id == uid),
        })
        .filter(|t| match query.mode.as_deref() {
            Some("personal") => t.team.is_none(),
            Some("team") => t.team.is_some(),
            _ => true,
        })
        .cloned()
        .collect();
    Ok(Json(tasks))
}

async fn create_task(
    State(data): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<CreateQuery>,
    Json(draft): Json<TaskDraft>,
) -> Reply<Task> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    if draft.title.trim().is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "title is required"));
    }
    Ok(Json(data.new_task(query.user_id, query.team_id, draft)))
}

async fn update_task(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Json(patch): Json<TaskPatch>,
) -> Reply<Value> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    if data.fail_updates {
        return Err(fail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    let task = data
        .tasks
        .get_mut(&id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({ "message": "Task not found" }))))?;
    task.apply_patch(&patch);
    let reply = serde_json::to_value(&*task).unwrap();
    if data.bare_update_replies {
        return Ok(Json(json!({ "updated": true })));
    }
    Ok(Json(reply))
}

async fn delete_task(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
) -> Result<StatusCode, Fail> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    if data.fail_deletes {
        return Err(fail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"));
    }
    data.tasks
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Task not found"))
}

// ── Team handlers ──────────────────────────────────────────────

async fn list_teams(State(data): State<Shared>, headers: HeaderMap) -> Reply<Vec<Team>> {
    let mut data = data.lock().unwrap();
    let uid = data.authorize(&headers)?;
    let teams = data
        .teams
        .values()
        .filter(|t| data.role(t.id, uid).is_some())
        .cloned()
        .collect();
    Ok(Json(teams))
}

async fn create_team(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<TeamBody>,
) -> Reply<Team> {
    let mut data = data.lock().unwrap();
    let uid = data.authorize(&headers)?;
    let team = Team {
        id: data.next_id(),
        name: body.name,
        description: Some(body.description),
        created_by: Some(data.user_ref(uid)),
        created_at: None,
    };
    data.teams.insert(team.id, team.clone());
    data.add_member(team.id, uid, Role::Owner);
    Ok(Json(team))
}

async fn get_team(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TeamId>,
) -> Reply<Team> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    data.teams
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "team not found"))
}

async fn delete_team(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TeamId>,
) -> Result<StatusCode, Fail> {
    let mut data = data.lock().unwrap();
    let uid = data.authorize(&headers)?;
    if data.role(id, uid) != Some(Role::Owner) {
        return Err(fail(StatusCode::BAD_REQUEST, "only the owner can delete a team"));
    }
    let unfinished = data
        .tasks
        .values()
        .any(|t| t.team.as_ref().is_some_and(|team| team.id == id) && t.status != TaskStatus::Done);
    if unfinished {
        return Err(fail(StatusCode::BAD_REQUEST, "team still has unfinished tasks"));
    }
    data.teams.remove(&id);
    data.members.retain(|(t, _)| *t != id);
    data.tasks.retain(|_, t| t.team.as_ref().map(|team| team.id) != Some(id));
    Ok(StatusCode::NO_CONTENT)
}

async fn team_tasks(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TeamId>,
) -> Reply<Vec<Task>> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    let tasks = data
        .tasks
        .values()
        .filter(|t| t.team.as_ref().is_some_and(|team| team.id == id))
        .cloned()
        .collect();
    Ok(Json(tasks))
}

async fn create_team_task(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TeamId>,
    Json(draft): Json<TaskDraft>,
) -> Reply<Task> {
    let mut data = data.lock().unwrap();
    let uid = data.authorize(&headers)?;
    if !data.teams.contains_key(&id) {
        return Err(fail(StatusCode::NOT_FOUND, "team not found"));
    }
    Ok(Json(data.new_task(uid, Some(id), draft)))
}

async fn list_members(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TeamId>,
) -> Reply<Vec<TeamMember>> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    let members = data
        .members
        .iter()
        .filter(|(t, _)| *t == id)
        .map(|(_, m)| m.clone())
        .collect();
    Ok(Json(members))
}

async fn invite(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<TeamId>,
    Json(body): Json<InviteBody>,
) -> Reply<TeamMember> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    let user_id = data
        .users
        .iter()
        .find(|(u, _)| u.username == body.username)
        .map(|(u, _)| u.id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "user not found"))?;
    if data.role(id, user_id).is_some() {
        return Err(fail(StatusCode::BAD_REQUEST, "user is already a member"));
    }
    Ok(Json(data.add_member(id, user_id, Role::Member)))
}

async fn remove_member(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path((id, member_id)): Path<(TeamId, MemberId)>,
) -> Result<StatusCode, Fail> {
    let mut data = data.lock().unwrap();
    data.authorize(&headers)?;
    let role = data
        .members
        .iter()
        .find(|(t, m)| *t == id && m.id == member_id)
        .map(|(_, m)| m.role)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "member not found"))?;
    if role == Role::Owner {
        return Err(fail(StatusCode::BAD_REQUEST, "cannot remove the team owner"));
    }
    data.members.retain(|(t, m)| !(*t == id && m.id == member_id));
    Ok(StatusCode::NO_CONTENT)
}
