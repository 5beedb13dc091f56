//! Drives a `SyncController` against the live API.
//!
//! Intents are applied synchronously on the caller's task; the requests they
//! produce run concurrently on a `JoinSet` and are reconciled one by one as
//! they finish, in whatever order that is. No request is cancelled, timed
//! out or sequenced behind another. A request task that dies without a
//! response is reconciled as a failed request.

use crate::api::{ApiClient, ApiError};
use crate::board::{BoardError, TaskStore};
use crate::model::Task;
use crate::notice::Notice;
use crate::sync::{BoardScope, Dispatch, Intent, Reconciled, Reply, Request, SyncController, Ticket};
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{Id, JoinSet};
use tracing::{error, warn};

type Completion = Result<Reply, ApiError>;

pub struct BoardSession {
    api: ApiClient,
    controller: SyncController,
    in_flight: JoinSet<Completion>,
    tickets: HashMap<Id, Ticket>,
    notices: Vec<Notice>,
}

impl BoardSession {
    /// Fetch the board for `scope` and start mirroring it.
    pub async fn open(api: ApiClient, scope: BoardScope) -> Result<Self, ApiError> {
        let mut session = BoardSession {
            api,
            controller: SyncController::new(scope),
            in_flight: JoinSet::new(),
            tickets: HashMap::new(),
            notices: Vec::new(),
        };
        session.refresh().await?;
        Ok(session)
    }

    /// Full refetch. Replaces the store and resets column order.
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let tasks = fetch(&self.api, self.controller.scope()).await?;
        self.controller.load(tasks);
        Ok(())
    }

    pub fn store(&self) -> &TaskStore {
        self.controller.store()
    }

    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    /// Apply an intent locally and send its request in the background.
    pub fn submit(&mut self, intent: Intent) -> Result<(), BoardError> {
        if let Some(dispatch) = self.controller.apply(intent)? {
            self.spawn(dispatch);
        }
        Ok(())
    }

    /// Wait for the next request to finish and reconcile it. None when
    /// nothing is in flight.
    pub async fn next_settled(&mut self) -> Option<Reconciled> {
        loop {
            let (id, result) = match self.in_flight.join_next_with_id().await? {
                Ok(done) => done,
                Err(e) => {
                    error!("request task failed: {e}");
                    (e.id(), Err(ApiError::Aborted(e.to_string())))
                }
            };
            let Some(ticket) = self.tickets.remove(&id) else {
                warn!(%id, "finished task has no ticket");
                continue;
            };
            let outcome = self.controller.reconcile(ticket, result);
            if let Some(notice) = outcome.notice() {
                self.notices.push(notice);
            }
            return Some(outcome);
        }
    }

    /// Reconcile everything still in flight.
    pub async fn settle(&mut self) -> Vec<Reconciled> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_settled().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Messages collected since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn spawn(&mut self, dispatch: Dispatch) {
        let api = self.api.clone();
        let Dispatch { ticket, request } = dispatch;
        self.track(ticket, async move { execute(&api, request).await });
    }

    fn track<F>(&mut self, ticket: Ticket, request: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let handle = self.in_flight.spawn(request);
        self.tickets.insert(handle.id(), ticket);
    }
}

async fn fetch(api: &ApiClient, scope: BoardScope) -> Result<Vec<Task>, ApiError> {
    match scope {
        BoardScope::Personal { .. } => api.personal_tasks().await,
        BoardScope::Team { team_id, .. } => api.team_tasks(team_id).await,
    }
}

async fn execute(api: &ApiClient, request: Request) -> Result<Reply, ApiError> {
    match request {
        Request::CreateTask { scope: BoardScope::Personal { user_id }, draft } => {
            api.create_task(user_id, None, &draft).await.map(Reply::Task)
        }
        Request::CreateTask { scope: BoardScope::Team { team_id, .. }, draft } => {
            api.create_team_task(team_id, &draft).await.map(Reply::Task)
        }
        Request::UpdateTask { task_id, patch } => {
            api.update_task(task_id, &patch).await.map(|()| Reply::Empty)
        }
        Request::DeleteTask { task_id } => api.delete_task(task_id).await.map(|()| Reply::Empty),
    }
}
