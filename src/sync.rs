//! Optimistic sync between the task store and the remote API.
//!
//! The controller is split in two halves that never overlap:
//!
//! - `apply(Intent)` runs synchronously. It mutates the store right away
//!   (except for creates) and returns a `Dispatch` describing the request
//!   to send.
//! - `reconcile(ticket, result)` runs when that request finishes. Completions
//!   may arrive in any order; each is matched to its dispatch by ticket.
//!
//! Per task: `Clean → Modified → Clean` on success, `Modified → rolled back
//! → Clean` on failure, and `Clean → PendingDelete → removed` whatever the
//! server says. Nothing is ever retried.
//!
//! Rollback restores the snapshot taken just before the optimistic write.
//! It is a point-in-time restore, not a merge: if a second edit of the same
//! task was applied while the first request was in flight, rolling back the
//! first one discards the second. That race is kept as-is and logged when it
//! happens.

use crate::api::ApiError;
use crate::board::{BoardError, Slot, TaskStore};
use crate::model::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, TeamId, UserId};
use crate::notice::Notice;
use std::collections::HashMap;
use tracing::{debug, warn};

// ── Intents (view → controller) ────────────────────────────────

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Add a task to a column. Nothing shows until the server answers.
    Create { column: TaskStatus, draft: TaskDraft },
    /// Edit fields of a task (modal save).
    Update { task_id: TaskId, patch: TaskPatch },
    /// Remove a task. Not undone if the server call fails.
    Delete { task_id: TaskId },
    /// A drag ended. `destination` is None when dropped outside any column.
    Move {
        task_id: TaskId,
        source: Slot,
        destination: Option<Slot>,
    },
}

/// Which board the controller mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardScope {
    Personal { user_id: UserId },
    Team { team_id: TeamId, user_id: UserId },
}

// ── Dispatches (controller → network) ──────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateTask { scope: BoardScope, draft: TaskDraft },
    UpdateTask { task_id: TaskId, patch: TaskPatch },
    DeleteTask { task_id: TaskId },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub request: Request,
}

/// Successful reply body, as far as the controller cares.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Task(Task),
    Empty,
}

// ── Reconciliation results ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// Server assigned an id; the task is now on the board.
    Created { task_id: TaskId },
    CreateFailed { message: String },
    /// Update confirmed; local state already matched.
    Confirmed { task_id: TaskId },
    /// Update failed; the pre-write snapshot is back.
    RolledBack { task_id: TaskId, message: String },
    /// Update failed but the task had been deleted meanwhile; nothing restored.
    RollbackSkipped { task_id: TaskId, message: String },
    Deleted { task_id: TaskId },
    /// Delete failed on the server. The task stays gone locally.
    DeleteFailed { task_id: TaskId, message: String },
    /// No dispatch with this ticket (already reconciled, or never issued).
    UnknownTicket(Ticket),
}

impl Reconciled {
    /// Inline message for the user, if this outcome deserves one.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Reconciled::CreateFailed { message } => {
                Some(Notice::error(format!("could not add task: {message}")))
            }
            Reconciled::RolledBack { task_id, message }
            | Reconciled::RollbackSkipped { task_id, message } => {
                Some(Notice::error(format!("could not save task {task_id}: {message}")))
            }
            Reconciled::DeleteFailed { task_id, message } => {
                Some(Notice::error(format!("could not delete task {task_id}: {message}")))
            }
            _ => None,
        }
    }
}

/// Where a task stands from the controller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Clean,
    /// Optimistic writes still waiting on the server.
    Modified { in_flight: usize },
    /// Removed locally, delete request still out.
    PendingDelete,
    Absent,
}

// ── The controller ─────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Pending {
    Create,
    Update {
        task_id: TaskId,
        snapshot: Task,
        origin: Option<Slot>,
    },
    Delete { task_id: TaskId },
}

pub struct SyncController {
    store: TaskStore,
    scope: BoardScope,
    pending: HashMap<Ticket, Pending>,
    next_ticket: u64,
}

impl SyncController {
    pub fn new(scope: BoardScope) -> Self {
        SyncController {
            store: TaskStore::new(),
            scope,
            pending: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn scope(&self) -> BoardScope {
        self.scope
    }

    /// Requests dispatched and not yet reconciled.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Full refetch: the server listing replaces everything, local drag
    /// order included.
    pub fn load(&mut self, tasks: Vec<Task>) {
        debug!(count = tasks.len(), "board loaded");
        self.store.replace_all(tasks);
    }

    /// Apply an intent. Mutates the store now and returns the request to
    /// send, or None when nothing needs to go over the wire.
    ///
    /// A rejected intent leaves the store untouched.
    pub fn apply(&mut self, intent: Intent) -> Result<Option<Dispatch>, BoardError> {
        match intent {
            Intent::Create { column, mut draft } => {
                if draft.title.trim().is_empty() {
                    return Err(BoardError::InvalidDraft("task title is required".into()));
                }
                draft.status = column;
                let request = Request::CreateTask { scope: self.scope, draft };
                Ok(Some(self.dispatch(Pending::Create, request)))
            }

            Intent::Update { task_id, patch } => {
                if !self.store.contains(task_id) {
                    return Err(BoardError::TaskNotFound(task_id));
                }
                if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
                    return Err(BoardError::InvalidDraft("task title cannot be blank".into()));
                }
                if patch.is_empty() {
                    return Ok(None);
                }

                let origin = self.store.slot_of(task_id);
                let snapshot = self.store.patch(task_id, &patch)?;
                let request = Request::UpdateTask { task_id, patch };
                Ok(Some(self.dispatch(Pending::Update { task_id, snapshot, origin }, request)))
            }

            Intent::Delete { task_id } => {
                if self.store.remove(task_id).is_none() {
                    return Err(BoardError::TaskNotFound(task_id));
                }
                let request = Request::DeleteTask { task_id };
                Ok(Some(self.dispatch(Pending::Delete { task_id }, request)))
            }

            Intent::Move { task_id, source, destination } => {
                let Some(destination) = destination else {
                    return Ok(None);
                };
                let snapshot = self.store.splice(task_id, source, destination)?;

                if source.column == destination.column {
                    return Ok(None);
                }

                let patch = TaskPatch::status(destination.column);
                let request = Request::UpdateTask { task_id, patch };
                let origin = Some(source);
                Ok(Some(self.dispatch(Pending::Update { task_id, snapshot, origin }, request)))
            }
        }
    }

    /// Fold a finished request back into the store.
    pub fn reconcile(&mut self, ticket: Ticket, result: Result<Reply, ApiError>) -> Reconciled {
        let Some(pending) = self.pending.remove(&ticket) else {
            warn!(ticket = ticket.0, "completion for unknown ticket");
            return Reconciled::UnknownTicket(ticket);
        };

        match (pending, result) {
            (Pending::Create, Ok(Reply::Task(task))) => {
                let task_id = task.id;
                debug!(task_id, "task created");
                self.store.insert(task);
                Reconciled::Created { task_id }
            }
            (Pending::Create, Ok(Reply::Empty)) => {
                let message = "server returned no task".to_string();
                warn!("failed to add task: {message}");
                Reconciled::CreateFailed { message }
            }
            (Pending::Create, Err(e)) => {
                warn!("failed to add task: {e}");
                Reconciled::CreateFailed { message: e.message() }
            }

            (Pending::Update { task_id, .. }, Ok(_)) => {
                debug!(task_id, "update confirmed");
                Reconciled::Confirmed { task_id }
            }
            (Pending::Update { task_id, snapshot, origin }, Err(e)) => {
                warn!(task_id, "failed to update task: {e}");
                let message = e.message();

                let still_writing = self.updates_in_flight(task_id);
                if still_writing > 0 {
                    warn!(
                        task_id,
                        still_writing,
                        "rolling back while other edits of this task are in flight; they are lost"
                    );
                }

                if self.store.restore(snapshot, origin) {
                    Reconciled::RolledBack { task_id, message }
                } else {
                    debug!(task_id, "task gone, rollback skipped");
                    Reconciled::RollbackSkipped { task_id, message }
                }
            }

            (Pending::Delete { task_id }, Ok(_)) => {
                debug!(task_id, "delete confirmed");
                Reconciled::Deleted { task_id }
            }
            (Pending::Delete { task_id }, Err(e)) => {
                warn!(task_id, "failed to delete task: {e}");
                Reconciled::DeleteFailed { task_id, message: e.message() }
            }
        }
    }

    pub fn sync_state(&self, task_id: TaskId) -> SyncState {
        let deleting = self
            .pending
            .values()
            .any(|p| matches!(p, Pending::Delete { task_id: id } if *id == task_id));
        if deleting && !self.store.contains(task_id) {
            return SyncState::PendingDelete;
        }
        if !self.store.contains(task_id) {
            return SyncState::Absent;
        }
        match self.updates_in_flight(task_id) {
            0 => SyncState::Clean,
            in_flight => SyncState::Modified { in_flight },
        }
    }

    fn updates_in_flight(&self, task_id: TaskId) -> usize {
        self.pending
            .values()
            .filter(|p| matches!(p, Pending::Update { task_id: id, .. } if *id == task_id))
            .count()
    }

    fn dispatch(&mut self, pending: Pending, request: Request) -> Dispatch {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        debug!(ticket = ticket.0, ?request, "dispatch");
        self.pending.insert(ticket, pending);
        Dispatch { ticket, request }
    }
}

// ── Tests ──────────────────────────────────────────────────────
