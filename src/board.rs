//! The task store: the client's view of every task on the board, plus the
//! three status columns derived from it.
//!
//! Every id in the map sits in exactly one column, the one matching its
//! status. Full loads order each column by id; drags reorder locally and
//! that order holds until the next full load.

use crate::model::{Task, TaskId, TaskPatch, TaskStatus};
use std::collections::HashMap;
use thiserror::Error;

// ── Ordered id sequence ────────────────────────────────────────

/// A column's ids in display order, with list-splice edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedIds(Vec<TaskId>);

impl OrderedIds {
    pub fn new() -> Self {
        OrderedIds(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[TaskId] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.0.contains(&id)
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.0.iter().position(|&x| x == id)
    }

    pub fn push(&mut self, id: TaskId) {
        self.0.push(id);
    }

    /// Remove the id at `index`. None if out of range.
    pub fn remove_at(&mut self, index: usize) -> Option<TaskId> {
        (index < self.0.len()).then(|| self.0.remove(index))
    }

    /// Insert at `index`, clamped to the end like a list splice.
    pub fn insert_at(&mut self, index: usize, id: TaskId) {
        let index = index.min(self.0.len());
        self.0.insert(index, id);
    }

    /// Remove `id` wherever it is. Returns its former index.
    pub fn remove(&mut self, id: TaskId) -> Option<usize> {
        let index = self.position(id)?;
        self.0.remove(index);
        Some(index)
    }

    fn sort(&mut self) {
        self.0.sort_unstable();
    }
}

impl From<Vec<TaskId>> for OrderedIds {
    fn from(ids: Vec<TaskId>) -> Self {
        OrderedIds(ids)
    }
}

// ── Columns ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: TaskStatus,
    pub title: &'static str,
    pub task_ids: OrderedIds,
}

impl Column {
    fn empty(id: TaskStatus) -> Self {
        Column { id, title: id.title(), task_ids: OrderedIds::new() }
    }
}

/// A position on the board: column plus index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub column: TaskStatus,
    pub index: usize,
}

impl Slot {
    pub fn new(column: TaskStatus, index: usize) -> Self {
        Slot { column, index }
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("task {0} is not on the board")]
    TaskNotFound(TaskId),
    #[error("task {task_id} is not in column {column}")]
    NotInColumn { task_id: TaskId, column: TaskStatus },
    #[error("{0}")]
    InvalidDraft(String),
}

// ── The store ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
    columns: [Column; 3],
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        TaskStore {
            tasks: HashMap::new(),
            columns: TaskStatus::ALL.map(Column::empty),
        }
    }

    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut store = TaskStore::new();
        store.replace_all(tasks);
        store
    }

    /// Replace everything with a fresh server listing and rebuild columns
    /// in id order. Discards any local drag ordering.
    pub fn replace_all(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks = tasks.into_iter().map(|t| (t.id, t)).collect();
        self.recompute_columns();
    }

    /// Partition every id by status, then sort each bucket ascending.
    pub fn recompute_columns(&mut self) {
        self.columns = TaskStatus::ALL.map(Column::empty);
        for task in self.tasks.values() {
            self.columns[task.status.index()].task_ids.push(task.id);
        }
        for column in &mut self.columns {
            column.task_ids.sort();
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn columns(&self) -> &[Column; 3] {
        &self.columns
    }

    pub fn column(&self, status: TaskStatus) -> &Column {
        &self.columns[status.index()]
    }

    /// Tasks of one column in display order.
    pub fn column_tasks(&self, status: TaskStatus) -> Vec<&Task> {
        self.column(status)
            .task_ids
            .iter()
            .filter_map(|id| self.tasks.get(&id))
            .collect()
    }

    /// Where a task currently sits.
    pub fn slot_of(&self, id: TaskId) -> Option<Slot> {
        self.columns.iter().find_map(|c| {
            c.task_ids.position(id).map(|index| Slot::new(c.id, index))
        })
    }

    /// Insert a server-confirmed task at the end of its status column.
    /// An existing entry with the same id is replaced in place.
    pub fn insert(&mut self, task: Task) {
        let id = task.id;
        let status = task.status;
        let previous = self.tasks.insert(id, task);
        match previous {
            Some(prev) if prev.status == status => {}
            Some(_) => {
                self.detach(id);
                self.columns[status.index()].task_ids.push(id);
            }
            None => self.columns[status.index()].task_ids.push(id),
        }
    }

    /// Drop a task from the map and from every column.
    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        let task = self.tasks.remove(&id)?;
        self.detach(id);
        Some(task)
    }

    /// Overlay `patch` on a task. Returns the pre-patch snapshot.
    ///
    /// A status change moves the id to the end of its new column.
    pub fn patch(&mut self, id: TaskId, patch: &TaskPatch) -> Result<Task, BoardError> {
        let task = self.tasks.get_mut(&id).ok_or(BoardError::TaskNotFound(id))?;
        let snapshot = task.clone();
        task.apply_patch(patch);
        let new_status = task.status;

        if new_status != snapshot.status {
            self.detach(id);
            self.columns[new_status.index()].task_ids.push(id);
        }
        Ok(snapshot)
    }

    /// Drag `id` from `source` to `destination`.
    ///
    /// The dragged id is authoritative: it is taken out of the source column
    /// wherever it sits and spliced in at the destination index. Crossing
    /// columns also sets the task's status to the destination column.
    /// Returns the pre-move snapshot.
    pub fn splice(&mut self, id: TaskId, source: Slot, destination: Slot) -> Result<Task, BoardError> {
        let snapshot = self.tasks.get(&id).cloned().ok_or(BoardError::TaskNotFound(id))?;

        let from = &mut self.columns[source.column.index()].task_ids;
        let found_at = from.remove(id).ok_or(BoardError::NotInColumn {
            task_id: id,
            column: source.column,
        })?;
        if found_at != source.index {
            tracing::debug!(task_id = id, expected = source.index, found_at, "drag source index out of date");
        }

        self.columns[destination.column.index()]
            .task_ids
            .insert_at(destination.index, id);

        if source.column != destination.column {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.status = destination.column;
            }
        }
        Ok(snapshot)
    }

    /// Put a snapshot back. If its status differs from where the id sits now,
    /// the id moves back to the snapshot's column: at `origin.index` when
    /// `origin` names that column, else at the end.
    ///
    /// Returns false (and changes nothing) when the task is no longer here.
    pub fn restore(&mut self, snapshot: Task, origin: Option<Slot>) -> bool {
        let id = snapshot.id;
        let Some(current) = self.tasks.get_mut(&id) else {
            return false;
        };
        let status = snapshot.status;
        let moved = current.status != status;
        *current = snapshot;

        if moved {
            self.detach(id);
            let column = &mut self.columns[status.index()].task_ids;
            match origin {
                Some(slot) if slot.column == status => column.insert_at(slot.index, id),
                _ => column.push(id),
            }
        }
        true
    }

    /// Every task id is in exactly one column and that column is its status.
    pub fn is_partitioned(&self) -> bool {
        let placed: usize = self.columns.iter().map(|c| c.task_ids.len()).sum();
        placed == self.tasks.len()
            && self.columns.iter().all(|c| {
                c.task_ids.iter().all(|id| {
                    self.tasks.get(&id).is_some_and(|t| t.status == c.id)
                })
            })
    }

    fn detach(&mut self, id: TaskId) {
        for column in &mut self.columns {
            column.task_ids.remove(id);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
