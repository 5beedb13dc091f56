//! Filters and due-date urgency for the all-tasks list.

use crate::model::{Task, TaskStatus};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskFilter {
    #[default]
    All,
    /// Not attached to a team.
    Personal,
    Team,
    /// Past due and not done.
    Overdue,
    /// Due some time today and not done.
    Today,
}

impl TaskFilter {
    pub fn matches(self, task: &Task, now: NaiveDateTime) -> bool {
        match self {
            TaskFilter::All => true,
            TaskFilter::Personal => task.team.is_none(),
            TaskFilter::Team => task.team.is_some(),
            TaskFilter::Overdue => open_due_date(task).is_some_and(|due| due < now),
            TaskFilter::Today => open_due_date(task).is_some_and(|due| {
                let start = now.date().and_time(NaiveTime::MIN);
                due >= start && due < start + Duration::days(1)
            }),
        }
    }

    pub fn apply<'a>(self, tasks: &'a [Task], now: NaiveDateTime) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t, now)).collect()
    }
}

impl FromStr for TaskFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TaskFilter::All),
            "personal" => Ok(TaskFilter::Personal),
            "team" => Ok(TaskFilter::Team),
            "overdue" => Ok(TaskFilter::Overdue),
            "today" => Ok(TaskFilter::Today),
            other => Err(format!("unknown filter '{other}'")),
        }
    }
}

/// How close a task is to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    None,
    /// Due within three days.
    DueSoon,
    /// Due within a day.
    DueWithinDay,
    Overdue,
}

pub fn urgency(task: &Task, now: NaiveDateTime) -> Urgency {
    let Some(due) = open_due_date(task) else {
        return Urgency::None;
    };
    let left = due - now;
    if left < Duration::zero() {
        Urgency::Overdue
    } else if left < Duration::hours(24) {
        Urgency::DueWithinDay
    } else if left < Duration::hours(72) {
        Urgency::DueSoon
    } else {
        Urgency::None
    }
}

// Done tasks are never late.
fn open_due_date(task: &Task) -> Option<NaiveDateTime> {
    if task.status == TaskStatus::Done {
        return None;
    }
    task.due_date
}
