//! Entities as the remote service reports them (tasks, projects, labels).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::date::wire_option;
use super::ids::{LabelId, ProjectId, TaskId, UserId};
use super::relation::RelationKind;
use super::repeat::{RemoteRepeat, RepeatMode};

/// A task snapshot.
///
/// Relation sets are `BTreeSet`s: unordered in meaning, deduplicated, and
/// deterministic when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, with = "wire_option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "wire_option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "wire_option")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub repeat_after: u64,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    pub project_id: ProjectId,
    #[serde(default)]
    pub assignees: BTreeSet<UserId>,
    #[serde(default)]
    pub labels: BTreeSet<LabelId>,
    #[serde(default)]
    pub related_tasks: BTreeMap<RelationKind, BTreeSet<TaskId>>,
}

impl Task {
    pub fn repeat(&self) -> RemoteRepeat {
        RemoteRepeat {
            repeat_after: self.repeat_after,
            repeat_mode: self.repeat_mode,
        }
    }

    pub fn set_repeat(&mut self, repeat: RemoteRepeat) {
        self.repeat_after = repeat.repeat_after;
        self.repeat_mode = repeat.repeat_mode;
    }

    pub fn related(&self, kind: RelationKind) -> impl Iterator<Item = TaskId> + '_ {
        self.related_tasks
            .get(&kind)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }
}

/// Fields sent to the remote service when creating a task.
///
/// Labels and assignees are not part of the draft: the remote create
/// primitive ignores them, so they are applied as secondary calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "wire_option")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "wire_option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "wire_option")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub repeat_after: u64,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date: None,
            start_date: None,
            end_date: None,
            priority: 0,
            repeat_after: 0,
            repeat_mode: RepeatMode::UseInterval,
        }
    }

    /// The task the remote service materialises from this draft.
    pub fn into_task(self, id: TaskId, project_id: ProjectId) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            done: false,
            due_date: self.due_date,
            start_date: self.start_date,
            end_date: self.end_date,
            priority: self.priority,
            repeat_after: self.repeat_after,
            repeat_mode: self.repeat_mode,
            project_id,
            assignees: BTreeSet::new(),
            labels: BTreeSet::new(),
            related_tasks: BTreeMap::new(),
        }
    }
}

/// A container of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub archived: bool,
}

impl Project {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(id),
            title: title.into(),
            description: String::new(),
            archived: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub title: String,
}
