//! TaskService port - リモートのタスク管理サービス（正本）
//!
//! このコアはリモートサービスを唯一の source of truth として扱い、
//! リクエストをまたいで状態をキャッシュしません。
//!
//! # エラー
//! 実装は生の失敗を `RemoteError` として返すだけで、分類はしません。
//! 分類は呼び出し境界（`resilience::call`）で一度だけ行われます。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Label, LabelId, Paging, Project, ProjectId, RelationKind, Sort, Task, TaskDraft, TaskId,
    UserId,
};

/// Raw failure reported by a remote call, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never reached the service (refused, reset, DNS).
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RemoteError::Status {
            status,
            message: message.into(),
        }
    }
}

/// Parameters of a task listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    /// Restrict to one project; `None` lists across all projects.
    pub project: Option<ProjectId>,
    /// Filter expression evaluated by the service.
    pub filter: Option<String>,
    /// Identifier of a filter persisted on the service.
    pub saved_filter: Option<u64>,
    pub paging: Paging,
    pub sort: Sort,
}

/// TaskService はリモートサービスの能力（request/response のみ）
///
/// - create/update は full object を受け取る（partial patch は無い）
/// - labels は wholesale 置換、assignees は個別の add/remove
/// - relation は (task, other, kind) の作成・削除
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create_task(&self, project: ProjectId, draft: &TaskDraft) -> Result<Task, RemoteError>;

    async fn get_task(&self, id: TaskId) -> Result<Task, RemoteError>;

    /// Full-object replace.
    async fn update_task(&self, task: &Task) -> Result<Task, RemoteError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), RemoteError>;

    /// Replace the label set wholesale.
    async fn set_labels(&self, id: TaskId, labels: &[LabelId]) -> Result<(), RemoteError>;

    async fn add_assignee(&self, id: TaskId, user: UserId) -> Result<(), RemoteError>;

    async fn remove_assignee(&self, id: TaskId, user: UserId) -> Result<(), RemoteError>;

    async fn create_relation(
        &self,
        id: TaskId,
        other: TaskId,
        kind: RelationKind,
    ) -> Result<(), RemoteError>;

    async fn delete_relation(
        &self,
        id: TaskId,
        other: TaskId,
        kind: RelationKind,
    ) -> Result<(), RemoteError>;

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, RemoteError>;

    async fn list_projects(&self) -> Result<Vec<Project>, RemoteError>;

    async fn list_labels(&self) -> Result<Vec<Label>, RemoteError>;
}
