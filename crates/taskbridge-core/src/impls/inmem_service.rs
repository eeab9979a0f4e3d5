//! InMemoryTaskService - 開発用・テスト用のリモートサービス代替
//!
//! # 学習ポイント
//! - tokio::sync::Mutex による状態の保護
//! - 障害注入（fail_next）と呼び出しログ（calls）によるテスト容易性
//! - リモートの振る舞い（404、逆方向リレーション、フィルタ評価、ページング）の再現
//!
//! # リモートとしての振る舞い
//! - id は 1 から順に払い出す
//! - update はスカラー項目だけを置換（labels / assignees / relations は専用 API）
//! - relation は逆向きも同時に作成・削除する
//! - フィルタは `title` / `description` を評価できない（HTTP 400）

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::query::sort_tasks;
use crate::domain::{
    FilterExpr, Label, LabelId, Project, ProjectId, RelationKind, Task, TaskDraft, TaskId, UserId,
};
use crate::ports::{Clock, RemoteError, SystemClock, TaskQuery, TaskService};

/// Remote primitives, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CreateTask,
    GetTask,
    UpdateTask,
    DeleteTask,
    SetLabels,
    AddAssignee,
    RemoveAssignee,
    CreateRelation,
    DeleteRelation,
    ListTasks,
    ListProjects,
    ListLabels,
}

/// One entry of the call log.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    CreateTask { project: ProjectId, title: String },
    GetTask(TaskId),
    UpdateTask(TaskId),
    DeleteTask(TaskId),
    SetLabels(TaskId, Vec<LabelId>),
    AddAssignee(TaskId, UserId),
    RemoveAssignee(TaskId, UserId),
    CreateRelation(TaskId, TaskId, RelationKind),
    DeleteRelation(TaskId, TaskId, RelationKind),
    ListTasks {
        project: Option<ProjectId>,
        filter: Option<String>,
        saved_filter: Option<u64>,
        page: u32,
    },
    ListProjects,
    ListLabels,
}

impl RemoteCall {
    pub fn op(&self) -> RemoteOp {
        match self {
            RemoteCall::CreateTask { .. } => RemoteOp::CreateTask,
            RemoteCall::GetTask(_) => RemoteOp::GetTask,
            RemoteCall::UpdateTask(_) => RemoteOp::UpdateTask,
            RemoteCall::DeleteTask(_) => RemoteOp::DeleteTask,
            RemoteCall::SetLabels(..) => RemoteOp::SetLabels,
            RemoteCall::AddAssignee(..) => RemoteOp::AddAssignee,
            RemoteCall::RemoveAssignee(..) => RemoteOp::RemoveAssignee,
            RemoteCall::CreateRelation(..) => RemoteOp::CreateRelation,
            RemoteCall::DeleteRelation(..) => RemoteOp::DeleteRelation,
            RemoteCall::ListTasks { .. } => RemoteOp::ListTasks,
            RemoteCall::ListProjects => RemoteOp::ListProjects,
            RemoteCall::ListLabels => RemoteOp::ListLabels,
        }
    }
}

/// Seed data, e.g. loaded from a JSON file by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Saved filter id → expression.
    #[serde(default)]
    pub saved_filters: BTreeMap<u64, String>,
}

struct ServiceState {
    projects: BTreeMap<ProjectId, Project>,
    labels: BTreeMap<LabelId, Label>,
    tasks: BTreeMap<TaskId, Task>,
    saved_filters: BTreeMap<u64, String>,
    next_task_id: u64,
    /// Per-op script: `None` lets a call through, `Some` fails it.
    faults: HashMap<RemoteOp, VecDeque<Option<RemoteError>>>,
    calls: Vec<RemoteCall>,
}

impl ServiceState {
    fn new() -> Self {
        Self {
            projects: BTreeMap::new(),
            labels: BTreeMap::new(),
            tasks: BTreeMap::new(),
            saved_filters: BTreeMap::new(),
            next_task_id: 1,
            faults: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// Logs the call, then surfaces an injected failure if one is queued.
    fn enter(&mut self, call: RemoteCall) -> Result<(), RemoteError> {
        let op = call.op();
        self.calls.push(call);
        match self.faults.get_mut(&op).and_then(VecDeque::pop_front).flatten() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    fn insert_task(&mut self, task: Task) {
        self.next_task_id = self.next_task_id.max(task.id.get() + 1);
        self.tasks.insert(task.id, task);
    }

    fn require_project(&self, id: ProjectId) -> Result<(), RemoteError> {
        if self.projects.contains_key(&id) {
            Ok(())
        } else {
            Err(RemoteError::status(404, format!("project {id} does not exist")))
        }
    }

    fn task(&self, id: TaskId) -> Result<&Task, RemoteError> {
        self.tasks
            .get(&id)
            .ok_or_else(|| RemoteError::status(404, format!("task {id} does not exist")))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, RemoteError> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| RemoteError::status(404, format!("task {id} does not exist")))
    }

    fn link(&mut self, from: TaskId, to: TaskId, kind: RelationKind) {
        if let Some(task) = self.tasks.get_mut(&from) {
            task.related_tasks.entry(kind).or_default().insert(to);
        }
    }

    /// Returns whether the link existed.
    fn unlink(&mut self, from: TaskId, to: TaskId, kind: RelationKind) -> bool {
        let Some(task) = self.tasks.get_mut(&from) else {
            return false;
        };
        let Some(ids) = task.related_tasks.get_mut(&kind) else {
            return false;
        };
        let removed = ids.remove(&to);
        if ids.is_empty() {
            task.related_tasks.remove(&kind);
        }
        removed
    }

    fn parse_filter(source: &str) -> Result<FilterExpr, RemoteError> {
        let expr = FilterExpr::parse(source)
            .map_err(|e| RemoteError::status(400, format!("invalid filter: {e}")))?;
        if let Some(field) = expr.fields().into_iter().find(|f| !f.is_remote_filterable()) {
            return Err(RemoteError::status(
                400,
                format!("invalid filter: field '{field}' cannot be filtered"),
            ));
        }
        Ok(expr)
    }
}

/// InMemoryTaskService はリモートのタスク管理サービスを模倣する
///
/// # 使用例
/// ```ignore
/// let service = InMemoryTaskService::new()
///     .with_project(Project::new(1, "Inbox"))
///     .with_label(LabelId::new(7), "urgent");
/// service.fail_next(RemoteOp::SetLabels, RemoteError::status(500, "boom")).await;
/// ```
pub struct InMemoryTaskService {
    state: Mutex<ServiceState>,
    clock: Arc<dyn Clock>,
}

impl InMemoryTaskService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut service = Self::new();
        let state = service.state.get_mut();
        for project in snapshot.projects {
            state.projects.insert(project.id, project);
        }
        for label in snapshot.labels {
            state.labels.insert(label.id, label);
        }
        for task in snapshot.tasks {
            state.insert_task(task);
        }
        state.saved_filters = snapshot.saved_filters;
        service
    }

    /// Clock used to resolve relative dates (`now+7d`) in filters.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.state.get_mut().projects.insert(project.id, project);
        self
    }

    pub fn with_label(mut self, id: LabelId, title: impl Into<String>) -> Self {
        let label = Label {
            id,
            title: title.into(),
        };
        self.state.get_mut().labels.insert(id, label);
        self
    }

    pub fn with_saved_filter(mut self, id: u64, expression: impl Into<String>) -> Self {
        self.state
            .get_mut()
            .saved_filters
            .insert(id, expression.into());
        self
    }

    /// Stores `task` as is; later allocations continue after its id.
    pub fn with_task(mut self, task: Task) -> Self {
        self.state.get_mut().insert_task(task);
        self
    }

    /// Queue a failure for the next call of `op`. Failures queue up in order.
    pub async fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.state
            .lock()
            .await
            .faults
            .entry(op)
            .or_default()
            .push_back(Some(error));
    }

    /// Queue `count` identical failures for `op`.
    pub async fn fail_times(&self, op: RemoteOp, count: usize, error: RemoteError) {
        let mut state = self.state.lock().await;
        let queue = state.faults.entry(op).or_default();
        queue.extend(std::iter::repeat_n(Some(error), count));
    }

    /// Let `successes` calls of `op` through, then fail the next one.
    pub async fn fail_after(&self, op: RemoteOp, successes: usize, error: RemoteError) {
        let mut state = self.state.lock().await;
        let queue = state.faults.entry(op).or_default();
        queue.extend(std::iter::repeat_n(None, successes));
        queue.push_back(Some(error));
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count_calls(&self, op: RemoteOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Direct read, bypassing the call log and injected failures.
    pub async fn stored_task(&self, id: TaskId) -> Option<Task> {
        self.state.lock().await.tasks.get(&id).cloned()
    }

    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }
}

impl Default for InMemoryTaskService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskService for InMemoryTaskService {
    async fn create_task(&self, project: ProjectId, draft: &TaskDraft) -> Result<Task, RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::CreateTask {
            project,
            title: draft.title.clone(),
        })?;
        state.require_project(project)?;

        let id = state.allocate_task_id();
        let task = draft.clone().into_task(id, project);
        state.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: TaskId) -> Result<Task, RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::GetTask(id))?;
        state.task(id).cloned()
    }

    async fn update_task(&self, task: &Task) -> Result<Task, RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::UpdateTask(task.id))?;
        state.require_project(task.project_id)?;

        let stored = state.task_mut(task.id)?;
        stored.title = task.title.clone();
        stored.description = task.description.clone();
        stored.done = task.done;
        stored.due_date = task.due_date;
        stored.start_date = task.start_date;
        stored.end_date = task.end_date;
        stored.priority = task.priority;
        stored.set_repeat(task.repeat());
        stored.project_id = task.project_id;
        Ok(stored.clone())
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::DeleteTask(id))?;
        let removed = state
            .tasks
            .remove(&id)
            .ok_or_else(|| RemoteError::status(404, format!("task {id} does not exist")))?;

        for (kind, others) in removed.related_tasks {
            for other in others {
                state.unlink(other, id, kind.inverse());
            }
        }
        Ok(())
    }

    async fn set_labels(&self, id: TaskId, labels: &[LabelId]) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::SetLabels(id, labels.to_vec()))?;
        if let Some(missing) = labels.iter().find(|l| !state.labels.contains_key(*l)) {
            return Err(RemoteError::status(404, format!("label {missing} does not exist")));
        }
        state.task_mut(id)?.labels = labels.iter().copied().collect();
        Ok(())
    }

    async fn add_assignee(&self, id: TaskId, user: UserId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::AddAssignee(id, user))?;
        state.task_mut(id)?.assignees.insert(user);
        Ok(())
    }

    async fn remove_assignee(&self, id: TaskId, user: UserId) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::RemoveAssignee(id, user))?;
        state.task_mut(id)?.assignees.remove(&user);
        Ok(())
    }

    async fn create_relation(
        &self,
        id: TaskId,
        other: TaskId,
        kind: RelationKind,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::CreateRelation(id, other, kind))?;
        state.task(id)?;
        state.task(other)?;
        if id == other {
            return Err(RemoteError::status(400, "a task cannot be related to itself"));
        }

        state.link(id, other, kind);
        state.link(other, id, kind.inverse());
        Ok(())
    }

    async fn delete_relation(
        &self,
        id: TaskId,
        other: TaskId,
        kind: RelationKind,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::DeleteRelation(id, other, kind))?;
        state.task(id)?;
        state.task(other)?;

        if !state.unlink(id, other, kind) {
            return Err(RemoteError::status(
                404,
                format!("task {id} has no '{kind}' relation to task {other}"),
            ));
        }
        state.unlink(other, id, kind.inverse());
        Ok(())
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::ListTasks {
            project: query.project,
            filter: query.filter.clone(),
            saved_filter: query.saved_filter,
            page: query.paging.page,
        })?;

        if let Some(project) = query.project {
            state.require_project(project)?;
        }

        let mut exprs = Vec::new();
        if let Some(saved) = query.saved_filter {
            let source = state
                .saved_filters
                .get(&saved)
                .ok_or_else(|| RemoteError::status(404, format!("saved filter {saved} does not exist")))?;
            exprs.push(ServiceState::parse_filter(source)?);
        }
        if let Some(source) = &query.filter {
            exprs.push(ServiceState::parse_filter(source)?);
        }

        let now = self.clock.now();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| query.project.is_none_or(|p| t.project_id == p))
            .filter(|t| exprs.iter().all(|e| e.matches(t, now)))
            .cloned()
            .collect();

        sort_tasks(&mut tasks, query.sort);
        Ok(query.paging.apply(tasks))
    }

    async fn list_projects(&self) -> Result<Vec<Project>, RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::ListProjects)?;
        Ok(state.projects.values().cloned().collect())
    }

    async fn list_labels(&self) -> Result<Vec<Label>, RemoteError> {
        let mut state = self.state.lock().await;
        state.enter(RemoteCall::ListLabels)?;
        Ok(state.labels.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Paging;

    fn service() -> InMemoryTaskService {
        InMemoryTaskService::new()
            .with_project(Project::new(1, "Inbox"))
            .with_label(LabelId::new(7), "urgent")
    }

    #[tokio::test]
    async fn create_allocates_sequential_ids() {
        let svc = service();
        let a = svc.create_task(ProjectId::new(1), &TaskDraft::new("a")).await.unwrap();
        let b = svc.create_task(ProjectId::new(1), &TaskDraft::new("b")).await.unwrap();
        assert_eq!((a.id.get(), b.id.get()), (1, 2));
    }

    #[tokio::test]
    async fn create_in_unknown_project_is_404() {
        let err = service()
            .create_task(ProjectId::new(99), &TaskDraft::new("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn relations_are_mirrored_and_removed_with_the_task() {
        let svc = service();
        let a = svc.create_task(ProjectId::new(1), &TaskDraft::new("a")).await.unwrap();
        let b = svc.create_task(ProjectId::new(1), &TaskDraft::new("b")).await.unwrap();

        svc.create_relation(a.id, b.id, RelationKind::Blocking).await.unwrap();
        let b_now = svc.get_task(b.id).await.unwrap();
        assert_eq!(b_now.related(RelationKind::Blocked).collect::<Vec<_>>(), vec![a.id]);

        svc.delete_task(a.id).await.unwrap();
        let b_now = svc.get_task(b.id).await.unwrap();
        assert!(b_now.related_tasks.is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let svc = service();
        svc.fail_next(RemoteOp::ListProjects, RemoteError::status(401, "expired")).await;

        assert!(svc.list_projects().await.is_err());
        assert!(svc.list_projects().await.is_ok());
        assert_eq!(svc.count_calls(RemoteOp::ListProjects).await, 2);
    }

    #[tokio::test]
    async fn list_rejects_text_field_filters_like_the_remote() {
        let svc = service();
        let query = TaskQuery {
            filter: Some("title like report".to_string()),
            ..TaskQuery::default()
        };
        let err = svc.list_tasks(&query).await.unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn list_filters_and_pages() {
        let svc = service();
        for i in 0..5u8 {
            let mut draft = TaskDraft::new(format!("t{i}"));
            draft.priority = i;
            svc.create_task(ProjectId::new(1), &draft).await.unwrap();
        }
        let query = TaskQuery {
            filter: Some("priority >= 2".to_string()),
            paging: Paging { page: 1, per_page: 2 },
            ..TaskQuery::default()
        };
        let tasks = svc.list_tasks(&query).await.unwrap();
        assert_eq!(tasks.iter().map(|t| t.priority).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn snapshot_seeds_state_and_id_allocation() {
        let json = r#"{
            "projects": [{ "id": 3, "title": "Home" }],
            "tasks": [{ "id": 10, "title": "seeded", "project_id": 3 }],
            "saved_filters": { "1": "done = false" }
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let svc = InMemoryTaskService::from_snapshot(snapshot);

        let created = svc.create_task(ProjectId::new(3), &TaskDraft::new("new")).await.unwrap();
        assert_eq!(created.id.get(), 11);

        let query = TaskQuery {
            saved_filter: Some(1),
            ..TaskQuery::default()
        };
        assert_eq!(svc.list_tasks(&query).await.unwrap().len(), 2);
    }
}
