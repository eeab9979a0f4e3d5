//! Mutation orchestrator - 1 つの意図を複数のリモート呼び出しに分解する
//!
//! # create
//! 1. 入力検証（リモートに触れる前にすべて）
//! 2. プロジェクト解決
//! 3. 基本タスク作成（ここが point of no return）
//! 4. labels → assignees の順に二次ステップを適用
//! 5. 失敗時は作成したタスクを削除（補償）し、PartialFailure を返す
//!
//! # update
//! 補償は行いません。途中まで成功した場合は PartialFailure（rollback なし）、
//! 何も適用されていなければ元のエラーをそのまま返します。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::context::ServiceContext;
use super::diff::RelationDiff;
use super::guard::{
    require_field, validate_date, validate_id, validate_priority, validate_repeat, validate_title,
};
use super::membership::{apply_assignee_diff, id_set, refetch_or, uncompensated};
use super::projects::resolve_project;
use crate::domain::{
    ErrorKind, LabelId, PartialFailure, ProjectId, Task, TaskDraft, TaskId, ToolError, UserId,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<i64>,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub priority: Option<i64>,
    /// Repeat count, in `repeat_unit`s.
    pub repeat_after: Option<i64>,
    pub repeat_unit: Option<String>,
    #[serde(default)]
    pub labels: Vec<i64>,
    #[serde(default)]
    pub assignees: Vec<i64>,
}

/// Fields left out are preserved. An empty string clears a date.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskArgs {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub done: Option<bool>,
    pub project_id: Option<i64>,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub priority: Option<i64>,
    pub repeat_after: Option<i64>,
    pub repeat_unit: Option<String>,
    /// Always rejected: labels change through `apply_labels` / `remove_labels`.
    pub labels: Option<Vec<i64>>,
    /// The complete desired assignee set.
    pub assignees: Option<Vec<i64>>,
}

impl UpdateTaskArgs {
    /// Whether the request names any field carried by the full-object update.
    fn has_scalar_fields(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.done.is_some()
            || self.project_id.is_some()
            || self.due_date.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.priority.is_some()
            || self.repeat_after.is_some()
            || self.repeat_unit.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskIdArgs {
    pub id: Option<i64>,
}

/// Transient record of one create workflow, used for compensation decisions.
#[derive(Debug, Clone)]
pub struct MutationState {
    /// The entity as last known remotely.
    pub task: Task,
    pub attempted: Vec<String>,
    pub completed: Vec<String>,
}

impl MutationState {
    pub fn begin(task: Task) -> Self {
        Self {
            task,
            attempted: Vec::new(),
            completed: Vec::new(),
        }
    }

    fn attempt(&mut self, step: &str) {
        self.attempted.push(step.to_string());
    }

    fn complete(&mut self, step: &str) {
        self.completed.push(step.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub task: Task,
    /// Fields present in the request whose value actually changed.
    pub affected_fields: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub id: TaskId,
    pub title: Option<String>,
    /// The service no longer knew the task.
    pub already_absent: bool,
}

fn task_id(raw: Option<i64>) -> Result<TaskId, ToolError> {
    Ok(TaskId::new(validate_id("id", require_field(raw, "id")?)?))
}

fn optional_date(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ToolError> {
    raw.map(|s| validate_date(field, s)).transpose()
}

/// `None`: untouched, `Some(None)`: cleared.
fn date_change(field: &str, raw: Option<&str>) -> Result<Option<Option<DateTime<Utc>>>, ToolError> {
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(Some(None)),
        Some(s) => validate_date(field, s).map(|d| Some(Some(d))),
    }
}

struct ValidatedCreate {
    draft: TaskDraft,
    project: Option<ProjectId>,
    labels: BTreeSet<LabelId>,
    assignees: BTreeSet<UserId>,
}

fn validate_create(args: CreateTaskArgs) -> Result<ValidatedCreate, ToolError> {
    let title = validate_title(&require_field(args.title, "title")?)?;
    let project = args
        .project_id
        .map(|p| validate_id("project_id", p).map(ProjectId::new))
        .transpose()?;

    let mut draft = TaskDraft::new(title);
    draft.description = args.description.unwrap_or_default();
    draft.due_date = optional_date("due_date", args.due_date.as_deref())?;
    draft.start_date = optional_date("start_date", args.start_date.as_deref())?;
    draft.end_date = optional_date("end_date", args.end_date.as_deref())?;
    if let Some(p) = args.priority {
        draft.priority = validate_priority(p)?;
    }
    if let Some(repeat) = validate_repeat(args.repeat_after, args.repeat_unit.as_deref())? {
        draft.repeat_after = repeat.repeat_after;
        draft.repeat_mode = repeat.repeat_mode;
    }

    Ok(ValidatedCreate {
        draft,
        project,
        labels: id_set("labels", &args.labels)?,
        assignees: id_set("assignees", &args.assignees)?,
    })
}

/// Deletes the half-built task and reports what happened.
async fn compensate(
    ctx: &ServiceContext,
    state: MutationState,
    failed_step: &str,
    cause: ToolError,
) -> ToolError {
    let id = state.task.id;
    tracing::warn!(
        "create of task {} failed at '{}' ({}); rolling back",
        id,
        failed_step,
        cause
    );

    let rollback = ctx
        .call(&format!("delete task {id}"), || ctx.service().delete_task(id))
        .await;
    let (rollback_succeeded, rollback_error) = match rollback {
        Ok(()) => (true, None),
        Err(e) if e.kind() == ErrorKind::NotFound => (true, None),
        Err(e) => {
            tracing::error!(
                "rollback of task {} failed, task left behind: {}",
                id,
                e
            );
            (false, Some(e.to_string()))
        }
    };

    ToolError::partial(PartialFailure {
        operation: "create".to_string(),
        task_id: Some(id),
        failed_step: failed_step.to_string(),
        cause_kind: cause.kind(),
        cause: cause.to_string(),
        completed_steps: state.completed,
        rollback_succeeded: Some(rollback_succeeded),
        rollback_error,
    })
}

pub async fn create_task(ctx: &ServiceContext, args: CreateTaskArgs) -> Result<Task, ToolError> {
    let input = validate_create(args)?;
    let project = resolve_project(ctx, input.project).await?;

    let draft = &input.draft;
    let base = ctx
        .call_with("create task", &ctx.policies().non_idempotent, || {
            ctx.service().create_task(project.id, draft)
        })
        .await?;
    let id = base.id;
    let mut state = MutationState::begin(base);

    if !input.labels.is_empty() {
        let step = "apply labels";
        state.attempt(step);
        let labels: Vec<LabelId> = input.labels.iter().copied().collect();
        if let Err(e) = ctx
            .call(step, || ctx.service().set_labels(id, &labels))
            .await
        {
            return Err(compensate(ctx, state, step, e).await);
        }
        state.complete(step);
        state.task.labels = input.labels.clone();
    }

    for user in &input.assignees {
        let step = format!("add assignee {user}");
        state.attempt(&step);
        if let Err(e) = ctx
            .call(&step, || ctx.service().add_assignee(id, *user))
            .await
        {
            return Err(compensate(ctx, state, &step, e).await);
        }
        state.complete(&step);
        state.task.assignees.insert(*user);
    }

    let task = refetch_or(ctx, id, state.task).await;
    tracing::info!(
        "created task {} in project {} with {} label(s), {} assignee(s)",
        id,
        project.id,
        input.labels.len(),
        input.assignees.len()
    );
    Ok(task)
}

pub async fn get_task(ctx: &ServiceContext, args: TaskIdArgs) -> Result<Task, ToolError> {
    let id = task_id(args.id)?;
    ctx.call(&format!("get task {id}"), || ctx.service().get_task(id))
        .await
}

/// Applies present fields onto `task`, returning the names of those that changed.
fn merge_fields(
    task: &mut Task,
    args: &UpdateTaskArgs,
) -> Result<Vec<&'static str>, ToolError> {
    let mut affected = Vec::new();

    fn set<T: PartialEq>(
        affected: &mut Vec<&'static str>,
        name: &'static str,
        slot: &mut T,
        value: T,
    ) {
        if *slot != value {
            *slot = value;
            affected.push(name);
        }
    }

    if let Some(title) = &args.title {
        set(&mut affected, "title", &mut task.title, validate_title(title)?);
    }
    if let Some(description) = &args.description {
        set(&mut affected, "description", &mut task.description, description.clone());
    }
    if let Some(done) = args.done {
        set(&mut affected, "done", &mut task.done, done);
    }
    if let Some(project) = args.project_id {
        let project = ProjectId::new(validate_id("project_id", project)?);
        set(&mut affected, "project_id", &mut task.project_id, project);
    }
    if let Some(due) = date_change("due_date", args.due_date.as_deref())? {
        set(&mut affected, "due_date", &mut task.due_date, due);
    }
    if let Some(start) = date_change("start_date", args.start_date.as_deref())? {
        set(&mut affected, "start_date", &mut task.start_date, start);
    }
    if let Some(end) = date_change("end_date", args.end_date.as_deref())? {
        set(&mut affected, "end_date", &mut task.end_date, end);
    }
    if let Some(priority) = args.priority {
        set(&mut affected, "priority", &mut task.priority, validate_priority(priority)?);
    }
    if let Some(repeat) = validate_repeat(args.repeat_after, args.repeat_unit.as_deref())? {
        let mut current = task.repeat();
        set(&mut affected, "repeat", &mut current, repeat);
        task.set_repeat(current);
    }

    Ok(affected)
}

/// Validates everything that can be checked without the current task.
fn precheck_update(args: &UpdateTaskArgs) -> Result<(TaskId, Option<BTreeSet<UserId>>), ToolError> {
    let id = task_id(args.id)?;
    if args.labels.is_some() {
        return Err(ToolError::validation(
            "Parameter 'labels' is not accepted by update. Use apply_labels or remove_labels, \
             e.g. {\"operation\": \"apply_labels\", \"id\": 12, \"label_ids\": [7]}",
        ));
    }
    let assignees = args
        .assignees
        .as_deref()
        .map(|raw| id_set("assignees", raw))
        .transpose()?;

    // Field validation on a throwaway copy, so no remote call precedes a bad input.
    let mut scratch = TaskDraft::new("scratch").into_task(id, ProjectId::new(1));
    merge_fields(&mut scratch, args)?;

    Ok((id, assignees))
}

pub async fn update_task(
    ctx: &ServiceContext,
    args: UpdateTaskArgs,
) -> Result<UpdateOutcome, ToolError> {
    let (id, desired_assignees) = precheck_update(&args)?;

    let current = ctx
        .call(&format!("get task {id}"), || ctx.service().get_task(id))
        .await?;

    let mut merged = current.clone();
    let mut affected_fields = merge_fields(&mut merged, &args)?;
    let mut completed = Vec::new();

    // affected_fields is reporting only; the remote update goes out regardless.
    if args.has_scalar_fields() {
        let step = "update fields";
        merged = ctx
            .call(step, || ctx.service().update_task(&merged))
            .await?;
        completed.push(step.to_string());
    }

    if let Some(desired) = desired_assignees {
        let diff = RelationDiff::between(&current.assignees, &desired);
        if !diff.is_empty() {
            affected_fields.push("assignees");
            if let Err(failure) = apply_assignee_diff(ctx, id, &diff, &mut completed).await {
                return Err(uncompensated("update", id, completed, failure));
            }
            merged.assignees = desired;
        }
    }

    let task = if completed.is_empty() {
        merged
    } else {
        refetch_or(ctx, id, merged).await
    };

    tracing::info!("updated task {}: {:?}", id, affected_fields);
    Ok(UpdateOutcome {
        task,
        affected_fields,
    })
}

pub async fn delete_task(ctx: &ServiceContext, args: TaskIdArgs) -> Result<DeleteOutcome, ToolError> {
    let id = task_id(args.id)?;

    let title = ctx
        .call_with(
            &format!("get task {id}"),
            &ctx.policies().best_effort,
            || ctx.service().get_task(id),
        )
        .await
        .map(|task| task.title)
        .ok();

    let already_absent = match ctx
        .call(&format!("delete task {id}"), || ctx.service().delete_task(id))
        .await
    {
        Ok(()) => false,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("task {} was already deleted: {}", id, e);
            true
        }
        Err(e) => return Err(e),
    };

    tracing::info!("deleted task {}", id);
    Ok(DeleteOutcome {
        id,
        title,
        already_absent,
    })
}
