//! Tool dispatch - 1 リクエスト = 1 ワークフロー
//!
//! `ToolRequest` は `operation` タグ付きの enum で、操作ごとに型付きの引数を持ちます。
//! `handle` は網羅的な match でワークフローを呼び出し、結果を
//! `ResponseEnvelope` に包んで返します。

use serde::Deserialize;
use serde_json::{Value, json};

use super::context::ServiceContext;
use super::filtering::{self, FilterResult, ListTasksArgs};
use super::membership::{self, AssigneeArgs, LabelArgs, MembershipOutcome};
use super::mutation::{self, CreateTaskArgs, TaskIdArgs, UpdateTaskArgs};
use super::projects;
use super::relations::{self, RelationArgs, RelationsArgs, RelationsOutcome};
use crate::domain::{ResponseEnvelope, ToolError};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ToolRequest {
    Create(CreateTaskArgs),
    Get(TaskIdArgs),
    Update(UpdateTaskArgs),
    Delete(TaskIdArgs),
    List(ListTasksArgs),
    Assign(AssigneeArgs),
    Unassign(AssigneeArgs),
    ApplyLabels(LabelArgs),
    RemoveLabels(LabelArgs),
    Relate(RelationArgs),
    Unrelate(RelationArgs),
    Relations(RelationsArgs),
    ListProjects,
    ListLabels,
}

impl ToolRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            ToolRequest::Create(_) => "create",
            ToolRequest::Get(_) => "get",
            ToolRequest::Update(_) => "update",
            ToolRequest::Delete(_) => "delete",
            ToolRequest::List(_) => "list",
            ToolRequest::Assign(_) => "assign",
            ToolRequest::Unassign(_) => "unassign",
            ToolRequest::ApplyLabels(_) => "apply_labels",
            ToolRequest::RemoveLabels(_) => "remove_labels",
            ToolRequest::Relate(_) => "relate",
            ToolRequest::Unrelate(_) => "unrelate",
            ToolRequest::Relations(_) => "relations",
            ToolRequest::ListProjects => "list_projects",
            ToolRequest::ListLabels => "list_labels",
        }
    }

    /// Parses one JSON request; a malformed request is a validation error.
    pub fn from_json(input: &str) -> Result<Self, ToolError> {
        serde_json::from_str(input).map_err(|e| {
            ToolError::validation(format!(
                "Invalid request: {e}. Example: {{\"operation\": \"get\", \"id\": 42}}"
            ))
        })
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Unknown {
        message: format!("failed to serialize response: {e}"),
    })
}

fn membership_envelope<T>(
    ctx: &ServiceContext,
    operation: &str,
    noun: &str,
    outcome: MembershipOutcome<T>,
) -> Result<ResponseEnvelope, ToolError>
where
    T: Ord + serde::Serialize,
{
    let message = format!(
        "Task {}: {} {noun}(s) added, {} removed",
        outcome.task.id,
        outcome.added.len(),
        outcome.removed.len()
    );
    Ok(
        ResponseEnvelope::new(operation, message, to_value(&outcome.task)?, ctx.now())
            .with_meta("added", to_value(&outcome.added)?)
            .with_meta("removed", to_value(&outcome.removed)?),
    )
}

fn relations_envelope(
    ctx: &ServiceContext,
    operation: &str,
    message: String,
    outcome: RelationsOutcome,
) -> Result<ResponseEnvelope, ToolError> {
    let data = json!({
        "task_id": outcome.task_id,
        "title": outcome.title,
        "relations": to_value(&outcome.relations)?,
    });
    Ok(ResponseEnvelope::new(operation, message, data, ctx.now()))
}

fn list_envelope(ctx: &ServiceContext, result: FilterResult) -> Result<ResponseEnvelope, ToolError> {
    let message = format!(
        "Found {} task(s) ({})",
        result.tasks.len(),
        result.path.as_str()
    );
    let mut envelope = ResponseEnvelope::new("list", message, to_value(&result.tasks)?, ctx.now())
        .with_meta("evaluation_path", result.path.as_str())
        .with_meta("count", result.tasks.len())
        .with_meta("page", result.paging.page)
        .with_meta("per_page", result.paging.per_page);
    if let Some(filter) = result.filter {
        envelope = envelope.with_meta("filter", filter);
    }
    if let Some(reason) = result.fallback_reason {
        envelope = envelope.with_meta("fallback_reason", reason);
    }
    if result.truncated {
        envelope = envelope.with_meta("truncated", true);
    }
    Ok(envelope)
}

pub async fn handle(ctx: &ServiceContext, request: ToolRequest) -> Result<ResponseEnvelope, ToolError> {
    let operation = request.operation();
    tracing::debug!("handling '{}'", operation);

    match request {
        ToolRequest::Create(args) => {
            let task = mutation::create_task(ctx, args).await?;
            let message = format!("Created task {} \"{}\"", task.id, task.title);
            Ok(ResponseEnvelope::new(operation, message, to_value(&task)?, ctx.now()))
        }
        ToolRequest::Get(args) => {
            let task = mutation::get_task(ctx, args).await?;
            let message = format!("Task {} \"{}\"", task.id, task.title);
            Ok(ResponseEnvelope::new(operation, message, to_value(&task)?, ctx.now()))
        }
        ToolRequest::Update(args) => {
            let outcome = mutation::update_task(ctx, args).await?;
            let message = if outcome.affected_fields.is_empty() {
                format!("Task {} unchanged", outcome.task.id)
            } else {
                format!(
                    "Updated task {}: {}",
                    outcome.task.id,
                    outcome.affected_fields.join(", ")
                )
            };
            Ok(
                ResponseEnvelope::new(operation, message, to_value(&outcome.task)?, ctx.now())
                    .with_meta("affected_fields", to_value(&outcome.affected_fields)?),
            )
        }
        ToolRequest::Delete(args) => {
            let outcome = mutation::delete_task(ctx, args).await?;
            let message = match &outcome.title {
                Some(title) => format!("Deleted task {} \"{}\"", outcome.id, title),
                None => format!("Deleted task {}", outcome.id),
            };
            let data = json!({ "id": outcome.id, "title": outcome.title });
            Ok(ResponseEnvelope::new(operation, message, data, ctx.now())
                .with_meta("already_absent", outcome.already_absent))
        }
        ToolRequest::List(args) => list_envelope(ctx, filtering::list_tasks(ctx, args).await?),
        ToolRequest::Assign(args) => {
            membership_envelope(ctx, operation, "assignee", membership::assign(ctx, args).await?)
        }
        ToolRequest::Unassign(args) => {
            membership_envelope(ctx, operation, "assignee", membership::unassign(ctx, args).await?)
        }
        ToolRequest::ApplyLabels(args) => {
            membership_envelope(ctx, operation, "label", membership::apply_labels(ctx, args).await?)
        }
        ToolRequest::RemoveLabels(args) => membership_envelope(
            ctx,
            operation,
            "label",
            membership::remove_labels(ctx, args).await?,
        ),
        ToolRequest::Relate(args) => {
            let outcome = relations::relate(ctx, args).await?;
            let message = format!("Relation added to task {}", outcome.task_id);
            relations_envelope(ctx, operation, message, outcome)
        }
        ToolRequest::Unrelate(args) => {
            let outcome = relations::unrelate(ctx, args).await?;
            let message = format!("Relation removed from task {}", outcome.task_id);
            relations_envelope(ctx, operation, message, outcome)
        }
        ToolRequest::Relations(args) => {
            let outcome = relations::relations(ctx, args).await?;
            let message = format!("Relations of task {}", outcome.task_id);
            relations_envelope(ctx, operation, message, outcome)
        }
        ToolRequest::ListProjects => {
            let projects = projects::list_projects(ctx).await?;
            let message = format!("Found {} project(s)", projects.len());
            Ok(
                ResponseEnvelope::new(operation, message, to_value(&projects)?, ctx.now())
                    .with_meta("count", projects.len()),
            )
        }
        ToolRequest::ListLabels => {
            let labels = projects::list_labels(ctx).await?;
            let message = format!("Found {} label(s)", labels.len());
            Ok(
                ResponseEnvelope::new(operation, message, to_value(&labels)?, ctx.now())
                    .with_meta("count", labels.len()),
            )
        }
    }
}
