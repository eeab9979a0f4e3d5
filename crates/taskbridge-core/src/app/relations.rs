//! Typed task relations: relate, unrelate, and read the relation map.
//!
//! `id` is always the source and `other_task_id` the target; the pair is
//! never swapped, even for kinds that have an inverse.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use super::context::ServiceContext;
use super::guard::{require_field, validate_id, validate_relation_kind};
use crate::domain::{RelationKind, Task, TaskId, ToolError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationArgs {
    pub id: Option<i64>,
    pub other_task_id: Option<i64>,
    pub relation_kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationsArgs {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationsOutcome {
    pub task_id: TaskId,
    pub title: String,
    pub relations: BTreeMap<RelationKind, BTreeSet<TaskId>>,
}

impl From<Task> for RelationsOutcome {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            title: task.title,
            relations: task.related_tasks,
        }
    }
}

struct ValidatedRelation {
    id: TaskId,
    other: TaskId,
    kind: RelationKind,
}

fn validate(args: RelationArgs) -> Result<ValidatedRelation, ToolError> {
    let id = TaskId::new(validate_id("id", require_field(args.id, "id")?)?);
    let other = TaskId::new(validate_id(
        "other_task_id",
        require_field(args.other_task_id, "other_task_id")?,
    )?);
    let kind = validate_relation_kind(&require_field(args.relation_kind, "relation_kind")?)?;

    if id == other {
        return Err(ToolError::validation(format!(
            "Invalid other_task_id {other}: a task cannot be related to itself. \
             Example: \"id\": {id}, \"other_task_id\": {}",
            other.get() + 1
        )));
    }
    Ok(ValidatedRelation { id, other, kind })
}

async fn owner(ctx: &ServiceContext, id: TaskId) -> Result<RelationsOutcome, ToolError> {
    ctx.call(&format!("get task {id}"), || ctx.service().get_task(id))
        .await
        .map(RelationsOutcome::from)
}

pub async fn relate(ctx: &ServiceContext, args: RelationArgs) -> Result<RelationsOutcome, ToolError> {
    let ValidatedRelation { id, other, kind } = validate(args)?;

    ctx.call(&format!("create {kind} relation {id} -> {other}"), || {
        ctx.service().create_relation(id, other, kind)
    })
    .await?;

    tracing::info!("related task {} -{}-> {}", id, kind, other);
    owner(ctx, id).await
}

pub async fn unrelate(ctx: &ServiceContext, args: RelationArgs) -> Result<RelationsOutcome, ToolError> {
    let ValidatedRelation { id, other, kind } = validate(args)?;

    ctx.call(&format!("delete {kind} relation {id} -> {other}"), || {
        ctx.service().delete_relation(id, other, kind)
    })
    .await?;

    tracing::info!("unrelated task {} -{}-> {}", id, kind, other);
    owner(ctx, id).await
}

pub async fn relations(
    ctx: &ServiceContext,
    args: RelationsArgs,
) -> Result<RelationsOutcome, ToolError> {
    let id = TaskId::new(validate_id("id", require_field(args.id, "id")?)?);
    owner(ctx, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::fixture;
    use crate::domain::{ErrorKind, ProjectId, TaskDraft};
    use crate::impls::{InMemoryTaskService, RemoteCall};
    use crate::ports::TaskService;

    async fn two_tasks(service: &InMemoryTaskService) -> (TaskId, TaskId) {
        let a = service.create_task(ProjectId::new(1), &TaskDraft::new("a")).await.unwrap();
        let b = service.create_task(ProjectId::new(1), &TaskDraft::new("b")).await.unwrap();
        service.clear_calls().await;
        (a.id, b.id)
    }

    fn args(id: TaskId, other: TaskId, kind: &str) -> RelationArgs {
        RelationArgs {
            id: Some(id.get() as i64),
            other_task_id: Some(other.get() as i64),
            relation_kind: Some(kind.to_string()),
        }
    }

    #[tokio::test]
    async fn relate_keeps_source_and_target_order() {
        let (service, ctx) = fixture();
        let (a, b) = two_tasks(&service).await;

        let outcome = relate(&ctx, args(a, b, "parent")).await.unwrap();

        assert_eq!(outcome.task_id, a);
        assert_eq!(
            outcome.relations.get(&RelationKind::Parenttask),
            Some(&BTreeSet::from([b]))
        );
        assert_eq!(
            service.calls().await.first(),
            Some(&RemoteCall::CreateRelation(a, b, RelationKind::Parenttask))
        );
    }

    #[tokio::test]
    async fn unrelate_removes_the_relation() {
        let (service, ctx) = fixture();
        let (a, b) = two_tasks(&service).await;
        relate(&ctx, args(a, b, "blocking")).await.unwrap();

        let outcome = unrelate(&ctx, args(a, b, "blocking")).await.unwrap();

        assert!(outcome.relations.is_empty());
        let other = relations(&ctx, RelationsArgs { id: Some(b.get() as i64) }).await.unwrap();
        assert!(other.relations.is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected_before_remote_calls() {
        let (service, ctx) = fixture();
        let (a, b) = two_tasks(&service).await;

        let err = relate(&ctx, args(a, b, "friends")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(service.calls().await.is_empty());
    }

    #[tokio::test]
    async fn self_relation_is_rejected() {
        let (_, ctx) = fixture();
        let id = TaskId::new(4);
        let err = relate(&ctx, args(id, id, "related")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn relating_to_a_missing_task_is_not_found() {
        let (service, ctx) = fixture();
        let (a, _) = two_tasks(&service).await;

        let err = relate(&ctx, args(a, TaskId::new(99), "related")).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
