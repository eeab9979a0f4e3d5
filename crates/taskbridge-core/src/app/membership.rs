//! Assignee and label membership workflows.
//!
//! - assignees: diffed, one remote add/remove per member, additions first
//! - labels: one wholesale `set labels` call with the computed final set

use std::collections::BTreeSet;

use serde::Deserialize;

use super::context::ServiceContext;
use super::diff::RelationDiff;
use super::guard::{require_field, validate_id};
use crate::domain::{LabelId, PartialFailure, Task, TaskId, ToolError, UserId};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssigneeArgs {
    pub id: Option<i64>,
    #[serde(default, alias = "assignees")]
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelArgs {
    pub id: Option<i64>,
    #[serde(default, alias = "labels")]
    pub label_ids: Vec<i64>,
}

/// Result of a membership change.
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipOutcome<T: Ord> {
    pub task: Task,
    pub added: BTreeSet<T>,
    pub removed: BTreeSet<T>,
}

/// The failing step of a partially applied diff.
pub(crate) struct StepFailure {
    pub step: String,
    pub error: ToolError,
}

pub(crate) fn id_set<T>(field: &str, raw: &[i64]) -> Result<BTreeSet<T>, ToolError>
where
    T: Ord + From<u64>,
{
    raw.iter()
        .map(|v| validate_id(field, *v).map(T::from))
        .collect()
}

/// Applies an assignee diff, additions before removals, recording each
/// completed step in `completed`.
pub(crate) async fn apply_assignee_diff(
    ctx: &ServiceContext,
    id: TaskId,
    diff: &RelationDiff<UserId>,
    completed: &mut Vec<String>,
) -> Result<(), StepFailure> {
    for user in &diff.to_add {
        let step = format!("add assignee {user}");
        ctx.call(&step, || ctx.service().add_assignee(id, *user))
            .await
            .map_err(|error| StepFailure {
                step: step.clone(),
                error,
            })?;
        completed.push(step);
    }
    for user in &diff.to_remove {
        let step = format!("remove assignee {user}");
        ctx.call(&step, || ctx.service().remove_assignee(id, *user))
            .await
            .map_err(|error| StepFailure {
                step: step.clone(),
                error,
            })?;
        completed.push(step);
    }
    Ok(())
}

/// A total failure is returned as is; once any step succeeded it becomes a
/// partial failure with no compensation.
pub(crate) fn uncompensated(
    operation: &str,
    id: TaskId,
    completed: Vec<String>,
    failure: StepFailure,
) -> ToolError {
    if completed.is_empty() {
        return failure.error;
    }
    tracing::warn!(
        "{} on task {} stopped at '{}' after {} step(s): {}",
        operation,
        id,
        failure.step,
        completed.len(),
        failure.error
    );
    ToolError::partial(PartialFailure {
        operation: operation.to_string(),
        task_id: Some(id),
        failed_step: failure.step,
        cause_kind: failure.error.kind(),
        cause: failure.error.to_string(),
        completed_steps: completed,
        rollback_succeeded: None,
        rollback_error: None,
    })
}

async fn fetch(ctx: &ServiceContext, id: TaskId) -> Result<Task, ToolError> {
    ctx.call(&format!("get task {id}"), || ctx.service().get_task(id))
        .await
}

/// Re-fetch after a mutation; falls back to the locally derived state.
pub(crate) async fn refetch_or(ctx: &ServiceContext, id: TaskId, fallback: Task) -> Task {
    match fetch(ctx, id).await {
        Ok(task) => task,
        Err(e) => {
            tracing::warn!("re-fetch of task {} failed, returning last known state: {}", id, e);
            fallback
        }
    }
}

async fn change_assignees(
    ctx: &ServiceContext,
    operation: &str,
    args: AssigneeArgs,
    diff_for: fn(&BTreeSet<UserId>, &BTreeSet<UserId>) -> RelationDiff<UserId>,
) -> Result<MembershipOutcome<UserId>, ToolError> {
    let id = TaskId::new(validate_id("id", require_field(args.id, "id")?)?);
    let users: BTreeSet<UserId> = id_set("user_ids", &args.user_ids)?;
    if users.is_empty() {
        return Err(ToolError::validation(
            "Missing required parameter 'user_ids': give at least one user id, e.g. \"user_ids\": [3]",
        ));
    }

    let current = fetch(ctx, id).await?;
    let diff = diff_for(&current.assignees, &users);

    let mut completed = Vec::new();
    if let Err(failure) = apply_assignee_diff(ctx, id, &diff, &mut completed).await {
        return Err(uncompensated(operation, id, completed, failure));
    }

    let mut expected = current.clone();
    expected.assignees = diff.apply(&current.assignees);
    let task = refetch_or(ctx, id, expected).await;

    tracing::info!(
        "{} on task {}: +{} -{}",
        operation,
        id,
        diff.to_add.len(),
        diff.to_remove.len()
    );
    Ok(MembershipOutcome {
        task,
        added: diff.to_add,
        removed: diff.to_remove,
    })
}

/// Adds the given users; users already assigned are skipped.
pub async fn assign(
    ctx: &ServiceContext,
    args: AssigneeArgs,
) -> Result<MembershipOutcome<UserId>, ToolError> {
    change_assignees(ctx, "assign", args, RelationDiff::additions).await
}

/// Removes the given users; users not assigned are skipped.
pub async fn unassign(
    ctx: &ServiceContext,
    args: AssigneeArgs,
) -> Result<MembershipOutcome<UserId>, ToolError> {
    change_assignees(ctx, "unassign", args, RelationDiff::removals).await
}

async fn change_labels(
    ctx: &ServiceContext,
    operation: &str,
    args: LabelArgs,
    diff_for: fn(&BTreeSet<LabelId>, &BTreeSet<LabelId>) -> RelationDiff<LabelId>,
) -> Result<MembershipOutcome<LabelId>, ToolError> {
    let id = TaskId::new(validate_id("id", require_field(args.id, "id")?)?);
    let labels: BTreeSet<LabelId> = id_set("label_ids", &args.label_ids)?;
    if labels.is_empty() {
        return Err(ToolError::validation(
            "Missing required parameter 'label_ids': give at least one label id, e.g. \"label_ids\": [7]",
        ));
    }

    let current = fetch(ctx, id).await?;
    let diff = diff_for(&current.labels, &labels);

    if diff.is_empty() {
        tracing::debug!("{} on task {}: label set unchanged", operation, id);
        return Ok(MembershipOutcome {
            task: current,
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        });
    }

    let desired = diff.apply(&current.labels);
    let wholesale: Vec<LabelId> = desired.iter().copied().collect();
    ctx.call("set labels", || ctx.service().set_labels(id, &wholesale))
        .await?;

    let mut expected = current;
    expected.labels = desired;
    let task = refetch_or(ctx, id, expected).await;

    tracing::info!(
        "{} on task {}: +{} -{}",
        operation,
        id,
        diff.to_add.len(),
        diff.to_remove.len()
    );
    Ok(MembershipOutcome {
        task,
        added: diff.to_add,
        removed: diff.to_remove,
    })
}

pub async fn apply_labels(
    ctx: &ServiceContext,
    args: LabelArgs,
) -> Result<MembershipOutcome<LabelId>, ToolError> {
    change_labels(ctx, "apply_labels", args, RelationDiff::additions).await
}

pub async fn remove_labels(
    ctx: &ServiceContext,
    args: LabelArgs,
) -> Result<MembershipOutcome<LabelId>, ToolError> {
    change_labels(ctx, "remove_labels", args, RelationDiff::removals).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::fixture;
    use crate::domain::{ErrorKind, ProjectId, TaskDraft};
    use crate::impls::{InMemoryTaskService, RemoteCall, RemoteOp};
    use crate::ports::{RemoteError, TaskService};

    async fn seed_task(service: &InMemoryTaskService) -> TaskId {
        let task = service
            .create_task(ProjectId::new(1), &TaskDraft::new("seed"))
            .await
            .unwrap();
        service.add_assignee(task.id, UserId::new(1)).await.unwrap();
        service.set_labels(task.id, &[LabelId::new(7)]).await.unwrap();
        service.clear_calls().await;
        task.id
    }

    fn assignee_args(id: TaskId, users: &[i64]) -> AssigneeArgs {
        AssigneeArgs {
            id: Some(id.get() as i64),
            user_ids: users.to_vec(),
        }
    }

    #[tokio::test]
    async fn assign_only_adds_missing_users() {
        let (service, ctx) = fixture();
        let id = seed_task(&service).await;

        let outcome = assign(&ctx, assignee_args(id, &[1, 2, 3])).await.unwrap();

        assert_eq!(outcome.added, BTreeSet::from([2, 3].map(UserId::new)));
        assert_eq!(outcome.task.assignees, BTreeSet::from([1, 2, 3].map(UserId::new)));
        assert_eq!(service.count_calls(RemoteOp::AddAssignee).await, 2);
    }

    #[tokio::test]
    async fn unassign_skips_users_not_assigned() {
        let (service, ctx) = fixture();
        let id = seed_task(&service).await;

        let outcome = unassign(&ctx, assignee_args(id, &[1, 5])).await.unwrap();

        assert_eq!(outcome.removed, BTreeSet::from([UserId::new(1)]));
        assert!(outcome.task.assignees.is_empty());
        assert_eq!(service.count_calls(RemoteOp::RemoveAssignee).await, 1);
    }

    #[tokio::test]
    async fn assign_failure_after_progress_is_partial() {
        let (service, ctx) = fixture();
        let id = seed_task(&service).await;
        service
            .fail_after(RemoteOp::AddAssignee, 1, RemoteError::status(500, "boom"))
            .await;

        let err = assign(&ctx, assignee_args(id, &[2, 3])).await.unwrap_err();

        let partial = err.as_partial().unwrap();
        assert_eq!(partial.failed_step, "add assignee 3");
        assert_eq!(partial.completed_steps, vec!["add assignee 2".to_string()]);
        assert_eq!(partial.rollback_succeeded, None);
        assert_eq!(partial.cause_kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn assign_failure_before_progress_is_total() {
        let (service, ctx) = fixture();
        let id = seed_task(&service).await;
        service
            .fail_next(RemoteOp::AddAssignee, RemoteError::status(500, "boom"))
            .await;

        let err = assign(&ctx, assignee_args(id, &[2, 3])).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert!(err.as_partial().is_none());
    }

    #[tokio::test]
    async fn labels_are_set_wholesale_with_the_merged_set() {
        let (service, ctx) = fixture();
        let id = seed_task(&service).await;

        let outcome = apply_labels(
            &ctx,
            LabelArgs {
                id: Some(id.get() as i64),
                label_ids: vec![8],
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.task.labels, BTreeSet::from([7, 8].map(LabelId::new)));
        let calls = service.calls().await;
        assert!(calls.contains(&RemoteCall::SetLabels(id, vec![LabelId::new(7), LabelId::new(8)])));
    }

    #[tokio::test]
    async fn removing_absent_labels_makes_no_write() {
        let (service, ctx) = fixture();
        let id = seed_task(&service).await;

        let outcome = remove_labels(
            &ctx,
            LabelArgs {
                id: Some(id.get() as i64),
                label_ids: vec![8],
            },
        )
        .await
        .unwrap();

        assert!(outcome.removed.is_empty());
        assert_eq!(service.count_calls(RemoteOp::SetLabels).await, 0);
    }

    #[tokio::test]
    async fn empty_member_list_is_rejected_before_remote_calls() {
        let (service, ctx) = fixture();
        let err = assign(&ctx, AssigneeArgs { id: Some(1), user_ids: vec![] }).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(service.calls().await.is_empty());
    }
}
