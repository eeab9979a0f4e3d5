//! Project resolution and the read-only catalogue listings.

use crate::domain::{Label, Project, ProjectId, ToolError};

use super::context::ServiceContext;

/// Looked up after "inbox", in this order.
pub const CONVENTIONAL_PROJECT_NAMES: [&str; 4] = ["default", "tasks", "personal", "home"];

/// The project new tasks land in when the caller names none.
///
/// "inbox" (case-insensitive), then the conventional names, then the first
/// non-archived project. Archived projects are never picked.
pub fn pick_default_project(projects: &[Project]) -> Option<&Project> {
    let active = || projects.iter().filter(|p| !p.archived);

    std::iter::once("inbox")
        .chain(CONVENTIONAL_PROJECT_NAMES)
        .find_map(|name| active().find(|p| p.title.trim().eq_ignore_ascii_case(name)))
        .or_else(|| active().next())
}

pub async fn resolve_project(
    ctx: &ServiceContext,
    explicit: Option<ProjectId>,
) -> Result<Project, ToolError> {
    let projects = list_projects(ctx).await?;

    if let Some(id) = explicit {
        return projects.into_iter().find(|p| p.id == id).ok_or_else(|| {
            ToolError::not_found(format!(
                "Project {id} not found. Call list_projects to see the available project ids"
            ))
        });
    }

    let project = pick_default_project(&projects).cloned().ok_or_else(|| {
        ToolError::validation(
            "No default project could be determined (no 'Inbox' or other active project exists). \
             Pass project_id explicitly, e.g. \"project_id\": 1",
        )
    })?;
    tracing::debug!("defaulted to project {} ({})", project.id, project.title);
    Ok(project)
}

pub async fn list_projects(ctx: &ServiceContext) -> Result<Vec<Project>, ToolError> {
    ctx.call("list projects", || ctx.service().list_projects())
        .await
}

pub async fn list_labels(ctx: &ServiceContext) -> Result<Vec<Label>, ToolError> {
    ctx.call("list labels", || ctx.service().list_labels()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::fixture_with;
    use crate::domain::ErrorKind;
    use crate::impls::InMemoryTaskService;
    use rstest::rstest;

    fn project(id: u64, title: &str, archived: bool) -> Project {
        Project {
            archived,
            ..Project::new(id, title)
        }
    }

    #[rstest]
    #[case::inbox_wins(&[(1, "Work", false), (2, "INBOX", false), (3, "Default", false)], Some(2))]
    #[case::conventional_order(&[(1, "Work", false), (2, "Home", false), (3, "Tasks", false)], Some(3))]
    #[case::first_active(&[(1, "Old", true), (2, "Work", false)], Some(2))]
    #[case::archived_inbox_skipped(&[(1, "Inbox", true), (2, "Work", false)], Some(2))]
    #[case::nothing_active(&[(1, "Inbox", true)], None)]
    fn default_project_order(#[case] projects: &[(u64, &str, bool)], #[case] expected: Option<u64>) {
        let projects: Vec<Project> = projects
            .iter()
            .map(|(id, title, archived)| project(*id, title, *archived))
            .collect();
        assert_eq!(pick_default_project(&projects).map(|p| p.id.get()), expected);
    }

    #[tokio::test]
    async fn explicit_missing_project_is_not_found_naming_id() {
        let (_, ctx) = fixture_with(InMemoryTaskService::new().with_project(Project::new(1, "Inbox")));
        let err = resolve_project(&ctx, Some(ProjectId::new(42))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("42"));
    }

    #[tokio::test]
    async fn no_projects_asks_for_explicit_id() {
        let (_, ctx) = fixture_with(InMemoryTaskService::new());
        let err = resolve_project(&ctx, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("project_id"));
    }
}
