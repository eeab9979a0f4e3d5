//! Filtering orchestrator - サーバー側評価とローカル評価の切り替え
//!
//! # 評価パス
//! - `server_side`: リモートがフィルタを評価した
//! - `client_side_fallback`: リモートがフィルタを拒否したため、粗い集合を取得してローカル評価
//! - `client_side`: リモートが評価できないフィールド（title / description）を含むため最初からローカル評価
//!
//! 接続エラーと認証エラーはフォールバックせずにそのまま返します。

use serde::{Deserialize, Serialize};

use super::context::ServiceContext;
use super::guard::{validate_id, validate_paging};
use crate::domain::query::{DEFAULT_PER_PAGE, sort_tasks};
use crate::domain::{
    ErrorKind, FilterExpr, Paging, ProjectId, Sort, SortField, SortOrder, Task, ToolError,
};
use crate::ports::TaskQuery;

/// Pages fetched for local evaluation before giving up on completeness.
pub const MAX_LOCAL_PAGES: u32 = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksArgs {
    pub project_id: Option<i64>,
    pub filter: Option<String>,
    pub saved_filter_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterRequest {
    pub expr: Option<FilterExpr>,
    /// Evaluated only by the service; never falls back.
    pub saved_filter: Option<u64>,
    pub project: Option<ProjectId>,
    pub paging: Paging,
    pub sort: Sort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPath {
    ServerSide,
    ClientSideFallback,
    ClientSide,
}

impl EvaluationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluationPath::ServerSide => "server_side",
            EvaluationPath::ClientSideFallback => "client_side_fallback",
            EvaluationPath::ClientSide => "client_side",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub tasks: Vec<Task>,
    pub path: EvaluationPath,
    pub paging: Paging,
    /// The expression as understood, rendered back to text.
    pub filter: Option<String>,
    /// Why the service's evaluation was abandoned.
    pub fallback_reason: Option<String>,
    /// Local evaluation stopped at `MAX_LOCAL_PAGES`; matches may be missing.
    pub truncated: bool,
}

impl FilterRequest {
    pub fn from_args(args: ListTasksArgs) -> Result<Self, ToolError> {
        let expr = match args.filter.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(source) => Some(FilterExpr::parse(source).map_err(|e| {
                ToolError::validation(format!(
                    "Invalid filter '{source}': {e}. Example: \"filter\": \"done = false && priority >= 3\""
                ))
            })?),
        };

        let saved_filter = args
            .saved_filter_id
            .map(|v| validate_id("saved_filter_id", v))
            .transpose()?;
        let project = args
            .project_id
            .map(|v| validate_id("project_id", v).map(ProjectId::new))
            .transpose()?;

        let field = match args.sort_by.as_deref() {
            Some(raw) => raw.parse::<SortField>().map_err(|_| {
                ToolError::validation(format!(
                    "Invalid sort_by '{raw}'. Must be one of: id, title, priority, due_date, done. \
                     Example: \"sort_by\": \"due_date\""
                ))
            })?,
            None => SortField::default(),
        };
        let order = match args.order.as_deref() {
            Some(raw) => raw.parse::<SortOrder>().map_err(|_| {
                ToolError::validation(format!(
                    "Invalid order '{raw}'. Must be asc or desc. Example: \"order\": \"desc\""
                ))
            })?,
            None => SortOrder::default(),
        };

        Ok(Self {
            expr,
            saved_filter,
            project,
            paging: validate_paging(args.page, args.per_page)?,
            sort: Sort { field, order },
        })
    }
}

fn propagates(error: &ToolError) -> bool {
    matches!(error.kind(), ErrorKind::Connectivity | ErrorKind::Authentication)
}

async fn server_side(
    ctx: &ServiceContext,
    request: &FilterRequest,
    filter: Option<String>,
) -> Result<Vec<Task>, ToolError> {
    let query = TaskQuery {
        project: request.project,
        filter,
        saved_filter: request.saved_filter,
        paging: request.paging,
        sort: request.sort,
    };
    ctx.call("list tasks", || ctx.service().list_tasks(&query))
        .await
}

/// Fetch the coarse set page by page, then filter, sort and page locally.
async fn client_side(
    ctx: &ServiceContext,
    request: &FilterRequest,
    expr: &FilterExpr,
) -> Result<(Vec<Task>, bool), ToolError> {
    let mut fetched = Vec::new();
    let mut truncated = false;

    for page in 1..=MAX_LOCAL_PAGES {
        let query = TaskQuery {
            project: request.project,
            filter: None,
            saved_filter: request.saved_filter,
            paging: Paging {
                page,
                per_page: DEFAULT_PER_PAGE,
            },
            sort: Sort::default(),
        };
        let batch = ctx
            .call(&format!("list tasks (page {page})"), || {
                ctx.service().list_tasks(&query)
            })
            .await?;
        let full = batch.len() == DEFAULT_PER_PAGE as usize;
        fetched.extend(batch);
        if !full {
            break;
        }
        if page == MAX_LOCAL_PAGES {
            truncated = true;
            tracing::warn!(
                "local filtering stopped after {} tasks; results may be incomplete",
                fetched.len()
            );
        }
    }

    let now = ctx.now();
    let mut matched: Vec<Task> = fetched.into_iter().filter(|t| expr.matches(t, now)).collect();
    sort_tasks(&mut matched, request.sort);
    Ok((request.paging.apply(matched), truncated))
}

pub async fn filter_tasks(
    ctx: &ServiceContext,
    request: FilterRequest,
) -> Result<FilterResult, ToolError> {
    let rendered = request.expr.as_ref().map(ToString::to_string);
    let result = |tasks: Vec<Task>,
                  path: EvaluationPath,
                  fallback_reason: Option<String>,
                  truncated: bool| FilterResult {
        tasks,
        path,
        paging: request.paging,
        filter: rendered.clone(),
        fallback_reason,
        truncated,
    };

    let Some(expr) = &request.expr else {
        let tasks = server_side(ctx, &request, None).await?;
        return Ok(result(tasks, EvaluationPath::ServerSide, None, false));
    };

    if expr.requires_client_side() {
        tracing::debug!("filter '{}' needs local evaluation", expr);
        let (tasks, truncated) = client_side(ctx, &request, expr).await?;
        return Ok(result(tasks, EvaluationPath::ClientSide, None, truncated));
    }

    match server_side(ctx, &request, rendered.clone()).await {
        Ok(tasks) => Ok(result(tasks, EvaluationPath::ServerSide, None, false)),
        Err(e) if propagates(&e) => Err(e),
        Err(e) => {
            tracing::warn!("service rejected filter '{}', evaluating locally: {}", expr, e);
            let (tasks, truncated) = client_side(ctx, &request, expr).await?;
            Ok(result(
                tasks,
                EvaluationPath::ClientSideFallback,
                Some(e.to_string()),
                truncated,
            ))
        }
    }
}

pub async fn list_tasks(ctx: &ServiceContext, args: ListTasksArgs) -> Result<FilterResult, ToolError> {
    let request = FilterRequest::from_args(args)?;
    filter_tasks(ctx, request).await
}
