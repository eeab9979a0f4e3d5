//! Errors - 呼び出し側に見せるエラー型と分類
//!
//! リモートの生エラー（`ports::RemoteError`）は呼び出し境界で一度だけ
//! `resilience::classify` によって `ToolError` に分類されます。
//! 以降は種別を変えずに伝播し、文脈（リトライ回数など）だけを追記します。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ids::TaskId;

/// ErrorKind は `ToolError` の運用分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 入力不正（リモートには到達しない）
    Validation,
    /// リモートのエンティティが存在しない／アクセスできない
    NotFound,
    /// 認証情報が拒否された（リトライ対象）
    Authentication,
    /// ネットワーク到達不能
    Connectivity,
    /// 複数ステップのワークフローが途中まで成功した
    PartialFailure,
    /// その他のリモート失敗（メッセージは保持）
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Connectivity => "connectivity",
            ErrorKind::PartialFailure => "partial_failure",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Details of a multi-step workflow that stopped partway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialFailure {
    /// Workflow name (`create`, `update`, `assign`, ...).
    pub operation: String,
    pub task_id: Option<TaskId>,
    /// The step that failed, e.g. `apply labels` or `remove assignee 4`.
    pub failed_step: String,
    pub cause_kind: ErrorKind,
    pub cause: String,
    /// Steps that completed before the failure, in order.
    pub completed_steps: Vec<String>,
    /// `None` when the workflow does not compensate (update).
    pub rollback_succeeded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} partially failed at '{}': {}.",
            self.operation, self.failed_step, self.cause
        )?;

        if self.completed_steps.is_empty() {
            write!(f, " No secondary steps had been applied.")?;
        } else {
            write!(f, " Already applied: {}.", self.completed_steps.join(", "))?;
        }

        let subject = self
            .task_id
            .map(|id| id.describe())
            .unwrap_or_else(|| "the task".to_string());
        match (self.rollback_succeeded, &self.rollback_error) {
            (Some(true), _) => write!(f, " Rolled back: {subject} was deleted."),
            (Some(false), Some(err)) => write!(
                f,
                " Rollback FAILED ({err}): {subject} still exists and must be cleaned up manually."
            ),
            (Some(false), None) => write!(
                f,
                " Rollback FAILED: {subject} still exists and must be cleaned up manually."
            ),
            (None, _) => write!(f, " No rollback was attempted; {subject} reflects the applied steps."),
        }
    }
}

/// ToolError は全ワークフローの失敗型
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    Connectivity { message: String },

    #[error("{0}")]
    PartialFailure(Box<PartialFailure>),

    #[error("{message}")]
    Unknown { message: String },
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        ToolError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ToolError::NotFound {
            message: message.into(),
        }
    }

    pub fn partial(failure: PartialFailure) -> Self {
        ToolError::PartialFailure(Box::new(failure))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation { .. } => ErrorKind::Validation,
            ToolError::NotFound { .. } => ErrorKind::NotFound,
            ToolError::Authentication { .. } => ErrorKind::Authentication,
            ToolError::Connectivity { .. } => ErrorKind::Connectivity,
            ToolError::PartialFailure(_) => ErrorKind::PartialFailure,
            ToolError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn as_partial(&self) -> Option<&PartialFailure> {
        match self {
            ToolError::PartialFailure(p) => Some(p),
            _ => None,
        }
    }

    /// Adds the retry count to the message. The kind never changes.
    pub fn with_retries(self, step: &str, retries: u32) -> Self {
        if retries == 0 {
            return self;
        }
        let annotate = |message: String, prefix: &str| {
            format!("{prefix} failed after {retries} retries ({step}): {message}")
        };
        match self {
            ToolError::Authentication { message } => ToolError::Authentication {
                message: annotate(message, "authentication"),
            },
            ToolError::Connectivity { message } => ToolError::Connectivity {
                message: annotate(message, "connection"),
            },
            ToolError::NotFound { message } => ToolError::NotFound {
                message: annotate(message, "lookup"),
            },
            ToolError::Unknown { message } => ToolError::Unknown {
                message: annotate(message, "request"),
            },
            other @ (ToolError::Validation { .. } | ToolError::PartialFailure(_)) => other,
        }
    }

    /// Serializable report for the tool-calling surface.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            details: self.as_partial().cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<PartialFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(rollback: Option<bool>, rollback_error: Option<&str>) -> PartialFailure {
        PartialFailure {
            operation: "create".to_string(),
            task_id: Some(TaskId::new(12)),
            failed_step: "apply labels".to_string(),
            cause_kind: ErrorKind::Unknown,
            cause: "boom".to_string(),
            completed_steps: vec![],
            rollback_succeeded: rollback,
            rollback_error: rollback_error.map(str::to_string),
        }
    }

    #[test]
    fn retry_annotation_keeps_kind() {
        let err = ToolError::Authentication {
            message: "token rejected".to_string(),
        }
        .with_retries("set labels", 3);

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.to_string().starts_with("authentication failed after 3 retries"));
        assert!(err.to_string().contains("token rejected"));
    }

    #[test]
    fn zero_retries_leaves_error_untouched() {
        let err = ToolError::validation("bad");
        assert_eq!(err.clone().with_retries("x", 0), err);
    }

    #[test]
    fn partial_failure_message_distinguishes_rollback_outcome() {
        let ok = ToolError::partial(failure(Some(true), None)).to_string();
        let failed = ToolError::partial(failure(Some(false), Some("403"))).to_string();

        assert!(ok.contains("Rolled back: task 12 was deleted"));
        assert!(failed.contains("Rollback FAILED (403)"));
        assert!(failed.contains("task 12 still exists"));
    }

    #[test]
    fn report_carries_partial_details() {
        let report = ToolError::partial(failure(Some(false), None)).report();
        assert_eq!(report.kind, ErrorKind::PartialFailure);
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["details"]["rollback_succeeded"], false);
        assert_eq!(v["kind"], "partial_failure");
    }
}
