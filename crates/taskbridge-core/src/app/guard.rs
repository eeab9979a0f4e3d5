//! Guard - リモート呼び出し前の入力検証
//!
//! すべて同期・純粋関数で、失敗は `ToolError::Validation`。
//! メッセージには「どのパラメータか」「なぜか」「正しい例」を含めます。

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::date::{WIRE_EXAMPLE, parse_wire_lenient};
use crate::domain::query::MAX_PER_PAGE;
use crate::domain::{Paging, RelationKind, RemoteRepeat, RepeatPolicy, RepeatUnit, ToolError};

pub const MAX_PRIORITY: u8 = 5;

static WIRE_DATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$").expect("valid regex")
});

/// Positive integer id.
pub fn validate_id(field: &str, value: i64) -> Result<u64, ToolError> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| {
            ToolError::validation(format!(
                "Invalid {field}: must be a positive integer, got {value}. Example: \"{field}\": 42"
            ))
        })
}

/// Exact `YYYY-MM-DDTHH:mm:ss.sssZ` shape and a real calendar instant.
pub fn validate_date(field: &str, value: &str) -> Result<DateTime<Utc>, ToolError> {
    let invalid = |reason: &str| {
        ToolError::validation(format!(
            "Invalid {field} '{value}': {reason}. Use YYYY-MM-DDTHH:mm:ss.sssZ, e.g. \"{WIRE_EXAMPLE}\""
        ))
    };

    if !WIRE_DATE_SHAPE.is_match(value) {
        return Err(invalid("wrong format"));
    }
    parse_wire_lenient(value).ok_or_else(|| invalid("not a real calendar date/time"))
}

pub fn validate_relation_kind(value: &str) -> Result<RelationKind, ToolError> {
    value.parse().map_err(|_| {
        ToolError::validation(format!(
            "Invalid relation_kind '{value}'. Must be one of: {}. Example: \"relation_kind\": \"blocking\"",
            RelationKind::vocabulary()
        ))
    })
}

/// Fails when a mandated field is absent.
pub fn require_field<T>(value: Option<T>, name: &str) -> Result<T, ToolError> {
    value.ok_or_else(|| ToolError::validation(format!("Missing required parameter '{name}'")))
}

pub fn validate_priority(value: i64) -> Result<u8, ToolError> {
    u8::try_from(value)
        .ok()
        .filter(|p| *p <= MAX_PRIORITY)
        .ok_or_else(|| {
            ToolError::validation(format!(
                "Invalid priority {value}: must be between 0 and {MAX_PRIORITY}. Example: \"priority\": 3"
            ))
        })
}

/// Trimmed, non-empty title.
pub fn validate_title(value: &str) -> Result<String, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ToolError::validation(
            "Invalid title: must not be empty. Example: \"title\": \"Write quarterly report\"",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_paging(page: Option<i64>, per_page: Option<i64>) -> Result<Paging, ToolError> {
    let defaults = Paging::default();
    let page = match page {
        Some(p) => positive_u32("page", p)?,
        None => defaults.page,
    };
    let per_page = match per_page {
        Some(p) => positive_u32("per_page", p)?,
        None => defaults.per_page,
    };
    if per_page > MAX_PER_PAGE {
        return Err(ToolError::validation(format!(
            "Invalid per_page {per_page}: at most {MAX_PER_PAGE} tasks per page. Example: \"per_page\": 50"
        )));
    }
    Ok(Paging { page, per_page })
}

fn positive_u32(field: &str, value: i64) -> Result<u32, ToolError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v >= 1)
        .ok_or_else(|| {
            ToolError::validation(format!(
                "Invalid {field}: must be at least 1, got {value}. Example: \"{field}\": 1"
            ))
        })
}

/// `(count, unit)` to the remote encoding.
///
/// - neither given: `None` (leave as is)
/// - count `0`: clears the repeat
/// - unit without count: every 1 unit
/// - count without unit: days
pub fn validate_repeat(
    every: Option<i64>,
    unit: Option<&str>,
) -> Result<Option<RemoteRepeat>, ToolError> {
    if every.is_none() && unit.is_none() {
        return Ok(None);
    }

    let unit = match unit {
        Some(raw) => raw.parse::<RepeatUnit>().map_err(|_| {
            ToolError::validation(format!(
                "Invalid repeat_unit '{raw}'. Must be one of: day, week, month, year. \
                 Example: \"repeat_unit\": \"week\""
            ))
        })?,
        None => RepeatUnit::Day,
    };

    let every = match every {
        Some(0) => return Ok(Some(RemoteRepeat::NONE)),
        Some(n) => u32::try_from(n).map_err(|_| {
            ToolError::validation(format!(
                "Invalid repeat_after {n}: must be a non-negative count of {unit}s. \
                 Example: \"repeat_after\": 2, \"repeat_unit\": \"week\""
            ))
        })?,
        None => 1,
    };

    Ok(Some(RepeatPolicy::new(every, unit).to_remote()))
}
