//! Filter expressions over tasks.
//!
//! The same AST is used two ways:
//! - rendered back to text (`Display`) and handed to the remote service, or
//! - evaluated locally against fetched tasks (`FilterExpr::matches`).
//!
//! Grammar (`&&` binds tighter than `||`):
//!
//! ```text
//! expr      := and ("||" and)*
//! and       := primary ("&&" primary)*
//! primary   := "(" expr ")" | condition
//! condition := field op value ("," value)*   -- lists only after `in`
//! ```

mod eval;
mod parser;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use super::date::format_wire;

pub use parser::FilterParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Id,
    Done,
    Priority,
    DueDate,
    StartDate,
    EndDate,
    Project,
    Assignees,
    Labels,
    Title,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueType {
    Integer,
    Boolean,
    Date,
    IdSet,
    Text,
}

impl Field {
    /// Accepts snake_case, camelCase and a few singular aliases.
    pub fn lookup(name: &str) -> Option<Field> {
        let key: String = name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        let field = match key.as_str() {
            "id" => Field::Id,
            "done" => Field::Done,
            "priority" => Field::Priority,
            "duedate" | "due" => Field::DueDate,
            "startdate" => Field::StartDate,
            "enddate" => Field::EndDate,
            "project" | "projectid" => Field::Project,
            "assignees" | "assignee" => Field::Assignees,
            "labels" | "label" => Field::Labels,
            "title" => Field::Title,
            "description" => Field::Description,
            _ => return None,
        };
        Some(field)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Done => "done",
            Field::Priority => "priority",
            Field::DueDate => "due_date",
            Field::StartDate => "start_date",
            Field::EndDate => "end_date",
            Field::Project => "project",
            Field::Assignees => "assignees",
            Field::Labels => "labels",
            Field::Title => "title",
            Field::Description => "description",
        }
    }

    pub(crate) fn value_type(&self) -> ValueType {
        match self {
            Field::Id | Field::Priority | Field::Project => ValueType::Integer,
            Field::Done => ValueType::Boolean,
            Field::DueDate | Field::StartDate | Field::EndDate => ValueType::Date,
            Field::Assignees | Field::Labels => ValueType::IdSet,
            Field::Title | Field::Description => ValueType::Text,
        }
    }

    /// The remote filter cannot target free-text fields.
    pub fn is_remote_filterable(&self) -> bool {
        !matches!(self, Field::Title | Field::Description)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    In,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Like => "like",
            CompareOp::In => "in",
        }
    }

    pub(crate) fn allowed_for(&self, value_type: ValueType) -> bool {
        use CompareOp::*;
        match value_type {
            ValueType::Integer => !matches!(self, Like),
            ValueType::Boolean => matches!(self, Eq | Ne),
            ValueType::Date => matches!(self, Eq | Ne | Gt | Ge | Lt | Le),
            ValueType::IdSet => matches!(self, Eq | Ne | In),
            ValueType::Text => matches!(self, Eq | Ne | Like | In),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    Absolute(DateTime<Utc>),
    /// `now`, `now+7d`, `now-2w`: resolved against the evaluation clock.
    Relative { offset: TimeDelta, literal: String },
}

impl DateValue {
    /// `None` when the offset lands outside the representable range.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Absolute(t) => Some(*t),
            DateValue::Relative { offset, .. } => now.checked_add_signed(*offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Date(DateValue),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Date(DateValue::Absolute(t)) => f.write_str(&format_wire(t)),
            Value::Date(DateValue::Relative { literal, .. }) => f.write_str(literal),
            Value::Text(s) if s.contains('"') && !s.contains(['\'', '\\']) => write!(f, "'{s}'"),
            Value::Text(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub op: CompareOp,
    /// Exactly one value unless `op` is `In`.
    pub values: Vec<Value>,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} {} {}", self.field, self.op, values)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Condition(Condition),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    pub fn parse(input: &str) -> Result<FilterExpr, FilterParseError> {
        parser::parse(input)
    }

    /// All fields referenced anywhere in the expression.
    pub fn fields(&self) -> BTreeSet<Field> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<Field>) {
        match self {
            FilterExpr::Condition(c) => {
                out.insert(c.field);
            }
            FilterExpr::And(l, r) | FilterExpr::Or(l, r) => {
                l.collect_fields(out);
                r.collect_fields(out);
            }
        }
    }

    /// True when the remote filter cannot evaluate this expression at all.
    pub fn requires_client_side(&self) -> bool {
        self.fields().iter().any(|f| !f.is_remote_filterable())
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Condition(c) => c.fmt(f),
            FilterExpr::Or(l, r) => write!(f, "{l} || {r}"),
            FilterExpr::And(l, r) => {
                for (i, side) in [l, r].into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    match side.as_ref() {
                        FilterExpr::Or(..) => write!(f, "({side})")?,
                        _ => write!(f, "{side}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parser() {
        let src = "done = false && (priority >= 3 || labels in 1, 2) && due_date < now+7d";
        let expr = FilterExpr::parse(src).unwrap();
        let rendered = expr.to_string();
        assert_eq!(FilterExpr::parse(&rendered).unwrap(), expr);
        assert!(rendered.contains("(priority >= 3 || labels in 1, 2)"));
    }

    #[test]
    fn text_with_both_quote_kinds_survives_rendering() {
        for text in [r#"it's "done""#, r#"plain "quoted""#, r"back\slash 'x'"] {
            let expr = FilterExpr::Condition(Condition {
                field: Field::Title,
                op: CompareOp::Eq,
                values: vec![Value::Text(text.to_string())],
            });
            assert_eq!(FilterExpr::parse(&expr.to_string()).unwrap(), expr, "{text}");
        }
    }

    #[test]
    fn text_fields_force_client_side() {
        let expr = FilterExpr::parse("done = false && title like %report%").unwrap();
        assert!(expr.requires_client_side());

        let expr = FilterExpr::parse("done = false && priority > 2").unwrap();
        assert!(!expr.requires_client_side());
    }

    #[test]
    fn field_aliases() {
        assert_eq!(Field::lookup("dueDate"), Some(Field::DueDate));
        assert_eq!(Field::lookup("project_id"), Some(Field::Project));
        assert_eq!(Field::lookup("color"), None);
    }
}
