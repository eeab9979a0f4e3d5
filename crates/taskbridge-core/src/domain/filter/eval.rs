//! Local evaluation of a filter expression against a task.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::{CompareOp, Condition, Field, FilterExpr, Value};
use crate::domain::Task;

impl FilterExpr {
    /// `now` anchors relative dates such as `now+7d`.
    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        match self {
            FilterExpr::Condition(c) => c.matches(task, now),
            FilterExpr::And(l, r) => l.matches(task, now) && r.matches(task, now),
            FilterExpr::Or(l, r) => l.matches(task, now) || r.matches(task, now),
        }
    }
}

fn compare(ordering: Ordering, op: CompareOp) -> bool {
    match op {
        CompareOp::Eq | CompareOp::In => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Like => false,
    }
}

impl Condition {
    fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        match self.field {
            Field::Id => self.match_integer(task.id.get() as i64),
            Field::Priority => self.match_integer(i64::from(task.priority)),
            Field::Project => self.match_integer(task.project_id.get() as i64),
            Field::Done => self.match_bool(task.done),
            Field::DueDate => self.match_date(task.due_date, now),
            Field::StartDate => self.match_date(task.start_date, now),
            Field::EndDate => self.match_date(task.end_date, now),
            Field::Assignees => {
                self.match_membership(|id| task.assignees.iter().any(|a| a.get() as i64 == id))
            }
            Field::Labels => {
                self.match_membership(|id| task.labels.iter().any(|l| l.get() as i64 == id))
            }
            Field::Title => self.match_text(&task.title),
            Field::Description => self.match_text(&task.description),
        }
    }

    fn integers(&self) -> impl Iterator<Item = i64> + '_ {
        self.values.iter().filter_map(|v| match v {
            Value::Integer(n) => Some(*n),
            _ => None,
        })
    }

    fn match_integer(&self, lhs: i64) -> bool {
        let mut rhs = self.integers();
        if self.op == CompareOp::In {
            return rhs.any(|n| n == lhs);
        }
        rhs.next().is_some_and(|n| compare(lhs.cmp(&n), self.op))
    }

    fn match_bool(&self, lhs: bool) -> bool {
        let Some(Value::Boolean(rhs)) = self.values.first() else {
            return false;
        };
        compare(lhs.cmp(rhs), self.op)
    }

    /// A task without the date never matches, whatever the operator.
    /// Neither does an out-of-range relative date.
    fn match_date(&self, lhs: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let (Some(lhs), Some(Value::Date(rhs))) = (lhs, self.values.first()) else {
            return false;
        };
        rhs.resolve(now)
            .is_some_and(|rhs| compare(lhs.cmp(&rhs), self.op))
    }

    fn match_membership(&self, contains: impl Fn(i64) -> bool) -> bool {
        let mut ids = self.integers();
        match self.op {
            CompareOp::Eq => ids.next().is_some_and(&contains),
            CompareOp::Ne => ids.next().is_some_and(|id| !contains(id)),
            CompareOp::In => ids.any(contains),
            _ => false,
        }
    }

    fn match_text(&self, lhs: &str) -> bool {
        let lhs = lhs.to_lowercase();
        let mut texts = self.values.iter().filter_map(|v| match v {
            Value::Text(s) => Some(s.to_lowercase()),
            _ => None,
        });
        match self.op {
            CompareOp::Eq => texts.next().is_some_and(|t| t == lhs),
            CompareOp::Ne => texts.next().is_some_and(|t| t != lhs),
            CompareOp::In => texts.any(|t| t == lhs),
            CompareOp::Like => texts
                .next()
                .is_some_and(|t| lhs.contains(t.trim_matches('%'))),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LabelId, ProjectId, TaskDraft, TaskId, UserId};
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Task {
        let mut task = TaskDraft::new("Write Quarterly Report").into_task(TaskId::new(4), ProjectId::new(2));
        task.priority = 3;
        task.due_date = Some(Utc.with_ymd_and_hms(2025, 10, 5, 0, 0, 0).unwrap());
        task.assignees.insert(UserId::new(7));
        task.labels.extend([LabelId::new(1), LabelId::new(5)]);
        task
    }

    #[rstest]
    #[case("done = false", true)]
    #[case("done != false", false)]
    #[case("priority >= 3", true)]
    #[case("priority > 3", false)]
    #[case("priority in 1, 2, 3", true)]
    #[case("project = 2", true)]
    #[case("id != 4", false)]
    #[case("due_date < now+7d", true)]
    #[case("due_date < now+1d", false)]
    #[case("due_date >= 2025-10-05", true)]
    #[case("due_date < now+99999999w", false)]
    #[case("due_date > now-99999999w", false)]
    #[case("start_date < now", false)]
    #[case("start_date != now", false)]
    #[case("assignees = 7", true)]
    #[case("assignees != 7", false)]
    #[case("labels in 2, 5", true)]
    #[case("labels = 2", false)]
    #[case("title like %quarterly%", true)]
    #[case("title = 'write quarterly report'", true)]
    #[case("description like %x%", false)]
    #[case("done = false && (priority > 4 || labels = 1)", true)]
    #[case("done = true || priority < 1", false)]
    fn evaluates_against_task(#[case] expr: &str, #[case] expected: bool) {
        let expr = FilterExpr::parse(expr).unwrap();
        assert_eq!(expr.matches(&sample(), now()), expected);
    }
}
