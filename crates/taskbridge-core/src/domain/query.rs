//! Sorting and paging shared by the local filter path and the in-memory service.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Task;

pub const DEFAULT_PER_PAGE: u32 = 50;
pub const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Id,
    Title,
    Priority,
    DueDate,
    Done,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "").as_str() {
            "id" => Ok(SortField::Id),
            "title" => Ok(SortField::Title),
            "priority" => Ok(SortField::Priority),
            "duedate" => Ok(SortField::DueDate),
            "done" => Ok(SortField::Done),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

/// 1-indexed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Paging {
    fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize)
    }

    pub fn apply(&self, tasks: Vec<Task>) -> Vec<Task> {
        tasks
            .into_iter()
            .skip(self.offset())
            .take(self.per_page as usize)
            .collect()
    }
}

/// Stable sort; ties fall back to id so output is deterministic.
/// Tasks without a due date sort after dated ones in ascending order.
pub fn sort_tasks(tasks: &mut [Task], sort: Sort) {
    tasks.sort_by(|a, b| {
        let primary = match sort.field {
            SortField::Id => Ordering::Equal,
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Done => a.done.cmp(&b.done),
            SortField::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        let ordering = primary.then_with(|| a.id.cmp(&b.id));
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectId, TaskDraft, TaskId};

    fn task(id: u64, priority: u8) -> Task {
        let mut t = TaskDraft::new(format!("t{id}")).into_task(TaskId::new(id), ProjectId::new(1));
        t.priority = priority;
        t
    }

    #[test]
    fn sorts_by_priority_desc_with_id_tiebreak() {
        let mut tasks = vec![task(1, 2), task(2, 5), task(3, 2)];
        sort_tasks(
            &mut tasks,
            Sort {
                field: SortField::Priority,
                order: SortOrder::Desc,
            },
        );
        let ids: Vec<u64> = tasks.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn paging_skips_whole_pages() {
        let tasks: Vec<Task> = (1..=5).map(|i| task(i, 0)).collect();
        let page = Paging { page: 2, per_page: 2 }.apply(tasks.clone());
        assert_eq!(page.iter().map(|t| t.id.get()).collect::<Vec<_>>(), vec![3, 4]);

        let beyond = Paging { page: 9, per_page: 2 }.apply(tasks);
        assert!(beyond.is_empty());
    }
}
