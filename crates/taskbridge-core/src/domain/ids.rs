//! Domain identifiers (strongly-typed IDs).
//!
//! リモートサービスが払い出す整数 ID を型で区別します。
//! `Id<T>` というジェネリック型で共通実装を提供しつつ、
//! `T` は PhantomData のマーカー型としてコンパイル時の型安全性だけを担います。
//!
//! - TaskId と UserId は同じ u64 でも混同できない
//! - serde では素の数値としてシリアライズされる（リモートの表現と一致）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
///
/// エラーメッセージで使う名詞（"task", "project" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn noun() -> &'static str;
}

/// ジェネリック ID 型
///
/// 値は常に 1 以上（0 や負数は guard で弾かれ、ここまで来ない）。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: u64,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> u64 {
        self.value
    }

    /// "task 42" のような人間向けの表記
    pub fn describe(&self) -> String {
        format!("{} {}", T::noun(), self.value)
    }
}

impl<T: IdMarker> From<u64> for Id<T> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

// ========================================
// マーカー型の定義
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn noun() -> &'static str {
        "task"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Project {}

impl IdMarker for Project {
    fn noun() -> &'static str {
        "project"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {}

impl IdMarker for Label {
    fn noun() -> &'static str {
        "label"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum User {}

impl IdMarker for User {
    fn noun() -> &'static str {
        "user"
    }
}

/// Identifier of a task, assigned by the remote service and never reused.
pub type TaskId = Id<Task>;

/// Identifier of a project (the container that owns tasks).
pub type ProjectId = Id<Project>;

pub type LabelId = Id<Label>;

pub type UserId = Id<User>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id = TaskId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");

        let back: TaskId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn describe_uses_marker_noun() {
        assert_eq!(TaskId::new(7).describe(), "task 7");
        assert_eq!(ProjectId::new(3).describe(), "project 3");
        assert_eq!(UserId::new(9).to_string(), "9");

        // let _: TaskId = UserId::new(9); // <- does not compile
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<u64>());
        assert_eq!(size_of::<LabelId>(), size_of::<u64>());
    }
}
