//! App - アプリケーション層
//!
//! ports を組み合わせて、ツール呼び出し 1 回分のワークフローを実装します。
//!
//! # 主要コンポーネント
//! - **ServiceContextBuilder / ServiceContext**: 構築とワイヤリング（明示的に渡す）
//! - **guard**: リモート呼び出し前の入力検証
//! - **diff**: 関連集合（assignees / labels）の差分計算
//! - **mutation**: create / update / delete / get（補償付き）
//! - **membership**: assign / unassign / apply_labels / remove_labels
//! - **relations**: relate / unrelate / relations
//! - **filtering**: サーバー側とローカル評価の切り替え
//! - **dispatch**: `ToolRequest` → ワークフロー → `ResponseEnvelope`

pub mod builder;
pub mod context;
pub mod diff;
pub mod dispatch;
pub mod filtering;
pub mod guard;
pub mod membership;
pub mod mutation;
pub mod projects;
pub mod relations;

#[cfg(test)]
pub(crate) mod test_support;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ServiceContextBuilder};
pub use self::context::{RetryPolicies, ServiceContext};
pub use self::diff::RelationDiff;
pub use self::dispatch::{ToolRequest, handle};
pub use self::filtering::{EvaluationPath, FilterRequest, FilterResult};
pub use self::mutation::MutationState;
