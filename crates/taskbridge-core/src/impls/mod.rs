//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskService**: リモートのタスク管理サービスの代替（障害注入・呼び出しログ付き）
//!
//! # 本番用実装
//! 実際のリモートサービスへの HTTP クライアントは別クレートに配置します。

pub mod inmem_service;

// 主要な型を再エクスポート
pub use self::inmem_service::{InMemoryTaskService, RemoteCall, RemoteOp, Snapshot};
