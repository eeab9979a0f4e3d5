//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 外部システム（リモートのタスク管理サービス、時計）への
//! インターフェースだけを提供し、実装の詳細は `impls` や利用側に任せます。

pub mod clock;
pub mod task_service;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::task_service::{RemoteError, TaskQuery, TaskService};
