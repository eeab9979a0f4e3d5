//! taskbridge-core
//!
//! Core building blocks for exposing a remote task tracker through a
//! tool-calling interface.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, relation, repeat, date, filter, query, envelope, errors）
//! - **ports**: 抽象化レイヤー（TaskService, Clock）
//! - **resilience**: リトライ・エラー分類・サーキットブレーカー
//! - **app**: ワークフロー（guard, diff, mutation, membership, relations, filtering, dispatch）
//! - **impls**: 実装（InMemoryTaskService など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod resilience;
