//! magpie-core
//!
//! Backup and retention pipeline for a self-managed Postgres instance:
//! dump → compress+verify → local retention → remote upload → remote retention.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（artifact, policy, report, state, errors）
//! - **ports**: 抽象化レイヤー（Clock, DumpProducer, RemoteStore, LockManager, ReportSink）
//! - **app**: アプリケーションロジック（coordinator, archive, local_store, upload, remote_retention, retry）
//! - **impls**: 実装（pg_dump, file_lock, object_remote, log_report）
//! - **config**: 環境変数からの設定読み込み（起動時に一度だけ検証）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
