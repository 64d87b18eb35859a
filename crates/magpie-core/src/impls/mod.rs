//! Impls - ポートの実装
//!
//! - **PgDumpProducer**: `pg_dumpall` を子プロセスとして実行
//! - **FileLockManager**: ロックファイル（pid + 取得時刻、stale 検出付き）
//! - **ObjectStoreRemote**: `object_store` クレート（S3 / LocalFileSystem）の薄いラッパ
//! - **LogReportSink**: tracing への要約 + stdout への JSON 1 行

pub mod file_lock;
pub mod log_report;
pub mod object_remote;
pub mod pg_dump;

pub use self::file_lock::FileLockManager;
pub use self::log_report::LogReportSink;
pub use self::object_remote::ObjectStoreRemote;
pub use self::pg_dump::PgDumpProducer;
