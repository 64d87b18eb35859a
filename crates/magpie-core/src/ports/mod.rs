//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（Postgres, オブジェクトストア, ファイルシステム,
//! 時計）へのインターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - ローカルディレクトリが直近バックアップの source of truth
//! - リモートストアは長期保存先（アップロードは冪等なキーで上書き安全）
//! - テストでは各ポートを fake に差し替え可能

pub mod clock;
pub mod dump;
pub mod lock;
pub mod remote;
pub mod report;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dump::{DumpProducer, DumpStats};
pub use self::lock::{LockManager, RunLockGuard};
pub use self::remote::{RemoteError, RemoteObject, RemoteStore};
pub use self::report::ReportSink;
