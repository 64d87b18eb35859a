//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてパイプラインを実装します。
//!
//! # 主要コンポーネント
//! - **Coordinator**: 1 サイクルの実行（lock→dump→verify→prune→upload→prune→report）
//! - **archive**: 圧縮・チェックサム検証・コミット（rename + fsync）
//! - **LocalStore**: ローカル保持（スキャン・登録・世代削除）
//! - **Uploader**: リトライ付きアップロード
//! - **remote_retention**: 年齢ベースのリモート世代削除
//! - **RetryPolicy**: 指数バックオフ

pub mod archive;
pub mod coordinator;
pub mod local_store;
pub mod remote_retention;
pub mod retry;
pub mod upload;

pub use self::coordinator::Coordinator;
pub use self::local_store::{LocalStore, PruneOutcome};
pub use self::remote_retention::RemotePruneOutcome;
pub use self::retry::RetryPolicy;
pub use self::upload::Uploader;
