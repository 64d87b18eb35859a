//! Report sink port - 実行結果の出力先
//!
//! # 実装
//! - LogReportSink: tracing への要約 + stdout への JSON 1 行（本番用）
//! - テストでは収集用の fake を使用

use crate::domain::RunReport;

/// ReportSink は確定済みの RunReport を外部へ渡す
///
/// 呼び出しはロック解放後に 1 回だけ行われる。
pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &RunReport);
}
