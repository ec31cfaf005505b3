//! Prometheusメトリクス定義。
use prometheus::{
    Counter, Histogram, HistogramOpts, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};
use std::sync::Arc;

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub issues_received: Counter,
    pub issues_dropped: Counter,
    pub batches_sent: Counter,
    pub records_parsed: Counter,
    pub lines_discarded: Counter,
    pub summary_failures: Counter,
    pub analyses_completed: Counter,
    pub analyses_failed: Counter,

    // ヒストグラム
    pub classify_duration: Histogram,
    pub analysis_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名のメトリクスが既に登録されている場合はエラーを返す。
    pub fn new(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        Ok(Self {
            issues_received: register_counter_with_registry!(
                "support_signal_issues_received_total",
                "Total number of issues submitted for analysis",
                registry
            )?,
            issues_dropped: register_counter_with_registry!(
                "support_signal_issues_dropped_total",
                "Issues excluded from classification by the batch cap",
                registry
            )?,
            batches_sent: register_counter_with_registry!(
                "support_signal_batches_sent_total",
                "Classification batches sent to the completion service",
                registry
            )?,
            records_parsed: register_counter_with_registry!(
                "support_signal_records_parsed_total",
                "Classified records decoded from model output",
                registry
            )?,
            lines_discarded: register_counter_with_registry!(
                "support_signal_lines_discarded_total",
                "Non-empty model output lines that failed to decode",
                registry
            )?,
            summary_failures: register_counter_with_registry!(
                "support_signal_summary_failures_total",
                "Roll-up summarization calls that degraded to an empty summary",
                registry
            )?,
            analyses_completed: register_counter_with_registry!(
                "support_signal_analyses_completed_total",
                "Analyses that returned a result",
                registry
            )?,
            analyses_failed: register_counter_with_registry!(
                "support_signal_analyses_failed_total",
                "Analyses that returned an error",
                registry
            )?,
            classify_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "support_signal_classify_duration_seconds",
                    "Latency of a single classification batch round-trip"
                )
                .buckets(vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0]),
                registry
            )?,
            analysis_duration: register_histogram_with_registry!(
                HistogramOpts::new(
                    "support_signal_analysis_duration_seconds",
                    "End-to-end latency of an analysis run"
                )
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
                registry
            )?,
        })
    }

    /// テスト用に独立したレジストリへ登録する。
    #[cfg(test)]
    pub(crate) fn for_test() -> Arc<Self> {
        Arc::new(Self::new(Arc::new(Registry::new())).expect("metrics register"))
    }
}
