//! Pipeline orchestrator for a single analysis request.

use std::{sync::Arc, time::Instant};

use anyhow::{Context, Result};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    clients::openai::CompletionClient, config::Config, error::AnalyzeError,
    observability::metrics::Metrics,
};

use super::{
    AnalysisSettings,
    aggregate::aggregate,
    batch::plan_batches,
    classify::{ClassifyStage, LlmClassifyStage},
    parse::parse_lines,
    redact::Redactor,
    rollup::{LlmRollupStage, RollupStage},
    types::{AnalysisOutcome, PipelineDiagnostics, PipelineResult, RawIssue},
};

/// Redact → batch → classify/parse per batch → aggregate → roll-up.
///
/// 呼び出しごとにローカルな集計を構築し、リクエスト間で可変状態を共有しない。
pub struct PipelineOrchestrator {
    config: Arc<Config>,
    client: Arc<dyn CompletionClient>,
    redactor: Redactor,
    metrics: Arc<Metrics>,
}

impl PipelineOrchestrator {
    /// # Errors
    /// PII パターンのコンパイルに失敗した場合はエラーを返す。
    pub fn new(
        config: Arc<Config>,
        client: Arc<dyn CompletionClient>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let redactor = Redactor::new().context("failed to compile PII patterns")?;
        Ok(Self {
            config,
            client,
            redactor,
            metrics,
        })
    }

    /// 入力検証と設定解決を行ってから解析を実行する。
    ///
    /// Issue が空、または認証情報が未設定の場合はネットワーク呼び出し前に失敗する。
    ///
    /// # Errors
    /// 入力検証・設定・分類呼び出しのいずれかが失敗した場合は [`AnalyzeError`] を返す。
    /// 要約呼び出しの失敗はエラーにならない。
    pub async fn run(&self, issues: Vec<RawIssue>) -> Result<AnalysisOutcome, AnalyzeError> {
        if issues.is_empty() {
            return Err(AnalyzeError::NoIssues);
        }
        let settings = AnalysisSettings::resolve(&self.config)?;

        let classifier = LlmClassifyStage::new(Arc::clone(&self.client), &settings);
        let rollup = LlmRollupStage::new(Arc::clone(&self.client), &settings);

        let run_id = Uuid::new_v4();
        let span = info_span!("analysis", %run_id, model = %settings.model);
        self.execute(issues, &settings, &classifier, &rollup)
            .instrument(span)
            .await
    }

    pub(crate) async fn execute(
        &self,
        issues: Vec<RawIssue>,
        settings: &AnalysisSettings,
        classifier: &dyn ClassifyStage,
        rollup: &dyn RollupStage,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        let started = Instant::now();
        let outcome = self.drive(issues, settings, classifier, rollup).await;
        self.metrics
            .analysis_duration
            .observe(started.elapsed().as_secs_f64());

        match &outcome {
            Ok(outcome) => {
                self.metrics.analyses_completed.inc();
                info!(
                    records = outcome.result.parsed.len(),
                    batches = outcome.diagnostics.batches_sent,
                    issues_sent = outcome.diagnostics.issues_sent,
                    lines_discarded = outcome.diagnostics.lines_discarded,
                    summary_failed = outcome.diagnostics.summary_failed,
                    elapsed_ms = started.elapsed().as_millis(),
                    "analysis completed"
                );
            }
            Err(error) => {
                self.metrics.analyses_failed.inc();
                warn!(%error, "analysis aborted");
            }
        }

        outcome
    }

    async fn drive(
        &self,
        issues: Vec<RawIssue>,
        settings: &AnalysisSettings,
        classifier: &dyn ClassifyStage,
        rollup: &dyn RollupStage,
    ) -> Result<AnalysisOutcome, AnalyzeError> {
        let received = issues.len();
        self.metrics.issues_received.inc_by(received as f64);
        info!(issues = received, "analysis started");

        let cleaned = self.redactor.clean_all(issues);

        let mut queue = plan_batches(cleaned, settings.batch_size, settings.max_batches);
        let mut diagnostics = PipelineDiagnostics {
            issues_dropped: queue.dropped_issues(),
            ..PipelineDiagnostics::default()
        };
        if diagnostics.issues_dropped > 0 {
            self.metrics
                .issues_dropped
                .inc_by(diagnostics.issues_dropped as f64);
            info!(
                dropped = diagnostics.issues_dropped,
                batches_before_cap = queue.total_before_cap(),
                max_batches = settings.max_batches.get(),
                "issues beyond the batch cap were excluded"
            );
        }

        // One batch in flight at a time; the next is not dequeued until this one resolves.
        let mut parsed = Vec::new();
        while let Some(batch) = queue.pop_next() {
            debug!(batch = batch.index(), size = batch.len(), "sending classification batch");

            let timer = self.metrics.classify_duration.start_timer();
            let raw = classifier.classify(&batch).await;
            timer.observe_duration();
            let raw = raw?;

            diagnostics.batches_sent += 1;
            diagnostics.issues_sent += batch.len();
            self.metrics.batches_sent.inc();

            let lines = parse_lines(&raw);
            debug!(
                batch = batch.index(),
                records = lines.records.len(),
                discarded = lines.discarded,
                "parsed classification batch"
            );
            diagnostics.lines_discarded += lines.discarded;
            self.metrics.records_parsed.inc_by(lines.records.len() as f64);
            self.metrics.lines_discarded.inc_by(lines.discarded as f64);
            parsed.extend(lines.records);
        }

        let aggregate = aggregate(&parsed);

        let summary = rollup.summarize(&aggregate).await;
        if summary.failed {
            self.metrics.summary_failures.inc();
        }
        diagnostics.summary_failed = summary.failed;

        Ok(AnalysisOutcome {
            result: PipelineResult {
                parsed,
                counts: aggregate.counts,
                sentiments: aggregate.sentiments,
                exec_summary: summary.summary,
            },
            diagnostics,
        })
    }
}
