use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 呼び出し元から受け取った未加工の Issue。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawIssue {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
}

impl RawIssue {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// 本文が切り詰められ、PII が除去された Issue。Redactor だけが生成する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub(crate) title: String,
    pub(crate) body: String,
}

impl Issue {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// モデル出力の 1 行から復元された分類レコード。
///
/// `category` は名目上の列挙値に限定されず、モデルが返した文字列をそのまま保持する。
/// `sentiment` が欠けている、または `null` の行も件数には数える（感情の集計からは外れる）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedItem {
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sentiment: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub root_cause: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// 完全一致のみ受け付ける。大文字小文字や空白の正規化はしない。
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Negative" => Some(Self::Negative),
            "Neutral" => Some(Self::Neutral),
            "Positive" => Some(Self::Positive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SentimentTally {
    #[serde(default)]
    pub negative: u64,
    #[serde(default)]
    pub neutral: u64,
    #[serde(default)]
    pub positive: u64,
}

impl SentimentTally {
    pub(crate) fn increment(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Positive => self.positive += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.negative + self.neutral + self.positive
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub counts: BTreeMap<String, u64>,
    pub sentiments: SentimentTally,
}

/// 呼び出し元へ返す解析結果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub parsed: Vec<ClassifiedItem>,
    pub counts: BTreeMap<String, u64>,
    pub sentiments: SentimentTally,
    pub exec_summary: String,
}

/// レスポンスには含めない実行時の診断値。ログとメトリクスにだけ流す。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineDiagnostics {
    pub batches_sent: usize,
    pub issues_sent: usize,
    pub issues_dropped: usize,
    pub lines_discarded: usize,
    pub summary_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub result: PipelineResult,
    pub diagnostics: PipelineDiagnostics,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}
