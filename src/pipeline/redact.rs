//! PII redaction applied to issue bodies before anything leaves the process.

use regex::Regex;

use crate::util::text::truncate_chars;

use super::types::{Issue, RawIssue};

/// 本文の最大文字数。切り詰めてから PII 除去を行う。
pub(crate) const MAX_BODY_CHARS: usize = 900;

// ASCII word boundaries: CJK text directly before a match must not suppress it.
const EMAIL_PATTERN: &str = r"(?i-u)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b";
const CARD_PATTERN: &str = r"(?-u)\b[0-9]{13,19}\b";
const SSN_PATTERN: &str = r"(?-u)\b[0-9]{3}-?[0-9]{2}-?[0-9]{4}\b";

/// Ordered replacement table. Later patterns run on the output of earlier ones.
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<(Regex, &'static str)>,
}

impl Redactor {
    /// # Errors
    /// パターンのコンパイルに失敗した場合はエラーを返す。
    pub fn new() -> Result<Self, regex::Error> {
        let rules = vec![
            (Regex::new(EMAIL_PATTERN)?, "[EMAIL]"),
            (Regex::new(CARD_PATTERN)?, "[CARD]"),
            (Regex::new(SSN_PATTERN)?, "[SSN]"),
        ];
        Ok(Self { rules })
    }

    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |current, (pattern, placeholder)| {
                pattern.replace_all(&current, *placeholder).into_owned()
            })
    }

    /// 本文を切り詰めてから PII を除去する。タイトルはそのまま通す。
    #[must_use]
    pub fn clean(&self, issue: RawIssue) -> Issue {
        let body = self.redact(&truncate_chars(&issue.body, MAX_BODY_CHARS));
        Issue {
            title: issue.title,
            body,
        }
    }

    #[must_use]
    pub fn clean_all(&self, issues: Vec<RawIssue>) -> Vec<Issue> {
        issues.into_iter().map(|issue| self.clean(issue)).collect()
    }
}
