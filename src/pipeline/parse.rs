//! Line-oriented decoding of classifier output.
//!
//! Generated text routinely carries preambles, code fences, trailing commentary or a
//! truncated last record. Each line is decoded on its own and failures are dropped.

use super::types::ClassifiedItem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLines {
    pub records: Vec<ClassifiedItem>,
    /// 復元できずに捨てた非空行の数。診断用で、レスポンスには含めない。
    pub discarded: usize,
}

#[must_use]
pub fn parse_lines(raw: &str) -> ParsedLines {
    let mut parsed = ParsedLines::default();

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match serde_json::from_str::<ClassifiedItem>(line) {
            Ok(record) => parsed.records.push(record),
            Err(_) => parsed.discarded += 1,
        }
    }

    parsed
}
