use super::types::{Aggregate, ClassifiedItem, Sentiment};

/// 分類レコード全体を畳み込み、カテゴリ別件数と感情別件数を集計する。
///
/// カテゴリは検証せずそのままキーにする。感情は既知の 3 値に完全一致した場合のみ数える。
#[must_use]
pub fn aggregate(records: &[ClassifiedItem]) -> Aggregate {
    records.iter().fold(Aggregate::default(), |mut acc, record| {
        *acc.counts.entry(record.category.clone()).or_insert(0) += 1;
        if let Some(sentiment) = Sentiment::from_label(&record.sentiment) {
            acc.sentiments.increment(sentiment);
        }
        acc
    })
}
