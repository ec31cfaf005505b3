use std::{collections::VecDeque, num::NonZeroUsize};

use super::types::Issue;

/// 1 回の分類リクエストに載せる Issue 数。
pub const BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(30) {
    Some(size) => size,
    None => NonZeroUsize::MIN,
};

/// 元の順序を保った連続する Issue のまとまり。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    index: usize,
    issues: Vec<Issue>,
}

impl Batch {
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Batches are drained front to back, one at a time; the queue never hands out
/// two batches concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQueue {
    pending: VecDeque<Batch>,
    total_before_cap: usize,
    dropped_issues: usize,
}

impl BatchQueue {
    pub fn pop_next(&mut self) -> Option<Batch> {
        self.pending.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 上限適用前のバッチ数 (`ceil(N / batch_size)`)。
    #[must_use]
    pub fn total_before_cap(&self) -> usize {
        self.total_before_cap
    }

    /// 上限を超えたため分類に送られない Issue 数。
    #[must_use]
    pub fn dropped_issues(&self) -> usize {
        self.dropped_issues
    }

    #[must_use]
    pub fn retained_issues(&self) -> usize {
        self.pending.iter().map(Batch::len).sum()
    }
}

/// Issue 列を `batch_size` ごとに分割し、先頭 `max_batches` 個だけを残す。
///
/// 上限を超えた分はエラーにせず黙って除外する。除外数は [`BatchQueue::dropped_issues`] で参照できる。
#[must_use]
pub fn plan_batches(
    issues: Vec<Issue>,
    batch_size: NonZeroUsize,
    max_batches: NonZeroUsize,
) -> BatchQueue {
    let total_issues = issues.len();
    let total_before_cap = total_issues.div_ceil(batch_size.get());

    let mut pending = VecDeque::with_capacity(total_before_cap.min(max_batches.get()));
    let mut remaining = issues.into_iter();
    for index in 0..max_batches.get() {
        let chunk: Vec<Issue> = remaining.by_ref().take(batch_size.get()).collect();
        if chunk.is_empty() {
            break;
        }
        pending.push_back(Batch {
            index,
            issues: chunk,
        });
    }

    let retained: usize = pending.iter().map(Batch::len).sum();

    BatchQueue {
        pending,
        total_before_cap,
        dropped_issues: total_issues - retained,
    }
}
