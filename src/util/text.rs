//! テキスト処理ユーティリティ。

/// 先頭から `max_chars` 文字までを残す。文字境界で切るため UTF-8 を壊さない。
#[must_use]
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// エラーメッセージの最大長
pub(crate) const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// 上流のエラーボディをログ向けに切り詰める。
pub(crate) fn truncate_error_message(msg: &str) -> String {
    let char_count = msg.chars().count();
    if char_count <= MAX_ERROR_MESSAGE_LENGTH {
        return msg.to_string();
    }
    let truncated = truncate_chars(msg, MAX_ERROR_MESSAGE_LENGTH);
    format!("{truncated}... (truncated, {char_count} chars)")
}
