/// Trim text to at most `max_chars` characters, appending an ellipsis if trimmed.
/// Uses char-aware slicing to avoid breaking UTF-8 sequences.
pub fn trim_with_ellipsis(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut s: String = text.chars().take(max_chars - 1).collect();
    s.push('…');
    s
}

/// Однострочное превью поста для логов
pub fn log_preview(text: &str, max_chars: usize) -> String {
    trim_with_ellipsis(&text.replace('\n', " ⏎ "), max_chars)
}
