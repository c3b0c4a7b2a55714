use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::types::{RichText, RichTextSpan, SpanKind};

static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#[A-Za-z0-9]+").unwrap());

/// Splits post text into plain, link and hashtag spans.
///
/// Lines are classified independently. A line starting with an http(s) URL
/// becomes one self-referential link span (followed by a plain `\n` unless it
/// is the last line); any other line is cut around hashtags and its last
/// token gets the line's `\n` back. Concatenating the
/// span texts gives the text that is actually posted.
pub fn compose(text: &str) -> RichText {
    if text.is_empty() {
        return RichText::default();
    }
    let mut builder = SpanBuilder::default();
    let body = text.strip_suffix('\n').unwrap_or(text);
    let mut lines = body.split('\n').peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if is_link_line(trimmed) {
            builder.push(trimmed, SpanKind::Link { uri: trimmed.to_string() });
            if lines.peek().is_some() {
                builder.push("\n", SpanKind::Plain);
            }
            continue;
        }
        let mut last = 0;
        for m in HASHTAG_RE.find_iter(line) {
            builder.push(&line[last..m.start()], SpanKind::Plain);
            let tag = m.as_str();
            builder.push(tag, SpanKind::Tag { tag: tag[1..].to_string() });
            last = m.end();
        }
        // a line ending in a hashtag gets its newline as a separate plain span
        builder.push(&format!("{}\n", &line[last..]), SpanKind::Plain);
    }
    builder.finish()
}

fn is_link_line(trimmed: &str) -> bool {
    trimmed.starts_with("https://") || trimmed.starts_with("http://")
}

#[derive(Default)]
struct SpanBuilder {
    spans: Vec<RichTextSpan>,
    offset: usize,
}

impl SpanBuilder {
    fn push(&mut self, text: &str, kind: SpanKind) {
        if text.is_empty() {
            return;
        }
        let start = self.offset;
        self.offset += text.len();
        self.spans.push(RichTextSpan { text: text.to_string(), range: start..self.offset, kind });
    }

    fn finish(self) -> RichText {
        RichText::new(self.spans)
    }
}
