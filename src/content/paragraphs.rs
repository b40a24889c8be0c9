use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r" ([,.;:!?])").unwrap());

/// NFC-normalise a paragraph and collapse its whitespace to single spaces.
pub fn clean_paragraph(raw: &str) -> String {
    let normalized: String = raw.nfc().collect();
    let collapsed = RE_WHITESPACE.replace_all(normalized.trim(), " ");
    RE_SPACE_BEFORE_PUNCT
        .replace_all(&collapsed, "$1")
        .into_owned()
}

/// Split text into cleaned paragraphs separated by blank lines. Paragraphs
/// with no visible text are dropped.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            flush(&mut buffer, &mut paragraphs);
        } else {
            buffer.push(line);
        }
    }
    flush(&mut buffer, &mut paragraphs);

    paragraphs
}

fn flush(buffer: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let cleaned = clean_paragraph(&buffer.join("\n"));
    if !cleaned.is_empty() {
        paragraphs.push(cleaned);
    }
    buffer.clear();
}
