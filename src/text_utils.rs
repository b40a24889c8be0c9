//! Text splitting helpers for speech submission.
//!
//! Some speech engines truncate or mangle long inputs, so paragraphs are cut
//! into bounded chunks before being spoken. Chunks only ever break on
//! whitespace, which keeps the word sequence intact.

/// Default upper bound, in characters, for one submitted utterance.
pub const DEFAULT_CHUNK_MAX_CHARS: usize = 200;

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Words are packed greedily. When a chunk fills up, the break is pulled back
/// to the last sentence end inside it, as long as the chunk stays at least
/// half full. A single word longer than `max_chars` is emitted as-is.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut words: Vec<&str> = Vec::new();
    let mut len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        while !words.is_empty() && len + 1 + word_len > max_chars {
            let keep = sentence_break(&words, max_chars).unwrap_or(words.len());
            let rest = words.split_off(keep);
            chunks.push(words.join(" "));
            words = rest;
            len = joined_len(&words);
        }
        len = if words.is_empty() { word_len } else { len + 1 + word_len };
        words.push(word);
    }

    if !words.is_empty() {
        chunks.push(words.join(" "));
    }

    chunks
}

/// Index just past the last sentence-ending word, if breaking there keeps the
/// chunk at least half of `max_chars`.
fn sentence_break(words: &[&str], max_chars: usize) -> Option<usize> {
    let mut len = 0usize;
    let mut best = None;
    for (idx, word) in words.iter().enumerate() {
        len += word.chars().count() + usize::from(idx > 0);
        if ends_sentence(word) && len * 2 >= max_chars {
            best = Some(idx + 1);
        }
    }
    best.filter(|keep| *keep < words.len())
}

fn joined_len(words: &[&str]) -> usize {
    words.iter().map(|w| w.chars().count()).sum::<usize>() + words.len().saturating_sub(1)
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '”', '’', '»', '」', '』']);
    trimmed.ends_with(['.', '!', '?', '…', '。', '！', '？'])
}
