//! Splitting outbound text at Discord's per-message limit.

/// Discord hard limit for message content, in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Splits `text` into consecutive chunks of at most `max_chars` characters.
///
/// Chunks concatenate back to `text` exactly; empty text yields no chunks. Splits fall on
/// character boundaries, never inside a UTF-8 sequence.
pub fn split_message(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let cut = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(remaining.len());
        let (chunk, rest) = remaining.split_at(cut);
        chunks.push(chunk);
        remaining = rest;
    }

    chunks
}
