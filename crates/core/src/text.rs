//! Byte-capped text helpers shared by both ledgers.

/// Return the longest suffix of `text` that fits in `max_bytes`.
///
/// The cut always lands on a `char` boundary, so the result may be a few
/// bytes shorter than `max_bytes` when the boundary falls inside a
/// multi-byte code point. A `max_bytes` of zero means "no cap".
pub fn tail_within(text: &str, max_bytes: usize) -> &str {
    if max_bytes == 0 || text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Append `chunk` to `current` and keep only the last `max_bytes` bytes.
pub fn append_capped(current: &str, chunk: &str, max_bytes: usize) -> String {
    let mut combined = String::with_capacity(current.len() + chunk.len());
    combined.push_str(current);
    combined.push_str(chunk);
    if max_bytes == 0 || combined.len() <= max_bytes {
        return combined;
    }
    tail_within(&combined, max_bytes).to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(tail_within("hello", 10), "hello");
        assert_eq!(tail_within("hello", 5), "hello");
    }

    #[test]
    fn ascii_keeps_exact_suffix() {
        assert_eq!(tail_within("abcdef", 3), "def");
    }

    #[test]
    fn zero_cap_disables_trimming() {
        assert_eq!(tail_within("abcdef", 0), "abcdef");
    }

    #[test]
    fn never_splits_multibyte_code_point() {
        // "é" is two bytes; a cut at 3 bytes from the end would land inside it.
        let text = "aéé";
        let tail = tail_within(text, 3);
        assert_eq!(tail, "é");
        assert!(tail.len() <= 3);
    }

    #[test]
    fn four_byte_code_points_are_dropped_whole() {
        let text = "x🎙🎙";
        let tail = tail_within(text, 6);
        assert_eq!(tail, "🎙");
    }

    #[test]
    fn append_capped_is_suffix_of_concatenation() {
        let out = append_capped("0123456789", "abcdef", 8);
        assert_eq!(out, "89abcdef");
        assert!("0123456789abcdef".ends_with(&out));
    }
}
