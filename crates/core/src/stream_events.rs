//! Wire-level markers and broadcast message types for streamed operations.
//!
//! The terminal sentinel travels through the relay channel as an out-of-band
//! enum variant; these strings are only how it is rendered to a WebSocket
//! client, one marker per route so that clients can tell streams apart.

/// Sent after the last line of a device imaging stream.
pub const DONE_MARKER_FLASH: &str = "[[BLACKROAD_DONE]]";

/// Sent after the last token line of a model inference stream.
pub const DONE_MARKER_MODEL: &str = "[[BLACKROAD_MODEL_DONE]]";

/// Sent after the last line of a transcription stream.
pub const DONE_MARKER_WHISPER: &str = "[[BLACKROAD_WHISPER_DONE]]";

/// Prefix for diagnostic lines produced by the streaming core itself.
pub const DIAGNOSTIC_PREFIX: &str = "[error]";

/// A line relayed from a live stream, published to log subscribers.
pub const MSG_TYPE_STREAM_LINE: &str = "stream.line";

/// A stream reached its terminal state.
pub const MSG_TYPE_STREAM_DONE: &str = "stream.done";

/// Format a diagnostic line. The result never collides with a done marker.
pub fn diagnostic_line(message: impl std::fmt::Display) -> String {
    format!("{DIAGNOSTIC_PREFIX} {message}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_line_uses_prefix() {
        assert_eq!(
            diagnostic_line("whisper.cpp binary not found"),
            "[error] whisper.cpp binary not found"
        );
    }

    #[test]
    fn done_markers_are_distinct() {
        let markers = [DONE_MARKER_FLASH, DONE_MARKER_MODEL, DONE_MARKER_WHISPER];
        for (i, a) in markers.iter().enumerate() {
            for b in &markers[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
