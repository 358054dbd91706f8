//! Synchronous argument checks applied before any ledger side effect.

use crate::error::CoreError;

/// Maximum accepted length of a transcript session id, in bytes.
pub const MAX_SESSION_LEN: usize = 256;

/// Reject empty, oversized or control-character session identifiers.
pub fn validate_session(session: &str) -> Result<(), CoreError> {
    if session.trim().is_empty() {
        return Err(CoreError::InvalidArgument("session id required".into()));
    }
    if session.len() > MAX_SESSION_LEN {
        return Err(CoreError::InvalidArgument(format!(
            "session id longer than {MAX_SESSION_LEN} bytes"
        )));
    }
    if session.chars().any(char::is_control) {
        return Err(CoreError::InvalidArgument(
            "session id contains control characters".into(),
        ));
    }
    Ok(())
}

/// Reject an empty or whitespace-only command description.
pub fn validate_command(command: &str) -> Result<(), CoreError> {
    if command.trim().is_empty() {
        return Err(CoreError::InvalidArgument("command required".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_session() {
        assert!(validate_session("mic-1").is_ok());
    }

    #[test]
    fn rejects_blank_session() {
        assert!(matches!(
            validate_session("   "),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn rejects_oversized_session() {
        let long = "s".repeat(MAX_SESSION_LEN + 1);
        assert!(validate_session(&long).is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_session("a\nb").is_err());
    }

    #[test]
    fn rejects_empty_command() {
        assert!(validate_command("").is_err());
        assert!(validate_command("flash-device").is_ok());
    }
}
