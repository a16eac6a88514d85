//! Logging helpers with automatic sensitive data redaction.
//!
//! Key material must never reach log output. Hashes and addresses are
//! public, but full hex strings drown out log lines, so they are
//! shortened for display.

use std::fmt;

/// A wrapper that redacts sensitive data when displayed.
pub struct Redacted<T>(pub T);

impl<T: fmt::Display> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: fmt::Debug> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Redact a byte slice, showing only its length.
pub struct RedactedBytes<'a>(pub &'a [u8]);

impl<'a> fmt::Display for RedactedBytes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} bytes]", self.0.len())
    }
}

impl<'a> fmt::Debug for RedactedBytes<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Hex-encode the leading bytes of a hash for log display.
///
/// Shows the first 8 bytes followed by an ellipsis, or the whole value
/// when it is already that short.
pub fn short_hex(bytes: &[u8]) -> String {
    if bytes.len() <= 8 {
        hex::encode(bytes)
    } else {
        format!("{}..", hex::encode(&bytes[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_display() {
        let secret = Redacted("super secret key");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
    }

    #[test]
    fn test_redacted_bytes() {
        let bytes = RedactedBytes(&[1, 2, 3]);
        assert_eq!(format!("{}", bytes), "[3 bytes]");
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(short_hex(&[0xab, 0xcd]), "abcd");
        let hash = [0x11u8; 16];
        assert_eq!(short_hex(&hash), "1111111111111111..");
    }
}
