//! Octal-escape decoding for mountinfo path fields.
//!
//! The kernel escapes space, tab, newline and backslash in mountinfo path
//! fields as `\NNN` with exactly three octal digits. Only that form is an
//! escape; a backslash followed by anything else is malformed.

/// Errors that may occur while decoding `\NNN` escapes.
#[derive(Debug, thiserror::Error)]
pub enum EscapeError {
    #[error("truncated escape at byte {offset}: `\\` must be followed by three octal digits")]
    Truncated { offset: usize },

    #[error("invalid escape digits `{digits}` at byte {offset}")]
    BadDigits { digits: String, offset: usize },
}

/// Decodes every `\NNN` sequence in `input` to the byte it names.
///
/// Returns raw bytes: an escape may name any byte value, including ones
/// that do not form valid UTF-8 on their own.
pub(crate) fn unescape_octal(input: &str) -> Result<Vec<u8>, EscapeError> {
    let mut out = Vec::with_capacity(input.len());
    let mut rest = input.as_bytes();
    let mut offset = 0;

    loop {
        let Some(backslash) = rest.iter().position(|&b| b == b'\\') else {
            out.extend_from_slice(rest);
            return Ok(out);
        };
        out.extend_from_slice(&rest[..backslash]);
        if backslash + 3 >= rest.len() {
            return Err(EscapeError::Truncated {
                offset: offset + backslash,
            });
        }
        let digit_bytes = &rest[backslash + 1..backslash + 4];
        let bad_digits = || EscapeError::BadDigits {
            digits: String::from_utf8_lossy(digit_bytes).into_owned(),
            offset: offset + backslash,
        };
        let digits = std::str::from_utf8(digit_bytes).map_err(|_| bad_digits())?;
        let value = u8::from_str_radix(digits, 8).map_err(|_| bad_digits())?;
        out.push(value);
        rest = &rest[backslash + 4..];
        offset += backslash + 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_unescaped_text() {
        assert_eq!(unescape_octal("abcd/def").unwrap(), b"abcd/def");
        assert_eq!(unescape_octal("").unwrap(), b"");
        assert_eq!(unescape_octal("111").unwrap(), b"111");
    }

    #[test]
    fn decodes_known_escapes() {
        assert_eq!(unescape_octal("111\\134").unwrap(), b"111\\");
        assert_eq!(unescape_octal("111\\040").unwrap(), b"111 ");
        assert_eq!(unescape_octal("a\\011b").unwrap(), b"a\tb");
    }

    #[test]
    fn every_byte_round_trips() {
        for b in 0u16..256 {
            let encoded = format!("\\{:03o}", b);
            let decoded = unescape_octal(&encoded).unwrap();
            assert_eq!(decoded, vec![b as u8], "byte {b} did not round-trip");
        }
    }

    #[test]
    fn truncated_escape_fails() {
        let err = unescape_octal("111\\13").unwrap_err();
        match err {
            EscapeError::Truncated { offset } => assert_eq!(offset, 3),
            other => panic!("expected Truncated, got {other:?}"),
        }
    }

    #[test]
    fn non_octal_digits_fail() {
        let err = unescape_octal("111\\049").unwrap_err();
        match err {
            EscapeError::BadDigits { digits, offset } => {
                assert_eq!(digits, "049");
                assert_eq!(offset, 3);
            }
            other => panic!("expected BadDigits, got {other:?}"),
        }
    }
}
