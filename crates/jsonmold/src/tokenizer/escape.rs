//! Validation and decoding of backslash escapes inside strings.
//!
//! The tokenizer only validates escapes ([`scan`]); decoding happens when a
//! caller actually asks for the string ([`unescape`]), so strings that are
//! skipped or compared against ASCII field names never allocate.

use super::char_at;
use crate::error::{Expected, SyntaxErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// A valid escape of this many bytes.
    Len(usize),
    /// The window ends inside the escape.
    NeedMore(Expected),
    /// Invalid escape; `at` is relative to the backslash.
    Invalid { at: usize, kind: SyntaxErrorKind },
}

const HIGH_SURROGATES: core::ops::RangeInclusive<u32> = 0xD800..=0xDBFF;
const LOW_SURROGATES: core::ops::RangeInclusive<u32> = 0xDC00..=0xDFFF;

/// Decodes four hex digits.
pub(crate) fn hex4(bytes: &[u8]) -> Option<u32> {
    let digits = bytes.get(..4)?;
    digits.iter().try_fold(0u32, |acc, &b| {
        let digit = char::from(b).to_digit(16)?;
        Some(acc << 4 | digit)
    })
}

/// Checks that four hex digits start at `from`.
fn scan_hex(bytes: &[u8], from: usize) -> Result<u32, Scan> {
    for index in from..from + 4 {
        match bytes.get(index) {
            None => return Err(Scan::NeedMore(Expected::HexDigit)),
            Some(b) if b.is_ascii_hexdigit() => {}
            Some(_) => {
                return Err(Scan::Invalid {
                    at: index,
                    kind: SyntaxErrorKind::UnexpectedCharacter {
                        found: char_at(bytes, index),
                        expected: Expected::HexDigit,
                    },
                });
            }
        }
    }
    hex4(&bytes[from..]).ok_or(Scan::NeedMore(Expected::HexDigit))
}

/// Validates the escape that starts with the backslash at `bytes[0]`.
pub(crate) fn scan(bytes: &[u8]) -> Scan {
    match bytes.get(1) {
        None => Scan::NeedMore(Expected::StringCharacter),
        Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => Scan::Len(2),
        Some(b'u') => match scan_unicode(bytes) {
            Ok(len) => Scan::Len(len),
            Err(scan) => scan,
        },
        Some(_) => Scan::Invalid {
            at: 1,
            kind: SyntaxErrorKind::InvalidEscape(char_at(bytes, 1)),
        },
    }
}

fn scan_unicode(bytes: &[u8]) -> Result<usize, Scan> {
    let code = scan_hex(bytes, 2)?;
    let lone = Scan::Invalid {
        at: 0,
        kind: SyntaxErrorKind::InvalidUnicodeEscape(code),
    };
    if LOW_SURROGATES.contains(&code) {
        return Err(lone);
    }
    if !HIGH_SURROGATES.contains(&code) {
        return Ok(6);
    }
    match (bytes.get(6), bytes.get(7)) {
        (None, _) | (Some(b'\\'), None) => return Err(Scan::NeedMore(Expected::StringCharacter)),
        (Some(b'\\'), Some(b'u')) => {}
        _ => return Err(lone),
    }
    let low = scan_hex(bytes, 8)?;
    if LOW_SURROGATES.contains(&low) {
        Ok(12)
    } else {
        Err(lone)
    }
}

/// Appends the decoded form of a validated string payload to `out`.
pub(crate) fn unescape(raw: &[u8], out: &mut String) -> Result<(), SyntaxErrorKind> {
    let mut rest = raw;
    while let Some(at) = memchr::memchr(b'\\', rest) {
        out.push_str(std::str::from_utf8(&rest[..at]).map_err(|_| SyntaxErrorKind::InvalidUtf8)?);
        let escape = &rest[at..];
        let len = match escape.get(1) {
            Some(b'"') => push(out, '"', 2),
            Some(b'\\') => push(out, '\\', 2),
            Some(b'/') => push(out, '/', 2),
            Some(b'b') => push(out, '\u{8}', 2),
            Some(b'f') => push(out, '\u{c}', 2),
            Some(b'n') => push(out, '\n', 2),
            Some(b'r') => push(out, '\r', 2),
            Some(b't') => push(out, '\t', 2),
            Some(b'u') => {
                let code = hex4(&escape[2..]).ok_or(SyntaxErrorKind::InvalidEscape('u'))?;
                if HIGH_SURROGATES.contains(&code) {
                    let low = escape
                        .get(8..)
                        .and_then(hex4)
                        .ok_or(SyntaxErrorKind::InvalidUnicodeEscape(code))?;
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    let c = char::from_u32(combined)
                        .ok_or(SyntaxErrorKind::InvalidUnicodeEscape(code))?;
                    push(out, c, 12)
                } else {
                    let c = char::from_u32(code).ok_or(SyntaxErrorKind::InvalidUnicodeEscape(code))?;
                    push(out, c, 6)
                }
            }
            Some(&other) => return Err(SyntaxErrorKind::InvalidEscape(char::from(other))),
            None => return Err(SyntaxErrorKind::InvalidEscape('\\')),
        };
        rest = &escape[len..];
    }
    out.push_str(std::str::from_utf8(rest).map_err(|_| SyntaxErrorKind::InvalidUtf8)?);
    Ok(())
}

fn push(out: &mut String, c: char, len: usize) -> usize {
    out.push(c);
    len
}

#[cfg(test)]
mod tests {
    use super::{Scan, hex4, scan, unescape};
    use crate::error::{Expected, SyntaxErrorKind};

    fn decoded(raw: &str) -> String {
        let mut out = String::new();
        unescape(raw.as_bytes(), &mut out).unwrap();
        out
    }

    #[test]
    fn hex_digits() {
        assert_eq!(hex4(b"0041"), Some(0x41));
        assert_eq!(hex4(b"AbCd"), Some(0xABCD));
        assert_eq!(hex4(b"12"), None);
        assert_eq!(hex4(b"12G4"), None);
    }

    #[test]
    fn simple_escapes() {
        assert_eq!(scan(br#"\n"#), Scan::Len(2));
        assert_eq!(scan(br#"\/"#), Scan::Len(2));
        assert_eq!(
            scan(br#"\x"#),
            Scan::Invalid {
                at: 1,
                kind: SyntaxErrorKind::InvalidEscape('x')
            }
        );
        assert_eq!(scan(b"\\"), Scan::NeedMore(Expected::StringCharacter));
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(scan(br#"\u00e9"#), Scan::Len(6));
        assert_eq!(scan(br#"\u00"#), Scan::NeedMore(Expected::HexDigit));
        assert_eq!(scan(br#"\ud83d\ude00"#), Scan::Len(12));
        assert_eq!(scan(br#"\ud83d\u"#), Scan::NeedMore(Expected::HexDigit));
        assert_eq!(scan(br#"\ud83d"#), Scan::NeedMore(Expected::StringCharacter));
        assert_eq!(
            scan(br#"\ude00"#),
            Scan::Invalid {
                at: 0,
                kind: SyntaxErrorKind::InvalidUnicodeEscape(0xDE00)
            }
        );
        assert_eq!(
            scan(br#"\ud83dx"#),
            Scan::Invalid {
                at: 0,
                kind: SyntaxErrorKind::InvalidUnicodeEscape(0xD83D)
            }
        );
        assert!(matches!(
            scan(br#"\u12G4"#),
            Scan::Invalid {
                at: 4,
                kind: SyntaxErrorKind::UnexpectedCharacter { found: 'G', .. }
            }
        ));
    }

    #[test]
    fn decodes_payloads() {
        assert_eq!(decoded("plain"), "plain");
        assert_eq!(decoded(r#"a\"b\\c\/d"#), "a\"b\\c/d");
        assert_eq!(decoded(r"tab\there\r\n"), "tab\there\r\n");
        assert_eq!(decoded(r"\u0041\u00e9"), "Aé");
        assert_eq!(decoded(r"smile \ud83d\ude00!"), "smile 😀!");
    }
}
