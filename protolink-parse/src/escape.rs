//! Escaping of byte strings for use in protobuf source and text format.

use std::fmt::{self, Write};

/// Formats bytes using C-style escapes, as protoc does for string default values.
///
/// Printable ASCII is written as-is, the common control characters use their short escapes and
/// everything else is written as a three digit octal escape.
#[derive(Debug, Clone, Copy)]
pub struct CEscaped<'a>(pub &'a [u8]);

impl<'a> fmt::Display for CEscaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &ch in self.0 {
            match ch {
                b'\t' => f.write_str("\\t")?,
                b'\r' => f.write_str("\\r")?,
                b'\n' => f.write_str("\\n")?,
                b'\\' => f.write_str("\\\\")?,
                b'\'' => f.write_str("\\'")?,
                b'"' => f.write_str("\\\"")?,
                b'\x20'..=b'\x7e' => f.write_char(ch as char)?,
                _ => write!(f, "\\{:03o}", ch)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes() {
        assert_eq!(CEscaped(b"hello").to_string(), "hello");
        assert_eq!(CEscaped(b"a\"b'c\\").to_string(), "a\\\"b\\'c\\\\");
        assert_eq!(CEscaped(b"\t\r\n").to_string(), "\\t\\r\\n");
        assert_eq!(CEscaped(b"\x00\x7f\xff").to_string(), "\\000\\177\\377");
        assert_eq!(CEscaped("é".as_bytes()).to_string(), "\\303\\251");
    }
}
