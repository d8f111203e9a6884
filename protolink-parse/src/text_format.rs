//! Parsing of standalone protobuf text format messages.
//!
//! Aggregate option values are parsed with the same grammar, so the option interpreter uses this
//! module to re-read the `aggregate_value` of an uninterpreted option.

use crate::{ast::text_format::Message, ErrorHandler, ParseError};

/// Parses a text format message, collecting every error up to the default limit.
///
/// # Examples
///
/// ```
/// # use protolink_parse::text_format;
/// let message = text_format::parse("value", "foo: 1 bar { baz: 'x' }").unwrap();
/// assert_eq!(message.fields.len(), 2);
/// assert_eq!(message.to_string(), r#"foo: 1 bar { baz: "x" }"#);
/// ```
pub fn parse(name: &str, source: &str) -> Result<Message, ParseError> {
    let mut handler = ErrorHandler::default();
    parse_with_handler(name, source, &mut handler)
}

/// Parses a text format message, passing every error to `handler`.
pub fn parse_with_handler(
    name: &str,
    source: &str,
    handler: &mut ErrorHandler<'_>,
) -> Result<Message, ParseError> {
    log::trace!("parsing text format value '{}'", name);
    crate::parse::parse_text_format(name, source, handler)
}
