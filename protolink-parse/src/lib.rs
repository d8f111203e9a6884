//! Parsing of protobuf source files.
//!
//! The entry points are [`parse()`], which converts source text straight into an uninterpreted
//! [`FileDescriptorProto`], and [`parse_file()`], which additionally returns the lossless
//! [`ast::File`] and routes every error through a caller-supplied [`ErrorHandler`].
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/protolink-parse/0.1.0/")]

use logos::Span;
use prost_types::FileDescriptorProto;

pub mod ast;
pub mod case;
mod error;
pub mod escape;
mod generate;
mod lex;
mod lines;
mod parse;
pub mod reporter;
pub mod tag;
pub mod text_format;
#[cfg(test)]
mod tests;

pub use self::error::ParseError;
use self::error::ParseErrorKind;
pub use self::lines::span_to_offsets;
pub use self::reporter::{
    Abort, BoxError, ErrorHandler, FailFast, PositionedError, Reporter, DEFAULT_ERROR_LIMIT,
};

/// The largest field number a message field may have.
pub const MAX_MESSAGE_FIELD_NUMBER: i32 = 536_870_911;

const MAX_FILE_LEN: usize = i32::MAX as usize;

/// The result of [`parse_file()`]: the syntax tree of a file, and the descriptor built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFile {
    /// The lossless syntax tree, including comments.
    pub ast: ast::File,
    /// The uninterpreted descriptor, with source code info.
    pub descriptor: FileDescriptorProto,
}

/// Parses a single protobuf source file into a [`FileDescriptorProto`].
///
/// This function only looks at the syntax of the file, without resolving type names, reading
/// imported files or interpreting options. Every error in the file is collected, up to
/// [`DEFAULT_ERROR_LIMIT`].
///
/// # Examples
///
/// ```
/// # use protolink_parse::parse;
/// # use prost_types::{DescriptorProto, FieldDescriptorProto, field_descriptor_proto::Label};
/// #
/// let source = r#"
///     syntax = "proto3";
///     import "dep.proto";
///
///     message Foo {
///         Bar bar = 1;
///     }
/// "#;
/// let file_descriptor = parse("foo.proto", source).unwrap();
/// assert_eq!(file_descriptor.name(), "foo.proto");
/// assert_eq!(file_descriptor.dependency, vec!["dep.proto".to_owned()]);
/// assert_eq!(file_descriptor.message_type, vec![DescriptorProto {
///     name: Some("Foo".to_owned()),
///     field: vec![FieldDescriptorProto {
///         label: Some(Label::Optional as _),
///         name: Some("bar".to_owned()),
///         number: Some(1),
///         type_name: Some("Bar".to_owned()),
///         json_name: Some("bar".to_owned()),
///         ..Default::default()
///     }],
///     ..Default::default()
/// }]);
/// ```
pub fn parse(name: &str, source: &str) -> Result<FileDescriptorProto, ParseError> {
    let mut handler = ErrorHandler::default();
    parse_file(name, source, &mut handler).map(|file| file.descriptor)
}

/// Parses a single protobuf source file into its syntax tree.
///
/// Every error is passed to `handler`. Parsing continues after recoverable errors until the
/// handler's limit is exceeded or its reporter returns an error.
pub fn parse_ast(
    name: &str,
    source: &str,
    handler: &mut ErrorHandler<'_>,
) -> Result<ast::File, ParseError> {
    log::debug!("parsing file '{}'", name);

    if source.len() > MAX_FILE_LEN {
        let abort = handler
            .report(PositionedError::new(name, 1, 1, "file is too large"))
            .err();
        return Err(ParseError::new(
            vec![ParseErrorKind::FileTooLarge],
            name,
            String::new(),
            abort,
        ));
    }

    let result = parse::parse_file(name, source, handler);
    log::debug!(
        "parsed file '{}' with {} errors",
        name,
        handler.error_count()
    );
    result
}

/// Parses a single protobuf source file, returning both its syntax tree and the uninterpreted
/// descriptor built from it.
pub fn parse_file(
    name: &str,
    source: &str,
    handler: &mut ErrorHandler<'_>,
) -> Result<ParsedFile, ParseError> {
    let ast = parse_ast(name, source, handler)?;
    let descriptor = generate(&ast, name, source);
    Ok(ParsedFile { ast, descriptor })
}

/// Builds the uninterpreted descriptor for a syntax tree.
///
/// `source` must be the text `file` was parsed from, and is used to compute the line and column
/// numbers in the source code info.
pub fn generate(file: &ast::File, name: &str, source: &str) -> FileDescriptorProto {
    generate::generate_file(file, name, source)
}

fn index_to_i32(index: usize) -> i32 {
    // All files parsed are at most i32::MAX bytes long, so the indices of any definitions in a
    // single file must fit into an i32.
    index.try_into().unwrap()
}

fn join_span(start: Span, end: Span) -> Span {
    start.start..end.end
}
