use std::fmt;

use miette::{Diagnostic, NamedSource, SourceCode};
use thiserror::Error;

use crate::{reporter::Abort, Span, MAX_MESSAGE_FIELD_NUMBER};

/// An error that may occur while parsing a protobuf source file.
///
/// The error holds every error reported while parsing the file. The first error is the primary
/// diagnostic, and the remainder are available through [`Diagnostic::related`].
#[derive(Diagnostic)]
#[diagnostic(forward(kind))]
pub struct ParseError {
    kind: Box<ParseErrorKind>,
    #[related]
    related: Vec<ParseErrorKind>,
    #[source_code]
    source_code: NamedSource<String>,
    abort: Option<Abort>,
}

#[derive(Error, Debug, Diagnostic, PartialEq)]
pub(crate) enum ParseErrorKind {
    #[error("invalid token")]
    InvalidToken {
        #[label("found here")]
        span: Span,
    },
    #[error("integer is too large")]
    IntegerOutOfRange {
        #[label("integer defined here")]
        span: Span,
    },
    #[error("invalid string character")]
    InvalidStringCharacters {
        #[label("invalid characters")]
        span: Span,
    },
    #[error("unterminated string")]
    UnterminatedString {
        #[label("string starts here")]
        span: Span,
    },
    #[error("invalid string escape")]
    InvalidStringEscape {
        #[label("defined here")]
        span: Span,
    },
    #[error("string is not valid utf-8")]
    InvalidUtf8String {
        #[label("defined here")]
        span: Span,
    },
    #[error("nested block comments are not supported")]
    NestedBlockComment {
        #[label("defined here")]
        span: Span,
    },
    #[error("unterminated block comment")]
    UnterminatedBlockComment {
        #[label("comment starts here")]
        span: Span,
    },
    #[error("unknown syntax '{syntax}'")]
    #[diagnostic(help("possible values are 'proto2' and 'proto3'"))]
    UnknownSyntax {
        syntax: String,
        #[label("defined here")]
        span: Span,
    },
    #[error("invalid identifier")]
    #[diagnostic(help("identifiers must consist of letters, numbers and underscores, and may not start with a number"))]
    InvalidIdentifier {
        #[label("defined here")]
        span: Span,
    },
    #[error("invalid group name")]
    #[diagnostic(help(
        "group names must consist of a capital letter followed by letters, numbers and underscores"
    ))]
    InvalidGroupName {
        #[label("defined here")]
        span: Span,
    },
    #[error("invalid import path")]
    #[diagnostic(help(
        "imports may not contain backslashes, repeated forward slashes, '.' or '..' components"
    ))]
    InvalidImport {
        #[label("defined here")]
        span: Span,
    },
    #[error("multiple package names specified")]
    DuplicatePackage {
        #[label("defined here…")]
        first: Span,
        #[label("…and again here")]
        second: Span,
    },
    #[error("whitespace is required between an integer literal and an identifier")]
    NoSpaceBetweenIntAndIdent {
        #[label("found here")]
        span: Span,
    },
    #[error("'#' comments are not allowed here")]
    HashCommentOutsideTextFormat {
        #[label("found here")]
        span: Span,
    },
    #[error("'f' suffix for float literals is not allowed")]
    FloatSuffixOutsideTextFormat {
        #[label("found here")]
        span: Span,
    },
    #[error("expected {expected}, but found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("found here")]
        span: Span,
    },
    #[error("expected {expected}, but reached end of file")]
    UnexpectedEof {
        expected: String,
        #[label("end of file")]
        span: Span,
    },
    #[error("identifiers may not be negative")]
    #[diagnostic(help("only 'inf' and 'nan' may be negated"))]
    NegativeIdentOutsideDefault {
        #[label("found here")]
        span: Span,
    },
    #[error("message numbers must be between 1 and {}", MAX_MESSAGE_FIELD_NUMBER)]
    InvalidMessageNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("enum numbers must be between {} and {}", i32::MIN, i32::MAX)]
    InvalidEnumNumber {
        #[label("defined here")]
        span: Span,
    },
    #[error("range end must not be less than the start")]
    InvalidRange {
        #[label("defined here")]
        span: Span,
    },
    #[error("{kind} fields are not allowed in extensions")]
    InvalidExtendFieldKind {
        kind: &'static str,
        #[label("defined here")]
        span: Span,
    },
    #[error("extension fields may not be required")]
    RequiredExtendField {
        #[label("defined here")]
        span: Span,
    },
    #[error("map fields cannot have labels")]
    MapFieldWithLabel {
        #[label("defined here")]
        span: Span,
    },
    #[error("oneof fields cannot have labels")]
    OneofFieldWithLabel {
        #[label("defined here")]
        span: Span,
    },
    #[error("fields must have a label with proto2 syntax (expected one of 'optional', 'repeated' or 'required')")]
    Proto2FieldMissingLabel {
        #[label("field defined here")]
        span: Span,
    },
    #[error("groups are not allowed in proto3 syntax")]
    Proto3GroupField {
        #[label("defined here")]
        span: Span,
    },
    #[error("required fields are not allowed in proto3 syntax")]
    Proto3RequiredField {
        #[label("defined here")]
        span: Span,
    },
    #[error("{kind} fields are not allowed in a oneof")]
    InvalidOneofFieldKind {
        kind: &'static str,
        #[label("defined here")]
        span: Span,
    },
    #[error("a map field key type must be an integer, boolean or string")]
    InvalidMapFieldKeyType {
        #[label("defined here")]
        span: Span,
    },
    #[error("a oneof must have at least one field")]
    EmptyOneof {
        #[label("defined here")]
        span: Span,
    },
    #[error("expected ':' after scalar text format field")]
    MissingColonForScalarTextFormatField {
        #[label("field name defined here")]
        field_name: Span,
    },
    #[error("file is too large")]
    #[diagnostic(help("the maximum file length is 2,147,483,647 bytes"))]
    FileTooLarge,
}

impl ParseErrorKind {
    pub(crate) fn span(&self) -> Option<Span> {
        match self {
            ParseErrorKind::InvalidToken { span }
            | ParseErrorKind::IntegerOutOfRange { span }
            | ParseErrorKind::InvalidStringCharacters { span }
            | ParseErrorKind::UnterminatedString { span }
            | ParseErrorKind::InvalidStringEscape { span }
            | ParseErrorKind::InvalidUtf8String { span }
            | ParseErrorKind::NestedBlockComment { span }
            | ParseErrorKind::UnterminatedBlockComment { span }
            | ParseErrorKind::UnknownSyntax { span, .. }
            | ParseErrorKind::InvalidIdentifier { span }
            | ParseErrorKind::InvalidGroupName { span }
            | ParseErrorKind::InvalidImport { span }
            | ParseErrorKind::DuplicatePackage { second: span, .. }
            | ParseErrorKind::NoSpaceBetweenIntAndIdent { span }
            | ParseErrorKind::HashCommentOutsideTextFormat { span }
            | ParseErrorKind::FloatSuffixOutsideTextFormat { span }
            | ParseErrorKind::UnexpectedToken { span, .. }
            | ParseErrorKind::UnexpectedEof { span, .. }
            | ParseErrorKind::NegativeIdentOutsideDefault { span }
            | ParseErrorKind::InvalidMessageNumber { span }
            | ParseErrorKind::InvalidEnumNumber { span }
            | ParseErrorKind::InvalidRange { span }
            | ParseErrorKind::InvalidExtendFieldKind { span, .. }
            | ParseErrorKind::RequiredExtendField { span }
            | ParseErrorKind::MapFieldWithLabel { span }
            | ParseErrorKind::OneofFieldWithLabel { span }
            | ParseErrorKind::Proto2FieldMissingLabel { span }
            | ParseErrorKind::Proto3GroupField { span }
            | ParseErrorKind::Proto3RequiredField { span }
            | ParseErrorKind::InvalidOneofFieldKind { span, .. }
            | ParseErrorKind::InvalidMapFieldKeyType { span }
            | ParseErrorKind::EmptyOneof { span }
            | ParseErrorKind::MissingColonForScalarTextFormatField { field_name: span } => {
                Some(span.clone())
            }
            ParseErrorKind::FileTooLarge => None,
        }
    }
}

impl ParseError {
    pub(crate) fn new(
        mut related: Vec<ParseErrorKind>,
        name: &str,
        source: String,
        abort: Option<Abort>,
    ) -> Self {
        debug_assert!(!related.is_empty());
        let kind = if related.is_empty() {
            ParseErrorKind::UnexpectedEof {
                expected: "a complete file".to_owned(),
                span: source.len()..source.len(),
            }
        } else {
            related.remove(0)
        };

        ParseError {
            kind: Box::new(kind),
            related,
            source_code: NamedSource::new(name, source),
            abort,
        }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(mut self) -> Vec<ParseErrorKind> {
        self.related.insert(0, *self.kind);
        self.related
    }

    /// Gets the name of the file in which this error occurred.
    pub fn file(&self) -> &str {
        self.source_code.name()
    }

    /// Gets the primary source code span associated with this error, if any.
    pub fn span(&self) -> Option<Span> {
        self.kind.span()
    }

    /// The total number of errors reported for the file.
    pub fn error_count(&self) -> usize {
        1 + self.related.len()
    }

    /// Returns `true` if parsing stopped because the error limit was exceeded.
    pub fn is_too_many_errors(&self) -> bool {
        matches!(self.abort, Some(Abort::TooManyErrors))
    }

    /// Returns `true` if parsing stopped because the reporter returned an error.
    pub fn is_aborted(&self) -> bool {
        matches!(self.abort, Some(Abort::Reporter(_)))
    }

    /// Gets the reason parsing stopped early, if it did.
    pub fn abort(&self) -> Option<&Abort> {
        self.abort.as_ref()
    }

    /// Takes the reason parsing stopped early, leaving `None` in its place.
    pub fn take_abort(&mut self) -> Option<Abort> {
        self.abort.take()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.abort {
            Some(abort) => abort.fmt(f),
            None => self.kind.fmt(f),
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = self.span() {
            if let Ok(span_contents) = self.source_code.read_span(&span.into(), 0, 0) {
                if let Some(file_name) = span_contents.name() {
                    write!(f, "{}:", file_name)?;
                }

                write!(
                    f,
                    "{}:{}: ",
                    span_contents.line() + 1,
                    span_contents.column() + 1
                )?;
            }
        } else {
            write!(f, "{}: ", self.file())?;
        }

        write!(f, "{}", self.kind)
    }
}
