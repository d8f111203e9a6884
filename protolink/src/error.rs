use std::{fmt, io, path::PathBuf};

use miette::{Diagnostic, NamedSource, SourceCode, SourceOffset, SourceSpan};
use protolink_parse::{Abort, BoxError, ParseError, PositionedError};
use thiserror::Error;

use crate::{interpret::OptionError, link::LinkError};

/// An error that can occur when compiling protobuf files.
#[derive(Diagnostic, Error)]
#[error(transparent)]
#[diagnostic(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

#[derive(Debug, Diagnostic, Error)]
pub(crate) enum ErrorKind {
    #[error("{}", err)]
    #[diagnostic(forward(err))]
    Parse { err: ParseError },
    #[error("{}", err)]
    #[diagnostic(forward(err))]
    InvalidInput { err: CheckErrors },
    #[error("too many errors in file '{name}'")]
    #[diagnostic(help("the error limit can be raised with `Compiler::error_limit`"))]
    TooManyErrors { name: String },
    #[error("compilation of file '{name}' was aborted")]
    Aborted {
        name: String,
        #[source]
        err: BoxError,
    },
    #[error("compilation was cancelled")]
    Cancelled,
    #[error("conflicting source info registered for file '{name}'")]
    RegistryConflict { name: String },
    #[error("error opening file '{path}'")]
    OpenFile {
        name: String,
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("file '{name}' is too large")]
    #[diagnostic(help("the maximum file length is 2,147,483,647 bytes"))]
    FileTooLarge { name: String },
    #[error("file '{name}' is not valid utf-8")]
    FileInvalidUtf8 { name: String },
    #[error("file '{name}' not found")]
    FileNotFound { name: String },
    #[error("import '{name}' not found")]
    ImportNotFound {
        #[label("imported here")]
        span: Option<SourceSpan>,
        #[source_code]
        source_code: NamedSource<String>,
        name: String,
    },
    #[error("import cycle detected: {cycle}")]
    CircularImport { name: String, cycle: String },
    #[error("file '{path}' is not in any include path")]
    FileNotIncluded { path: PathBuf },
    #[error("path '{path}' is shadowed by '{shadow}' in the include paths")]
    #[diagnostic(help("either pass '{}' as the input file, or re-order the include paths so that '{}' comes first", shadow.display(), path.display()))]
    FileShadowed {
        name: String,
        path: PathBuf,
        shadow: PathBuf,
    },
    #[error(transparent)]
    Custom(BoxError),
}

/// A recoverable error found while linking a file or interpreting its options.
#[derive(Debug, Diagnostic, Error, PartialEq)]
pub(crate) enum CheckError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Option(#[from] OptionError),
}

/// Every error reported for a single file. The first error is the primary diagnostic.
#[derive(Diagnostic)]
#[diagnostic(forward(kind))]
pub(crate) struct CheckErrors {
    kind: Box<CheckError>,
    #[related]
    related: Vec<CheckError>,
    #[source_code]
    source_code: NamedSource<String>,
}

impl Error {
    /// Creates an instance of [`struct@Error`] with an arbitrary payload.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Error::from_kind(ErrorKind::Custom(error.into()))
    }

    /// Creates an instance of [`struct@Error`] indicating that an imported file could not be found.
    ///
    /// This error should be returned by [`FileResolver`](crate::file::FileResolver) instances if a file is not found.
    pub fn file_not_found(name: &str) -> Self {
        Error::from_kind(ErrorKind::FileNotFound {
            name: name.to_owned(),
        })
    }

    /// The file in which this error occurred, if available.
    pub fn file(&self) -> Option<&str> {
        match &*self.kind {
            ErrorKind::Parse { err } => Some(err.file()),
            ErrorKind::InvalidInput { err } => Some(err.source_code.name()),
            ErrorKind::TooManyErrors { name }
            | ErrorKind::Aborted { name, .. }
            | ErrorKind::RegistryConflict { name }
            | ErrorKind::OpenFile { name, .. }
            | ErrorKind::FileTooLarge { name }
            | ErrorKind::FileInvalidUtf8 { name }
            | ErrorKind::FileNotFound { name }
            | ErrorKind::CircularImport { name, .. }
            | ErrorKind::FileShadowed { name, .. } => Some(name),
            ErrorKind::ImportNotFound { source_code, .. } => Some(source_code.name()),
            ErrorKind::Cancelled | ErrorKind::FileNotIncluded { .. } | ErrorKind::Custom(_) => {
                None
            }
        }
    }

    pub(crate) fn from_kind(kind: ErrorKind) -> Self {
        Error {
            kind: Box::new(kind),
        }
    }

    pub(crate) fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[cfg(test)]
    pub(crate) fn check_errors(&self) -> Vec<&CheckError> {
        match &*self.kind {
            ErrorKind::InvalidInput { err } => std::iter::once(&*err.kind)
                .chain(err.related.iter())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Returns true if this is an instance of [`Error::file_not_found()`]
    pub fn is_file_not_found(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::FileNotFound { .. }
                | ErrorKind::ImportNotFound { .. }
                | ErrorKind::FileNotIncluded { .. }
        )
    }

    /// Returns true if this error is caused by an invalid protobuf source file.
    pub fn is_parse(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::Parse { .. }
                | ErrorKind::FileTooLarge { .. }
                | ErrorKind::FileInvalidUtf8 { .. }
        )
    }

    /// Returns true if the input had recoverable errors, none of which stopped processing early.
    ///
    /// Every such error was passed to the configured reporter.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            &*self.kind,
            ErrorKind::Parse { .. } | ErrorKind::InvalidInput { .. }
        )
    }

    /// Returns true if processing stopped because more errors were reported than the error limit
    /// allows.
    pub fn is_too_many_errors(&self) -> bool {
        matches!(&*self.kind, ErrorKind::TooManyErrors { .. })
    }

    /// Returns the error returned by the reporter, if it aborted processing.
    pub fn aborted(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &*self.kind {
            ErrorKind::Aborted { err, .. } => Some(err.as_ref()),
            _ => None,
        }
    }

    /// Returns true if compilation was stopped through a
    /// [`CancellationToken`](crate::CancellationToken).
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error is caused by an IO error while opening a file.
    pub fn is_io(&self) -> bool {
        match &*self.kind {
            ErrorKind::OpenFile { .. } => true,
            ErrorKind::Custom(err) if err.downcast_ref::<io::Error>().is_some() => true,
            _ => false,
        }
    }

    pub(crate) fn from_abort(name: &str, abort: Abort) -> Self {
        match abort {
            Abort::TooManyErrors => Error::from_kind(ErrorKind::TooManyErrors {
                name: name.to_owned(),
            }),
            Abort::Reporter(err) => Error::from_kind(ErrorKind::Aborted {
                name: name.to_owned(),
                err,
            }),
        }
    }

    pub(crate) fn invalid_input(name: &str, source: Option<&str>, errors: Vec<CheckError>) -> Self {
        let mut errors = errors.into_iter();
        match errors.next() {
            Some(first) => Error::from_kind(ErrorKind::InvalidInput {
                err: CheckErrors {
                    kind: Box::new(first),
                    related: errors.collect(),
                    source_code: NamedSource::new(name, source.unwrap_or_default().to_owned()),
                },
            }),
            None => Error::from_kind(ErrorKind::Custom(
                format!("file '{}' is invalid", name).into(),
            )),
        }
    }

    /// Converts a [`Error::file_not_found()`] returned for an import into an error pointing at the
    /// import statement.
    pub(crate) fn into_import_error(
        self,
        importer: &str,
        source: Option<&str>,
        location_span: Option<&[i32]>,
    ) -> Self {
        match *self.kind {
            ErrorKind::FileNotFound { name } => {
                let source = source.unwrap_or_default();
                let span = location_span
                    .and_then(|span| protolink_parse::span_to_offsets(source, span))
                    .map(|range| {
                        SourceSpan::new(SourceOffset::from(range.start), range.end - range.start)
                    });
                Error::from_kind(ErrorKind::ImportNotFound {
                    span,
                    source_code: NamedSource::new(importer, source.to_owned()),
                    name,
                })
            }
            kind => Error::from_kind(kind),
        }
    }
}

impl CheckError {
    pub(crate) fn span(&self) -> Option<SourceSpan> {
        match self {
            CheckError::Link(err) => err.span(),
            CheckError::Option(err) => err.span(),
        }
    }

    /// Positions this error within its file for the reporter.
    pub(crate) fn to_positioned(&self, file: &str, source: Option<&str>) -> PositionedError {
        match (self.span(), source) {
            (Some(span), Some(source)) => {
                PositionedError::at_offset(file, source, span.offset(), self.to_string())
            }
            _ => PositionedError::new(file, 1, 1, self.to_string()),
        }
    }
}

impl From<ParseError> for Error {
    fn from(mut err: ParseError) -> Self {
        match err.take_abort() {
            Some(abort) => Error::from_abort(err.file(), abort),
            None => Error::from_kind(ErrorKind::Parse { err }),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(err)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.kind {
            ErrorKind::Parse { err } => err.fmt(f),
            ErrorKind::InvalidInput { err } => err.fmt(f),
            ErrorKind::OpenFile { err, .. } => write!(f, "{}: {}", self, err),
            ErrorKind::Aborted { name, err } => write!(f, "{}: {}", name, err),
            ErrorKind::TooManyErrors { .. }
            | ErrorKind::Cancelled
            | ErrorKind::RegistryConflict { .. }
            | ErrorKind::FileTooLarge { .. }
            | ErrorKind::FileInvalidUtf8 { .. }
            | ErrorKind::FileNotFound { .. }
            | ErrorKind::CircularImport { .. }
            | ErrorKind::FileNotIncluded { .. }
            | ErrorKind::FileShadowed { .. } => write!(f, "{}", self),
            ErrorKind::Custom(err) => err.fmt(f),
            ErrorKind::ImportNotFound {
                span, source_code, ..
            } => {
                write!(f, "{}:", source_code.name())?;
                if let Some(span) = span {
                    if let Ok(span_contents) = source_code.read_span(span, 0, 0) {
                        write!(
                            f,
                            "{}:{}: ",
                            span_contents.line() + 1,
                            span_contents.column() + 1
                        )?;
                    }
                }
                write!(f, "{}", self)
            }
        }
    }
}

impl fmt::Display for CheckErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl fmt::Debug for CheckErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.source_code.name())?;
        if let Some(span) = self.kind.span() {
            if let Ok(span_contents) = self.source_code.read_span(&span, 0, 0) {
                write!(
                    f,
                    "{}:{}: ",
                    span_contents.line() + 1,
                    span_contents.column() + 1
                )?;
            } else {
                write!(f, " ")?;
            }
        } else {
            write!(f, " ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for CheckErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_debug_io() {
        let err = Error::from_kind(ErrorKind::OpenFile {
            name: "file.proto".into(),
            path: "path/to/file.proto".into(),
            err: io::Error::new(io::ErrorKind::Other, "io error"),
        });

        assert!(err.is_io());
        assert_eq!(err.file(), Some("file.proto"));
        assert_eq!(
            format!("{:?}", err),
            "error opening file 'path/to/file.proto': io error"
        );
    }

    #[test]
    fn fmt_debug_parse() {
        let err = Error::from(protolink_parse::parse("file.proto", "invalid").unwrap_err());

        assert!(err.is_parse());
        assert!(err.is_invalid_input());
        assert_eq!(err.file(), Some("file.proto"));
        assert_eq!(
            format!("{:?}", err),
            "file.proto:1:1: expected 'enum', 'extend', 'import', 'message', 'option', 'service', 'package' or ';', but found 'invalid'"
        );
    }

    #[test]
    fn fmt_debug_import_not_found() {
        let source = "import 'dep.proto';\n";
        let err = Error::file_not_found("dep.proto").into_import_error(
            "root.proto",
            Some(source),
            Some(&[0, 0, 19]),
        );

        assert!(err.is_file_not_found());
        assert_eq!(err.file(), Some("root.proto"));
        assert_eq!(
            format!("{:?}", err),
            "root.proto:1:1: import 'dep.proto' not found"
        );
    }

    #[test]
    fn abort_kinds() {
        let err = Error::from_abort("a.proto", Abort::TooManyErrors);
        assert!(err.is_too_many_errors());
        assert!(!err.is_invalid_input());

        let err = Error::from_abort("a.proto", Abort::Reporter("stop".into()));
        assert_eq!(err.aborted().map(|err| err.to_string()).as_deref(), Some("stop"));
        assert_eq!(format!("{:?}", err), "a.proto: stop");
    }
}
