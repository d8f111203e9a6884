//! Reporting of recoverable errors as they are found, and the limit on how many are accepted
//! before processing stops.

use std::{error::Error, fmt};

use crate::lines::LineResolver;

/// A boxed error returned by a [`Reporter`] to abort processing.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// The number of errors that may be reported before processing is aborted, unless overridden
/// with [`ErrorHandler::with_limit`].
pub const DEFAULT_ERROR_LIMIT: usize = 100;

/// A recoverable error, positioned within a source file.
///
/// The [`Display`](fmt::Display) implementation formats the error as `file:line:column: message`,
/// with one-based line and column numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedError {
    file: String,
    line: usize,
    column: usize,
    message: String,
}

impl PositionedError {
    /// Creates a new error at the given one-based line and column.
    pub fn new(
        file: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        PositionedError {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates a new error at the given byte offset into `source`.
    pub fn at_offset(
        file: impl Into<String>,
        source: &str,
        offset: usize,
        message: impl Into<String>,
    ) -> Self {
        let (line, column) = LineResolver::new(source).resolve(offset.min(source.len()));
        PositionedError::new(file, line as usize + 1, column as usize + 1, message)
    }

    /// The name of the file containing this error.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The one-based line number of this error.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The one-based column number of this error.
    pub fn column(&self) -> usize {
        self.column
    }

    /// The error message, without position information.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PositionedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

impl Error for PositionedError {}

/// A callback invoked once for every recoverable error.
///
/// Returning `Err` aborts processing of the current file, and the returned error is propagated
/// as the cause of the overall failure.
///
/// This trait is implemented for closures, and for `Vec<PositionedError>`, which collects every
/// error and never aborts.
pub trait Reporter {
    /// Handle a single error.
    fn report(&mut self, error: &PositionedError) -> Result<(), BoxError>;
}

impl<F> Reporter for F
where
    F: FnMut(&PositionedError) -> Result<(), BoxError>,
{
    fn report(&mut self, error: &PositionedError) -> Result<(), BoxError> {
        self(error)
    }
}

impl Reporter for Vec<PositionedError> {
    fn report(&mut self, error: &PositionedError) -> Result<(), BoxError> {
        self.push(error.clone());
        Ok(())
    }
}

/// A [`Reporter`] which aborts on the first error.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailFast;

impl Reporter for FailFast {
    fn report(&mut self, error: &PositionedError) -> Result<(), BoxError> {
        Err(Box::new(error.clone()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Continue;

impl Reporter for Continue {
    fn report(&mut self, _: &PositionedError) -> Result<(), BoxError> {
        Ok(())
    }
}

/// The reason processing stopped before reaching the end of the input.
#[derive(Debug)]
pub enum Abort {
    /// More errors were reported than the configured limit allows.
    TooManyErrors,
    /// The [`Reporter`] returned an error.
    Reporter(BoxError),
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abort::TooManyErrors => write!(f, "too many errors"),
            Abort::Reporter(err) => err.fmt(f),
        }
    }
}

/// Funnels errors to a [`Reporter`], enforcing an error limit.
///
/// With a limit of `L`, the reporter is invoked for at most `L + 1` errors: reporting error
/// number `L + 1` returns [`Abort::TooManyErrors`].
pub struct ErrorHandler<'a> {
    reporter: Box<dyn Reporter + Send + 'a>,
    limit: usize,
    count: usize,
}

impl<'a> ErrorHandler<'a> {
    /// Creates a handler which forwards errors to the given reporter.
    pub fn new<R>(reporter: R) -> Self
    where
        R: Reporter + Send + 'a,
    {
        ErrorHandler {
            reporter: Box::new(reporter),
            limit: DEFAULT_ERROR_LIMIT,
            count: 0,
        }
    }

    /// Overrides the maximum number of errors reported before aborting.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the maximum number of errors reported before aborting.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// The number of errors reported so far.
    pub fn error_count(&self) -> usize {
        self.count
    }

    /// Reports an error, returning `Err` if processing should stop.
    pub fn report(&mut self, error: PositionedError) -> Result<(), Abort> {
        log::trace!("reporting error: {}", error);
        self.count += 1;
        self.reporter.report(&error).map_err(Abort::Reporter)?;
        if self.count > self.limit {
            return Err(Abort::TooManyErrors);
        }
        Ok(())
    }
}

impl Default for ErrorHandler<'_> {
    fn default() -> Self {
        ErrorHandler::new(Continue)
    }
}

impl fmt::Debug for ErrorHandler<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("limit", &self.limit)
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}
