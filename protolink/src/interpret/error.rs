use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// An error found while interpreting a single option.
///
/// Errors are created without a span, which is filled in with the span of the option statement
/// once the error reaches the top of the interpreter.
#[derive(Error, Clone, Debug, Diagnostic, PartialEq)]
pub(crate) enum OptionError {
    #[error("unknown extension '{name}'")]
    ExtensionNotFound {
        name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("'{name}' is not an extension")]
    NotAnExtension {
        name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("message '{message}' has no field named '{name}'")]
    UnknownOptionField {
        name: String,
        message: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("extension '{name}' extends '{extendee}', not '{expected}'")]
    ExtensionWrongExtendee {
        name: String,
        extendee: String,
        expected: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("option field '{name}' is not a message")]
    #[diagnostic(help("only message fields can be followed by a nested option name"))]
    NotAMessage {
        name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("option field '{name}' is a repeated message")]
    #[diagnostic(help("repeated message options must be set with an aggregate value"))]
    RepeatedMessageAccess {
        name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("option field already set: '{name}'")]
    AlreadySet {
        name: String,
        #[label("set again here")]
        span: Option<SourceSpan>,
    },
    #[error("expected {expected} for option '{name}', but found {actual}")]
    InvalidValue {
        name: String,
        expected: &'static str,
        actual: String,
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("value {value} is out of range for {ty} option '{name}'")]
    IntegerOutOfRange {
        name: String,
        ty: &'static str,
        value: String,
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("value {value} is out of range for float option '{name}'")]
    FloatOutOfRange {
        name: String,
        value: f64,
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("value of string option '{name}' is not valid utf-8")]
    InvalidUtf8 {
        name: String,
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("enum '{enum_name}' has no value '{value}'")]
    InvalidEnumValue {
        enum_name: String,
        value: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("expecting string value for json_name option")]
    JsonNameNotString {
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("option json_name is not allowed on extensions")]
    JsonNameOnExtension {
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("default value cannot be set because field is repeated")]
    DefaultOnRepeated {
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("default value cannot be set because field is a message")]
    DefaultOnMessage {
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("default values are not allowed in proto3")]
    Proto3Default {
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("required option fields are not set: {fields}")]
    MissingRequiredFields {
        fields: String,
        #[label("set here")]
        span: Option<SourceSpan>,
    },
    #[error("invalid aggregate value: {message}")]
    InvalidAggregate {
        message: String,
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("'{name}' is not a message type")]
    InvalidAnyType {
        name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("message '{message}' is not 'google.protobuf.Any'")]
    #[diagnostic(help("expanded type URLs may only be used in values of 'google.protobuf.Any'"))]
    AnyNotExpected {
        message: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
}

impl OptionError {
    pub(crate) fn span(&self) -> Option<SourceSpan> {
        match self {
            OptionError::ExtensionNotFound { span, .. }
            | OptionError::NotAnExtension { span, .. }
            | OptionError::UnknownOptionField { span, .. }
            | OptionError::ExtensionWrongExtendee { span, .. }
            | OptionError::NotAMessage { span, .. }
            | OptionError::RepeatedMessageAccess { span, .. }
            | OptionError::AlreadySet { span, .. }
            | OptionError::InvalidValue { span, .. }
            | OptionError::IntegerOutOfRange { span, .. }
            | OptionError::FloatOutOfRange { span, .. }
            | OptionError::InvalidUtf8 { span, .. }
            | OptionError::InvalidEnumValue { span, .. }
            | OptionError::JsonNameNotString { span }
            | OptionError::JsonNameOnExtension { span }
            | OptionError::DefaultOnRepeated { span }
            | OptionError::DefaultOnMessage { span }
            | OptionError::Proto3Default { span }
            | OptionError::MissingRequiredFields { span, .. }
            | OptionError::InvalidAggregate { span, .. }
            | OptionError::InvalidAnyType { span, .. }
            | OptionError::AnyNotExpected { span, .. } => *span,
        }
    }

    /// Positions the error, if it has no position yet.
    pub(crate) fn with_span(mut self, span: Option<SourceSpan>) -> Self {
        let slot = self.span_mut();
        if slot.is_none() {
            *slot = span;
        }
        self
    }

    fn span_mut(&mut self) -> &mut Option<SourceSpan> {
        match self {
            OptionError::ExtensionNotFound { span, .. }
            | OptionError::NotAnExtension { span, .. }
            | OptionError::UnknownOptionField { span, .. }
            | OptionError::ExtensionWrongExtendee { span, .. }
            | OptionError::NotAMessage { span, .. }
            | OptionError::RepeatedMessageAccess { span, .. }
            | OptionError::AlreadySet { span, .. }
            | OptionError::InvalidValue { span, .. }
            | OptionError::IntegerOutOfRange { span, .. }
            | OptionError::FloatOutOfRange { span, .. }
            | OptionError::InvalidUtf8 { span, .. }
            | OptionError::InvalidEnumValue { span, .. }
            | OptionError::JsonNameNotString { span }
            | OptionError::JsonNameOnExtension { span }
            | OptionError::DefaultOnRepeated { span }
            | OptionError::DefaultOnMessage { span }
            | OptionError::Proto3Default { span }
            | OptionError::MissingRequiredFields { span, .. }
            | OptionError::InvalidAggregate { span, .. }
            | OptionError::InvalidAnyType { span, .. }
            | OptionError::AnyNotExpected { span, .. } => span,
        }
    }
}
