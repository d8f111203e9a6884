use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// An error found while building the symbol table, resolving names or validating a file.
#[derive(Error, Clone, Debug, Diagnostic, PartialEq)]
pub(crate) enum LinkError {
    #[error("name '{name}' is not defined")]
    NameNotFound {
        name: String,
        #[label("found here")]
        span: Option<SourceSpan>,
    },
    #[error("name '{name}' is defined twice")]
    DuplicateNameInFile {
        name: String,
        first_kind: &'static str,
        second_kind: &'static str,
        #[label("first defined here as {first_kind}…")]
        first: Option<SourceSpan>,
        #[label("…and again here as {second_kind}")]
        second: Option<SourceSpan>,
    },
    #[error("name '{name}' is defined twice, as {first_kind} in '{first_file}' and as {second_kind} in '{second_file}'")]
    DuplicateNameInImports {
        name: String,
        first_kind: &'static str,
        first_file: String,
        second_kind: &'static str,
        second_file: String,
        #[label("imported here")]
        span: Option<SourceSpan>,
    },
    #[error("name '{name}' is already defined as {first_kind} in imported file '{first_file}'")]
    DuplicateNameInFileAndImport {
        name: String,
        first_kind: &'static str,
        first_file: String,
        #[label("defined here as {second_kind}")]
        span: Option<SourceSpan>,
        second_kind: &'static str,
    },
    #[error("'{name}' is not a message type")]
    InvalidExtendee {
        name: String,
        #[label("extended here")]
        span: Option<SourceSpan>,
    },
    #[error("method {kind} type '{name}' is not a message")]
    InvalidMethodType {
        name: String,
        kind: &'static str,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("'{name}' is not a type")]
    #[diagnostic(help("field types must be a message or enum"))]
    InvalidFieldType {
        name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("required fields are not allowed in proto3")]
    Proto3RequiredLabel {
        #[label("defined here")]
        span: Option<SourceSpan>,
    },
    #[error("the first value of a proto3 enum must be zero")]
    Proto3EnumFirstValueNonZero {
        enum_name: String,
        #[label("value of '{enum_name}' defined here")]
        span: Option<SourceSpan>,
    },
    #[error("enum '{enum_name}' is a proto2 enum, and cannot be used in a proto3 message")]
    Proto3ClosedEnum {
        enum_name: String,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("extension fields are not allowed in proto3")]
    #[diagnostic(help("only extensions of the options messages in 'google/protobuf/descriptor.proto' are allowed"))]
    Proto3Extension {
        extendee: String,
        #[label("extends '{extendee}'")]
        span: Option<SourceSpan>,
    },
    #[error("camel-case name of field '{first_name}' conflicts with field '{second_name}'")]
    #[diagnostic(help("rename one of the fields"))]
    DuplicateCamelCaseFieldName {
        first_name: String,
        second_name: String,
        #[label("field defined here…")]
        first: Option<SourceSpan>,
        #[label("…conflicts with field here")]
        second: Option<SourceSpan>,
    },
    #[error("enum number '{number}' has already been used")]
    #[diagnostic(help("set the 'allow_alias' option to allow re-using enum numbers"))]
    DuplicateEnumNumber {
        number: i32,
        #[label("first used here by '{first_name}'…")]
        first: Option<SourceSpan>,
        first_name: String,
        #[label("…and used again here by '{second_name}'")]
        second: Option<SourceSpan>,
        second_name: String,
    },
    #[error("field number '{number}' has already been used")]
    DuplicateFieldNumber {
        number: i32,
        #[label("first used here by '{first_name}'…")]
        first: Option<SourceSpan>,
        first_name: String,
        #[label("…and used again here by '{second_name}'")]
        second: Option<SourceSpan>,
        second_name: String,
    },
    #[error("{kind} number '{number}' of '{name}' is reserved")]
    ReservedNumber {
        kind: &'static str,
        name: String,
        number: i32,
        #[label("defined here")]
        span: Option<SourceSpan>,
    },
    #[error("{kind} name '{name}' is reserved")]
    ReservedName {
        kind: &'static str,
        name: String,
        #[label("defined here")]
        span: Option<SourceSpan>,
    },
    #[error("field number '{number}' of '{name}' is in an extension range")]
    FieldNumberInExtensionRange {
        name: String,
        number: i32,
        #[label("defined here")]
        span: Option<SourceSpan>,
    },
    #[error("range {first_start} to {first_end} overlaps with range {second_start} to {second_end}")]
    OverlappingRanges {
        first_start: i32,
        first_end: i32,
        second_start: i32,
        second_end: i32,
        #[label("first defined here…")]
        first: Option<SourceSpan>,
        #[label("…and overlaps here")]
        second: Option<SourceSpan>,
    },
    #[error("message '{extendee}' does not declare '{number}' as an extension number")]
    ExtensionNumberOutOfRange {
        extendee: String,
        number: i32,
        #[help]
        help: Option<String>,
        #[label("used here")]
        span: Option<SourceSpan>,
    },
    #[error("extension number '{number}' of '{extendee}' is already used by '{first_name}'")]
    DuplicateExtensionNumber {
        extendee: String,
        number: i32,
        first_name: String,
        #[label("used again here by '{second_name}'")]
        span: Option<SourceSpan>,
        second_name: String,
    },
}

impl LinkError {
    /// The primary span of this error, used to position it for the reporter.
    pub(crate) fn span(&self) -> Option<SourceSpan> {
        match self {
            LinkError::NameNotFound { span, .. }
            | LinkError::DuplicateNameInImports { span, .. }
            | LinkError::DuplicateNameInFileAndImport { span, .. }
            | LinkError::InvalidExtendee { span, .. }
            | LinkError::InvalidMethodType { span, .. }
            | LinkError::InvalidFieldType { span, .. }
            | LinkError::Proto3RequiredLabel { span }
            | LinkError::Proto3EnumFirstValueNonZero { span, .. }
            | LinkError::Proto3ClosedEnum { span, .. }
            | LinkError::Proto3Extension { span, .. }
            | LinkError::ReservedNumber { span, .. }
            | LinkError::ReservedName { span, .. }
            | LinkError::FieldNumberInExtensionRange { span, .. }
            | LinkError::ExtensionNumberOutOfRange { span, .. }
            | LinkError::DuplicateExtensionNumber { span, .. } => *span,
            LinkError::DuplicateNameInFile { second, .. }
            | LinkError::DuplicateCamelCaseFieldName { second, .. }
            | LinkError::DuplicateEnumNumber { second, .. }
            | LinkError::DuplicateFieldNumber { second, .. }
            | LinkError::OverlappingRanges { second, .. } => *second,
        }
    }
}
