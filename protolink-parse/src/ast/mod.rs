//! The lossless syntax tree of a protobuf source file.
//!
//! Every node records its byte span within the source, and declarations record the comments
//! attached to them. The tree is built once by the parser and never modified afterwards.
#![allow(missing_docs)]

use std::fmt;

use logos::Span;

pub mod text_format;
mod visit;

pub use self::visit::{NodeRef, Visitor};
use crate::join_span;

#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub syntax: Option<SyntaxDecl>,
    pub items: Vec<FileItem>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SyntaxDecl {
    pub syntax: Syntax,
    pub value: StringLiteral,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

/// The comments attached to a declaration.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Comments {
    pub leading_detached_comments: Vec<String>,
    pub leading_comment: Option<String>,
    pub trailing_comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FileItem {
    Package(Package),
    Import(Import),
    Option(OptionStatement),
    Message(Message),
    Enum(Enum),
    Extend(Extend),
    Service(Service),
    Empty(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ident {
    pub value: String,
    pub span: Span,
}

/// A dot-separated sequence of identifiers, such as a package name.
#[derive(Clone, Debug, PartialEq)]
pub struct FullIdent {
    pub parts: Vec<Ident>,
}

/// A reference to a type, which is fully-qualified if it starts with a `.`.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeName {
    pub leading_dot: Option<Span>,
    pub name: FullIdent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Int {
    pub negative: bool,
    pub value: u64,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Float {
    pub value: f64,
    pub span: Span,
}

/// One or more adjacent string literals, concatenated and with escapes processed.
#[derive(Clone, Debug, PartialEq)]
pub struct StringLiteral {
    pub value: Vec<u8>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Package {
    pub name: FullIdent,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Import {
    pub kind: Option<(ImportKind, Span)>,
    pub value: String,
    pub value_span: Span,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImportKind {
    Weak,
    Public,
}

/// An `option name = value;` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionStatement {
    pub body: OptionBody,
    pub comments: Comments,
    pub span: Span,
}

/// A bracketed list of options, such as `[deprecated = true, json_name = "foo"]`.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionList {
    pub options: Vec<OptionBody>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptionBody {
    pub name: Vec<OptionNamePart>,
    pub value: OptionValue,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionNamePart {
    Ident(Ident),
    Extension(TypeName, Span),
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Ident {
        negative: bool,
        ident: Ident,
        span: Span,
    },
    Int(Int),
    Float(Float),
    String(StringLiteral),
    Aggregate(text_format::Message, Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub name: Ident,
    pub body: MessageBody,
    pub comments: Comments,
    pub span: Span,
}

/// The braced body of a message or group.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageBody {
    pub items: Vec<MessageItem>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MessageItem {
    Field(Field),
    Oneof(Oneof),
    Option(OptionStatement),
    Message(Message),
    Enum(Enum),
    Extend(Extend),
    Extensions(Extensions),
    Reserved(Reserved),
    Empty(Span),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldLabel {
    Required,
    Optional,
    Repeated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub label: Option<(FieldLabel, Span)>,
    pub name: Ident,
    pub kind: FieldKind,
    pub number: Int,
    pub options: Option<OptionList>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Normal {
        ty: Ty,
        ty_span: Span,
    },
    /// A group field. The field name is the group name, and `ty_span` covers the `group` keyword.
    Group {
        ty_span: Span,
        body: MessageBody,
    },
    Map {
        ty_span: Span,
        key_ty: Ty,
        key_ty_span: Span,
        value_ty: Ty,
        value_ty_span: Span,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Ty {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Named(TypeName),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Oneof {
    pub name: Ident,
    pub items: Vec<OneofItem>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OneofItem {
    Field(Field),
    Option(OptionStatement),
    Empty(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Enum {
    pub name: Ident,
    pub items: Vec<EnumItem>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EnumItem {
    Value(EnumValue),
    Option(OptionStatement),
    Reserved(Reserved),
    Empty(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumValue {
    pub name: Ident,
    pub number: Int,
    pub options: Option<OptionList>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Extend {
    pub extendee: TypeName,
    pub items: Vec<ExtendItem>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExtendItem {
    Field(Field),
    Empty(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Extensions {
    pub ranges: Vec<ReservedRange>,
    pub options: Option<OptionList>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reserved {
    pub kind: ReservedKind,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReservedKind {
    Ranges(Vec<ReservedRange>),
    Names(Vec<Ident>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReservedRange {
    pub start: Int,
    pub end: ReservedRangeEnd,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReservedRangeEnd {
    None,
    Int(Int),
    Max(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Service {
    pub name: Ident,
    pub items: Vec<ServiceItem>,
    pub comments: Comments,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ServiceItem {
    Method(Method),
    Option(OptionStatement),
    Empty(Span),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Method {
    pub name: Ident,
    pub input_ty: TypeName,
    pub client_streaming: Option<Span>,
    pub output_ty: TypeName,
    pub server_streaming: Option<Span>,
    pub items: Vec<MethodItem>,
    pub comments: Comments,
    pub span: Span,
}

/// A statement within the optional body of an rpc.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodItem {
    Option(OptionStatement),
    Empty(Span),
}

impl File {
    /// The syntax of the file. Files without a syntax statement are proto2.
    pub fn syntax(&self) -> Syntax {
        self.syntax
            .as_ref()
            .map(|decl| decl.syntax)
            .unwrap_or_default()
    }

    /// The package name, if one is declared.
    pub fn package(&self) -> Option<&Package> {
        self.items.iter().find_map(|item| match item {
            FileItem::Package(package) => Some(package),
            _ => None,
        })
    }
}

impl Syntax {
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl Ident {
    pub fn new(value: impl Into<String>, span: Span) -> Self {
        Ident {
            value: value.into(),
            span,
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl FullIdent {
    pub fn span(&self) -> Span {
        match (self.parts.first(), self.parts.last()) {
            (Some(first), Some(last)) => join_span(first.span.clone(), last.span.clone()),
            _ => 0..0,
        }
    }
}

impl From<Ident> for FullIdent {
    fn from(value: Ident) -> Self {
        FullIdent { parts: vec![value] }
    }
}

impl From<Vec<Ident>> for FullIdent {
    fn from(parts: Vec<Ident>) -> Self {
        debug_assert!(!parts.is_empty());
        FullIdent { parts }
    }
}

impl fmt::Display for FullIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((first, rest)) = self.parts.split_first() {
            write!(f, "{}", first)?;
            for part in rest {
                write!(f, ".{}", part)?;
            }
        }
        Ok(())
    }
}

impl TypeName {
    pub fn span(&self) -> Span {
        match &self.leading_dot {
            Some(dot) => join_span(dot.clone(), self.name.span()),
            None => self.name.span(),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.leading_dot.is_some() {
            write!(f, ".")?;
        }
        write!(f, "{}", self.name)
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{}", self.value)
    }
}

impl Int {
    /// Gets the value as an `i32`, if it is in range.
    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|value| i32::try_from(value).ok())
    }

    /// Gets the value as an `i64`, if it is in range.
    pub fn as_i64(&self) -> Option<i64> {
        if self.negative {
            if self.value == 0 {
                Some(0)
            } else {
                i64::try_from(self.value - 1).ok().map(|value| -value - 1)
            }
        } else {
            i64::try_from(self.value).ok()
        }
    }
}

impl StringLiteral {
    /// Gets the value as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }
}

impl OptionNamePart {
    pub fn span(&self) -> Span {
        match self {
            OptionNamePart::Ident(ident) => ident.span.clone(),
            OptionNamePart::Extension(_, span) => span.clone(),
        }
    }
}

impl fmt::Display for OptionNamePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionNamePart::Ident(ident) => write!(f, "{}", ident),
            OptionNamePart::Extension(name, _) => write!(f, "({})", name),
        }
    }
}

impl OptionBody {
    pub fn name_span(&self) -> Span {
        match (self.name.first(), self.name.last()) {
            (Some(first), Some(last)) => join_span(first.span(), last.span()),
            _ => self.span.clone(),
        }
    }

    /// Returns `true` if this option is the given simple name, such as `json_name`.
    pub fn is_simple(&self, name: &str) -> bool {
        matches!(self.name.as_slice(), [OptionNamePart::Ident(ident)] if ident.value == name)
    }

    /// Formats the option name as it appears in source, such as `(foo.bar).baz`.
    pub fn name_string(&self) -> String {
        let mut result = String::new();
        for (index, part) in self.name.iter().enumerate() {
            if index != 0 {
                result.push('.');
            }
            result.push_str(&part.to_string());
        }
        result
    }
}

impl OptionValue {
    pub fn span(&self) -> Span {
        match self {
            OptionValue::Ident { span, .. } => span.clone(),
            OptionValue::Int(int) => int.span.clone(),
            OptionValue::Float(float) => float.span.clone(),
            OptionValue::String(string) => string.span.clone(),
            OptionValue::Aggregate(_, span) => span.clone(),
        }
    }
}

impl Field {
    pub fn label(&self) -> Option<FieldLabel> {
        self.label.as_ref().map(|(label, _)| *label)
    }

    /// The name of the field in the generated descriptor. Group fields are named after the
    /// lowercased group name.
    pub fn field_name(&self) -> String {
        match &self.kind {
            FieldKind::Group { .. } => self.name.value.to_ascii_lowercase(),
            _ => self.name.value.clone(),
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, FieldKind::Map { .. })
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, FieldKind::Group { .. })
    }

    /// The span of the field's type, including the `group` keyword or `map<...>`.
    pub fn ty_span(&self) -> Span {
        match &self.kind {
            FieldKind::Normal { ty_span, .. }
            | FieldKind::Group { ty_span, .. }
            | FieldKind::Map { ty_span, .. } => ty_span.clone(),
        }
    }
}

impl FieldLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldLabel::Required => "required",
            FieldLabel::Optional => "optional",
            FieldLabel::Repeated => "repeated",
        }
    }
}

impl fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Ty {
    pub fn is_valid_map_key(&self) -> bool {
        matches!(
            self,
            Ty::Int32
                | Ty::Int64
                | Ty::Uint32
                | Ty::Uint64
                | Ty::Sint32
                | Ty::Sint64
                | Ty::Fixed32
                | Ty::Fixed64
                | Ty::Sfixed32
                | Ty::Sfixed64
                | Ty::Bool
                | Ty::String
        )
    }
}

impl ReservedRangeEnd {
    pub fn span(&self) -> Option<Span> {
        match self {
            ReservedRangeEnd::None => None,
            ReservedRangeEnd::Int(int) => Some(int.span.clone()),
            ReservedRangeEnd::Max(span) => Some(span.clone()),
        }
    }
}

impl ReservedRange {
    pub fn span(&self) -> Span {
        match self.end.span() {
            Some(end) => join_span(self.start.span.clone(), end),
            None => self.start.span.clone(),
        }
    }
}
