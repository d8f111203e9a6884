//! Syntax tree for text format values, as used by aggregate option values.

use std::fmt::{self, Write};

use logos::Span;

use super::{Float, FullIdent, Ident, Int, StringLiteral};
use crate::{escape::CEscaped, join_span};

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: FieldName,
    pub value: FieldValue,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldName {
    Ident(Ident),
    /// An extension name, such as `[foo.bar]`.
    Extension(FullIdent, Span),
    /// An expanded `Any` value, such as `[type.googleapis.com/foo.Bar]`.
    Any(FullIdent, FullIdent, Span),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Message(Message, Span),
    MessageList(Vec<(Message, Span)>, Span),
    Scalar(Scalar),
    ScalarList(Vec<Scalar>, Span),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    String(StringLiteral),
    Int(Int),
    Float(Float),
    Ident {
        negative: bool,
        ident: Ident,
        span: Span,
    },
}

impl FieldName {
    pub fn span(&self) -> Span {
        match self {
            FieldName::Ident(ident) => ident.span.clone(),
            FieldName::Extension(_, span) => span.clone(),
            FieldName::Any(_, _, span) => span.clone(),
        }
    }
}

impl FieldValue {
    pub fn span(&self) -> Span {
        match self {
            FieldValue::Message(_, span) => span.clone(),
            FieldValue::MessageList(_, span) => span.clone(),
            FieldValue::Scalar(scalar) => scalar.span(),
            FieldValue::ScalarList(_, span) => span.clone(),
        }
    }
}

impl Scalar {
    pub fn span(&self) -> Span {
        match self {
            Scalar::String(string) => string.span.clone(),
            Scalar::Int(int) => int.span.clone(),
            Scalar::Float(float) => float.span.clone(),
            Scalar::Ident { span, .. } => span.clone(),
        }
    }
}

impl Field {
    pub(crate) fn new(name: FieldName, value: FieldValue, end: Span) -> Self {
        Field {
            span: join_span(name.span(), end),
            name,
            value,
        }
    }
}

/// Formats the message on a single line, with tokens separated by spaces. The output can be
/// parsed again with [`crate::text_format::parse`].
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, field) in self.fields.iter().enumerate() {
            if index != 0 {
                f.write_char(' ')?;
            }
            field.fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            FieldValue::Message(message, _) => write!(f, "{} {}", self.name, Braced(message)),
            value => write!(f, "{}: {}", self.name, value),
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldName::Ident(ident) => write!(f, "{}", ident),
            FieldName::Extension(name, _) => write!(f, "[{}]", name),
            FieldName::Any(domain, type_name, _) => write!(f, "[{}/{}]", domain, type_name),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Message(message, _) => Braced(message).fmt(f),
            FieldValue::MessageList(messages, _) => {
                fmt_list(f, messages.iter().map(|(message, _)| Braced(message)))
            }
            FieldValue::Scalar(scalar) => scalar.fmt(f),
            FieldValue::ScalarList(scalars, _) => fmt_list(f, scalars.iter()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(string) => write!(f, "\"{}\"", CEscaped(&string.value)),
            Scalar::Int(int) => int.fmt(f),
            Scalar::Float(float) if float.value.is_nan() => f.write_str("nan"),
            Scalar::Float(float) if float.value.is_infinite() => {
                if float.value.is_sign_negative() {
                    f.write_str("-inf")
                } else {
                    f.write_str("inf")
                }
            }
            Scalar::Float(float) => write!(f, "{:?}", float.value),
            Scalar::Ident {
                negative: true,
                ident,
                ..
            } => write!(f, "-{}", ident),
            Scalar::Ident { ident, .. } => ident.fmt(f),
        }
    }
}

struct Braced<'a>(&'a Message);

impl<'a> fmt::Display for Braced<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fields.is_empty() {
            f.write_str("{}")
        } else {
            write!(f, "{{ {} }}", self.0)
        }
    }
}

fn fmt_list<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    f.write_char('[')?;
    for (index, item) in items.enumerate() {
        if index != 0 {
            f.write_str(", ")?;
        }
        item.fmt(f)?;
    }
    f.write_char(']')
}
