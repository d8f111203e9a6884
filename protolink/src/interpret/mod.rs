//! Interpretation of options.
//!
//! The parser stores every option as an [`UninterpretedOption`]. Once the names visible from a
//! file are known, each option name is resolved against the options message of its element
//! (`google.protobuf.FileOptions` and so on) and the value is converted to the type of the
//! resolved field. The `json_name` and `default` pseudo-options of fields are written to the
//! field descriptor itself.

mod error;
mod value;

pub(crate) use self::error::OptionError;

use std::{collections::HashMap, ops::Range};

use prost::Message;
use protolink_parse::{ast::text_format, tag};

use crate::{
    link::{
        join_name, Definition, DefinitionKind, Diagnostics, FieldDefinition, NameMap,
        GOOGLE_DESCRIPTOR_NAMES,
    },
    options::{OptionSet, Value},
    source_info::rename_locations,
    types::{
        field_descriptor_proto::{Label, Type},
        DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
        ServiceDescriptorProto, SourceCodeInfo, UninterpretedOption,
    },
    Error,
};

use self::value::{convert_scalar, default_value_string, EnumValues, RawValue};

const FILE_OPTIONS: &str = "google.protobuf.FileOptions";
const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
const ONEOF_OPTIONS: &str = "google.protobuf.OneofOptions";
const EXTENSION_RANGE_OPTIONS: &str = "google.protobuf.ExtensionRangeOptions";
const ENUM_OPTIONS: &str = "google.protobuf.EnumOptions";
const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";
const SERVICE_OPTIONS: &str = "google.protobuf.ServiceOptions";
const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";
const ANY: &str = "google.protobuf.Any";

/// The source code info path of each interpreted option, keyed by the byte range of the option
/// in its source file.
///
/// Paths are relative to the file descriptor. An option such as `option (foo).bar = 1;` on the
/// first field of the first message maps to `[4, 0, 2, 0, 8, <foo>, <bar>]`, and the `json_name`
/// and `default` pseudo-options map to the `json_name` and `default_value` fields of the field
/// descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionPaths {
    paths: HashMap<Range<usize>, Vec<i32>>,
}

impl OptionPaths {
    /// Returns the path of the option whose source spans `range`.
    pub fn get(&self, range: &Range<usize>) -> Option<&[i32]> {
        self.paths.get(range).map(Vec::as_slice)
    }

    /// Iterates over every interpreted option, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&Range<usize>, &[i32])> {
        self.paths
            .iter()
            .map(|(range, path)| (range, path.as_slice()))
    }

    /// The number of interpreted options.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if no options were interpreted.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Interprets the options of every element of `file`.
///
/// In strict mode, every option which fails to interpret is reported through `diagnostics`. In
/// lenient mode the failure is only logged. Either way the option is left in the
/// `uninterpreted_option` list of its element, and source code info locations are renamed to the
/// paths of the interpreted options.
pub(crate) fn interpret_file(
    file: &mut FileDescriptorProto,
    visible: &NameMap,
    reachable: &NameMap,
    diagnostics: &mut Diagnostics<'_, '_>,
    lenient: bool,
) -> Result<OptionPaths, Error> {
    let mut interpreter = Interpreter {
        visible,
        reachable,
        diagnostics,
        lenient,
        proto3: file.syntax.as_deref() == Some("proto3"),
        option_paths: OptionPaths::default(),
        renames: Vec::new(),
        path: Vec::new(),
    };

    let package = file.package.clone().unwrap_or_default();
    interpreter.interpret_options(
        &mut file.options,
        tag::file::OPTIONS,
        FILE_OPTIONS,
        &package,
        None,
    )?;

    for (index, message) in file.message_type.iter_mut().enumerate() {
        interpreter.path.extend([tag::file::MESSAGE_TYPE, index as i32]);
        interpreter.interpret_message(&package, message)?;
        interpreter.pop_path(2);
    }
    for (index, enum_) in file.enum_type.iter_mut().enumerate() {
        interpreter.path.extend([tag::file::ENUM_TYPE, index as i32]);
        interpreter.interpret_enum(&package, enum_)?;
        interpreter.pop_path(2);
    }
    for (index, service) in file.service.iter_mut().enumerate() {
        interpreter.path.extend([tag::file::SERVICE, index as i32]);
        interpreter.interpret_service(&package, service)?;
        interpreter.pop_path(2);
    }
    for (index, extension) in file.extension.iter_mut().enumerate() {
        interpreter.path.extend([tag::file::EXTENSION, index as i32]);
        interpreter.interpret_field(&package, extension, true)?;
        interpreter.pop_path(2);
    }

    if let Some(info) = &mut file.source_code_info {
        for rename in &interpreter.renames {
            rename.apply(info);
        }
    }

    log::debug!(
        "interpreted {} options in file '{}'",
        interpreter.option_paths.len(),
        interpreter.diagnostics.file_name()
    );
    Ok(interpreter.option_paths)
}

struct Interpreter<'a, 'b, 'c> {
    visible: &'a NameMap,
    reachable: &'a NameMap,
    diagnostics: &'a mut Diagnostics<'b, 'c>,
    lenient: bool,
    proto3: bool,
    option_paths: OptionPaths,
    renames: Vec<Rename>,
    path: Vec<i32>,
}

/// The new location suffix of each uninterpreted option of an element.
struct Rename {
    element: Vec<i32>,
    options_tag: i32,
    suffixes: Vec<Vec<i32>>,
}

/// The parts of a field descriptor which the pseudo-options may set.
struct FieldTarget<'f> {
    label: Label,
    ty: Option<Type>,
    type_name: Option<String>,
    is_extension: bool,
    json_name: &'f mut Option<String>,
    json_name_set: bool,
    default_value: &'f mut Option<String>,
}

enum PseudoOption {
    JsonName,
    Default,
}

/// An option which was applied to an options message.
struct Applied {
    /// Field numbers from the options message to the value, including the index of a repeated
    /// element.
    path: Vec<i32>,
    /// The first field of the option name.
    top: FieldDefinition,
    top_name: String,
}

impl<'a, 'b, 'c> Interpreter<'a, 'b, 'c> {
    fn interpret_message(&mut self, scope: &str, message: &mut DescriptorProto) -> Result<(), Error> {
        let full_name = join_name(scope, message.name.as_deref().unwrap_or_default());

        self.interpret_options(
            &mut message.options,
            tag::message::OPTIONS,
            MESSAGE_OPTIONS,
            &full_name,
            None,
        )?;

        for (index, field) in message.field.iter_mut().enumerate() {
            self.path.extend([tag::message::FIELD, index as i32]);
            self.interpret_field(&full_name, field, false)?;
            self.pop_path(2);
        }
        for (index, extension) in message.extension.iter_mut().enumerate() {
            self.path.extend([tag::message::EXTENSION, index as i32]);
            self.interpret_field(&full_name, extension, true)?;
            self.pop_path(2);
        }
        for (index, oneof) in message.oneof_decl.iter_mut().enumerate() {
            self.path.extend([tag::message::ONEOF_DECL, index as i32]);
            self.interpret_options(
                &mut oneof.options,
                tag::oneof::OPTIONS,
                ONEOF_OPTIONS,
                &full_name,
                None,
            )?;
            self.pop_path(2);
        }
        for (index, range) in message.extension_range.iter_mut().enumerate() {
            self.path.extend([tag::message::EXTENSION_RANGE, index as i32]);
            self.interpret_options(
                &mut range.options,
                tag::message::extension_range::OPTIONS,
                EXTENSION_RANGE_OPTIONS,
                &full_name,
                None,
            )?;
            self.pop_path(2);
        }
        for (index, nested) in message.nested_type.iter_mut().enumerate() {
            self.path.extend([tag::message::NESTED_TYPE, index as i32]);
            self.interpret_message(&full_name, nested)?;
            self.pop_path(2);
        }
        for (index, enum_) in message.enum_type.iter_mut().enumerate() {
            self.path.extend([tag::message::ENUM_TYPE, index as i32]);
            self.interpret_enum(&full_name, enum_)?;
            self.pop_path(2);
        }

        Ok(())
    }

    fn interpret_field(
        &mut self,
        scope: &str,
        field: &mut FieldDescriptorProto,
        is_extension: bool,
    ) -> Result<(), Error> {
        let target = FieldTarget {
            label: field.label(),
            ty: field.r#type.and_then(|ty| Type::try_from(ty).ok()),
            type_name: field.type_name.clone(),
            is_extension,
            json_name: &mut field.json_name,
            json_name_set: false,
            default_value: &mut field.default_value,
        };
        self.interpret_options(
            &mut field.options,
            tag::field::OPTIONS,
            FIELD_OPTIONS,
            scope,
            Some(target),
        )
    }

    fn interpret_enum(&mut self, scope: &str, enum_: &mut EnumDescriptorProto) -> Result<(), Error> {
        self.interpret_options(
            &mut enum_.options,
            tag::enum_::OPTIONS,
            ENUM_OPTIONS,
            scope,
            None,
        )?;

        // Enum values are scoped as siblings of their enum.
        for (index, value) in enum_.value.iter_mut().enumerate() {
            self.path.extend([tag::enum_::VALUE, index as i32]);
            self.interpret_options(
                &mut value.options,
                tag::enum_value::OPTIONS,
                ENUM_VALUE_OPTIONS,
                scope,
                None,
            )?;
            self.pop_path(2);
        }

        Ok(())
    }

    fn interpret_service(
        &mut self,
        scope: &str,
        service: &mut ServiceDescriptorProto,
    ) -> Result<(), Error> {
        let full_name = join_name(scope, service.name.as_deref().unwrap_or_default());

        self.interpret_options(
            &mut service.options,
            tag::service::OPTIONS,
            SERVICE_OPTIONS,
            scope,
            None,
        )?;

        for (index, method) in service.method.iter_mut().enumerate() {
            self.path.extend([tag::service::METHOD, index as i32]);
            self.interpret_options(
                &mut method.options,
                tag::method::OPTIONS,
                METHOD_OPTIONS,
                &full_name,
                None,
            )?;
            self.pop_path(2);
        }

        Ok(())
    }

    /// Interprets the uninterpreted options of the element at the current path.
    fn interpret_options(
        &mut self,
        options: &mut Option<OptionSet>,
        options_tag: i32,
        target: &str,
        scope: &str,
        mut field: Option<FieldTarget<'_>>,
    ) -> Result<(), Error> {
        let set = match options {
            Some(set) => set,
            None => return Ok(()),
        };
        let uninterpreted = set.take_uninterpreted();
        if uninterpreted.is_empty() {
            return Ok(());
        }

        let mut remaining = Vec::new();
        let mut suffixes = Vec::with_capacity(uninterpreted.len());
        let mut touched: Vec<(FieldDefinition, String, Vec<i32>)> = Vec::new();

        for (index, option) in uninterpreted.into_iter().enumerate() {
            let mut option_path = self.path.clone();
            option_path.extend([options_tag, tag::UNINTERPRETED_OPTION, index as i32]);

            let result = match (&mut field, pseudo_option(&option)) {
                (Some(field), Some(PseudoOption::JsonName)) => self
                    .interpret_json_name(field, &option)
                    .map(|()| vec![tag::field::JSON_NAME]),
                (Some(field), Some(PseudoOption::Default)) => self
                    .interpret_default(field, &option)
                    .map(|()| vec![tag::field::DEFAULT_VALUE]),
                _ => self
                    .interpret_option(set, target, scope, &option)
                    .map(|applied| {
                        if !touched.iter().any(|(top, _, _)| top.number == applied.top.number) {
                            touched.push((applied.top, applied.top_name, option_path.clone()));
                        }
                        let mut suffix = vec![options_tag];
                        suffix.extend(applied.path);
                        suffix
                    }),
            };

            match result {
                Ok(suffix) => {
                    if let Some(range) = self.diagnostics.offsets(&option_path) {
                        let mut path = self.path.clone();
                        path.extend_from_slice(&suffix);
                        self.option_paths.paths.insert(range, path);
                    }
                    suffixes.push(suffix);
                }
                Err(err) => {
                    if self.lenient {
                        log::debug!(
                            "leaving option '{}' uninterpreted: {}",
                            option_name(&option),
                            err
                        );
                    } else {
                        let span = self.diagnostics.span(&option_path);
                        self.diagnostics.report(err.with_span(span))?;
                    }
                    suffixes.push(vec![
                        options_tag,
                        tag::UNINTERPRETED_OPTION,
                        remaining.len() as i32,
                    ]);
                    remaining.push(option);
                }
            }
        }

        if !self.lenient {
            for (top, top_name, option_path) in &touched {
                let mut missing = Vec::new();
                if let (Some(type_name), Some(value)) = (&top.type_name, set.get(top.number)) {
                    let prefix = format!("{}.", top_name);
                    for message in messages(value) {
                        self.missing_required(type_name, message, &prefix, &mut missing);
                    }
                }
                if !missing.is_empty() {
                    let span = self.diagnostics.span(option_path);
                    self.diagnostics.report(OptionError::MissingRequiredFields {
                        fields: missing.join(", "),
                        span,
                    })?;
                }
            }
        }

        set.set_uninterpreted(remaining);
        if set.is_empty() {
            *options = None;
        }

        self.renames.push(Rename {
            element: self.path.clone(),
            options_tag,
            suffixes,
        });
        Ok(())
    }

    /// Resolves the name of an option and sets its value in `set`.
    ///
    /// The name and value are checked in full before `set` is modified.
    fn interpret_option(
        &self,
        set: &mut OptionSet,
        target: &str,
        scope: &str,
        option: &UninterpretedOption,
    ) -> Result<Applied, OptionError> {
        let mut message = target.to_owned();
        let mut fields: Vec<FieldDefinition> = Vec::with_capacity(option.name.len());
        let mut name = String::new();
        let mut top_name = String::new();

        for (index, part) in option.name.iter().enumerate() {
            if index != 0 {
                name.push('.');
            }
            let field = if part.is_extension {
                name.push('(');
                name.push_str(&part.name_part);
                name.push(')');
                self.resolve_extension(scope, &part.name_part, &message)?
            } else {
                name.push_str(&part.name_part);
                self.find_field(&message, &part.name_part).ok_or_else(|| {
                    OptionError::UnknownOptionField {
                        name: part.name_part.clone(),
                        message: message.clone(),
                        span: None,
                    }
                })?
            };

            if index == 0 {
                top_name = name.clone();
            }
            if index + 1 < option.name.len() {
                if !field.is_message() {
                    return Err(OptionError::NotAMessage { name, span: None });
                }
                if field.is_repeated() {
                    return Err(OptionError::RepeatedMessageAccess { name, span: None });
                }
                message = field.type_name.clone().unwrap_or_default();
            }
            fields.push(field);
        }

        let (last, parents) = match fields.split_last() {
            Some(split) => split,
            None => {
                return Err(OptionError::UnknownOptionField {
                    name,
                    message,
                    span: None,
                })
            }
        };

        let raw = RawValue::from_uninterpreted(option).ok_or_else(|| OptionError::InvalidValue {
            name: name.clone(),
            expected: "a value",
            actual: "nothing".to_owned(),
            span: None,
        })?;
        let value = self.convert_value(&name, scope, last, &raw)?;

        let mut current = set;
        let mut path = Vec::with_capacity(fields.len() + 1);
        for parent in parents {
            path.push(parent.number);
            current = current
                .get_message_mut(parent.number, parent.ty == Some(Type::Group))
                .ok_or_else(|| OptionError::AlreadySet {
                    name: name.clone(),
                    span: None,
                })?;
        }
        path.push(last.number);
        if last.is_repeated() {
            let index = current.push(last.number, value);
            path.push(index as i32);
        } else if current.set(last.number, value).is_err() {
            return Err(OptionError::AlreadySet { name, span: None });
        }

        Ok(Applied {
            path,
            top: fields.swap_remove(0),
            top_name,
        })
    }

    fn interpret_json_name(
        &self,
        field: &mut FieldTarget<'_>,
        option: &UninterpretedOption,
    ) -> Result<(), OptionError> {
        if field.is_extension {
            return Err(OptionError::JsonNameOnExtension { span: None });
        }
        let value = match &option.string_value {
            Some(value) => value,
            None => return Err(OptionError::JsonNameNotString { span: None }),
        };
        let value = String::from_utf8(value.clone()).map_err(|_| OptionError::InvalidUtf8 {
            name: "json_name".to_owned(),
            span: None,
        })?;
        if field.json_name_set {
            return Err(OptionError::AlreadySet {
                name: "json_name".to_owned(),
                span: None,
            });
        }

        *field.json_name = Some(value);
        field.json_name_set = true;
        Ok(())
    }

    fn interpret_default(
        &self,
        field: &mut FieldTarget<'_>,
        option: &UninterpretedOption,
    ) -> Result<(), OptionError> {
        if field.label == Label::Repeated {
            return Err(OptionError::DefaultOnRepeated { span: None });
        }
        let ty = match field.ty {
            Some(Type::Message | Type::Group) => {
                return Err(OptionError::DefaultOnMessage { span: None })
            }
            Some(ty) => ty,
            None => {
                return Err(OptionError::InvalidValue {
                    name: "default".to_owned(),
                    expected: "a field of known type",
                    actual: "an unresolved type".to_owned(),
                    span: None,
                })
            }
        };
        if self.proto3 {
            return Err(OptionError::Proto3Default { span: None });
        }
        if field.default_value.is_some() {
            return Err(OptionError::AlreadySet {
                name: "default".to_owned(),
                span: None,
            });
        }

        let raw = RawValue::from_uninterpreted(option).ok_or_else(|| OptionError::InvalidValue {
            name: "default".to_owned(),
            expected: "a value",
            actual: "nothing".to_owned(),
            span: None,
        })?;

        let value = if ty == Type::Enum {
            // Enum defaults are stored by name.
            match raw {
                RawValue::Ident {
                    negative: false,
                    name,
                } => {
                    if let Some(values) = self.enum_values(field.type_name.as_deref()) {
                        if !values.values.iter().any(|(value, _)| value == name) {
                            return Err(OptionError::InvalidEnumValue {
                                enum_name: values.name.to_owned(),
                                value: name.to_owned(),
                                span: None,
                            });
                        }
                    }
                    name.to_owned()
                }
                _ => {
                    return Err(OptionError::InvalidValue {
                        name: "default".to_owned(),
                        expected: "an enum value",
                        actual: raw.describe(),
                        span: None,
                    })
                }
            }
        } else {
            default_value_string(&convert_scalar("default", ty, &raw, None, false)?)
        };

        *field.default_value = Some(value);
        Ok(())
    }

    fn convert_value(
        &self,
        name: &str,
        scope: &str,
        field: &FieldDefinition,
        raw: &RawValue<'_>,
    ) -> Result<Value, OptionError> {
        match field.ty {
            Some(ty @ (Type::Message | Type::Group)) => match raw {
                RawValue::Aggregate(text) => {
                    let message = protolink_parse::text_format::parse(name, text).map_err(
                        |err| OptionError::InvalidAggregate {
                            message: err.to_string(),
                            span: None,
                        },
                    )?;
                    let type_name = field.type_name.as_deref().unwrap_or_default();
                    let set = self.message_from_text(scope, type_name, &message)?;
                    Ok(if ty == Type::Group {
                        Value::Group(set)
                    } else {
                        Value::Message(set)
                    })
                }
                _ => Err(OptionError::InvalidValue {
                    name: name.to_owned(),
                    expected: "an aggregate value",
                    actual: raw.describe(),
                    span: None,
                }),
            },
            Some(ty) => convert_scalar(
                name,
                ty,
                raw,
                self.enum_values(field.type_name.as_deref()),
                false,
            ),
            None => Err(OptionError::InvalidValue {
                name: name.to_owned(),
                expected: "a field of known type",
                actual: raw.describe(),
                span: None,
            }),
        }
    }

    /// Builds the value of a message typed option from a text format aggregate.
    fn message_from_text(
        &self,
        scope: &str,
        message_name: &str,
        text: &text_format::Message,
    ) -> Result<OptionSet, OptionError> {
        let mut set = OptionSet::new();

        for field in &text.fields {
            match &field.name {
                text_format::FieldName::Ident(ident) => {
                    let def = self.find_text_field(message_name, &ident.value).ok_or_else(|| {
                        OptionError::UnknownOptionField {
                            name: ident.value.clone(),
                            message: message_name.to_owned(),
                            span: None,
                        }
                    })?;
                    self.set_text_field(scope, &mut set, &def, &ident.value, &field.value)?;
                }
                text_format::FieldName::Extension(name, _) => {
                    let name = name.to_string();
                    let def = match self.visible.get_field(&name) {
                        Some(def) if def.extendee.is_some() => {
                            check_extendee(&name, def, message_name)?;
                            def.clone()
                        }
                        _ => self.resolve_extension(scope, &name, message_name)?,
                    };
                    self.set_text_field(
                        scope,
                        &mut set,
                        &def,
                        &format!("[{}]", name),
                        &field.value,
                    )?;
                }
                text_format::FieldName::Any(domain, type_name, _) => {
                    if message_name != ANY {
                        return Err(OptionError::AnyNotExpected {
                            message: message_name.to_owned(),
                            span: None,
                        });
                    }
                    let type_name = type_name.to_string();
                    if !matches!(
                        self.schema(&type_name).map(|def| &def.kind),
                        Some(DefinitionKind::Message { .. })
                    ) {
                        return Err(OptionError::InvalidAnyType {
                            name: type_name,
                            span: None,
                        });
                    }
                    let url = format!("{}/{}", domain, type_name);
                    let message = match &field.value {
                        text_format::FieldValue::Message(message, _) => message,
                        _ => {
                            return Err(OptionError::InvalidValue {
                                name: format!("[{}]", url),
                                expected: "a message",
                                actual: "a scalar value".to_owned(),
                                span: None,
                            })
                        }
                    };
                    let value = self.message_from_text(scope, &type_name, message)?;

                    let already_set = || OptionError::AlreadySet {
                        name: format!("[{}]", url),
                        span: None,
                    };
                    set.set(1, Value::String(url.clone()))
                        .map_err(|()| already_set())?;
                    set.set(2, Value::Bytes(value.encode_to_vec()))
                        .map_err(|()| already_set())?;
                }
            }
        }

        Ok(set)
    }

    fn set_text_field(
        &self,
        scope: &str,
        set: &mut OptionSet,
        field: &FieldDefinition,
        name: &str,
        value: &text_format::FieldValue,
    ) -> Result<(), OptionError> {
        let values = match value {
            text_format::FieldValue::Message(message, _) => {
                vec![self.text_message_value(scope, field, name, message)?]
            }
            text_format::FieldValue::Scalar(scalar) => {
                vec![self.text_scalar_value(field, name, scalar)?]
            }
            text_format::FieldValue::MessageList(list, _) => {
                check_repeated(field, name)?;
                list.iter()
                    .map(|(message, _)| self.text_message_value(scope, field, name, message))
                    .collect::<Result<Vec<_>, _>>()?
            }
            text_format::FieldValue::ScalarList(list, _) => {
                check_repeated(field, name)?;
                list.iter()
                    .map(|scalar| self.text_scalar_value(field, name, scalar))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        for value in values {
            if field.is_repeated() {
                set.push(field.number, value);
            } else {
                set.set(field.number, value)
                    .map_err(|()| OptionError::AlreadySet {
                        name: name.to_owned(),
                        span: None,
                    })?;
            }
        }
        Ok(())
    }

    fn text_message_value(
        &self,
        scope: &str,
        field: &FieldDefinition,
        name: &str,
        message: &text_format::Message,
    ) -> Result<Value, OptionError> {
        let type_name = field.type_name.as_deref().unwrap_or_default();
        match field.ty {
            Some(Type::Message) => Ok(Value::Message(
                self.message_from_text(scope, type_name, message)?,
            )),
            Some(Type::Group) => Ok(Value::Group(
                self.message_from_text(scope, type_name, message)?,
            )),
            _ => Err(OptionError::InvalidValue {
                name: name.to_owned(),
                expected: "a scalar value",
                actual: "a message".to_owned(),
                span: None,
            }),
        }
    }

    fn text_scalar_value(
        &self,
        field: &FieldDefinition,
        name: &str,
        scalar: &text_format::Scalar,
    ) -> Result<Value, OptionError> {
        let raw = RawValue::from_scalar(scalar);
        match field.ty {
            Some(Type::Message | Type::Group) => Err(OptionError::InvalidValue {
                name: name.to_owned(),
                expected: "a message",
                actual: raw.describe(),
                span: None,
            }),
            Some(ty) => convert_scalar(
                name,
                ty,
                &raw,
                self.enum_values(field.type_name.as_deref()),
                true,
            ),
            None => Err(OptionError::InvalidValue {
                name: name.to_owned(),
                expected: "a field of known type",
                actual: raw.describe(),
                span: None,
            }),
        }
    }

    /// Looks up an extension named in an option, checking it extends `message`.
    fn resolve_extension(
        &self,
        scope: &str,
        name: &str,
        message: &str,
    ) -> Result<FieldDefinition, OptionError> {
        let (full_name, def) = self.visible.resolve(scope, name, false).ok_or_else(|| {
            OptionError::ExtensionNotFound {
                name: name.to_owned(),
                span: None,
            }
        })?;

        match &def.kind {
            DefinitionKind::Field(field) if field.extendee.is_some() => {
                check_extendee(&full_name, field, message)?;
                Ok(field.clone())
            }
            _ => Err(OptionError::NotAnExtension {
                name: full_name,
                span: None,
            }),
        }
    }

    /// Looks up a non-extension field of an options message.
    fn find_field(&self, message: &str, name: &str) -> Option<FieldDefinition> {
        self.schema_field(&join_name(message, name))
            .filter(|field| field.extendee.is_none())
            .cloned()
    }

    /// Looks up a field by name in a text format value. Groups may also be named by their type.
    fn find_text_field(&self, message: &str, name: &str) -> Option<FieldDefinition> {
        if let Some(field) = self.find_field(message, name) {
            return Some(field);
        }

        match &self.schema(message)?.kind {
            DefinitionKind::Message { fields, .. } => fields
                .iter()
                .filter_map(|field| self.schema_field(&join_name(message, field)))
                .find(|field| {
                    field.ty == Some(Type::Group)
                        && field
                            .type_name
                            .as_deref()
                            .map(|type_name| type_name.rsplit('.').next() == Some(name))
                            .unwrap_or(false)
                })
                .cloned(),
            _ => None,
        }
    }

    fn missing_required(
        &self,
        message: &str,
        set: &OptionSet,
        prefix: &str,
        missing: &mut Vec<String>,
    ) {
        let fields = match self.schema(message).map(|def| &def.kind) {
            Some(DefinitionKind::Message { fields, .. }) => fields,
            _ => return,
        };

        for name in fields {
            let field = match self.schema_field(&join_name(message, name)) {
                Some(field) => field,
                None => continue,
            };
            let path = format!("{}{}", prefix, name);
            match set.get(field.number) {
                None if field.label == Label::Required => missing.push(path),
                Some(value) if field.is_message() => {
                    if let Some(type_name) = &field.type_name {
                        for nested in messages(value) {
                            self.missing_required(
                                type_name,
                                nested,
                                &format!("{}.", path),
                                missing,
                            );
                        }
                    }
                }
                _ => (),
            }
        }
    }

    fn enum_values<'n>(&self, type_name: Option<&'n str>) -> Option<EnumValues<'n>>
    where
        'a: 'n,
    {
        let type_name = type_name?;
        match self.schema(type_name)? {
            Definition {
                kind: DefinitionKind::Enum { closed, values },
                ..
            } => Some(EnumValues {
                name: type_name.strip_prefix('.').unwrap_or(type_name),
                values,
                closed: *closed,
            }),
            _ => None,
        }
    }

    /// Looks up a definition among the files reachable from this one, falling back to the
    /// built-in descriptor types.
    fn schema(&self, name: &str) -> Option<&'a Definition> {
        self.reachable
            .get(name)
            .or_else(|| GOOGLE_DESCRIPTOR_NAMES.get(name))
    }

    fn schema_field(&self, name: &str) -> Option<&'a FieldDefinition> {
        match &self.schema(name)?.kind {
            DefinitionKind::Field(field) => Some(field),
            _ => None,
        }
    }

    fn pop_path(&mut self, n: usize) {
        debug_assert!(self.path.len() >= n);
        self.path.truncate(self.path.len() - n);
    }
}

impl Rename {
    fn apply(&self, info: &mut SourceCodeInfo) {
        rename_locations(info, &self.element, |suffix| match suffix {
            [options_tag, tag::UNINTERPRETED_OPTION, index, rest @ ..]
                if *options_tag == self.options_tag =>
            {
                let mut path = match self.suffixes.get(*index as usize) {
                    Some(new) => new.clone(),
                    None => return Some(suffix.to_vec()),
                };
                path.extend_from_slice(rest);
                Some(path)
            }
            _ => Some(suffix.to_vec()),
        });
    }
}

fn pseudo_option(option: &UninterpretedOption) -> Option<PseudoOption> {
    match option.name.as_slice() {
        [part] if !part.is_extension => match part.name_part.as_str() {
            "json_name" => Some(PseudoOption::JsonName),
            "default" => Some(PseudoOption::Default),
            _ => None,
        },
        _ => None,
    }
}

fn option_name(option: &UninterpretedOption) -> String {
    let mut name = String::new();
    for (index, part) in option.name.iter().enumerate() {
        if index != 0 {
            name.push('.');
        }
        if part.is_extension {
            name.push('(');
            name.push_str(&part.name_part);
            name.push(')');
        } else {
            name.push_str(&part.name_part);
        }
    }
    name
}

fn check_extendee(name: &str, field: &FieldDefinition, message: &str) -> Result<(), OptionError> {
    match field.extendee.as_deref() {
        Some(extendee) if extendee == message => Ok(()),
        extendee => Err(OptionError::ExtensionWrongExtendee {
            name: name.to_owned(),
            extendee: extendee.unwrap_or_default().to_owned(),
            expected: message.to_owned(),
            span: None,
        }),
    }
}

fn check_repeated(field: &FieldDefinition, name: &str) -> Result<(), OptionError> {
    if field.is_repeated() {
        Ok(())
    } else {
        Err(OptionError::InvalidValue {
            name: name.to_owned(),
            expected: "a single value",
            actual: "a list".to_owned(),
            span: None,
        })
    }
}

/// The messages held by an option value, including the elements of a repeated field.
fn messages(value: &Value) -> Vec<&OptionSet> {
    match value {
        Value::Message(message) | Value::Group(message) => vec![message],
        Value::List(values) => values.iter().flat_map(messages).collect(),
        _ => Vec::new(),
    }
}
