use std::collections::HashMap;

use protolink_parse::{case::to_lower_without_underscores, tag};

use crate::{
    types::{
        field_descriptor_proto::{Label, Type},
        DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    },
    Error,
};

use super::{join_name, Diagnostics, DefinitionKind, LinkError, NameMap};

/// `EnumOptions.allow_alias`
const ALLOW_ALIAS: i32 = 2;

/// Checks the semantic rules which need resolved names and interpreted options.
pub(super) fn validate_file(
    file: &FileDescriptorProto,
    reachable: &NameMap,
    diagnostics: &mut Diagnostics<'_, '_>,
) -> Result<(), Error> {
    let mut extension_numbers = HashMap::new();
    for (name, def) in reachable.iter() {
        if def.file == diagnostics.file_name() {
            continue;
        }
        if let DefinitionKind::Field(field) = &def.kind {
            if let Some(extendee) = &field.extendee {
                extension_numbers.insert((extendee.clone(), field.number), name.to_owned());
            }
        }
    }

    let mut validator = Validator {
        reachable,
        diagnostics,
        proto3: file.syntax.as_deref() == Some("proto3"),
        extension_numbers,
        path: Vec::new(),
    };

    let package = file.package.as_deref().unwrap_or_default();

    for (index, message) in file.message_type.iter().enumerate() {
        validator.path.extend([tag::file::MESSAGE_TYPE, index as i32]);
        validator.validate_message(package, message)?;
        validator.pop_path(2);
    }

    for (index, enum_) in file.enum_type.iter().enumerate() {
        validator.path.extend([tag::file::ENUM_TYPE, index as i32]);
        validator.validate_enum(enum_)?;
        validator.pop_path(2);
    }

    for (index, extension) in file.extension.iter().enumerate() {
        validator.path.extend([tag::file::EXTENSION, index as i32]);
        validator.validate_extension(package, extension)?;
        validator.pop_path(2);
    }

    Ok(())
}

struct Validator<'a, 'b, 'c> {
    reachable: &'a NameMap,
    diagnostics: &'a mut Diagnostics<'b, 'c>,
    proto3: bool,
    /// Maps an extendee and number to the full name of the extension using it.
    extension_numbers: HashMap<(String, i32), String>,
    path: Vec<i32>,
}

/// A reserved or extension range, with an exclusive end.
#[derive(Debug)]
struct NumberRange {
    start: i32,
    end: i32,
    path: Vec<i32>,
}

impl<'a, 'b, 'c> Validator<'a, 'b, 'c> {
    fn validate_message(&mut self, scope: &str, message: &DescriptorProto) -> Result<(), Error> {
        let full_name = join_name(scope, message.name.as_deref().unwrap_or_default());

        let mut numbers: HashMap<i32, usize> = HashMap::new();
        let mut camel_case_names: HashMap<String, usize> = HashMap::new();
        for (index, field) in message.field.iter().enumerate() {
            self.path.extend([tag::message::FIELD, index as i32]);
            self.validate_field(message, field)?;

            let number = field.number.unwrap_or(0);
            if let Some(&first) = numbers.get(&number) {
                self.report(LinkError::DuplicateFieldNumber {
                    number,
                    first: self.field_span(first, tag::field::NUMBER),
                    first_name: message.field[first].name.clone().unwrap_or_default(),
                    second: self.span(tag::field::NUMBER),
                    second_name: field.name.clone().unwrap_or_default(),
                })?;
            } else {
                numbers.insert(number, index);
            }

            if self.proto3 {
                let lower = to_lower_without_underscores(field.name.as_deref().unwrap_or_default());
                if let Some(&first) = camel_case_names.get(&lower) {
                    self.report(LinkError::DuplicateCamelCaseFieldName {
                        first_name: message.field[first].name.clone().unwrap_or_default(),
                        second_name: field.name.clone().unwrap_or_default(),
                        first: self.field_span(first, tag::field::NAME),
                        second: self.span(tag::field::NAME),
                    })?;
                } else {
                    camel_case_names.insert(lower, index);
                }
            }

            self.pop_path(2);
        }

        let mut ranges: Vec<NumberRange> = message
            .reserved_range
            .iter()
            .enumerate()
            .map(|(index, range)| NumberRange {
                start: range.start.unwrap_or(0),
                end: range.end.unwrap_or(0),
                path: [&self.path[..], &[tag::message::RESERVED_RANGE, index as i32]].concat(),
            })
            .collect();
        ranges.extend(message.extension_range.iter().enumerate().map(|(index, range)| {
            NumberRange {
                start: range.start.unwrap_or(0),
                end: range.end.unwrap_or(0),
                path: [&self.path[..], &[tag::message::EXTENSION_RANGE, index as i32]].concat(),
            }
        }));
        self.validate_ranges(ranges)?;

        for (index, extension) in message.extension.iter().enumerate() {
            self.path.extend([tag::message::EXTENSION, index as i32]);
            self.validate_extension(&full_name, extension)?;
            self.pop_path(2);
        }

        for (index, nested) in message.nested_type.iter().enumerate() {
            self.path.extend([tag::message::NESTED_TYPE, index as i32]);
            self.validate_message(&full_name, nested)?;
            self.pop_path(2);
        }

        for (index, enum_) in message.enum_type.iter().enumerate() {
            self.path.extend([tag::message::ENUM_TYPE, index as i32]);
            self.validate_enum(enum_)?;
            self.pop_path(2);
        }

        Ok(())
    }

    fn validate_field(
        &mut self,
        message: &DescriptorProto,
        field: &FieldDescriptorProto,
    ) -> Result<(), Error> {
        let name = field.name.as_deref().unwrap_or_default();
        let number = field.number.unwrap_or(0);

        if self.proto3 && field.label == Some(Label::Required as i32) {
            self.report(LinkError::Proto3RequiredLabel {
                span: self.span(tag::field::LABEL),
            })?;
        }

        if self.proto3 && field.r#type == Some(Type::Enum as i32) {
            if let Some(type_name) = field.type_name.as_deref() {
                let enum_name = type_name.strip_prefix('.').unwrap_or(type_name);
                if let Some(DefinitionKind::Enum { closed: true, .. }) =
                    self.reachable.get(enum_name).map(|def| &def.kind)
                {
                    self.report(LinkError::Proto3ClosedEnum {
                        enum_name: enum_name.to_owned(),
                        span: self.span(tag::field::TYPE_NAME),
                    })?;
                }
            }
        }

        if message.reserved_range.iter().any(|range| {
            range.start.unwrap_or(0) <= number && number < range.end.unwrap_or(0)
        }) {
            self.report(LinkError::ReservedNumber {
                kind: "field",
                name: name.to_owned(),
                number,
                span: self.span(tag::field::NUMBER),
            })?;
        }

        if message.reserved_name.iter().any(|reserved| reserved == name) {
            self.report(LinkError::ReservedName {
                kind: "field",
                name: name.to_owned(),
                span: self.span(tag::field::NAME),
            })?;
        }

        if message.extension_range.iter().any(|range| {
            range.start.unwrap_or(0) <= number && number < range.end.unwrap_or(0)
        }) {
            self.report(LinkError::FieldNumberInExtensionRange {
                name: name.to_owned(),
                number,
                span: self.span(tag::field::NUMBER),
            })?;
        }

        Ok(())
    }

    fn validate_extension(
        &mut self,
        scope: &str,
        extension: &FieldDescriptorProto,
    ) -> Result<(), Error> {
        // Extensions which failed to resolve have already been reported.
        let Some(extendee) = extension.extendee.as_deref() else {
            return Ok(());
        };
        let extendee = extendee.strip_prefix('.').unwrap_or(extendee);
        let name = join_name(scope, extension.name.as_deref().unwrap_or_default());
        let number = extension.number.unwrap_or(0);

        if self.proto3 && !is_options_message(extendee) {
            self.report(LinkError::Proto3Extension {
                extendee: extendee.to_owned(),
                span: self.span(tag::field::EXTENDEE),
            })?;
        }

        if let Some(DefinitionKind::Message {
            extension_ranges, ..
        }) = self.reachable.get(extendee).map(|def| &def.kind)
        {
            if !extension_ranges.iter().any(|range| range.contains(&number)) {
                let help = if extension_ranges.is_empty() {
                    None
                } else {
                    let ranges: Vec<String> = extension_ranges
                        .iter()
                        .map(|range| {
                            if range.end - range.start == 1 {
                                range.start.to_string()
                            } else {
                                format!("{} to {}", range.start, range.end - 1)
                            }
                        })
                        .collect();
                    Some(format!(
                        "available extension numbers are {}",
                        ranges.join(", ")
                    ))
                };
                self.report(LinkError::ExtensionNumberOutOfRange {
                    extendee: extendee.to_owned(),
                    number,
                    help,
                    span: self.span(tag::field::NUMBER),
                })?;
            }
        }

        let key = (extendee.to_owned(), number);
        match self.extension_numbers.get(&key) {
            Some(first_name) if *first_name != name => {
                let first_name = first_name.clone();
                self.report(LinkError::DuplicateExtensionNumber {
                    extendee: extendee.to_owned(),
                    number,
                    first_name,
                    span: self.span(tag::field::NUMBER),
                    second_name: name,
                })?;
            }
            Some(_) => (),
            None => {
                self.extension_numbers.insert(key, name);
            }
        }

        Ok(())
    }

    fn validate_enum(&mut self, enum_: &EnumDescriptorProto) -> Result<(), Error> {
        let enum_name = enum_.name.as_deref().unwrap_or_default();

        if self.proto3 {
            if let Some(first) = enum_.value.first() {
                if first.number.unwrap_or(0) != 0 {
                    self.report(LinkError::Proto3EnumFirstValueNonZero {
                        enum_name: enum_name.to_owned(),
                        span: self.span_at(&[tag::enum_::VALUE, 0, tag::enum_value::NUMBER]),
                    })?;
                }
            }
        }

        let allow_alias = enum_
            .options
            .as_ref()
            .and_then(|options| options.get_bool(ALLOW_ALIAS))
            .unwrap_or(false);

        let mut numbers: HashMap<i32, usize> = HashMap::new();
        for (index, value) in enum_.value.iter().enumerate() {
            let name = value.name.as_deref().unwrap_or_default();
            let number = value.number.unwrap_or(0);
            let number_path = [tag::enum_::VALUE, index as i32, tag::enum_value::NUMBER];

            match numbers.get(&number) {
                Some(&first) if !allow_alias => {
                    self.report(LinkError::DuplicateEnumNumber {
                        number,
                        first: self.span_at(&[
                            tag::enum_::VALUE,
                            first as i32,
                            tag::enum_value::NUMBER,
                        ]),
                        first_name: enum_.value[first].name.clone().unwrap_or_default(),
                        second: self.span_at(&number_path),
                        second_name: name.to_owned(),
                    })?;
                }
                Some(_) => (),
                None => {
                    numbers.insert(number, index);
                }
            }

            // Enum reserved ranges are inclusive.
            if enum_.reserved_range.iter().any(|range| {
                range.start.unwrap_or(0) <= number && number <= range.end.unwrap_or(0)
            }) {
                self.report(LinkError::ReservedNumber {
                    kind: "enum value",
                    name: name.to_owned(),
                    number,
                    span: self.span_at(&number_path),
                })?;
            }

            if enum_.reserved_name.iter().any(|reserved| reserved == name) {
                self.report(LinkError::ReservedName {
                    kind: "enum value",
                    name: name.to_owned(),
                    span: self.span_at(&[tag::enum_::VALUE, index as i32, tag::enum_value::NAME]),
                })?;
            }
        }

        let ranges = enum_
            .reserved_range
            .iter()
            .enumerate()
            .map(|(index, range)| NumberRange {
                start: range.start.unwrap_or(0),
                end: range.end.unwrap_or(0).saturating_add(1),
                path: [&self.path[..], &[tag::enum_::RESERVED_RANGE, index as i32]].concat(),
            })
            .collect();
        self.validate_ranges(ranges)
    }

    /// Reports each range which overlaps an earlier one. Ends are shown inclusive.
    fn validate_ranges(&mut self, mut ranges: Vec<NumberRange>) -> Result<(), Error> {
        ranges.sort_by_key(|range| range.start);
        let mut furthest: Option<usize> = None;
        for index in 0..ranges.len() {
            if let Some(first) = furthest {
                if ranges[index].start < ranges[first].end {
                    let (first, second) = (&ranges[first], &ranges[index]);
                    let err = LinkError::OverlappingRanges {
                        first_start: first.start,
                        first_end: first.end - 1,
                        second_start: second.start,
                        second_end: second.end - 1,
                        first: self.diagnostics.span(&first.path),
                        second: self.diagnostics.span(&second.path),
                    };
                    self.diagnostics.report(err)?;
                }
            }
            if furthest.map_or(true, |first| ranges[index].end > ranges[first].end) {
                furthest = Some(index);
            }
        }
        Ok(())
    }

    fn report(&mut self, err: LinkError) -> Result<(), Error> {
        self.diagnostics.report(err)
    }

    /// The span of a field of the current element, falling back to the whole element.
    fn span(&self, field_tag: i32) -> Option<miette::SourceSpan> {
        self.span_at(&[field_tag])
    }

    fn span_at(&self, suffix: &[i32]) -> Option<miette::SourceSpan> {
        let path = [&self.path[..], suffix].concat();
        self.diagnostics
            .span(&path)
            .or_else(|| self.diagnostics.span(&self.path))
    }

    /// The span of a field of a sibling field of the current element.
    fn field_span(&self, index: usize, field_tag: i32) -> Option<miette::SourceSpan> {
        let mut path = self.path[..self.path.len() - 1].to_vec();
        path.extend([index as i32, field_tag]);
        self.diagnostics.span(&path)
    }

    fn pop_path(&mut self, n: usize) {
        self.path.truncate(self.path.len() - n);
    }
}

/// Returns true for the options messages defined in `google/protobuf/descriptor.proto`.
fn is_options_message(name: &str) -> bool {
    name.strip_prefix("google.protobuf.")
        .is_some_and(|name| name.ends_with("Options") && !name.contains('.'))
}
