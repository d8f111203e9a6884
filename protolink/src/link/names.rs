use std::{
    collections::{hash_map, HashMap},
    ops::Range,
};

use once_cell::sync::Lazy;
use protolink_parse::tag;

use crate::{
    file::WELL_KNOWN_POOL,
    types::{
        self,
        field_descriptor_proto::{Label, Type},
        DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    },
};

/// Every definition visible from a file, keyed by fully-qualified name without a leading `.`.
#[derive(Debug, Clone, Default)]
pub(crate) struct NameMap {
    map: HashMap<String, Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Definition {
    /// The file declaring this definition.
    pub file: String,
    /// The source code info path of the definition within its file.
    pub path: Vec<i32>,
    pub kind: DefinitionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DefinitionKind {
    Package,
    Message {
        map_entry: bool,
        /// The names of the fields of this message, in declaration order.
        fields: Vec<String>,
        extension_ranges: Vec<Range<i32>>,
    },
    Enum {
        closed: bool,
        values: Vec<(String, i32)>,
    },
    EnumValue {
        parent: String,
        number: i32,
    },
    Field(FieldDefinition),
    Oneof,
    Service,
    Method,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldDefinition {
    pub name: String,
    pub number: i32,
    pub label: Label,
    pub ty: Option<Type>,
    /// The type name, without a leading `.` once the declaring file is resolved.
    pub type_name: Option<String>,
    /// Set for extensions.
    pub extendee: Option<String>,
}

/// Two definitions with the same name.
#[derive(Debug, Clone)]
pub(crate) struct Duplicate {
    pub name: String,
    pub first: Definition,
    pub second: Definition,
}

/// The names defined by `google/protobuf/descriptor.proto`, used when a file does not import it.
pub(crate) static GOOGLE_DESCRIPTOR_NAMES: Lazy<NameMap> = Lazy::new(|| {
    match WELL_KNOWN_POOL.get_file_by_name("google/protobuf/descriptor.proto") {
        Some(file) => {
            let file: FileDescriptorProto = types::transcode(file.file_descriptor_proto());
            NameMap::from_file(&file, "google/protobuf/descriptor.proto").0
        }
        None => NameMap::default(),
    }
});

/// Lists the scopes searched when resolving a relative name, innermost first.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(create_prefix_list("a.b.c"), ["a.b.c", "a.b", "a", ""]);
/// assert_eq!(create_prefix_list(""), [""]);
/// ```
pub(crate) fn create_prefix_list(scope: &str) -> Vec<&str> {
    let mut prefixes = vec![scope];
    let mut rest = scope;
    while let Some(dot) = rest.rfind('.') {
        rest = &rest[..dot];
        prefixes.push(rest);
    }
    if !scope.is_empty() {
        prefixes.push("");
    }
    prefixes
}

pub(crate) fn join_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", scope, name)
    }
}

impl NameMap {
    /// Collects every definition of a file, along with any names defined twice.
    pub fn from_file(file: &FileDescriptorProto, file_name: &str) -> (Self, Vec<Duplicate>) {
        let mut builder = NameBuilder {
            map: NameMap::default(),
            file: file_name,
            closed_enums: file.syntax.as_deref() != Some("proto3"),
            path: Vec::new(),
            duplicates: Vec::new(),
        };
        builder.add_file(file);
        (builder.map, builder.duplicates)
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.map.get(name)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        match &self.get(name)?.kind {
            DefinitionKind::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Definition)> {
        self.map.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Adds a definition, returning the existing definition if the name is taken.
    ///
    /// Packages may be declared by any number of files.
    pub fn insert(&mut self, name: String, def: Definition) -> Result<(), Definition> {
        match self.map.entry(name) {
            hash_map::Entry::Vacant(entry) => {
                entry.insert(def);
                Ok(())
            }
            hash_map::Entry::Occupied(entry) => {
                let existing = entry.get();
                if (existing.kind == DefinitionKind::Package && def.kind == DefinitionKind::Package)
                    || (existing.file == def.file && existing.path == def.path)
                {
                    Ok(())
                } else {
                    Err(existing.clone())
                }
            }
        }
    }

    /// Adds every definition of `other`, returning the names which were already taken.
    pub fn merge(&mut self, other: &NameMap) -> Vec<Duplicate> {
        let mut duplicates = Vec::new();
        for (name, def) in &other.map {
            if let Err(first) = self.insert(name.clone(), def.clone()) {
                duplicates.push(Duplicate {
                    name: name.clone(),
                    first,
                    second: def.clone(),
                });
            }
        }
        duplicates
    }

    /// Adds every definition of `other` whose name is not yet taken.
    pub fn extend(&mut self, other: &NameMap) {
        for (name, def) in &other.map {
            self.map
                .entry(name.clone())
                .or_insert_with(|| def.clone());
        }
    }

    /// Resolves a name relative to `scope`, following the protobuf scoping rules.
    ///
    /// A name starting with `.` is fully-qualified. Otherwise the first component of the name is
    /// looked up in each enclosing scope, innermost first. If the name has more components, the
    /// first match must be a package, message or enum for the search to stop there. If
    /// `types_only` is set, a single-component match must be a message or enum.
    pub fn resolve<'a>(
        &'a self,
        scope: &str,
        name: &str,
        types_only: bool,
    ) -> Option<(String, &'a Definition)> {
        if let Some(full_name) = name.strip_prefix('.') {
            return self
                .map
                .get_key_value(full_name)
                .map(|(name, def)| (name.clone(), def));
        }

        let (first, rest) = match name.find('.') {
            Some(dot) => (&name[..dot], Some(&name[dot..])),
            None => (name, None),
        };

        for prefix in create_prefix_list(scope) {
            if prefix.is_empty() {
                return self
                    .map
                    .get_key_value(name)
                    .map(|(name, def)| (name.clone(), def));
            }

            let candidate = join_name(prefix, first);
            if let Some(def) = self.map.get(&candidate) {
                match rest {
                    Some(rest) if def.kind.is_aggregate() => {
                        let full_name = candidate + rest;
                        return self.map.get(&full_name).map(|def| (full_name, def));
                    }
                    Some(_) => continue,
                    None if types_only && !def.kind.is_type() => continue,
                    None => return Some((candidate, def)),
                }
            }
        }

        None
    }
}

impl DefinitionKind {
    pub fn describe(&self) -> &'static str {
        match self {
            DefinitionKind::Package => "a package",
            DefinitionKind::Message { .. } => "a message",
            DefinitionKind::Enum { .. } => "an enum",
            DefinitionKind::EnumValue { .. } => "an enum value",
            DefinitionKind::Field(field) if field.extendee.is_some() => "an extension",
            DefinitionKind::Field(_) => "a field",
            DefinitionKind::Oneof => "a oneof",
            DefinitionKind::Service => "a service",
            DefinitionKind::Method => "a method",
        }
    }

    fn is_aggregate(&self) -> bool {
        matches!(
            self,
            DefinitionKind::Package | DefinitionKind::Message { .. } | DefinitionKind::Enum { .. }
        )
    }

    fn is_type(&self) -> bool {
        matches!(
            self,
            DefinitionKind::Message { .. } | DefinitionKind::Enum { .. }
        )
    }
}

impl FieldDefinition {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_message(&self) -> bool {
        matches!(self.ty, Some(Type::Message | Type::Group))
    }
}

struct NameBuilder<'a> {
    map: NameMap,
    file: &'a str,
    closed_enums: bool,
    path: Vec<i32>,
    duplicates: Vec<Duplicate>,
}

impl<'a> NameBuilder<'a> {
    fn add_file(&mut self, file: &FileDescriptorProto) {
        let package = file.package.as_deref().unwrap_or_default();
        if !package.is_empty() {
            self.path.push(tag::file::PACKAGE);
            let mut end = 0;
            for part in package.split('.') {
                end += part.len();
                self.add(package[..end].to_owned(), DefinitionKind::Package);
                end += 1;
            }
            self.path.pop();
        }

        for (index, message) in file.message_type.iter().enumerate() {
            self.path.extend([tag::file::MESSAGE_TYPE, index as i32]);
            self.add_message(package, message);
            self.path.truncate(self.path.len() - 2);
        }

        for (index, enum_) in file.enum_type.iter().enumerate() {
            self.path.extend([tag::file::ENUM_TYPE, index as i32]);
            self.add_enum(package, enum_);
            self.path.truncate(self.path.len() - 2);
        }

        for (index, extension) in file.extension.iter().enumerate() {
            self.path.extend([tag::file::EXTENSION, index as i32]);
            self.add_field(package, extension);
            self.path.truncate(self.path.len() - 2);
        }

        for (index, service) in file.service.iter().enumerate() {
            self.path.extend([tag::file::SERVICE, index as i32]);
            let service_name = join_name(package, service.name.as_deref().unwrap_or_default());
            self.add(service_name.clone(), DefinitionKind::Service);
            for (index, method) in service.method.iter().enumerate() {
                self.path.extend([tag::service::METHOD, index as i32]);
                self.add(
                    join_name(&service_name, method.name.as_deref().unwrap_or_default()),
                    DefinitionKind::Method,
                );
                self.path.truncate(self.path.len() - 2);
            }
            self.path.truncate(self.path.len() - 2);
        }
    }

    fn add_message(&mut self, scope: &str, message: &DescriptorProto) {
        let full_name = join_name(scope, message.name.as_deref().unwrap_or_default());

        let map_entry = message
            .options
            .as_ref()
            .and_then(|options| options.get_bool(MAP_ENTRY))
            .unwrap_or(false);
        self.add(
            full_name.clone(),
            DefinitionKind::Message {
                map_entry,
                fields: message
                    .field
                    .iter()
                    .map(|field| field.name.clone().unwrap_or_default())
                    .collect(),
                extension_ranges: message
                    .extension_range
                    .iter()
                    .map(|range| range.start.unwrap_or(0)..range.end.unwrap_or(0))
                    .collect(),
            },
        );

        for (index, field) in message.field.iter().enumerate() {
            self.path.extend([tag::message::FIELD, index as i32]);
            self.add_field(&full_name, field);
            self.path.truncate(self.path.len() - 2);
        }

        for (index, oneof) in message.oneof_decl.iter().enumerate() {
            self.path.extend([tag::message::ONEOF_DECL, index as i32]);
            self.add(
                join_name(&full_name, oneof.name.as_deref().unwrap_or_default()),
                DefinitionKind::Oneof,
            );
            self.path.truncate(self.path.len() - 2);
        }

        for (index, nested) in message.nested_type.iter().enumerate() {
            self.path.extend([tag::message::NESTED_TYPE, index as i32]);
            self.add_message(&full_name, nested);
            self.path.truncate(self.path.len() - 2);
        }

        for (index, enum_) in message.enum_type.iter().enumerate() {
            self.path.extend([tag::message::ENUM_TYPE, index as i32]);
            self.add_enum(&full_name, enum_);
            self.path.truncate(self.path.len() - 2);
        }

        for (index, extension) in message.extension.iter().enumerate() {
            self.path.extend([tag::message::EXTENSION, index as i32]);
            self.add_field(&full_name, extension);
            self.path.truncate(self.path.len() - 2);
        }
    }

    fn add_field(&mut self, scope: &str, field: &FieldDescriptorProto) {
        let name = field.name.clone().unwrap_or_default();
        let strip = |name: &Option<String>| {
            name.as_deref()
                .map(|name| name.strip_prefix('.').unwrap_or(name).to_owned())
        };
        self.add(
            join_name(scope, &name),
            DefinitionKind::Field(FieldDefinition {
                number: field.number.unwrap_or(0),
                label: field.label(),
                ty: field.r#type.and_then(|ty| Type::try_from(ty).ok()),
                type_name: strip(&field.type_name),
                extendee: strip(&field.extendee),
                name,
            }),
        );
    }

    fn add_enum(&mut self, scope: &str, enum_: &EnumDescriptorProto) {
        let full_name = join_name(scope, enum_.name.as_deref().unwrap_or_default());
        self.add(
            full_name.clone(),
            DefinitionKind::Enum {
                closed: self.closed_enums,
                values: enum_
                    .value
                    .iter()
                    .map(|value| {
                        (
                            value.name.clone().unwrap_or_default(),
                            value.number.unwrap_or(0),
                        )
                    })
                    .collect(),
            },
        );

        // Enum values are siblings of their enum, following C++ scoping rules.
        for (index, value) in enum_.value.iter().enumerate() {
            self.path.extend([tag::enum_::VALUE, index as i32]);
            self.add(
                join_name(scope, value.name.as_deref().unwrap_or_default()),
                DefinitionKind::EnumValue {
                    parent: full_name.clone(),
                    number: value.number.unwrap_or(0),
                },
            );
            self.path.truncate(self.path.len() - 2);
        }
    }

    fn add(&mut self, name: String, kind: DefinitionKind) {
        let def = Definition {
            file: self.file.to_owned(),
            path: self.path.clone(),
            kind,
        };
        if let Err(first) = self.map.insert(name.clone(), def.clone()) {
            self.duplicates.push(Duplicate {
                name,
                first,
                second: def,
            });
        }
    }
}

/// `MessageOptions.map_entry`
const MAP_ENTRY: i32 = 7;
