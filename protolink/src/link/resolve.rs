use protolink_parse::tag;

use crate::{
    types::{
        field_descriptor_proto::Type, DescriptorProto, FieldDescriptorProto, FileDescriptorProto,
        ServiceDescriptorProto,
    },
    Error,
};

use super::{join_name, Diagnostics, DefinitionKind, LinkError, NameMap};

/// Rewrites every type reference in the file to a fully-qualified name.
pub(super) fn resolve_file(
    file: &mut FileDescriptorProto,
    names: &NameMap,
    diagnostics: &mut Diagnostics<'_, '_>,
) -> Result<(), Error> {
    let package = file.package.clone().unwrap_or_default();
    let mut resolver = Resolver {
        names,
        diagnostics,
        path: Vec::new(),
    };

    for (index, message) in file.message_type.iter_mut().enumerate() {
        resolver.path.extend([tag::file::MESSAGE_TYPE, index as i32]);
        resolver.resolve_message(&package, message)?;
        resolver.pop_path(2);
    }

    for (index, extension) in file.extension.iter_mut().enumerate() {
        resolver.path.extend([tag::file::EXTENSION, index as i32]);
        resolver.resolve_field(&package, extension)?;
        resolver.pop_path(2);
    }

    for (index, service) in file.service.iter_mut().enumerate() {
        resolver.path.extend([tag::file::SERVICE, index as i32]);
        resolver.resolve_service(&package, service)?;
        resolver.pop_path(2);
    }

    Ok(())
}

struct Resolver<'a, 'b, 'c> {
    names: &'a NameMap,
    diagnostics: &'a mut Diagnostics<'b, 'c>,
    path: Vec<i32>,
}

impl<'a, 'b, 'c> Resolver<'a, 'b, 'c> {
    fn resolve_message(&mut self, scope: &str, message: &mut DescriptorProto) -> Result<(), Error> {
        let full_name = join_name(scope, message.name.as_deref().unwrap_or_default());

        for (index, field) in message.field.iter_mut().enumerate() {
            self.path.extend([tag::message::FIELD, index as i32]);
            self.resolve_field(&full_name, field)?;
            self.pop_path(2);
        }

        for (index, extension) in message.extension.iter_mut().enumerate() {
            self.path.extend([tag::message::EXTENSION, index as i32]);
            self.resolve_field(&full_name, extension)?;
            self.pop_path(2);
        }

        for (index, nested) in message.nested_type.iter_mut().enumerate() {
            self.path.extend([tag::message::NESTED_TYPE, index as i32]);
            self.resolve_message(&full_name, nested)?;
            self.pop_path(2);
        }

        Ok(())
    }

    fn resolve_field(&mut self, scope: &str, field: &mut FieldDescriptorProto) -> Result<(), Error> {
        if let Some(extendee) = &field.extendee {
            match self.names.resolve(scope, extendee, true) {
                Some((full_name, def)) => match def.kind {
                    DefinitionKind::Message { .. } => {
                        field.extendee = Some(format!(".{}", full_name));
                    }
                    _ => self.report(
                        LinkError::InvalidExtendee {
                            name: extendee.clone(),
                            span: None,
                        },
                        tag::field::EXTENDEE,
                    )?,
                },
                None => self.report(
                    LinkError::NameNotFound {
                        name: extendee.clone(),
                        span: None,
                    },
                    tag::field::EXTENDEE,
                )?,
            }
        }

        if let Some(type_name) = &field.type_name {
            match self.names.resolve(scope, type_name, true) {
                Some((full_name, def)) => match def.kind {
                    DefinitionKind::Message { .. } => {
                        if field.r#type != Some(Type::Group as i32) {
                            field.r#type = Some(Type::Message as i32);
                        }
                        field.type_name = Some(format!(".{}", full_name));
                    }
                    DefinitionKind::Enum { .. } => {
                        field.r#type = Some(Type::Enum as i32);
                        field.type_name = Some(format!(".{}", full_name));
                    }
                    _ => self.report(
                        LinkError::InvalidFieldType {
                            name: type_name.clone(),
                            span: None,
                        },
                        tag::field::TYPE_NAME,
                    )?,
                },
                None => self.report(
                    LinkError::NameNotFound {
                        name: type_name.clone(),
                        span: None,
                    },
                    tag::field::TYPE_NAME,
                )?,
            }
        }

        Ok(())
    }

    fn resolve_service(
        &mut self,
        scope: &str,
        service: &mut ServiceDescriptorProto,
    ) -> Result<(), Error> {
        let full_name = join_name(scope, service.name.as_deref().unwrap_or_default());

        for (index, method) in service.method.iter_mut().enumerate() {
            self.path.extend([tag::service::METHOD, index as i32]);
            for (field_tag, kind, type_name) in [
                (tag::method::INPUT_TYPE, "input", &mut method.input_type),
                (tag::method::OUTPUT_TYPE, "output", &mut method.output_type),
            ] {
                let Some(name) = type_name.as_deref() else {
                    continue;
                };

                match self.names.resolve(&full_name, name, true) {
                    Some((resolved, def)) => match def.kind {
                        DefinitionKind::Message { .. } => {
                            *type_name = Some(format!(".{}", resolved));
                        }
                        _ => self.report(
                            LinkError::InvalidMethodType {
                                name: name.to_owned(),
                                kind,
                                span: None,
                            },
                            field_tag,
                        )?,
                    },
                    None => self.report(
                        LinkError::NameNotFound {
                            name: name.to_owned(),
                            span: None,
                        },
                        field_tag,
                    )?,
                }
            }
            self.pop_path(2);
        }

        Ok(())
    }

    /// Reports an error positioned at the given field of the current element.
    fn report(&mut self, mut err: LinkError, field_tag: i32) -> Result<(), Error> {
        self.path.push(field_tag);
        let located = self.diagnostics.span(&self.path);
        self.path.pop();

        match &mut err {
            LinkError::NameNotFound { span, .. }
            | LinkError::InvalidExtendee { span, .. }
            | LinkError::InvalidFieldType { span, .. }
            | LinkError::InvalidMethodType { span, .. } => *span = located,
            _ => (),
        }
        self.diagnostics.report(err)
    }

    fn pop_path(&mut self, n: usize) {
        self.path.truncate(self.path.len() - n);
    }
}
