use std::collections::HashSet;

use logos::Span;
use prost_types::{
    descriptor_proto, enum_descriptor_proto, field_descriptor_proto, source_code_info::Location,
    uninterpreted_option, DescriptorProto, EnumDescriptorProto, EnumOptions,
    EnumValueDescriptorProto, EnumValueOptions, ExtensionRangeOptions, FieldDescriptorProto,
    FieldOptions, FileDescriptorProto, FileOptions, MessageOptions, MethodDescriptorProto,
    MethodOptions, OneofDescriptorProto, OneofOptions, ServiceDescriptorProto, ServiceOptions,
    SourceCodeInfo, UninterpretedOption,
};

use crate::{
    ast,
    case::{to_json_name, to_pascal_case},
    index_to_i32,
    lines::LineResolver,
    tag, MAX_MESSAGE_FIELD_NUMBER,
};


/// Convert the AST to a FileDescriptorProto, generating map entry messages, group messages and
/// synthetic oneofs. Options are left uninterpreted.
pub(crate) fn generate_file(file: &ast::File, name: &str, source: &str) -> FileDescriptorProto {
    let lines = LineResolver::new(source);
    let mut ctx = Context {
        syntax: file.syntax(),
        path: vec![],
        locations: vec![],
        lines: &lines,
    };

    let descriptor = ctx.generate_file_descriptor(file);

    FileDescriptorProto {
        name: Some(name.to_owned()),
        source_code_info: Some(SourceCodeInfo {
            location: ctx.locations,
        }),
        ..descriptor
    }
}

struct Context<'a> {
    syntax: ast::Syntax,
    path: Vec<i32>,
    locations: Vec<Location>,
    lines: &'a LineResolver,
}

/// Where newly generated fields and nested messages are added.
struct FieldTarget<'b> {
    field_tag: i32,
    fields: &'b mut Vec<FieldDescriptorProto>,
    message_tag: i32,
    messages: &'b mut Vec<DescriptorProto>,
}

impl<'a> Context<'a> {
    fn generate_file_descriptor(&mut self, file: &ast::File) -> FileDescriptorProto {
        self.add_span(file.span.clone());

        if let Some(syntax) = &file.syntax {
            self.add_comments_for(&[tag::file::SYNTAX], syntax.span.clone(), &syntax.comments);
        }

        let mut descriptor = FileDescriptorProto::default();
        let mut options = Vec::new();

        for item in &file.items {
            match item {
                ast::FileItem::Package(package) => {
                    self.add_comments_for(
                        &[tag::file::PACKAGE],
                        package.span.clone(),
                        &package.comments,
                    );
                    descriptor.package = Some(package.name.to_string());
                }
                ast::FileItem::Import(import) => {
                    let index = index_to_i32(descriptor.dependency.len());
                    self.add_comments_for(
                        &[tag::file::DEPENDENCY, index],
                        import.span.clone(),
                        &import.comments,
                    );

                    match &import.kind {
                        Some((ast::ImportKind::Public, _)) => {
                            self.add_span_for(
                                &[
                                    tag::file::PUBLIC_DEPENDENCY,
                                    index_to_i32(descriptor.public_dependency.len()),
                                ],
                                import.span.clone(),
                            );
                            descriptor.public_dependency.push(index);
                        }
                        Some((ast::ImportKind::Weak, _)) => {
                            self.add_span_for(
                                &[
                                    tag::file::WEAK_DEPENDENCY,
                                    index_to_i32(descriptor.weak_dependency.len()),
                                ],
                                import.span.clone(),
                            );
                            descriptor.weak_dependency.push(index);
                        }
                        None => (),
                    }

                    descriptor.dependency.push(import.value.clone());
                }
                ast::FileItem::Option(option) => {
                    self.generate_option_statement(option, tag::file::OPTIONS, &mut options)
                }
                ast::FileItem::Message(message) => {
                    self.path.extend([
                        tag::file::MESSAGE_TYPE,
                        index_to_i32(descriptor.message_type.len()),
                    ]);
                    let message = self.generate_message_descriptor(message);
                    descriptor.message_type.push(message);
                    self.pop_path(2);
                }
                ast::FileItem::Enum(enum_) => {
                    self.path.extend([
                        tag::file::ENUM_TYPE,
                        index_to_i32(descriptor.enum_type.len()),
                    ]);
                    let enum_ = self.generate_enum_descriptor(enum_);
                    descriptor.enum_type.push(enum_);
                    self.pop_path(2);
                }
                ast::FileItem::Service(service) => {
                    self.path.extend([
                        tag::file::SERVICE,
                        index_to_i32(descriptor.service.len()),
                    ]);
                    let service = self.generate_service_descriptor(service);
                    descriptor.service.push(service);
                    self.pop_path(2);
                }
                ast::FileItem::Extend(extend) => self.generate_extend_descriptors(
                    extend,
                    FieldTarget {
                        field_tag: tag::file::EXTENSION,
                        fields: &mut descriptor.extension,
                        message_tag: tag::file::MESSAGE_TYPE,
                        messages: &mut descriptor.message_type,
                    },
                ),
                ast::FileItem::Empty(_) => (),
            }
        }

        descriptor.options = make_options::<FileOptions>(options);
        if self.syntax == ast::Syntax::Proto3 {
            descriptor.syntax = Some(self.syntax.as_str().to_owned());
        }

        descriptor
    }

    fn generate_message_descriptor(&mut self, message: &ast::Message) -> DescriptorProto {
        self.add_comments(message.span.clone(), &message.comments);
        self.add_span_for(&[tag::message::NAME], message.name.span.clone());

        DescriptorProto {
            name: Some(message.name.value.clone()),
            ..self.generate_message_body_descriptor(&message.body)
        }
    }

    fn generate_message_body_descriptor(&mut self, body: &ast::MessageBody) -> DescriptorProto {
        let mut descriptor = DescriptorProto::default();
        let mut options = Vec::new();

        // Real oneofs must be ordered before any synthetic oneofs generated by fields
        let real_oneof_count = body
            .items
            .iter()
            .filter(|item| matches!(item, ast::MessageItem::Oneof(_)))
            .count();
        descriptor
            .oneof_decl
            .resize(real_oneof_count, OneofDescriptorProto::default());
        let mut synthetic_oneofs = Vec::new();

        let mut real_oneof_index = 0;
        for item in &body.items {
            match item {
                ast::MessageItem::Field(field) => {
                    let synthetic_oneof_index = real_oneof_count + synthetic_oneofs.len();
                    let field = self.generate_field_descriptor(
                        field,
                        FieldTarget {
                            field_tag: tag::message::FIELD,
                            fields: &mut descriptor.field,
                            message_tag: tag::message::NESTED_TYPE,
                            messages: &mut descriptor.nested_type,
                        },
                        None,
                    );
                    if field.proto3_optional == Some(true) {
                        synthetic_oneofs.push(field.name().to_owned());
                        descriptor.field.push(FieldDescriptorProto {
                            oneof_index: Some(index_to_i32(synthetic_oneof_index)),
                            ..field
                        });
                    } else {
                        descriptor.field.push(field);
                    }
                }
                ast::MessageItem::Oneof(oneof) => {
                    descriptor.oneof_decl[real_oneof_index] = self.generate_oneof_descriptor(
                        oneof,
                        real_oneof_index,
                        FieldTarget {
                            field_tag: tag::message::FIELD,
                            fields: &mut descriptor.field,
                            message_tag: tag::message::NESTED_TYPE,
                            messages: &mut descriptor.nested_type,
                        },
                    );
                    real_oneof_index += 1;
                }
                ast::MessageItem::Option(option) => {
                    self.generate_option_statement(option, tag::message::OPTIONS, &mut options)
                }
                ast::MessageItem::Message(message) => {
                    self.path.extend([
                        tag::message::NESTED_TYPE,
                        index_to_i32(descriptor.nested_type.len()),
                    ]);
                    let message = self.generate_message_descriptor(message);
                    descriptor.nested_type.push(message);
                    self.pop_path(2);
                }
                ast::MessageItem::Enum(enum_) => {
                    self.path.extend([
                        tag::message::ENUM_TYPE,
                        index_to_i32(descriptor.enum_type.len()),
                    ]);
                    let enum_ = self.generate_enum_descriptor(enum_);
                    descriptor.enum_type.push(enum_);
                    self.pop_path(2);
                }
                ast::MessageItem::Extend(extend) => self.generate_extend_descriptors(
                    extend,
                    FieldTarget {
                        field_tag: tag::message::EXTENSION,
                        fields: &mut descriptor.extension,
                        message_tag: tag::message::NESTED_TYPE,
                        messages: &mut descriptor.nested_type,
                    },
                ),
                ast::MessageItem::Extensions(extensions) => {
                    self.generate_extension_ranges(extensions, &mut descriptor.extension_range)
                }
                ast::MessageItem::Reserved(reserved) => match &reserved.kind {
                    ast::ReservedKind::Ranges(ranges) => {
                        self.path.push(tag::message::RESERVED_RANGE);
                        self.add_comments(reserved.span.clone(), &reserved.comments);
                        for range in ranges {
                            self.path
                                .push(index_to_i32(descriptor.reserved_range.len()));
                            let range = self.generate_message_reserved_range(range);
                            descriptor.reserved_range.push(range);
                            self.path.pop();
                        }
                        self.path.pop();
                    }
                    ast::ReservedKind::Names(names) => {
                        self.path.push(tag::message::RESERVED_NAME);
                        self.add_comments(reserved.span.clone(), &reserved.comments);
                        for name in names {
                            self.add_span_for(
                                &[index_to_i32(descriptor.reserved_name.len())],
                                name.span.clone(),
                            );
                            descriptor.reserved_name.push(name.value.clone());
                        }
                        self.path.pop();
                    }
                },
                ast::MessageItem::Empty(_) => (),
            }
        }

        if !synthetic_oneofs.is_empty() {
            let mut names: HashSet<String> = descriptor
                .field
                .iter()
                .map(|field| field.name().to_owned())
                .chain(descriptor.oneof_decl.iter().map(|oneof| oneof.name().to_owned()))
                .collect();

            for field_name in synthetic_oneofs {
                let mut oneof_name = if field_name.starts_with('_') {
                    field_name
                } else {
                    format!("_{}", field_name)
                };
                while names.contains(&oneof_name) {
                    oneof_name.insert(0, 'X');
                }
                names.insert(oneof_name.clone());

                descriptor.oneof_decl.push(OneofDescriptorProto {
                    name: Some(oneof_name),
                    options: None,
                });
            }
        }

        descriptor.options = make_options::<MessageOptions>(options);
        descriptor
    }

    /// Generates a field, adding any group or map entry message it requires to the target.
    ///
    /// The returned field has not been added to `target.fields` yet. Its index within that list
    /// is assumed to be `target.fields.len()`.
    fn generate_field_descriptor(
        &mut self,
        field: &ast::Field,
        target: FieldTarget<'_>,
        extendee: Option<&ast::TypeName>,
    ) -> FieldDescriptorProto {
        self.path
            .extend([target.field_tag, index_to_i32(target.fields.len())]);
        self.add_comments(field.span.clone(), &field.comments);

        if let Some(extendee) = extendee {
            self.add_span_for(&[tag::field::EXTENDEE], extendee.span());
        }

        if let Some((_, span)) = &field.label {
            self.add_span_for(&[tag::field::LABEL], span.clone());
        }

        let name = field.field_name();
        let label = match (&field.kind, field.label()) {
            (ast::FieldKind::Map { .. }, _) => field_descriptor_proto::Label::Repeated,
            (_, Some(ast::FieldLabel::Required)) => field_descriptor_proto::Label::Required,
            (_, Some(ast::FieldLabel::Repeated)) => field_descriptor_proto::Label::Repeated,
            (_, Some(ast::FieldLabel::Optional) | None) => field_descriptor_proto::Label::Optional,
        };

        let (r#type, type_name) = match &field.kind {
            ast::FieldKind::Normal { ty, ty_span } => {
                let (r#type, type_name) = field_type(ty);
                if type_name.is_some() {
                    self.add_span_for(&[tag::field::TYPE_NAME], ty_span.clone());
                } else {
                    self.add_span_for(&[tag::field::TYPE], ty_span.clone());
                }
                (r#type, type_name)
            }
            ast::FieldKind::Group { ty_span, .. } => {
                self.add_span_for(&[tag::field::TYPE], ty_span.clone());
                self.add_span_for(&[tag::field::TYPE_NAME], field.name.span.clone());
                (
                    Some(field_descriptor_proto::Type::Group),
                    Some(field.name.value.clone()),
                )
            }
            ast::FieldKind::Map { ty_span, .. } => {
                self.add_span_for(&[tag::field::TYPE_NAME], ty_span.clone());
                (
                    Some(field_descriptor_proto::Type::Message),
                    Some(to_pascal_case(&name) + "Entry"),
                )
            }
        };

        self.add_span_for(&[tag::field::NAME], field.name.span.clone());
        self.add_span_for(&[tag::field::NUMBER], field.number.span.clone());

        self.path.push(tag::field::OPTIONS);
        let options = self.generate_option_list(field.options.as_ref());
        self.path.pop();

        self.pop_path(2);

        match &field.kind {
            ast::FieldKind::Group { body, .. } => {
                self.path
                    .extend([target.message_tag, index_to_i32(target.messages.len())]);
                self.add_span(field.span.clone());
                self.add_span_for(&[tag::message::NAME], field.name.span.clone());
                let message = DescriptorProto {
                    name: type_name.clone(),
                    ..self.generate_message_body_descriptor(body)
                };
                target.messages.push(message);
                self.pop_path(2);
            }
            ast::FieldKind::Map {
                key_ty, value_ty, ..
            } => {
                target.messages.push(map_entry_descriptor(
                    type_name.clone().unwrap_or_default(),
                    key_ty,
                    value_ty,
                ));
            }
            ast::FieldKind::Normal { .. } => (),
        }

        let proto3_optional = self.syntax == ast::Syntax::Proto3
            && matches!(field.label(), Some(ast::FieldLabel::Optional));

        FieldDescriptorProto {
            json_name: Some(to_json_name(&name)),
            name: Some(name),
            number: field.number.as_i32(),
            label: Some(label as i32),
            r#type: r#type.map(|t| t as i32),
            type_name,
            extendee: extendee.map(|extendee| extendee.to_string()),
            options: make_options::<FieldOptions>(options),
            proto3_optional: if proto3_optional { Some(true) } else { None },
            ..Default::default()
        }
    }

    fn generate_oneof_descriptor(
        &mut self,
        oneof: &ast::Oneof,
        oneof_index: usize,
        target: FieldTarget<'_>,
    ) -> OneofDescriptorProto {
        let oneof_path = [tag::message::ONEOF_DECL, index_to_i32(oneof_index)];
        self.add_comments_for(&oneof_path, oneof.span.clone(), &oneof.comments);
        self.add_span_for(
            &[oneof_path[0], oneof_path[1], tag::oneof::NAME],
            oneof.name.span.clone(),
        );

        let mut options = Vec::new();
        for item in &oneof.items {
            match item {
                ast::OneofItem::Field(field) => {
                    let field = self.generate_field_descriptor(
                        field,
                        FieldTarget {
                            field_tag: target.field_tag,
                            fields: &mut *target.fields,
                            message_tag: target.message_tag,
                            messages: &mut *target.messages,
                        },
                        None,
                    );
                    target.fields.push(FieldDescriptorProto {
                        oneof_index: Some(index_to_i32(oneof_index)),
                        proto3_optional: None,
                        ..field
                    });
                }
                ast::OneofItem::Option(option) => {
                    self.path.extend(oneof_path);
                    self.generate_option_statement(option, tag::oneof::OPTIONS, &mut options);
                    self.pop_path(2);
                }
                ast::OneofItem::Empty(_) => (),
            }
        }

        OneofDescriptorProto {
            name: Some(oneof.name.value.clone()),
            options: make_options::<OneofOptions>(options),
        }
    }

    fn generate_extend_descriptors(&mut self, extend: &ast::Extend, target: FieldTarget<'_>) {
        self.add_comments_for(&[target.field_tag], extend.span.clone(), &extend.comments);

        for item in &extend.items {
            if let ast::ExtendItem::Field(field) = item {
                let field = self.generate_field_descriptor(
                    field,
                    FieldTarget {
                        field_tag: target.field_tag,
                        fields: &mut *target.fields,
                        message_tag: target.message_tag,
                        messages: &mut *target.messages,
                    },
                    Some(&extend.extendee),
                );
                target.fields.push(field);
            }
        }
    }

    fn generate_extension_ranges(
        &mut self,
        extensions: &ast::Extensions,
        extension_ranges: &mut Vec<descriptor_proto::ExtensionRange>,
    ) {
        self.path.push(tag::message::EXTENSION_RANGE);
        self.add_comments(extensions.span.clone(), &extensions.comments);

        for range in &extensions.ranges {
            self.path.push(index_to_i32(extension_ranges.len()));
            self.add_span(range.span());
            self.add_range_spans(
                range,
                tag::message::extension_range::START,
                tag::message::extension_range::END,
            );

            self.path.push(tag::message::extension_range::OPTIONS);
            let options = self.generate_option_list(extensions.options.as_ref());
            self.path.pop();

            let (start, end) = message_range(range);
            extension_ranges.push(descriptor_proto::ExtensionRange {
                start,
                end,
                options: make_options::<ExtensionRangeOptions>(options),
            });
            self.path.pop();
        }

        self.path.pop();
    }

    fn generate_message_reserved_range(
        &mut self,
        range: &ast::ReservedRange,
    ) -> descriptor_proto::ReservedRange {
        self.add_span(range.span());
        self.add_range_spans(
            range,
            tag::message::reserved_range::START,
            tag::message::reserved_range::END,
        );

        let (start, end) = message_range(range);
        descriptor_proto::ReservedRange { start, end }
    }

    fn generate_enum_descriptor(&mut self, enum_: &ast::Enum) -> EnumDescriptorProto {
        self.add_comments(enum_.span.clone(), &enum_.comments);
        self.add_span_for(&[tag::enum_::NAME], enum_.name.span.clone());

        let mut descriptor = EnumDescriptorProto {
            name: Some(enum_.name.value.clone()),
            ..Default::default()
        };
        let mut options = Vec::new();

        for item in &enum_.items {
            match item {
                ast::EnumItem::Value(value) => {
                    self.path
                        .extend([tag::enum_::VALUE, index_to_i32(descriptor.value.len())]);
                    let value = self.generate_enum_value_descriptor(value);
                    descriptor.value.push(value);
                    self.pop_path(2);
                }
                ast::EnumItem::Option(option) => {
                    self.generate_option_statement(option, tag::enum_::OPTIONS, &mut options)
                }
                ast::EnumItem::Reserved(reserved) => match &reserved.kind {
                    ast::ReservedKind::Ranges(ranges) => {
                        self.path.push(tag::enum_::RESERVED_RANGE);
                        self.add_comments(reserved.span.clone(), &reserved.comments);
                        for range in ranges {
                            self.path
                                .push(index_to_i32(descriptor.reserved_range.len()));
                            self.add_span(range.span());
                            self.add_range_spans(
                                range,
                                tag::enum_::reserved_range::START,
                                tag::enum_::reserved_range::END,
                            );
                            descriptor
                                .reserved_range
                                .push(enum_reserved_range(range));
                            self.path.pop();
                        }
                        self.path.pop();
                    }
                    ast::ReservedKind::Names(names) => {
                        self.path.push(tag::enum_::RESERVED_NAME);
                        self.add_comments(reserved.span.clone(), &reserved.comments);
                        for name in names {
                            self.add_span_for(
                                &[index_to_i32(descriptor.reserved_name.len())],
                                name.span.clone(),
                            );
                            descriptor.reserved_name.push(name.value.clone());
                        }
                        self.path.pop();
                    }
                },
                ast::EnumItem::Empty(_) => (),
            }
        }

        descriptor.options = make_options::<EnumOptions>(options);
        descriptor
    }

    fn generate_enum_value_descriptor(
        &mut self,
        value: &ast::EnumValue,
    ) -> EnumValueDescriptorProto {
        self.add_comments(value.span.clone(), &value.comments);
        self.add_span_for(&[tag::enum_value::NAME], value.name.span.clone());
        self.add_span_for(&[tag::enum_value::NUMBER], value.number.span.clone());

        self.path.push(tag::enum_value::OPTIONS);
        let options = self.generate_option_list(value.options.as_ref());
        self.path.pop();

        EnumValueDescriptorProto {
            name: Some(value.name.value.clone()),
            number: value.number.as_i32(),
            options: make_options::<EnumValueOptions>(options),
        }
    }

    fn generate_service_descriptor(&mut self, service: &ast::Service) -> ServiceDescriptorProto {
        self.add_comments(service.span.clone(), &service.comments);
        self.add_span_for(&[tag::service::NAME], service.name.span.clone());

        let mut method = Vec::new();
        let mut options = Vec::new();

        for item in &service.items {
            match item {
                ast::ServiceItem::Method(method_ast) => {
                    self.path
                        .extend([tag::service::METHOD, index_to_i32(method.len())]);
                    method.push(self.generate_method_descriptor(method_ast));
                    self.pop_path(2);
                }
                ast::ServiceItem::Option(option) => {
                    self.generate_option_statement(option, tag::service::OPTIONS, &mut options)
                }
                ast::ServiceItem::Empty(_) => (),
            }
        }

        ServiceDescriptorProto {
            name: Some(service.name.value.clone()),
            method,
            options: make_options::<ServiceOptions>(options),
        }
    }

    fn generate_method_descriptor(&mut self, method: &ast::Method) -> MethodDescriptorProto {
        self.add_comments(method.span.clone(), &method.comments);
        self.add_span_for(&[tag::method::NAME], method.name.span.clone());

        if let Some(span) = &method.client_streaming {
            self.add_span_for(&[tag::method::CLIENT_STREAMING], span.clone());
        }
        self.add_span_for(&[tag::method::INPUT_TYPE], method.input_ty.span());
        if let Some(span) = &method.server_streaming {
            self.add_span_for(&[tag::method::SERVER_STREAMING], span.clone());
        }
        self.add_span_for(&[tag::method::OUTPUT_TYPE], method.output_ty.span());

        let mut options = Vec::new();
        for item in &method.items {
            if let ast::MethodItem::Option(option) = item {
                self.generate_option_statement(option, tag::method::OPTIONS, &mut options);
            }
        }

        MethodDescriptorProto {
            name: Some(method.name.value.clone()),
            input_type: Some(method.input_ty.to_string()),
            output_type: Some(method.output_ty.to_string()),
            options: make_options::<MethodOptions>(options),
            client_streaming: method.client_streaming.as_ref().map(|_| true),
            server_streaming: method.server_streaming.as_ref().map(|_| true),
        }
    }

    fn generate_option_statement(
        &mut self,
        option: &ast::OptionStatement,
        options_tag: i32,
        options: &mut Vec<UninterpretedOption>,
    ) {
        self.path.push(options_tag);
        self.add_span(option.span.clone());
        self.add_comments_for(
            &[tag::UNINTERPRETED_OPTION, index_to_i32(options.len())],
            option.span.clone(),
            &option.comments,
        );
        self.path.pop();

        options.push(generate_option(&option.body));
    }

    fn generate_option_list(&mut self, list: Option<&ast::OptionList>) -> Vec<UninterpretedOption> {
        let mut options = Vec::new();

        if let Some(list) = list {
            self.add_span(list.span.clone());

            for option in &list.options {
                self.add_span_for(
                    &[tag::UNINTERPRETED_OPTION, index_to_i32(options.len())],
                    option.span.clone(),
                );
                options.push(generate_option(option));
            }
        }

        options
    }

    fn add_range_spans(&mut self, range: &ast::ReservedRange, start_tag: i32, end_tag: i32) {
        self.add_span_for(&[start_tag], range.start.span.clone());
        let end_span = range
            .end
            .span()
            .unwrap_or_else(|| range.start.span.clone());
        self.add_span_for(&[end_tag], end_span);
    }

    fn add_span(&mut self, span: Span) {
        let span = self.lines.resolve_span(span);
        self.locations.push(Location {
            path: self.path.clone(),
            span,
            ..Default::default()
        });
    }

    fn add_comments(&mut self, span: Span, comments: &ast::Comments) {
        let span = self.lines.resolve_span(span);
        self.locations.push(Location {
            path: self.path.clone(),
            span,
            leading_comments: comments.leading_comment.clone(),
            trailing_comments: comments.trailing_comment.clone(),
            leading_detached_comments: comments.leading_detached_comments.clone(),
        });
    }

    fn add_span_for(&mut self, path_items: &[i32], span: Span) {
        self.path.extend_from_slice(path_items);
        self.add_span(span);
        self.pop_path(path_items.len());
    }

    fn add_comments_for(&mut self, path_items: &[i32], span: Span, comments: &ast::Comments) {
        self.path.extend_from_slice(path_items);
        self.add_comments(span, comments);
        self.pop_path(path_items.len());
    }

    fn pop_path(&mut self, n: usize) {
        self.path.truncate(self.path.len() - n);
    }
}

fn generate_option(option: &ast::OptionBody) -> UninterpretedOption {
    let name = option
        .name
        .iter()
        .map(|part| match part {
            ast::OptionNamePart::Ident(ident) => uninterpreted_option::NamePart {
                name_part: ident.value.clone(),
                is_extension: false,
            },
            ast::OptionNamePart::Extension(extension, _) => uninterpreted_option::NamePart {
                name_part: extension.to_string(),
                is_extension: true,
            },
        })
        .collect();

    let mut result = UninterpretedOption {
        name,
        ..Default::default()
    };
    match &option.value {
        ast::OptionValue::Ident {
            negative: false,
            ident,
            ..
        } => result.identifier_value = Some(ident.value.clone()),
        ast::OptionValue::Ident { ident, .. } => match ident.value.as_str() {
            "inf" => result.double_value = Some(f64::NEG_INFINITY),
            "nan" => result.double_value = Some(f64::NAN),
            _ => result.identifier_value = Some(format!("-{}", ident)),
        },
        ast::OptionValue::Int(int) if !int.negative => result.positive_int_value = Some(int.value),
        ast::OptionValue::Int(int) => match int.as_i64() {
            Some(value) => result.negative_int_value = Some(value),
            None => result.double_value = Some(-(int.value as f64)),
        },
        ast::OptionValue::Float(float) => result.double_value = Some(float.value),
        ast::OptionValue::String(string) => result.string_value = Some(string.value.clone()),
        ast::OptionValue::Aggregate(message, _) => {
            result.aggregate_value = Some(message.to_string())
        }
    }
    result
}

fn field_type(ty: &ast::Ty) -> (Option<field_descriptor_proto::Type>, Option<String>) {
    use field_descriptor_proto::Type;

    let r#type = match ty {
        ast::Ty::Double => Type::Double,
        ast::Ty::Float => Type::Float,
        ast::Ty::Int32 => Type::Int32,
        ast::Ty::Int64 => Type::Int64,
        ast::Ty::Uint32 => Type::Uint32,
        ast::Ty::Uint64 => Type::Uint64,
        ast::Ty::Sint32 => Type::Sint32,
        ast::Ty::Sint64 => Type::Sint64,
        ast::Ty::Fixed32 => Type::Fixed32,
        ast::Ty::Fixed64 => Type::Fixed64,
        ast::Ty::Sfixed32 => Type::Sfixed32,
        ast::Ty::Sfixed64 => Type::Sfixed64,
        ast::Ty::Bool => Type::Bool,
        ast::Ty::String => Type::String,
        ast::Ty::Bytes => Type::Bytes,
        ast::Ty::Named(name) => return (None, Some(name.to_string())),
    };
    (Some(r#type), None)
}

fn map_entry_descriptor(name: String, key_ty: &ast::Ty, value_ty: &ast::Ty) -> DescriptorProto {
    let entry_field = |name: &str, number: i32, ty: &ast::Ty| {
        let (r#type, type_name) = field_type(ty);
        FieldDescriptorProto {
            name: Some(name.to_owned()),
            json_name: Some(name.to_owned()),
            label: Some(field_descriptor_proto::Label::Optional as i32),
            number: Some(number),
            r#type: r#type.map(|t| t as i32),
            type_name,
            ..Default::default()
        }
    };

    DescriptorProto {
        name: Some(name),
        field: vec![entry_field("key", 1, key_ty), entry_field("value", 2, value_ty)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Message ranges are stored with an exclusive end.
fn message_range(range: &ast::ReservedRange) -> (Option<i32>, Option<i32>) {
    let start = range.start.as_i32();
    let end = match &range.end {
        ast::ReservedRangeEnd::None => start,
        ast::ReservedRangeEnd::Int(value) => value.as_i32(),
        ast::ReservedRangeEnd::Max(_) => Some(MAX_MESSAGE_FIELD_NUMBER),
    };
    (start, end.map(|n| n + 1))
}

fn enum_reserved_range(range: &ast::ReservedRange) -> enum_descriptor_proto::EnumReservedRange {
    let start = range.start.as_i32();
    let end = match &range.end {
        ast::ReservedRangeEnd::None => start,
        ast::ReservedRangeEnd::Int(value) => value.as_i32(),
        ast::ReservedRangeEnd::Max(_) => Some(i32::MAX),
    };
    enum_descriptor_proto::EnumReservedRange { start, end }
}

/// The descriptor.proto options messages, all of which hold a list of uninterpreted options.
trait OptionsMessage: Default {
    fn uninterpreted_option_mut(&mut self) -> &mut Vec<UninterpretedOption>;
}

macro_rules! impl_options_message {
    ($($ty:ty),*) => {
        $(
            impl OptionsMessage for $ty {
                fn uninterpreted_option_mut(&mut self) -> &mut Vec<UninterpretedOption> {
                    &mut self.uninterpreted_option
                }
            }
        )*
    };
}

impl_options_message!(
    FileOptions,
    MessageOptions,
    FieldOptions,
    OneofOptions,
    EnumOptions,
    EnumValueOptions,
    ExtensionRangeOptions,
    ServiceOptions,
    MethodOptions
);

fn make_options<T: OptionsMessage>(uninterpreted: Vec<UninterpretedOption>) -> Option<T> {
    if uninterpreted.is_empty() {
        None
    } else {
        let mut options = T::default();
        *options.uninterpreted_option_mut() = uninterpreted;
        Some(options)
    }
}
