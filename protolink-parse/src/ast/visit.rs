use logos::Span;

use super::*;

/// A borrowed reference to any node in the syntax tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeRef<'a> {
    File(&'a File),
    Syntax(&'a SyntaxDecl),
    Package(&'a Package),
    Import(&'a Import),
    Option(&'a OptionStatement),
    OptionList(&'a OptionList),
    OptionBody(&'a OptionBody),
    OptionNamePart(&'a OptionNamePart),
    OptionValue(&'a OptionValue),
    Message(&'a Message),
    Field(&'a Field),
    Oneof(&'a Oneof),
    Enum(&'a Enum),
    EnumValue(&'a EnumValue),
    Extend(&'a Extend),
    Extensions(&'a Extensions),
    Reserved(&'a Reserved),
    ReservedRange(&'a ReservedRange),
    Service(&'a Service),
    Method(&'a Method),
    Ident(&'a Ident),
    TypeName(&'a TypeName),
    Int(&'a Int),
    Float(&'a Float),
    String(&'a StringLiteral),
    TextField(&'a text_format::Field),
    Empty(&'a Span),
}

/// Walks the syntax tree.
///
/// Each `visit_*` method defaults to [`Visitor::visit_node`], which in turn visits the node's
/// children in source order. Overriding a `visit_*` method stops the default traversal into that
/// node's children; call [`Visitor::visit_node`] from the override to continue it.
pub trait Visitor {
    fn visit_node(&mut self, node: NodeRef<'_>) {
        for child in node.children() {
            child.accept(self);
        }
    }

    fn visit_file(&mut self, file: &File) {
        self.visit_node(NodeRef::File(file))
    }

    fn visit_syntax(&mut self, syntax: &SyntaxDecl) {
        self.visit_node(NodeRef::Syntax(syntax))
    }

    fn visit_package(&mut self, package: &Package) {
        self.visit_node(NodeRef::Package(package))
    }

    fn visit_import(&mut self, import: &Import) {
        self.visit_node(NodeRef::Import(import))
    }

    fn visit_option(&mut self, option: &OptionStatement) {
        self.visit_node(NodeRef::Option(option))
    }

    fn visit_option_list(&mut self, options: &OptionList) {
        self.visit_node(NodeRef::OptionList(options))
    }

    fn visit_option_body(&mut self, option: &OptionBody) {
        self.visit_node(NodeRef::OptionBody(option))
    }

    fn visit_option_name_part(&mut self, part: &OptionNamePart) {
        self.visit_node(NodeRef::OptionNamePart(part))
    }

    fn visit_option_value(&mut self, value: &OptionValue) {
        self.visit_node(NodeRef::OptionValue(value))
    }

    fn visit_message(&mut self, message: &Message) {
        self.visit_node(NodeRef::Message(message))
    }

    fn visit_field(&mut self, field: &Field) {
        self.visit_node(NodeRef::Field(field))
    }

    fn visit_oneof(&mut self, oneof: &Oneof) {
        self.visit_node(NodeRef::Oneof(oneof))
    }

    fn visit_enum(&mut self, enu: &Enum) {
        self.visit_node(NodeRef::Enum(enu))
    }

    fn visit_enum_value(&mut self, value: &EnumValue) {
        self.visit_node(NodeRef::EnumValue(value))
    }

    fn visit_extend(&mut self, extend: &Extend) {
        self.visit_node(NodeRef::Extend(extend))
    }

    fn visit_extensions(&mut self, extensions: &Extensions) {
        self.visit_node(NodeRef::Extensions(extensions))
    }

    fn visit_reserved(&mut self, reserved: &Reserved) {
        self.visit_node(NodeRef::Reserved(reserved))
    }

    fn visit_reserved_range(&mut self, range: &ReservedRange) {
        self.visit_node(NodeRef::ReservedRange(range))
    }

    fn visit_service(&mut self, service: &Service) {
        self.visit_node(NodeRef::Service(service))
    }

    fn visit_method(&mut self, method: &Method) {
        self.visit_node(NodeRef::Method(method))
    }

    fn visit_ident(&mut self, ident: &Ident) {
        self.visit_node(NodeRef::Ident(ident))
    }

    fn visit_type_name(&mut self, name: &TypeName) {
        self.visit_node(NodeRef::TypeName(name))
    }

    fn visit_int(&mut self, int: &Int) {
        self.visit_node(NodeRef::Int(int))
    }

    fn visit_float(&mut self, float: &Float) {
        self.visit_node(NodeRef::Float(float))
    }

    fn visit_string(&mut self, string: &StringLiteral) {
        self.visit_node(NodeRef::String(string))
    }

    fn visit_text_field(&mut self, field: &text_format::Field) {
        self.visit_node(NodeRef::TextField(field))
    }

    fn visit_empty(&mut self, span: &Span) {
        self.visit_node(NodeRef::Empty(span))
    }
}

impl File {
    pub fn visit<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_file(self)
    }
}

impl<'a> NodeRef<'a> {
    /// Calls the `visit_*` method of `visitor` corresponding to this node.
    pub fn accept<V: Visitor + ?Sized>(self, visitor: &mut V) {
        match self {
            NodeRef::File(node) => visitor.visit_file(node),
            NodeRef::Syntax(node) => visitor.visit_syntax(node),
            NodeRef::Package(node) => visitor.visit_package(node),
            NodeRef::Import(node) => visitor.visit_import(node),
            NodeRef::Option(node) => visitor.visit_option(node),
            NodeRef::OptionList(node) => visitor.visit_option_list(node),
            NodeRef::OptionBody(node) => visitor.visit_option_body(node),
            NodeRef::OptionNamePart(node) => visitor.visit_option_name_part(node),
            NodeRef::OptionValue(node) => visitor.visit_option_value(node),
            NodeRef::Message(node) => visitor.visit_message(node),
            NodeRef::Field(node) => visitor.visit_field(node),
            NodeRef::Oneof(node) => visitor.visit_oneof(node),
            NodeRef::Enum(node) => visitor.visit_enum(node),
            NodeRef::EnumValue(node) => visitor.visit_enum_value(node),
            NodeRef::Extend(node) => visitor.visit_extend(node),
            NodeRef::Extensions(node) => visitor.visit_extensions(node),
            NodeRef::Reserved(node) => visitor.visit_reserved(node),
            NodeRef::ReservedRange(node) => visitor.visit_reserved_range(node),
            NodeRef::Service(node) => visitor.visit_service(node),
            NodeRef::Method(node) => visitor.visit_method(node),
            NodeRef::Ident(node) => visitor.visit_ident(node),
            NodeRef::TypeName(node) => visitor.visit_type_name(node),
            NodeRef::Int(node) => visitor.visit_int(node),
            NodeRef::Float(node) => visitor.visit_float(node),
            NodeRef::String(node) => visitor.visit_string(node),
            NodeRef::TextField(node) => visitor.visit_text_field(node),
            NodeRef::Empty(node) => visitor.visit_empty(node),
        }
    }

    pub fn span(&self) -> Span {
        match *self {
            NodeRef::File(node) => node.span.clone(),
            NodeRef::Syntax(node) => node.span.clone(),
            NodeRef::Package(node) => node.span.clone(),
            NodeRef::Import(node) => node.span.clone(),
            NodeRef::Option(node) => node.span.clone(),
            NodeRef::OptionList(node) => node.span.clone(),
            NodeRef::OptionBody(node) => node.span.clone(),
            NodeRef::OptionNamePart(node) => node.span(),
            NodeRef::OptionValue(node) => node.span(),
            NodeRef::Message(node) => node.span.clone(),
            NodeRef::Field(node) => node.span.clone(),
            NodeRef::Oneof(node) => node.span.clone(),
            NodeRef::Enum(node) => node.span.clone(),
            NodeRef::EnumValue(node) => node.span.clone(),
            NodeRef::Extend(node) => node.span.clone(),
            NodeRef::Extensions(node) => node.span.clone(),
            NodeRef::Reserved(node) => node.span.clone(),
            NodeRef::ReservedRange(node) => node.span(),
            NodeRef::Service(node) => node.span.clone(),
            NodeRef::Method(node) => node.span.clone(),
            NodeRef::Ident(node) => node.span.clone(),
            NodeRef::TypeName(node) => node.span(),
            NodeRef::Int(node) => node.span.clone(),
            NodeRef::Float(node) => node.span.clone(),
            NodeRef::String(node) => node.span.clone(),
            NodeRef::TextField(node) => node.span.clone(),
            NodeRef::Empty(span) => span.clone(),
        }
    }

    /// Gets the comments attached to this node, if it is a declaration.
    pub fn comments(&self) -> Option<&'a Comments> {
        match *self {
            NodeRef::Syntax(node) => Some(&node.comments),
            NodeRef::Package(node) => Some(&node.comments),
            NodeRef::Import(node) => Some(&node.comments),
            NodeRef::Option(node) => Some(&node.comments),
            NodeRef::Message(node) => Some(&node.comments),
            NodeRef::Field(node) => Some(&node.comments),
            NodeRef::Oneof(node) => Some(&node.comments),
            NodeRef::Enum(node) => Some(&node.comments),
            NodeRef::EnumValue(node) => Some(&node.comments),
            NodeRef::Extend(node) => Some(&node.comments),
            NodeRef::Extensions(node) => Some(&node.comments),
            NodeRef::Reserved(node) => Some(&node.comments),
            NodeRef::Service(node) => Some(&node.comments),
            NodeRef::Method(node) => Some(&node.comments),
            _ => None,
        }
    }

    /// Gets the children of this node, in source order.
    pub fn children(&self) -> Vec<NodeRef<'a>> {
        let mut children = Vec::new();
        match *self {
            NodeRef::File(file) => {
                children.extend(file.syntax.as_ref().map(NodeRef::Syntax));
                children.extend(file.items.iter().map(|item| match item {
                    FileItem::Package(node) => NodeRef::Package(node),
                    FileItem::Import(node) => NodeRef::Import(node),
                    FileItem::Option(node) => NodeRef::Option(node),
                    FileItem::Message(node) => NodeRef::Message(node),
                    FileItem::Enum(node) => NodeRef::Enum(node),
                    FileItem::Extend(node) => NodeRef::Extend(node),
                    FileItem::Service(node) => NodeRef::Service(node),
                    FileItem::Empty(span) => NodeRef::Empty(span),
                }));
            }
            NodeRef::Syntax(syntax) => children.push(NodeRef::String(&syntax.value)),
            NodeRef::Package(package) => {
                children.extend(package.name.parts.iter().map(NodeRef::Ident))
            }
            NodeRef::Import(_) => {}
            NodeRef::Option(option) => children.push(NodeRef::OptionBody(&option.body)),
            NodeRef::OptionList(list) => {
                children.extend(list.options.iter().map(NodeRef::OptionBody))
            }
            NodeRef::OptionBody(body) => {
                children.extend(body.name.iter().map(NodeRef::OptionNamePart));
                children.push(NodeRef::OptionValue(&body.value));
            }
            NodeRef::OptionNamePart(OptionNamePart::Ident(ident)) => {
                children.push(NodeRef::Ident(ident))
            }
            NodeRef::OptionNamePart(OptionNamePart::Extension(name, _)) => {
                children.push(NodeRef::TypeName(name))
            }
            NodeRef::OptionValue(value) => match value {
                OptionValue::Ident { ident, .. } => children.push(NodeRef::Ident(ident)),
                OptionValue::Int(int) => children.push(NodeRef::Int(int)),
                OptionValue::Float(float) => children.push(NodeRef::Float(float)),
                OptionValue::String(string) => children.push(NodeRef::String(string)),
                OptionValue::Aggregate(message, _) => {
                    children.extend(message.fields.iter().map(NodeRef::TextField))
                }
            },
            NodeRef::Message(message) => {
                children.push(NodeRef::Ident(&message.name));
                push_message_body(&mut children, &message.body);
            }
            NodeRef::Field(field) => {
                match &field.kind {
                    FieldKind::Normal {
                        ty: Ty::Named(name),
                        ..
                    }
                    | FieldKind::Map {
                        value_ty: Ty::Named(name),
                        ..
                    } => children.push(NodeRef::TypeName(name)),
                    _ => {}
                }
                children.push(NodeRef::Ident(&field.name));
                children.push(NodeRef::Int(&field.number));
                children.extend(field.options.as_ref().map(NodeRef::OptionList));
                if let FieldKind::Group { body, .. } = &field.kind {
                    push_message_body(&mut children, body);
                }
            }
            NodeRef::Oneof(oneof) => {
                children.push(NodeRef::Ident(&oneof.name));
                children.extend(oneof.items.iter().map(|item| match item {
                    OneofItem::Field(node) => NodeRef::Field(node),
                    OneofItem::Option(node) => NodeRef::Option(node),
                    OneofItem::Empty(span) => NodeRef::Empty(span),
                }));
            }
            NodeRef::Enum(enu) => {
                children.push(NodeRef::Ident(&enu.name));
                children.extend(enu.items.iter().map(|item| match item {
                    EnumItem::Value(node) => NodeRef::EnumValue(node),
                    EnumItem::Option(node) => NodeRef::Option(node),
                    EnumItem::Reserved(node) => NodeRef::Reserved(node),
                    EnumItem::Empty(span) => NodeRef::Empty(span),
                }));
            }
            NodeRef::EnumValue(value) => {
                children.push(NodeRef::Ident(&value.name));
                children.push(NodeRef::Int(&value.number));
                children.extend(value.options.as_ref().map(NodeRef::OptionList));
            }
            NodeRef::Extend(extend) => {
                children.push(NodeRef::TypeName(&extend.extendee));
                children.extend(extend.items.iter().map(|item| match item {
                    ExtendItem::Field(node) => NodeRef::Field(node),
                    ExtendItem::Empty(span) => NodeRef::Empty(span),
                }));
            }
            NodeRef::Extensions(extensions) => {
                children.extend(extensions.ranges.iter().map(NodeRef::ReservedRange));
                children.extend(extensions.options.as_ref().map(NodeRef::OptionList));
            }
            NodeRef::Reserved(reserved) => match &reserved.kind {
                ReservedKind::Ranges(ranges) => {
                    children.extend(ranges.iter().map(NodeRef::ReservedRange))
                }
                ReservedKind::Names(names) => children.extend(names.iter().map(NodeRef::Ident)),
            },
            NodeRef::ReservedRange(range) => {
                children.push(NodeRef::Int(&range.start));
                if let ReservedRangeEnd::Int(end) = &range.end {
                    children.push(NodeRef::Int(end));
                }
            }
            NodeRef::Service(service) => {
                children.push(NodeRef::Ident(&service.name));
                children.extend(service.items.iter().map(|item| match item {
                    ServiceItem::Method(node) => NodeRef::Method(node),
                    ServiceItem::Option(node) => NodeRef::Option(node),
                    ServiceItem::Empty(span) => NodeRef::Empty(span),
                }));
            }
            NodeRef::Method(method) => {
                children.push(NodeRef::Ident(&method.name));
                children.push(NodeRef::TypeName(&method.input_ty));
                children.push(NodeRef::TypeName(&method.output_ty));
                children.extend(method.items.iter().map(|item| match item {
                    MethodItem::Option(node) => NodeRef::Option(node),
                    MethodItem::Empty(span) => NodeRef::Empty(span),
                }));
            }
            NodeRef::TypeName(name) => children.extend(name.name.parts.iter().map(NodeRef::Ident)),
            NodeRef::TextField(field) => {
                if let text_format::FieldName::Ident(ident) = &field.name {
                    children.push(NodeRef::Ident(ident));
                }
                push_text_value(&mut children, &field.value);
            }
            NodeRef::Ident(_)
            | NodeRef::Int(_)
            | NodeRef::Float(_)
            | NodeRef::String(_)
            | NodeRef::Empty(_) => {}
        }
        children
    }
}

fn push_message_body<'a>(children: &mut Vec<NodeRef<'a>>, body: &'a MessageBody) {
    children.extend(body.items.iter().map(|item| match item {
        MessageItem::Field(node) => NodeRef::Field(node),
        MessageItem::Oneof(node) => NodeRef::Oneof(node),
        MessageItem::Option(node) => NodeRef::Option(node),
        MessageItem::Message(node) => NodeRef::Message(node),
        MessageItem::Enum(node) => NodeRef::Enum(node),
        MessageItem::Extend(node) => NodeRef::Extend(node),
        MessageItem::Extensions(node) => NodeRef::Extensions(node),
        MessageItem::Reserved(node) => NodeRef::Reserved(node),
        MessageItem::Empty(span) => NodeRef::Empty(span),
    }));
}

fn push_text_value<'a>(children: &mut Vec<NodeRef<'a>>, value: &'a text_format::FieldValue) {
    fn scalar(scalar: &text_format::Scalar) -> NodeRef<'_> {
        match scalar {
            text_format::Scalar::String(string) => NodeRef::String(string),
            text_format::Scalar::Int(int) => NodeRef::Int(int),
            text_format::Scalar::Float(float) => NodeRef::Float(float),
            text_format::Scalar::Ident { ident, .. } => NodeRef::Ident(ident),
        }
    }

    match value {
        text_format::FieldValue::Message(message, _) => {
            children.extend(message.fields.iter().map(NodeRef::TextField))
        }
        text_format::FieldValue::MessageList(messages, _) => children.extend(
            messages
                .iter()
                .flat_map(|(message, _)| message.fields.iter().map(NodeRef::TextField)),
        ),
        text_format::FieldValue::Scalar(value) => children.push(scalar(value)),
        text_format::FieldValue::ScalarList(values, _) => {
            children.extend(values.iter().map(scalar))
        }
    }
}
