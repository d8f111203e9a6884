use std::{fmt, iter::once, mem};

use logos::{Lexer, Logos, Span};

mod comments;
mod text_format;

use self::comments::Comments;
use crate::{
    ast::{self, FieldLabel},
    case::{is_valid_group_name, is_valid_ident},
    error::{ParseError, ParseErrorKind},
    join_span,
    lex::{EqFloat, Token},
    lines::LineResolver,
    reporter::{Abort, ErrorHandler, PositionedError},
    MAX_MESSAGE_FIELD_NUMBER,
};

const FILE_KEYWORDS: &[Token<'static>] = &[
    Token::PACKAGE,
    Token::IMPORT,
    Token::OPTION,
    Token::MESSAGE,
    Token::ENUM,
    Token::SERVICE,
    Token::EXTEND,
];

const MESSAGE_KEYWORDS: &[Token<'static>] = &[
    Token::MESSAGE,
    Token::ENUM,
    Token::EXTEND,
    Token::OPTION,
    Token::ONEOF,
    Token::RESERVED,
    Token::EXTENSIONS,
    Token::MAP,
    Token::OPTIONAL,
    Token::REQUIRED,
    Token::REPEATED,
];

const ENUM_KEYWORDS: &[Token<'static>] = &[Token::OPTION, Token::RESERVED];

const SERVICE_KEYWORDS: &[Token<'static>] = &[Token::RPC, Token::OPTION];

const ONEOF_KEYWORDS: &[Token<'static>] = &[Token::OPTION];

const METHOD_KEYWORDS: &[Token<'static>] = &[Token::OPTION];

const EXTEND_KEYWORDS: &[Token<'static>] = &[Token::OPTIONAL, Token::REQUIRED, Token::REPEATED];

pub(crate) fn parse_file(
    name: &str,
    source: &str,
    handler: &mut ErrorHandler<'_>,
) -> Result<ast::File, ParseError> {
    let mut parser = Parser::new(name, source, handler);
    let file = parser.parse_file();
    parser.finish(Ok(file))
}

pub(crate) fn parse_text_format(
    name: &str,
    source: &str,
    handler: &mut ErrorHandler<'_>,
) -> Result<ast::text_format::Message, ParseError> {
    let mut parser = Parser::new(name, source, handler);
    let message = parser.parse_text_format_message(&[]);
    parser.finish(message)
}

struct Parser<'a, 'r> {
    lexer: Lexer<'a, Token<'a>>,
    peek: Option<(Token<'a>, Span)>,
    name: &'a str,
    lines: LineResolver,
    handler: &'a mut ErrorHandler<'r>,
    errors: Vec<ParseErrorKind>,
    abort: Option<Abort>,
    /// The detached and leading comments for the next declaration.
    comments: ast::Comments,
    syntax: ast::Syntax,
}

#[derive(Debug, Clone)]
enum ExpectedToken {
    Ident,
    Token(Token<'static>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FieldContext {
    Message,
    Oneof,
    Extend,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RangeContext {
    Message,
    Enum,
}

enum FieldTy {
    Normal(ast::Ty, Span),
    Group(Span),
    Map {
        ty_span: Span,
        key_ty: ast::Ty,
        key_ty_span: Span,
        value_ty: ast::Ty,
        value_ty_span: Span,
    },
}

impl<'a, 'r> Parser<'a, 'r> {
    fn new(name: &'a str, source: &'a str, handler: &'a mut ErrorHandler<'r>) -> Self {
        Parser {
            lexer: Token::lexer(source),
            peek: None,
            name,
            lines: LineResolver::new(source),
            handler,
            errors: Vec::new(),
            abort: None,
            comments: ast::Comments::default(),
            syntax: ast::Syntax::default(),
        }
    }

    fn finish<T>(self, result: Result<T, ()>) -> Result<T, ParseError> {
        match result {
            Ok(value) if self.errors.is_empty() => Ok(value),
            _ => Err(ParseError::new(
                self.errors,
                self.name,
                self.lexer.source().to_owned(),
                self.abort,
            )),
        }
    }

    fn parse_file(&mut self) -> ast::File {
        self.collect_comments(true);

        let syntax = match self.peek() {
            Some((Token::SYNTAX, start)) => match self.parse_syntax() {
                Ok(syntax) => {
                    self.syntax = syntax.syntax;
                    Some(syntax)
                }
                Err(()) => {
                    self.recover(start, FILE_KEYWORDS);
                    None
                }
            },
            _ => None,
        };

        let mut items = Vec::new();
        let mut package_span: Option<Span> = None;
        loop {
            let start = match self.peek() {
                Some((_, span)) => span,
                None => break,
            };

            match self.parse_file_item() {
                Ok(ast::FileItem::Package(package)) => {
                    match &package_span {
                        Some(first) => self.add_error(ParseErrorKind::DuplicatePackage {
                            first: first.clone(),
                            second: package.span.clone(),
                        }),
                        None => package_span = Some(package.span.clone()),
                    }
                    items.push(ast::FileItem::Package(package));
                }
                Ok(item) => items.push(item),
                Err(()) => self.recover(start, FILE_KEYWORDS),
            }
        }

        ast::File {
            syntax,
            items,
            span: 0..self.lexer.source().len(),
        }
    }

    fn parse_syntax(&mut self) -> Result<ast::SyntaxDecl, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::SYNTAX)?;
        self.expect_eq(Token::Equals)?;

        let value = self.parse_string()?;
        let syntax = match value.value.as_slice() {
            b"proto2" => ast::Syntax::Proto2,
            b"proto3" => ast::Syntax::Proto3,
            _ => {
                self.add_error(ParseErrorKind::UnknownSyntax {
                    syntax: String::from_utf8_lossy(&value.value).into_owned(),
                    span: value.span.clone(),
                });
                ast::Syntax::Proto2
            }
        };

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::SyntaxDecl {
            syntax,
            value,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_file_item(&mut self) -> Result<ast::FileItem, ()> {
        match self.peek() {
            Some((Token::Semicolon, _)) => Ok(ast::FileItem::Empty(self.parse_empty()?)),
            Some((Token::IMPORT, _)) => Ok(ast::FileItem::Import(self.parse_import()?)),
            Some((Token::PACKAGE, _)) => Ok(ast::FileItem::Package(self.parse_package()?)),
            Some((Token::OPTION, _)) => Ok(ast::FileItem::Option(self.parse_option_statement()?)),
            Some((Token::EXTEND, _)) => Ok(ast::FileItem::Extend(self.parse_extend()?)),
            Some((Token::MESSAGE, _)) => Ok(ast::FileItem::Message(self.parse_message()?)),
            Some((Token::ENUM, _)) => Ok(ast::FileItem::Enum(self.parse_enum()?)),
            Some((Token::SERVICE, _)) => Ok(ast::FileItem::Service(self.parse_service()?)),
            _ => self.unexpected_token(
                "'enum', 'extend', 'import', 'message', 'option', 'service', 'package' or ';'",
            ),
        }
    }

    fn parse_empty(&mut self) -> Result<Span, ()> {
        self.expect_end(Token::Semicolon, None)
    }

    fn parse_package(&mut self) -> Result<ast::Package, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::PACKAGE)?;

        let name = self.parse_full_ident(&[ExpectedToken::SEMICOLON])?;

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::Package {
            name,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_import(&mut self) -> Result<ast::Import, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::IMPORT)?;

        let kind = match self.peek() {
            Some((Token::WEAK, span)) => {
                self.bump();
                Some((ast::ImportKind::Weak, span))
            }
            Some((Token::PUBLIC, span)) => {
                self.bump();
                Some((ast::ImportKind::Public, span))
            }
            Some((Token::StringLiteral(_), _)) => None,
            _ => self.unexpected_token("a string literal, 'public' or 'weak'")?,
        };

        let path = self.parse_string()?;
        let value = match String::from_utf8(path.value) {
            Ok(value) => {
                if !is_valid_import(&value) {
                    self.add_error(ParseErrorKind::InvalidImport {
                        span: path.span.clone(),
                    });
                }
                value
            }
            Err(err) => {
                self.add_error(ParseErrorKind::InvalidUtf8String {
                    span: path.span.clone(),
                });
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::Import {
            kind,
            value,
            value_span: path.span,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_message(&mut self) -> Result<ast::Message, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::MESSAGE)?;

        let name = self.parse_ident()?;

        let body = self.parse_message_body(&mut comments)?;

        Ok(ast::Message {
            name,
            span: join_span(start, body.span.clone()),
            body,
            comments,
        })
    }

    /// Parses a braced message body. The `{` ends the enclosing declaration, so its trailing
    /// comment is stored into `comments`.
    fn parse_message_body(&mut self, comments: &mut ast::Comments) -> Result<ast::MessageBody, ()> {
        let start = self.expect_end(Token::LeftBrace, Some(comments))?;

        let (items, end) = self.parse_block_items(MESSAGE_KEYWORDS, |this| {
            match this.peek() {
                Some((Token::Semicolon, _)) => Ok(ast::MessageItem::Empty(this.parse_empty()?)),
                Some((Token::MESSAGE, _)) => Ok(ast::MessageItem::Message(this.parse_message()?)),
                Some((Token::ENUM, _)) => Ok(ast::MessageItem::Enum(this.parse_enum()?)),
                Some((Token::EXTEND, _)) => Ok(ast::MessageItem::Extend(this.parse_extend()?)),
                Some((Token::OPTION, _)) => {
                    Ok(ast::MessageItem::Option(this.parse_option_statement()?))
                }
                Some((Token::ONEOF, _)) => Ok(ast::MessageItem::Oneof(this.parse_oneof()?)),
                Some((Token::RESERVED, _)) => Ok(ast::MessageItem::Reserved(
                    this.parse_reserved(RangeContext::Message)?,
                )),
                Some((Token::EXTENSIONS, _)) => {
                    Ok(ast::MessageItem::Extensions(this.parse_extensions()?))
                }
                Some((tok, _)) if is_field_start_token(&tok) => Ok(ast::MessageItem::Field(
                    this.parse_field(FieldContext::Message)?,
                )),
                _ => this.unexpected_token(
                    "a message field, oneof, reserved range, enum, message, option or '}'",
                ),
            }
        })?;

        Ok(ast::MessageBody {
            items,
            span: join_span(start, end),
        })
    }

    fn parse_field(&mut self, context: FieldContext) -> Result<ast::Field, ()> {
        let mut comments = self.take_comments();

        let label = match self.peek() {
            Some((Token::OPTIONAL, span)) => {
                self.bump();
                Some((FieldLabel::Optional, span))
            }
            Some((Token::REQUIRED, span)) => {
                self.bump();
                Some((FieldLabel::Required, span))
            }
            Some((Token::REPEATED, span)) => {
                self.bump();
                Some((FieldLabel::Repeated, span))
            }
            Some((tok, _)) if is_field_start_token(&tok) => None,
            _ => self.unexpected_token("a message field")?,
        };

        let (ty, name) = match self.peek() {
            Some((Token::MAP, map_span)) => {
                self.bump();
                match self.peek() {
                    Some((Token::LeftAngleBracket, _)) => {
                        self.bump();
                        let (key_ty, key_ty_span) =
                            self.parse_field_type(&[ExpectedToken::COMMA])?;
                        self.expect_eq(Token::Comma)?;
                        let (value_ty, value_ty_span) =
                            self.parse_field_type(&[ExpectedToken::RIGHT_ANGLE_BRACKET])?;
                        let end = self.expect_eq(Token::RightAngleBracket)?;

                        if !key_ty.is_valid_map_key() {
                            self.add_error(ParseErrorKind::InvalidMapFieldKeyType {
                                span: key_ty_span.clone(),
                            });
                        }

                        let name = self.parse_ident()?;
                        (
                            FieldTy::Map {
                                ty_span: join_span(map_span, end),
                                key_ty,
                                key_ty_span,
                                value_ty,
                                value_ty_span,
                            },
                            name,
                        )
                    }
                    _ => {
                        let first = ast::Ident::new("map", map_span);
                        let ty = self.parse_type_name_rest(None, first, &[ExpectedToken::Ident])?;
                        let ty_span = ty.span();
                        let name = self.parse_ident()?;
                        (FieldTy::Normal(ast::Ty::Named(ty), ty_span), name)
                    }
                }
            }
            Some((Token::GROUP, group_span)) => {
                self.bump();
                match self.peek() {
                    Some((Token::Ident(_), _)) => {
                        let name = self.parse_ident()?;
                        if !is_valid_group_name(&name.value) {
                            self.add_error(ParseErrorKind::InvalidGroupName {
                                span: name.span.clone(),
                            });
                        }
                        (FieldTy::Group(group_span), name)
                    }
                    _ => {
                        let first = ast::Ident::new("group", group_span);
                        let ty = self.parse_type_name_rest(None, first, &[ExpectedToken::Ident])?;
                        let ty_span = ty.span();
                        let name = self.parse_ident()?;
                        (FieldTy::Normal(ast::Ty::Named(ty), ty_span), name)
                    }
                }
            }
            _ => {
                let (ty, ty_span) = self.parse_field_type(&[ExpectedToken::Ident])?;
                let name = self.parse_ident()?;
                (FieldTy::Normal(ty, ty_span), name)
            }
        };

        self.expect_eq(Token::Equals)?;

        let number = self.parse_int()?;

        let options = match self.peek() {
            Some((Token::LeftBracket, _)) => Some(self.parse_option_list()?),
            _ => None,
        };

        let (kind, end) = match ty {
            FieldTy::Group(ty_span) => {
                let body = self.parse_message_body(&mut comments)?;
                let end = body.span.clone();
                (ast::FieldKind::Group { ty_span, body }, end)
            }
            FieldTy::Normal(ty, ty_span) => {
                let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;
                (ast::FieldKind::Normal { ty, ty_span }, end)
            }
            FieldTy::Map {
                ty_span,
                key_ty,
                key_ty_span,
                value_ty,
                value_ty_span,
            } => {
                let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;
                (
                    ast::FieldKind::Map {
                        ty_span,
                        key_ty,
                        key_ty_span,
                        value_ty,
                        value_ty_span,
                    },
                    end,
                )
            }
        };

        let mut field = ast::Field {
            label,
            name,
            kind,
            number,
            options,
            comments,
            span: end,
        };
        let start = match &field.label {
            Some((_, span)) => span.clone(),
            None => field.ty_span(),
        };
        field.span = join_span(start, field.span);
        self.validate_field(&field, context);
        Ok(field)
    }

    fn validate_field(&mut self, field: &ast::Field, context: FieldContext) {
        if !matches!(field.number.as_i32(), Some(1..=MAX_MESSAGE_FIELD_NUMBER)) {
            self.add_error(ParseErrorKind::InvalidMessageNumber {
                span: field.number.span.clone(),
            });
        }

        let label_span = field.label.as_ref().map(|(_, span)| span.clone());

        match context {
            FieldContext::Oneof => {
                if field.is_map() {
                    self.add_error(ParseErrorKind::InvalidOneofFieldKind {
                        kind: "map",
                        span: field.ty_span(),
                    });
                } else if let Some(span) = label_span.clone() {
                    self.add_error(ParseErrorKind::OneofFieldWithLabel { span });
                }
            }
            FieldContext::Extend => {
                if field.is_map() {
                    self.add_error(ParseErrorKind::InvalidExtendFieldKind {
                        kind: "map",
                        span: field.ty_span(),
                    });
                } else if field.label() == Some(FieldLabel::Required) {
                    if let Some(span) = label_span.clone() {
                        self.add_error(ParseErrorKind::RequiredExtendField { span });
                    }
                }
            }
            FieldContext::Message => (),
        }

        if field.is_map() {
            if let Some(span) = label_span.clone() {
                if context == FieldContext::Message {
                    self.add_error(ParseErrorKind::MapFieldWithLabel { span });
                }
            }
        }

        match self.syntax {
            ast::Syntax::Proto2 => {
                if context != FieldContext::Oneof && !field.is_map() && field.label.is_none() {
                    self.add_error(ParseErrorKind::Proto2FieldMissingLabel {
                        span: join_span(field.span.start..field.span.start, field.name.span.clone()),
                    });
                }
            }
            ast::Syntax::Proto3 => {
                if field.is_group() {
                    self.add_error(ParseErrorKind::Proto3GroupField {
                        span: field.ty_span(),
                    });
                }
                if field.label() == Some(FieldLabel::Required) && context != FieldContext::Extend
                {
                    if let Some(span) = label_span {
                        self.add_error(ParseErrorKind::Proto3RequiredField { span });
                    }
                }
            }
        }
    }

    fn parse_oneof(&mut self) -> Result<ast::Oneof, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::ONEOF)?;

        let name = self.parse_ident()?;

        self.expect_end(Token::LeftBrace, Some(&mut comments))?;

        let (items, end) = self.parse_block_items(ONEOF_KEYWORDS, |this| match this.peek() {
            Some((Token::Semicolon, _)) => Ok(ast::OneofItem::Empty(this.parse_empty()?)),
            Some((Token::OPTION, _)) => Ok(ast::OneofItem::Option(this.parse_option_statement()?)),
            Some((tok, _)) if is_field_start_token(&tok) => {
                Ok(ast::OneofItem::Field(this.parse_field(FieldContext::Oneof)?))
            }
            _ => this.unexpected_token("a message field, 'option' or '}'"),
        })?;

        if !items
            .iter()
            .any(|item| matches!(item, ast::OneofItem::Field(_)))
        {
            self.add_error(ParseErrorKind::EmptyOneof {
                span: name.span.clone(),
            });
        }

        Ok(ast::Oneof {
            name,
            items,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_extend(&mut self) -> Result<ast::Extend, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::EXTEND)?;

        let extendee = self.parse_type_name(&[ExpectedToken::LEFT_BRACE])?;

        self.expect_end(Token::LeftBrace, Some(&mut comments))?;

        let (items, end) = self.parse_block_items(EXTEND_KEYWORDS, |this| match this.peek() {
            Some((Token::Semicolon, _)) => Ok(ast::ExtendItem::Empty(this.parse_empty()?)),
            Some((tok, _)) if is_field_start_token(&tok) => {
                Ok(ast::ExtendItem::Field(this.parse_field(FieldContext::Extend)?))
            }
            _ => this.unexpected_token("a message field, '}' or ';'"),
        })?;

        Ok(ast::Extend {
            extendee,
            items,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_service(&mut self) -> Result<ast::Service, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::SERVICE)?;

        let name = self.parse_ident()?;

        self.expect_end(Token::LeftBrace, Some(&mut comments))?;

        let (items, end) = self.parse_block_items(SERVICE_KEYWORDS, |this| match this.peek() {
            Some((Token::Semicolon, _)) => Ok(ast::ServiceItem::Empty(this.parse_empty()?)),
            Some((Token::RPC, _)) => Ok(ast::ServiceItem::Method(this.parse_method()?)),
            Some((Token::OPTION, _)) => {
                Ok(ast::ServiceItem::Option(this.parse_option_statement()?))
            }
            _ => this.unexpected_token("'rpc', '}', 'option' or ';'"),
        })?;

        Ok(ast::Service {
            name,
            items,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_method(&mut self) -> Result<ast::Method, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::RPC)?;

        let name = self.parse_ident()?;

        self.expect_eq(Token::LeftParen)?;
        let (client_streaming, input_ty) = self.parse_method_type()?;
        self.expect_eq(Token::RightParen)?;

        self.expect_eq(Token::RETURNS)?;

        self.expect_eq(Token::LeftParen)?;
        let (server_streaming, output_ty) = self.parse_method_type()?;
        self.expect_eq(Token::RightParen)?;

        let (items, end) = match self.peek() {
            Some((Token::Semicolon, _)) => (
                Vec::new(),
                self.expect_end(Token::Semicolon, Some(&mut comments))?,
            ),
            Some((Token::LeftBrace, _)) => {
                self.expect_end(Token::LeftBrace, Some(&mut comments))?;
                self.parse_block_items(METHOD_KEYWORDS, |this| match this.peek() {
                    Some((Token::Semicolon, _)) => Ok(ast::MethodItem::Empty(this.parse_empty()?)),
                    Some((Token::OPTION, _)) => {
                        Ok(ast::MethodItem::Option(this.parse_option_statement()?))
                    }
                    _ => this.unexpected_token("'option', '}' or ';'"),
                })?
            }
            _ => self.unexpected_token("';' or '{'")?,
        };

        Ok(ast::Method {
            name,
            input_ty,
            client_streaming,
            output_ty,
            server_streaming,
            items,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_method_type(&mut self) -> Result<(Option<Span>, ast::TypeName), ()> {
        match self.peek() {
            Some((Token::STREAM, stream_span)) => {
                self.bump();
                match self.peek() {
                    Some((Token::Ident(_) | Token::Dot, _)) => Ok((
                        Some(stream_span),
                        self.parse_type_name(&[ExpectedToken::RIGHT_PAREN])?,
                    )),
                    _ => {
                        let first = ast::Ident::new("stream", stream_span);
                        let ty = self.parse_type_name_rest(
                            None,
                            first,
                            &[ExpectedToken::RIGHT_PAREN],
                        )?;
                        Ok((None, ty))
                    }
                }
            }
            Some((Token::Dot | Token::Ident(_), _)) => {
                Ok((None, self.parse_type_name(&[ExpectedToken::RIGHT_PAREN])?))
            }
            _ => self.unexpected_token("'stream' or a type name"),
        }
    }

    fn parse_enum(&mut self) -> Result<ast::Enum, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::ENUM)?;

        let name = self.parse_ident()?;

        self.expect_end(Token::LeftBrace, Some(&mut comments))?;

        let (items, end) = self.parse_block_items(ENUM_KEYWORDS, |this| match this.peek() {
            Some((Token::Semicolon, _)) => Ok(ast::EnumItem::Empty(this.parse_empty()?)),
            Some((Token::OPTION, _)) => Ok(ast::EnumItem::Option(this.parse_option_statement()?)),
            Some((Token::RESERVED, _)) => Ok(ast::EnumItem::Reserved(
                this.parse_reserved(RangeContext::Enum)?,
            )),
            Some((Token::Ident(_), _)) => Ok(ast::EnumItem::Value(this.parse_enum_value()?)),
            _ => this.unexpected_token("an identifier, '}', ';', 'option' or 'reserved'"),
        })?;

        Ok(ast::Enum {
            name,
            items,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_enum_value(&mut self) -> Result<ast::EnumValue, ()> {
        let mut comments = self.take_comments();

        let name = self.parse_ident()?;

        self.expect_eq(Token::Equals)?;

        let number = self.parse_int()?;
        if number.as_i32().is_none() {
            self.add_error(ParseErrorKind::InvalidEnumNumber {
                span: number.span.clone(),
            });
        }

        let options = match self.peek() {
            Some((Token::LeftBracket, _)) => Some(self.parse_option_list()?),
            Some((Token::Semicolon, _)) => None,
            _ => self.unexpected_token("';' or '['")?,
        };

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::EnumValue {
            span: join_span(name.span.clone(), end),
            name,
            number,
            options,
            comments,
        })
    }

    fn parse_extensions(&mut self) -> Result<ast::Extensions, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::EXTENSIONS)?;

        let ranges = self.parse_reserved_ranges(RangeContext::Message)?;

        let options = match self.peek() {
            Some((Token::LeftBracket, _)) => Some(self.parse_option_list()?),
            Some((Token::Semicolon, _)) => None,
            _ => self.unexpected_token("',', ';' or '['")?,
        };

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::Extensions {
            ranges,
            options,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_reserved(&mut self, context: RangeContext) -> Result<ast::Reserved, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::RESERVED)?;

        let kind = match self.peek() {
            Some((Token::IntLiteral(_) | Token::Minus, _)) => {
                ast::ReservedKind::Ranges(self.parse_reserved_ranges(context)?)
            }
            Some((Token::StringLiteral(_), _)) => {
                ast::ReservedKind::Names(self.parse_reserved_names()?)
            }
            _ => self.unexpected_token("a positive integer or string")?,
        };

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::Reserved {
            kind,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_reserved_names(&mut self) -> Result<Vec<ast::Ident>, ()> {
        let mut names = vec![self.parse_ident_string()?];

        loop {
            match self.peek() {
                Some((Token::Comma, _)) => {
                    self.bump();
                    names.push(self.parse_ident_string()?);
                }
                Some((Token::Semicolon, _)) => break,
                _ => self.unexpected_token("',' or ';'")?,
            }
        }

        Ok(names)
    }

    fn parse_ident_string(&mut self) -> Result<ast::Ident, ()> {
        let string = self.parse_string()?;
        let value = match string.as_str() {
            Some(value) => {
                if !is_valid_ident(value) {
                    self.add_error(ParseErrorKind::InvalidIdentifier {
                        span: string.span.clone(),
                    });
                }
                value.to_owned()
            }
            None => {
                self.add_error(ParseErrorKind::InvalidUtf8String {
                    span: string.span.clone(),
                });
                String::from_utf8_lossy(&string.value).into_owned()
            }
        };

        Ok(ast::Ident::new(value, string.span))
    }

    fn parse_reserved_ranges(
        &mut self,
        context: RangeContext,
    ) -> Result<Vec<ast::ReservedRange>, ()> {
        let mut ranges = vec![self.parse_reserved_range(context)?];

        while let Some((Token::Comma, _)) = self.peek() {
            self.bump();
            ranges.push(self.parse_reserved_range(context)?);
        }

        Ok(ranges)
    }

    fn parse_reserved_range(&mut self, context: RangeContext) -> Result<ast::ReservedRange, ()> {
        let start = self.parse_int()?;

        let end = match self.peek() {
            Some((Token::TO, _)) => {
                self.bump();
                match self.peek() {
                    Some((Token::MAX, span)) => {
                        self.bump();
                        ast::ReservedRangeEnd::Max(span)
                    }
                    Some((Token::IntLiteral(_) | Token::Minus, _)) => {
                        ast::ReservedRangeEnd::Int(self.parse_int()?)
                    }
                    _ => self.unexpected_token("an integer or 'max'")?,
                }
            }
            Some((Token::Comma | Token::Semicolon | Token::LeftBracket, _)) => {
                ast::ReservedRangeEnd::None
            }
            _ => self.unexpected_token("'to', ',' or ';'")?,
        };

        let range = ast::ReservedRange { start, end };
        self.validate_range(&range, context);
        Ok(range)
    }

    fn validate_range(&mut self, range: &ast::ReservedRange, context: RangeContext) {
        let check = |int: &ast::Int| match context {
            RangeContext::Message => int
                .as_i32()
                .filter(|value| (1..=MAX_MESSAGE_FIELD_NUMBER).contains(value)),
            RangeContext::Enum => int.as_i32(),
        };
        let invalid = |span: Span| match context {
            RangeContext::Message => ParseErrorKind::InvalidMessageNumber { span },
            RangeContext::Enum => ParseErrorKind::InvalidEnumNumber { span },
        };

        let start = check(&range.start);
        if start.is_none() {
            self.add_error(invalid(range.start.span.clone()));
        }

        let end = match &range.end {
            ast::ReservedRangeEnd::None => start,
            ast::ReservedRangeEnd::Int(int) => {
                let end = check(int);
                if end.is_none() {
                    self.add_error(invalid(int.span.clone()));
                }
                end
            }
            ast::ReservedRangeEnd::Max(_) => match context {
                RangeContext::Message => Some(MAX_MESSAGE_FIELD_NUMBER),
                RangeContext::Enum => Some(i32::MAX),
            },
        };

        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                self.add_error(ParseErrorKind::InvalidRange { span: range.span() });
            }
        }
    }

    fn parse_option_statement(&mut self) -> Result<ast::OptionStatement, ()> {
        let mut comments = self.take_comments();
        let start = self.expect_eq(Token::OPTION)?;

        let body = self.parse_option_body()?;

        let end = self.expect_end(Token::Semicolon, Some(&mut comments))?;

        Ok(ast::OptionStatement {
            body,
            comments,
            span: join_span(start, end),
        })
    }

    fn parse_option_list(&mut self) -> Result<ast::OptionList, ()> {
        let start = self.expect_eq(Token::LeftBracket)?;

        let mut options = vec![self.parse_option_body()?];
        let end = loop {
            match self.peek() {
                Some((Token::Comma, _)) => {
                    self.bump();
                    options.push(self.parse_option_body()?);
                }
                Some((Token::RightBracket, _)) => break self.bump(),
                _ => self.unexpected_token("',' or ']'")?,
            }
        };

        Ok(ast::OptionList {
            options,
            span: join_span(start, end),
        })
    }

    fn parse_option_body(&mut self) -> Result<ast::OptionBody, ()> {
        let mut name = Vec::new();
        loop {
            let part = match self.peek() {
                Some((Token::LeftParen, start)) => {
                    self.bump();
                    let type_name = self.parse_type_name(&[ExpectedToken::RIGHT_PAREN])?;
                    let end = self.expect_eq(Token::RightParen)?;
                    ast::OptionNamePart::Extension(type_name, join_span(start, end))
                }
                Some((Token::Ident(_), _)) => ast::OptionNamePart::Ident(self.parse_ident()?),
                _ => self.unexpected_token("an identifier or '('")?,
            };
            name.push(part);

            match self.peek() {
                Some((Token::Dot, _)) => {
                    self.bump();
                }
                Some((Token::Equals, _)) => {
                    self.bump();
                    break;
                }
                _ => self.unexpected_token("'.' or '='")?,
            }
        }

        let value = self.parse_option_value()?;

        let start = name.first().map(|part| part.span()).unwrap_or_default();
        Ok(ast::OptionBody {
            span: join_span(start, value.span()),
            name,
            value,
        })
    }

    fn parse_option_value(&mut self) -> Result<ast::OptionValue, ()> {
        let (negative, sign) = match self.peek() {
            Some((Token::Minus, span)) => {
                self.bump();
                (true, Some(span))
            }
            Some((Token::Plus, span)) => {
                self.bump();
                (false, Some(span))
            }
            _ => (false, None),
        };

        let join_sign = |span: Span| match &sign {
            Some(sign) => join_span(sign.clone(), span),
            None => span,
        };

        match self.peek() {
            Some((Token::Ident(value), span)) => {
                self.bump();
                if negative && !matches!(value, "inf" | "nan") {
                    self.add_error(ParseErrorKind::NegativeIdentOutsideDefault {
                        span: join_sign(span.clone()),
                    });
                }
                Ok(ast::OptionValue::Ident {
                    negative,
                    ident: ast::Ident::new(value, span.clone()),
                    span: join_sign(span),
                })
            }
            Some((Token::IntLiteral(value), span)) => {
                self.bump();
                let int = ast::Int {
                    negative,
                    value,
                    span: join_sign(span),
                };
                if negative && int.as_i64().is_none() {
                    self.add_error(ParseErrorKind::IntegerOutOfRange {
                        span: int.span.clone(),
                    });
                }
                Ok(ast::OptionValue::Int(int))
            }
            Some((Token::FloatLiteral(EqFloat(value)), span)) => {
                self.bump();
                Ok(ast::OptionValue::Float(ast::Float {
                    value: if negative { -value } else { value },
                    span: join_sign(span),
                }))
            }
            Some((Token::StringLiteral(_), _)) if sign.is_none() => {
                Ok(ast::OptionValue::String(self.parse_string()?))
            }
            Some((Token::LeftBrace, start)) if sign.is_none() => {
                self.bump();
                let message = self.parse_text_format_message(&[ExpectedToken::RIGHT_BRACE])?;
                let end = self.expect_eq(Token::RightBrace)?;
                Ok(ast::OptionValue::Aggregate(message, join_span(start, end)))
            }
            _ if sign.is_some() => self.unexpected_token("a numeric literal, 'inf' or 'nan'"),
            _ => self.unexpected_token("an identifier, number, string or '{'"),
        }
    }

    fn parse_field_type(&mut self, terminators: &[ExpectedToken]) -> Result<(ast::Ty, Span), ()> {
        let scalar_ty = match self.peek() {
            Some((Token::DOUBLE, span)) => (ast::Ty::Double, span),
            Some((Token::FLOAT, span)) => (ast::Ty::Float, span),
            Some((Token::INT32, span)) => (ast::Ty::Int32, span),
            Some((Token::INT64, span)) => (ast::Ty::Int64, span),
            Some((Token::UINT32, span)) => (ast::Ty::Uint32, span),
            Some((Token::UINT64, span)) => (ast::Ty::Uint64, span),
            Some((Token::SINT32, span)) => (ast::Ty::Sint32, span),
            Some((Token::SINT64, span)) => (ast::Ty::Sint64, span),
            Some((Token::FIXED32, span)) => (ast::Ty::Fixed32, span),
            Some((Token::FIXED64, span)) => (ast::Ty::Fixed64, span),
            Some((Token::SFIXED32, span)) => (ast::Ty::Sfixed32, span),
            Some((Token::SFIXED64, span)) => (ast::Ty::Sfixed64, span),
            Some((Token::BOOL, span)) => (ast::Ty::Bool, span),
            Some((Token::STRING, span)) => (ast::Ty::String, span),
            Some((Token::BYTES, span)) => (ast::Ty::Bytes, span),
            Some((Token::Dot | Token::Ident(_), _)) => {
                let ty = self.parse_type_name(terminators)?;
                let span = ty.span();
                return Ok((ast::Ty::Named(ty), span));
            }
            _ => self.unexpected_token("a field type")?,
        };

        self.bump();
        Ok(scalar_ty)
    }

    fn parse_type_name(&mut self, terminators: &[ExpectedToken]) -> Result<ast::TypeName, ()> {
        let leading_dot = match self.peek() {
            Some((Token::Dot, span)) => {
                self.bump();
                Some(span)
            }
            Some((Token::Ident(_), _)) => None,
            _ => self.unexpected_token("a type name")?,
        };

        let first = self.parse_ident()?;
        self.parse_type_name_rest(leading_dot, first, terminators)
    }

    /// Parses the remainder of a type name whose first identifier has already been consumed.
    fn parse_type_name_rest(
        &mut self,
        leading_dot: Option<Span>,
        first: ast::Ident,
        terminators: &[ExpectedToken],
    ) -> Result<ast::TypeName, ()> {
        let name = self.parse_full_ident_rest(first, terminators)?;
        Ok(ast::TypeName { leading_dot, name })
    }

    fn parse_full_ident(&mut self, terminators: &[ExpectedToken]) -> Result<ast::FullIdent, ()> {
        let first = self.parse_ident()?;
        self.parse_full_ident_rest(first, terminators)
    }

    fn parse_full_ident_rest(
        &mut self,
        first: ast::Ident,
        terminators: &[ExpectedToken],
    ) -> Result<ast::FullIdent, ()> {
        let mut result = vec![first];

        loop {
            match self.peek() {
                Some((Token::Dot, _)) => {
                    self.bump();
                }
                Some((tok, _)) if terminators.iter().any(|e| e.matches(&tok)) => {
                    return Ok(result.into());
                }
                _ => self.unexpected_token(fmt_expected(
                    once(ExpectedToken::DOT).chain(terminators.iter().cloned()),
                ))?,
            }

            result.push(self.parse_ident()?);
        }
    }

    fn parse_ident(&mut self) -> Result<ast::Ident, ()> {
        match self.peek() {
            Some((Token::Ident(value), span)) => {
                self.bump();
                Ok(ast::Ident::new(value, span))
            }
            _ => self.unexpected_token("an identifier"),
        }
    }

    /// Parses an integer literal, with an optional leading `-`.
    fn parse_int(&mut self) -> Result<ast::Int, ()> {
        let (negative, start) = match self.peek() {
            Some((Token::Minus, span)) => {
                self.bump();
                (true, Some(span))
            }
            _ => (false, None),
        };

        match self.peek() {
            Some((Token::IntLiteral(value), span)) => {
                self.bump();
                Ok(ast::Int {
                    negative,
                    value,
                    span: match start {
                        Some(start) => join_span(start, span),
                        None => span,
                    },
                })
            }
            _ => self.unexpected_token("an integer"),
        }
    }

    /// Parses one or more adjacent string literals, concatenating their values.
    fn parse_string(&mut self) -> Result<ast::StringLiteral, ()> {
        let (mut value, mut span) = match self.peek() {
            Some((Token::StringLiteral(value), span)) => {
                self.bump();
                (value.into_owned(), span)
            }
            _ => return self.unexpected_token("a string literal"),
        };

        while let Some((Token::StringLiteral(next), next_span)) = self.peek() {
            self.bump();
            value.extend_from_slice(&next);
            span = join_span(span, next_span);
        }

        Ok(ast::StringLiteral { value, span })
    }

    /// Parses the items of a braced block after its `{`, up to and including the closing `}`.
    fn parse_block_items<T>(
        &mut self,
        keywords: &[Token<'static>],
        mut parse_item: impl FnMut(&mut Self) -> Result<T, ()>,
    ) -> Result<(Vec<T>, Span), ()> {
        let mut items = Vec::new();
        loop {
            let start = match self.peek() {
                Some((Token::RightBrace, _)) => {
                    let end = self.expect_end(Token::RightBrace, None)?;
                    return Ok((items, end));
                }
                Some((_, span)) => span,
                None => return self.unexpected_token("'}'"),
            };

            match parse_item(self) {
                Ok(item) => items.push(item),
                Err(()) => self.recover(start, keywords),
            }
        }
    }

    /// Skips tokens after an error until the parser is likely to be at the start of the next
    /// statement.
    fn recover(&mut self, start: Span, keywords: &[Token<'static>]) {
        if self.abort.is_some() {
            return;
        }

        // Always make progress, so a statement which cannot start is skipped.
        if let Some((tok, span)) = self.peek() {
            if span == start && !matches!(tok, Token::Semicolon | Token::LeftBrace) {
                self.bump();
            }
        }

        loop {
            match self.peek() {
                None | Some((Token::RightBrace, _)) => return,
                Some((Token::Semicolon, _)) => {
                    self.bump();
                    self.collect_comments(false);
                    return;
                }
                Some((Token::LeftBrace, _)) => {
                    self.bump();
                    self.skip_block();
                    self.collect_comments(false);
                    return;
                }
                Some((tok, _)) if keywords.iter().any(|keyword| *keyword == tok) => return,
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn skip_block(&mut self) {
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                Some((Token::LeftBrace, _)) => depth += 1,
                Some((Token::RightBrace, _)) => depth -= 1,
                Some(_) => (),
                None => return,
            }
            self.bump();
        }
    }

    fn expect_eq(&mut self, t: Token<'static>) -> Result<Span, ()> {
        match self.peek() {
            Some((tok, _)) if tok == t => Ok(self.bump()),
            _ => self.unexpected_token(format!("'{}'", t)),
        }
    }

    /// Consumes a token which ends a declaration, and collects the comments following it.
    fn expect_end(
        &mut self,
        t: Token<'static>,
        comments: Option<&mut ast::Comments>,
    ) -> Result<Span, ()> {
        let span = self.expect_eq(t)?;
        let trailing = self.collect_comments(false);
        if let Some(comments) = comments {
            comments.trailing_comment = trailing;
        }
        Ok(span)
    }

    fn take_comments(&mut self) -> ast::Comments {
        mem::take(&mut self.comments)
    }

    /// Reads the comments between the token just consumed and the next token.
    ///
    /// Returns the trailing comment of the consumed token, and stores the detached and leading
    /// comments for whatever declaration starts next.
    fn collect_comments(&mut self, start_of_file: bool) -> Option<String> {
        debug_assert!(self.peek.is_none());
        let mut comments = Comments::new(!start_of_file);

        let mut next = self.next_raw();
        if !start_of_file {
            match next {
                Some((Token::LineComment(text), _)) => {
                    comments.line_comment(&text);
                    comments.flush();
                    next = self.next_raw();
                }
                Some((Token::BlockComment(text), _)) => {
                    comments.block_comment(&text);
                    next = self.next_raw();
                    if matches!(next, Some((Token::Newline, _))) {
                        comments.flush();
                        next = self.next_raw();
                    } else {
                        // A block comment followed by a token on the same line belongs to neither.
                        comments.clear();
                        return self.finish_comments(comments, next);
                    }
                }
                Some((Token::Newline, _)) => next = self.next_raw(),
                _ => return self.finish_comments(comments, next),
            }
        }

        loop {
            match next {
                Some((Token::LineComment(text), _)) => comments.line_comment(&text),
                Some((Token::BlockComment(text), _)) => {
                    comments.block_comment(&text);
                    next = self.next_raw();
                    if !matches!(next, Some((Token::Newline, _))) {
                        continue;
                    }
                }
                Some((Token::Newline, _)) => {
                    comments.flush();
                    comments.detach_from_prev();
                }
                _ => {
                    if next.as_ref().map_or(true, |(tok, _)| tok.is_closing()) {
                        comments.flush();
                    }
                    return self.finish_comments(comments, next);
                }
            }
            next = self.next_raw();
        }
    }

    fn finish_comments(
        &mut self,
        comments: Comments,
        next: Option<(Token<'a>, Span)>,
    ) -> Option<String> {
        self.peek = next;
        let (trailing, upcoming) = comments.finish();
        self.comments = upcoming;
        trailing
    }

    fn bump(&mut self) -> Span {
        match self.peek.take() {
            Some((_, span)) => span,
            None => {
                debug_assert!(false, "called bump without peek returning Some()");
                let len = self.lexer.source().len();
                len..len
            }
        }
    }

    fn peek(&mut self) -> Option<(Token<'a>, Span)> {
        if self.abort.is_some() {
            return None;
        }
        if self.peek.is_none() {
            self.peek = self.next();
        }
        self.peek.clone()
    }

    fn next(&mut self) -> Option<(Token<'a>, Span)> {
        loop {
            match self.next_raw() {
                Some((tok, _)) if tok.is_trivia() => continue,
                next => return next,
            }
        }
    }

    /// Reads the next token, including comments and newlines. Runs of invalid characters are
    /// reported as a single error and skipped.
    fn next_raw(&mut self) -> Option<(Token<'a>, Span)> {
        let mut invalid: Option<Span> = None;
        let next = loop {
            let token = self.lexer.next();
            let span = self.lexer.span();
            match token {
                Some(Ok(token)) => break Some((token, span)),
                Some(Err(())) => {
                    invalid = match invalid.take() {
                        Some(prev) if prev.end == span.start => Some(prev.start..span.end),
                        Some(prev) => {
                            self.add_error(ParseErrorKind::InvalidToken { span: prev });
                            Some(span)
                        }
                        None => Some(span),
                    };
                }
                None => break None,
            }
        };

        if let Some(span) = invalid {
            self.add_error(ParseErrorKind::InvalidToken { span });
        }
        for err in mem::take(&mut self.lexer.extras.errors) {
            self.add_error(err);
        }

        if self.abort.is_some() {
            None
        } else {
            next
        }
    }

    fn unexpected_token<T>(&mut self, expected: impl ToString) -> Result<T, ()> {
        match self.peek() {
            Some((found, span)) => {
                self.add_error(ParseErrorKind::UnexpectedToken {
                    expected: expected.to_string(),
                    found: found.to_string(),
                    span,
                });
                Err(())
            }
            None => {
                // Every enclosing block would otherwise report the same end of file.
                if !matches!(self.errors.last(), Some(ParseErrorKind::UnexpectedEof { .. })) {
                    let len = self.lexer.source().len();
                    self.add_error(ParseErrorKind::UnexpectedEof {
                        expected: expected.to_string(),
                        span: len..len,
                    });
                }
                Err(())
            }
        }
    }

    fn add_error(&mut self, err: ParseErrorKind) {
        if self.abort.is_some() {
            return;
        }

        let offset = err.span().map_or(0, |span| span.start);
        let (line, column) = self.lines.resolve(offset);
        let error = PositionedError::new(
            self.name,
            line as usize + 1,
            column as usize + 1,
            err.to_string(),
        );
        self.errors.push(err);

        if let Err(abort) = self.handler.report(error) {
            log::debug!("stopped parsing '{}': {}", self.name, abort);
            self.abort = Some(abort);
        }
    }
}

impl ExpectedToken {
    const DOT: Self = ExpectedToken::Token(Token::Dot);
    const COMMA: Self = ExpectedToken::Token(Token::Comma);
    const SEMICOLON: Self = ExpectedToken::Token(Token::Semicolon);
    const LEFT_BRACE: Self = ExpectedToken::Token(Token::LeftBrace);
    const RIGHT_BRACE: Self = ExpectedToken::Token(Token::RightBrace);
    const RIGHT_PAREN: Self = ExpectedToken::Token(Token::RightParen);
    const LEFT_BRACKET: Self = ExpectedToken::Token(Token::LeftBracket);
    const RIGHT_BRACKET: Self = ExpectedToken::Token(Token::RightBracket);
    const RIGHT_ANGLE_BRACKET: Self = ExpectedToken::Token(Token::RightAngleBracket);
    const FORWARD_SLASH: Self = ExpectedToken::Token(Token::ForwardSlash);

    fn matches(&self, tok: &Token) -> bool {
        match self {
            ExpectedToken::Ident => matches!(tok, Token::Ident(_)),
            ExpectedToken::Token(t) => t == tok,
        }
    }
}

impl fmt::Display for ExpectedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedToken::Ident => write!(f, "an identifier"),
            ExpectedToken::Token(Token::IntLiteral(_)) => write!(f, "a number"),
            ExpectedToken::Token(Token::StringLiteral(_)) => write!(f, "a string"),
            ExpectedToken::Token(tok) => write!(f, "'{}'", tok),
        }
    }
}

fn is_field_start_token(tok: &Token) -> bool {
    matches!(tok, Token::Dot | Token::Ident(_))
}

fn is_valid_import(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|component| !component.is_empty() && component != "." && component != "..")
}

fn fmt_expected(ts: impl Iterator<Item = ExpectedToken>) -> String {
    let ts: Vec<_> = ts.collect();

    let mut s = String::with_capacity(32);
    for (index, t) in ts.iter().enumerate() {
        if index != 0 {
            if index == ts.len() - 1 {
                s.push_str(" or ");
            } else {
                s.push_str(", ");
            }
        }
        s.push_str(&t.to_string());
    }
    s
}
