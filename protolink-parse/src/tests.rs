use insta::assert_snapshot;

use crate::{
    ast, parse, parse_ast, parse_file, text_format, BoxError, ErrorHandler, FailFast,
    PositionedError,
};

#[test]
fn parse_returns_descriptor_with_source_info() {
    let file = parse("foo.proto", "package foo;\nmessage Bar {}\n").unwrap();
    assert_eq!(file.name(), "foo.proto");
    assert_eq!(file.package(), "foo");
    assert_eq!(file.message_type[0].name(), "Bar");
    assert!(!file.source_code_info.unwrap().location.is_empty());
}

#[test]
fn parse_file_returns_ast_and_descriptor() {
    let mut handler = ErrorHandler::default();
    let parsed =
        parse_file("foo.proto", "syntax = 'proto3'; enum E { A = 0; }", &mut handler).unwrap();
    assert_eq!(parsed.ast.syntax(), ast::Syntax::Proto3);
    assert!(matches!(parsed.ast.items[0], ast::FileItem::Enum(_)));
    assert_eq!(parsed.descriptor.enum_type[0].name(), "E");
    assert_eq!(handler.error_count(), 0);
}

#[test]
fn error_debug_format() {
    let err = parse(
        "foo.proto",
        "syntax = 'proto2';\nmessage Foo {\n  int32 a = 1;\n}\n",
    )
    .unwrap_err();
    assert_snapshot!(format!("{:?}", err), @"foo.proto:3:3: fields must have a label with proto2 syntax (expected one of 'optional', 'repeated' or 'required')");
    assert_eq!(err.file(), "foo.proto");
    assert_eq!(err.error_count(), 1);
}

#[test]
fn error_display_reports_first_error() {
    let err = parse("foo.proto", "message Foo { optional int32 a = 0; }").unwrap_err();
    assert_snapshot!(err.to_string(), @"message numbers must be between 1 and 536870911");
}

#[test]
fn reporter_receives_every_error() {
    let mut errors: Vec<PositionedError> = Vec::new();
    let mut handler = ErrorHandler::new(|err: &PositionedError| -> Result<(), BoxError> {
        errors.push(err.clone());
        Ok(())
    });
    let err = parse_ast(
        "foo.proto",
        "message Foo {\n  optional int32 a = 0;\n  optional int32 b = -1;\n}\n",
        &mut handler,
    )
    .unwrap_err();
    drop(handler);

    assert_eq!(err.error_count(), 2);
    let messages: Vec<_> = errors.iter().map(|err| err.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "foo.proto:2:22: message numbers must be between 1 and 536870911",
            "foo.proto:3:22: message numbers must be between 1 and 536870911",
        ]
    );
}

#[test]
fn fail_fast_stops_at_first_error() {
    let mut handler = ErrorHandler::new(FailFast);
    let err = parse_ast(
        "foo.proto",
        "message Foo { optional int32 a = 0; optional int32 b = 0; }",
        &mut handler,
    )
    .unwrap_err();
    assert!(err.is_aborted());
    assert_eq!(err.error_count(), 1);
    assert_eq!(handler.error_count(), 1);
}

#[test]
fn text_format_round_trip() {
    let source = r#"a: 1 b: -2.5 c: "q\"x" d { e: [1, 2] } f: [{}, { g: -inf }] [ext.h]: X"#;
    let message = text_format::parse("value", source).unwrap();
    let printed = message.to_string();
    assert_eq!(printed, source);
    assert_eq!(text_format::parse("value", &printed).unwrap(), message);
}

#[test]
fn text_format_errors() {
    let err = text_format::parse("value", "a 1").unwrap_err();
    assert_snapshot!(format!("{:?}", err), @"value:1:1: expected ':' after scalar text format field");
}
