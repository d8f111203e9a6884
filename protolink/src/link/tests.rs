use proptest::prelude::*;

use protolink_parse::{BoxError, PositionedError};

use super::*;
use crate::{
    error::CheckError,
    file::{FileResolver, GoogleFileResolver},
};

fn link_all(files: &[(&str, &str)]) -> Result<LinkedFile, Error> {
    let descriptor = GoogleFileResolver::new()
        .open_file("google/protobuf/descriptor.proto")
        .unwrap();
    let mut linked = vec![link(descriptor, &[], &mut ErrorHandler::default()).unwrap()];
    for (name, source) in files {
        let deps: Vec<&LinkedFile> = linked.iter().collect();
        let file = link(
            File::from_source(name, source),
            &deps,
            &mut ErrorHandler::default(),
        )?;
        linked.push(file);
    }
    Ok(linked.pop().unwrap())
}

fn link_errors(files: &[(&str, &str)]) -> Vec<String> {
    let err = link_all(files).unwrap_err();
    let errors: Vec<String> = err
        .check_errors()
        .into_iter()
        .map(|err| match err {
            CheckError::Link(err) => err.to_string(),
            CheckError::Option(err) => err.to_string(),
        })
        .collect();
    assert!(!errors.is_empty(), "unexpected error: {:?}", err);
    errors
}

fn link_one(source: &str) -> LinkedFile {
    link_all(&[("test.proto", source)]).unwrap()
}

#[test]
fn prefix_list() {
    assert_eq!(create_prefix_list("a.b.c"), ["a.b.c", "a.b", "a", ""]);
    assert_eq!(create_prefix_list("foo"), ["foo", ""]);
    assert_eq!(create_prefix_list(""), [""]);
}

proptest! {
    #[test]
    fn prefix_list_ends_with_root(parts in prop::collection::vec("[a-z]{1,4}", 0..5)) {
        let scope = parts.join(".");
        let prefixes = create_prefix_list(&scope);
        prop_assert_eq!(prefixes.len(), parts.len() + 1);
        prop_assert_eq!(prefixes[0], scope.as_str());
        prop_assert_eq!(*prefixes.last().unwrap(), "");
        for pair in prefixes.windows(2) {
            prop_assert!(pair[0].starts_with(pair[1]));
        }
    }
}

#[test]
fn resolve_innermost_scope_first() {
    let file = link_one(
        "
        package pkg;
        message Bar {}
        message Foo {
            message Bar {}
            optional Bar inner = 1;
            optional .pkg.Bar outer = 2;
            optional pkg.Bar qualified = 3;
        }
        ",
    );
    let descriptor = file.file_descriptor_proto();
    let fields = &descriptor.message_type[1].field;
    assert_eq!(fields[0].type_name(), ".pkg.Foo.Bar");
    assert_eq!(fields[1].type_name(), ".pkg.Bar");
    assert_eq!(fields[2].type_name(), ".pkg.Bar");
}

#[test]
fn resolve_sets_field_type() {
    let file = link_one(
        "
        syntax = 'proto2';
        enum Kind { A = 0; }
        message Foo {
            optional Kind kind = 1;
            optional Foo foo = 2;
            optional group Bar = 3 {}
        }
        ",
    );
    let descriptor = file.file_descriptor_proto();
    let fields = &descriptor.message_type[0].field;
    assert_eq!(fields[0].r#type(), prost_types::field_descriptor_proto::Type::Enum);
    assert_eq!(fields[1].r#type(), prost_types::field_descriptor_proto::Type::Message);
    assert_eq!(fields[2].r#type(), prost_types::field_descriptor_proto::Type::Group);
    assert_eq!(fields[2].type_name(), ".Foo.Bar");
}

#[test]
fn resolve_skips_non_aggregate_prefix() {
    // `Foo.foo` is a field, so the search for `foo.Bar` continues to the package.
    let file = link_one(
        "
        package foo;
        message Bar {}
        message Foo {
            optional int32 foo = 1;
            optional foo.Bar bar = 2;
        }
        ",
    );
    let descriptor = file.file_descriptor_proto();
    assert_eq!(descriptor.message_type[1].field[1].type_name(), ".foo.Bar");
}

#[test]
fn resolve_stops_at_aggregate_prefix() {
    // `Foo.foo` is a message without a nested `Bar`, which hides the package `foo`.
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            package foo;
            message Bar {}
            message Foo {
                message foo {}
                optional foo.Bar bar = 1;
            }
            ",
        )]),
        ["name 'foo.Bar' is not defined"]
    );
}

#[test]
fn resolve_method_types() {
    let file = link_one(
        "
        package pkg;
        message Request {}
        message Response {}
        service Service {
            rpc Call(Request) returns (stream .pkg.Response);
        }
        ",
    );
    let descriptor = file.file_descriptor_proto();
    let method = &descriptor.service[0].method[0];
    assert_eq!(method.input_type(), ".pkg.Request");
    assert_eq!(method.output_type(), ".pkg.Response");
    assert_eq!(method.server_streaming, Some(true));
}

#[test]
fn resolve_errors() {
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            syntax = 'proto2';
            enum Kind { A = 0; }
            service Service {
                rpc Call(Kind) returns (Missing);
            }
            message Foo {
                optional Service service = 1;
            }
            extend Kind {
                optional int32 ext = 1;
            }
            ",
        )]),
        [
            "'Service' is not a type",
            "'Kind' is not a message type",
            "method input type 'Kind' is not a message",
            "name 'Missing' is not defined",
        ]
    );
}

#[test]
fn imported_names() {
    let file = link_all(&[
        ("dep.proto", "package dep; message Dep {}"),
        ("public.proto", "package pub; message Public {}"),
        ("reexport.proto", "import public 'public.proto';"),
        (
            "root.proto",
            "
            import 'dep.proto';
            import 'reexport.proto';
            message Foo {
                optional dep.Dep dep = 1;
                optional pub.Public reexported = 2;
            }
            ",
        ),
    ])
    .unwrap();
    let descriptor = file.file_descriptor_proto();
    assert_eq!(descriptor.message_type[0].field[0].type_name(), ".dep.Dep");
    assert_eq!(descriptor.message_type[0].field[1].type_name(), ".pub.Public");
}

#[test]
fn transitive_import_not_visible() {
    assert_eq!(
        link_errors(&[
            ("dep.proto", "package dep; message Dep {}"),
            ("middle.proto", "import 'dep.proto';"),
            (
                "root.proto",
                "import 'middle.proto'; message Foo { optional dep.Dep dep = 1; }",
            ),
        ]),
        ["name 'dep.Dep' is not defined"]
    );
}

#[test]
fn duplicate_name_in_file() {
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            message Foo {}
            enum Foo { A = 0; }
            ",
        )]),
        ["name 'Foo' is defined twice"]
    );
}

#[test]
fn duplicate_enum_value_is_sibling_of_enum() {
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            enum Foo { A = 0; }
            enum Bar { A = 0; }
            ",
        )]),
        ["name 'A' is defined twice"]
    );
}

#[test]
fn duplicate_name_in_imports() {
    assert_eq!(
        link_errors(&[
            ("a.proto", "package pkg; message Foo {}"),
            ("b.proto", "package pkg; enum Foo { A = 0; }"),
            ("root.proto", "import 'a.proto'; import 'b.proto';"),
        ]),
        ["name 'pkg.Foo' is defined twice, as a message in 'a.proto' and as an enum in 'b.proto'"]
    );
}

#[test]
fn duplicate_name_in_file_and_import() {
    assert_eq!(
        link_errors(&[
            ("dep.proto", "message Foo {}"),
            ("root.proto", "import 'dep.proto'; service Foo {}"),
        ]),
        ["name 'Foo' is already defined as a message in imported file 'dep.proto'"]
    );
}

#[test]
fn duplicate_name_in_file_and_indirect_import() {
    assert_eq!(
        link_errors(&[
            ("a.proto", "package p; message M {}"),
            ("b.proto", "import 'a.proto';"),
            ("c.proto", "import 'b.proto'; package p; message M {}"),
        ]),
        ["name 'p.M' is already defined as a message in imported file 'a.proto'"]
    );
}

#[test]
fn indirect_import_names_stay_hidden() {
    let errors = link_errors(&[
        ("a.proto", "package p; message M {}"),
        ("b.proto", "import 'a.proto';"),
        ("c.proto", "import 'b.proto'; package p; message N { optional M m = 1; }"),
    ]);
    assert_eq!(errors, ["name 'M' is not defined"]);
}

#[test]
fn packages_may_be_shared() {
    link_all(&[
        ("dep.proto", "package foo.bar; message Dep {}"),
        ("root.proto", "package foo; import 'dep.proto'; message Root { optional bar.Dep dep = 1; }"),
    ])
    .unwrap();
}

#[test]
fn missing_import() {
    let err = link_all(&[("root.proto", "import 'missing.proto';")]).unwrap_err();
    assert!(err.is_file_not_found());
    assert_eq!(err.file(), Some("root.proto"));
    assert_eq!(err.to_string(), "import 'missing.proto' not found");
}

#[test]
fn missing_weak_import_dropped() {
    let file = link_all(&[
        ("a.proto", "message A {}"),
        ("b.proto", "message B {}"),
        (
            "root.proto",
            "import weak 'missing.proto'; import public 'a.proto'; import weak 'b.proto';",
        ),
    ])
    .unwrap();
    let descriptor = file.file_descriptor_proto();
    assert_eq!(descriptor.dependency, ["a.proto", "b.proto"]);
    assert_eq!(descriptor.public_dependency, [0]);
    assert_eq!(descriptor.weak_dependency, [1]);

    let info = descriptor.source_code_info.unwrap();
    let import_paths: Vec<&[i32]> = info
        .location
        .iter()
        .map(|location| location.path.as_slice())
        .filter(|path| {
            matches!(
                path.first(),
                Some(&tag::file::DEPENDENCY | &tag::file::WEAK_DEPENDENCY)
            )
        })
        .collect();
    assert_eq!(import_paths, [&[3, 0][..], &[3, 1][..], &[11, 0][..]]);
}

#[test]
fn proto3_rules() {
    assert_eq!(
        link_errors(&[
            ("dep.proto", "syntax = 'proto2'; enum Closed { A = 1; }"),
            (
                "root.proto",
                "
                syntax = 'proto3';
                import 'dep.proto';
                import 'google/protobuf/descriptor.proto';
                enum Open { B = 1; }
                message Foo {
                    Closed closed = 1;
                    int32 foo_bar = 2;
                    int32 fooBar = 3;
                    extensions 100 to 200;
                }
                extend Foo {
                    int32 ext = 100;
                }
                extend google.protobuf.FieldOptions {
                    int32 allowed = 50000;
                }
                ",
            ),
        ]),
        [
            "enum 'Closed' is a proto2 enum, and cannot be used in a proto3 message",
            "camel-case name of field 'foo_bar' conflicts with field 'fooBar'",
            "the first value of a proto3 enum must be zero",
            "extension fields are not allowed in proto3",
        ]
    );
}

#[test]
fn enum_number_aliases() {
    assert_eq!(
        link_errors(&[("test.proto", "enum Foo { A = 0; B = 0; }")]),
        ["enum number '0' has already been used"]
    );
    link_one("enum Foo { option allow_alias = true; A = 0; B = 0; }");
}

#[test]
fn field_number_conflicts() {
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            syntax = 'proto2';
            message Foo {
                optional int32 a = 1;
                optional int32 b = 1;
                optional int32 c = 5;
                optional int32 d = 10;
                optional int32 e = 20;
                reserved 4 to 6;
                reserved 'd';
                extensions 20 to 30;
            }
            ",
        )]),
        [
            "field number '1' has already been used",
            "field number '5' of 'c' is reserved",
            "field name 'd' is reserved",
            "field number '20' of 'e' is in an extension range",
        ]
    );
}

#[test]
fn enum_reserved() {
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            enum Foo {
                A = 0;
                B = 2;
                C = 3;
                reserved 1 to 2;
                reserved 'C';
            }
            ",
        )]),
        [
            "enum value number '2' of 'B' is reserved",
            "enum value name 'C' is reserved",
        ]
    );
}

#[test]
fn overlapping_ranges() {
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            syntax = 'proto2';
            message Foo {
                reserved 1 to 10;
                extensions 5 to 20;
            }
            ",
        )]),
        ["range 1 to 10 overlaps with range 5 to 20"]
    );
    assert_eq!(
        link_errors(&[(
            "test.proto",
            "
            enum Foo {
                A = 0;
                reserved 1 to 10, 3 to 4;
            }
            ",
        )]),
        ["range 1 to 10 overlaps with range 3 to 4"]
    );
}

#[test]
fn extension_numbers() {
    assert_eq!(
        link_errors(&[
            (
                "dep.proto",
                "
                syntax = 'proto2';
                message Foo { extensions 100 to 200; }
                extend Foo { optional int32 first = 100; }
                ",
            ),
            (
                "root.proto",
                "
                syntax = 'proto2';
                import 'dep.proto';
                extend Foo {
                    optional int32 second = 100;
                    optional int32 third = 300;
                }
                ",
            ),
        ]),
        [
            "extension number '100' of 'Foo' is already used by 'first'",
            "message 'Foo' does not declare '300' as an extension number",
        ]
    );
}

#[test]
fn error_spans() {
    let source = "message Foo { optional Missing foo = 1; }";
    let err = link_all(&[("test.proto", source)]).unwrap_err();
    match err.check_errors().as_slice() {
        [CheckError::Link(LinkError::NameNotFound { name, span })] => {
            assert_eq!(name, "Missing");
            let span = span.unwrap();
            assert_eq!(&source[span.offset()..][..span.len()], "Missing");
        }
        errors => panic!("unexpected errors: {:?}", errors),
    }
}

#[test]
fn reporter_receives_positioned_errors() {
    let mut reported = Vec::new();
    let err = link(
        File::from_source("test.proto", "message Foo {\n  optional Missing foo = 1;\n}"),
        &[],
        &mut ErrorHandler::new(|err: &PositionedError| -> Result<(), BoxError> {
            reported.push(err.clone());
            Ok(())
        }),
    )
    .unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(reported.len(), 1);
    assert_eq!(
        reported[0].to_string(),
        "test.proto:2:12: name 'Missing' is not defined"
    );
}

#[test]
fn error_limit_aborts() {
    let err = link(
        File::from_source(
            "test.proto",
            "message Foo { optional A a = 1; optional B b = 2; optional C c = 3; }",
        ),
        &[],
        &mut ErrorHandler::default().with_limit(1),
    )
    .unwrap_err();
    assert!(err.is_too_many_errors());
}
