use std::{
    io,
    sync::{Arc, Mutex},
};

use insta::assert_snapshot;
use prost::Message;
use prost_reflect::{DescriptorPool, Value};
use prost_types::{
    source_code_info::Location, FileDescriptorProto, FileDescriptorSet, SourceCodeInfo,
};
use protolink::{
    file::{ChainFileResolver, DescriptorSetFileResolver, File, FileResolver, GoogleFileResolver},
    protolink_parse::{BoxError, PositionedError},
    Compiler, Error,
};

struct TestFileResolver {
    files: &'static [(&'static str, &'static str)],
}

impl FileResolver for TestFileResolver {
    fn open_file(&self, name: &str) -> Result<File, Error> {
        if name == "customerror.proto" {
            return Err(Error::new(io::Error::new(
                io::ErrorKind::Other,
                "failed to load file!",
            )));
        }

        for file in self.files {
            if file.0 == name {
                return Ok(File::from_source(name, file.1));
            }
        }

        GoogleFileResolver::new().open_file(name)
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn check(files: &'static [(&'static str, &'static str)]) -> Result<Compiler, Error> {
    init_logger();
    let mut compiler = Compiler::with_file_resolver(TestFileResolver { files });
    for (file, _) in &files[..files.len() - 1] {
        compiler.open_file(file).unwrap();
    }

    compiler.open_file(files[files.len() - 1].0)?;
    Ok(compiler)
}

fn check_err(files: &'static [(&'static str, &'static str)]) -> String {
    format!("{:?}", check(files).unwrap_err())
}

/// Compiles the last file, collecting every error passed to the reporter.
fn check_reported(files: &'static [(&'static str, &'static str)]) -> String {
    init_logger();
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();

    let mut compiler = Compiler::with_file_resolver(TestFileResolver { files });
    compiler.reporter(move |err: &PositionedError| -> Result<(), BoxError> {
        sink.lock().unwrap().push(err.to_string());
        Ok(())
    });
    compiler.open_file(files[files.len() - 1].0).unwrap_err();

    let reported = reported.lock().unwrap();
    reported.join("\n")
}

fn decode_pool(compiler: &Compiler) -> DescriptorPool {
    DescriptorPool::decode(compiler.encode_file_descriptor_set().as_slice()).unwrap()
}

#[test]
fn import_not_found() {
    assert_snapshot!(
        check_err(&[("root.proto", "import 'notfound.proto';")]),
        @"root.proto:1:1: import 'notfound.proto' not found"
    );
}

#[test]
fn import_error() {
    assert_snapshot!(
        check_err(&[("root.proto", "import 'customerror.proto';")]),
        @r###"Custom { kind: Other, error: "failed to load file!" }"###
    );
}

#[test]
fn type_not_found() {
    assert_snapshot!(
        check_err(&[(
            "root.proto",
            "
        message Foo {
            optional NotFound foo = 1;
        }
    "
        )]),
        @"root.proto:3:22: name 'NotFound' is not defined"
    );
}

#[test]
fn every_error_is_reported() {
    assert_snapshot!(
        check_reported(&[(
            "root.proto",
            "message Foo {
    optional A a = 1;
    optional B b = 2;
    option (missing) = 1;
}"
        )]),
        @r###"
    root.proto:2:14: name 'A' is not defined
    root.proto:3:14: name 'B' is not defined
    root.proto:4:5: unknown extension 'missing'
    "###
    );
}

#[test]
fn default_options() {
    let mut compiler = Compiler::with_file_resolver(TestFileResolver {
        files: &[("dep.proto", ""), ("root.proto", "import 'dep.proto';")],
    });

    compiler.open_file("root.proto").unwrap();

    let files = compiler.file_descriptor_set();
    assert_eq!(
        files,
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("root.proto".to_owned()),
                dependency: vec!["dep.proto".to_owned()],
                ..Default::default()
            },],
        }
    );

    let encoded = compiler.encode_file_descriptor_set();
    assert_eq!(
        FileDescriptorSet::decode(encoded.as_slice()).unwrap(),
        files
    );
}

#[test]
fn include_imports() {
    let mut compiler = Compiler::with_file_resolver(TestFileResolver {
        files: &[("dep.proto", ""), ("root.proto", "import 'dep.proto';")],
    });

    compiler.include_imports(true);
    compiler.open_file("root.proto").unwrap();

    let files = compiler.file_descriptor_set();
    assert_eq!(
        files,
        FileDescriptorSet {
            file: vec![
                FileDescriptorProto {
                    name: Some("dep.proto".to_owned()),
                    ..Default::default()
                },
                FileDescriptorProto {
                    name: Some("root.proto".to_owned()),
                    dependency: vec!["dep.proto".to_owned()],
                    ..Default::default()
                },
            ],
        }
    );

    let encoded = compiler.encode_file_descriptor_set();
    assert_eq!(
        FileDescriptorSet::decode(encoded.as_slice()).unwrap(),
        files
    );
}

#[test]
fn include_source_info() {
    let mut compiler = Compiler::with_file_resolver(TestFileResolver {
        files: &[("dep.proto", ""), ("root.proto", "import 'dep.proto';")],
    });

    compiler.include_source_info(true);
    compiler.open_file("root.proto").unwrap();

    let files = compiler.file_descriptor_set();
    similar_asserts::assert_eq!(
        files,
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("root.proto".to_owned()),
                dependency: vec!["dep.proto".to_owned()],
                source_code_info: Some(SourceCodeInfo {
                    location: vec![
                        Location {
                            path: vec![],
                            span: vec![0, 0, 19],
                            ..Default::default()
                        },
                        Location {
                            path: vec![3, 0],
                            span: vec![0, 0, 19],
                            ..Default::default()
                        }
                    ]
                }),
                ..Default::default()
            },],
        }
    );

    let encoded = compiler.encode_file_descriptor_set();
    assert_eq!(
        FileDescriptorSet::decode(encoded.as_slice()).unwrap(),
        files
    );
}

#[test]
fn pass_through_extension_options() {
    let mut resolver = ChainFileResolver::new();
    resolver.add(TestFileResolver {
        files: &[(
            "root.proto",
            "
            import 'google/protobuf/descriptor.proto';

            extend google.protobuf.FileOptions {
                optional int32 ext = 1001;
            }

            option (ext) = 1;
        ",
        )],
    });
    resolver.add(GoogleFileResolver::new());

    let mut compiler = Compiler::with_file_resolver(resolver);
    compiler.include_imports(true);
    compiler.open_file("root.proto").unwrap();

    let dyn_set = decode_pool(&compiler);
    let ext = dyn_set.get_extension_by_name("ext").unwrap();
    assert_eq!(
        dyn_set
            .get_file_by_name("root.proto")
            .unwrap()
            .options()
            .get_extension(&ext)
            .as_ref(),
        &Value::I32(1)
    );

    let roundtripped_resolver =
        DescriptorSetFileResolver::decode(compiler.encode_file_descriptor_set().as_slice())
            .unwrap();
    let mut roundtripped_compiler = Compiler::with_file_resolver(roundtripped_resolver);
    roundtripped_compiler.include_imports(true);

    roundtripped_compiler.open_file("root.proto").unwrap();
    let roundtripped_dyn_set = decode_pool(&roundtripped_compiler);
    let roundtripped_ext = roundtripped_dyn_set.get_extension_by_name("ext").unwrap();
    assert_eq!(
        roundtripped_dyn_set
            .get_file_by_name("root.proto")
            .unwrap()
            .options()
            .get_extension(&roundtripped_ext)
            .as_ref(),
        &Value::I32(1)
    );
}

#[test]
fn aggregate_and_repeated_options() {
    let mut compiler = check(&[(
        "root.proto",
        "
        syntax = 'proto2';
        package opts;

        import 'google/protobuf/descriptor.proto';

        message Rule {
            optional string name = 1;
            repeated int32 values = 2;
            optional Rule nested = 3;
        }

        enum Level {
            LOW = 0;
            HIGH = 1;
        }

        extend google.protobuf.MessageOptions {
            optional Rule rule = 50000;
            repeated string tags = 50001;
        }

        extend google.protobuf.FieldOptions {
            optional Level level = 50000;
        }

        message Foo {
            option (rule) = { name: 'foo' values: [1, 2] nested { name: 'bar' } };
            option (tags) = 'a';
            option (tags) = 'b';

            optional int32 x = 1 [(level) = HIGH];
        }
    ",
    )])
    .unwrap();
    compiler.include_imports(true);

    let pool = decode_pool(&compiler);
    let foo = pool.get_message_by_name("opts.Foo").unwrap();

    let rule_ext = pool.get_extension_by_name("opts.rule").unwrap();
    let options = foo.options();
    let rule = options.get_extension(&rule_ext);
    let rule = rule.as_message().unwrap();
    assert_eq!(
        rule.get_field_by_name("name").unwrap().as_str(),
        Some("foo")
    );
    assert_eq!(
        rule.get_field_by_name("values").unwrap().as_ref(),
        &Value::List(vec![Value::I32(1), Value::I32(2)])
    );
    let nested = rule.get_field_by_name("nested").unwrap();
    assert_eq!(
        nested
            .as_message()
            .unwrap()
            .get_field_by_name("name")
            .unwrap()
            .as_str(),
        Some("bar")
    );

    let tags_ext = pool.get_extension_by_name("opts.tags").unwrap();
    assert_eq!(
        options.get_extension(&tags_ext).as_ref(),
        &Value::List(vec![
            Value::String("a".to_owned()),
            Value::String("b".to_owned())
        ])
    );

    let level_ext = pool.get_extension_by_name("opts.level").unwrap();
    let field = foo.get_field_by_name("x").unwrap();
    assert_eq!(
        field.options().get_extension(&level_ext).as_ref(),
        &Value::EnumNumber(1)
    );
}

#[test]
fn pseudo_options() {
    let compiler = check(&[(
        "root.proto",
        "
        message Foo {
            optional int32 a = 1 [default = -5];
            optional string b = 2 [default = 'hi\\n', json_name = 'bee'];
            optional bytes c = 3 [default = '\\001\\xff'];
            optional double d = 4 [default = inf];
        }
    ",
    )])
    .unwrap();

    let set = compiler.file_descriptor_set();
    let fields = &set.file[0].message_type[0].field;
    assert_eq!(fields[0].default_value(), "-5");
    assert_eq!(fields[0].json_name(), "a");
    assert_eq!(fields[1].default_value(), "hi\n");
    assert_eq!(fields[1].json_name(), "bee");
    assert_eq!(fields[2].default_value(), "\\001\\377");
    assert_eq!(fields[3].default_value(), "inf");
    assert!(fields.iter().all(|field| field.options.is_none()));
}

#[test]
fn option_paths() {
    const SOURCE: &str = "message Foo { option deprecated = true; optional int32 a = 1 [packed = false]; }";

    let compiler = check(&[("root.proto", SOURCE)]).unwrap();
    let paths = compiler.option_paths("root.proto").unwrap();

    let range = |text: &str| {
        let start = SOURCE.find(text).unwrap();
        start..start + text.len()
    };
    assert_eq!(paths.len(), 2);
    assert_eq!(
        paths.get(&range("option deprecated = true;")),
        Some([4, 0, 7, 3].as_slice())
    );
    assert_eq!(
        paths.get(&range("packed = false")),
        Some([4, 0, 2, 0, 8, 2].as_slice())
    );

    let file = compiler.files().next().unwrap();
    assert_eq!(file.name(), "root.proto");
    assert_eq!(file.option_paths(), paths);
}

#[test]
fn lenient_options() {
    let mut compiler = Compiler::with_file_resolver(TestFileResolver {
        files: &[(
            "root.proto",
            "message Foo { option deprecated = true; option (missing) = 1; }",
        )],
    });
    compiler.lenient_options(true);
    compiler.open_file("root.proto").unwrap();

    let set = compiler.file_descriptor_set();
    let options = set.file[0].message_type[0].options.as_ref().unwrap();
    assert_eq!(options.deprecated, Some(true));
    assert_eq!(options.uninterpreted_option.len(), 1);
    assert_eq!(
        options.uninterpreted_option[0].name[0].name_part,
        "missing"
    );
}

#[test]
fn error_fmt_debug() {
    let parse_err = check(&[("root.proto", "message {")]).unwrap_err();
    let check_err = check(&[("root.proto", "message Foo {} service Foo {}")]).unwrap_err();
    let import_err = check(&[("root.proto", "import 'notfound.proto';")]).unwrap_err();
    let open_err = check(&[("root.proto", "import 'customerror.proto';")]).unwrap_err();

    assert!(parse_err.is_parse());
    assert_eq!(parse_err.file(), Some("root.proto"));
    assert_eq!(
        parse_err.to_string(),
        "expected an identifier, but found '{'"
    );
    assert_eq!(
        format!("{:?}", parse_err),
        "root.proto:1:9: expected an identifier, but found '{'"
    );

    assert!(!check_err.is_io() && !check_err.is_parse());
    assert!(check_err.is_invalid_input());
    assert_eq!(check_err.file(), Some("root.proto"));
    assert_eq!(check_err.to_string(), "name 'Foo' is defined twice");
    assert_eq!(
        format!("{:?}", check_err),
        "root.proto:1:24: name 'Foo' is defined twice"
    );

    assert!(import_err.is_file_not_found());
    assert_eq!(import_err.file(), Some("root.proto"));
    assert_eq!(import_err.to_string(), "import 'notfound.proto' not found");

    assert!(open_err.is_io());
    assert!(open_err.file().is_none());
    assert_eq!(open_err.to_string(), "failed to load file!");
}
