use std::{
    fs,
    iter::once,
    sync::{Arc, Mutex},
};

use prost::Message;
use protolink_parse::{BoxError, FailFast};
use tempfile::TempDir;

use super::*;
use crate::file::{File, RemapRule};

const EMPTY: &[u8] = &[];

#[derive(Debug, Clone, Default)]
struct MapResolver {
    files: Vec<(&'static str, &'static str)>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl MapResolver {
    fn new(files: &[(&'static str, &'static str)]) -> Self {
        MapResolver {
            files: files.to_vec(),
            opened: Default::default(),
        }
    }

    fn open_count(&self, name: &str) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|opened| *opened == name)
            .count()
    }
}

impl FileResolver for MapResolver {
    fn open_file(&self, name: &str) -> Result<File, Error> {
        self.opened.lock().unwrap().push(name.to_owned());
        match self.files.iter().find(|(file, _)| *file == name) {
            Some((_, source)) => Ok(File::from_source(name, source)),
            None => crate::file::GoogleFileResolver::new().open_file(name),
        }
    }
}

fn compiler(files: &[(&'static str, &'static str)]) -> Compiler {
    Compiler::with_file_resolver(MapResolver::new(files))
}

fn names(set: &prost_types::FileDescriptorSet) -> Vec<&str> {
    set.file.iter().map(|file| file.name()).collect()
}

fn test_compile_success(include: impl AsRef<Path>, file: impl AsRef<Path>, name: &str) {
    let include = include.as_ref();
    let file = file.as_ref();

    fs::create_dir_all(include).unwrap();
    if let Some(parent) = include.join(name).parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(include.join(name), EMPTY).unwrap();

    let mut compiler = Compiler::new(once(include)).unwrap();
    compiler.open_file(file).unwrap();

    assert_eq!(compiler.files().len(), 1);
    assert_eq!(
        compiler.file_descriptor_set().file[0],
        prost_types::FileDescriptorProto {
            name: Some(name.to_owned()),
            ..Default::default()
        }
    );
    assert_eq!(
        compiler.files().next().unwrap().path(),
        Some(include.join(name).as_ref())
    );
}

fn test_compile_not_included(include: impl AsRef<Path>, file: impl AsRef<Path>, name: &str) {
    let include = include.as_ref();
    let file = file.as_ref();

    fs::create_dir_all(include).unwrap();
    if let Some(parent) = include.join(name).parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(include.join(name), EMPTY).unwrap();

    let mut compiler = Compiler::new(once(include)).unwrap();
    let err = compiler.open_file(file).unwrap_err();

    match err.kind() {
        ErrorKind::FileNotIncluded { path } => assert_eq!(path, file),
        err => panic!("unexpected error: {}", err),
    }
    assert_eq!(compiler.files().len(), 0);
}

#[test]
fn abs_include_simple_file() {
    let dir = TempDir::new().unwrap();
    test_compile_success(dir.path(), "foo.proto", "foo.proto");
}

#[test]
fn abs_include_simple_subdir_file() {
    let dir = TempDir::new().unwrap();
    test_compile_success(dir.path(), "dir/foo.proto", "dir/foo.proto");
}

#[test]
fn abs_include_abs_file() {
    let dir = TempDir::new().unwrap();
    test_compile_success(dir.path(), dir.path().join("foo.proto"), "foo.proto");
}

#[test]
fn abs_include_abs_subdir_file() {
    let dir = TempDir::new().unwrap();
    test_compile_success(
        dir.path(),
        dir.path().join("dir").join("foo.proto"),
        "dir/foo.proto",
    );
}

#[test]
fn abs_subdir_include_abs_subdir_file() {
    let dir = TempDir::new().unwrap();
    test_compile_success(
        dir.path().join("include"),
        dir.path().join("include").join("foo.proto"),
        "foo.proto",
    );
}

#[test]
fn abs_include_complex_file() {
    let dir = TempDir::new().unwrap();
    test_compile_not_included(
        &dir,
        dir.path()
            .join("dir")
            .join("..")
            .join("dir")
            .join("foo.proto"),
        "dir/foo.proto",
    );
}

#[test]
fn abs_subdir_include_file_outside_include() {
    let dir = TempDir::new().unwrap();
    test_compile_not_included(
        dir.path().join("include"),
        dir.path().join("foo.proto"),
        "foo.proto",
    );
}

#[test]
fn shadowed_file() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let second = dir.path().join("second");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(first.join("foo.proto"), EMPTY).unwrap();
    fs::write(second.join("foo.proto"), EMPTY).unwrap();

    let mut compiler = Compiler::new([&first, &second]).unwrap();
    let err = compiler.open_file(second.join("foo.proto")).unwrap_err();
    match err.kind() {
        ErrorKind::FileShadowed { name, path, shadow } => {
            assert_eq!(name, "foo.proto");
            assert_eq!(path, &second.join("foo.proto"));
            assert_eq!(shadow, &first.join("foo.proto"));
        }
        err => panic!("unexpected error: {}", err),
    }
}

#[test]
fn imports_are_ordered_first() {
    let mut compiler = compiler(&[
        ("c.proto", "message C {}"),
        ("b.proto", "import 'c.proto'; message B { optional C c = 1; }"),
        (
            "a.proto",
            "import 'b.proto'; import 'c.proto'; message A { optional B b = 1; optional C c = 2; }",
        ),
    ]);
    compiler.open_file("a.proto").unwrap();

    assert_eq!(names(&compiler.file_descriptor_set()), ["a.proto"]);
    compiler.include_imports(true);
    assert_eq!(
        names(&compiler.file_descriptor_set()),
        ["c.proto", "b.proto", "a.proto"]
    );
    let files: Vec<&str> = compiler.files().map(|file| file.name()).collect();
    assert_eq!(files, ["c.proto", "b.proto", "a.proto"]);
}

#[test]
fn shared_imports_compiled_once() {
    let resolver = MapResolver::new(&[
        ("d.proto", "message D {}"),
        ("b.proto", "import 'd.proto';"),
        ("c.proto", "import 'd.proto';"),
        ("a.proto", "import 'b.proto'; import 'c.proto';"),
    ]);
    let mut compiler = Compiler::with_file_resolver(resolver.clone());
    compiler.open_file("a.proto").unwrap();
    compiler.open_file("d.proto").unwrap();

    assert_eq!(resolver.open_count("d.proto"), 1);
    assert_eq!(
        names(&compiler.file_descriptor_set()),
        ["d.proto", "a.proto"]
    );
}

#[test]
fn import_cycle() {
    let mut compiler = compiler(&[
        ("a.proto", "import 'b.proto';"),
        ("b.proto", "import 'c.proto';"),
        ("c.proto", "import 'a.proto';"),
    ]);
    let err = compiler.open_file("a.proto").unwrap_err();
    assert_eq!(
        err.to_string(),
        "import cycle detected: a.proto -> b.proto -> c.proto -> a.proto"
    );
}

#[test]
fn import_not_found() {
    let mut compiler = compiler(&[("root.proto", "import 'missing.proto';")]);
    let err = compiler.open_file("root.proto").unwrap_err();
    assert!(err.is_file_not_found());
    assert_eq!(err.file(), Some("root.proto"));
    assert_eq!(
        format!("{:?}", err),
        "root.proto:1:1: import 'missing.proto' not found"
    );
}

#[test]
fn weak_import_not_found() {
    let mut compiler = compiler(&[(
        "root.proto",
        "import weak 'missing.proto'; message Foo {}",
    )]);
    compiler.open_file("root.proto").unwrap();

    let set = compiler.file_descriptor_set();
    assert!(set.file[0].dependency.is_empty());
    assert!(set.file[0].weak_dependency.is_empty());
}

#[test]
fn remapped_imports() {
    let mut compiler = compiler(&[
        ("vendor/dep.proto", "package dep; message Dep {}"),
        (
            "root.proto",
            "import 'third_party/dep.proto'; message Foo { optional dep.Dep dep = 1; }",
        ),
    ]);
    compiler.import_remapper(
        ImportRemapper::new().with_rule(RemapRule::prefix("third_party/", "vendor/")),
    );
    compiler.open_file("root.proto").unwrap();

    let set = compiler.file_descriptor_set();
    assert_eq!(set.file[0].dependency, ["vendor/dep.proto"]);
    assert_eq!(
        set.file[0].message_type[0].field[0].type_name(),
        ".dep.Dep"
    );
}

#[test]
fn parse_only() {
    let mut compiler = compiler(&[
        ("dep.proto", "message Dep {}"),
        (
            "root.proto",
            "import 'dep.proto'; message Foo { optional Missing foo = 1 [(custom) = 1]; }",
        ),
    ]);
    compiler.parse_only(true).include_imports(true);
    compiler.open_file("root.proto").unwrap();

    assert_eq!(compiler.files().len(), 0);
    assert!(compiler.ast("root.proto").is_some());
    assert!(compiler.option_paths("root.proto").is_none());

    let set = compiler.file_descriptor_set();
    assert_eq!(names(&set), ["dep.proto", "root.proto"]);
    let field = &set.file[1].message_type[0].field[0];
    assert_eq!(field.type_name(), "Missing");
    assert_eq!(
        field.options.as_ref().unwrap().uninterpreted_option.len(),
        1
    );
}

#[test]
fn lenient_options() {
    let files = &[("root.proto", "message Foo { option (custom) = 1; }")];

    let err = compiler(files).open_file("root.proto").unwrap_err();
    assert!(err.is_invalid_input());

    let mut compiler = compiler(files);
    compiler.lenient_options(true).open_file("root.proto").unwrap();
    let set = compiler.file_descriptor_set();
    let options = set.file[0].message_type[0].options.as_ref().unwrap();
    assert_eq!(options.uninterpreted_option.len(), 1);
    assert!(compiler.option_paths("root.proto").unwrap().is_empty());
}

#[test]
fn source_info() {
    let files = &[("root.proto", "// A message.\nmessage Foo {}")];

    let mut compiler = compiler(files);
    compiler.open_file("root.proto").unwrap();
    assert_eq!(compiler.file_descriptor_set().file[0].source_code_info, None);

    compiler.include_source_info(true);
    let set = compiler.file_descriptor_set();
    let info = set.file[0].source_code_info.as_ref().unwrap();
    let location = info
        .location
        .iter()
        .find(|location| location.path == [4, 0])
        .unwrap();
    assert_eq!(location.leading_comments(), " A message.\n");
}

#[test]
fn register_source_info() {
    let mut compiler = compiler(&[("root.proto", "message Foo {}")]);
    compiler.open_file("root.proto").unwrap();

    let mut registry = SourceInfoRegistry::new();
    compiler.register_source_info(&mut registry).unwrap();
    compiler.register_source_info(&mut registry).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.source_info_map("root.proto").is_some());

    let mut other = Compiler::with_file_resolver(MapResolver::new(&[(
        "root.proto",
        "message Foo { optional int32 bar = 1; }",
    )]));
    other.open_file("root.proto").unwrap();
    let err = other.register_source_info(&mut registry).unwrap_err();
    assert_eq!(
        err.to_string(),
        "conflicting source info registered for file 'root.proto'"
    );
}

#[test]
fn encode_keeps_custom_options() {
    let mut compiler = compiler(&[(
        "root.proto",
        "
        import 'google/protobuf/descriptor.proto';
        extend google.protobuf.MessageOptions { optional int32 custom = 50000; }
        message Foo { option (custom) = 5; }
        ",
    )]);
    compiler.open_file("root.proto").unwrap();

    let set = compiler.file_descriptor_set();
    let options = set.file[0].message_type[0].options.as_ref().unwrap();
    assert!(options.uninterpreted_option.is_empty());

    let encoded = compiler.encode_file_descriptor_set();
    let decoded = types::FileDescriptorSet::decode(encoded.as_slice()).unwrap();
    let options = decoded.file[0].message_type[0].options.as_ref().unwrap();
    assert_eq!(
        options.get(50000),
        Some(&crate::options::Value::Uint64(5))
    );
}

#[test]
fn cancellation() {
    let token = CancellationToken::new();
    let mut compiler = compiler(&[("root.proto", "message Foo {}")]);
    compiler.cancellation_token(token.clone());
    token.cancel();

    let err = compiler.open_file("root.proto").unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(compiler.files().len(), 0);
}

#[test]
fn reporter_and_error_limit() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = reported.clone();

    let mut compiler = compiler(&[(
        "root.proto",
        "message Foo { optional A a = 1; optional B b = 2; optional C c = 3; }",
    )]);
    compiler
        .reporter(move |err: &PositionedError| -> Result<(), BoxError> {
            sink.lock().unwrap().push(err.to_string());
            Ok(())
        })
        .error_limit(1);

    let err = compiler.open_file("root.proto").unwrap_err();
    assert!(err.is_too_many_errors());
    assert_eq!(
        *reported.lock().unwrap(),
        [
            "root.proto:1:24: name 'A' is not defined",
            "root.proto:1:42: name 'B' is not defined",
        ]
    );
}

#[test]
fn reporter_abort() {
    let mut compiler = compiler(&[("root.proto", "message Foo { optional A a = 1; }")]);
    compiler.reporter(FailFast);

    let err = compiler.open_file("root.proto").unwrap_err();
    assert_eq!(
        err.aborted().unwrap().to_string(),
        "root.proto:1:24: name 'A' is not defined"
    );
}

#[test]
fn add_in_memory_file() {
    let mut compiler = compiler(&[("dep.proto", "message Dep {}")]);
    compiler
        .add_file(File::from_source(
            "memory.proto",
            "import 'dep.proto'; message Foo { optional Dep dep = 1; }",
        ))
        .unwrap();

    let set = compiler.file_descriptor_set();
    assert_eq!(names(&set), ["memory.proto"]);
    assert_eq!(set.file[0].message_type[0].field[0].type_name(), ".Dep");
}

#[test]
fn debug_lists_files() {
    let mut compiler = compiler(&[("root.proto", "")]);
    compiler.open_file("root.proto").unwrap();
    let debug = format!("{:?}", compiler);
    assert!(debug.contains("root.proto"), "{}", debug);
}
