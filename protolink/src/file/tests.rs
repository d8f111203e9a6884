use std::{
    fs,
    path::{Path, PathBuf},
};

use prost::Message;
use prost_types::FileDescriptorProto;

use crate::{error::ErrorKind, file::FileResolver, Error};

use super::{
    check_shadow, ChainFileResolver, DescriptorSetFileResolver, File, GoogleFileResolver,
    ImportRemapper, IncludeFileResolver, RemapRule,
};

struct EmptyFileResolver;

impl FileResolver for EmptyFileResolver {
    fn open_file(&self, name: &str) -> Result<File, Error> {
        Err(Error::file_not_found(name))
    }
}

struct SingleFileResolver(File);

impl FileResolver for SingleFileResolver {
    fn resolve_path(&self, path: &Path) -> Option<String> {
        if self.0.path() == Some(path) {
            Some(self.0.name().to_owned())
        } else {
            None
        }
    }

    fn open_file(&self, name: &str) -> Result<File, Error> {
        if name == self.0.name() {
            Ok(self.0.clone())
        } else {
            Err(Error::file_not_found(name))
        }
    }
}

struct FailingFileResolver;

impl FileResolver for FailingFileResolver {
    fn open_file(&self, _: &str) -> Result<File, Error> {
        Err(Error::new("resolver failed"))
    }
}

#[test]
fn chain_file_resolver() {
    let source = "syntax = 'proto3';";

    let mut resolver = ChainFileResolver::new();
    resolver.add(EmptyFileResolver);
    resolver.add(SingleFileResolver(File::from_source("foo.proto", source)));
    resolver.add(SingleFileResolver(File {
        name: "bar.proto".to_owned(),
        path: Some(PathBuf::from("./bar.proto")),
        source: Some(source.to_owned()),
        ast: None,
        descriptor: None,
    }));

    assert_eq!(resolver.resolve_path("./notfound.proto".as_ref()), None);
    assert_eq!(
        resolver.resolve_path("./bar.proto".as_ref()).as_deref(),
        Some("bar.proto")
    );

    assert!(resolver
        .open_file("notfound.proto")
        .unwrap_err()
        .is_file_not_found());
    assert_eq!(resolver.open_file("foo.proto").unwrap().name(), "foo.proto");
    assert_eq!(resolver.open_file("bar.proto").unwrap().name(), "bar.proto");
}

#[test]
fn chain_file_resolver_stops_on_other_errors() {
    let mut resolver = ChainFileResolver::new();
    resolver.add(FailingFileResolver);
    resolver.add(SingleFileResolver(File::from_source("foo.proto", "")));

    let err = resolver.open_file("foo.proto").unwrap_err();
    assert!(!err.is_file_not_found());
    assert_eq!(err.to_string(), "resolver failed");
}

#[test]
fn include_file_resolver() {
    let tempdir = tempfile::TempDir::new().unwrap();
    fs::create_dir(tempdir.path().join("dir")).unwrap();
    fs::write(tempdir.path().join("dir/foo.proto"), "message Foo {}").unwrap();

    let resolver = IncludeFileResolver::new(tempdir.path().to_owned());
    assert_eq!(
        resolver
            .resolve_path(&tempdir.path().join("dir").join("foo.proto"))
            .as_deref(),
        Some("dir/foo.proto")
    );
    assert_eq!(resolver.resolve_path(tempdir.path()), None);

    let file = resolver.open_file("dir/foo.proto").unwrap();
    assert_eq!(file.name(), "dir/foo.proto");
    assert_eq!(file.source(), Some("message Foo {}"));
    assert!(!file.is_parsed());

    assert!(resolver
        .open_file("dir/bar.proto")
        .unwrap_err()
        .is_file_not_found());
}

#[test]
fn include_file_resolver_invalid_utf8() {
    let tempdir = tempfile::TempDir::new().unwrap();
    fs::write(tempdir.path().join("foo.proto"), b"message \xff {}").unwrap();

    let resolver = IncludeFileResolver::new(tempdir.path().to_owned());
    let err = resolver.open_file("foo.proto").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FileInvalidUtf8 { name } if name == "foo.proto"));
    assert!(err.is_parse());
}

#[test]
fn shadowed_file() {
    let expected = Path::new("include2").join("foo.proto");
    let actual = Path::new("include1").join("foo.proto");

    assert!(check_shadow("foo.proto", Some(&expected), &expected).is_ok());
    assert!(check_shadow("foo.proto", None, &expected).is_ok());

    let err = check_shadow("foo.proto", Some(&actual), &expected).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::FileShadowed { .. }));
    assert_eq!(err.file(), Some("foo.proto"));
}

#[test]
fn parse_file_keeps_ast() {
    let mut file = File::from_source("foo.proto", "package foo; message Bar {}");
    file.parse(&mut Default::default()).unwrap();

    assert!(file.is_parsed());
    assert!(file.ast().is_some());
    let descriptor = file.file_descriptor_proto().unwrap();
    assert_eq!(descriptor.package(), "foo");
    assert_eq!(descriptor.message_type[0].name(), "Bar");
}

#[test]
fn parse_file_error() {
    let mut file = File::from_source("foo.proto", "message {}");
    let err = file.parse(&mut Default::default()).unwrap_err();
    assert!(err.is_parse());
    assert!(!file.is_parsed());
}

#[test]
fn descriptor_set_file_resolver() {
    let mut encoded_files: Vec<u8> = vec![
        0x0a, 0x16, 0x0a, 0x09, 0x66, 0x6f, 0x6f, 0x2e, 0x70, 0x72, 0x6f, 0x74, 0x6f, 0x62, 0x06,
        0x70, 0x72, 0x6f, 0x74, 0x6f, 0x33,
    ];
    let unknown_field = &[0x90, 0x03, 0x05];
    encoded_files.extend_from_slice(unknown_field);

    let resolver = DescriptorSetFileResolver::decode(encoded_files.as_slice()).unwrap();
    assert_eq!(resolver.file_names().collect::<Vec<_>>(), ["foo.proto"]);

    let file = resolver.open_file("foo.proto").unwrap();
    assert_eq!(file.name(), "foo.proto");
    assert_eq!(file.source(), None);
    assert_eq!(file.path(), None);
    assert!(file.is_parsed());
    assert_eq!(
        file.file_descriptor_proto(),
        Some(FileDescriptorProto {
            name: Some("foo.proto".to_owned()),
            syntax: Some("proto3".to_owned()),
            ..Default::default()
        })
    );

    assert!(resolver
        .open_file("notfound.proto")
        .unwrap_err()
        .is_file_not_found());
}

#[test]
fn descriptor_set_file_resolver_keeps_extension_options() {
    // FileDescriptorProto { name: "foo.proto", options: FileOptions { 50000: 5 } }
    let file: Vec<u8> = vec![
        0x0a, 0x09, 0x66, 0x6f, 0x6f, 0x2e, 0x70, 0x72, 0x6f, 0x74, 0x6f, 0x42, 0x04, 0x80, 0xb5,
        0x18, 0x05,
    ];
    let mut encoded_set = vec![0x0a, file.len() as u8];
    encoded_set.extend_from_slice(&file);

    let resolver = DescriptorSetFileResolver::decode(encoded_set.as_slice()).unwrap();
    let file = resolver.open_file("foo.proto").unwrap();
    let options = file.descriptor.as_ref().unwrap().options.as_ref().unwrap();
    assert!(options.contains(50000));
    assert_eq!(
        file.descriptor.as_ref().unwrap().encode_to_vec(),
        encoded_set[2..]
    );
}

#[test]
fn decode_file_descriptor_proto_keeps_extension_options() {
    // FileDescriptorProto { name: "foo.proto", options: FileOptions { 50000: 5 } }
    let bytes: Vec<u8> = vec![
        0x0a, 0x09, 0x66, 0x6f, 0x6f, 0x2e, 0x70, 0x72, 0x6f, 0x74, 0x6f, 0x42, 0x04, 0x80, 0xb5,
        0x18, 0x05,
    ];

    let file = File::decode_file_descriptor_proto(&bytes).unwrap();
    assert_eq!(file.name(), "foo.proto");
    assert_eq!(file.source(), None);
    assert_eq!(file.descriptor.as_ref().unwrap().encode_to_vec(), bytes);

    assert!(File::decode_file_descriptor_proto(&[0x0a, 0x09]).is_err());
}

#[test]
fn descriptor_set_file_resolver_rejects_invalid_input() {
    // A FileDescriptorProto whose name has the wrong wire type.
    let encoded = [0x0a, 0x02, 0x08, 0x01];
    assert!(DescriptorSetFileResolver::decode(encoded.as_slice()).is_err());
}

#[test]
fn google_resolver() {
    let resolver = GoogleFileResolver::new();
    for name in [
        "google/protobuf/any.proto",
        "google/protobuf/api.proto",
        "google/protobuf/descriptor.proto",
        "google/protobuf/duration.proto",
        "google/protobuf/empty.proto",
        "google/protobuf/field_mask.proto",
        "google/protobuf/source_context.proto",
        "google/protobuf/struct.proto",
        "google/protobuf/timestamp.proto",
        "google/protobuf/type.proto",
        "google/protobuf/wrappers.proto",
    ] {
        let file = resolver.open_file(name).unwrap();
        assert_eq!(file.name(), name);
        assert!(file.is_parsed());
        assert_eq!(file.source(), None);
    }

    assert!(resolver
        .open_file("otherfile")
        .unwrap_err()
        .is_file_not_found());
}

#[test]
fn import_remapper_first_match_wins() {
    let remapper = ImportRemapper::new()
        .with_rule(RemapRule::exact("a.proto", "first.proto"))
        .with_rule(RemapRule::exact("a.proto", "second.proto"))
        .with_rule(RemapRule::prefix("lib/", "vendor/lib/").for_importer("main.proto"));

    assert_eq!(remapper.remap("main.proto", "a.proto"), "first.proto");
    assert_eq!(remapper.remap("main.proto", "lib/b.proto"), "vendor/lib/b.proto");
    assert_eq!(remapper.remap("other.proto", "lib/b.proto"), "lib/b.proto");
    assert!(ImportRemapper::new().is_empty());
}

#[test]
fn import_remapper_importer_prefix() {
    let remapper = ImportRemapper::new()
        .with_rule(RemapRule::prefix("lib/", "vendor/lib/").for_importer_prefix("app/"))
        .with_rule(RemapRule::exact("lib/b.proto", "shared/b.proto").for_importer_prefix(""));

    assert_eq!(remapper.remap("app/main.proto", "lib/b.proto"), "vendor/lib/b.proto");
    assert_eq!(remapper.remap("app/sub/x.proto", "lib/c.proto"), "vendor/lib/c.proto");
    assert_eq!(remapper.remap("application.proto", "lib/b.proto"), "shared/b.proto");
    assert_eq!(remapper.remap("tools/gen.proto", "lib/c.proto"), "lib/c.proto");
}
