use prost_reflect::{DescriptorPool, ReflectMessage};
use protolink::{file::GoogleFileResolver, Compiler};

const WELL_KNOWN_FILES: &[&str] = &[
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
    "google/protobuf/compiler/plugin.proto",
];

#[test]
fn well_known_types_link_from_descriptors() {
    let mut compiler = Compiler::with_file_resolver(GoogleFileResolver::new());
    compiler.include_imports(true);
    for file in WELL_KNOWN_FILES {
        compiler.open_file(file).unwrap();
    }

    let compiled = DescriptorPool::decode(compiler.encode_file_descriptor_set().as_slice()).unwrap();
    let expected = ().descriptor().parent_pool().clone();

    let mut compiled_names: Vec<String> = compiled
        .all_messages()
        .map(|message| message.full_name().to_owned())
        .collect();
    let mut expected_names: Vec<String> = expected
        .all_messages()
        .filter(|message| WELL_KNOWN_FILES.contains(&message.parent_file().name()))
        .map(|message| message.full_name().to_owned())
        .collect();
    compiled_names.sort();
    expected_names.sort();
    similar_asserts::assert_eq!(compiled_names, expected_names);

    let compiled_files: Vec<&str> = compiler.files().map(|file| file.name()).collect();
    assert_eq!(compiled_files.len(), WELL_KNOWN_FILES.len());
    assert_eq!(
        compiled_files.last().copied(),
        Some("google/protobuf/compiler/plugin.proto")
    );
}

#[test]
fn descriptor_options_resolve() {
    let mut compiler = Compiler::with_file_resolver(GoogleFileResolver::new());
    compiler.open_file("google/protobuf/descriptor.proto").unwrap();

    let set = compiler.file_descriptor_set();
    let file = &set.file[0];
    assert_eq!(file.package(), "google.protobuf");
    assert_eq!(
        file.options.as_ref().unwrap().java_package(),
        "com.google.protobuf"
    );
}
