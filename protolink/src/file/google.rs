use once_cell::sync::Lazy;
use prost_reflect::{DescriptorPool, ReflectMessage};

use super::{File, FileResolver};
use crate::Error;

/// The names of the files served by [`GoogleFileResolver`].
pub(crate) const WELL_KNOWN_FILES: &[&str] = &[
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

/// The pool of well-known types bundled with `prost-reflect`.
pub(crate) static WELL_KNOWN_POOL: Lazy<DescriptorPool> = Lazy::new(|| {
    prost_types::FileDescriptorProto::default()
        .descriptor()
        .parent_pool()
        .clone()
});

/// An implementation of [`FileResolver`] which resolves well-known imports such as `google/protobuf/descriptor.proto`.
///
/// The files are served as pre-built descriptors, so they carry no source code info.
#[derive(Debug, Default)]
pub struct GoogleFileResolver {
    _priv: (),
}

impl GoogleFileResolver {
    /// Creates a new instance of [`GoogleFileResolver`].
    pub fn new() -> Self {
        Default::default()
    }
}

impl FileResolver for GoogleFileResolver {
    fn open_file(&self, name: &str) -> Result<File, Error> {
        if !WELL_KNOWN_FILES.contains(&name) {
            return Err(Error::file_not_found(name));
        }

        match WELL_KNOWN_POOL.get_file_by_name(name) {
            Some(file) => {
                log::trace!("opened well-known file '{}'", name);
                Ok(File::from_file_descriptor_proto(
                    file.file_descriptor_proto().clone(),
                ))
            }
            None => Err(Error::file_not_found(name)),
        }
    }
}
