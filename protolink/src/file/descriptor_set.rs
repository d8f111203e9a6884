use bytes::Buf;
use prost::{DecodeError, Message};

use crate::{
    file::{File, FileResolver},
    types::{self, FileDescriptorProto, FileDescriptorSet},
    Error,
};

/// An implementation of [`FileResolver`] which resolves files from a compiled [`FileDescriptorSet`](prost_types::FileDescriptorSet).
///
/// Files are returned as descriptors, which are linked against their imports like any other file
/// but are not parsed again.
#[derive(Debug)]
pub struct DescriptorSetFileResolver {
    set: Vec<FileDescriptorProto>,
}

impl DescriptorSetFileResolver {
    /// Creates an instance of [`DescriptorSetFileResolver`] from the file descriptor set.
    pub fn new(set: prost_types::FileDescriptorSet) -> Self {
        DescriptorSetFileResolver {
            set: set.file.iter().map(types::transcode).collect(),
        }
    }

    /// Creates an instance of [`DescriptorSetFileResolver`] by deserializing a [`FileDescriptorSet`](prost_types::FileDescriptorSet)
    /// from the given bytes.
    ///
    /// Unlike when going through [`new()`](DescriptorSetFileResolver::new), extension options are preserved.
    pub fn decode<B>(mut buf: B) -> Result<Self, DecodeError>
    where
        B: Buf,
    {
        let bytes = buf.copy_to_bytes(buf.remaining());
        // Reject anything that is not a well-formed descriptor set before keeping the raw options.
        prost_types::FileDescriptorSet::decode(bytes.clone())?;
        let set = FileDescriptorSet::decode(bytes)?;
        Ok(DescriptorSetFileResolver { set: set.file })
    }

    /// The names of the files in this set, in order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.set.iter().map(|file| file.name.as_deref().unwrap_or_default())
    }
}

impl FileResolver for DescriptorSetFileResolver {
    fn open_file(&self, name: &str) -> Result<File, Error> {
        match self
            .set
            .iter()
            .find(|file| file.name.as_deref() == Some(name))
        {
            Some(file) => Ok(File {
                name: name.to_owned(),
                path: None,
                source: None,
                ast: None,
                descriptor: Some(file.clone()),
            }),
            None => Err(Error::file_not_found(name)),
        }
    }
}
