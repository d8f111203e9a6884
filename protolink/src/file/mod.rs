//! Locating and opening protobuf source files.

mod chain;
mod descriptor_set;
mod google;
mod include;
mod remap;
#[cfg(test)]
mod tests;

pub use chain::ChainFileResolver;
pub use descriptor_set::DescriptorSetFileResolver;
pub use google::GoogleFileResolver;
pub use include::IncludeFileResolver;
pub use remap::{ImportRemapper, RemapRule};

pub(crate) use google::WELL_KNOWN_POOL;
pub(crate) use include::check_shadow;

use std::{
    fs,
    io::{self, Read},
    path::{self, Path, PathBuf},
};

use prost::{DecodeError, Message};
use protolink_parse::{ast, ErrorHandler};

use crate::{
    error::ErrorKind,
    types::{self, FileDescriptorProto},
    Error, MAX_FILE_LEN,
};

/// A strategy for locating protobuf source files.
///
/// The main implementation is [`IncludeFileResolver`] which uses the file system, but
/// this trait allows sourcing files from other places as well.
pub trait FileResolver {
    /// Converts a file system path to a unique file name.
    fn resolve_path(&self, _path: &Path) -> Option<String> {
        None
    }

    /// Opens a file by its unique name.
    ///
    /// # Errors
    ///
    /// If the file is not found, the implementation should return [`Error::file_not_found`].
    fn open_file(&self, name: &str) -> Result<File, Error>;
}

impl<T> FileResolver for Box<T>
where
    T: FileResolver + ?Sized,
{
    fn resolve_path(&self, path: &Path) -> Option<String> {
        (**self).resolve_path(path)
    }

    fn open_file(&self, name: &str) -> Result<File, Error> {
        (**self).open_file(name)
    }
}

/// A protobuf file returned by [`FileResolver::open_file`].
///
/// A file holds either source text, which is parsed when the file is compiled, or a pre-built
/// descriptor.
#[derive(Debug, Clone)]
pub struct File {
    pub(crate) name: String,
    pub(crate) path: Option<PathBuf>,
    pub(crate) source: Option<String>,
    pub(crate) ast: Option<ast::File>,
    pub(crate) descriptor: Option<FileDescriptorProto>,
}

impl File {
    /// Reads a protobuf source file from the filesystem.
    ///
    /// The file is not parsed until it is compiled.
    ///
    /// # Errors
    ///
    /// Returns an error if there is an IO error opening the file, or it is not valid UTF-8.
    ///
    /// If the file does not exist, [`Error::file_not_found()`] is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::fs;
    /// # use protolink::file::File;
    /// # let tempdir = tempfile::TempDir::new().unwrap();
    /// let path = tempdir.path().join("foo.proto");
    /// fs::write(&path, "message Foo { }").unwrap();
    ///
    /// let file = File::open("foo.proto", &path).unwrap();
    /// assert_eq!(file.name(), "foo.proto");
    /// assert_eq!(file.path(), Some(path.as_path()));
    /// assert_eq!(file.source(), Some("message Foo { }"));
    ///
    /// let notfound = tempdir.path().join("notfound.proto");
    /// assert!(File::open("notfound.proto", &notfound).unwrap_err().is_file_not_found());
    /// ```
    pub fn open(name: &str, path: &Path) -> Result<Self, Error> {
        log::trace!("opening file '{}' at '{}'", name, path.display());

        let map_io_err = |err: io::Error| -> Error {
            if err.kind() == io::ErrorKind::NotFound {
                Error::file_not_found(name)
            } else {
                Error::from_kind(ErrorKind::OpenFile {
                    name: name.to_owned(),
                    path: path.to_owned(),
                    err,
                })
            }
        };

        let file = fs::File::open(path).map_err(map_io_err)?;
        let metadata = file.metadata().map_err(map_io_err)?;

        if metadata.len() > MAX_FILE_LEN {
            return Err(Error::from_kind(ErrorKind::FileTooLarge {
                name: name.to_owned(),
            }));
        }

        let mut buf = Vec::with_capacity(metadata.len() as usize);
        file.take(MAX_FILE_LEN)
            .read_to_end(&mut buf)
            .map_err(map_io_err)?;

        let source = String::from_utf8(buf).map_err(|_| {
            Error::from_kind(ErrorKind::FileInvalidUtf8 {
                name: name.to_owned(),
            })
        })?;

        Ok(File {
            name: name.to_owned(),
            path: Some(path.to_owned()),
            source: Some(source),
            ast: None,
            descriptor: None,
        })
    }

    /// Creates a file from protobuf source text.
    ///
    /// # Examples
    ///
    /// ```
    /// # use protolink::file::File;
    /// let file = File::from_source("foo.proto", "message Foo { }");
    /// assert_eq!(file.path(), None);
    /// assert_eq!(file.source(), Some("message Foo { }"));
    /// assert!(!file.is_parsed());
    /// ```
    pub fn from_source(name: &str, source: &str) -> Self {
        File {
            name: name.to_owned(),
            path: None,
            source: Some(source.to_owned()),
            ast: None,
            descriptor: None,
        }
    }

    /// Creates a file from a [`FileDescriptorProto`](prost_types::FileDescriptorProto).
    ///
    /// The descriptor does not need to have type names resolved or options interpreted,
    /// for example it may be the result of [`protolink_parse::parse()`].
    pub fn from_file_descriptor_proto(file: prost_types::FileDescriptorProto) -> Self {
        File {
            name: file.name().to_owned(),
            path: None,
            source: None,
            ast: None,
            descriptor: Some(types::transcode(&file)),
        }
    }

    /// Creates a file by decoding an encoded
    /// [`FileDescriptorProto`](prost_types::FileDescriptorProto).
    ///
    /// Unlike when going through [`from_file_descriptor_proto()`](File::from_file_descriptor_proto),
    /// extension options are preserved.
    pub fn decode_file_descriptor_proto(bytes: &[u8]) -> Result<Self, DecodeError> {
        let file = prost_types::FileDescriptorProto::decode(bytes)?;
        Ok(File {
            name: file.name().to_owned(),
            path: None,
            source: None,
            ast: None,
            descriptor: Some(FileDescriptorProto::decode(bytes)?),
        })
    }

    /// Parses the source of this file, if it has not been parsed yet.
    ///
    /// Every syntax error is passed to `handler`.
    pub fn parse(&mut self, handler: &mut ErrorHandler<'_>) -> Result<(), Error> {
        if self.descriptor.is_some() {
            return Ok(());
        }

        let source = self.source.as_deref().unwrap_or_default();
        let parsed = protolink_parse::parse_file(&self.name, source, handler)?;
        self.descriptor = Some(types::transcode(&parsed.descriptor));
        self.ast = Some(parsed.ast);
        Ok(())
    }

    /// Returns true if this file has been parsed, or was created from a descriptor.
    pub fn is_parsed(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Returns the unique name of this file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the filesystem path, if this file is backed by a physical file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the full content of the source file if available.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns the syntax tree, if this file has been parsed from source.
    pub fn ast(&self) -> Option<&ast::File> {
        self.ast.as_ref()
    }

    /// Returns the names of the files imported by this file.
    ///
    /// This is empty until the file is parsed.
    pub fn dependencies(&self) -> &[String] {
        match &self.descriptor {
            Some(descriptor) => &descriptor.dependency,
            None => &[],
        }
    }

    /// Returns the uninterpreted descriptor of this file, if it has been parsed.
    pub fn file_descriptor_proto(&self) -> Option<prost_types::FileDescriptorProto> {
        self.descriptor.as_ref().map(types::transcode)
    }
}

pub(crate) fn path_to_file_name(path: &Path) -> Option<String> {
    let mut name = String::new();
    for component in path.components() {
        match component {
            path::Component::Normal(component) => {
                if let Some(component) = component.to_str() {
                    if !name.is_empty() {
                        name.push('/');
                    }
                    name.push_str(component);
                } else {
                    return None;
                }
            }
            path::Component::CurDir => continue,
            _ => return None,
        }
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
