use std::{fmt, path::Path};

use super::{File, FileResolver};
use crate::Error;

/// An implementation of [`FileResolver`] which chains together several other resolvers.
///
/// When opening files, each resolver is searched in turn until the file is found. A resolver
/// which fails with any error other than [`Error::file_not_found()`] stops the search.
///
/// # Examples
///
/// ```
/// # use std::path::PathBuf;
/// # use protolink::file::{ChainFileResolver, FileResolver, GoogleFileResolver, IncludeFileResolver};
/// let mut resolver = ChainFileResolver::new();
/// resolver.add(IncludeFileResolver::new(PathBuf::from("/does/not/exist")));
/// resolver.add(GoogleFileResolver::new());
///
/// let file = resolver.open_file("google/protobuf/any.proto").unwrap();
/// assert_eq!(file.name(), "google/protobuf/any.proto");
/// assert!(resolver.open_file("notfound.proto").unwrap_err().is_file_not_found());
/// ```
#[derive(Default)]
pub struct ChainFileResolver {
    resolvers: Vec<Box<dyn FileResolver>>,
}

impl ChainFileResolver {
    /// Create a new, empty [`ChainFileResolver`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a new resolver.
    ///
    /// The new resolver will be searched after all previously-added resolvers.
    pub fn add<F>(&mut self, resolver: F)
    where
        F: FileResolver + 'static,
    {
        self.resolvers.push(Box::new(resolver))
    }
}

impl FileResolver for ChainFileResolver {
    fn resolve_path(&self, path: &Path) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve_path(path))
    }

    fn open_file(&self, name: &str) -> Result<File, Error> {
        for resolver in &self.resolvers {
            match resolver.open_file(name) {
                Ok(file) => return Ok(file),
                Err(err) if err.is_file_not_found() => continue,
                Err(err) => return Err(err),
            }
        }

        Err(Error::file_not_found(name))
    }
}

impl fmt::Debug for ChainFileResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainFileResolver")
            .field("len", &self.resolvers.len())
            .finish_non_exhaustive()
    }
}
