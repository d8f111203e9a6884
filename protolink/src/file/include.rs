use std::path::{self, Path, PathBuf};

use crate::{error::ErrorKind, Error};

use super::{path_to_file_name, File, FileResolver};

/// An implementation of [`FileResolver`] which searches an include path on the file system.
#[derive(Debug)]
pub struct IncludeFileResolver {
    include: PathBuf,
}

impl IncludeFileResolver {
    /// Constructs a `IncludeFileResolver` that searches the given include path.
    pub fn new(include: PathBuf) -> Self {
        IncludeFileResolver { include }
    }

    /// The directory searched by this resolver.
    pub fn include(&self) -> &Path {
        &self.include
    }
}

impl FileResolver for IncludeFileResolver {
    /// Converts a file system path to a unique file name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::path::{Path, PathBuf};
    /// # use protolink::file::{IncludeFileResolver, FileResolver};
    /// let resolver = IncludeFileResolver::new(PathBuf::from("/path/to/include"));
    /// assert_eq!(resolver.resolve_path(Path::new("/path/to/include/dir/foo.proto")), Some("dir/foo.proto".to_owned()));
    /// assert_eq!(resolver.resolve_path(Path::new("notincluded.proto")), None);
    /// ```
    fn resolve_path(&self, path: &Path) -> Option<String> {
        strip_prefix(path, &self.include).and_then(path_to_file_name)
    }

    /// Opens a file by its unique name.
    ///
    /// # Errors
    ///
    /// If no file exists at the name joined to the include path, [`Error::file_not_found()`] is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::fs;
    /// # use protolink::file::{IncludeFileResolver, FileResolver};
    /// # let tempdir = tempfile::TempDir::new().unwrap();
    /// fs::write(tempdir.path().join("foo.proto"), "message Foo {}").unwrap();
    ///
    /// let resolver = IncludeFileResolver::new(tempdir.path().to_owned());
    /// let file = resolver.open_file("foo.proto").unwrap();
    /// assert_eq!(file.path(), Some(tempdir.path().join("foo.proto").as_path()));
    /// assert_eq!(file.source(), Some("message Foo {}"));
    /// ```
    fn open_file(&self, name: &str) -> Result<File, Error> {
        let path = self.include.join(name);
        File::open(name, &path)
    }
}

/// Checks that the file found for `name` is the one at `expected_path`.
///
/// `actual_path` is expected to be an include path joined with `expected_path`, otherwise an
/// earlier include path contains a different file with the same name.
pub(crate) fn check_shadow(
    name: &str,
    actual_path: Option<&Path>,
    expected_path: &Path,
) -> Result<(), Error> {
    if let Some(actual_path) = actual_path {
        if !ends_with(actual_path, expected_path) {
            return Err(Error::from_kind(ErrorKind::FileShadowed {
                name: name.to_owned(),
                path: expected_path.to_owned(),
                shadow: actual_path.to_owned(),
            }));
        }
    }

    Ok(())
}

fn strip_prefix<'a>(path: &'a Path, prefix: &Path) -> Option<&'a Path> {
    Some(iter_after(path.components(), prefix.components())?.as_path())
}

fn ends_with(path: &Path, suffix: &Path) -> bool {
    iter_after(path.components().rev(), suffix.components().rev()).is_some()
}

/// Comparison of paths which ignores '.' components and is case-insensitive on windows.
fn iter_after<'a, 'b, I, J>(mut iter: I, mut prefix: J) -> Option<I>
where
    I: Iterator<Item = path::Component<'a>> + Clone,
    J: Iterator<Item = path::Component<'b>> + Clone,
{
    loop {
        let mut path_next = iter.clone();
        let mut prefix_next = prefix.clone();

        match (path_next.next(), prefix_next.next()) {
            (Some(path::Component::CurDir), _) => {
                iter = path_next;
            }
            (_, Some(path::Component::CurDir)) => {
                prefix = prefix_next;
            }
            (Some(ref l), Some(ref r)) if path_component_eq(l, r) => {
                iter = path_next;
                prefix = prefix_next;
            }
            (Some(_), Some(_)) | (None, Some(_)) => return None,
            (Some(_), None) | (None, None) => return Some(iter),
        }
    }
}

#[cfg(windows)]
fn path_component_eq(l: &path::Component, r: &path::Component) -> bool {
    l.as_os_str().eq_ignore_ascii_case(r.as_os_str())
}

#[cfg(not(windows))]
fn path_component_eq(l: &path::Component, r: &path::Component) -> bool {
    l == r
}
