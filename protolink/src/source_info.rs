//! Lookup of source locations by descriptor path.

use std::collections::{hash_map, HashMap};

use prost_types::{source_code_info::Location, SourceCodeInfo};

use crate::{error::ErrorKind, Error};

/// An injective encoding of a source code info path, suitable for use as a map key.
///
/// Each path element is zig-zag encoded as a varint, so negative elements round-trip as well.
///
/// # Examples
///
/// ```
/// # use protolink::source_info::PathKey;
/// let key = PathKey::new(&[4, 0, 2, 1]);
/// assert_eq!(key.decode(), vec![4, 0, 2, 1]);
/// assert_ne!(PathKey::new(&[4, 0]), PathKey::new(&[4]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PathKey(Vec<u8>);

impl PathKey {
    /// Encodes a path.
    pub fn new(path: &[i32]) -> Self {
        let mut buf = Vec::with_capacity(path.len());
        for &element in path {
            let zigzag = ((element << 1) ^ (element >> 31)) as u32;
            prost::encoding::encode_varint(u64::from(zigzag), &mut buf);
        }
        PathKey(buf)
    }

    /// Decodes the path this key was created from.
    pub fn decode(&self) -> Vec<i32> {
        let mut path = Vec::new();
        let mut value: u32 = 0;
        let mut shift = 0;
        for &byte in &self.0 {
            value |= u32::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                path.push(((value >> 1) as i32) ^ -((value & 1) as i32));
                value = 0;
                shift = 0;
            } else {
                shift += 7;
            }
        }
        path
    }

    /// The encoded bytes of this key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The locations of a file's source code info, indexed by path.
///
/// When several locations share a path, the first one is kept.
#[derive(Debug, Clone, Default)]
pub struct SourceInfoMap {
    locations: HashMap<PathKey, Location>,
}

impl SourceInfoMap {
    /// Indexes the locations of the given source code info.
    pub fn new(info: &SourceCodeInfo) -> Self {
        let mut locations = HashMap::with_capacity(info.location.len());
        for location in &info.location {
            locations
                .entry(PathKey::new(&location.path))
                .or_insert_with(|| location.clone());
        }
        SourceInfoMap { locations }
    }

    /// Gets the location for the given path.
    pub fn get(&self, path: &[i32]) -> Option<&Location> {
        self.locations.get(&PathKey::new(path))
    }

    /// Gets the span of the location for the given path.
    pub fn span(&self, path: &[i32]) -> Option<&[i32]> {
        self.get(path).map(|location| location.span.as_slice())
    }

    /// The number of distinct paths with a location.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns true if there are no locations.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Iterates over every indexed location, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathKey, &Location)> {
        self.locations.iter()
    }
}

/// A caller-owned record of the source code info of files, keyed by file name.
///
/// The first registration of a file is authoritative. Registering the same info again has no
/// effect, while registering different info for a known file fails.
#[derive(Debug, Default)]
pub struct SourceInfoRegistry {
    files: HashMap<String, SourceCodeInfo>,
}

impl SourceInfoRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers the source info of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if different source info was already registered for this file.
    pub fn register(&mut self, name: &str, info: SourceCodeInfo) -> Result<(), Error> {
        match self.files.entry(name.to_owned()) {
            hash_map::Entry::Vacant(entry) => {
                log::trace!("registered source info for '{}'", name);
                entry.insert(info);
                Ok(())
            }
            hash_map::Entry::Occupied(entry) if *entry.get() == info => Ok(()),
            hash_map::Entry::Occupied(_) => Err(Error::from_kind(ErrorKind::RegistryConflict {
                name: name.to_owned(),
            })),
        }
    }

    /// Gets the registered source info of a file.
    pub fn get(&self, name: &str) -> Option<&SourceCodeInfo> {
        self.files.get(name)
    }

    /// Builds a path index over the registered source info of a file.
    pub fn source_info_map(&self, name: &str) -> Option<SourceInfoMap> {
        self.get(name).map(SourceInfoMap::new)
    }

    /// The number of registered files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if no files are registered.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Rewrites the suffix after `prefix` of every matching location path, dropping the locations for
/// which `rename` returns `None`.
pub(crate) fn rename_locations(
    info: &mut SourceCodeInfo,
    prefix: &[i32],
    mut rename: impl FnMut(&[i32]) -> Option<Vec<i32>>,
) {
    info.location.retain_mut(|location| {
        if location.path.len() <= prefix.len() || !location.path.starts_with(prefix) {
            return true;
        }

        match rename(&location.path[prefix.len()..]) {
            Some(suffix) => {
                location.path.truncate(prefix.len());
                location.path.extend(suffix);
                true
            }
            None => false,
        }
    });
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn location(path: Vec<i32>, span: Vec<i32>) -> Location {
        Location {
            path,
            span,
            ..Default::default()
        }
    }

    proptest! {
        #[test]
        fn path_key_roundtrip(path in proptest::collection::vec(any::<i32>(), 0..8)) {
            prop_assert_eq!(PathKey::new(&path).decode(), path);
        }

        #[test]
        fn path_key_injective(
            a in proptest::collection::vec(any::<i32>(), 0..4),
            b in proptest::collection::vec(any::<i32>(), 0..4),
        ) {
            prop_assert_eq!(PathKey::new(&a) == PathKey::new(&b), a == b);
        }
    }

    #[test]
    fn map_keeps_first_location() {
        let map = SourceInfoMap::new(&SourceCodeInfo {
            location: vec![
                location(vec![], vec![0, 0, 10]),
                location(vec![4, 0], vec![1, 0, 5]),
                location(vec![4, 0], vec![2, 0, 5]),
            ],
        });

        assert_eq!(map.len(), 2);
        assert_eq!(map.span(&[4, 0]), Some([1, 0, 5].as_slice()));
        assert_eq!(map.span(&[4, 1]), None);
    }

    #[test]
    fn registry_first_registration_wins() {
        let info = SourceCodeInfo {
            location: vec![location(vec![], vec![0, 0, 1])],
        };
        let other = SourceCodeInfo {
            location: vec![location(vec![], vec![0, 0, 2])],
        };

        let mut registry = SourceInfoRegistry::new();
        registry.register("a.proto", info.clone()).unwrap();
        registry.register("a.proto", info.clone()).unwrap();

        let err = registry.register("a.proto", other).unwrap_err();
        assert_eq!(
            err.to_string(),
            "conflicting source info registered for file 'a.proto'"
        );
        assert_eq!(registry.get("a.proto"), Some(&info));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rename_locations_under_prefix() {
        let mut info = SourceCodeInfo {
            location: vec![
                location(vec![4, 0, 7], vec![0, 0, 1]),
                location(vec![4, 0, 7, 999, 0], vec![1, 0, 1]),
                location(vec![4, 0, 7, 999, 1], vec![2, 0, 1]),
                location(vec![4, 1, 7, 999, 0], vec![3, 0, 1]),
            ],
        };

        rename_locations(&mut info, &[4, 0, 7], |suffix| match suffix {
            [999, 0] => Some(vec![50000]),
            _ => None,
        });

        let paths: Vec<_> = info.location.iter().map(|l| l.path.clone()).collect();
        assert_eq!(
            paths,
            vec![vec![4, 0, 7], vec![4, 0, 7, 50000], vec![4, 1, 7, 999, 0]]
        );
    }
}
