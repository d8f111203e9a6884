//! Linking of parsed files against their imports.
//!
//! Linking builds the table of names visible from a file, resolves every type reference to a
//! fully-qualified name, interprets options and validates the result.

mod error;
mod names;
mod resolve;
#[cfg(test)]
mod tests;
mod validate;

use std::{
    collections::HashSet,
    mem,
    ops::Range,
    path::{Path, PathBuf},
};

use miette::{SourceOffset, SourceSpan};
use prost::Message;
use protolink_parse::{ast, tag, ErrorHandler};

pub(crate) use self::error::LinkError;
pub(crate) use self::names::{
    create_prefix_list, join_name, Definition, DefinitionKind, FieldDefinition, NameMap,
    GOOGLE_DESCRIPTOR_NAMES,
};

use crate::{
    error::CheckError,
    file::File,
    interpret::{self, OptionPaths},
    source_info::{rename_locations, SourceInfoMap},
    types::{self, FileDescriptorProto},
    Error,
};

/// Settings for [`link_with_options()`].
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Keep options which fail to interpret as uninterpreted options, instead of reporting an
    /// error.
    pub lenient_options: bool,
}

/// A file whose names are resolved and whose options are interpreted.
#[derive(Debug, Clone)]
pub struct LinkedFile {
    name: String,
    path: Option<PathBuf>,
    source: Option<String>,
    ast: Option<ast::File>,
    pub(crate) descriptor: FileDescriptorProto,
    /// Definitions visible to files importing this one.
    pub(crate) exports: NameMap,
    /// Definitions of this file and everything it transitively imports.
    pub(crate) reachable: NameMap,
    option_paths: OptionPaths,
}

/// Links a file against its already-linked direct dependencies, interpreting options strictly.
///
/// If the file has not been parsed yet, it is parsed first. Every recoverable error is passed to
/// `handler`.
///
/// # Errors
///
/// Returns [`Error::file_not_found()`](crate::Error::file_not_found) pointing at the import
/// statement if a non-weak import is missing from `deps`, and an invalid input error if any
/// error was reported.
///
/// # Examples
///
/// ```
/// # use protolink::{file::File, link::link};
/// let dep = link(File::from_source("dep.proto", "package dep; message Bar {}"), &[], &mut Default::default()).unwrap();
/// let root = link(
///     File::from_source("root.proto", "import 'dep.proto'; message Foo { optional dep.Bar bar = 1; }"),
///     &[&dep],
///     &mut Default::default(),
/// ).unwrap();
///
/// let descriptor = root.file_descriptor_proto();
/// assert_eq!(descriptor.message_type[0].field[0].type_name(), ".dep.Bar");
/// ```
pub fn link(
    file: File,
    deps: &[&LinkedFile],
    handler: &mut ErrorHandler<'_>,
) -> Result<LinkedFile, Error> {
    link_with_options(file, deps, handler, &LinkOptions::default())
}

/// Links a file against its already-linked direct dependencies.
pub fn link_with_options(
    mut file: File,
    deps: &[&LinkedFile],
    handler: &mut ErrorHandler<'_>,
    options: &LinkOptions,
) -> Result<LinkedFile, Error> {
    file.parse(handler)?;

    let File {
        name,
        path,
        source,
        ast,
        descriptor,
    } = file;
    let mut descriptor = descriptor.unwrap_or_default();
    if descriptor.name.is_none() {
        descriptor.name = Some(name.clone());
    }

    log::debug!("linking file '{}'", name);

    let source_info = descriptor
        .source_code_info
        .as_ref()
        .map(SourceInfoMap::new)
        .unwrap_or_default();
    let imports = match_imports(&name, source.as_deref(), &source_info, &mut descriptor, deps)?;
    // Dropping weak imports may renumber locations.
    let source_info = descriptor
        .source_code_info
        .as_ref()
        .map(SourceInfoMap::new)
        .unwrap_or(source_info);

    let mut diagnostics = Diagnostics::new(&name, source.as_deref(), source_info, handler);

    let (own_names, duplicates) = NameMap::from_file(&descriptor, &name);
    for duplicate in duplicates {
        diagnostics.report(LinkError::DuplicateNameInFile {
            first_kind: duplicate.first.kind.describe(),
            second_kind: duplicate.second.kind.describe(),
            first: diagnostics.definition_span(&duplicate.first.path),
            second: diagnostics.definition_span(&duplicate.second.path),
            name: duplicate.name,
        })?;
    }

    let mut visible = own_names.clone();
    let mut reported = HashSet::new();
    for import in &imports {
        for duplicate in visible.merge(&import.file.exports) {
            let err = if duplicate.first.file == name {
                LinkError::DuplicateNameInFileAndImport {
                    first_kind: duplicate.second.kind.describe(),
                    first_file: duplicate.second.file,
                    second_kind: duplicate.first.kind.describe(),
                    span: diagnostics.definition_span(&duplicate.first.path),
                    name: duplicate.name.clone(),
                }
            } else {
                LinkError::DuplicateNameInImports {
                    first_kind: duplicate.first.kind.describe(),
                    first_file: duplicate.first.file,
                    second_kind: duplicate.second.kind.describe(),
                    second_file: duplicate.second.file,
                    span: diagnostics.span(&[tag::file::DEPENDENCY, import.index]),
                    name: duplicate.name.clone(),
                }
            };
            reported.insert(duplicate.name.clone());
            diagnostics.report(err)?;
        }
    }
    // Names of indirect dependencies are not visible, but still may not be redefined.
    for import in &imports {
        for (dep_name, def) in import.file.reachable.iter() {
            if reported.contains(dep_name) {
                continue;
            }
            let Some(own) = own_names.get(dep_name) else {
                continue;
            };
            if own.file == def.file
                || (own.kind == DefinitionKind::Package && def.kind == DefinitionKind::Package)
            {
                continue;
            }
            reported.insert(dep_name.to_owned());
            diagnostics.report(LinkError::DuplicateNameInFileAndImport {
                name: dep_name.to_owned(),
                first_kind: def.kind.describe(),
                first_file: def.file.clone(),
                second_kind: own.kind.describe(),
                span: diagnostics.definition_span(&own.path),
            })?;
        }
    }

    resolve::resolve_file(&mut descriptor, &visible, &mut diagnostics)?;

    // Rebuild the names so that fields carry their resolved types.
    let (own_names, _) = NameMap::from_file(&descriptor, &name);
    let mut visible = own_names.clone();
    let mut exports = own_names.clone();
    let mut reachable = own_names;
    for import in &imports {
        visible.extend(&import.file.exports);
        reachable.extend(&import.file.reachable);
        if import.public {
            exports.extend(&import.file.exports);
        }
    }

    let option_paths = interpret::interpret_file(
        &mut descriptor,
        &visible,
        &reachable,
        &mut diagnostics,
        options.lenient_options,
    )?;

    validate::validate_file(&descriptor, &reachable, &mut diagnostics)?;

    diagnostics.finish()?;
    log::debug!(
        "linked file '{}' with {} interpreted options",
        name,
        option_paths.len()
    );

    Ok(LinkedFile {
        name,
        path,
        source,
        ast,
        descriptor,
        exports,
        reachable,
        option_paths,
    })
}

impl LinkedFile {
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

    /// Returns the syntax tree, if this file was parsed from source.
    pub fn ast(&self) -> Option<&ast::File> {
        self.ast.as_ref()
    }

    /// Returns the resolved path of every interpreted option, keyed by the span of its source.
    pub fn option_paths(&self) -> &OptionPaths {
        &self.option_paths
    }

    /// Returns the linked descriptor.
    ///
    /// Custom options are not represented in [`prost_types`], so they are dropped. Use
    /// [`encode()`](LinkedFile::encode) to keep them.
    pub fn file_descriptor_proto(&self) -> prost_types::FileDescriptorProto {
        types::transcode(&self.descriptor)
    }

    /// Encodes the linked descriptor, including custom options.
    pub fn encode(&self) -> Vec<u8> {
        self.descriptor.encode_to_vec()
    }
}

struct Import<'a> {
    file: &'a LinkedFile,
    index: i32,
    public: bool,
}

/// Pairs each import with its linked file. Missing weak imports are removed from the descriptor.
fn match_imports<'a>(
    name: &str,
    source: Option<&str>,
    source_info: &SourceInfoMap,
    descriptor: &mut FileDescriptorProto,
    deps: &[&'a LinkedFile],
) -> Result<Vec<Import<'a>>, Error> {
    let mut imports = Vec::with_capacity(descriptor.dependency.len());
    // Maps each original import index to its index after weak imports are dropped.
    let mut renumbered = Vec::with_capacity(descriptor.dependency.len());

    for (index, dependency) in descriptor.dependency.iter().enumerate() {
        let index = index as i32;
        match deps.iter().copied().find(|dep| dep.name() == dependency) {
            Some(file) => {
                renumbered.push(Some(imports.len() as i32));
                imports.push(Import {
                    file,
                    index,
                    public: descriptor.public_dependency.contains(&index),
                });
            }
            None if descriptor.weak_dependency.contains(&index) => {
                log::debug!(
                    "weak import '{}' of file '{}' not found, ignoring",
                    dependency,
                    name
                );
                renumbered.push(None);
            }
            None => {
                return Err(Error::file_not_found(dependency).into_import_error(
                    name,
                    source,
                    source_info.span(&[tag::file::DEPENDENCY, index]),
                ))
            }
        }
    }

    if renumbered.iter().any(Option::is_none) {
        let renumber = |index: &i32| renumbered.get(*index as usize).copied().flatten();
        let dependency = mem::take(&mut descriptor.dependency);
        descriptor.dependency = dependency
            .into_iter()
            .enumerate()
            .filter(|(index, _)| renumbered[*index].is_some())
            .map(|(_, dependency)| dependency)
            .collect();
        descriptor.public_dependency = descriptor
            .public_dependency
            .iter()
            .filter_map(renumber)
            .collect();
        // Weak import locations are indexed by position in the weak import list.
        let mut kept_weak = 0;
        let renumbered_weak: Vec<Option<i32>> = descriptor
            .weak_dependency
            .iter()
            .map(|index| {
                renumber(index).map(|_| {
                    kept_weak += 1;
                    kept_weak - 1
                })
            })
            .collect();
        descriptor.weak_dependency = descriptor
            .weak_dependency
            .iter()
            .filter_map(renumber)
            .collect();
        if let Some(info) = &mut descriptor.source_code_info {
            let rename = |renumber: &dyn Fn(&i32) -> Option<i32>, suffix: &[i32]| match suffix {
                [index, rest @ ..] => renumber(index).map(|index| {
                    let mut path = vec![index];
                    path.extend_from_slice(rest);
                    path
                }),
                [] => None,
            };
            rename_locations(info, &[tag::file::DEPENDENCY], |suffix| {
                rename(&renumber, suffix)
            });
            rename_locations(info, &[tag::file::WEAK_DEPENDENCY], |suffix| {
                rename(
                    &|index: &i32| renumbered_weak.get(*index as usize).copied().flatten(),
                    suffix,
                )
            });
        }
        for import in &mut imports {
            import.index = renumber(&import.index).unwrap_or(import.index);
        }
    }

    Ok(imports)
}

/// Collects the recoverable errors found while linking a single file, passing each to the
/// error handler as it is found.
pub(crate) struct Diagnostics<'a, 'b> {
    name: &'a str,
    source: Option<&'a str>,
    source_info: SourceInfoMap,
    handler: &'a mut ErrorHandler<'b>,
    errors: Vec<CheckError>,
}

impl<'a, 'b> Diagnostics<'a, 'b> {
    pub fn new(
        name: &'a str,
        source: Option<&'a str>,
        source_info: SourceInfoMap,
        handler: &'a mut ErrorHandler<'b>,
    ) -> Self {
        Diagnostics {
            name,
            source,
            source_info,
            handler,
            errors: Vec::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        self.name
    }

    /// The byte range of the location with the given path.
    pub fn offsets(&self, path: &[i32]) -> Option<Range<usize>> {
        protolink_parse::span_to_offsets(self.source?, self.source_info.span(path)?)
    }

    /// The span of the location with the given path.
    pub fn span(&self, path: &[i32]) -> Option<SourceSpan> {
        let range = self.offsets(path)?;
        Some(SourceSpan::new(
            SourceOffset::from(range.start),
            range.end - range.start,
        ))
    }

    /// The span of the name of a definition, or of the whole definition if the name has no
    /// location.
    pub fn definition_span(&self, path: &[i32]) -> Option<SourceSpan> {
        if path == [tag::file::PACKAGE] {
            return self.span(path);
        }

        let mut name_path = path.to_vec();
        name_path.push(1);
        self.span(&name_path).or_else(|| self.span(path))
    }

    /// Reports an error, stopping if the handler aborts.
    pub fn report(&mut self, err: impl Into<CheckError>) -> Result<(), Error> {
        let err = err.into();
        log::trace!("error in file '{}': {}", self.name, err);
        let positioned = err.to_positioned(self.name, self.source);
        self.errors.push(err);
        self.handler
            .report(positioned)
            .map_err(|abort| Error::from_abort(self.name, abort))
    }

    /// Fails with every reported error, if there were any.
    pub fn finish(self) -> Result<(), Error> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_input(self.name, self.source, self.errors))
        }
    }
}
