use std::{
    collections::HashMap,
    fmt::{self, Write},
    path::Path,
};

use prost::Message;
use protolink_parse::{ast, tag, ErrorHandler, PositionedError, Reporter, DEFAULT_ERROR_LIMIT};

use crate::{
    error::{Error, ErrorKind},
    file::{check_shadow, path_to_file_name, File, FileResolver, ImportRemapper},
    link::{link_with_options, LinkOptions, LinkedFile},
    source_info::SourceInfoRegistry,
    types::{self, FileDescriptorProto},
    CancellationToken, OptionPaths,
};

#[cfg(test)]
mod tests;

/// Options for compiling protobuf files.
///
/// Files are compiled dependency-first. Each file is parsed, its imports are compiled
/// recursively, and then it is linked against them. A file imported by several others is
/// compiled once.
pub struct Compiler {
    resolver: Box<dyn FileResolver>,
    files: HashMap<String, CompiledFile>,
    /// File names in the order they finished compiling, so imports come before their importers.
    order: Vec<String>,
    include_imports: bool,
    include_source_info: bool,
    lenient_options: bool,
    parse_only: bool,
    error_limit: usize,
    reporter: Option<Box<dyn Reporter + Send>>,
    cancellation_token: Option<CancellationToken>,
    remapper: ImportRemapper,
}

#[derive(Debug)]
struct CompiledFile {
    state: FileState,
    is_root: bool,
}

#[derive(Debug)]
enum FileState {
    /// A file parsed in parse-only mode.
    Parsed(File),
    Linked(LinkedFile),
}

impl Compiler {
    /// Create a new [`Compiler`] with default options and the given set of include paths.
    ///
    /// In addition to the given include paths, the [`Compiler`] instance will be able to import
    /// standard files like `google/protobuf/descriptor.proto`.
    pub fn new<I, P>(includes: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        use crate::file::{ChainFileResolver, GoogleFileResolver, IncludeFileResolver};

        let mut resolver = ChainFileResolver::new();

        for include in includes {
            resolver.add(IncludeFileResolver::new(include.as_ref().to_owned()));
        }

        resolver.add(GoogleFileResolver::new());

        Ok(Compiler::with_file_resolver(resolver))
    }

    /// Create a new [`Compiler`] with a custom [`FileResolver`] for looking up imported files.
    pub fn with_file_resolver<R>(resolver: R) -> Self
    where
        R: FileResolver + 'static,
    {
        Compiler {
            resolver: Box::new(resolver),
            files: HashMap::new(),
            order: Vec::new(),
            include_imports: false,
            include_source_info: false,
            lenient_options: false,
            parse_only: false,
            error_limit: DEFAULT_ERROR_LIMIT,
            reporter: None,
            cancellation_token: None,
            remapper: ImportRemapper::new(),
        }
    }

    /// Set whether the output `FileDescriptorSet` should include source info.
    ///
    /// If set, the file descriptors returned by [`file_descriptor_set`](Compiler::file_descriptor_set) will have
    /// the [`FileDescriptorProto::source_code_info`](prost_types::FileDescriptorProto::source_code_info) field
    /// populated with source locations and comments.
    pub fn include_source_info(&mut self, yes: bool) -> &mut Self {
        self.include_source_info = yes;
        self
    }

    /// Set whether the output `FileDescriptorSet` should include imported files.
    ///
    /// By default, only files explicitly added with [`open_file`](Compiler::open_file) are returned by [`file_descriptor_set`](Compiler::file_descriptor_set).
    /// If this option is set, imported files are included too.
    pub fn include_imports(&mut self, yes: bool) -> &mut Self {
        self.include_imports = yes;
        self
    }

    /// Set whether options which fail to interpret are kept as uninterpreted options instead of
    /// failing compilation.
    pub fn lenient_options(&mut self, yes: bool) -> &mut Self {
        self.lenient_options = yes;
        self
    }

    /// Set whether files are only parsed.
    ///
    /// In parse-only mode, files and their imports are parsed but not linked, so type names
    /// are left as written and options stay uninterpreted.
    pub fn parse_only(&mut self, yes: bool) -> &mut Self {
        self.parse_only = yes;
        self
    }

    /// Set the maximum number of errors reported for a single call to
    /// [`open_file`](Compiler::open_file) before compilation stops.
    pub fn error_limit(&mut self, limit: usize) -> &mut Self {
        self.error_limit = limit;
        self
    }

    /// Set a reporter to receive every error as it is found.
    ///
    /// If the reporter returns an error, compilation stops and the error is returned as the
    /// source of [`Error::aborted()`].
    pub fn reporter<R>(&mut self, reporter: R) -> &mut Self
    where
        R: Reporter + Send + 'static,
    {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Set a token which can be used to stop compilation from another thread.
    pub fn cancellation_token(&mut self, token: CancellationToken) -> &mut Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Set the rules used to rewrite import paths before they are opened.
    pub fn import_remapper(&mut self, remapper: ImportRemapper) -> &mut Self {
        self.remapper = remapper;
        self
    }

    /// Compile the file at the given path, and add it to this `Compiler` instance.
    ///
    /// If the path is absolute, or relative to the current directory, it must reside under one of the
    /// include paths. Otherwise, it is looked up relative to the given include paths in the same way as
    /// `import` statements.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self, Error> {
        let path = path.as_ref();
        let (name, is_resolved) = if let Some(name) = self.resolver.resolve_path(path) {
            (name, true)
        } else if let Some(name) = path_to_file_name(path) {
            (name, false)
        } else {
            return Err(Error::from_kind(ErrorKind::FileNotIncluded {
                path: path.to_owned(),
            }));
        };

        if let Some(compiled) = self.files.get_mut(&name) {
            if is_resolved {
                check_shadow(&name, compiled.path(), path)?;
            }
            log::debug!("file '{}' is already compiled", name);
            compiled.is_root = true;
            return Ok(self);
        }

        let file = self.resolver.open_file(&name).map_err(|err| {
            if err.is_file_not_found() {
                Error::from_kind(ErrorKind::FileNotIncluded {
                    path: path.to_owned(),
                })
            } else {
                err
            }
        })?;
        if is_resolved {
            check_shadow(&name, file.path(), path)?;
        }

        self.with_handler(|compiler, handler| {
            compiler.compile_file(file, handler, &mut Vec::new())
        })?;
        if let Some(compiled) = self.files.get_mut(&name) {
            compiled.is_root = true;
        }
        Ok(self)
    }

    /// Compile multiple files at the given paths.
    ///
    /// See [`open_file`](Compiler::open_file).
    pub fn open_files(
        &mut self,
        paths: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<&mut Self, Error> {
        for path in paths {
            self.open_file(path)?;
        }
        Ok(self)
    }

    /// Compile a file which is not backed by a [`FileResolver`], such as one built in memory.
    ///
    /// Its imports are still opened through the resolver.
    pub fn add_file(&mut self, file: File) -> Result<&mut Self, Error> {
        let name = file.name().to_owned();
        if let Some(compiled) = self.files.get_mut(&name) {
            log::debug!("file '{}' is already compiled", name);
            compiled.is_root = true;
            return Ok(self);
        }

        self.with_handler(|compiler, handler| {
            compiler.compile_file(file, handler, &mut Vec::new())
        })?;
        if let Some(compiled) = self.files.get_mut(&name) {
            compiled.is_root = true;
        }
        Ok(self)
    }

    /// Returns the linked files, with imports ordered before the files that import them.
    ///
    /// This is empty in parse-only mode.
    pub fn files(&self) -> impl ExactSizeIterator<Item = &LinkedFile> {
        let files: Vec<&LinkedFile> = self
            .order
            .iter()
            .filter_map(|name| match &self.files[name].state {
                FileState::Linked(file) => Some(file),
                FileState::Parsed(_) => None,
            })
            .collect();
        files.into_iter()
    }

    /// Returns the syntax tree of a compiled file, if it was parsed from source.
    pub fn ast(&self, name: &str) -> Option<&ast::File> {
        match &self.files.get(name)?.state {
            FileState::Parsed(file) => file.ast(),
            FileState::Linked(file) => file.ast(),
        }
    }

    /// Returns the resolved path of every interpreted option of a compiled file.
    ///
    /// Returns `None` if the file has not been compiled, or in parse-only mode.
    pub fn option_paths(&self, name: &str) -> Option<&OptionPaths> {
        match &self.files.get(name)?.state {
            FileState::Parsed(_) => None,
            FileState::Linked(file) => Some(file.option_paths()),
        }
    }

    /// Convert all added files into an instance of [`FileDescriptorSet`](prost_types::FileDescriptorSet).
    ///
    /// Files are sorted topologically, with dependency files ordered before the files that import them.
    ///
    /// Custom options are not represented in [`prost_types`], so they are dropped. Use
    /// [`encode_file_descriptor_set`](Compiler::encode_file_descriptor_set) to keep them.
    pub fn file_descriptor_set(&self) -> prost_types::FileDescriptorSet {
        let file = self
            .output_descriptors()
            .map(|file| types::transcode(&file))
            .collect();

        prost_types::FileDescriptorSet { file }
    }

    /// Convert all added files into an instance of [`FileDescriptorSet`](prost_types::FileDescriptorSet) and encodes it.
    ///
    /// This is equivalent to `file_descriptor_set().encode_to_vec()`, with the exception that extension
    /// options are included.
    pub fn encode_file_descriptor_set(&self) -> Vec<u8> {
        types::FileDescriptorSet {
            file: self.output_descriptors().collect(),
        }
        .encode_to_vec()
    }

    /// Records the source info of every compiled file in `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry already holds different source info for one of the files.
    pub fn register_source_info(&self, registry: &mut SourceInfoRegistry) -> Result<(), Error> {
        for name in &self.order {
            let info = self.files[name]
                .descriptor()
                .and_then(|descriptor| descriptor.source_code_info.clone());
            if let Some(info) = info {
                registry.register(name, info)?;
            }
        }
        Ok(())
    }

    fn output_descriptors(&self) -> impl Iterator<Item = FileDescriptorProto> + '_ {
        self.order
            .iter()
            .map(|name| &self.files[name])
            .filter(|compiled| self.include_imports || compiled.is_root)
            .filter_map(|compiled| {
                let mut descriptor = compiled.descriptor()?.clone();
                if !self.include_source_info {
                    descriptor.source_code_info = None;
                }
                Some(descriptor)
            })
    }

    /// Runs `f` with an error handler which forwards to the configured reporter.
    fn with_handler<T>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut ErrorHandler<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut reporter = self.reporter.take();
        let result = {
            let mut handler = match &mut reporter {
                Some(reporter) => {
                    ErrorHandler::new(|err: &PositionedError| reporter.report(err))
                }
                None => ErrorHandler::default(),
            };
            handler.set_limit(self.error_limit);
            f(self, &mut handler)
        };
        self.reporter = reporter;
        result
    }

    fn compile_file(
        &mut self,
        mut file: File,
        handler: &mut ErrorHandler<'_>,
        import_stack: &mut Vec<String>,
    ) -> Result<(), Error> {
        self.check_cancelled()?;

        let name = file.name().to_owned();
        log::debug!("compiling file '{}'", name);

        file.parse(handler)?;
        self.remap_imports(&mut file);

        import_stack.push(name.clone());
        let (dependencies, weak) = match &file.descriptor {
            Some(descriptor) => (
                descriptor.dependency.clone(),
                descriptor.weak_dependency.clone(),
            ),
            None => Default::default(),
        };
        for (index, import) in dependencies.iter().enumerate() {
            match self.add_import(import, handler, import_stack) {
                Ok(()) => (),
                Err(err)
                    if matches!(err.kind(), ErrorKind::FileNotFound { .. })
                        && weak.contains(&(index as i32)) =>
                {
                    log::debug!("weak import '{}' of file '{}' not found", import, name);
                }
                Err(err) => {
                    let span = import_span(&file, index);
                    return Err(err.into_import_error(&name, file.source(), span));
                }
            }
        }
        import_stack.pop();

        let state = if self.parse_only {
            FileState::Parsed(file)
        } else {
            let deps: Vec<&LinkedFile> = dependencies
                .iter()
                .filter_map(|import| match &self.files.get(import)?.state {
                    FileState::Linked(file) => Some(file),
                    FileState::Parsed(_) => None,
                })
                .collect();
            let options = LinkOptions {
                lenient_options: self.lenient_options,
            };
            FileState::Linked(link_with_options(file, &deps, handler, &options)?)
        };

        self.check_cancelled()?;

        log::debug!("finished compiling file '{}'", name);
        self.files.insert(
            name.clone(),
            CompiledFile {
                state,
                is_root: false,
            },
        );
        self.order.push(name);
        Ok(())
    }

    fn add_import(
        &mut self,
        file_name: &str,
        handler: &mut ErrorHandler<'_>,
        import_stack: &mut Vec<String>,
    ) -> Result<(), Error> {
        if import_stack.iter().any(|name| name == file_name) {
            let mut cycle = String::new();
            for import in import_stack.iter() {
                let _ = write!(&mut cycle, "{} -> ", import);
            }
            cycle.push_str(file_name);

            return Err(Error::from_kind(ErrorKind::CircularImport {
                name: file_name.to_owned(),
                cycle,
            }));
        }

        if self.files.contains_key(file_name) {
            log::trace!("import '{}' is already compiled", file_name);
            return Ok(());
        }

        let file = self.resolver.open_file(file_name)?;
        self.compile_file(file, handler, import_stack)
    }

    fn remap_imports(&self, file: &mut File) {
        if self.remapper.is_empty() {
            return;
        }

        let name = file.name.clone();
        if let Some(descriptor) = &mut file.descriptor {
            for import in &mut descriptor.dependency {
                let remapped = self.remapper.remap(&name, import).into_owned();
                if remapped != *import {
                    log::debug!(
                        "remapped import '{}' of file '{}' to '{}'",
                        import,
                        name,
                        remapped
                    );
                    *import = remapped;
                }
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        match &self.cancellation_token {
            Some(token) if token.is_cancelled() => Err(Error::from_kind(ErrorKind::Cancelled)),
            _ => Ok(()),
        }
    }
}

impl CompiledFile {
    fn path(&self) -> Option<&Path> {
        match &self.state {
            FileState::Parsed(file) => file.path(),
            FileState::Linked(file) => file.path(),
        }
    }

    /// The descriptor of the file. Files are always parsed before they are stored.
    fn descriptor(&self) -> Option<&FileDescriptorProto> {
        match &self.state {
            FileState::Parsed(file) => file.descriptor.as_ref(),
            FileState::Linked(file) => Some(&file.descriptor),
        }
    }
}

/// The span of an import statement, for pointing errors at it.
fn import_span(file: &File, index: usize) -> Option<&[i32]> {
    let info = file.descriptor.as_ref()?.source_code_info.as_ref()?;
    info.location
        .iter()
        .find(|location| location.path == [tag::file::DEPENDENCY, index as i32])
        .map(|location| location.span.as_slice())
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("files", &self.order)
            .field("include_imports", &self.include_imports)
            .field("include_source_info", &self.include_source_info)
            .field("lenient_options", &self.lenient_options)
            .field("parse_only", &self.parse_only)
            .field("error_limit", &self.error_limit)
            .finish_non_exhaustive()
    }
}
