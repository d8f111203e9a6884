//! Linking and option interpretation for protobuf source files.
//!
//! For convenient compilation of protobuf source files in a single function, see
//! [`compile()`]. For more options see [`Compiler`]. Individual files can also be linked by
//! hand with [`link::link()`].
//!
//! # Examples
//!
//! ```
//! # use std::fs;
//! # let tempdir = tempfile::TempDir::new().unwrap();
//! fs::write(tempdir.path().join("root.proto"), "
//!     syntax = 'proto3';
//!     package greet;
//!
//!     message Hello { string name = 1; }
//! ").unwrap();
//!
//! let file_descriptors = protolink::compile(["root.proto"], [tempdir.path()]).unwrap();
//! assert_eq!(file_descriptors.file[0].message_type[0].name(), "Hello");
//! ```
//!
//! ### Error messages
//!
//! This crate uses [`miette`](https://crates.io/crates/miette) to add additional details to errors. For nice error messages, add `miette` as a dependency with the `fancy` feature enabled and return a [`miette::Result`](https://docs.rs/miette/latest/miette/type.Result.html) from your build script.
//!
//! Example error message:
//!
//! ```text
//! Error:
//!   × name 'Bar' is not defined
//!    ╭─[root.proto:3:1]
//!  3 │ message Foo {
//!  4 │     Bar bar = 1;
//!    ·     ─┬─
//!    ·      ╰── found here
//!  5 │ }
//!    ╰────
//! ```
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/protolink/0.1.0/")]

pub mod file;
pub mod link;
pub mod source_info;

mod cancel;
mod compile;
mod error;
mod interpret;
mod options;
mod types;

use std::path::Path;

pub use {prost, prost_reflect, protolink_parse};

pub use self::cancel::CancellationToken;
pub use self::compile::Compiler;
pub use self::error::Error;
pub use self::interpret::OptionPaths;

/// The largest source file that will be read, in bytes.
const MAX_FILE_LEN: u64 = i32::MAX as u64;

/// Compiles a set of protobuf files using the given include paths.
///
/// For more control over how files are compiled, see [`Compiler`]. This function is equivalent to:
///
/// ```rust
/// # use protolink::Compiler;
/// # fn main() -> Result<(), protolink::Error> {
/// # let files: Vec<std::path::PathBuf> = vec![];
/// # let includes: Vec<std::path::PathBuf> = vec![".".into()];
/// let file_descriptor_set = Compiler::new(includes)?
///     .include_source_info(true)
///     .include_imports(true)
///     .open_files(files)?
///     .file_descriptor_set();
/// # Ok(())
/// # }
/// ```
///
/// # Examples
///
/// ```
/// # use std::fs;
/// # let tempdir = tempfile::TempDir::new().unwrap();
/// fs::write(tempdir.path().join("bar.proto"), "message Bar { }").unwrap();
/// fs::write(tempdir.path().join("root.proto"), "
///     import 'bar.proto';
///
///     message Foo {
///         optional Bar bar = 1;
///     }
/// ").unwrap();
///
/// let file_descriptors = protolink::compile(["root.proto"], [tempdir.path()]).unwrap();
/// let names: Vec<&str> = file_descriptors.file.iter().map(|file| file.name()).collect();
/// assert_eq!(names, ["bar.proto", "root.proto"]);
///
/// let field = &file_descriptors.file[1].message_type[0].field[0];
/// assert_eq!(field.type_name(), ".Bar");
/// assert_eq!(field.json_name(), "bar");
/// ```
pub fn compile(
    files: impl IntoIterator<Item = impl AsRef<Path>>,
    includes: impl IntoIterator<Item = impl AsRef<Path>>,
) -> Result<prost_types::FileDescriptorSet, Error> {
    Ok(Compiler::new(includes)?
        .include_source_info(true)
        .include_imports(true)
        .open_files(files)?
        .file_descriptor_set())
}
