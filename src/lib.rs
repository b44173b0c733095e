//! # envelope-loader
//!
//! Loader for nested archives: a single outer archive (a zip-like
//! container) embeds other complete archives as opaque entries, and this
//! library resolves classes, resources and module metadata out of those
//! embedded archives without ever extracting them to a filesystem.
//!
//! ## Features
//!
//! - Zip parsing over positioned reads; nested archives are byte-range
//!   views of their parent (stored) or inflated in memory (deflated)
//! - Composite `envelope:outer!entry!entry` identifiers that round-trip
//!   through parsing and resolve back to bytes
//! - Module descriptor derivation for archives without an explicit
//!   descriptor: name/version from the file name, packages and services
//!   from a content scan, with strict consistency checks
//! - Package-scoped loaders with one-hop delegation and at-most-once
//!   class definition under concurrent callers
//!
//! ## Example
//!
//! ```no_run
//! use envelope_loader::Envelope;
//!
//! fn main() -> anyhow::Result<()> {
//!     let session = Envelope::open("app.jar")?.into_session()?;
//!     let loader = session.main_loader()?;
//!     if let Some(class) = loader.load_class("com.acme.Main")? {
//!         println!("{} ({} bytes)", class.location(), class.bytes().len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod bytes;
pub mod cli;
pub mod envelope;
pub mod error;
pub mod io;
pub mod location;
pub mod manifest;
pub mod module;
pub mod zip;

pub use archive::{Archive, DEFAULT_RELEASE_FEATURE};
pub use envelope::{Envelope, EnvelopeSession};
pub use error::LoaderError;
pub use io::{FileReader, MemoryReader, ReadAt, RegionReader};
pub use location::{LocationResolver, NestedLocation};
pub use manifest::Manifest;
pub use module::{
    LoadedClass, LoaderSession, Module, ModuleDescriptor, ModuleFinder, ModuleLoader,
    PackageOwnership,
};
pub use zip::{CompressionMethod, ZipEntry, ZipParser};
