//! Outer-archive session: the reserved layout of an envelope and the
//! construction of a full resolution session over its nested libraries.
//!
//! An envelope is a plain archive with a reserved layout: nested library
//! archives under `LIB-INF/`, and under `META-INF/` a table of contents
//! listing them in load order, optional bootstrap system properties, and
//! manifest attributes naming the entry point.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::archive::Archive;
use crate::error::{LoaderError, Result};
use crate::location::{LocationResolver, NestedLocation};
use crate::manifest::{Manifest, parse_properties, parse_toc, split_escaped};
use crate::module::{LoaderSession, ModuleFinder, ModuleLoader};

/// Top-level folder holding the nested library archives.
pub const LIBRARIES_FOLDER: &str = "LIB-INF";

/// Metadata folder.
pub const METADATA_FOLDER: &str = "META-INF";

/// Table of contents: nested archive names, one per line, in load order.
pub const LIBRARIES_TOC: &str = "META-INF/libraries.txt";

/// Bootstrap system properties block.
pub const SYSTEM_PROPERTIES_ENTRY: &str = "META-INF/system.properties";

/// Separator in the extra-classpath attribute; doubled to escape a
/// literal one.
pub const EXTRA_CLASSPATH_SEPARATOR: char = ';';

/// Manifest attributes consumed from the outer archive.
pub mod attributes {
    pub const MAIN_CLASS: &str = "Executable-Jar-Main-Class";
    pub const MAIN_MODULE: &str = "Executable-Jar-Main-Module";
    pub const EXTRA_CLASSPATH: &str = "Executable-Jar-Extra-Classpath";
    pub const ENTRY_HASH: &str = "SHA-256-Digest";
}

/// An opened outer archive with its reserved layout parsed.
pub struct Envelope {
    archive: Arc<Archive>,
    location: NestedLocation,
    manifest: Manifest,
    toc: Vec<String>,
}

impl Envelope {
    /// Open an envelope file and read its metadata folder.
    ///
    /// The table of contents is mandatory: an archive without one is not
    /// an envelope.
    pub fn open(path: impl AsRef<Path>) -> Result<Envelope> {
        let archive = Arc::new(Archive::from_file(path)?);
        Self::from_archive(archive)
    }

    /// Wrap an already opened archive as an envelope.
    pub fn from_archive(archive: Arc<Archive>) -> Result<Envelope> {
        let manifest = archive.manifest()?.unwrap_or_default();
        let toc = match archive.open(LIBRARIES_TOC)? {
            Some(bytes) => parse_toc(&String::from_utf8_lossy(&bytes)),
            None => {
                return Err(LoaderError::malformed(
                    archive.name(),
                    format!("{LIBRARIES_TOC} not found"),
                ));
            }
        };
        let location = NestedLocation::root(archive.name());
        Ok(Envelope {
            archive,
            location,
            manifest,
            toc,
        })
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    pub fn location(&self) -> &NestedLocation {
        &self.location
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Entry-point class named by the manifest, if any.
    pub fn main_class(&self) -> Option<&str> {
        self.manifest.attribute(attributes::MAIN_CLASS)
    }

    /// Main module named by the manifest, if any.
    pub fn main_module(&self) -> Option<&str> {
        self.manifest.attribute(attributes::MAIN_MODULE)
    }

    /// Extra classpath entries from the manifest, unescaped.
    pub fn extra_classpath(&self) -> Vec<String> {
        match self.manifest.attribute(attributes::EXTRA_CLASSPATH) {
            Some(value) => split_escaped(value, EXTRA_CLASSPATH_SEPARATOR),
            None => Vec::new(),
        }
    }

    /// The recorded content digest of a nested entry (base64, for change
    /// detection only).
    pub fn entry_digest(&self, entry: &str) -> Option<&str> {
        self.manifest.entry_attribute(entry, attributes::ENTRY_HASH)
    }

    /// Bootstrap system properties, empty when the block is absent.
    pub fn system_properties(&self) -> Result<BTreeMap<String, String>> {
        Ok(match self.archive.open(SYSTEM_PROPERTIES_ENTRY)? {
            Some(bytes) => parse_properties(&String::from_utf8_lossy(&bytes)),
            None => BTreeMap::new(),
        })
    }

    /// Nested archive names in load order.
    pub fn library_names(&self) -> &[String] {
        &self.toc
    }

    /// Open every nested library archive listed in the table of contents,
    /// in order, paired with its location.
    pub fn libraries(&self) -> Result<Vec<(Arc<Archive>, NestedLocation)>> {
        let mut libraries = Vec::with_capacity(self.toc.len());
        for name in &self.toc {
            let entry_name = format!("{LIBRARIES_FOLDER}/{name}");
            let archive = match self.archive.nested_archive_named(&entry_name)? {
                Some(archive) => archive,
                None => {
                    // The TOC promised an entry the archive does not have.
                    return Err(LoaderError::BrokenAddressing {
                        location: self.location.to_string(),
                        segment: entry_name,
                    });
                }
            };
            libraries.push((Arc::new(archive), self.location.join(entry_name)));
        }
        Ok(libraries)
    }

    /// Build the full resolution session: finder, loaders and location
    /// registry over the nested libraries.
    pub fn into_session(self) -> Result<EnvelopeSession> {
        let libraries = self.libraries()?;
        debug!(
            envelope = self.archive.name(),
            libraries = libraries.len(),
            "building resolution session"
        );

        let mut resolver = LocationResolver::new();
        resolver.register(self.location.clone(), self.archive.clone());
        for (archive, location) in &libraries {
            resolver.register(location.clone(), archive.clone());
        }

        let finder = Arc::new(ModuleFinder::from_archives(libraries)?);
        let session = LoaderSession::new(finder.clone());

        Ok(EnvelopeSession {
            envelope: self,
            finder,
            session,
            resolver,
        })
    }
}

/// A fully constructed resolution session over one envelope.
pub struct EnvelopeSession {
    envelope: Envelope,
    finder: Arc<ModuleFinder>,
    session: LoaderSession,
    resolver: LocationResolver,
}

impl EnvelopeSession {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn finder(&self) -> &Arc<ModuleFinder> {
        &self.finder
    }

    pub fn loaders(&self) -> &LoaderSession {
        &self.session
    }

    /// Session-scoped identifier registry.
    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// The loader of the manifest's main module.
    pub fn main_loader(&self) -> Result<Arc<ModuleLoader>> {
        let name = self
            .envelope
            .main_module()
            .ok_or_else(|| LoaderError::ModuleNotFound {
                module: format!("<{} attribute missing>", attributes::MAIN_MODULE),
            })?;
        self.session
            .loader(name)
            .ok_or_else(|| LoaderError::ModuleNotFound {
                module: name.to_string(),
            })
    }

    /// Resolve a composite identifier string to entry bytes.
    pub fn resolve_str(&self, identifier: &str) -> Result<Vec<u8>> {
        let location = NestedLocation::parse(identifier)?;
        self.resolver.resolve(&location)
    }
}
