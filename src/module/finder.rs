//! Collects archives into a queryable set of modules.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::archive::Archive;
use crate::error::Result;
use crate::location::NestedLocation;
use crate::module::descriptor::ModuleDescriptor;

/// One descriptor paired with the archive backing it and the location
/// prefix used to resolve its content.
///
/// Created once when the owning finder is constructed; immutable
/// afterward.
pub struct Module {
    descriptor: ModuleDescriptor,
    archive: Arc<Archive>,
    location: NestedLocation,
}

impl Module {
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn archive(&self) -> &Arc<Archive> {
        &self.archive
    }

    /// The location prefix of this module's archive.
    pub fn location(&self) -> &NestedLocation {
        &self.location
    }

    /// Read a resource from the backing archive (versioned view), or
    /// `None` if absent.
    pub fn open(&self, resource: &str) -> Result<Option<Vec<u8>>> {
        self.archive.open_versioned(resource)
    }

    /// The composite identifier of a resource, if the resource exists.
    pub fn resource_location(&self, resource: &str) -> Option<NestedLocation> {
        self.archive
            .versioned_entry(resource)
            .map(|_| self.location.join(resource))
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.descriptor.name())
            .field("location", &self.location.to_string())
            .finish()
    }
}

/// An immutable, deterministically ordered index of modules derived from
/// an ordered collection of archives.
///
/// Duplicate module names are last-write-wins in input order; the shadowed
/// modules stay listed in [`ModuleFinder::shadowed`] since a collision is
/// most likely an operator error.
pub struct ModuleFinder {
    modules: BTreeMap<String, Arc<Module>>,
    shadowed: Vec<Arc<Module>>,
}

impl ModuleFinder {
    /// Derive a descriptor for every archive, in order, and index the
    /// resulting modules by name.
    ///
    /// A derivation failure for any archive fails the whole construction:
    /// no partial module set is ever published.
    pub fn from_archives(
        archives: impl IntoIterator<Item = (Arc<Archive>, NestedLocation)>,
    ) -> Result<ModuleFinder> {
        let mut modules: BTreeMap<String, Arc<Module>> = BTreeMap::new();
        let mut shadowed = Vec::new();
        for (archive, location) in archives {
            let descriptor = ModuleDescriptor::derive(&archive)?;
            let name = descriptor.name().to_string();
            let module = Arc::new(Module {
                descriptor,
                archive,
                location,
            });
            if let Some(previous) = modules.insert(name.clone(), module) {
                warn!(
                    module = name,
                    shadowed = previous.archive().name(),
                    "duplicate module name, later archive wins"
                );
                shadowed.push(previous);
            }
        }
        Ok(ModuleFinder { modules, shadowed })
    }

    /// Look up a module by name.
    pub fn find(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.get(name)
    }

    /// All modules, sorted by name. Snapshot of the index taken at
    /// construction.
    pub fn find_all(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules hidden by a later archive deriving the same name.
    pub fn shadowed(&self) -> &[Arc<Module>] {
        &self.shadowed
    }
}
