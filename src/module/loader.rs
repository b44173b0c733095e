//! Isolated, package-scoped class and resource loading.
//!
//! A [`LoaderSession`] freezes a [`PackageOwnership`] map over a finder's
//! modules and hands out one [`ModuleLoader`] per module. Loaders answer
//! load requests from their own module's archive and delegate out-of-module
//! requests (one hop) to the loader owning the class's package.
//!
//! Session construction is single-threaded and completes fully before any
//! loader is exposed; afterwards loaders support concurrent callers, with
//! class definition serialized per class name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::error::Result;
use crate::location::NestedLocation;
use crate::module::descriptor::package_name;
use crate::module::finder::{Module, ModuleFinder};

/// A class materialized from a module's archive.
///
/// Loading the same class name twice through the same session yields the
/// same `Arc` (pointer identity), which is how "defined at most once" is
/// observable.
pub struct LoadedClass {
    name: String,
    bytes: Vec<u8>,
    module: String,
    location: NestedLocation,
}

impl LoadedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw class bytes, as stored in the backing archive.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Name of the module that defined this class.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The composite identifier of the class entry.
    pub fn location(&self) -> &NestedLocation {
        &self.location
    }
}

/// Package name -> owning module name.
///
/// Built once during session construction and frozen; all loaders of the
/// session share it read-only and never mutate it.
pub struct PackageOwnership {
    owners: HashMap<String, String>,
}

impl PackageOwnership {
    fn build(finder: &ModuleFinder) -> PackageOwnership {
        let mut owners = HashMap::new();
        for module in finder.find_all() {
            for package in module.descriptor().packages() {
                owners.insert(package.clone(), module.descriptor().name().to_string());
            }
        }
        PackageOwnership { owners }
    }

    /// The module owning `package`, if any.
    pub fn owner(&self, package: &str) -> Option<&str> {
        self.owners.get(package).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

struct LoaderRegistry {
    loaders: HashMap<String, Arc<ModuleLoader>>,
}

type ClassSlot = Arc<Mutex<Option<Arc<LoadedClass>>>>;

/// Loader bound to exactly one module.
pub struct ModuleLoader {
    module: Arc<Module>,
    ownership: Arc<PackageOwnership>,
    /// Non-owning back-reference: the registry owns the loaders, never the
    /// other way around.
    registry: Weak<LoaderRegistry>,
    /// Defined classes plus in-flight definition slots, keyed by class
    /// name. The outer lock is held only to fetch or insert a slot; the
    /// per-slot lock serializes definition of one class name.
    classes: Mutex<HashMap<String, ClassSlot>>,
}

impl ModuleLoader {
    /// Name of the bound module.
    pub fn module_name(&self) -> &str {
        self.module.descriptor().name()
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    fn class_slot(&self, class_name: &str) -> ClassSlot {
        let mut classes = self.classes.lock().unwrap_or_else(|e| e.into_inner());
        classes
            .entry(class_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Load a class by dotted name.
    ///
    /// Resolution order: the loader's own published classes, then the
    /// bound module's archive, then a single delegation hop to the loader
    /// owning the class's package. Absence is `Ok(None)`, not an error.
    pub fn load_class(&self, class_name: &str) -> Result<Option<Arc<LoadedClass>>> {
        let slot = self.class_slot(class_name);
        let mut defined = slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(class) = defined.as_ref() {
            return Ok(Some(class.clone()));
        }

        if let Some(class) = self.define_from_own_module(class_name)? {
            *defined = Some(class.clone());
            return Ok(Some(class));
        }

        // Out-of-module request: one hop to the owning loader, which will
        // not delegate further for a package it owns itself.
        let package = package_name(class_name);
        if let Some(owner) = self.ownership.owner(package) {
            if owner != self.module_name() {
                if let Some(registry) = self.registry.upgrade() {
                    if let Some(loader) = registry.loaders.get(owner) {
                        let result = loader.load_class(class_name)?;
                        if let Some(class) = result.as_ref() {
                            *defined = Some(class.clone());
                        }
                        return Ok(result);
                    }
                }
            }
        }
        Ok(None)
    }

    fn define_from_own_module(&self, class_name: &str) -> Result<Option<Arc<LoadedClass>>> {
        let resource = class_resource_name(class_name);
        let Some(bytes) = self.module.open(&resource)? else {
            return Ok(None);
        };
        debug!(
            module = self.module_name(),
            class = class_name,
            "defining class"
        );
        Ok(Some(Arc::new(LoadedClass {
            name: class_name.to_string(),
            bytes,
            module: self.module_name().to_string(),
            location: self.module.location().join(resource),
        })))
    }

    /// Read a resource from the bound module only.
    pub fn find_resource(&self, resource: &str) -> Result<Option<Vec<u8>>> {
        self.module.open(resource)
    }

    /// All occurrences of a resource visible to this loader. A module
    /// holds each resource at most once, so this yields zero or one items.
    pub fn find_resources(&self, resource: &str) -> Result<Vec<Vec<u8>>> {
        Ok(self.find_resource(resource)?.into_iter().collect())
    }

    /// Module-qualified resource lookup: resolves within the named module,
    /// whether that is the bound one or a sibling.
    pub fn find_resource_in(&self, module_name: &str, resource: &str) -> Result<Option<Vec<u8>>> {
        if module_name == self.module_name() {
            return self.find_resource(resource);
        }
        match self.registry.upgrade() {
            Some(registry) => match registry.loaders.get(module_name) {
                Some(loader) => loader.find_resource(resource),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }
}

/// One resolution session: a frozen ownership map plus one loader per
/// module of the finder.
pub struct LoaderSession {
    finder: Arc<ModuleFinder>,
    ownership: Arc<PackageOwnership>,
    registry: Arc<LoaderRegistry>,
}

impl LoaderSession {
    /// Build the session. Runs on the calling thread and completes fully
    /// (ownership map and every loader) before returning; only then may
    /// loaders be shared across threads.
    pub fn new(finder: Arc<ModuleFinder>) -> LoaderSession {
        let ownership = Arc::new(PackageOwnership::build(&finder));
        let registry = Arc::new_cyclic(|weak: &Weak<LoaderRegistry>| {
            let mut loaders = HashMap::new();
            for module in finder.find_all() {
                let loader = Arc::new(ModuleLoader {
                    module: module.clone(),
                    ownership: ownership.clone(),
                    registry: weak.clone(),
                    classes: Mutex::new(HashMap::new()),
                });
                loaders.insert(module.descriptor().name().to_string(), loader);
            }
            LoaderRegistry { loaders }
        });
        LoaderSession {
            finder,
            ownership,
            registry,
        }
    }

    pub fn finder(&self) -> &Arc<ModuleFinder> {
        &self.finder
    }

    pub fn ownership(&self) -> &Arc<PackageOwnership> {
        &self.ownership
    }

    /// The loader bound to `module_name`.
    pub fn loader(&self, module_name: &str) -> Option<Arc<ModuleLoader>> {
        self.registry.loaders.get(module_name).cloned()
    }
}

/// Map a dotted class name to its archive entry name.
fn class_resource_name(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_resource_name_maps_dots_to_slashes() {
        assert_eq!(class_resource_name("com.acme.Impl"), "com/acme/Impl.class");
        assert_eq!(class_resource_name("TopLevel"), "TopLevel.class");
    }
}
