//! Module metadata derivation, lookup and isolated loading.

mod descriptor;
mod finder;
mod loader;

pub use descriptor::{
    AUTOMATIC_MODULE_NAME_ATTRIBUTE, BINARY_DESCRIPTOR_ENTRY, DESCRIPTOR_ENTRY,
    MAIN_CLASS_ATTRIBUTE, ModuleDescriptor, SERVICES_PREFIX, package_name,
};
pub use finder::{Module, ModuleFinder};
pub use loader::{LoadedClass, LoaderSession, ModuleLoader, PackageOwnership};
