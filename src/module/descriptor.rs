//! Module metadata and its derivation from archive content.
//!
//! An archive either carries an explicit descriptor entry
//! (`META-INF/module.properties`) or has its descriptor derived
//! heuristically from naming conventions, manifest hints and a scan of its
//! entries. Derivation is deterministic and pure: the same archive bytes
//! always produce the same descriptor.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::archive::Archive;
use crate::error::{LoaderError, Result};
use crate::manifest::parse_properties;

/// Explicit descriptor entry, in the metadata folder.
pub const DESCRIPTOR_ENTRY: &str = "META-INF/module.properties";

/// Binary descriptor entry name: exempt from the root-level class rule but
/// otherwise opaque to this loader.
pub const BINARY_DESCRIPTOR_ENTRY: &str = "module-info.class";

/// Reserved prefix for service declaration files.
pub const SERVICES_PREFIX: &str = "META-INF/services/";

/// Manifest attribute overriding the derived module name.
pub const AUTOMATIC_MODULE_NAME_ATTRIBUTE: &str = "Automatic-Module-Name";

/// Manifest attribute naming the entry-point class.
pub const MAIN_CLASS_ATTRIBUTE: &str = "Main-Class";

/// Keywords, boolean and null literals, not allowed as identifier segments.
const RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while", "true", "false", "null", "_",
];

/// Structured module metadata for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    name: String,
    version: Option<String>,
    packages: BTreeSet<String>,
    provides: BTreeMap<String, Vec<String>>,
    main_class: Option<String>,
}

impl ModuleDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Exported package names, sorted.
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    /// Service interface name -> ordered provider class names.
    pub fn provides(&self) -> &BTreeMap<String, Vec<String>> {
        &self.provides
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    /// Derive the descriptor for `archive`, explicit entry first, heuristic
    /// otherwise.
    pub fn derive(archive: &Archive) -> Result<ModuleDescriptor> {
        match archive.open(DESCRIPTOR_ENTRY)? {
            Some(bytes) => Self::from_explicit(archive, &String::from_utf8_lossy(&bytes)),
            None => Self::derive_heuristically(archive),
        }
    }

    /// Parse the explicit descriptor entry.
    ///
    /// The package set is trusted as given when present; absent, the
    /// archive content is rescanned. The provider-package invariant is
    /// enforced either way.
    fn from_explicit(archive: &Archive, text: &str) -> Result<ModuleDescriptor> {
        let invalid = |reason: String| LoaderError::descriptor(archive.name(), reason);
        let props = parse_properties(text);

        let name = props
            .get("name")
            .ok_or_else(|| invalid(format!("{DESCRIPTOR_ENTRY} has no 'name' key")))?
            .clone();
        if !is_type_name(&name) {
            return Err(invalid(format!("illegal module name '{name}'")));
        }
        let version = props.get("version").cloned().filter(|v| !v.is_empty());

        let packages: BTreeSet<String> = match props.get("packages") {
            Some(list) => {
                let packages: BTreeSet<String> = list
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect();
                for package in &packages {
                    if !is_type_name(package) {
                        return Err(invalid(format!("illegal package name '{package}'")));
                    }
                }
                packages
            }
            None => collect_package_names(archive)?,
        };

        let mut provides = BTreeMap::new();
        for (key, value) in &props {
            let Some(service) = key.strip_prefix("provides.") else {
                continue;
            };
            if !is_type_name(service) {
                return Err(invalid(format!("illegal service name '{service}'")));
            }
            let providers: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            for provider in &providers {
                check_provider(provider, &packages)
                    .map_err(|reason| invalid(reason))?;
            }
            if !providers.is_empty() {
                provides.insert(service.to_string(), providers);
            }
        }

        let main_class = match props.get("main-class") {
            Some(class) if !class.is_empty() => {
                if !is_type_name(class) {
                    return Err(invalid(format!("illegal main class name '{class}'")));
                }
                Some(class.clone())
            }
            _ => None,
        };

        Ok(ModuleDescriptor {
            name,
            version,
            packages,
            provides,
            main_class,
        })
    }

    /// Heuristic derivation from naming conventions, manifest hints and a
    /// content scan.
    fn derive_heuristically(archive: &Archive) -> Result<ModuleDescriptor> {
        let invalid = |reason: String| LoaderError::descriptor(archive.name(), reason);

        let manifest = archive.manifest()?;
        let override_name = manifest
            .as_ref()
            .and_then(|m| m.attribute(AUTOMATIC_MODULE_NAME_ATTRIBUTE))
            .map(str::to_string);

        // Derive the version, and the module name if needed, from the
        // archive file name.
        let file_name = archive.file_name();
        let stem = file_name
            .strip_suffix(".jar")
            .or_else(|| file_name.strip_suffix(".zip"))
            .unwrap_or(file_name);

        let (raw_name, version) = split_dash_version(stem);

        let name = match override_name {
            Some(name) => {
                if !is_type_name(&name) {
                    return Err(invalid(format!(
                        "{AUTOMATIC_MODULE_NAME_ATTRIBUTE}: illegal module name '{name}'"
                    )));
                }
                name
            }
            None => {
                let cleaned = clean_module_name(raw_name);
                if cleaned.is_empty() {
                    return Err(invalid(format!(
                        "cannot derive a module name from '{file_name}'"
                    )));
                }
                cleaned
            }
        };

        let packages = collect_package_names(archive)?;

        // Map names of service declaration files to service names, then
        // parse each file into its provider list. Version-overridden
        // declarations fold onto their base name like any other entry.
        let mut provides = BTreeMap::new();
        let mut service_names: Vec<String> = archive
            .versioned_entries()
            .filter(|(_, entry)| !entry.is_directory)
            .filter_map(|(base, _)| to_service_name(base))
            .map(str::to_string)
            .collect();
        service_names.sort();
        service_names.dedup();
        for service in service_names {
            let Some(bytes) = archive.open_versioned(&format!("{SERVICES_PREFIX}{service}"))?
            else {
                continue;
            };
            let mut providers = Vec::new();
            for line in String::from_utf8_lossy(&bytes).lines() {
                let line = line.split('#').next().unwrap_or_default().trim();
                if line.is_empty() {
                    continue;
                }
                check_provider(line, &packages).map_err(|reason| invalid(reason))?;
                providers.push(line.to_string());
            }
            if !providers.is_empty() {
                provides.insert(service, providers);
            }
        }

        // Entry-point attribute is accepted only when its package was
        // discovered; otherwise it is ignored, not an error.
        let main_class = manifest
            .as_ref()
            .and_then(|m| m.attribute(MAIN_CLASS_ATTRIBUTE))
            .map(|c| c.replace('/', "."))
            .filter(|c| is_type_name(c) && packages.contains(package_name(c)));

        debug!(
            archive = archive.name(),
            module = name,
            packages = packages.len(),
            services = provides.len(),
            "derived module descriptor"
        );

        Ok(ModuleDescriptor {
            name,
            version,
            packages,
            provides,
            main_class,
        })
    }
}

/// The package part of a dotted class name, or `""` for the default
/// package.
pub fn package_name(class_name: &str) -> &str {
    match class_name.rfind('.') {
        Some(index) => &class_name[..index],
        None => "",
    }
}

fn check_provider(provider: &str, packages: &BTreeSet<String>) -> std::result::Result<(), String> {
    if !is_type_name(provider) {
        return Err(format!("illegal provider class name '{provider}'"));
    }
    let package = package_name(provider);
    if !packages.contains(package) {
        return Err(format!("provider class {provider} not in module"));
    }
    Ok(())
}

/// Collect the packages containing class files, through the versioned
/// view.
///
/// A class file in the archive's top-level directory (other than the
/// binary descriptor entry) is an error: an archive cannot have an unnamed
/// top-level package. Directory paths that are not legal dotted
/// identifiers are skipped.
fn collect_package_names(archive: &Archive) -> Result<BTreeSet<String>> {
    let mut packages = BTreeSet::new();
    // Scan by base name: a version-overridden class contributes the package
    // of its base path, not of the version prefix it lives under.
    for (base, entry) in archive.versioned_entries() {
        if entry.is_directory || !base.ends_with(".class") {
            continue;
        }
        match base.rfind('/') {
            None => {
                if base != BINARY_DESCRIPTOR_ENTRY {
                    return Err(LoaderError::descriptor(
                        archive.name(),
                        format!("{base} found in top-level directory (unnamed package not allowed)"),
                    ));
                }
            }
            Some(index) => {
                let package = base[..index].replace('/', ".");
                if is_type_name(&package) {
                    packages.insert(package);
                }
            }
        }
    }
    Ok(packages)
}

/// Map a service declaration file name to its service name.
///
/// Only files directly under the services prefix qualify, and the file
/// name must be a legal dotted identifier.
fn to_service_name(entry_name: &str) -> Option<&str> {
    let rest = entry_name.strip_prefix(SERVICES_PREFIX)?;
    if rest.is_empty() || rest.contains('/') || !is_type_name(rest) {
        return None;
    }
    Some(rest)
}

/// Split `name` on the first `-<digits>(.|$)` occurrence; the tail is
/// accepted as version only if it parses as a dotted-numeric version
/// string, otherwise the split is undone and the name keeps the
/// dash-digits portion.
fn split_dash_version(name: &str) -> (&str, Option<String>) {
    let Some(index) = find_dash_version(name) else {
        return (name, None);
    };
    let tail = &name[index + 1..];
    if is_valid_version(tail) {
        (&name[..index], Some(tail.to_string()))
    } else {
        // Unparseable version: the split is undone and the dash-digits
        // text stays part of the name.
        (name, None)
    }
}

/// First occurrence of a dash followed by digits that end the string or
/// continue with a dot.
fn find_dash_version(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'-' {
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > i + 1 && (j == bytes.len() || bytes[j] == b'.') {
            return Some(i);
        }
    }
    None
}

/// A version string is dotted-numeric: it starts with a digit and consists
/// of non-empty alphanumeric segments separated by `.`, `-` or `+`.
fn is_valid_version(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => {}
        _ => return false,
    }
    let mut prev_was_separator = false;
    for c in chars {
        if c == '.' || c == '-' || c == '+' {
            if prev_was_separator {
                return false;
            }
            prev_was_separator = true;
        } else if c.is_ascii_alphanumeric() {
            prev_was_separator = false;
        } else {
            return false;
        }
    }
    !prev_was_separator
}

/// Sanitize a candidate module name: every character outside
/// `[A-Za-z0-9]` becomes a dot, runs of dots collapse, leading and
/// trailing dots are stripped.
fn clean_module_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c);
        } else if !result.ends_with('.') {
            result.push('.');
        }
    }
    let result = result.strip_prefix('.').unwrap_or(&result);
    let result = result.strip_suffix('.').unwrap_or(result);
    result.to_string()
}

fn is_identifier(segment: &str) -> bool {
    if segment.is_empty() || RESERVED.contains(&segment) {
        return false;
    }
    let mut chars = segment.chars();
    let first = chars.next().unwrap_or_default();
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A legal type or package name: identifier segments joined by dots.
fn is_type_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization_produces_clean_names() {
        let cleaned = clean_module_name("my-lib_v2!!weird..name-");
        assert!(cleaned.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'));
        assert!(!cleaned.contains(".."));
        assert!(!cleaned.starts_with('.'));
        assert!(!cleaned.ends_with('.'));
        assert_eq!(cleaned, "my.lib.v2.weird.name");
    }

    #[test]
    fn version_split_accepts_dotted_numeric_only() {
        assert_eq!(
            split_dash_version("widget-1.2.3"),
            ("widget", Some("1.2.3".to_string()))
        );
        // "beta" never matches the dash-digits pattern at all.
        assert_eq!(find_dash_version("widget-beta"), None);
        assert_eq!(split_dash_version("widget-beta"), ("widget-beta", None));
        // Digits followed by neither '.' nor end do not trigger a split.
        assert_eq!(split_dash_version("sha1-impl"), ("sha1-impl", None));
        // The first dash-digits boundary wins.
        assert_eq!(
            split_dash_version("lib-2-1.0"),
            ("lib-2", Some("1.0".to_string()))
        );
        // Matched but unparseable tail: the split is undone.
        assert_eq!(split_dash_version("lib-2..3"), ("lib-2..3", None));
    }

    #[test]
    fn version_validation() {
        assert!(is_valid_version("1.2.3"));
        assert!(is_valid_version("1.0.0-SNAPSHOT"));
        assert!(is_valid_version("2"));
        assert!(!is_valid_version("beta"));
        assert!(!is_valid_version("1..2"));
        assert!(!is_valid_version("1.2."));
        assert!(!is_valid_version(""));
    }

    #[test]
    fn identifiers_reject_reserved_words() {
        assert!(is_type_name("com.acme.widget"));
        assert!(is_type_name("single"));
        assert!(!is_type_name("com.new.thing"));
        assert!(!is_type_name("com..acme"));
        assert!(!is_type_name("com.1digit"));
        assert!(!is_type_name(""));
        assert!(!is_type_name("_"));
    }

    #[test]
    fn service_names_come_from_direct_children_only() {
        assert_eq!(
            to_service_name("META-INF/services/com.acme.Service"),
            Some("com.acme.Service")
        );
        assert_eq!(to_service_name("META-INF/services/sub/com.acme.S"), None);
        assert_eq!(to_service_name("META-INF/services/"), None);
        assert_eq!(to_service_name("META-INF/other/com.acme.S"), None);
        assert_eq!(to_service_name("META-INF/services/not a name"), None);
    }

    #[test]
    fn package_name_of_rootless_class_is_empty() {
        assert_eq!(package_name("com.acme.Impl"), "com.acme");
        assert_eq!(package_name("Impl"), "");
    }
}
