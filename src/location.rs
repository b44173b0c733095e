//! Composite location identifiers for entries inside nested archives.
//!
//! A location names "entry E inside archive A which is itself entry E'
//! inside archive A'...". The textual form is
//! `envelope:<outer-path>!<entry-path>[!<entry-path>...]` and round-trips
//! exactly through [`NestedLocation::parse`] and `Display`, so any later
//! consumer holding only the string can resolve it again through a
//! [`LocationResolver`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::archive::{Archive, NESTING_SEPARATOR};
use crate::bytes::StringSequence;
use crate::error::{LoaderError, Result};

/// URL-like scheme of composite identifiers.
pub const SCHEME: &str = "envelope";

/// A chain of (containing archive, entry name) pairs terminating at a
/// concrete entry.
///
/// Two locations are equal iff their chains are equal element-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestedLocation {
    outer: String,
    chain: Vec<String>,
}

impl NestedLocation {
    /// A location naming the outer archive itself.
    pub fn root(outer: impl Into<String>) -> Self {
        Self {
            outer: outer.into(),
            chain: Vec::new(),
        }
    }

    /// The outer archive path.
    pub fn outer(&self) -> &str {
        &self.outer
    }

    /// The entry-path chain, outermost first.
    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// A new location descending one level into `entry`.
    pub fn join(&self, entry: impl Into<String>) -> NestedLocation {
        let mut chain = self.chain.clone();
        chain.push(entry.into());
        NestedLocation {
            outer: self.outer.clone(),
            chain,
        }
    }

    /// The location of the containing level, or `None` at the root.
    pub fn parent(&self) -> Option<NestedLocation> {
        if self.chain.is_empty() {
            return None;
        }
        Some(NestedLocation {
            outer: self.outer.clone(),
            chain: self.chain[..self.chain.len() - 1].to_vec(),
        })
    }

    /// Parse the textual form. The scheme prefix is required.
    pub fn parse(text: &str) -> Result<NestedLocation> {
        let sequence = StringSequence::new(text);
        let prefix = format!("{SCHEME}:");
        if !sequence.starts_with(&prefix) {
            return Err(LoaderError::BrokenAddressing {
                location: text.to_string(),
                segment: format!("{SCHEME}: scheme prefix"),
            });
        }
        // Walk separator-delimited segments as views over the shared text,
        // materializing each one only once its boundaries are known.
        let mut segments = Vec::new();
        let mut rest = sequence.subsequence(prefix.len(), sequence.len());
        while let Some(index) = rest.index_of(NESTING_SEPARATOR) {
            segments.push(rest.subsequence(0, index).as_str().to_string());
            rest = rest.subsequence(index + 1, rest.len());
        }
        segments.push(rest.as_str().to_string());

        let mut segments = segments.into_iter();
        let outer = segments.next().unwrap_or_default();
        if outer.is_empty() {
            return Err(LoaderError::BrokenAddressing {
                location: text.to_string(),
                segment: "outer archive path".to_string(),
            });
        }
        Ok(NestedLocation {
            outer,
            chain: segments.collect(),
        })
    }
}

impl fmt::Display for NestedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}:{}", self.outer)?;
        for segment in &self.chain {
            write!(f, "{NESTING_SEPARATOR}{segment}")?;
        }
        Ok(())
    }
}

/// Session-scoped registry resolving composite identifiers back to bytes.
///
/// Archives are registered explicitly (no process-wide handler state); the
/// registry's lifetime is the session's. Resolution finds the longest
/// registered prefix of a location and walks the remaining chain segments,
/// failing fast at the first broken link.
#[derive(Default)]
pub struct LocationResolver {
    archives: HashMap<NestedLocation, Arc<Archive>>,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open archive under the location it was opened from.
    pub fn register(&mut self, location: NestedLocation, archive: Arc<Archive>) {
        self.archives.insert(location, archive);
    }

    /// The registered archive exactly matching `location`, if any.
    pub fn archive(&self, location: &NestedLocation) -> Option<&Arc<Archive>> {
        self.archives.get(location)
    }

    fn broken(location: &NestedLocation, segment: &str) -> LoaderError {
        LoaderError::BrokenAddressing {
            location: location.to_string(),
            segment: segment.to_string(),
        }
    }

    /// Longest registered prefix of `location`, with the number of chain
    /// segments left to walk.
    fn closest(&self, location: &NestedLocation) -> Result<(Arc<Archive>, usize)> {
        let mut prefix = location.clone();
        loop {
            if let Some(archive) = self.archives.get(&prefix) {
                let remaining = location.depth() - prefix.depth();
                return Ok((archive.clone(), remaining));
            }
            prefix = match prefix.parent() {
                Some(parent) => parent,
                None => return Err(Self::broken(location, &location.outer)),
            };
        }
    }

    /// Resolve a location to the uncompressed bytes of the entry it names.
    ///
    /// Every intermediate chain segment must name an entry holding a valid
    /// archive; the final segment names the target entry. A missing segment
    /// is a [`LoaderError::BrokenAddressing`], never empty bytes.
    pub fn resolve(&self, location: &NestedLocation) -> Result<Vec<u8>> {
        if location.chain.is_empty() {
            return Err(Self::broken(location, "entry path"));
        }
        let (mut archive, remaining) = self.closest(location)?;
        let walk = &location.chain[location.depth() - remaining..];
        let (last, intermediate) = match walk.split_last() {
            Some(split) => split,
            // The location itself is registered as an archive; there is no
            // terminal entry to read.
            None => return Err(Self::broken(location, "entry path")),
        };
        for segment in intermediate {
            archive = match archive.nested_archive_named(segment)? {
                Some(child) => Arc::new(child),
                None => return Err(Self::broken(location, segment)),
            };
        }
        if let Some(bytes) = archive.open(last)? {
            return Ok(bytes);
        }
        // Locations carry logical entry names; fall back to the versioned
        // view so feature-tagged overrides stay addressable.
        match archive.open_versioned(last)? {
            Some(bytes) => Ok(bytes),
            None => Err(Self::broken(location, last)),
        }
    }

    /// Resolve a location naming an archive (rather than a plain entry) to
    /// an open [`Archive`].
    pub fn resolve_archive(&self, location: &NestedLocation) -> Result<Arc<Archive>> {
        let (mut archive, remaining) = self.closest(location)?;
        let walk = &location.chain[location.depth() - remaining..];
        for segment in walk {
            archive = match archive.nested_archive_named(segment)? {
                Some(child) => Arc::new(child),
                None => return Err(Self::broken(location, segment)),
            };
        }
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_depth_one_to_three() {
        for text in [
            "envelope:/opt/app/outer.jar!LIB-INF/core.jar",
            "envelope:/opt/app/outer.jar!LIB-INF/core.jar!com/acme/A.class",
            "envelope:outer.jar!LIB-INF/a.jar!inner.jar!res/x.txt",
        ] {
            let location = NestedLocation::parse(text).unwrap();
            assert_eq!(location.to_string(), text);
            assert_eq!(NestedLocation::parse(&location.to_string()).unwrap(), location);
        }
    }

    #[test]
    fn equality_is_elementwise_over_the_chain() {
        let a = NestedLocation::root("outer.jar").join("a.jar").join("x");
        let b = NestedLocation::root("outer.jar").join("a.jar").join("x");
        let c = NestedLocation::root("outer.jar").join("a.jar").join("y");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_missing_scheme_or_outer() {
        assert!(NestedLocation::parse("jar:outer.jar!x").is_err());
        assert!(NestedLocation::parse("envelope:!x").is_err());
    }

    #[test]
    fn join_and_parent_are_inverse() {
        let root = NestedLocation::root("outer.jar");
        let deep = root.join("LIB-INF/a.jar").join("p/C.class");
        assert_eq!(deep.depth(), 2);
        assert_eq!(deep.parent().unwrap().parent().unwrap(), root);
        assert_eq!(root.parent(), None);
    }
}
