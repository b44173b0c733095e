//! Error taxonomy for the nested-archive loader.
//!
//! Resource lookups that simply find nothing are *not* errors: those
//! surface as `Option`/empty results. The variants here cover structural
//! failures that name the archive and entry involved, so callers can tell
//! a corrupt outer archive apart from a bad nesting chain or an archive
//! whose module metadata cannot be derived.

use thiserror::Error;

/// Errors produced by the archive, addressing, derivation and loading layers.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The archive's entry table is unreadable or truncated. Fatal for the
    /// whole session.
    #[error("malformed archive '{archive}': {reason}")]
    MalformedArchive { archive: String, reason: String },

    /// A segment of a nesting chain did not resolve. Reported to the
    /// immediate caller; never silently mapped to empty bytes.
    #[error("broken addressing in '{location}': no entry '{segment}'")]
    BrokenAddressing { location: String, segment: String },

    /// The archive's module metadata violates an invariant (provider class
    /// outside exported packages, illegal identifier, root-level class
    /// file). Fatal for that archive's module only.
    #[error("invalid module descriptor for '{archive}': {reason}")]
    DescriptorInvalid { archive: String, reason: String },

    /// A module name requested from a finder or session is unknown.
    #[error("module '{module}' not found")]
    ModuleNotFound { module: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    pub(crate) fn malformed(archive: impl Into<String>, reason: impl Into<String>) -> Self {
        LoaderError::MalformedArchive {
            archive: archive.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn descriptor(archive: impl Into<String>, reason: impl Into<String>) -> Self {
        LoaderError::DescriptorInvalid {
            archive: archive.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
