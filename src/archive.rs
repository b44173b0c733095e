//! Random-access reader over a single archive's entry table.
//!
//! An [`Archive`] owns its byte source exclusively: a direct file, a byte
//! range of a parent archive (stored nested entry), or an inflated buffer
//! (deflated nested entry). Dropping an archive releases its source and
//! never affects sibling archives.
//!
//! The *versioned view* folds entries under `META-INF/versions/<N>/` onto
//! their base name when `N` is a decimal feature tag not above the
//! archive's release feature; among candidates for one base name the
//! highest admissible tag wins.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use flate2::Crc;
use flate2::read::DeflateDecoder;

use crate::bytes::AsciiBytes;
use crate::error::{LoaderError, Result};
use crate::io::{FileReader, MemoryReader, ReadAt, RegionReader};
use crate::manifest::Manifest;
use crate::zip::{CompressionMethod, ZipEntry, ZipParser};

/// Reserved prefix for feature-tagged entry overrides.
pub const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// Manifest entry name.
pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Feature level accepted by default when folding versioned entries.
pub const DEFAULT_RELEASE_FEATURE: u32 = 17;

/// Separator between nesting levels in composite identifiers.
pub const NESTING_SEPARATOR: char = '!';

struct VersionedIndex {
    /// The folded view, one `(base name, entry index)` pair per base name,
    /// in first-appearance order of the base names.
    order: Vec<(String, usize)>,
    /// Base name -> index into the entry table.
    by_base: HashMap<String, usize>,
}

/// Random-access reader over one archive.
pub struct Archive {
    parser: ZipParser,
    entries: Vec<ZipEntry>,
    index: HashMap<AsciiBytes, usize>,
    /// Display name: the file path for a direct archive, a `!`-joined chain
    /// for nested ones.
    name: String,
    /// Last path segment of the archive name, used for module-name
    /// derivation.
    file_name: String,
    release_feature: u32,
    versioned: OnceLock<VersionedIndex>,
}

impl Archive {
    /// Open a direct archive file with the default release feature.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Archive> {
        Self::from_file_with_feature(path, DEFAULT_RELEASE_FEATURE)
    }

    /// Open a direct archive file accepting versioned entries up to
    /// `release_feature`.
    pub fn from_file_with_feature(path: impl AsRef<Path>, release_feature: u32) -> Result<Archive> {
        let path = path.as_ref();
        let reader = Arc::new(FileReader::new(path)?);
        Self::from_reader(reader, path.display().to_string(), release_feature)
    }

    /// Build an archive over an arbitrary byte source.
    pub fn from_reader(
        reader: Arc<dyn ReadAt>,
        name: String,
        release_feature: u32,
    ) -> Result<Archive> {
        let parser = ZipParser::new(reader, name.clone());
        let entries = parser.list_entries()?;
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            index.insert(entry.name.clone(), i);
        }
        let file_name = name
            .rsplit([NESTING_SEPARATOR, '/'])
            .next()
            .unwrap_or(name.as_str())
            .to_string();
        Ok(Archive {
            parser,
            entries,
            index,
            name,
            file_name,
            release_feature,
            versioned: OnceLock::new(),
        })
    }

    /// The archive's display name (full path or nesting chain).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The final path segment of the archive name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn release_feature(&self) -> u32 {
        self.release_feature
    }

    /// All entries in central-directory order.
    pub fn entries(&self) -> impl Iterator<Item = &ZipEntry> {
        self.entries.iter()
    }

    /// Look up an entry by exact name.
    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        let key = AsciiBytes::from(name);
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    /// Read an entry's uncompressed content, or `None` if no such entry.
    pub fn open(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.entry(name) {
            Some(entry) => self.read(entry).map(Some),
            None => Ok(None),
        }
    }

    /// Read and, if necessary, inflate an entry's content.
    ///
    /// The CRC-32 of the uncompressed bytes is checked against the entry
    /// table; a mismatch is a [`LoaderError::MalformedArchive`] naming the
    /// entry.
    pub fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.data_offset(entry)?;
        let mut compressed = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_exact_at(data_offset, &mut compressed)?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflate => {
                let mut decoder = DeflateDecoder::new(&compressed[..]);
                let mut data = Vec::with_capacity(entry.uncompressed_size as usize);
                decoder.read_to_end(&mut data).map_err(|e| {
                    LoaderError::malformed(
                        &self.name,
                        format!("failed to inflate entry '{}': {e}", entry.name()),
                    )
                })?;
                data
            }
            CompressionMethod::Unknown(method) => {
                return Err(LoaderError::malformed(
                    &self.name,
                    format!(
                        "unsupported compression method {method} for entry '{}'",
                        entry.name()
                    ),
                ));
            }
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(LoaderError::malformed(
                &self.name,
                format!("CRC mismatch for entry '{}'", entry.name()),
            ));
        }
        Ok(data)
    }

    /// Map an entry name to the base name it contributes under the
    /// versioned view, along with its feature tag.
    ///
    /// Entries outside the version prefix map to themselves with tag 0.
    /// Under the prefix, a non-numeric first segment, an empty remainder
    /// path or a tag above the release feature excludes the entry.
    fn base_name<'a>(&self, name: &'a str) -> Option<(&'a str, u32)> {
        let rest = match name.strip_prefix(VERSIONS_PREFIX) {
            Some(rest) => rest,
            None => return Some((name, 0)),
        };
        let (tag, remainder) = rest.split_once('/')?;
        if remainder.is_empty() {
            return None;
        }
        // Malformed or too-new tags are dropped silently.
        let tag: u32 = tag.parse().ok()?;
        if tag > self.release_feature {
            return None;
        }
        Some((remainder, tag))
    }

    fn versioned_index(&self) -> &VersionedIndex {
        self.versioned.get_or_init(|| {
            let mut order: Vec<(String, usize)> = Vec::with_capacity(self.entries.len());
            let mut by_base: HashMap<String, usize> = HashMap::new();
            let mut tags: HashMap<String, (u32, usize)> = HashMap::new();
            for (i, entry) in self.entries.iter().enumerate() {
                let Some((base, tag)) = self.base_name(entry.name()) else {
                    continue;
                };
                match tags.get(base) {
                    None => {
                        tags.insert(base.to_string(), (tag, order.len()));
                        by_base.insert(base.to_string(), i);
                        order.push((base.to_string(), i));
                    }
                    Some(&(existing, pos)) => {
                        // Last one wins in ascending tag order: replace on
                        // ties, keep the higher tag otherwise.
                        if tag >= existing {
                            tags.insert(base.to_string(), (tag, pos));
                            by_base.insert(base.to_string(), i);
                            order[pos].1 = i;
                        }
                    }
                }
            }
            VersionedIndex { order, by_base }
        })
    }

    /// The folded multi-version view: exactly one `(base name, entry)` pair
    /// per base name, preferring the highest feature tag not above the
    /// release feature.
    ///
    /// The winning entry may live under the version prefix, so consumers
    /// that inspect entry paths (package scans, service discovery) must use
    /// the yielded base name, never `entry.name()`; pair the entry with
    /// [`Archive::read`] to get its content.
    pub fn versioned_entries(&self) -> impl Iterator<Item = (&str, &ZipEntry)> {
        self.versioned_index()
            .order
            .iter()
            .map(|(base, i)| (base.as_str(), &self.entries[*i]))
    }

    /// Resolve a base name through the versioned view.
    pub fn versioned_entry(&self, name: &str) -> Option<&ZipEntry> {
        self.versioned_index()
            .by_base
            .get(name)
            .map(|&i| &self.entries[i])
    }

    /// Read a base name's content through the versioned view.
    pub fn open_versioned(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.versioned_entry(name) {
            Some(entry) => self.read(entry).map(Some),
            None => Ok(None),
        }
    }

    /// The archive's manifest, if present.
    pub fn manifest(&self) -> Result<Option<Manifest>> {
        match self.open(MANIFEST_ENTRY)? {
            Some(bytes) => Ok(Some(Manifest::parse(&String::from_utf8_lossy(&bytes)))),
            None => Ok(None),
        }
    }

    /// Present an entry whose bytes are themselves an archive as a child
    /// [`Archive`], without writing anything to disk.
    ///
    /// A stored entry becomes a byte-range view of this archive's source; a
    /// deflated entry is inflated into memory. The child exclusively owns
    /// the resulting source.
    pub fn nested_archive(&self, entry: &ZipEntry) -> Result<Archive> {
        let child_name = format!("{}{}{}", self.name, NESTING_SEPARATOR, entry.name());
        let reader: Arc<dyn ReadAt> = match entry.compression_method {
            CompressionMethod::Stored => {
                let data_offset = self.parser.data_offset(entry)?;
                Arc::new(RegionReader::new(
                    self.parser.reader().clone(),
                    data_offset,
                    entry.compressed_size,
                ))
            }
            _ => Arc::new(MemoryReader::new(self.read(entry)?)),
        };
        Archive::from_reader(reader, child_name, self.release_feature)
    }

    /// Open the entry named `name` as a nested archive.
    pub fn nested_archive_named(&self, name: &str) -> Result<Option<Archive>> {
        match self.entry(name) {
            Some(entry) => self.nested_archive(entry).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("release_feature", &self.release_feature)
            .finish()
    }
}
