//! Zero-copy views over raw bytes and strings.
//!
//! Archive entry names are compared and hashed constantly during lookup,
//! so they are kept as offset+length views into the shared central
//! directory buffer instead of individually allocated strings.
//!
//! Hashing is bit-compatible with the hash of the equivalent UTF-8 decoded
//! string in the JVM (`31 * h + unit` per UTF-16 code unit, with surrogate
//! pairs for code points above U+FFFF), so names read out of an archive
//! hash identically to names supplied by callers as strings.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Bitmask applied to the first byte of a 1-4 byte UTF-8 sequence.
const INITIAL_BYTE_BITMASK: [u32; 4] = [0x7F, 0x1F, 0x0F, 0x07];

/// Bitmask applied to continuation bytes of a UTF-8 sequence.
const SUBSEQUENT_BYTE_BITMASK: u32 = 0x3F;

/// Reference string hash: the JVM `String::hashCode` of `s`.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

fn utf8_sequence_len(b: u8) -> usize {
    if b & 0x80 == 0 {
        return 1;
    }
    let mut b = b;
    let mut len = 0;
    while b & 0x80 != 0 {
        b <<= 1;
        len += 1;
    }
    len
}

/// An offset+length view into a shared byte buffer holding (mostly ASCII)
/// UTF-8 text.
///
/// Equality is byte-wise. The hash and the materialized string are computed
/// lazily and cached behind a once guard, so concurrent first access is
/// safe. The underlying bytes never change once the view is created.
#[derive(Clone)]
pub struct AsciiBytes {
    bytes: Arc<[u8]>,
    offset: usize,
    length: usize,
    hash: OnceLock<i32>,
    string: OnceLock<String>,
}

impl AsciiBytes {
    /// Create a view over a whole buffer.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let length = bytes.len();
        Self {
            bytes,
            offset: 0,
            length,
            hash: OnceLock::new(),
            string: OnceLock::new(),
        }
    }

    /// Create a view over `bytes[offset..offset + length]`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn with_range(bytes: Arc<[u8]>, offset: usize, length: usize) -> Self {
        assert!(offset + length <= bytes.len(), "range out of bounds");
        Self {
            bytes,
            offset,
            length,
            hash: OnceLock::new(),
            string: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.offset..self.offset + self.length]
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.as_slice().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.as_slice().ends_with(suffix)
    }

    /// A sub-view sharing the same underlying buffer (no copy).
    pub fn slice(&self, begin: usize, end: usize) -> AsciiBytes {
        assert!(begin <= end && end <= self.length, "range out of bounds");
        AsciiBytes::with_range(self.bytes.clone(), self.offset + begin, end - begin)
    }

    /// The decoded string, materialized once and cached.
    pub fn as_str(&self) -> &str {
        self.string
            .get_or_init(|| String::from_utf8_lossy(self.as_slice()).into_owned())
    }

    /// Hash compatible with [`string_hash`] of the decoded content.
    pub fn java_hash(&self) -> i32 {
        *self.hash.get_or_init(|| {
            let mut hash = 0i32;
            self.decode(|unit| {
                hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
            });
            hash
        })
    }

    /// Compare the decoded content against `name`, optionally followed by a
    /// single `suffix` character, without materializing a string.
    pub fn matches(&self, name: &str, suffix: Option<char>) -> bool {
        let mut expected = name.encode_utf16().collect::<Vec<u16>>();
        if let Some(c) = suffix {
            let mut buf = [0u16; 2];
            expected.extend_from_slice(c.encode_utf16(&mut buf));
        }
        let mut index = 0;
        let mut ok = true;
        self.decode(|unit| {
            if index >= expected.len() || expected[index] != unit {
                ok = false;
            }
            index += 1;
        });
        ok && index == expected.len()
    }

    /// Decode the view as UTF-16 code units, calling `f` for each unit.
    fn decode(&self, mut f: impl FnMut(u16)) {
        let slice = self.as_slice();
        let mut i = 0;
        while i < slice.len() {
            let len = utf8_sequence_len(slice[i]).clamp(1, 4);
            let mut cp = slice[i] as u32 & INITIAL_BYTE_BITMASK[len - 1];
            for _ in 1..len {
                i += 1;
                if i >= slice.len() {
                    break;
                }
                cp = (cp << 6) + (slice[i] as u32 & SUBSEQUENT_BYTE_BITMASK);
            }
            i += 1;
            if cp <= 0xFFFF {
                f(cp as u16);
            } else {
                f(((cp >> 10) + 0xD7C0) as u16);
                f(((cp & 0x3FF) + 0xDC00) as u16);
            }
        }
    }
}

impl PartialEq for AsciiBytes {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for AsciiBytes {}

impl Hash for AsciiBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.java_hash());
    }
}

impl fmt::Display for AsciiBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for AsciiBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsciiBytes({:?})", self.as_str())
    }
}

impl From<&str> for AsciiBytes {
    fn from(s: &str) -> Self {
        AsciiBytes::new(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for AsciiBytes {
    fn from(v: Vec<u8>) -> Self {
        AsciiBytes::new(v)
    }
}

/// A start/end view into a shared string, allowing substring and prefix
/// checks without copying the underlying text.
///
/// Equality and hash are content-based, never identity-based; the hash is
/// compatible with [`string_hash`] and cached after first use.
#[derive(Clone)]
pub struct StringSequence {
    source: Arc<str>,
    start: usize,
    end: usize,
    hash: OnceLock<i32>,
}

impl StringSequence {
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        let end = source.len();
        Self {
            source,
            start: 0,
            end,
            hash: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_str(&self) -> &str {
        &self.source[self.start..self.end]
    }

    /// A sub-view over `[start..end)` byte offsets of this view.
    ///
    /// # Panics
    ///
    /// Panics if the offsets are out of bounds or split a UTF-8 sequence.
    pub fn subsequence(&self, start: usize, end: usize) -> StringSequence {
        assert!(start <= end && end <= self.len(), "range out of bounds");
        // Validate char boundaries eagerly rather than on later access.
        let _ = &self.source[self.start + start..self.start + end];
        StringSequence {
            source: self.source.clone(),
            start: self.start + start,
            end: self.start + end,
            hash: OnceLock::new(),
        }
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }

    pub fn index_of(&self, pat: char) -> Option<usize> {
        self.as_str().find(pat)
    }

    pub fn index_of_str(&self, pat: &str, from: usize) -> Option<usize> {
        self.as_str().get(from..).and_then(|s| s.find(pat)).map(|i| i + from)
    }

    pub fn java_hash(&self) -> i32 {
        *self.hash.get_or_init(|| string_hash(self.as_str()))
    }
}

impl PartialEq for StringSequence {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for StringSequence {}

impl PartialEq<str> for StringSequence {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl Hash for StringSequence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i32(self.java_hash());
    }
}

impl fmt::Display for StringSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for StringSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringSequence({:?})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference_for_ascii() {
        let b = AsciiBytes::from("META-INF/MANIFEST.MF");
        assert_eq!(b.java_hash(), string_hash("META-INF/MANIFEST.MF"));
    }

    #[test]
    fn hash_matches_reference_for_multibyte() {
        for s in ["caffè.txt", "日本語/エントリ.class", "mixed-αβγ-1.2"] {
            let b = AsciiBytes::new(s.as_bytes().to_vec());
            assert_eq!(b.java_hash(), string_hash(s), "hash mismatch for {s}");
        }
    }

    #[test]
    fn hash_matches_reference_for_supplementary_code_points() {
        // U+1F600 encodes as a surrogate pair; both paths must agree.
        let s = "emoji-😀.bin";
        let b = AsciiBytes::new(s.as_bytes().to_vec());
        assert_eq!(b.java_hash(), string_hash(s));
    }

    #[test]
    fn equality_is_bytewise() {
        let a = AsciiBytes::from("lib/foo.jar");
        let b = AsciiBytes::new(b"lib/foo.jar".to_vec());
        let c = AsciiBytes::from("lib/bar.jar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn slicing_shares_the_buffer() {
        let a = AsciiBytes::from("LIB-INF/core-1.0.0.jar");
        let name = a.slice(8, a.len());
        assert_eq!(name.as_str(), "core-1.0.0.jar");
        assert!(name.starts_with(b"core"));
        assert!(name.ends_with(b".jar"));
    }

    #[test]
    fn matches_compares_without_materializing() {
        let a = AsciiBytes::from("com/acme/Impl.class");
        assert!(a.matches("com/acme/Impl.class", None));
        assert!(a.matches("com/acme/Impl.clas", Some('s')));
        assert!(!a.matches("com/acme/Impl.class", Some('/')));
        assert!(!a.matches("com/acme/Impl", None));
    }

    #[test]
    fn string_sequence_substring_and_prefix() {
        let s = StringSequence::new("envelope:outer.jar!LIB-INF/a.jar");
        let tail = s.subsequence(9, s.len());
        assert_eq!(tail.as_str(), "outer.jar!LIB-INF/a.jar");
        assert!(tail.starts_with("outer"));
        assert_eq!(tail.index_of('!'), Some(9));
        assert_eq!(tail.java_hash(), string_hash("outer.jar!LIB-INF/a.jar"));
    }

    #[test]
    fn string_sequence_equality_is_content_based() {
        let a = StringSequence::new("abcabc").subsequence(0, 3);
        let b = StringSequence::new("abcabc").subsequence(3, 6);
        assert_eq!(a, b);
        assert_eq!(a.java_hash(), b.java_hash());
    }
}
