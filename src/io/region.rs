use super::ReadAt;
use crate::error::Result;
use std::sync::Arc;

/// A byte-range view over a parent data source.
///
/// This is how a *stored* nested archive is presented as an independent
/// archive without extracting it: the child archive reads through a
/// `RegionReader` that translates offsets into the parent's coordinate
/// space and clamps reads at the region boundary.
pub struct RegionReader {
    parent: Arc<dyn ReadAt>,
    start: u64,
    length: u64,
}

impl RegionReader {
    /// Create a view over `parent[start..start + length]`.
    pub fn new(parent: Arc<dyn ReadAt>, start: u64, length: u64) -> Self {
        Self {
            parent,
            start,
            length,
        }
    }
}

impl ReadAt for RegionReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.length {
            return Ok(0);
        }
        let available = (self.length - offset) as usize;
        let limit = buf.len().min(available);
        self.parent.read_at(self.start + offset, &mut buf[..limit])
    }

    fn size(&self) -> u64 {
        self.length
    }
}

/// An in-memory data source (inflated nested archives, tests).
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl ReadAt for MemoryReader {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if offset >= self.data.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_translates_and_clamps() {
        let parent = Arc::new(MemoryReader::new((0u8..64).collect()));
        let region = RegionReader::new(parent, 10, 20);
        assert_eq!(region.size(), 20);

        let mut buf = [0u8; 5];
        region.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(buf, [10, 11, 12, 13, 14]);

        // Reads past the region end are clamped, not forwarded.
        let mut buf = [0u8; 8];
        let n = region.read_at(16, &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..n], &[26, 27, 28, 29]);
        assert_eq!(region.read_at(20, &mut buf).unwrap(), 0);
    }

    #[test]
    fn nested_regions_compose() {
        let parent = Arc::new(MemoryReader::new((0u8..100).collect()));
        let outer = Arc::new(RegionReader::new(parent, 20, 60));
        let inner = RegionReader::new(outer, 10, 10);
        let mut buf = [0u8; 10];
        inner.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(buf[0], 30);
        assert_eq!(buf[9], 39);
    }
}
