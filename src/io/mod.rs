mod local;
mod region;

pub use local::FileReader;
pub use region::{MemoryReader, RegionReader};

use crate::error::Result;

/// Trait for random access reading from an archive byte source.
///
/// Reads are positioned and independent: implementations must not share
/// mutable cursor state between calls, so multiple entry streams can read
/// the same source concurrently.
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source.
    fn size(&self) -> u64;

    /// Fill the whole buffer starting at the specified offset.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut read = 0;
        while read < buf.len() {
            let n = self.read_at(offset + read as u64, &mut buf[read..])?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("unexpected end of data at offset {}", offset + read as u64),
                )
                .into());
            }
            read += n;
        }
        Ok(())
    }
}
