// SPDX-License-Identifier: Apache-2.0

//! The remote memory chunk table: a static map of remote memory, fixed at
//! session establishment and addressed by a page offset's high bits.

use crate::Error;
use rswap_config::layout::split_offset;

/// Lifecycle state of one [`RemoteChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// No remote region has been bound to this slot yet.
    Empty,
    /// A remote region is bound and addressable.
    Mapped,
}

/// A fixed-size partition of remote memory.
///
/// Once `state` becomes `Mapped`, `remote_addr` and `remote_key` are
/// immutable until session teardown.
#[derive(Debug, Clone, Copy)]
pub struct RemoteChunk {
    remote_addr: u64,
    remote_key: u32,
    mapped_size: u64,
    state: ChunkState,
}

impl RemoteChunk {
    const fn empty() -> Self {
        Self {
            remote_addr: 0,
            remote_key: 0,
            mapped_size: 0,
            state: ChunkState::Empty,
        }
    }

    /// The chunk's remote base address, meaningful only when `Mapped`.
    #[must_use]
    pub fn remote_addr(&self) -> u64 {
        self.remote_addr
    }

    /// The chunk's remote access key, meaningful only when `Mapped`.
    #[must_use]
    pub fn remote_key(&self) -> u32 {
        self.remote_key
    }

    /// The chunk's mapped byte size.
    #[must_use]
    pub fn mapped_size(&self) -> u64 {
        self.mapped_size
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChunkState {
        self.state
    }
}

/// An ordered sequence of [`RemoteChunk`]s, sized to
/// `mem_size_gb / REGION_SIZE_GB` and capped at `MAX_REGION_NUM`.
#[derive(Debug)]
pub struct ChunkTable {
    chunks: Vec<RemoteChunk>,
}

impl ChunkTable {
    /// Creates a table of `len` unmapped chunks.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            chunks: vec![RemoteChunk::empty(); len],
        }
    }

    /// Number of chunk slots in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the table has no slots at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Binds a remote region to chunk `idx`. Once mapped, the chunk's
    /// address and key never change; calling this again on an already
    /// mapped chunk re-maps it (used only during session re-establishment).
    pub fn map(
        &mut self,
        idx: usize,
        remote_addr: u64,
        remote_key: u32,
        mapped_size: u64,
    ) -> Result<(), Error> {
        let len = self.chunks.len();
        let chunk = self
            .chunks
            .get_mut(idx)
            .ok_or(Error::ChunkIndexOutOfRange { idx, len })?;
        *chunk = RemoteChunk {
            remote_addr,
            remote_key,
            mapped_size,
            state: ChunkState::Mapped,
        };
        Ok(())
    }

    /// Resolves a page offset to `(chunk_idx, offset_in_chunk)` and returns
    /// the mapped chunk, failing if the index is out of range or unmapped.
    pub fn resolve(&self, page_offset: u64) -> Result<(usize, u64, &RemoteChunk), Error> {
        let (idx, offset_in_chunk) = split_offset(page_offset);
        let len = self.chunks.len();
        let chunk = self
            .chunks
            .get(idx)
            .ok_or(Error::ChunkIndexOutOfRange { idx, len })?;
        if chunk.state != ChunkState::Mapped {
            return Err(Error::ChunkNotMapped { idx });
        }
        Ok((idx, offset_in_chunk, chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_unmapped_and_out_of_range() {
        let table = ChunkTable::new(2);
        assert!(matches!(
            table.resolve(0),
            Err(Error::ChunkNotMapped { idx: 0 })
        ));

        let far_offset = 0x0020_0000u64 * 100;
        assert!(matches!(
            table.resolve(far_offset),
            Err(Error::ChunkIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn resolve_matches_documented_addressing_examples() {
        let mut table = ChunkTable::new(2);
        table.map(0, 0xDEAD_0000, 7, 8 * (1 << 30)).unwrap();
        table.map(1, 0xBEEF_0000, 9, 8 * (1 << 30)).unwrap();

        let (idx, off, chunk) = table.resolve(0x0000_0000).unwrap();
        assert_eq!((idx, off), (0, 0));
        assert_eq!(chunk.remote_key(), 7);

        let (idx, off, _) = table.resolve(0x0020_0000).unwrap();
        assert_eq!((idx, off), (1, 0));

        let (idx, off, _) = table.resolve(0x0020_0001).unwrap();
        assert_eq!((idx, off), (1, rswap_config::layout::PAGE_SIZE));
    }
}
