//! Simulated graphics address space.
//!
//! Every buffer object gets a page-aligned range of graphics addresses from a bump allocator.
//! The executor only ever sees graphics addresses; handles are resolved by the device when it
//! patches relocations.

use std::collections::BTreeMap;
use std::ops::Range;

use rendercopy::{BufferHandle, Domains};

use crate::error::{MemoryError, SimError};

pub const PAGE_SIZE: u64 = 4096;

/// First address handed out. Address 0 stays unmapped so a missing relocation faults.
pub const GTT_BASE: u64 = 0x10_0000;

/// Access to memory by graphics address.
pub trait GpuMemory {
    fn read(&self, address: u64, dst: &mut [u8]) -> Result<(), MemoryError>;
    fn write(&mut self, address: u64, src: &[u8]) -> Result<(), MemoryError>;

    fn read_u32(&self, address: u64) -> Result<u32, MemoryError> {
        let mut bytes = [0u8; 4];
        self.read(address, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn write_u32(&mut self, address: u64, value: u32) -> Result<(), MemoryError> {
        self.write(address, &value.to_le_bytes())
    }
}

/// Domains a buffer was last used through by a submitted batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomainState {
    pub read_domains: Domains,
    pub write_domain: Domains,
}

#[derive(Debug)]
pub(crate) struct SimBuffer {
    pub(crate) address: u64,
    pub(crate) data: Vec<u8>,
    pub(crate) domains: DomainState,
}

/// Buffer objects placed in a flat graphics address space.
#[derive(Debug)]
pub struct Gtt {
    next_handle: u32,
    next_address: u64,
    buffers: BTreeMap<BufferHandle, SimBuffer>,
    /// Buffer start address -> handle.
    placements: BTreeMap<u64, BufferHandle>,
}

impl Default for Gtt {
    fn default() -> Self {
        Self::new()
    }
}

impl Gtt {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            next_address: GTT_BASE,
            buffers: BTreeMap::new(),
            placements: BTreeMap::new(),
        }
    }

    /// Allocate a zeroed buffer of `size` bytes and place it at the next free page.
    pub fn allocate(&mut self, size: u64) -> Result<BufferHandle, SimError> {
        let len = usize::try_from(size).map_err(|_| SimError::TooLarge(size))?;
        let span = size.max(1).next_multiple_of(PAGE_SIZE);
        let address = self.next_address;
        self.next_address = address.checked_add(span).ok_or(SimError::TooLarge(size))?;

        let handle = BufferHandle(self.next_handle);
        self.next_handle += 1;
        self.buffers.insert(
            handle,
            SimBuffer {
                address,
                data: vec![0u8; len],
                domains: DomainState::default(),
            },
        );
        self.placements.insert(address, handle);
        tracing::trace!(?handle, address, size, "placed buffer");
        Ok(handle)
    }

    pub fn address(&self, handle: BufferHandle) -> Option<u64> {
        self.buffers.get(&handle).map(|b| b.address)
    }

    pub fn size(&self, handle: BufferHandle) -> Option<u64> {
        self.buffers.get(&handle).map(|b| b.data.len() as u64)
    }

    pub fn domains(&self, handle: BufferHandle) -> Option<DomainState> {
        self.buffers.get(&handle).map(|b| b.domains)
    }

    pub(crate) fn buffer(&self, handle: BufferHandle) -> Result<&SimBuffer, SimError> {
        self.buffers.get(&handle).ok_or(SimError::UnknownBuffer(handle))
    }

    pub(crate) fn buffer_mut(&mut self, handle: BufferHandle) -> Result<&mut SimBuffer, SimError> {
        self.buffers.get_mut(&handle).ok_or(SimError::UnknownBuffer(handle))
    }

    /// Byte range of a buffer's data, by handle.
    pub fn bytes(&self, handle: BufferHandle, offset: u64, len: usize) -> Result<&[u8], SimError> {
        let buf = self.buffer(handle)?;
        let range = checked_range(buf.data.len(), offset, len).ok_or(SimError::OutOfBounds {
            handle,
            offset,
            len,
            size: buf.data.len() as u64,
        })?;
        Ok(&buf.data[range])
    }

    pub fn bytes_mut(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        len: usize,
    ) -> Result<&mut [u8], SimError> {
        let buf = self.buffer_mut(handle)?;
        let size = buf.data.len();
        let range = checked_range(size, offset, len).ok_or(SimError::OutOfBounds {
            handle,
            offset,
            len,
            size: size as u64,
        })?;
        Ok(&mut buf.data[range])
    }

    fn locate(
        &self,
        address: u64,
        len: usize,
    ) -> Result<(BufferHandle, Range<usize>), MemoryError> {
        let unmapped = MemoryError { address, len };
        let (&start, &handle) = self
            .placements
            .range(..=address)
            .next_back()
            .ok_or(unmapped.clone())?;
        let buf = self.buffers.get(&handle).ok_or(unmapped.clone())?;
        let range = checked_range(buf.data.len(), address - start, len).ok_or(unmapped)?;
        Ok((handle, range))
    }
}

fn checked_range(size: usize, offset: u64, len: usize) -> Option<Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(len)?;
    (end <= size).then_some(start..end)
}

impl GpuMemory for Gtt {
    fn read(&self, address: u64, dst: &mut [u8]) -> Result<(), MemoryError> {
        let (handle, range) = self.locate(address, dst.len())?;
        let buf = &self.buffers[&handle];
        dst.copy_from_slice(&buf.data[range]);
        Ok(())
    }

    fn write(&mut self, address: u64, src: &[u8]) -> Result<(), MemoryError> {
        let (handle, range) = self.locate(address, src.len())?;
        let buf = self.buffers.get_mut(&handle).ok_or(MemoryError {
            address,
            len: src.len(),
        })?;
        buf.data[range].copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_get_disjoint_page_aligned_addresses() {
        let mut gtt = Gtt::new();
        let a = gtt.allocate(100).unwrap();
        let b = gtt.allocate(8192).unwrap();
        let c = gtt.allocate(0).unwrap();
        assert_eq!(gtt.address(a), Some(GTT_BASE));
        assert_eq!(gtt.address(b), Some(GTT_BASE + 4096));
        assert_eq!(gtt.address(c), Some(GTT_BASE + 3 * 4096));
        assert_ne!(a, b);
    }

    #[test]
    fn reads_and_writes_by_address_stay_inside_buffers() {
        let mut gtt = Gtt::new();
        let a = gtt.allocate(16).unwrap();
        let base = gtt.address(a).unwrap();

        gtt.write_u32(base + 12, 0xfeed_f00d).unwrap();
        assert_eq!(gtt.read_u32(base + 12), Ok(0xfeed_f00d));
        assert_eq!(gtt.bytes(a, 12, 4).unwrap(), &[0x0d, 0xf0, 0xed, 0xfe]);

        // Past the end of the buffer but inside its page.
        assert_eq!(gtt.read_u32(base + 14), Err(MemoryError { address: base + 14, len: 4 }));
        assert!(gtt.read_u32(0).is_err());
    }

    #[test]
    fn unknown_handles_are_errors() {
        let gtt = Gtt::new();
        assert_eq!(
            gtt.bytes(BufferHandle(42), 0, 1),
            Err(SimError::UnknownBuffer(BufferHandle(42)))
        );
    }
}
