use std::collections::BTreeMap;

use rendercopy::{
    Arena, ArenaConfig, Batch, BufferHandle, ScratchBuf, SubmissionAdapter, SubmitError, Tiling,
    BYTES_PER_PIXEL,
};

use crate::error::SimError;
use crate::exec::{ExecStats, Executor};
use crate::memory::{DomainState, Gtt};
use crate::tiling::byte_offset;

/// A software gen7 device: buffer manager plus reference executor.
///
/// Implements [`SubmissionAdapter`]: submitted batches are uploaded into their buffer,
/// relocations are patched with simulated graphics addresses and the command stream is executed
/// before `submit` returns.
#[derive(Debug, Default)]
pub struct SimDevice {
    gtt: Gtt,
    submissions: u64,
    last_stats: Option<ExecStats>,
}

impl SimDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_buffer(&mut self, size: u64) -> Result<BufferHandle, SimError> {
        self.gtt.allocate(size)
    }

    /// Allocate backing memory for a `width` x `height` 32bpp image with the given tiling.
    pub fn create_scratch(
        &mut self,
        width: u32,
        height: u32,
        tiling: Tiling,
    ) -> Result<ScratchBuf, SimError> {
        let mut buf = ScratchBuf::tiled(BufferHandle(0), width, height, tiling);
        buf.handle = self.create_buffer(buf.size_bytes())?;
        Ok(buf)
    }

    /// Allocate a batch buffer and an arena that encodes into it.
    pub fn create_arena(&mut self, config: ArenaConfig) -> Result<Arena, SimError> {
        config.validate()?;
        let handle = self.create_buffer(u64::from(config.capacity))?;
        Ok(Arena::new(handle, config)?)
    }

    pub fn address(&self, handle: BufferHandle) -> Option<u64> {
        self.gtt.address(handle)
    }

    /// Domains the most recent batch referencing `handle` used it through.
    pub fn domains(&self, handle: BufferHandle) -> Option<DomainState> {
        self.gtt.domains(handle)
    }

    /// Number of batches executed successfully.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    pub fn last_stats(&self) -> Option<ExecStats> {
        self.last_stats
    }

    pub fn gtt(&self) -> &Gtt {
        &self.gtt
    }

    pub fn write(
        &mut self,
        handle: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), SimError> {
        self.gtt.bytes_mut(handle, offset, data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn read(&self, handle: BufferHandle, offset: u64, dst: &mut [u8]) -> Result<(), SimError> {
        dst.copy_from_slice(self.gtt.bytes(handle, offset, dst.len())?);
        Ok(())
    }

    fn pixel_offset(&self, buf: &ScratchBuf, x: u32, y: u32) -> Result<u64, SimError> {
        if x >= buf.width || y >= buf.height {
            return Err(SimError::PixelOutOfBounds {
                x,
                y,
                width: buf.width,
                height: buf.height,
            });
        }
        Ok(byte_offset(buf.tiling, buf.pitch, x * BYTES_PER_PIXEL, y))
    }

    fn check_backing(&self, buf: &ScratchBuf) -> Result<(), SimError> {
        let size = self.gtt.size(buf.handle).ok_or(SimError::UnknownBuffer(buf.handle))?;
        let needed = buf.size_bytes();
        if size < needed {
            return Err(SimError::SurfaceTooSmall {
                handle: buf.handle,
                needed,
                size,
            });
        }
        Ok(())
    }

    pub fn read_pixel(&self, buf: &ScratchBuf, x: u32, y: u32) -> Result<u32, SimError> {
        let offset = self.pixel_offset(buf, x, y)?;
        let mut bytes = [0u8; 4];
        self.read(buf.handle, offset, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn write_pixel(
        &mut self,
        buf: &ScratchBuf,
        x: u32,
        y: u32,
        value: u32,
    ) -> Result<(), SimError> {
        let offset = self.pixel_offset(buf, x, y)?;
        self.write(buf.handle, offset, &value.to_le_bytes())
    }

    /// Set every pixel of `buf` to `f(x, y)`.
    pub fn fill_pixels(
        &mut self,
        buf: &ScratchBuf,
        mut f: impl FnMut(u32, u32) -> u32,
    ) -> Result<(), SimError> {
        self.check_backing(buf)?;
        for y in 0..buf.height {
            for x in 0..buf.width {
                self.write_pixel(buf, x, y, f(x, y))?;
            }
        }
        Ok(())
    }

    /// All pixels of `buf` in row-major order, independent of tiling.
    pub fn read_pixels(&self, buf: &ScratchBuf) -> Result<Vec<u32>, SimError> {
        self.check_backing(buf)?;
        let mut out = Vec::with_capacity(buf.width as usize * buf.height as usize);
        for y in 0..buf.height {
            for x in 0..buf.width {
                out.push(self.read_pixel(buf, x, y)?);
            }
        }
        Ok(out)
    }

    fn upload(&mut self, batch: &Batch<'_>) -> Result<u64, SubmitError> {
        let size = self.gtt.size(batch.handle).ok_or(SubmitError::UnknownBuffer(batch.handle))?;
        if (batch.bytes.len() as u64) > size || batch.len as usize > batch.bytes.len() {
            return Err(SubmitError::BatchTooLarge {
                len: batch.bytes.len(),
                capacity: size as usize,
            });
        }
        let mut image = batch.bytes.to_vec();

        for reloc in batch.all_relocations() {
            let address = self
                .gtt
                .address(reloc.target)
                .ok_or(SubmitError::UnknownBuffer(reloc.target))?;
            let at = reloc.offset as usize;
            let word = image
                .get_mut(at..at + 4)
                .ok_or(SubmitError::RelocationOutOfBounds {
                    offset: reloc.offset,
                    len: batch.bytes.len() as u32,
                })?;
            word.copy_from_slice(&reloc.resolve(address).to_le_bytes());
            tracing::trace!(
                offset = reloc.offset,
                target = ?reloc.target,
                address,
                "resolved relocation"
            );
        }

        // Only record domains once every relocation resolved. A buffer named by several
        // relocations in one batch carries the union of their domains.
        let mut domains: BTreeMap<BufferHandle, DomainState> = BTreeMap::new();
        for reloc in batch.relocations {
            let state = domains.entry(reloc.target).or_default();
            state.read_domains |= reloc.read_domains;
            state.write_domain |= reloc.write_domain;
        }
        for (handle, state) in domains {
            if let Ok(buf) = self.gtt.buffer_mut(handle) {
                buf.domains = state;
            }
        }

        let buf = self
            .gtt
            .buffer_mut(batch.handle)
            .map_err(|_| SubmitError::UnknownBuffer(batch.handle))?;
        buf.data[..image.len()].copy_from_slice(&image);
        Ok(buf.address)
    }
}

impl SubmissionAdapter for SimDevice {
    fn submit(&mut self, batch: &Batch<'_>) -> Result<(), SubmitError> {
        let address = self.upload(batch).inspect_err(|err| {
            tracing::warn!(handle = ?batch.handle, %err, "rejected batch");
        })?;

        let stats = Executor::new(&mut self.gtt)
            .execute(address, batch.len)
            .map_err(|err| {
                tracing::warn!(handle = ?batch.handle, %err, "batch execution failed");
                SubmitError::Execution(err.to_string())
            })?;
        tracing::debug!(
            handle = ?batch.handle,
            commands = stats.commands,
            pixels = stats.pixels_written,
            "executed batch"
        );
        self.submissions += 1;
        self.last_stats = Some(stats);
        Ok(())
    }
}
