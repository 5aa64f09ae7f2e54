use std::fmt;

use bytemuck::Pod;

use crate::buf::BufferHandle;
use crate::error::ArenaError;
use crate::reloc::Relocation;

/// Smallest alignment the state region hands out; matches the vertex-fetch granularity.
pub const MIN_STATE_ALIGN: u32 = 8;

/// Alignment of the finished command region.
pub const BATCH_END_ALIGN: u32 = 8;

const CMD_WORD_BYTES: u32 = 4;

/// Round `value` up to the nearest multiple of `alignment`.
///
/// `alignment` must be a power of two.
pub(crate) fn align_up(value: u32, alignment: u32) -> Option<u32> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

/// Size and split of a batch arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Total bytes of the batch buffer.
    pub capacity: u32,
    /// Offset dividing the command region `[0, split)` from the state region `[split, capacity)`.
    pub split: u32,
}

impl ArenaConfig {
    /// One page, split in half.
    pub const DEFAULT: Self = Self {
        capacity: 4096,
        split: 2048,
    };

    pub fn validate(&self) -> Result<(), ArenaError> {
        let ok = self.split > 0
            && self.split < self.capacity
            && self.split % 64 == 0
            && self.capacity % 64 == 0;
        if ok {
            Ok(())
        } else {
            Err(ArenaError::BadLayout {
                capacity: self.capacity,
                split: self.split,
            })
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Fixed-size batch buffer holding both the command stream and the state it points at.
///
/// Commands grow upward from offset 0; state records grow upward from the split offset. Both
/// live in one contiguous byte array so every state pointer is a plain offset from the start of
/// the batch, and the whole arena is uploaded as a single buffer object.
///
/// Invariant: `cmd_cursor <= split <= state_cursor <= capacity`.
pub struct Arena {
    handle: BufferHandle,
    bytes: Box<[u8]>,
    split: u32,
    cmd_cursor: u32,
    state_cursor: u32,
    pub(crate) relocs: Vec<Relocation>,
    pub(crate) base_relocs: Vec<Relocation>,
    batch_end: Option<u32>,
}

impl Arena {
    /// Create an arena backed by the buffer object `handle`.
    pub fn new(handle: BufferHandle, config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self {
            handle,
            bytes: vec![0u8; config.capacity as usize].into_boxed_slice(),
            split: config.split,
            cmd_cursor: 0,
            state_cursor: config.split,
            relocs: Vec::new(),
            base_relocs: Vec::new(),
            batch_end: None,
        })
    }

    /// Buffer object the arena is uploaded into.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn capacity(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn split(&self) -> u32 {
        self.split
    }

    pub fn cmd_cursor(&self) -> u32 {
        self.cmd_cursor
    }

    pub fn state_cursor(&self) -> u32 {
        self.state_cursor
    }

    /// Rewind both cursors, zero the buffer and drop all recorded relocations.
    pub fn reset(&mut self) {
        self.bytes.fill(0);
        self.cmd_cursor = 0;
        self.state_cursor = self.split;
        self.relocs.clear();
        self.base_relocs.clear();
        self.batch_end = None;
    }

    /// Whole arena contents, command and state regions included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Command words written so far.
    pub fn command_bytes(&self) -> &[u8] {
        &self.bytes[..self.cmd_cursor as usize]
    }

    /// Relocations recorded against command words and state records.
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocs
    }

    /// Relocations of the base-address words, which always target the arena's own buffer.
    pub fn base_relocations(&self) -> &[Relocation] {
        &self.base_relocs
    }

    /// End of the finished command region, once [`finish`](Self::finish) succeeded.
    pub fn batch_end(&self) -> Option<u32> {
        self.batch_end
    }

    /// Read back a little-endian word at `offset`.
    pub fn read_u32(&self, offset: u32) -> Option<u32> {
        let start = offset as usize;
        let bytes = self.bytes.get(start..start.checked_add(4)?)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    fn check_open(&self) -> Result<(), ArenaError> {
        if self.batch_end.is_some() {
            return Err(ArenaError::Sealed);
        }
        Ok(())
    }

    /// Fail unless `dwords` more command words fit below the split offset.
    ///
    /// Encoders call this before writing a command so that a command is either emitted whole or
    /// not at all.
    pub fn ensure_command_space(&self, dwords: u32) -> Result<(), ArenaError> {
        self.check_open()?;
        let len = dwords.saturating_mul(CMD_WORD_BYTES);
        match self.cmd_cursor.checked_add(len) {
            Some(end) if end < self.split => Ok(()),
            _ => Err(ArenaError::CommandOverflow {
                cursor: self.cmd_cursor,
                len,
                split: self.split,
            }),
        }
    }

    /// Append one command word.
    pub fn emit(&mut self, word: u32) -> Result<(), ArenaError> {
        self.ensure_command_space(1)?;
        let at = self.cmd_cursor as usize;
        self.bytes[at..at + 4].copy_from_slice(&word.to_le_bytes());
        self.cmd_cursor += CMD_WORD_BYTES;
        Ok(())
    }

    /// Append a whole command, or nothing if it does not fit.
    pub fn emit_all(&mut self, words: &[u32]) -> Result<(), ArenaError> {
        self.ensure_command_space(words.len() as u32)?;
        for &word in words {
            self.emit(word)?;
        }
        Ok(())
    }

    /// Reserve `size` zeroed bytes in the state region aligned to `alignment`.
    ///
    /// Returns the arena-relative offset of the allocation. `alignment` must be a power of two
    /// no smaller than [`MIN_STATE_ALIGN`].
    pub fn alloc_state(&mut self, size: u32, alignment: u32) -> Result<u32, ArenaError> {
        self.check_open()?;
        if !alignment.is_power_of_two() || alignment < MIN_STATE_ALIGN {
            return Err(ArenaError::BadAlignment(alignment));
        }

        let capacity = self.capacity();
        let overflow = ArenaError::StateOverflow {
            offset: self.state_cursor,
            size,
            capacity,
        };
        let offset = align_up(self.state_cursor, alignment).ok_or(overflow.clone())?;
        let end = offset.checked_add(size).ok_or(overflow.clone())?;
        if end > capacity {
            return Err(overflow);
        }
        debug_assert_eq!(offset % alignment, 0);

        self.bytes[offset as usize..end as usize].fill(0);
        self.state_cursor = end;
        Ok(offset)
    }

    /// Allocate a state record and initialize it from `value`.
    pub fn alloc_state_with<T: Pod>(
        &mut self,
        value: &T,
        alignment: u32,
    ) -> Result<u32, ArenaError> {
        self.copy_state(bytemuck::bytes_of(value), alignment)
    }

    /// Allocate a state record holding a copy of `data`.
    pub fn copy_state(&mut self, data: &[u8], alignment: u32) -> Result<u32, ArenaError> {
        let offset = self.alloc_state(data.len() as u32, alignment)?;
        self.bytes[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(offset)
    }

    /// Overwrite a word inside an already allocated state record.
    pub(crate) fn write_state_u32(&mut self, offset: u32, value: u32) -> Result<(), ArenaError> {
        if !self.state_range_allocated(offset, 4) {
            return Err(ArenaError::StateOutOfBounds { offset, len: 4 });
        }
        let at = offset as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub(crate) fn state_range_allocated(&self, offset: u32, len: u32) -> bool {
        offset >= self.split
            && offset
                .checked_add(len)
                .is_some_and(|end| end <= self.state_cursor)
    }

    /// Seal the command region.
    ///
    /// Rounds the command length up to [`BATCH_END_ALIGN`] (the padding is already zero, i.e.
    /// `MI_NOOP`), checks that it stays strictly below the split offset and that every
    /// relocation lies inside the region it patches. Returns the batch length in bytes.
    pub fn finish(&mut self) -> Result<u32, ArenaError> {
        self.check_open()?;
        let end = align_up(self.cmd_cursor, BATCH_END_ALIGN).unwrap_or(u32::MAX);
        if end >= self.split {
            return Err(ArenaError::BatchTooLong {
                end,
                split: self.split,
            });
        }

        for reloc in self.relocs.iter().chain(&self.base_relocs) {
            let in_commands = reloc.offset.checked_add(4).is_some_and(|e| e <= self.cmd_cursor);
            let in_state = self.state_range_allocated(reloc.offset, 4);
            if !in_commands && !in_state {
                return Err(ArenaError::StrayRelocation(reloc.offset));
            }
        }

        self.batch_end = Some(end);
        Ok(end)
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("handle", &self.handle)
            .field("capacity", &self.capacity())
            .field("split", &self.split)
            .field("cmd_cursor", &self.cmd_cursor)
            .field("state_cursor", &self.state_cursor)
            .field("relocs", &self.relocs.len())
            .field("batch_end", &self.batch_end)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Arena {
        Arena::new(BufferHandle(1), ArenaConfig::DEFAULT).unwrap()
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(2048, 64), Some(2048));
        assert_eq!(align_up(2049, 64), Some(2112));
        assert_eq!(align_up(u32::MAX, 8), None);
    }

    #[test]
    fn bad_layouts_are_rejected() {
        let layouts = [(4096, 0), (4096, 4096), (4096, 5000), (4096, 100), (4100, 2048)];
        for (capacity, split) in layouts {
            let err = Arena::new(BufferHandle(1), ArenaConfig { capacity, split }).unwrap_err();
            assert_eq!(err, ArenaError::BadLayout { capacity, split });
        }
    }

    #[test]
    fn emit_appends_little_endian_words() {
        let mut a = arena();
        a.emit(0x1122_3344).unwrap();
        a.emit(5).unwrap();
        assert_eq!(a.cmd_cursor(), 8);
        assert_eq!(a.command_bytes(), &[0x44, 0x33, 0x22, 0x11, 5, 0, 0, 0]);
    }

    #[test]
    fn emit_refuses_to_reach_split() {
        let mut a = Arena::new(BufferHandle(1), ArenaConfig { capacity: 128, split: 64 }).unwrap();
        for i in 0..15 {
            a.emit(i).unwrap();
        }
        assert_eq!(a.cmd_cursor(), 60);
        assert_eq!(
            a.emit(15),
            Err(ArenaError::CommandOverflow {
                cursor: 60,
                len: 4,
                split: 64
            })
        );
        assert_eq!(a.cmd_cursor(), 60);
    }

    #[test]
    fn emit_all_is_all_or_nothing() {
        let mut a = Arena::new(BufferHandle(1), ArenaConfig { capacity: 128, split: 64 }).unwrap();
        a.emit_all(&[1; 12]).unwrap();
        assert!(a.emit_all(&[2; 4]).is_err());
        assert_eq!(a.cmd_cursor(), 48);
        assert_eq!(a.read_u32(48), Some(0));
    }

    #[test]
    fn alloc_state_respects_alignment_and_capacity() {
        let mut a = Arena::new(BufferHandle(1), ArenaConfig { capacity: 256, split: 128 }).unwrap();

        assert_eq!(a.alloc_state(4, 8).unwrap(), 128);
        assert_eq!(a.alloc_state(8, 32).unwrap(), 160);
        assert_eq!(a.alloc_state(16, 64).unwrap(), 192);
        assert_eq!(a.state_cursor(), 208);

        let err = a.alloc_state(64, 8).unwrap_err();
        assert_eq!(
            err,
            ArenaError::StateOverflow {
                offset: 208,
                size: 64,
                capacity: 256
            }
        );
        assert_eq!(a.state_cursor(), 208);
    }

    #[test]
    fn alloc_state_rejects_bad_alignment() {
        let mut a = arena();
        assert_eq!(a.alloc_state(4, 4), Err(ArenaError::BadAlignment(4)));
        assert_eq!(a.alloc_state(4, 24), Err(ArenaError::BadAlignment(24)));
        assert_eq!(a.alloc_state(4, 0), Err(ArenaError::BadAlignment(0)));
    }

    #[test]
    fn alloc_state_zero_fills_reused_space() {
        let mut a = arena();
        let off = a.copy_state(&[0xAA; 16], 32).unwrap();
        a.reset();
        assert_eq!(a.alloc_state(16, 32).unwrap(), off);
        assert!(a.as_bytes()[off as usize..off as usize + 16].iter().all(|&b| b == 0));
    }

    #[test]
    fn reset_rewinds_both_cursors() {
        let mut a = arena();
        a.emit(1).unwrap();
        a.alloc_state(32, 32).unwrap();
        a.finish().unwrap();

        a.reset();
        assert_eq!(a.cmd_cursor(), 0);
        assert_eq!(a.state_cursor(), a.split());
        assert_eq!(a.batch_end(), None);
        assert!(a.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn finish_aligns_end_and_seals() {
        let mut a = arena();
        a.emit_all(&[1, 2, 3]).unwrap();
        assert_eq!(a.finish(), Ok(16));
        assert_eq!(a.batch_end(), Some(16));
        assert_eq!(a.emit(4), Err(ArenaError::Sealed));
        assert_eq!(a.alloc_state(8, 8), Err(ArenaError::Sealed));
    }

    #[test]
    fn finish_rejects_end_rounding_onto_split() {
        let mut a = Arena::new(BufferHandle(1), ArenaConfig { capacity: 128, split: 64 }).unwrap();
        a.emit_all(&[0; 15]).unwrap();
        assert_eq!(a.finish(), Err(ArenaError::BatchTooLong { end: 64, split: 64 }));
    }
}
