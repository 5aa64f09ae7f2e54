//! Boundary between the encoder and whatever executes the finished batch.

use crate::arena::Arena;
use crate::buf::BufferHandle;
use crate::error::{ArenaError, SubmitError};
use crate::reloc::Relocation;

/// A finished batch ready for submission.
///
/// Borrowed from the arena that built it; the arena cannot be reused until the batch is
/// dropped.
#[derive(Clone, Copy, Debug)]
pub struct Batch<'a> {
    /// Buffer object the arena contents are uploaded into.
    pub handle: BufferHandle,
    /// Whole arena contents. State records live past `len`.
    pub bytes: &'a [u8],
    /// Length of the command region in bytes (8-byte aligned, below the split).
    pub len: u32,
    /// Relocations against buffers the copy reads or writes.
    pub relocations: &'a [Relocation],
    /// Relocations of the base-address words, targeting [`handle`](Self::handle).
    pub base_relocations: &'a [Relocation],
}

impl<'a> Batch<'a> {
    /// View a finished arena as a batch.
    pub fn from_arena(arena: &'a Arena) -> Result<Self, ArenaError> {
        let len = arena.batch_end().ok_or(ArenaError::NotFinished)?;
        Ok(Self {
            handle: arena.handle(),
            bytes: arena.as_bytes(),
            len,
            relocations: arena.relocations(),
            base_relocations: arena.base_relocations(),
        })
    }

    /// The command region.
    pub fn commands(&self) -> &'a [u8] {
        &self.bytes[..self.len as usize]
    }

    /// All relocations, base-address words first.
    pub fn all_relocations(&self) -> impl Iterator<Item = &'a Relocation> + 'a {
        self.base_relocations.iter().chain(self.relocations)
    }
}

/// Uploads a batch, resolves its relocations and executes it.
///
/// Submission is synchronous: when `submit` returns the arena may be reset and reused.
pub trait SubmissionAdapter {
    fn submit(&mut self, batch: &Batch<'_>) -> Result<(), SubmitError>;
}

impl<T: SubmissionAdapter + ?Sized> SubmissionAdapter for &mut T {
    fn submit(&mut self, batch: &Batch<'_>) -> Result<(), SubmitError> {
        (**self).submit(batch)
    }
}

impl<T: SubmissionAdapter + ?Sized> SubmissionAdapter for Box<T> {
    fn submit(&mut self, batch: &Batch<'_>) -> Result<(), SubmitError> {
        (**self).submit(batch)
    }
}
