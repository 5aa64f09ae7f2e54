//! Deferred address fix-ups.
//!
//! A relocation marks a word of the arena that must hold the graphics address of another buffer
//! object. The encoder writes the delta as a placeholder; the submission adapter patches in
//! `address(target) + delta` once the buffer's placement is known.

use bitflags::bitflags;

use crate::arena::Arena;
use crate::buf::BufferHandle;
use crate::error::ArenaError;

bitflags! {
    /// GPU memory domains a relocation target is accessed through.
    ///
    /// Read domains may be combined; the write domain is a single flag or empty.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
    pub struct Domains: u32 {
        const CPU = 1 << 0;
        const RENDER = 1 << 1;
        const SAMPLER = 1 << 2;
        const COMMAND = 1 << 3;
        const INSTRUCTION = 1 << 4;
        const VERTEX = 1 << 5;
        const GTT = 1 << 6;
    }
}

/// One pending address fix-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// Arena-relative byte offset of the word to patch.
    pub offset: u32,
    pub target: BufferHandle,
    /// Byte offset into `target` the patched address points at.
    pub delta: u32,
    pub read_domains: Domains,
    pub write_domain: Domains,
}

impl Relocation {
    /// Value to store at [`offset`](Self::offset) once `target` lives at `target_address`.
    ///
    /// Gen7 address fields are 32 bits wide; the upper half of the sum is dropped.
    pub fn resolve(&self, target_address: u64) -> u32 {
        target_address.wrapping_add(u64::from(self.delta)) as u32
    }
}

impl Arena {
    /// Emit a command word holding the address of `target` plus `delta`.
    pub fn emit_reloc(
        &mut self,
        target: BufferHandle,
        read_domains: Domains,
        write_domain: Domains,
        delta: u32,
    ) -> Result<(), ArenaError> {
        let offset = self.cmd_cursor();
        self.emit(delta)?;
        tracing::trace!(offset, ?target, delta, "command relocation");
        self.relocs.push(Relocation {
            offset,
            target,
            delta,
            read_domains,
            write_domain,
        });
        Ok(())
    }

    /// Emit a base-address word pointing at the arena's own buffer.
    ///
    /// `flags` are the low bits the command expects alongside the address (the "modify"
    /// enable); they travel through the delta so the patched word keeps them.
    pub(crate) fn emit_base_reloc(
        &mut self,
        read_domains: Domains,
        flags: u32,
    ) -> Result<(), ArenaError> {
        let offset = self.cmd_cursor();
        self.emit(flags)?;
        let target = self.handle();
        self.base_relocs.push(Relocation {
            offset,
            target,
            delta: flags,
            read_domains,
            write_domain: Domains::empty(),
        });
        Ok(())
    }

    /// Make the state word at `offset` hold the address of `target` plus `delta`.
    ///
    /// `offset` must lie inside a record previously returned by
    /// [`alloc_state`](Arena::alloc_state).
    pub fn reloc_state_word(
        &mut self,
        offset: u32,
        target: BufferHandle,
        read_domains: Domains,
        write_domain: Domains,
        delta: u32,
    ) -> Result<(), ArenaError> {
        self.write_state_u32(offset, delta)?;
        tracing::trace!(offset, ?target, delta, "state relocation");
        self.relocs.push(Relocation {
            offset,
            target,
            delta,
            read_domains,
            write_domain,
        });
        Ok(())
    }
}
