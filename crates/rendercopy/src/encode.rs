//! Per-stage command encoders for the gen7 3D pipeline.
//!
//! Each method appends one fixed-length command (or a tightly coupled pair) to the arena's
//! command region. Space is checked before anything is written, so a stage is either encoded
//! whole or not at all. State records a command points at are allocated before the command.

use crate::arena::Arena;
use crate::buf::ScratchBuf;
use crate::caps::Caps;
use crate::error::{ArenaError, EncodeError};
use crate::gen7::*;
use crate::geometry::{CopyRect, Vertex, COPY_VERTEX_COUNT};
use crate::kernel::PS_DISPATCH_START_GRF;
use crate::reloc::Domains;
use crate::state::{self, SurfaceRole};

/// Offsets of the state records referenced by one encoded copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateOffsets {
    pub blend: u32,
    pub cc_viewport: u32,
    pub sampler: u32,
    pub kernel: u32,
    pub geometry: u32,
    pub dst_surface: u32,
    pub src_surface: u32,
    pub binding_table: u32,
}

/// Encodes the copy pipeline into an arena.
pub struct Gen7Encoder<'a> {
    arena: &'a mut Arena,
    caps: Caps,
    offsets: StateOffsets,
}

impl<'a> Gen7Encoder<'a> {
    pub fn new(arena: &'a mut Arena, caps: Caps) -> Self {
        Self {
            arena,
            caps,
            offsets: StateOffsets::default(),
        }
    }

    pub fn caps(&self) -> &Caps {
        &self.caps
    }

    /// State offsets recorded by the stages encoded so far.
    pub fn offsets(&self) -> StateOffsets {
        self.offsets
    }

    fn emit_command(&mut self, words: &[u32]) -> Result<(), ArenaError> {
        self.arena.emit_all(words)
    }

    pub fn pipeline_select(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("PIPELINE_SELECT");
        self.emit_command(&[PIPELINE_SELECT | PIPELINE_SELECT_3D])
    }

    /// `STATE_BASE_ADDRESS`: surface, dynamic and instruction state are addressed relative to
    /// the batch itself.
    pub fn state_base_address(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("STATE_BASE_ADDRESS");
        self.arena.ensure_command_space(10)?;
        self.arena.emit(header(STATE_BASE_ADDRESS, 10))?;
        // General state.
        self.arena.emit(0)?;
        // Surface state.
        self.arena.emit_base_reloc(Domains::INSTRUCTION, BASE_ADDRESS_MODIFY)?;
        // Dynamic state.
        self.arena.emit_base_reloc(Domains::INSTRUCTION, BASE_ADDRESS_MODIFY)?;
        // Indirect object.
        self.arena.emit(0)?;
        // Instruction.
        self.arena.emit_base_reloc(Domains::INSTRUCTION, BASE_ADDRESS_MODIFY)?;
        // Upper bounds: general, dynamic, indirect, instruction. Zero with modify set disables
        // the check.
        self.arena.emit_all(&[0, BASE_ADDRESS_MODIFY, 0, BASE_ADDRESS_MODIFY])
    }

    pub fn multisample(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_MULTISAMPLE");
        self.arena.ensure_command_space(6)?;
        self.emit_command(&[
            header(_3DSTATE_MULTISAMPLE, 4),
            MULTISAMPLE_PIXEL_LOCATION_CENTER | MULTISAMPLE_NUMSAMPLES_1,
            0,
            0,
        ])?;
        self.emit_command(&[header(_3DSTATE_SAMPLE_MASK, 2), 1])
    }

    /// Give the whole URB to the vertex shader's pass-through entries.
    pub fn urb(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_URB");
        self.arena.ensure_command_space(10)?;
        self.emit_command(&[header(_3DSTATE_PUSH_CONSTANT_ALLOC_PS, 2), 0])?;
        self.emit_command(&[
            header(_3DSTATE_URB_VS, 2),
            (64 << URB_ENTRY_NUMBER_SHIFT)
                | ((2 - 1) << URB_ENTRY_SIZE_SHIFT)
                | (1 << URB_STARTING_ADDRESS_SHIFT),
        ])?;
        self.emit_command(&[header(_3DSTATE_URB_HS, 2), 2 << URB_STARTING_ADDRESS_SHIFT])?;
        self.emit_command(&[header(_3DSTATE_URB_DS, 2), 2 << URB_STARTING_ADDRESS_SHIFT])?;
        self.emit_command(&[header(_3DSTATE_URB_GS, 2), 1 << URB_STARTING_ADDRESS_SHIFT])
    }

    /// Explicitly disable VS, HS, TE, DS and GS.
    pub fn disabled_stages(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("disabled geometry stages");
        const STAGES: [(u32, usize); 5] = [
            (_3DSTATE_VS, 6),
            (_3DSTATE_HS, 7),
            (_3DSTATE_TE, 4),
            (_3DSTATE_DS, 6),
            (_3DSTATE_GS, 7),
        ];
        let total: usize = STAGES.iter().map(|&(_, len)| len).sum();
        self.arena.ensure_command_space(total as u32)?;
        for (id, len) in STAGES {
            let mut words = [0u32; 7];
            words[0] = header(id, len as u32);
            self.emit_command(&words[..len])?;
        }
        Ok(())
    }

    pub fn clip(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_CLIP");
        self.arena.ensure_command_space(6)?;
        self.emit_command(&[header(_3DSTATE_CLIP, 4), 0, 0, 0])?;
        self.emit_command(&[header(_3DSTATE_VIEWPORT_STATE_POINTERS_SF_CL, 2), 0])
    }

    pub fn sf(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_SF");
        self.emit_command(&[
            header(_3DSTATE_SF, 7),
            0,
            SF_CULL_NONE,
            2 << SF_TRIFAN_PROVOKE_SHIFT,
            0,
            0,
            0,
        ])
    }

    pub fn wm(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_WM");
        self.emit_command(&[
            header(_3DSTATE_WM, 3),
            WM_DISPATCH_ENABLE | WM_PERSPECTIVE_PIXEL_BARYCENTRIC,
            0,
        ])
    }

    pub fn streamout(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_STREAMOUT");
        self.emit_command(&[header(_3DSTATE_STREAMOUT, 3), 0, 0])
    }

    pub fn null_depth_buffer(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_DEPTH_BUFFER");
        self.arena.ensure_command_space(10)?;
        self.emit_command(&[
            header(_3DSTATE_DEPTH_BUFFER, 7),
            (SURFACE_NULL << DEPTH_BUFFER_TYPE_SHIFT)
                | (DEPTHFORMAT_D32_FLOAT << DEPTH_BUFFER_FORMAT_SHIFT),
            0,
            0,
            0,
            0,
            0,
        ])?;
        self.emit_command(&[header(_3DSTATE_CLEAR_PARAMS, 3), 0, 0])
    }

    /// Blend and colour-calculator viewport pointers.
    pub fn cc(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_BLEND_STATE_POINTERS");
        self.arena.ensure_command_space(4)?;
        let blend = state::create_blend_state(self.arena)?;
        let viewport = state::create_cc_viewport(self.arena)?;
        self.offsets.blend = blend;
        self.offsets.cc_viewport = viewport;
        self.emit_command(&[header(_3DSTATE_BLEND_STATE_POINTERS, 2), blend])?;
        self.emit_command(&[header(_3DSTATE_VIEWPORT_STATE_POINTERS_CC, 2), viewport])
    }

    pub fn sampler(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_SAMPLER_STATE_POINTERS_PS");
        self.arena.ensure_command_space(2)?;
        let sampler = state::create_sampler(self.arena)?;
        self.offsets.sampler = sampler;
        self.emit_command(&[header(_3DSTATE_SAMPLER_STATE_POINTERS_PS, 2), sampler])
    }

    /// Setup backend: one attribute (the texture coordinate) read from the URB.
    pub fn sbe(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_SBE");
        let mut words = [0u32; 14];
        words[0] = header(_3DSTATE_SBE, 14);
        words[1] = (1 << SBE_NUM_OUTPUTS_SHIFT)
            | (1 << SBE_URB_ENTRY_READ_LENGTH_SHIFT)
            | (1 << SBE_URB_ENTRY_READ_OFFSET_SHIFT);
        self.emit_command(&words)
    }

    pub fn ps(&mut self) -> Result<(), ArenaError> {
        tracing::trace!(threads = ?self.caps.ps_threads, "3DSTATE_PS");
        self.arena.ensure_command_space(8)?;
        let kernel = state::copy_kernel(self.arena)?;
        self.offsets.kernel = kernel;
        self.emit_command(&[
            header(_3DSTATE_PS, 8),
            kernel,
            (1 << PS_SAMPLER_COUNT_SHIFT) | (2 << PS_BINDING_TABLE_ENTRY_COUNT_SHIFT),
            // Scratch space.
            0,
            self.caps.ps_threads.threads_bits() | PS_16_DISPATCH_ENABLE | PS_ATTRIBUTE_ENABLE,
            PS_DISPATCH_START_GRF << PS_DISPATCH_START_GRF_SHIFT_0,
            0,
            0,
        ])
    }

    /// A zero element followed by position and texture coordinate, both `R16G16_SSCALED`.
    pub fn vertex_elements(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("3DSTATE_VERTEX_ELEMENTS");
        let zero = (VFCOMPONENT_STORE_0 << VE1_VFCOMPONENT_0_SHIFT)
            | (VFCOMPONENT_STORE_0 << VE1_VFCOMPONENT_1_SHIFT)
            | (VFCOMPONENT_STORE_0 << VE1_VFCOMPONENT_2_SHIFT)
            | (VFCOMPONENT_STORE_0 << VE1_VFCOMPONENT_3_SHIFT);
        let xy01 = (VFCOMPONENT_STORE_SRC << VE1_VFCOMPONENT_0_SHIFT)
            | (VFCOMPONENT_STORE_SRC << VE1_VFCOMPONENT_1_SHIFT)
            | (VFCOMPONENT_STORE_0 << VE1_VFCOMPONENT_2_SHIFT)
            | (VFCOMPONENT_STORE_1_FLT << VE1_VFCOMPONENT_3_SHIFT);
        let element = |format: u32, offset: u32| {
            VE0_VALID | (format << VE0_FORMAT_SHIFT) | (offset << VE0_OFFSET_SHIFT)
        };
        self.emit_command(&[
            header(_3DSTATE_VERTEX_ELEMENTS, 7),
            element(SURFACEFORMAT_R32G32B32A32_FLOAT, 0),
            zero,
            element(SURFACEFORMAT_R16G16_SSCALED, Vertex::POSITION_OFFSET),
            xy01,
            element(SURFACEFORMAT_R16G16_SSCALED, Vertex::TEXCOORD_OFFSET),
            xy01,
        ])
    }

    /// Place the copy geometry and point vertex buffer 0 at it.
    ///
    /// The geometry lives in the batch, so the start address is a relocation against the
    /// arena's own buffer.
    pub fn vertex_buffer(&mut self, rect: &CopyRect) -> Result<(), EncodeError> {
        tracing::trace!(?rect, topology = %self.caps.topology, "3DSTATE_VERTEX_BUFFERS");
        self.arena.ensure_command_space(5)?;
        let geometry = state::create_vertex_geometry(self.arena, rect, self.caps.topology)?;
        self.offsets.geometry = geometry;

        let handle = self.arena.handle();
        self.arena.emit(header(_3DSTATE_VERTEX_BUFFERS, 5))?;
        self.arena.emit(
            VB0_VERTEXDATA
                | VB0_ADDRESS_MODIFY_ENABLE
                | (Vertex::SIZE_BYTES << VB0_BUFFER_PITCH_SHIFT),
        )?;
        self.arena.emit_reloc(handle, Domains::VERTEX, Domains::empty(), geometry)?;
        // End address: unbounded. Instance step rate: unused.
        self.arena.emit_all(&[!0, 0])?;
        Ok(())
    }

    /// Describe both surfaces and point the pixel shader's binding table at them.
    pub fn binding_table(&mut self, src: &ScratchBuf, dst: &ScratchBuf) -> Result<(), EncodeError> {
        tracing::trace!(src = ?src.handle, dst = ?dst.handle, "3DSTATE_BINDING_TABLE_POINTERS_PS");
        self.arena.ensure_command_space(2)?;
        let format = SURFACEFORMAT_B8G8R8A8_UNORM;
        let caps = self.caps;
        let dst_surface =
            state::create_surface_state(self.arena, dst, format, SurfaceRole::Destination, &caps)?;
        let src_surface =
            state::create_surface_state(self.arena, src, format, SurfaceRole::Source, &caps)?;
        let table = state::create_binding_table(self.arena, src_surface, dst_surface)?;
        self.offsets.dst_surface = dst_surface;
        self.offsets.src_surface = src_surface;
        self.offsets.binding_table = table;
        self.emit_command(&[header(_3DSTATE_BINDING_TABLE_POINTERS_PS, 2), table])?;
        Ok(())
    }

    pub fn primitive(&mut self) -> Result<(), ArenaError> {
        tracing::trace!(topology = %self.caps.topology, "3DPRIMITIVE");
        self.emit_command(&[
            header(_3DPRIMITIVE, 7),
            PRIMITIVE_VERTEX_SEQUENTIAL | self.caps.topology.prim_type(),
            COPY_VERTEX_COUNT,
            // Start vertex.
            0,
            // Instance count.
            1,
            // Start instance.
            0,
            // Base vertex.
            0,
        ])
    }

    pub fn batch_buffer_end(&mut self) -> Result<(), ArenaError> {
        tracing::trace!("MI_BATCH_BUFFER_END");
        self.emit_command(&[MI_BATCH_BUFFER_END])
    }

    /// Encode the complete copy pipeline in hardware order.
    pub fn encode_copy(
        &mut self,
        src: &ScratchBuf,
        dst: &ScratchBuf,
        rect: &CopyRect,
    ) -> Result<(), EncodeError> {
        self.pipeline_select()?;
        self.state_base_address()?;
        self.multisample()?;
        self.urb()?;
        self.disabled_stages()?;
        self.clip()?;
        self.sf()?;
        self.wm()?;
        self.streamout()?;
        self.null_depth_buffer()?;
        self.cc()?;
        self.sampler()?;
        self.sbe()?;
        self.ps()?;
        self.vertex_elements()?;
        self.vertex_buffer(rect)?;
        self.binding_table(src, dst)?;
        self.primitive()?;
        self.batch_buffer_end()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::buf::BufferHandle;
    use crate::caps::CopyTopology;

    fn arena() -> Arena {
        Arena::new(BufferHandle(1), ArenaConfig::DEFAULT).unwrap()
    }

    fn words(arena: &Arena) -> Vec<u32> {
        arena
            .command_bytes()
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn state_base_address_records_three_base_relocations() {
        let mut a = arena();
        Gen7Encoder::new(&mut a, Caps::ivybridge()).state_base_address().unwrap();
        let w = words(&a);
        assert_eq!(w.len(), 10);
        assert_eq!(w[0], 0x6101_0008);
        assert!(a.relocations().is_empty());
        let offsets: Vec<u32> = a.base_relocations().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![8, 12, 20]);
        assert!(a.base_relocations().iter().all(|r| r.target == BufferHandle(1)));
    }

    #[test]
    fn ps_thread_bits_follow_caps() {
        let cases = [
            (Caps::ivybridge(), 40 << 24),
            (Caps::haswell(), (40 << 23) | (1 << 12)),
        ];
        for (caps, threads) in cases {
            let mut a = arena();
            Gen7Encoder::new(&mut a, caps).ps().unwrap();
            let w = words(&a);
            assert_eq!(w[0], header(_3DSTATE_PS, 8));
            assert_eq!(w[1] % 64, 0);
            assert_eq!(w[4], threads | PS_16_DISPATCH_ENABLE | PS_ATTRIBUTE_ENABLE);
            assert_eq!(w[5], 6 << 16);
        }
    }

    #[test]
    fn primitive_uses_configured_topology() {
        let mut a = arena();
        let caps = Caps::haswell().with_topology(CopyTopology::TriangleList);
        Gen7Encoder::new(&mut a, caps).primitive().unwrap();
        let w = words(&a);
        assert_eq!(w, vec![0x7b00_0005, _3DPRIM_TRILIST, 3, 0, 1, 0, 0]);
    }

    #[test]
    fn vertex_buffer_relocates_geometry_inside_batch() {
        let mut a = arena();
        let rect = CopyRect {
            width: 4,
            height: 4,
            ..CopyRect::default()
        };
        let mut enc = Gen7Encoder::new(&mut a, Caps::ivybridge());
        enc.vertex_buffer(&rect).unwrap();
        let geometry = enc.offsets().geometry;

        let w = words(&a);
        assert_eq!(w[1] & VB0_BUFFER_PITCH_MASK, 8);
        assert_eq!(w[2], geometry);
        assert_eq!(w[3], !0);
        let reloc = a.relocations()[0];
        assert_eq!(reloc.offset, 8);
        assert_eq!(reloc.target, BufferHandle(1));
        assert_eq!(reloc.delta, geometry);
        assert_eq!(reloc.read_domains, Domains::VERTEX);
    }

    #[test]
    fn stage_is_not_written_when_it_does_not_fit() {
        let mut a = Arena::new(BufferHandle(1), ArenaConfig { capacity: 128, split: 64 }).unwrap();
        a.emit_all(&[0; 10]).unwrap();
        let err = Gen7Encoder::new(&mut a, Caps::ivybridge()).sbe().unwrap_err();
        assert!(matches!(err, ArenaError::CommandOverflow { .. }));
        assert_eq!(a.cmd_cursor(), 40);
    }
}
