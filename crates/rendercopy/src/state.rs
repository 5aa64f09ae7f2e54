//! Indirect state records placed in the arena's state region.
//!
//! Every constructor allocates a zeroed, aligned record, fills in the fields the copy needs and
//! returns the arena-relative offset a command later points at. Records are written in host
//! byte order via `bytemuck`, which is little-endian on every host that drives this hardware.

use bytemuck::{Pod, Zeroable};

use crate::arena::Arena;
use crate::buf::ScratchBuf;
use crate::caps::{Caps, CopyTopology};
use crate::error::{ArenaError, EncodeError};
use crate::gen7::*;
use crate::geometry::{copy_vertices, CopyRect};
use crate::kernel::PS_KERNEL;
use crate::reloc::Domains;

/// Alignment of blend, viewport, sampler, surface and binding-table records.
pub const STATE_ALIGN: u32 = 32;
/// Alignment of the vertex data.
pub const VERTEX_ALIGN: u32 = 8;
/// Alignment of shader kernels (kernel start pointers drop the low 6 bits).
pub const KERNEL_ALIGN: u32 = 64;

/// `BLEND_STATE` for render target 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BlendState {
    pub blend0: u32,
    pub blend1: u32,
}

impl BlendState {
    /// Source replaces destination (`src * ONE + dst * ZERO`), with pre/post clamping.
    pub const fn replace() -> Self {
        Self {
            blend0: (BLENDFACTOR_ZERO << BLEND_DEST_FACTOR_SHIFT)
                | (BLENDFACTOR_ONE << BLEND_SOURCE_FACTOR_SHIFT)
                | (BLENDFUNCTION_ADD << BLEND_FUNCTION_SHIFT),
            blend1: BLEND_POST_CLAMP_ENABLE | BLEND_PRE_CLAMP_ENABLE,
        }
    }
}

/// `CC_VIEWPORT`: depth range used by the colour calculator.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CcViewport {
    pub min_depth: f32,
    pub max_depth: f32,
}

impl CcViewport {
    pub const fn unbounded() -> Self {
        Self {
            min_depth: -1.0e35,
            max_depth: 1.0e35,
        }
    }
}

/// `SAMPLER_STATE`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SamplerState {
    pub ss: [u32; 4],
}

impl SamplerState {
    /// Nearest filtering, clamp-to-edge on every axis, texel (non-normalized) coordinates.
    pub const fn nearest_clamp() -> Self {
        Self {
            ss: [
                (MAPFILTER_NEAREST << SAMPLER_MIN_FILTER_SHIFT)
                    | (MAPFILTER_NEAREST << SAMPLER_MAG_FILTER_SHIFT),
                0,
                0,
                (TEXCOORDMODE_CLAMP << SAMPLER_R_WRAP_SHIFT)
                    | (TEXCOORDMODE_CLAMP << SAMPLER_T_WRAP_SHIFT)
                    | (TEXCOORDMODE_CLAMP << SAMPLER_S_WRAP_SHIFT)
                    | SAMPLER_NON_NORMALIZED_COORD,
            ],
        }
    }

    pub const fn min_filter(&self) -> u32 {
        (self.ss[0] >> SAMPLER_MIN_FILTER_SHIFT) & SAMPLER_FILTER_MASK
    }

    pub const fn mag_filter(&self) -> u32 {
        (self.ss[0] >> SAMPLER_MAG_FILTER_SHIFT) & SAMPLER_FILTER_MASK
    }

    pub const fn non_normalized(&self) -> bool {
        self.ss[3] & SAMPLER_NON_NORMALIZED_COORD != 0
    }
}

/// `RENDER_SURFACE_STATE`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SurfaceState {
    pub ss: [u32; 8],
}

impl SurfaceState {
    pub const SIZE_BYTES: u32 = core::mem::size_of::<Self>() as u32;
    /// Byte offset of the base-address word.
    pub const BASE_ADDRESS_OFFSET: u32 = 4;

    pub const fn surface_type(&self) -> u32 {
        (self.ss[0] >> SURFACE_TYPE_SHIFT) & SURFACE_TYPE_MASK
    }

    pub const fn format(&self) -> u32 {
        (self.ss[0] >> SURFACE_FORMAT_SHIFT) & SURFACE_FORMAT_MASK
    }

    /// Raw tiling value (see [`Tiling`](crate::Tiling)) encoded in dword 0.
    pub const fn tiling_raw(&self) -> u32 {
        match (self.ss[0] & SURFACE_TILED != 0, self.ss[0] & SURFACE_TILED_Y != 0) {
            (false, _) => 0,
            (true, false) => 1,
            (true, true) => 2,
        }
    }

    pub const fn base_address(&self) -> u32 {
        self.ss[1]
    }

    pub const fn width(&self) -> u32 {
        ((self.ss[2] >> SURFACE_WIDTH_SHIFT) & SURFACE_WIDTH_MASK) + 1
    }

    pub const fn height(&self) -> u32 {
        ((self.ss[2] >> SURFACE_HEIGHT_SHIFT) & SURFACE_HEIGHT_MASK) + 1
    }

    pub const fn pitch(&self) -> u32 {
        ((self.ss[3] >> SURFACE_PITCH_SHIFT) & SURFACE_PITCH_MASK) + 1
    }
}

/// How the pixel shader uses a bound surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceRole {
    /// Sampled texture.
    Source,
    /// Render target.
    Destination,
}

impl SurfaceRole {
    /// `(read_domains, write_domain)` for the surface's relocation.
    pub const fn domains(self) -> (Domains, Domains) {
        match self {
            Self::Source => (Domains::SAMPLER, Domains::empty()),
            Self::Destination => (Domains::RENDER, Domains::RENDER),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
        }
    }
}

const fn tiling_bits(tiling: crate::buf::Tiling) -> u32 {
    match tiling {
        crate::buf::Tiling::None => 0,
        crate::buf::Tiling::X => SURFACE_TILED,
        crate::buf::Tiling::Y => SURFACE_TILED | SURFACE_TILED_Y,
    }
}

pub fn create_blend_state(arena: &mut Arena) -> Result<u32, ArenaError> {
    arena.alloc_state_with(&BlendState::replace(), STATE_ALIGN)
}

pub fn create_cc_viewport(arena: &mut Arena) -> Result<u32, ArenaError> {
    arena.alloc_state_with(&CcViewport::unbounded(), STATE_ALIGN)
}

pub fn create_sampler(arena: &mut Arena) -> Result<u32, ArenaError> {
    arena.alloc_state_with(&SamplerState::nearest_clamp(), STATE_ALIGN)
}

/// Describe `buf` as a 2D surface and relocate its base address to the buffer object.
pub fn create_surface_state(
    arena: &mut Arena,
    buf: &ScratchBuf,
    format: u32,
    role: SurfaceRole,
    caps: &Caps,
) -> Result<u32, EncodeError> {
    buf.validate()?;
    let ss = surface_state_for(buf, format, caps);
    let offset = arena.alloc_state_with(&ss, STATE_ALIGN)?;

    let (read, write) = role.domains();
    arena.reloc_state_word(
        offset + SurfaceState::BASE_ADDRESS_OFFSET,
        buf.handle,
        read,
        write,
        0,
    )?;
    Ok(offset)
}

fn surface_state_for(buf: &ScratchBuf, format: u32, caps: &Caps) -> SurfaceState {
    let mut ss = SurfaceState::default();
    ss.ss[0] = (SURFACE_2D << SURFACE_TYPE_SHIFT)
        | tiling_bits(buf.tiling)
        | (format << SURFACE_FORMAT_SHIFT);
    ss.ss[2] =
        ((buf.width - 1) << SURFACE_WIDTH_SHIFT) | ((buf.height - 1) << SURFACE_HEIGHT_SHIFT);
    ss.ss[3] = (buf.pitch - 1) << SURFACE_PITCH_SHIFT;
    if caps.channel_select {
        ss.ss[7] = (HSW_SCS_RED << HSW_SURFACE_SWIZZLE_SHIFT_RED)
            | (HSW_SCS_GREEN << HSW_SURFACE_SWIZZLE_SHIFT_GREEN)
            | (HSW_SCS_BLUE << HSW_SURFACE_SWIZZLE_SHIFT_BLUE)
            | (HSW_SCS_ALPHA << HSW_SURFACE_SWIZZLE_SHIFT_ALPHA);
    }
    ss
}

/// Binding table consumed by the copy kernel: render target first, texture second.
pub fn create_binding_table(
    arena: &mut Arena,
    src_surface: u32,
    dst_surface: u32,
) -> Result<u32, ArenaError> {
    let table: [u32; 2] = [dst_surface, src_surface];
    arena.alloc_state_with(&table, STATE_ALIGN)
}

pub fn create_vertex_geometry(
    arena: &mut Arena,
    rect: &CopyRect,
    topology: CopyTopology,
) -> Result<u32, EncodeError> {
    let vertices = copy_vertices(rect, topology)?;
    Ok(arena.copy_state(bytemuck::cast_slice(&vertices), VERTEX_ALIGN)?)
}

/// Copy the fixed pixel-shader kernel into the state region.
pub fn copy_kernel(arena: &mut Arena) -> Result<u32, ArenaError> {
    arena.copy_state(bytemuck::cast_slice(&PS_KERNEL), KERNEL_ALIGN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::buf::{BufferHandle, Tiling};

    fn arena() -> Arena {
        Arena::new(BufferHandle(100), ArenaConfig::DEFAULT).unwrap()
    }

    fn read_record<T: Pod>(arena: &Arena, offset: u32) -> T {
        let size = core::mem::size_of::<T>();
        bytemuck::pod_read_unaligned(&arena.as_bytes()[offset as usize..offset as usize + size])
    }

    #[test]
    fn records_are_aligned_and_ordered() {
        let mut a = arena();
        let blend = create_blend_state(&mut a).unwrap();
        let vp = create_cc_viewport(&mut a).unwrap();
        let sampler = create_sampler(&mut a).unwrap();
        let kernel = copy_kernel(&mut a).unwrap();

        assert_eq!(blend, 2048);
        assert_eq!(vp, 2080);
        assert_eq!(sampler, 2112);
        assert_eq!(kernel, 2176);
        assert_eq!(a.state_cursor(), 2240);
    }

    #[test]
    fn sampler_is_nearest_clamp_unnormalized() {
        let mut a = arena();
        let off = create_sampler(&mut a).unwrap();
        let ss: SamplerState = read_record(&a, off);
        assert_eq!(ss.min_filter(), MAPFILTER_NEAREST);
        assert_eq!(ss.mag_filter(), MAPFILTER_NEAREST);
        assert!(ss.non_normalized());
        assert_eq!((ss.ss[3] >> SAMPLER_S_WRAP_SHIFT) & SAMPLER_WRAP_MASK, TEXCOORDMODE_CLAMP);
    }

    #[test]
    fn surface_state_describes_buffer_and_records_relocation() {
        let mut a = arena();
        let buf = ScratchBuf::tiled(BufferHandle(7), 300, 200, Tiling::Y);
        let off = create_surface_state(
            &mut a,
            &buf,
            SURFACEFORMAT_B8G8R8A8_UNORM,
            SurfaceRole::Destination,
            &Caps::ivybridge(),
        )
        .unwrap();

        let ss: SurfaceState = read_record(&a, off);
        assert_eq!(ss.surface_type(), SURFACE_2D);
        assert_eq!(ss.format(), SURFACEFORMAT_B8G8R8A8_UNORM);
        assert_eq!(ss.tiling_raw(), Tiling::Y as u32);
        assert_eq!((ss.width(), ss.height(), ss.pitch()), (300, 200, 1280));
        assert_eq!(ss.base_address(), 0);
        assert_eq!(ss.ss[7], 0);

        let reloc = a.relocations()[0];
        assert_eq!(reloc.offset, off + 4);
        assert_eq!(reloc.target, BufferHandle(7));
        assert_eq!(reloc.read_domains, Domains::RENDER);
        assert_eq!(reloc.write_domain, Domains::RENDER);
    }

    #[test]
    fn channel_select_is_identity_swizzle() {
        let mut a = arena();
        let buf = ScratchBuf::linear(BufferHandle(7), 16, 16);
        let off = create_surface_state(
            &mut a,
            &buf,
            SURFACEFORMAT_B8G8R8A8_UNORM,
            SurfaceRole::Source,
            &Caps::haswell(),
        )
        .unwrap();
        let ss: SurfaceState = read_record(&a, off);
        assert_eq!(ss.ss[7], (4 << 25) | (5 << 22) | (6 << 19) | (7 << 16));
        assert_eq!(a.relocations()[0].read_domains, Domains::SAMPLER);
        assert!(a.relocations()[0].write_domain.is_empty());
    }

    #[test]
    fn unrepresentable_surfaces_are_rejected_before_allocation() {
        let mut a = arena();
        let bufs = [
            ScratchBuf {
                width: 0,
                height: 4,
                pitch: 64,
                ..ScratchBuf::linear(BufferHandle(7), 16, 4)
            },
            ScratchBuf::linear(BufferHandle(7), 20000, 2),
        ];
        for buf in bufs {
            let err = create_surface_state(
                &mut a,
                &buf,
                SURFACEFORMAT_B8G8R8A8_UNORM,
                SurfaceRole::Source,
                &Caps::ivybridge(),
            )
            .unwrap_err();
            assert!(matches!(err, EncodeError::BadDimensions { .. }), "{err:?}");
        }
        assert_eq!(a.state_cursor(), a.split());
        assert!(a.relocations().is_empty());
    }

    #[test]
    fn binding_table_puts_destination_first() {
        let mut a = arena();
        let bt = create_binding_table(&mut a, 0x900, 0x920).unwrap();
        assert_eq!(a.read_u32(bt), Some(0x920));
        assert_eq!(a.read_u32(bt + 4), Some(0x900));
    }

    #[test]
    fn kernel_is_copied_verbatim() {
        let mut a = arena();
        let off = copy_kernel(&mut a).unwrap();
        assert_eq!(off % KERNEL_ALIGN, 0);
        let expected: &[u8] = bytemuck::cast_slice(&PS_KERNEL);
        assert_eq!(&a.as_bytes()[off as usize..off as usize + expected.len()], expected);
    }
}
