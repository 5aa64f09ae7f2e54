//! Gen7 (Ivybridge/Haswell) 3D pipeline command and state encodings.
//!
//! Only the subset needed by the render copy is described here. Command headers follow the
//! GFXPIPE layout:
//!
//! ```text
//! 31:29 command type (3 = GFXPIPE)
//! 28:27 pipeline
//! 26:24 opcode
//! 23:16 sub-opcode
//!  7:0  dword count - 2
//! ```

pub type CmdWord = u32;

const fn gfxpipe(pipeline: u32, opcode: u32, subopcode: u32) -> CmdWord {
    (3 << 29) | (pipeline << 27) | (opcode << 24) | (subopcode << 16)
}

/// Mask selecting the identifying part of a GFXPIPE header (everything but the length).
pub const GFXPIPE_ID_MASK: CmdWord = 0xffff_0000;
/// Mask selecting the dword-count field of a GFXPIPE header.
pub const GFXPIPE_LEN_MASK: CmdWord = 0x0000_00ff;

/// Header value for a command of `dwords` total dwords.
pub const fn header(id: CmdWord, dwords: u32) -> CmdWord {
    id | (dwords - 2)
}

// Memory interface commands.
pub const MI_NOOP: CmdWord = 0;
pub const MI_BATCH_BUFFER_END: CmdWord = 0x0a << 23;

// Pipeline setup.
pub const PIPELINE_SELECT: CmdWord = gfxpipe(1, 1, 4);
pub const PIPELINE_SELECT_3D: CmdWord = 0;
pub const STATE_BASE_ADDRESS: CmdWord = gfxpipe(0, 1, 1);
pub const BASE_ADDRESS_MODIFY: CmdWord = 1 << 0;

// Non-pipelined 3D state.
pub const _3DSTATE_MULTISAMPLE: CmdWord = gfxpipe(3, 1, 0x0d);
pub const _3DSTATE_PUSH_CONSTANT_ALLOC_PS: CmdWord = gfxpipe(3, 1, 0x16);

// Pipelined 3D state.
pub const _3DSTATE_CLEAR_PARAMS: CmdWord = gfxpipe(3, 0, 0x04);
pub const _3DSTATE_DEPTH_BUFFER: CmdWord = gfxpipe(3, 0, 0x05);
pub const _3DSTATE_VERTEX_BUFFERS: CmdWord = gfxpipe(3, 0, 0x08);
pub const _3DSTATE_VERTEX_ELEMENTS: CmdWord = gfxpipe(3, 0, 0x09);
pub const _3DSTATE_VS: CmdWord = gfxpipe(3, 0, 0x10);
pub const _3DSTATE_GS: CmdWord = gfxpipe(3, 0, 0x11);
pub const _3DSTATE_CLIP: CmdWord = gfxpipe(3, 0, 0x12);
pub const _3DSTATE_SF: CmdWord = gfxpipe(3, 0, 0x13);
pub const _3DSTATE_WM: CmdWord = gfxpipe(3, 0, 0x14);
pub const _3DSTATE_SAMPLE_MASK: CmdWord = gfxpipe(3, 0, 0x18);
pub const _3DSTATE_HS: CmdWord = gfxpipe(3, 0, 0x1b);
pub const _3DSTATE_TE: CmdWord = gfxpipe(3, 0, 0x1c);
pub const _3DSTATE_DS: CmdWord = gfxpipe(3, 0, 0x1d);
pub const _3DSTATE_STREAMOUT: CmdWord = gfxpipe(3, 0, 0x1e);
pub const _3DSTATE_SBE: CmdWord = gfxpipe(3, 0, 0x1f);
pub const _3DSTATE_PS: CmdWord = gfxpipe(3, 0, 0x20);
pub const _3DSTATE_VIEWPORT_STATE_POINTERS_SF_CL: CmdWord = gfxpipe(3, 0, 0x21);
pub const _3DSTATE_VIEWPORT_STATE_POINTERS_CC: CmdWord = gfxpipe(3, 0, 0x23);
pub const _3DSTATE_BLEND_STATE_POINTERS: CmdWord = gfxpipe(3, 0, 0x24);
pub const _3DSTATE_BINDING_TABLE_POINTERS_PS: CmdWord = gfxpipe(3, 0, 0x2a);
pub const _3DSTATE_SAMPLER_STATE_POINTERS_PS: CmdWord = gfxpipe(3, 0, 0x2f);
pub const _3DSTATE_URB_VS: CmdWord = gfxpipe(3, 0, 0x30);
pub const _3DSTATE_URB_HS: CmdWord = gfxpipe(3, 0, 0x31);
pub const _3DSTATE_URB_DS: CmdWord = gfxpipe(3, 0, 0x32);
pub const _3DSTATE_URB_GS: CmdWord = gfxpipe(3, 0, 0x33);
pub const _3DPRIMITIVE: CmdWord = gfxpipe(3, 3, 0x00);

// 3DSTATE_MULTISAMPLE
pub const MULTISAMPLE_PIXEL_LOCATION_CENTER: u32 = 0 << 4;
pub const MULTISAMPLE_NUMSAMPLES_1: u32 = 0 << 1;

// 3DSTATE_URB_*
pub const URB_ENTRY_NUMBER_SHIFT: u32 = 0;
pub const URB_ENTRY_SIZE_SHIFT: u32 = 16;
pub const URB_STARTING_ADDRESS_SHIFT: u32 = 25;

// 3DSTATE_SF
pub const SF_CULL_NONE: u32 = 1 << 29;
pub const SF_TRIFAN_PROVOKE_SHIFT: u32 = 25;

// 3DSTATE_WM
pub const WM_DISPATCH_ENABLE: u32 = 1 << 29;
pub const WM_PERSPECTIVE_PIXEL_BARYCENTRIC: u32 = 1 << 11;

// 3DSTATE_DEPTH_BUFFER
pub const DEPTH_BUFFER_TYPE_SHIFT: u32 = 29;
pub const DEPTH_BUFFER_FORMAT_SHIFT: u32 = 18;
pub const DEPTHFORMAT_D32_FLOAT: u32 = 1;

// 3DSTATE_SBE
pub const SBE_NUM_OUTPUTS_SHIFT: u32 = 22;
pub const SBE_URB_ENTRY_READ_LENGTH_SHIFT: u32 = 11;
pub const SBE_URB_ENTRY_READ_OFFSET_SHIFT: u32 = 4;

// 3DSTATE_PS
pub const PS_SAMPLER_COUNT_SHIFT: u32 = 27;
pub const PS_BINDING_TABLE_ENTRY_COUNT_SHIFT: u32 = 18;
pub const PS_16_DISPATCH_ENABLE: u32 = 1 << 1;
pub const PS_ATTRIBUTE_ENABLE: u32 = 1 << 10;
pub const PS_DISPATCH_START_GRF_SHIFT_0: u32 = 16;
pub const IVB_PS_MAX_THREADS_SHIFT: u32 = 24;
pub const HSW_PS_MAX_THREADS_SHIFT: u32 = 23;
pub const HSW_PS_SAMPLE_MASK_SHIFT: u32 = 12;

// VERTEX_ELEMENT_STATE
pub const VE0_VERTEX_BUFFER_INDEX_SHIFT: u32 = 26;
pub const VE0_VALID: u32 = 1 << 25;
pub const VE0_FORMAT_SHIFT: u32 = 16;
pub const VE0_OFFSET_SHIFT: u32 = 0;
pub const VE1_VFCOMPONENT_0_SHIFT: u32 = 28;
pub const VE1_VFCOMPONENT_1_SHIFT: u32 = 24;
pub const VE1_VFCOMPONENT_2_SHIFT: u32 = 20;
pub const VE1_VFCOMPONENT_3_SHIFT: u32 = 16;

pub const VFCOMPONENT_NOSTORE: u32 = 0;
pub const VFCOMPONENT_STORE_SRC: u32 = 1;
pub const VFCOMPONENT_STORE_0: u32 = 2;
pub const VFCOMPONENT_STORE_1_FLT: u32 = 3;

// VERTEX_BUFFER_STATE
pub const VB0_BUFFER_INDEX_SHIFT: u32 = 26;
pub const VB0_VERTEXDATA: u32 = 0 << 20;
pub const VB0_ADDRESS_MODIFY_ENABLE: u32 = 1 << 14;
pub const VB0_BUFFER_PITCH_SHIFT: u32 = 0;
pub const VB0_BUFFER_PITCH_MASK: u32 = 0xfff;

// 3DPRIMITIVE
pub const PRIMITIVE_VERTEX_SEQUENTIAL: u32 = 0 << 8;
pub const PRIMITIVE_TOPOLOGY_MASK: u32 = 0x3f;
pub const _3DPRIM_TRILIST: u32 = 0x04;
pub const _3DPRIM_RECTLIST: u32 = 0x0f;

// Surface formats.
pub const SURFACEFORMAT_R32G32B32A32_FLOAT: u32 = 0x000;
pub const SURFACEFORMAT_B8G8R8A8_UNORM: u32 = 0x0c0;
pub const SURFACEFORMAT_R16G16_SSCALED: u32 = 0x0f6;

// RENDER_SURFACE_STATE
pub const SURFACE_TYPE_SHIFT: u32 = 29;
pub const SURFACE_TYPE_MASK: u32 = 0x7;
pub const SURFACE_2D: u32 = 1;
pub const SURFACE_NULL: u32 = 7;
pub const SURFACE_FORMAT_SHIFT: u32 = 18;
pub const SURFACE_FORMAT_MASK: u32 = 0x1ff;
pub const SURFACE_TILED: u32 = 1 << 14;
pub const SURFACE_TILED_Y: u32 = 1 << 13;
pub const SURFACE_WIDTH_SHIFT: u32 = 0;
pub const SURFACE_WIDTH_MASK: u32 = 0x3fff;
pub const SURFACE_HEIGHT_SHIFT: u32 = 16;
pub const SURFACE_HEIGHT_MASK: u32 = 0x3fff;
pub const SURFACE_PITCH_SHIFT: u32 = 0;
pub const SURFACE_PITCH_MASK: u32 = 0x3ffff;

// Haswell shader channel select (surface state dword 7).
pub const HSW_SURFACE_SWIZZLE_SHIFT_RED: u32 = 25;
pub const HSW_SURFACE_SWIZZLE_SHIFT_GREEN: u32 = 22;
pub const HSW_SURFACE_SWIZZLE_SHIFT_BLUE: u32 = 19;
pub const HSW_SURFACE_SWIZZLE_SHIFT_ALPHA: u32 = 16;
pub const HSW_SCS_RED: u32 = 4;
pub const HSW_SCS_GREEN: u32 = 5;
pub const HSW_SCS_BLUE: u32 = 6;
pub const HSW_SCS_ALPHA: u32 = 7;

// SAMPLER_STATE
pub const SAMPLER_MIN_FILTER_SHIFT: u32 = 14;
pub const SAMPLER_MAG_FILTER_SHIFT: u32 = 17;
pub const SAMPLER_FILTER_MASK: u32 = 0x7;
pub const SAMPLER_R_WRAP_SHIFT: u32 = 0;
pub const SAMPLER_T_WRAP_SHIFT: u32 = 3;
pub const SAMPLER_S_WRAP_SHIFT: u32 = 6;
pub const SAMPLER_WRAP_MASK: u32 = 0x7;
pub const SAMPLER_NON_NORMALIZED_COORD: u32 = 1 << 10;
pub const MAPFILTER_NEAREST: u32 = 0;
pub const MAPFILTER_LINEAR: u32 = 1;
pub const TEXCOORDMODE_WRAP: u32 = 0;
pub const TEXCOORDMODE_CLAMP: u32 = 2;

// BLEND_STATE
pub const BLEND_DEST_FACTOR_SHIFT: u32 = 0;
pub const BLEND_SOURCE_FACTOR_SHIFT: u32 = 5;
pub const BLEND_FUNCTION_SHIFT: u32 = 11;
pub const BLEND_POST_CLAMP_ENABLE: u32 = 1 << 0;
pub const BLEND_PRE_CLAMP_ENABLE: u32 = 1 << 1;
pub const BLENDFACTOR_ONE: u32 = 0x01;
pub const BLENDFACTOR_ZERO: u32 = 0x11;
pub const BLENDFUNCTION_ADD: u32 = 0;
