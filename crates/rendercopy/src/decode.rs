//! Walks an encoded command region back into individual commands.
//!
//! Used by the software executor and as a disassembler in tests. Only the opcodes the copy
//! emits are recognised; anything else is reported as an error rather than skipped, since the
//! length of an unknown command cannot be trusted.

use std::fmt;

use crate::gen7::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("command region length {0} is not a multiple of 4")]
    Misaligned(usize),

    #[error("unknown command header 0x{header:08x} at offset 0x{offset:x}")]
    UnknownCommand { offset: u32, header: u32 },

    #[error("{opcode} at offset 0x{offset:x} needs {dwords} dwords but only {available} remain")]
    Truncated {
        opcode: Opcode,
        offset: u32,
        dwords: u32,
        available: u32,
    },

    #[error("command stream has no MI_BATCH_BUFFER_END")]
    MissingEnd,
}

macro_rules! opcodes {
    ($($variant:ident => $id:expr, $name:literal;)*) => {
        /// Commands the copy pipeline is built from.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum Opcode {
            MiNoop,
            MiBatchBufferEnd,
            PipelineSelect,
            $($variant,)*
        }

        impl Opcode {
            pub const fn name(self) -> &'static str {
                match self {
                    Self::MiNoop => "MI_NOOP",
                    Self::MiBatchBufferEnd => "MI_BATCH_BUFFER_END",
                    Self::PipelineSelect => "PIPELINE_SELECT",
                    $(Self::$variant => $name,)*
                }
            }

            fn from_gfxpipe_id(id: u32) -> Option<Self> {
                match id {
                    $(x if x == $id => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    StateBaseAddress => STATE_BASE_ADDRESS, "STATE_BASE_ADDRESS";
    Multisample => _3DSTATE_MULTISAMPLE, "3DSTATE_MULTISAMPLE";
    PushConstantAllocPs => _3DSTATE_PUSH_CONSTANT_ALLOC_PS, "3DSTATE_PUSH_CONSTANT_ALLOC_PS";
    ClearParams => _3DSTATE_CLEAR_PARAMS, "3DSTATE_CLEAR_PARAMS";
    DepthBuffer => _3DSTATE_DEPTH_BUFFER, "3DSTATE_DEPTH_BUFFER";
    VertexBuffers => _3DSTATE_VERTEX_BUFFERS, "3DSTATE_VERTEX_BUFFERS";
    VertexElements => _3DSTATE_VERTEX_ELEMENTS, "3DSTATE_VERTEX_ELEMENTS";
    Vs => _3DSTATE_VS, "3DSTATE_VS";
    Gs => _3DSTATE_GS, "3DSTATE_GS";
    Clip => _3DSTATE_CLIP, "3DSTATE_CLIP";
    Sf => _3DSTATE_SF, "3DSTATE_SF";
    Wm => _3DSTATE_WM, "3DSTATE_WM";
    SampleMask => _3DSTATE_SAMPLE_MASK, "3DSTATE_SAMPLE_MASK";
    Hs => _3DSTATE_HS, "3DSTATE_HS";
    Te => _3DSTATE_TE, "3DSTATE_TE";
    Ds => _3DSTATE_DS, "3DSTATE_DS";
    Streamout => _3DSTATE_STREAMOUT, "3DSTATE_STREAMOUT";
    Sbe => _3DSTATE_SBE, "3DSTATE_SBE";
    Ps => _3DSTATE_PS, "3DSTATE_PS";
    ViewportStatePointersSfClip => _3DSTATE_VIEWPORT_STATE_POINTERS_SF_CL, "3DSTATE_VIEWPORT_STATE_POINTERS_SF_CL";
    ViewportStatePointersCc => _3DSTATE_VIEWPORT_STATE_POINTERS_CC, "3DSTATE_VIEWPORT_STATE_POINTERS_CC";
    BlendStatePointers => _3DSTATE_BLEND_STATE_POINTERS, "3DSTATE_BLEND_STATE_POINTERS";
    BindingTablePointersPs => _3DSTATE_BINDING_TABLE_POINTERS_PS, "3DSTATE_BINDING_TABLE_POINTERS_PS";
    SamplerStatePointersPs => _3DSTATE_SAMPLER_STATE_POINTERS_PS, "3DSTATE_SAMPLER_STATE_POINTERS_PS";
    UrbVs => _3DSTATE_URB_VS, "3DSTATE_URB_VS";
    UrbHs => _3DSTATE_URB_HS, "3DSTATE_URB_HS";
    UrbDs => _3DSTATE_URB_DS, "3DSTATE_URB_DS";
    UrbGs => _3DSTATE_URB_GS, "3DSTATE_URB_GS";
    Primitive => _3DPRIMITIVE, "3DPRIMITIVE";
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Commands of one copy in the order they are encoded, `MI_NOOP` padding excluded.
pub const COPY_SEQUENCE: &[Opcode] = &[
    Opcode::PipelineSelect,
    Opcode::StateBaseAddress,
    Opcode::Multisample,
    Opcode::SampleMask,
    Opcode::PushConstantAllocPs,
    Opcode::UrbVs,
    Opcode::UrbHs,
    Opcode::UrbDs,
    Opcode::UrbGs,
    Opcode::Vs,
    Opcode::Hs,
    Opcode::Te,
    Opcode::Ds,
    Opcode::Gs,
    Opcode::Clip,
    Opcode::ViewportStatePointersSfClip,
    Opcode::Sf,
    Opcode::Wm,
    Opcode::Streamout,
    Opcode::DepthBuffer,
    Opcode::ClearParams,
    Opcode::BlendStatePointers,
    Opcode::ViewportStatePointersCc,
    Opcode::SamplerStatePointersPs,
    Opcode::Sbe,
    Opcode::Ps,
    Opcode::VertexElements,
    Opcode::VertexBuffers,
    Opcode::BindingTablePointersPs,
    Opcode::Primitive,
    Opcode::MiBatchBufferEnd,
];

/// Identify the command starting with `header`, returning its opcode and total dword count.
pub fn identify(header: u32) -> Option<(Opcode, u32)> {
    match header {
        MI_NOOP => return Some((Opcode::MiNoop, 1)),
        MI_BATCH_BUFFER_END => return Some((Opcode::MiBatchBufferEnd, 1)),
        _ => {}
    }
    let id = header & GFXPIPE_ID_MASK;
    if id == PIPELINE_SELECT {
        return Some((Opcode::PipelineSelect, 1));
    }
    let opcode = Opcode::from_gfxpipe_id(id)?;
    Some((opcode, (header & GFXPIPE_LEN_MASK) + 2))
}

/// One decoded command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    /// Byte offset of the header within the batch.
    pub offset: u32,
    pub opcode: Opcode,
    /// All dwords of the command, header included.
    pub dwords: Vec<u32>,
}

impl Command {
    /// Payload dword `index` (the header is index 0).
    pub fn dword(&self, index: usize) -> u32 {
        self.dwords.get(index).copied().unwrap_or(0)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}: {}", self.offset, self.opcode)?;
        for dw in &self.dwords[1..] {
            write!(f, " {dw:08x}")?;
        }
        Ok(())
    }
}

/// Decode `bytes` up to and including `MI_BATCH_BUFFER_END`.
///
/// Trailing bytes after the terminator (alignment padding) are ignored.
pub fn decode_commands(bytes: &[u8]) -> Result<Vec<Command>, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::Misaligned(bytes.len()));
    }
    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let mut commands = Vec::new();
    let mut idx = 0usize;
    while idx < words.len() {
        let offset = (idx * 4) as u32;
        let header = words[idx];
        let (opcode, dwords) =
            identify(header).ok_or(DecodeError::UnknownCommand { offset, header })?;
        let available = (words.len() - idx) as u32;
        if dwords > available {
            return Err(DecodeError::Truncated {
                opcode,
                offset,
                dwords,
                available,
            });
        }
        let end = idx + dwords as usize;
        commands.push(Command {
            offset,
            opcode,
            dwords: words[idx..end].to_vec(),
        });
        idx = end;
        if opcode == Opcode::MiBatchBufferEnd {
            return Ok(commands);
        }
    }
    Err(DecodeError::MissingEnd)
}

/// Render a command region as one line per command.
pub fn disassemble(bytes: &[u8]) -> Result<String, DecodeError> {
    let mut out = String::new();
    for cmd in decode_commands(bytes)? {
        out.push_str(&cmd.to_string());
        out.push('\n');
    }
    Ok(out)
}
