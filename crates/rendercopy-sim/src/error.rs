use rendercopy::decode::DecodeError;
use rendercopy::BufferHandle;

/// Access to an unmapped graphics address (or past the end of the buffer mapped there).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("graphics address 0x{address:x}+{len} is not mapped")]
pub struct MemoryError {
    pub address: u64,
    pub len: usize,
}

/// Failures of host-side buffer management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),

    #[error("buffer of {0} bytes cannot be placed")]
    TooLarge(u64),

    #[error("access {offset}+{len} is outside buffer {handle:?} of {size} bytes")]
    OutOfBounds {
        handle: BufferHandle,
        offset: u64,
        len: usize,
        size: u64,
    },

    #[error("pixel ({x},{y}) is outside the {width}x{height} surface")]
    PixelOutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("surface needs {needed} bytes but buffer {handle:?} holds {size}")]
    SurfaceTooSmall {
        handle: BufferHandle,
        needed: u64,
        size: u64,
    },

    #[error(transparent)]
    Arena(#[from] rendercopy::ArenaError),
}

/// Failures while executing a command stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("{0} issued before PIPELINE_SELECT chose the 3D pipeline")]
    Not3d(&'static str),

    #[error("3DPRIMITIVE issued without {0}")]
    MissingState(&'static str),

    #[error("unsupported surface: {0}")]
    UnsupportedSurface(String),

    #[error("unsupported sampler state 0x{0:08x}")]
    UnsupportedSampler(u32),

    #[error("unsupported blend state 0x{0:08x}")]
    UnsupportedBlend(u32),

    #[error("pixel shader kernel is not the copy kernel")]
    UnsupportedKernel,

    #[error("unsupported primitive topology 0x{0:x}")]
    UnsupportedTopology(u32),

    #[error("vertex count {0} is not a whole number of primitives")]
    BadVertexCount(u32),

    #[error("vertex element layout lacks {0}")]
    BadVertexElements(&'static str),
}
