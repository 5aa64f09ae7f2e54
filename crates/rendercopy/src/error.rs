use crate::buf::{BufferHandle, Tiling};

/// Failures raised by the batch arena.
///
/// None of these leave a usable stream behind: the arena must be reset before it is encoded
/// into again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArenaError {
    #[error("invalid arena layout: capacity={capacity} split={split}")]
    BadLayout { capacity: u32, split: u32 },

    #[error("command region overflow: {len} bytes at offset {cursor} would reach split offset {split}")]
    CommandOverflow { cursor: u32, len: u32, split: u32 },

    #[error("state region overflow: {size} bytes at offset {offset} exceed capacity {capacity}")]
    StateOverflow { offset: u32, size: u32, capacity: u32 },

    #[error("invalid state alignment {0} (must be a power of two, at least 8)")]
    BadAlignment(u32),

    #[error("state access 0x{offset:x}+{len} is outside the allocated state region")]
    StateOutOfBounds { offset: u32, len: u32 },

    #[error("relocation at offset 0x{0:x} is outside its region")]
    StrayRelocation(u32),

    #[error("batch end {end} is not below split offset {split}")]
    BatchTooLong { end: u32, split: u32 },

    #[error("arena holds a finished batch; reset it before encoding again")]
    Sealed,

    #[error("arena has no finished batch")]
    NotFinished,
}

/// Failures while turning a copy request into a command stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("unsupported tiling mode {0}")]
    UnsupportedTiling(u32),

    #[error("vertex coordinate {0} does not fit the 16-bit vertex format")]
    CoordinateOverflow(u64),

    #[error(
        "{surface} rectangle ({x},{y}) {width}x{height} exceeds buffer {buf_width}x{buf_height}"
    )]
    RectOutOfBounds {
        surface: &'static str,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        buf_width: u32,
        buf_height: u32,
    },

    #[error("pitch {pitch} is invalid for width {width} with {tiling:?} tiling")]
    BadPitch { pitch: u32, width: u32, tiling: Tiling },

    #[error("surface size {width}x{height} is outside 1..={max} in either dimension")]
    BadDimensions { width: u32, height: u32, max: u32 },
}

/// Failures reported by a submission adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("relocation references unknown buffer {0:?}")]
    UnknownBuffer(BufferHandle),

    #[error("relocation at offset 0x{offset:x} falls outside the {len}-byte batch")]
    RelocationOutOfBounds { offset: u32, len: u32 },

    #[error("batch of {len} bytes does not fit its {capacity}-byte buffer")]
    BatchTooLarge { len: usize, capacity: usize },

    #[error("execution failed: {0}")]
    Execution(String),
}

/// Error returned by [`render_copy`](crate::render_copy).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderCopyError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),
}

impl From<ArenaError> for RenderCopyError {
    fn from(value: ArenaError) -> Self {
        Self::Encode(EncodeError::Arena(value))
    }
}
