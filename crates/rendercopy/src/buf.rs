use crate::error::EncodeError;
use crate::gen7;

/// Bytes per pixel of the 32-bit BGRA surfaces the copy operates on.
pub const BYTES_PER_PIXEL: u32 = 4;

/// Largest width or height a surface state can describe (14-bit `size - 1` fields).
pub const MAX_SURFACE_DIM: u32 = gen7::SURFACE_WIDTH_MASK + 1;

/// Largest row pitch a surface state can describe (18-bit `pitch - 1` field).
pub const MAX_SURFACE_PITCH: u32 = gen7::SURFACE_PITCH_MASK + 1;

/// Opaque handle naming a buffer object owned by the submission side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferHandle(pub u32);

/// Memory layout of a scratch image.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tiling {
    #[default]
    None = 0,
    X = 1,
    Y = 2,
}

impl Tiling {
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::X),
            2 => Some(Self::Y),
            _ => None,
        }
    }

    /// Width of one tile in bytes (1 for linear surfaces).
    pub const fn tile_width(self) -> u32 {
        match self {
            Self::None => 1,
            Self::X => 512,
            Self::Y => 128,
        }
    }

    /// Height of one tile in rows (1 for linear surfaces).
    pub const fn tile_height(self) -> u32 {
        match self {
            Self::None => 1,
            Self::X => 8,
            Self::Y => 32,
        }
    }
}

impl TryFrom<u32> for Tiling {
    type Error = EncodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_u32(value).ok_or(EncodeError::UnsupportedTiling(value))
    }
}

/// A 32bpp image the copy reads from or renders into.
///
/// The encoder only reads these fields; the backing memory behind `handle` is reached through
/// relocations resolved by the submission adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScratchBuf {
    pub handle: BufferHandle,
    pub width: u32,
    pub height: u32,
    /// Row pitch in bytes.
    pub pitch: u32,
    pub tiling: Tiling,
}

impl ScratchBuf {
    /// Linear image with a tightly packed pitch.
    pub fn linear(handle: BufferHandle, width: u32, height: u32) -> Self {
        Self {
            handle,
            width,
            height,
            // Oversized widths saturate and are rejected by validation.
            pitch: width.saturating_mul(BYTES_PER_PIXEL),
            tiling: Tiling::None,
        }
    }

    /// Image with the smallest pitch allowed by `tiling`.
    pub fn tiled(handle: BufferHandle, width: u32, height: u32, tiling: Tiling) -> Self {
        let pitch = width
            .checked_mul(BYTES_PER_PIXEL)
            .and_then(|p| p.checked_next_multiple_of(tiling.tile_width()))
            .unwrap_or(u32::MAX);
        Self {
            handle,
            width,
            height,
            pitch,
            tiling,
        }
    }

    /// Bytes of backing memory the layout spans (whole tile rows for tiled images).
    pub fn size_bytes(&self) -> u64 {
        let rows = self.height.next_multiple_of(self.tiling.tile_height());
        u64::from(self.pitch) * u64::from(rows)
    }

    /// Check the layout fits the fields of a surface state.
    pub fn validate(&self) -> Result<(), EncodeError> {
        let dim_ok = |v: u32| (1..=MAX_SURFACE_DIM).contains(&v);
        if !dim_ok(self.width) || !dim_ok(self.height) {
            return Err(EncodeError::BadDimensions {
                width: self.width,
                height: self.height,
                max: MAX_SURFACE_DIM,
            });
        }

        let min_pitch = u64::from(self.width) * u64::from(BYTES_PER_PIXEL);
        let bad_pitch = self.pitch == 0
            || self.pitch > MAX_SURFACE_PITCH
            || self.pitch % BYTES_PER_PIXEL != 0
            || u64::from(self.pitch) < min_pitch
            || self.pitch % self.tiling.tile_width() != 0;
        if bad_pitch {
            return Err(EncodeError::BadPitch {
                pitch: self.pitch,
                width: self.width,
                tiling: self.tiling,
            });
        }
        Ok(())
    }
}
