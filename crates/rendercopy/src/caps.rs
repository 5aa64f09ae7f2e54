//! Generation-specific toggles consulted by the encoder.
//!
//! The encoder never probes hardware itself; the caller supplies a [`Caps`] (usually one of the
//! presets) and every generation difference is a branch on one of its fields.

use std::fmt;
use std::str::FromStr;

use crate::gen7;

/// Hardware generation with a render-copy preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Generation {
    Ivybridge,
    Haswell,
}

impl FromStr for Generation {
    type Err = UnknownGeneration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ivb" | "ivybridge" | "gen7" => Ok(Self::Ivybridge),
            "hsw" | "haswell" | "gen7.5" => Ok(Self::Haswell),
            _ => Err(UnknownGeneration(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown generation {0:?} (expected ivb or hsw)")]
pub struct UnknownGeneration(pub String);

/// Encoding of the pixel-shader thread limit in `3DSTATE_PS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PsThreadLayout {
    /// Max threads at bit 24.
    Ivybridge,
    /// Max threads at bit 23, plus a sample mask field.
    Haswell,
}

impl PsThreadLayout {
    pub const MAX_THREADS: u32 = 40;

    /// The thread-count bits of `3DSTATE_PS` dword 4.
    pub const fn threads_bits(self) -> u32 {
        match self {
            Self::Ivybridge => Self::MAX_THREADS << gen7::IVB_PS_MAX_THREADS_SHIFT,
            Self::Haswell => {
                (Self::MAX_THREADS << gen7::HSW_PS_MAX_THREADS_SHIFT)
                    | (1 << gen7::HSW_PS_SAMPLE_MASK_SHIFT)
            }
        }
    }
}

/// Primitive used to cover the destination rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CopyTopology {
    /// Three corners the hardware expands into the full axis-aligned rectangle.
    #[default]
    RectList,
    /// A single triangle inscribed in the rectangle: bottom-left, top-centre, bottom-right.
    TriangleList,
}

impl CopyTopology {
    pub const fn prim_type(self) -> u32 {
        match self {
            Self::RectList => gen7::_3DPRIM_RECTLIST,
            Self::TriangleList => gen7::_3DPRIM_TRILIST,
        }
    }

    pub const fn from_prim_type(v: u32) -> Option<Self> {
        match v {
            gen7::_3DPRIM_RECTLIST => Some(Self::RectList),
            gen7::_3DPRIM_TRILIST => Some(Self::TriangleList),
            _ => None,
        }
    }
}

impl fmt::Display for CopyTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RectList => f.write_str("rectlist"),
            Self::TriangleList => f.write_str("trilist"),
        }
    }
}

/// Capability descriptor for one copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Caps {
    /// Program the shader channel select (identity swizzle) in surface state dword 7.
    pub channel_select: bool,
    pub ps_threads: PsThreadLayout,
    pub topology: CopyTopology,
}

impl Caps {
    pub const fn ivybridge() -> Self {
        Self {
            channel_select: false,
            ps_threads: PsThreadLayout::Ivybridge,
            topology: CopyTopology::RectList,
        }
    }

    pub const fn haswell() -> Self {
        Self {
            channel_select: true,
            ps_threads: PsThreadLayout::Haswell,
            topology: CopyTopology::RectList,
        }
    }

    pub const fn for_generation(generation: Generation) -> Self {
        match generation {
            Generation::Ivybridge => Self::ivybridge(),
            Generation::Haswell => Self::haswell(),
        }
    }

    pub const fn with_topology(mut self, topology: CopyTopology) -> Self {
        self.topology = topology;
        self
    }
}

impl Default for Caps {
    fn default() -> Self {
        Self::ivybridge()
    }
}
