//! Command-stream builder for copying rectangles with the gen7 (Ivybridge/Haswell) 3D engine.
//!
//! A copy is drawn rather than blitted: the source is bound as a texture, the destination as a
//! render target, and a single primitive covering the destination rectangle is rasterized with
//! a fixed pixel shader that samples one texel per pixel.
//!
//! Everything for one copy lives in a single [`Arena`]: commands grow from offset 0, indirect
//! state records grow from the split offset, and every reference to another buffer object is
//! recorded as a [`Relocation`] for the [`SubmissionAdapter`] to patch before execution.
//!
//! ```no_run
//! use rendercopy::{render_copy, Arena, ArenaConfig, BufferHandle, Caps, ScratchBuf};
//! # fn run(adapter: &mut impl rendercopy::SubmissionAdapter) -> Result<(), rendercopy::RenderCopyError> {
//! let mut arena = Arena::new(BufferHandle(0), ArenaConfig::DEFAULT)?;
//! let src = ScratchBuf::linear(BufferHandle(1), 512, 512);
//! let dst = ScratchBuf::linear(BufferHandle(2), 512, 512);
//! render_copy(&mut arena, &Caps::ivybridge(), adapter, &src, 0, 0, 512, 512, &dst, 0, 0)?;
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod buf;
pub mod caps;
pub mod copy;
pub mod decode;
pub mod encode;
pub mod error;
pub mod gen7;
pub mod geometry;
pub mod kernel;
pub mod reloc;
pub mod state;
pub mod submit;

pub use arena::{Arena, ArenaConfig};
pub use buf::{BufferHandle, ScratchBuf, Tiling, BYTES_PER_PIXEL};
pub use caps::{Caps, CopyTopology, Generation, PsThreadLayout, UnknownGeneration};
pub use copy::{encode_copy, render_copy, BatchStats, CopyOutcome};
pub use error::{ArenaError, EncodeError, RenderCopyError, SubmitError};
pub use geometry::{CopyRect, Vertex};
pub use reloc::{Domains, Relocation};
pub use submit::{Batch, SubmissionAdapter};
