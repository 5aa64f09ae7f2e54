//! The render-copy entry point.

use crate::arena::Arena;
use crate::buf::ScratchBuf;
use crate::caps::Caps;
use crate::encode::{Gen7Encoder, StateOffsets};
use crate::error::{EncodeError, RenderCopyError};
use crate::geometry::CopyRect;
use crate::submit::{Batch, SubmissionAdapter};

/// Summary of one encoded copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchStats {
    /// Command region length in bytes, padding included.
    pub command_bytes: u32,
    /// Bytes of state allocated past the split, alignment gaps included.
    pub state_bytes: u32,
    pub relocations: usize,
    pub offsets: StateOffsets,
}

/// Result of [`render_copy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The batch was encoded and accepted by the adapter.
    Submitted(BatchStats),
    /// Zero width or height: nothing was encoded or submitted.
    Empty,
}

fn check_rect(
    surface: &'static str,
    buf: &ScratchBuf,
    x: u32,
    y: u32,
    rect: &CopyRect,
) -> Result<(), EncodeError> {
    let fits = |origin: u32, extent: u32, limit: u32| {
        u64::from(origin) + u64::from(extent) <= u64::from(limit)
    };
    if fits(x, rect.width, buf.width) && fits(y, rect.height, buf.height) {
        return Ok(());
    }
    Err(EncodeError::RectOutOfBounds {
        surface,
        x,
        y,
        width: rect.width,
        height: rect.height,
        buf_width: buf.width,
        buf_height: buf.height,
    })
}

/// Reset `arena` and encode a copy of `rect` from `src` to `dst` into it.
///
/// On success the arena is sealed and holds a complete batch; returns `None` without touching
/// the arena when the rectangle is empty. On error the arena contents are unusable until the
/// next reset.
pub fn encode_copy(
    arena: &mut Arena,
    caps: &Caps,
    src: &ScratchBuf,
    dst: &ScratchBuf,
    rect: &CopyRect,
) -> Result<Option<BatchStats>, EncodeError> {
    if rect.is_empty() {
        tracing::debug!(?rect, "empty copy, nothing to encode");
        return Ok(None);
    }
    src.validate()?;
    dst.validate()?;
    check_rect("source", src, rect.src_x, rect.src_y, rect)?;
    check_rect("destination", dst, rect.dst_x, rect.dst_y, rect)?;

    arena.reset();
    let mut encoder = Gen7Encoder::new(arena, *caps);
    encoder.encode_copy(src, dst, rect)?;
    let offsets = encoder.offsets();

    let command_bytes = arena.finish()?;
    let stats = BatchStats {
        command_bytes,
        state_bytes: arena.state_cursor() - arena.split(),
        relocations: arena.relocations().len(),
        offsets,
    };
    tracing::debug!(
        command_bytes = stats.command_bytes,
        state_bytes = stats.state_bytes,
        relocations = stats.relocations,
        topology = %caps.topology,
        "encoded render copy"
    );
    Ok(Some(stats))
}

/// Copy a `width` x `height` rectangle from `src` at (`src_x`, `src_y`) to `dst` at
/// (`dst_x`, `dst_y`) by drawing it with the 3D pipeline.
///
/// The batch is encoded into `arena` and handed to `adapter`; nothing reaches the adapter if
/// encoding fails.
#[allow(clippy::too_many_arguments)]
pub fn render_copy<A: SubmissionAdapter + ?Sized>(
    arena: &mut Arena,
    caps: &Caps,
    adapter: &mut A,
    src: &ScratchBuf,
    src_x: u32,
    src_y: u32,
    width: u32,
    height: u32,
    dst: &ScratchBuf,
    dst_x: u32,
    dst_y: u32,
) -> Result<CopyOutcome, RenderCopyError> {
    let rect = CopyRect {
        src_x,
        src_y,
        dst_x,
        dst_y,
        width,
        height,
    };
    let Some(stats) = encode_copy(arena, caps, src, dst, &rect)? else {
        return Ok(CopyOutcome::Empty);
    };

    let batch = Batch::from_arena(arena)?;
    adapter.submit(&batch)?;
    Ok(CopyOutcome::Submitted(stats))
}
