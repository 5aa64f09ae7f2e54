//! Vertex data for the copy primitive.

use bytemuck::{Pod, Zeroable};

use crate::caps::CopyTopology;
use crate::error::EncodeError;

/// One vertex as fetched by `R16G16_SSCALED` elements: destination position then source texel.
///
/// Total size: 8 bytes (4 * i16).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Vertex {
    pub x: i16,
    pub y: i16,
    pub s: i16,
    pub t: i16,
}

impl Vertex {
    pub const SIZE_BYTES: u32 = core::mem::size_of::<Self>() as u32;
    /// Byte offset of the position pair.
    pub const POSITION_OFFSET: u32 = 0;
    /// Byte offset of the texture-coordinate pair.
    pub const TEXCOORD_OFFSET: u32 = 4;
}

/// Vertices per copy primitive, for either topology.
pub const COPY_VERTEX_COUNT: u32 = 3;

/// Source origin, destination origin and extent of one copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyRect {
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub width: u32,
    pub height: u32,
}

impl CopyRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn coord(base: u32, add: u32) -> Result<i16, EncodeError> {
    let v = u64::from(base) + u64::from(add);
    i16::try_from(v).map_err(|_| EncodeError::CoordinateOverflow(v))
}

fn vertex(rect: &CopyRect, dx: u32, dy: u32) -> Result<Vertex, EncodeError> {
    Ok(Vertex {
        x: coord(rect.dst_x, dx)?,
        y: coord(rect.dst_y, dy)?,
        s: coord(rect.src_x, dx)?,
        t: coord(rect.src_y, dy)?,
    })
}

/// The three vertices describing `rect`.
///
/// Texture coordinates are the source origin offset by the same amount as the destination
/// corner, so the mapping is 1:1 and unscaled.
pub fn copy_vertices(rect: &CopyRect, topology: CopyTopology) -> Result<[Vertex; 3], EncodeError> {
    let (w, h) = (rect.width, rect.height);
    match topology {
        // Bottom-right, bottom-left, top-left; the hardware infers the fourth corner.
        CopyTopology::RectList => Ok([
            vertex(rect, w, h)?,
            vertex(rect, 0, h)?,
            vertex(rect, 0, 0)?,
        ]),
        CopyTopology::TriangleList => Ok([
            vertex(rect, 0, h)?,
            vertex(rect, w / 2, 0)?,
            vertex(rect, w, h)?,
        ]),
    }
}
