//! Byte addressing of linear and tiled surfaces.
//!
//! Tiles are 4 KiB. X tiles are 512 bytes by 8 rows, stored row-major. Y tiles are 128 bytes
//! by 32 rows, stored as eight 16-byte-wide columns of 32 rows each. Bit-6 swizzling is not
//! modelled.

use rendercopy::Tiling;

pub const TILE_SIZE: u64 = 4096;

const Y_COLUMN_BYTES: u64 = 16;

/// Offset of byte `x` of row `y` within a surface of `pitch` bytes per row.
///
/// `pitch` must be a multiple of the tile width for tiled surfaces.
pub fn byte_offset(tiling: Tiling, pitch: u32, x: u32, y: u32) -> u64 {
    let (x, y, pitch) = (u64::from(x), u64::from(y), u64::from(pitch));
    match tiling {
        Tiling::None => y * pitch + x,
        Tiling::X | Tiling::Y => {
            let tile_w = u64::from(tiling.tile_width());
            let tile_h = u64::from(tiling.tile_height());
            let tiles_per_row = pitch / tile_w;
            let tile = (y / tile_h) * tiles_per_row + x / tile_w;
            let (tx, ty) = (x % tile_w, y % tile_h);
            let within = match tiling {
                Tiling::X => ty * tile_w + tx,
                _ => {
                    let column = tx / Y_COLUMN_BYTES;
                    column * Y_COLUMN_BYTES * tile_h + ty * Y_COLUMN_BYTES + tx % Y_COLUMN_BYTES
                }
            };
            tile * TILE_SIZE + within
        }
    }
}
