//! Reference executor for render-copy batches.
//!
//! Decodes the command region, tracks the state the copy programs and, on `3DPRIMITIVE`,
//! performs the draw in software: vertices are fetched through the vertex-buffer address and
//! element layout, the primitive is rasterized at pixel centres, and each covered pixel takes
//! the nearest source texel (clamped to the surface) through the binding table. The pixel
//! shader is recognised, not interpreted: only the copy kernel is accepted.

use bytemuck::Pod;
use rendercopy::decode::{decode_commands, Command, Opcode};
use rendercopy::gen7::*;
use rendercopy::kernel::PS_KERNEL;
use rendercopy::state::{BlendState, SamplerState, SurfaceState};
use rendercopy::{CopyTopology, Tiling, BYTES_PER_PIXEL};

use crate::error::ExecError;
use crate::memory::GpuMemory;
use crate::tiling::byte_offset;

/// Summary of one executed batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecStats {
    pub commands: usize,
    pub primitives: u32,
    pub pixels_written: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VertexElement {
    buffer_index: u32,
    format: u32,
    offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct VertexBuffer {
    address: u64,
    pitch: u32,
}

/// A bound 2D surface, resolved to graphics addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Surface {
    address: u64,
    width: u32,
    height: u32,
    pitch: u32,
    tiling: Tiling,
}

impl Surface {
    fn pixel_address(&self, x: u32, y: u32) -> u64 {
        self.address + byte_offset(self.tiling, self.pitch, x * BYTES_PER_PIXEL, y)
    }
}

#[derive(Clone, Copy, Debug)]
struct RasterVertex {
    x: f64,
    y: f64,
    s: f64,
    t: f64,
}

#[derive(Debug, Default)]
struct PipelineState {
    pipeline_3d: bool,
    surface_base: Option<u64>,
    dynamic_base: Option<u64>,
    instruction_base: Option<u64>,
    blend: Option<u32>,
    sampler: Option<u32>,
    binding_table: Option<u32>,
    kernel: Option<u32>,
    binding_table_entries: u32,
    elements: Vec<VertexElement>,
    vertex_buffer: Option<VertexBuffer>,
}

fn base_address(dword: u32) -> Option<u64> {
    (dword & BASE_ADDRESS_MODIFY != 0).then_some(u64::from(dword & !0xfff))
}

fn require<T>(value: Option<T>, what: &'static str) -> Result<T, ExecError> {
    value.ok_or(ExecError::MissingState(what))
}

/// Executes batches against a [`GpuMemory`].
pub struct Executor<'m, M: GpuMemory + ?Sized> {
    mem: &'m mut M,
    state: PipelineState,
    stats: ExecStats,
}

impl<'m, M: GpuMemory + ?Sized> Executor<'m, M> {
    pub fn new(mem: &'m mut M) -> Self {
        Self {
            mem,
            state: PipelineState::default(),
            stats: ExecStats::default(),
        }
    }

    /// Run the `len`-byte command region at `batch_address`.
    pub fn execute(mut self, batch_address: u64, len: u32) -> Result<ExecStats, ExecError> {
        let mut bytes = vec![0u8; len as usize];
        self.mem.read(batch_address, &mut bytes)?;
        let commands = decode_commands(&bytes)?;
        for cmd in &commands {
            tracing::trace!(offset = cmd.offset, opcode = %cmd.opcode, "exec");
            self.dispatch(cmd)?;
            self.stats.commands += 1;
        }
        Ok(self.stats)
    }

    fn read_pod<T: Pod>(&self, address: u64) -> Result<T, ExecError> {
        let mut value: T = bytemuck::Zeroable::zeroed();
        self.mem.read(address, bytemuck::bytes_of_mut(&mut value))?;
        Ok(value)
    }

    fn dispatch(&mut self, cmd: &Command) -> Result<(), ExecError> {
        match cmd.opcode {
            Opcode::MiNoop | Opcode::MiBatchBufferEnd => return Ok(()),
            Opcode::PipelineSelect => {
                self.state.pipeline_3d = cmd.dword(0) & 0x3 == PIPELINE_SELECT_3D;
                return Ok(());
            }
            Opcode::StateBaseAddress => {
                let state = &mut self.state;
                state.surface_base = base_address(cmd.dword(2)).or(state.surface_base);
                state.dynamic_base = base_address(cmd.dword(3)).or(state.dynamic_base);
                state.instruction_base = base_address(cmd.dword(5)).or(state.instruction_base);
                return Ok(());
            }
            _ => {}
        }

        if !self.state.pipeline_3d {
            return Err(ExecError::Not3d(cmd.opcode.name()));
        }
        match cmd.opcode {
            Opcode::BlendStatePointers => self.state.blend = Some(cmd.dword(1)),
            Opcode::SamplerStatePointersPs => self.state.sampler = Some(cmd.dword(1)),
            Opcode::BindingTablePointersPs => self.state.binding_table = Some(cmd.dword(1)),
            Opcode::Ps => {
                self.state.kernel = Some(cmd.dword(1) & !0x3f);
                self.state.binding_table_entries =
                    (cmd.dword(2) >> PS_BINDING_TABLE_ENTRY_COUNT_SHIFT) & 0xff;
            }
            Opcode::VertexElements => {
                self.state.elements = cmd.dwords[1..]
                    .chunks_exact(2)
                    .filter(|pair| pair[0] & VE0_VALID != 0)
                    .map(|pair| VertexElement {
                        buffer_index: pair[0] >> VE0_VERTEX_BUFFER_INDEX_SHIFT,
                        format: (pair[0] >> VE0_FORMAT_SHIFT) & SURFACE_FORMAT_MASK,
                        offset: (pair[0] >> VE0_OFFSET_SHIFT) & 0x7ff,
                    })
                    .collect();
            }
            Opcode::VertexBuffers => {
                let dw1 = cmd.dword(1);
                if dw1 >> VB0_BUFFER_INDEX_SHIFT == 0 {
                    self.state.vertex_buffer = Some(VertexBuffer {
                        address: u64::from(cmd.dword(2)),
                        pitch: (dw1 >> VB0_BUFFER_PITCH_SHIFT) & VB0_BUFFER_PITCH_MASK,
                    });
                }
            }
            Opcode::Primitive => self.draw(cmd)?,
            _ => {}
        }
        Ok(())
    }

    fn surface(&self, surface_base: u64, offset: u32) -> Result<Surface, ExecError> {
        let ss: SurfaceState = self.read_pod(surface_base + u64::from(offset))?;
        if ss.surface_type() != SURFACE_2D {
            return Err(ExecError::UnsupportedSurface(format!("type {}", ss.surface_type())));
        }
        if ss.format() != SURFACEFORMAT_B8G8R8A8_UNORM {
            return Err(ExecError::UnsupportedSurface(format!("format 0x{:x}", ss.format())));
        }
        let tiling = Tiling::from_u32(ss.tiling_raw())
            .ok_or_else(|| ExecError::UnsupportedSurface(format!("tiling {}", ss.tiling_raw())))?;
        Ok(Surface {
            address: u64::from(ss.base_address()),
            width: ss.width(),
            height: ss.height(),
            pitch: ss.pitch(),
            tiling,
        })
    }

    fn check_fixed_function(
        &self,
        dynamic_base: u64,
        instruction_base: u64,
    ) -> Result<(), ExecError> {
        let kernel = require(self.state.kernel, "a pixel shader")?;
        let blob: [[u32; 4]; 4] = self.read_pod(instruction_base + u64::from(kernel))?;
        if blob != PS_KERNEL {
            return Err(ExecError::UnsupportedKernel);
        }

        let blend = require(self.state.blend, "blend state")?;
        let blend: BlendState = self.read_pod(dynamic_base + u64::from(blend))?;
        if blend.blend0 != BlendState::replace().blend0 {
            return Err(ExecError::UnsupportedBlend(blend.blend0));
        }

        let sampler = require(self.state.sampler, "sampler state")?;
        let sampler: SamplerState = self.read_pod(dynamic_base + u64::from(sampler))?;
        if sampler.min_filter() != MAPFILTER_NEAREST || sampler.mag_filter() != MAPFILTER_NEAREST {
            return Err(ExecError::UnsupportedSampler(sampler.ss[0]));
        }
        if !sampler.non_normalized() {
            return Err(ExecError::UnsupportedSampler(sampler.ss[3]));
        }
        Ok(())
    }

    fn fetch_vertex(
        &self,
        vb: VertexBuffer,
        index: u32,
        pos: VertexElement,
        tex: VertexElement,
    ) -> Result<RasterVertex, ExecError> {
        let base = vb.address + u64::from(index) * u64::from(vb.pitch);
        let pair = |raw: u32| (raw as u16 as i16, (raw >> 16) as u16 as i16);
        let (x, y) = pair(self.mem.read_u32(base + u64::from(pos.offset))?);
        let (s, t) = pair(self.mem.read_u32(base + u64::from(tex.offset))?);
        Ok(RasterVertex {
            x: f64::from(x),
            y: f64::from(y),
            s: f64::from(s),
            t: f64::from(t),
        })
    }

    fn draw(&mut self, cmd: &Command) -> Result<(), ExecError> {
        let prim = cmd.dword(1) & PRIMITIVE_TOPOLOGY_MASK;
        let topology =
            CopyTopology::from_prim_type(prim).ok_or(ExecError::UnsupportedTopology(prim))?;
        let count = cmd.dword(2);
        let start = cmd.dword(3);
        if count % 3 != 0 {
            return Err(ExecError::BadVertexCount(count));
        }

        let surface_base = require(self.state.surface_base, "a surface state base address")?;
        let dynamic_base = require(self.state.dynamic_base, "a dynamic state base address")?;
        let instruction_base = require(self.state.instruction_base, "an instruction base address")?;
        self.check_fixed_function(dynamic_base, instruction_base)?;

        let table = require(self.state.binding_table, "a binding table")?;
        if self.state.binding_table_entries < 2 {
            return Err(ExecError::MissingState("two binding table entries"));
        }
        let table = surface_base + u64::from(table);
        let dst = self.surface(surface_base, self.mem.read_u32(table)?)?;
        let src = self.surface(surface_base, self.mem.read_u32(table + 4)?)?;

        let vb = require(self.state.vertex_buffer, "a vertex buffer")?;
        let mut scaled = self
            .state
            .elements
            .iter()
            .filter(|e| e.buffer_index == 0 && e.format == SURFACEFORMAT_R16G16_SSCALED);
        let pos = *scaled.next().ok_or(ExecError::BadVertexElements("a position"))?;
        let tex = *scaled.next().ok_or(ExecError::BadVertexElements("a texture coordinate"))?;

        for first in (0..count).step_by(3) {
            let v = [
                self.fetch_vertex(vb, start + first, pos, tex)?,
                self.fetch_vertex(vb, start + first + 1, pos, tex)?,
                self.fetch_vertex(vb, start + first + 2, pos, tex)?,
            ];
            let pixels = self.rasterize(topology, v, &src, &dst)?;
            tracing::debug!(%topology, pixels, "rasterized primitive");
            self.stats.primitives += 1;
            self.stats.pixels_written += pixels;
        }
        Ok(())
    }

    fn rasterize(
        &mut self,
        topology: CopyTopology,
        v: [RasterVertex; 3],
        src: &Surface,
        dst: &Surface,
    ) -> Result<u64, ExecError> {
        let edge = |a: &RasterVertex, b: &RasterVertex, px: f64, py: f64| {
            (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
        };
        let area = edge(&v[0], &v[1], v[2].x, v[2].y);
        if area == 0.0 {
            return Ok(0);
        }

        let lo = |f: fn(&RasterVertex) -> f64| v.iter().map(f).fold(f64::INFINITY, f64::min);
        let hi = |f: fn(&RasterVertex) -> f64| v.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
        let min_x = lo(|v| v.x).max(0.0);
        let max_x = hi(|v| v.x).min(f64::from(dst.width));
        let min_y = lo(|v| v.y).max(0.0);
        let max_y = hi(|v| v.y).min(f64::from(dst.height));
        if min_x >= max_x || min_y >= max_y {
            return Ok(0);
        }

        let mut written = 0;
        for py in min_y.floor() as u32..max_y.ceil() as u32 {
            for px in min_x.floor() as u32..max_x.ceil() as u32 {
                let (cx, cy) = (f64::from(px) + 0.5, f64::from(py) + 0.5);
                let w0 = edge(&v[1], &v[2], cx, cy) / area;
                let w1 = edge(&v[2], &v[0], cx, cy) / area;
                let w2 = edge(&v[0], &v[1], cx, cy) / area;
                let covered = match topology {
                    // The parallelogram completed by the three corners; for axis-aligned input
                    // this is the bounding box.
                    CopyTopology::RectList => {
                        (min_x..max_x).contains(&cx) && (min_y..max_y).contains(&cy)
                    }
                    CopyTopology::TriangleList => w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0,
                };
                if !covered {
                    continue;
                }

                let s = w0 * v[0].s + w1 * v[1].s + w2 * v[2].s;
                let t = w0 * v[0].t + w1 * v[1].t + w2 * v[2].t;
                let sx = (s.floor().max(0.0) as u32).min(src.width - 1);
                let ty = (t.floor().max(0.0) as u32).min(src.height - 1);

                let texel = self.mem.read_u32(src.pixel_address(sx, ty))?;
                self.mem.write_u32(dst.pixel_address(px, py), texel)?;
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Gtt;

    fn header_only(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn batch(gtt: &mut Gtt, words: &[u32]) -> (u64, u32) {
        let bytes = header_only(words);
        let handle = gtt.allocate(bytes.len() as u64).unwrap();
        let address = gtt.address(handle).unwrap();
        gtt.write(address, &bytes).unwrap();
        (address, bytes.len() as u32)
    }

    #[test]
    fn state_commands_require_3d_pipeline() {
        let mut gtt = Gtt::new();
        let (address, len) = batch(
            &mut gtt,
            &[header(_3DSTATE_SAMPLE_MASK, 2), 1, MI_BATCH_BUFFER_END, 0],
        );
        let err = Executor::new(&mut gtt).execute(address, len).unwrap_err();
        assert_eq!(err, ExecError::Not3d("3DSTATE_SAMPLE_MASK"));
    }

    #[test]
    fn draw_without_state_is_rejected() {
        let mut gtt = Gtt::new();
        let (address, len) = batch(
            &mut gtt,
            &[
                PIPELINE_SELECT | PIPELINE_SELECT_3D,
                header(_3DPRIMITIVE, 7),
                _3DPRIM_RECTLIST,
                3,
                0,
                1,
                0,
                0,
                MI_BATCH_BUFFER_END,
                0,
            ],
        );
        let err = Executor::new(&mut gtt).execute(address, len).unwrap_err();
        assert!(matches!(err, ExecError::MissingState(_)));
    }

    #[test]
    fn unknown_topology_is_rejected() {
        let mut gtt = Gtt::new();
        let (address, len) = batch(
            &mut gtt,
            &[
                PIPELINE_SELECT | PIPELINE_SELECT_3D,
                header(_3DPRIMITIVE, 7),
                0x05,
                3,
                0,
                1,
                0,
                0,
                MI_BATCH_BUFFER_END,
                0,
            ],
        );
        let err = Executor::new(&mut gtt).execute(address, len).unwrap_err();
        assert_eq!(err, ExecError::UnsupportedTopology(0x05));
    }

    #[test]
    fn empty_batch_counts_commands() {
        let mut gtt = Gtt::new();
        let (address, len) = batch(&mut gtt, &[MI_NOOP, MI_BATCH_BUFFER_END]);
        let stats = Executor::new(&mut gtt).execute(address, len).unwrap();
        assert_eq!(stats, ExecStats { commands: 2, ..ExecStats::default() });
    }
}
