use pretty_assertions::assert_eq;
use rendercopy::decode::{decode_commands, Opcode, COPY_SEQUENCE};
use rendercopy::gen7::{_3DPRIM_RECTLIST, _3DPRIM_TRILIST, PRIMITIVE_TOPOLOGY_MASK};
use rendercopy::state::SurfaceState;
use rendercopy::{
    encode_copy, Arena, ArenaConfig, BufferHandle, Caps, CopyRect, CopyTopology, Domains,
    EncodeError, ScratchBuf, Tiling, Vertex,
};

const BATCH: BufferHandle = BufferHandle(0x100);
const SRC: BufferHandle = BufferHandle(1);
const DST: BufferHandle = BufferHandle(2);

fn arena() -> Arena {
    Arena::new(BATCH, ArenaConfig::DEFAULT).unwrap()
}

fn bufs() -> (ScratchBuf, ScratchBuf) {
    (
        ScratchBuf::linear(SRC, 512, 512),
        ScratchBuf::tiled(DST, 512, 512, Tiling::X),
    )
}

fn rect() -> CopyRect {
    CopyRect {
        src_x: 16,
        src_y: 32,
        dst_x: 100,
        dst_y: 200,
        width: 128,
        height: 64,
    }
}

fn surface_at(arena: &Arena, offset: u32) -> SurfaceState {
    let start = offset as usize;
    let end = start + SurfaceState::SIZE_BYTES as usize;
    bytemuck::pod_read_unaligned(&arena.as_bytes()[start..end])
}

#[test]
fn commands_follow_pipeline_order() {
    let (src, dst) = bufs();
    for caps in [Caps::ivybridge(), Caps::haswell()] {
        let mut a = arena();
        encode_copy(&mut a, &caps, &src, &dst, &rect()).unwrap().unwrap();

        let end = a.batch_end().unwrap() as usize;
        let ops: Vec<Opcode> = decode_commands(&a.as_bytes()[..end])
            .unwrap()
            .into_iter()
            .map(|c| c.opcode)
            .collect();
        assert_eq!(ops, COPY_SEQUENCE.to_vec());
    }
}

#[test]
fn batch_ends_aligned_below_split() {
    let (src, dst) = bufs();
    let mut a = arena();
    let stats = encode_copy(&mut a, &Caps::ivybridge(), &src, &dst, &rect()).unwrap().unwrap();
    assert_eq!(stats.command_bytes % 8, 0);
    assert!(stats.command_bytes < a.split());
    assert!(a.cmd_cursor() <= stats.command_bytes);
    // Padding up to the aligned end is MI_NOOP.
    for off in (a.cmd_cursor()..stats.command_bytes).step_by(4) {
        assert_eq!(a.read_u32(off), Some(0));
    }
}

#[test]
fn encoding_is_deterministic() {
    let (src, dst) = bufs();
    let mut a = arena();
    encode_copy(&mut a, &Caps::haswell(), &src, &dst, &rect()).unwrap();
    let first = a.as_bytes().to_vec();
    let first_relocs = a.relocations().to_vec();

    // Dirty the arena with a different copy before re-encoding the first one.
    let other = CopyRect { width: 7, height: 9, ..rect() };
    encode_copy(&mut a, &Caps::haswell(), &src, &dst, &other).unwrap();
    encode_copy(&mut a, &Caps::haswell(), &src, &dst, &rect()).unwrap();

    assert!(a.as_bytes() == first.as_slice());
    assert_eq!(a.relocations(), first_relocs.as_slice());
}

#[test]
fn exactly_three_relocations_regardless_of_size() {
    for (w, h) in [(1, 1), (64, 3), (512, 512)] {
        let src = ScratchBuf::linear(SRC, 512, 512);
        let dst = ScratchBuf::linear(DST, 512, 512);
        let mut a = arena();
        let r = CopyRect { width: w, height: h, ..CopyRect::default() };
        let stats = encode_copy(&mut a, &Caps::ivybridge(), &src, &dst, &r).unwrap().unwrap();
        assert_eq!(stats.relocations, 3);
        assert_eq!(a.relocations().len(), 3);
        assert_eq!(a.base_relocations().len(), 3);
    }
}

#[test]
fn relocations_carry_surface_roles() {
    let (src, dst) = bufs();
    let mut a = arena();
    let stats = encode_copy(&mut a, &Caps::ivybridge(), &src, &dst, &rect()).unwrap().unwrap();
    let offsets = stats.offsets;

    let summary: Vec<(u32, BufferHandle, u32, Domains, Domains)> = a
        .relocations()
        .iter()
        .map(|r| (r.offset, r.target, r.delta, r.read_domains, r.write_domain))
        .collect();
    let vb_word = summary[0].0;
    assert_eq!(
        summary,
        vec![
            (vb_word, BATCH, offsets.geometry, Domains::VERTEX, Domains::empty()),
            (offsets.dst_surface + 4, DST, 0, Domains::RENDER, Domains::RENDER),
            (offsets.src_surface + 4, SRC, 0, Domains::SAMPLER, Domains::empty()),
        ]
    );
    assert!(vb_word < stats.command_bytes);
}

#[test]
fn binding_table_points_at_destination_then_source() {
    let (src, dst) = bufs();
    let mut a = arena();
    let stats = encode_copy(&mut a, &Caps::haswell(), &src, &dst, &rect()).unwrap().unwrap();
    let o = stats.offsets;
    assert_eq!(a.read_u32(o.binding_table), Some(o.dst_surface));
    assert_eq!(a.read_u32(o.binding_table + 4), Some(o.src_surface));

    let dst_ss = surface_at(&a, o.dst_surface);
    assert_eq!(dst_ss.tiling_raw(), Tiling::X as u32);
    assert_eq!((dst_ss.width(), dst_ss.height(), dst_ss.pitch()), (512, 512, 2048));
    assert_ne!(dst_ss.ss[7], 0);

    let src_ss = surface_at(&a, o.src_surface);
    assert_eq!(src_ss.tiling_raw(), Tiling::None as u32);
}

#[test]
fn state_records_respect_alignment() {
    let (src, dst) = bufs();
    let mut a = arena();
    let o = encode_copy(&mut a, &Caps::ivybridge(), &src, &dst, &rect()).unwrap().unwrap().offsets;
    for off in [o.blend, o.cc_viewport, o.sampler, o.dst_surface, o.src_surface, o.binding_table] {
        assert_eq!(off % 32, 0, "offset 0x{off:x}");
        assert!(off >= a.split());
    }
    assert_eq!(o.kernel % 64, 0);
    assert_eq!(o.geometry % 8, 0);
}

#[test]
fn geometry_and_topology_match_caps() {
    let (src, dst) = bufs();
    let cases = [
        (CopyTopology::RectList, _3DPRIM_RECTLIST),
        (CopyTopology::TriangleList, _3DPRIM_TRILIST),
    ];
    for (topology, prim) in cases {
        let mut a = arena();
        let caps = Caps::ivybridge().with_topology(topology);
        let o = encode_copy(&mut a, &caps, &src, &dst, &rect()).unwrap().unwrap().offsets;

        let end = a.batch_end().unwrap() as usize;
        let cmds = decode_commands(&a.as_bytes()[..end]).unwrap();
        let draw = cmds.iter().find(|c| c.opcode == Opcode::Primitive).unwrap();
        assert_eq!(draw.dword(1) & PRIMITIVE_TOPOLOGY_MASK, prim);
        assert_eq!(draw.dword(2), 3);

        let start = o.geometry as usize;
        let verts: [Vertex; 3] = bytemuck::pod_read_unaligned(&a.as_bytes()[start..start + 24]);
        for v in verts {
            assert_eq!((v.x - v.s, v.y - v.t), (84, 168));
        }
    }
}

#[test]
fn invalid_requests_are_rejected() {
    let (src, dst) = bufs();
    let mut a = arena();

    let beyond = CopyRect { dst_x: 400, ..rect() };
    assert!(matches!(
        encode_copy(&mut a, &Caps::ivybridge(), &src, &dst, &beyond),
        Err(EncodeError::RectOutOfBounds { surface: "destination", .. })
    ));

    let mut bad = src;
    bad.pitch = 100;
    assert!(matches!(
        encode_copy(&mut a, &Caps::ivybridge(), &bad, &dst, &rect()),
        Err(EncodeError::BadPitch { pitch: 100, .. })
    ));

    let huge_src = ScratchBuf::linear(SRC, 40000, 4);
    let far = CopyRect { src_x: 32700, dst_x: 0, width: 100, height: 1, ..CopyRect::default() };
    assert_eq!(
        encode_copy(&mut a, &Caps::ivybridge(), &huge_src, &dst, &far),
        Err(EncodeError::BadDimensions { width: 40000, height: 4, max: 16384 })
    );
}

#[test]
fn surfaces_wider_than_surface_state_fields_are_rejected() {
    let wide_src = ScratchBuf::linear(SRC, 20000, 2);
    let dst = ScratchBuf::linear(DST, 64, 2);
    let rect = CopyRect { src_x: 5000, width: 4, height: 1, ..CopyRect::default() };
    let mut a = arena();
    assert_eq!(
        encode_copy(&mut a, &Caps::haswell(), &wide_src, &dst, &rect),
        Err(EncodeError::BadDimensions { width: 20000, height: 2, max: 16384 })
    );
    // Nothing was encoded.
    assert_eq!(a.cmd_cursor(), 0);

    // The widest representable surface still encodes its full width.
    let widest = ScratchBuf::linear(SRC, 16384, 2);
    let rect = CopyRect { src_x: 16380, width: 4, height: 1, ..CopyRect::default() };
    let stats = encode_copy(&mut a, &Caps::haswell(), &widest, &dst, &rect).unwrap().unwrap();
    let ss = surface_at(&a, stats.offsets.src_surface);
    assert_eq!((ss.width(), ss.height(), ss.pitch()), (16384, 2, 65536));
}
