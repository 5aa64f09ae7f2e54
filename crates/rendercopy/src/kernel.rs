//! The precompiled SIMD16 pixel-shader kernel.
//!
//! The kernel interpolates the texture coordinate from the setup payload, samples binding-table
//! entry 1 through sampler 0 and writes the result to the render target at binding-table
//! entry 0. It is copied into the state region verbatim.

/// Kernel instructions, one 128-bit EU instruction per row.
pub const PS_KERNEL: [[u32; 4]; 4] = [
    // Interpolate s.
    [0x0080005a, 0x214077bd, 0x000000c0, 0x008d0040],
    // Interpolate t.
    [0x0080005a, 0x218077bd, 0x000000d0, 0x008d0040],
    // Sample into g112..g119.
    [0x02800031, 0x2e001e3d, 0x00000140, 0x08840001],
    // Render-target write, end of thread.
    [0x05800031, 0x20001e3c, 0x00000e00, 0x90031000],
];

/// Size of [`PS_KERNEL`] in bytes.
pub const PS_KERNEL_SIZE: u32 = core::mem::size_of::<[[u32; 4]; 4]>() as u32;

/// First GRF holding the pixel-shader payload the kernel reads its barycentrics from.
pub const PS_DISPATCH_START_GRF: u32 = 6;
