use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rendercopy::{
    render_copy, Arena, ArenaConfig, Caps, CopyOutcome, CopyTopology, Generation, ScratchBuf,
    Tiling,
};
use rendercopy_sim::SimDevice;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rendercopy-blits",
    about = "Drive gen7 render-engine copies through the software device and verify the results."
)]
struct Args {
    /// Hardware generation preset (ivb or hsw)
    #[arg(long = "gen", value_name = "GEN", default_value = "ivb")]
    generation: Generation,

    /// Primitive used to cover the destination rectangle
    #[arg(long, value_enum, default_value_t = TopologyArg::Rectlist)]
    topology: TopologyArg,

    /// Memory layout of every allocated surface
    #[arg(long, value_enum, default_value_t = TilingArg::Linear)]
    tiling: TilingArg,

    /// Seed for the random blit phase
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log at debug level (otherwise RUST_LOG decides)
    #[arg(long, short, action = clap::ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cyclic forward, cyclic backward and random blits over N buffers of incrementing values
    Linear {
        /// Number of buffers
        #[arg(long, default_value_t = 4)]
        count: u32,
        #[arg(long, default_value_t = 512)]
        width: u32,
        #[arg(long, default_value_t = 512)]
        height: u32,
    },
    /// Copy solid-colour sources into fresh destinations, optionally dumping them as PNG
    Fill {
        /// Number of copies
        #[arg(long, default_value_t = 4)]
        count: u32,
        #[arg(long, default_value_t = 512)]
        width: u32,
        #[arg(long, default_value_t = 512)]
        height: u32,
        /// Write each destination to <DIR>/blit-<i>.png
        #[arg(long, value_name = "DIR")]
        png_dir: Option<PathBuf>,
    },
    /// Load an image, copy it through one render copy and save the destination as PNG
    Dup {
        src: PathBuf,
        dst: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TopologyArg {
    Rectlist,
    Trilist,
}

impl From<TopologyArg> for CopyTopology {
    fn from(value: TopologyArg) -> Self {
        match value {
            TopologyArg::Rectlist => CopyTopology::RectList,
            TopologyArg::Trilist => CopyTopology::TriangleList,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TilingArg {
    Linear,
    X,
    Y,
}

impl From<TilingArg> for Tiling {
    fn from(value: TilingArg) -> Self {
        match value {
            TilingArg::Linear => Tiling::None,
            TilingArg::X => Tiling::X,
            TilingArg::Y => Tiling::Y,
        }
    }
}

/// Shared state of one run: the device, its batch arena and the copy configuration.
struct Blitter {
    dev: SimDevice,
    arena: Arena,
    caps: Caps,
    tiling: Tiling,
}

impl Blitter {
    fn new(caps: Caps, tiling: Tiling) -> anyhow::Result<Self> {
        let mut dev = SimDevice::new();
        let arena = dev
            .create_arena(ArenaConfig::DEFAULT)
            .context("allocate batch buffer")?;
        Ok(Self {
            dev,
            arena,
            caps,
            tiling,
        })
    }

    fn create(&mut self, width: u32, height: u32) -> anyhow::Result<ScratchBuf> {
        self.dev
            .create_scratch(width, height, self.tiling)
            .with_context(|| format!("allocate {width}x{height} surface"))
    }

    fn copy(&mut self, src: &ScratchBuf, dst: &ScratchBuf) -> anyhow::Result<()> {
        let outcome = render_copy(
            &mut self.arena,
            &self.caps,
            &mut self.dev,
            src,
            0,
            0,
            src.width,
            src.height,
            dst,
            0,
            0,
        )
        .with_context(|| format!("copy {:?} -> {:?}", src.handle, dst.handle))?;
        if let CopyOutcome::Submitted(stats) = outcome {
            tracing::debug!(
                src = ?src.handle,
                dst = ?dst.handle,
                command_bytes = stats.command_bytes,
                state_bytes = stats.state_bytes,
                "blit"
            );
        }
        Ok(())
    }

    fn check(&self, buf: &ScratchBuf, expected: impl Fn(u32, u32) -> u32) -> anyhow::Result<()> {
        let pixels = self
            .dev
            .read_pixels(buf)
            .with_context(|| format!("read back {:?}", buf.handle))?;
        for (i, &found) in pixels.iter().enumerate() {
            let (x, y) = (i as u32 % buf.width, i as u32 / buf.width);
            let want = expected(x, y);
            if found != want {
                bail!(
                    "expected 0x{want:08x}, found 0x{found:08x} at ({x},{y}) of {:?}",
                    buf.handle
                );
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let caps = Caps::for_generation(args.generation).with_topology(args.topology.into());
    if caps.topology == CopyTopology::TriangleList {
        tracing::warn!("trilist leaves part of each rectangle uncovered; expect verification to fail");
    }
    let mut blitter = Blitter::new(caps, args.tiling.into())?;

    match args.command {
        Command::Linear { count, width, height } => {
            linear_blits(&mut blitter, count, width, height, args.seed)?;
            println!("linear: {count} buffers verified after forward, backward and random blits");
        }
        Command::Fill {
            count,
            width,
            height,
            png_dir,
        } => {
            fill_blits(&mut blitter, count, width, height, png_dir.as_deref())?;
            println!("fill: {count} copies verified");
        }
        Command::Dup { src, dst } => {
            let (width, height) = dup_png(&mut blitter, &src, &dst)?;
            println!("dup: {width}x{height} {} -> {}", src.display(), dst.display());
        }
    }
    Ok(())
}

fn linear_blits(
    blitter: &mut Blitter,
    count: u32,
    width: u32,
    height: u32,
    seed: u64,
) -> anyhow::Result<()> {
    if count < 2 {
        bail!("--count must be at least 2 (got {count})");
    }
    let pixels = width
        .checked_mul(height)
        .with_context(|| format!("{width}x{height} surface is too large"))?;
    let n = count as usize;

    let mut bufs = Vec::with_capacity(n);
    let mut start_vals = Vec::with_capacity(n);
    for i in 0..count {
        let buf = blitter.create(width, height)?;
        let start = i.wrapping_mul(pixels);
        blitter
            .dev
            .fill_pixels(&buf, |x, y| start.wrapping_add(y * width + x))
            .context("fill source")?;
        bufs.push(buf);
        start_vals.push(start);
    }

    let verify = |blitter: &Blitter, start_vals: &[u32], phase: &str| -> anyhow::Result<()> {
        for (buf, &start) in bufs.iter().zip(start_vals) {
            blitter
                .check(buf, |x, y| start.wrapping_add(y * width + x))
                .with_context(|| format!("{phase} phase"))?;
        }
        Ok(())
    };

    for i in 0..4 * n {
        let (src, dst) = (i % n, (i + 1) % n);
        blitter.copy(&bufs[src], &bufs[dst])?;
        start_vals[dst] = start_vals[src];
    }
    verify(blitter, &start_vals, "forward")?;

    for i in 0..4 * n {
        let (src, dst) = ((i + 1) % n, i % n);
        blitter.copy(&bufs[src], &bufs[dst])?;
        start_vals[dst] = start_vals[src];
    }
    verify(blitter, &start_vals, "backward")?;

    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..4 * n {
        let src = rng.gen_range(0..n);
        let dst = rng.gen_range(0..n);
        if src == dst {
            continue;
        }
        blitter.copy(&bufs[src], &bufs[dst])?;
        start_vals[dst] = start_vals[src];
    }
    verify(blitter, &start_vals, "random")?;

    Ok(())
}

fn fill_colour(i: u32) -> u32 {
    0xFFFF_0000u32.wrapping_sub(i.wrapping_mul(0x0411_0000))
}

fn fill_blits(
    blitter: &mut Blitter,
    count: u32,
    width: u32,
    height: u32,
    png_dir: Option<&Path>,
) -> anyhow::Result<()> {
    if let Some(dir) = png_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    for i in 0..count {
        let colour = fill_colour(i);
        let src = blitter.create(width, height)?;
        let dst = blitter.create(width, height)?;
        blitter.dev.fill_pixels(&src, |_, _| colour).context("fill source")?;

        blitter.copy(&src, &dst)?;
        blitter
            .check(&dst, |_, _| colour)
            .with_context(|| format!("copy {i} (colour 0x{colour:08x})"))?;

        if let Some(dir) = png_dir {
            let path = dir.join(format!("blit-{i}.png"));
            write_png(&blitter.dev, &dst, &path)?;
            tracing::info!(path = %path.display(), "wrote destination");
        }
    }
    Ok(())
}

/// Copy the image at `src` into a fresh surface and write that surface to `dst`.
fn dup_png(blitter: &mut Blitter, src: &Path, dst: &Path) -> anyhow::Result<(u32, u32)> {
    let img = image::open(src)
        .with_context(|| format!("read {}", src.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();

    let src_buf = blitter.create(width, height)?;
    let dst_buf = blitter.create(width, height)?;
    blitter
        .dev
        .fill_pixels(&src_buf, |x, y| {
            let [r, g, b, a] = img.get_pixel(x, y).0;
            u32::from_le_bytes([b, g, r, a])
        })
        .context("upload source image")?;

    blitter.copy(&src_buf, &dst_buf)?;
    write_png(&blitter.dev, &dst_buf, dst)?;
    tracing::info!(src = %src.display(), dst = %dst.display(), width, height, "duplicated image");
    Ok((width, height))
}

/// Save an ARGB32 surface as an RGBA8 PNG.
fn write_png(dev: &SimDevice, buf: &ScratchBuf, path: &Path) -> anyhow::Result<()> {
    let pixels = dev
        .read_pixels(buf)
        .with_context(|| format!("read back {:?}", buf.handle))?;
    let rgba: Vec<u8> = pixels
        .iter()
        .flat_map(|&argb| {
            let [b, g, r, a] = argb.to_le_bytes();
            [r, g, b, a]
        })
        .collect();
    let img = image::RgbaImage::from_raw(buf.width, buf.height, rgba)
        .context("pixel buffer does not match surface size")?;
    img.save(path).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
