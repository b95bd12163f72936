use clap::{Parser, Subcommand, ValueEnum};
use farview_common::{CapabilitySet, RegionRect, TierRequest};
use farview_render::{MemorySurface, MemorySurfaceProvider, Renderer, WorkerOffloadRenderer};
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "farview-cli", about = "CLI tool for farview renderer operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TierArg {
    Auto,
    Software,
    RasterGpu,
    ModernGpu,
    WorkerOffload,
}

impl From<TierArg> for TierRequest {
    fn from(arg: TierArg) -> Self {
        match arg {
            TierArg::Auto => TierRequest::Automatic,
            TierArg::Software => TierRequest::Software,
            TierArg::RasterGpu => TierRequest::RasterGpu,
            TierArg::ModernGpu => TierRequest::ModernGpu,
            TierArg::WorkerOffload => TierRequest::WorkerOffload,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and a capability probe report
    Info {
        /// Probe the wgpu backend instead of the in-memory provider
        #[arg(long)]
        gpu: bool,
    },
    /// Run a synthetic dirty-rectangle workload through the factory
    Paint {
        /// Renderer tier to request
        #[arg(short, long, value_enum, default_value = "auto")]
        tier: TierArg,
        /// Surface width in pixels
        #[arg(long, default_value = "640")]
        width: u32,
        /// Surface height in pixels
        #[arg(long, default_value = "480")]
        height: u32,
        /// Number of frame ticks to simulate
        #[arg(long, default_value = "120")]
        ticks: u32,
        /// Dirty rectangles per tick
        #[arg(short, long, default_value = "8")]
        rects: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info { gpu } => {
            println!("farview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("render: {}", farview_render::crate_info());
            println!("render-wgpu: {}", farview_render_wgpu::crate_info());

            let caps = if gpu {
                farview_render::probe_detached(&farview_render_wgpu::WgpuSurfaceProvider::new())
            } else {
                farview_render::probe_detached(&MemorySurfaceProvider::full())
            };
            print_probe_report(&caps);
        }
        Commands::Paint {
            tier,
            width,
            height,
            ticks,
            rects,
        } => {
            let request: TierRequest = tier.into();
            let provider = MemorySurfaceProvider::full();
            let surface = MemorySurface::new(width, height);
            let handle = surface.handle();

            // The worker tier is built directly so its stats handle stays
            // readable after the surface moves to the paint thread; a
            // construction failure degrades to software like the factory
            // chain would.
            let mut worker_stats = None;
            let mut renderer: Box<dyn Renderer> = if matches!(request, TierRequest::WorkerOffload) {
                match WorkerOffloadRenderer::new(Box::new(surface)) {
                    Ok(worker) => {
                        worker_stats = Some(worker.stats());
                        Box::new(worker)
                    }
                    Err(unavailable) => {
                        tracing::warn!("worker tier unavailable: {}", unavailable.error);
                        farview_render::create_renderer(
                            TierRequest::Software,
                            &provider,
                            unavailable.surface,
                        )?
                    }
                }
            } else {
                farview_render::create_renderer(request, &provider, Box::new(surface))?
            };
            println!(
                "Synthetic paint: tier={}, surface={width}x{height}, ticks={ticks}, rects/tick={rects}",
                renderer.tier()
            );

            // A small tile marching across the surface in scanline order.
            let tile = 32u32.min(width).min(height).max(1);
            let cols = (width / tile).max(1);
            let rows = (height / tile).max(1);
            let pixels = vec![0xABu8; (tile * tile * 4) as usize];

            let start = Instant::now();
            for t in 0..ticks {
                for r in 0..rects {
                    let idx = t * rects + r;
                    let x = (idx % cols) * tile;
                    let y = (idx / cols % rows) * tile;
                    renderer.paint_region(RegionRect::new(x, y, tile, tile), &pixels);
                }
                renderer.present();
            }
            renderer.destroy();
            let elapsed = start.elapsed();

            let total_rects = ticks as u64 * rects as u64;
            println!(
                "Painted {total_rects} rects over {ticks} ticks in {:.2?} ({:.0} rects/s)",
                elapsed,
                total_rects as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
            );
            let counters = handle.counters();
            println!(
                "Surface counters: texture_uploads={}, draw_calls={}, texture_reallocs={}",
                counters.texture_uploads.load(Ordering::Relaxed),
                counters.draw_calls.load(Ordering::Relaxed),
                counters.texture_reallocs.load(Ordering::Relaxed)
            );
            if let Some(stats) = worker_stats {
                println!(
                    "Worker stats: frames_messages={}, rects_painted={}, rects_rejected={}",
                    stats.frames_messages.load(Ordering::Relaxed),
                    stats.rects_painted.load(Ordering::Relaxed),
                    stats.rects_rejected.load(Ordering::Relaxed)
                );
            }
        }
    }

    Ok(())
}

fn print_probe_report(caps: &CapabilitySet) {
    println!("Capability probe:");
    println!("  software:       {}", yes_no(caps.software));
    println!("  raster-gpu:     {}", yes_no(caps.raster_gpu));
    println!("  modern-gpu:     {}", yes_no(caps.modern_gpu));
    println!("  worker-offload: {}", yes_no(caps.worker_offload));
}

fn yes_no(supported: bool) -> &'static str {
    if supported { "yes" } else { "no" }
}
