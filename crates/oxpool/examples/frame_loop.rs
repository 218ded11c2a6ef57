//! Renders a few fake frames against the GPU pools and prints pool stats.
//!
//! ```sh
//! cargo run --example frame_loop
//! cargo run --example frame_loop -- --frames 120 --layers 4
//! RUST_LOG=oxpool=debug cargo run --example frame_loop
//! ```

use std::io;

use oxpool::gpu::{init_gpu, ComputeBufferDesc, TextureArrayDesc, TextureDesc};
use oxpool::PoolOptions;
use wgpu::TextureFormat;

struct Args {
    frames: u32,
    layers: u32,
    particles: u32,
}

fn parse_args() -> Args {
    let mut args = Args {
        frames: 60,
        layers: 3,
        particles: 4096,
    };

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--frames" => {
                i += 1;
                args.frames = raw[i].parse().expect("invalid --frames");
            }
            "--layers" => {
                i += 1;
                args.layers = raw[i].parse().expect("invalid --layers");
            }
            "--particles" => {
                i += 1;
                args.particles = raw[i].parse().expect("invalid --particles");
            }
            "-h" | "--help" => {
                eprintln!(
                    "oxpool frame_loop: exercise pooled GPU resources

Usage: cargo run --example frame_loop -- [options]

Options:
  --frames <n>       Frames to simulate (default: 60)
  --layers <n>       Layers in the shadow texture array (default: 3)
  --particles <n>    Particle buffer length (default: 4096)
  -h, --help         Show this help"
                );
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                std::process::exit(1);
            }
        }
        i += 1;
    }
    args
}

#[tokio::main]
async fn main() -> oxpool::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oxpool=info".parse().unwrap()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();
    let gpu = init_gpu().await?;
    let pools = gpu.pools(PoolOptions::labeled("frame"));

    let particles = ComputeBufferDesc::of::<[f32; 4]>(cli.particles);
    let shadow_layer = TextureDesc::new(512, 512, TextureFormat::Rgba8Unorm);
    let shadows = TextureArrayDesc::new(512, 512, cli.layers, TextureFormat::Rgba8Unorm);

    for frame in 0..cli.frames {
        {
            let state = pools.buffers.rent(&particles)?;
            let seed = vec![[frame as f32, 0.0, 0.0, 1.0]; cli.particles as usize];
            state.get()?.write(&gpu.queue, 0, &seed)?;

            // One layer more than the array holds, to show the over-supply warning.
            let layers: Vec<_> = (0..cli.layers + 1)
                .map(|_| pools.textures.rent(&shadow_layer))
                .collect::<oxpool::Result<_>>()?;
            let sources = layers
                .iter()
                .map(|lease| lease.get().and_then(|t| t.texture()))
                .collect::<oxpool::Result<Vec<_>>>()?;

            let array = pools.texture_arrays.rent(&shadows)?;
            let mut encoder = gpu.device.create_command_encoder(&Default::default());
            array.get()?.populate(&mut encoder, &sources)?;
            gpu.queue.submit(std::iter::once(encoder.finish()));
        }

        if frame % 10 == 9 {
            pools.clear_unused()?;
        }
    }

    for (name, stats) in pools.stats() {
        println!("{name:>15}: {stats:?}");
    }

    let released = pools.dispose()?;
    println!("released {released} resource(s)");
    Ok(())
}
