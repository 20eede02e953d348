//! Fafnir - voxel renderer process
//!
//! Connects to the host tool, then ticks until the connection fails.

use std::net::TcpStream;

use fafnir::app::{output_dimension, Renderer};
use fafnir::core::time::TickScheduler;
use fafnir::core::{logging, BackendKind, Error, RendererConfig, Result};
use fafnir::gpu::{NullBackend, RenderBackend, WgpuBackend};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        log::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let config = RendererConfig::from_args(args)?;

    log::info!("Connecting to host at {}", config.host_addr);
    let stream = TcpStream::connect(&config.host_addr)?;
    stream.set_write_timeout(Some(config.send_timeout()))?;
    stream.set_nodelay(true)?;

    let width = output_dimension(config.initial_width, config.max_output_dimension);
    let height = output_dimension(config.initial_height, config.max_output_dimension);

    match config.backend {
        BackendKind::Wgpu => {
            let backend = pollster::block_on(WgpuBackend::new(&config, width, height))?;
            run_loop(backend, stream, &config)
        }
        BackendKind::Null => {
            log::info!("Using the null backend");
            run_loop(NullBackend::new(width, height), stream, &config)
        }
    }
}

fn run_loop<B: RenderBackend>(backend: B, stream: TcpStream, config: &RendererConfig) -> Result<()> {
    let mut renderer = Renderer::new(backend, stream, config)?;
    let mut scheduler = TickScheduler::new(config.tick_interval());
    log::info!("Ticking at {} Hz", config.tick_hz);

    let error: Error = loop {
        if let Err(e) = renderer.tick() {
            break e;
        }
        scheduler.wait();
    };

    renderer.shutdown();
    Err(error)
}
