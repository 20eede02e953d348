//! fafnir-host - stream a scene to a renderer and save what comes back
//!
//! ```text
//! fafnir-host [--port 4242] [--gltf scene.json] [--width 300] [--height 200]
//!             [--frames 10] [--out frame.png]
//! ```

use std::path::{Path, PathBuf};

use fafnir_host::{save_png, HostError, HostScene, HostSession};
use tokio::net::TcpListener;

struct Args {
    port: u16,
    gltf: Option<PathBuf>,
    width: u32,
    height: u32,
    frames: usize,
    out: PathBuf,
}

impl Args {
    fn parse(args: &[String]) -> Result<Self, HostError> {
        Ok(Self {
            port: parse_flag(args, "--port")?.unwrap_or(fafnir_wire::DEFAULT_PORT),
            gltf: flag_value(args, "--gltf").map(PathBuf::from),
            width: parse_flag(args, "--width")?.unwrap_or(300),
            height: parse_flag(args, "--height")?.unwrap_or(200),
            frames: parse_flag(args, "--frames")?.unwrap_or(10),
            out: flag_value(args, "--out").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("frame.png")),
        })
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    let position = args.iter().position(|a| a == flag)?;
    args.get(position + 1).map(String::as_str)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>, HostError> {
    flag_value(args, flag)
        .map(|value| {
            value
                .parse()
                .map_err(|_| HostError::Usage(format!("invalid value '{}' for {}", value, flag)))
        })
        .transpose()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<(), HostError> {
    let args = Args::parse(args)?;
    let scene = match &args.gltf {
        Some(path) => HostScene::from_file(args.width, args.height, path)?,
        None => HostScene::demo(args.width, args.height),
    };

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Waiting for the renderer on {}", addr);

    let (stream, peer) = listener.accept().await?;
    stream.set_nodelay(true)?;
    log::info!("Renderer connected from {}", peer);

    let mut session = HostSession::new(stream);
    session.send_scene(&scene).await?;

    let mut last = None;
    for n in 0..args.frames {
        let image = session.read_output().await?;
        log::info!("Frame {}: {}x{}", n + 1, image.width, image.height);
        last = Some(image);
    }

    match last {
        Some(image) => save_png(&image, Path::new(&args.out)),
        None => {
            log::warn!("No frames requested, nothing saved");
            Ok(())
        }
    }
}
