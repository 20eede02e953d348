//! Renderer configuration
//!
//! Defaults, optionally overlaid by a JSON file (`--config <path>`), then by
//! individual command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::Error;
use crate::core::types::Result;

/// Which GPU backend drives voxelization and rendering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Headless wgpu device
    #[default]
    Wgpu,
    /// No GPU; tracks resources and emits a flat gray frame
    Null,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "wgpu" => Some(BackendKind::Wgpu),
            "null" => Some(BackendKind::Null),
            _ => None,
        }
    }
}

/// Configuration for the renderer process
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Address of the host tool's listening socket
    pub host_addr: String,
    /// Largest single receive while reassembling a payload
    pub recv_chunk_bytes: usize,
    /// Declared payload sizes above this are rejected
    pub max_payload_bytes: usize,
    /// Write timeout for one outbound image
    pub send_timeout_ms: u64,
    /// Tick cadence
    pub tick_hz: u32,
    pub backend: BackendKind,
    /// Output size used until the first Viewport arrives (rounded up to powers of two)
    pub initial_width: u32,
    pub initial_height: u32,
    /// Output dimensions are clamped to this power of two
    pub max_output_dimension: u32,
    /// Fixed resolution of the scene-level grid
    pub scene_resolution: [u32; 3],
    /// Per-axis cap on a mesh's derived voxel resolution
    pub max_mesh_resolution: u32,
    /// Number of (reference, next) pairs in every overflow list
    pub overflow_capacity: u32,
    /// Background gray level of rendered frames
    pub clear_color: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            host_addr: format!("127.0.0.1:{}", fafnir_wire::DEFAULT_PORT),
            recv_chunk_bytes: fafnir_wire::DEFAULT_CHUNK_BYTES,
            max_payload_bytes: fafnir_wire::DEFAULT_MAX_PAYLOAD_BYTES,
            send_timeout_ms: 2000,
            tick_hz: 60,
            backend: BackendKind::Wgpu,
            initial_width: 1506,
            initial_height: 871,
            max_output_dimension: 8192,
            scene_resolution: [16, 16, 16],
            max_mesh_resolution: 256,
            overflow_capacity: 1024 * 1024,
            clear_color: 0.2,
        }
    }
}

impl RendererConfig {
    /// Build from command-line arguments (including the program name)
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = match flag_value(args, "--config") {
            Some(path) => Self::load(Path::new(path))?,
            None => Self::default(),
        };

        if let Some(addr) = flag_value(args, "--host") {
            config.host_addr = addr.to_string();
        }
        if let Some(backend) = flag_value(args, "--backend") {
            config.backend = BackendKind::parse(backend)
                .ok_or_else(|| Error::Config(format!("unknown backend '{}'", backend)))?;
        }
        if let Some(hz) = flag_value(args, "--tick-hz") {
            config.tick_hz = hz
                .parse()
                .map_err(|_| Error::Config(format!("invalid tick rate '{}'", hz)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_hz == 0 {
            return Err(Error::Config("tick_hz must be positive".into()));
        }
        if self.recv_chunk_bytes == 0 {
            return Err(Error::Config("recv_chunk_bytes must be positive".into()));
        }
        if self.scene_resolution.contains(&0) || self.max_mesh_resolution == 0 {
            return Err(Error::Config("voxel resolutions must be positive".into()));
        }
        if self.overflow_capacity == 0 {
            return Err(Error::Config("overflow_capacity must be positive".into()));
        }
        if !self.max_output_dimension.is_power_of_two() || self.max_output_dimension > u16::MAX as u32 {
            return Err(Error::Config(format!(
                "max_output_dimension {} must be a power of two that fits 16 bits",
                self.max_output_dimension
            )));
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    for i in 0..args.len() {
        if args[i] == flag {
            if let Some(value) = args.get(i + 1) {
                return Some(value.as_str());
            }
        }
    }
    None
}
