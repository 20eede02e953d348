//! The tick loop
//!
//! One [`Renderer::tick`] runs a full frame:
//!
//! 1. resize the output buffers if the last drain changed the Viewport
//! 2. record voxelization of dirty meshes and the scene grid, then render
//!    into the back buffer once both camera matrices are known
//! 3. swap the output buffers
//! 4. drain every inbound frame currently available
//! 5. send the front buffer if a Viewport has been received and no resize
//!    is waiting for the next tick

use fafnir_wire::{Frame, FrameReader, Transport};

use crate::app::camera::CameraState;
use crate::app::output::{OutputEncoder, OutputStatus};
use crate::core::config::RendererConfig;
use crate::core::time::TickStats;
use crate::core::types::{Result, UVec3};
use crate::gpu::{FrameInputs, RenderBackend};
use crate::scene::{DecodedPrimitive, MeshGeometry, Scene, SceneMessage};
use crate::voxel::Voxelizer;

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Inbound frames drained
    pub frames: usize,
    /// Mesh grids rebuilt
    pub voxelized: usize,
    pub rendered: bool,
    pub output: OutputStatus,
}

pub struct Renderer<B: RenderBackend, T: Transport> {
    backend: B,
    transport: T,
    reader: FrameReader,
    scene: Scene,
    voxelizer: Voxelizer,
    camera: CameraState,
    output: OutputEncoder,
    /// Output size requested by a Viewport, applied at the next tick start
    pending_resize: Option<(u32, u32)>,
    max_mesh_resolution: u32,
    stats: TickStats,
}

impl<B: RenderBackend, T: Transport> Renderer<B, T> {
    pub fn new(mut backend: B, transport: T, config: &RendererConfig) -> Result<Self> {
        let output = OutputEncoder::new(config.initial_width, config.initial_height, config.max_output_dimension);
        let (width, height) = output.size();
        if backend.output_size() != (width, height) {
            backend.resize_output(width, height)?;
        }

        let [x, y, z] = config.scene_resolution;
        Ok(Self {
            backend,
            transport,
            reader: FrameReader::new(config.recv_chunk_bytes, config.max_payload_bytes),
            scene: Scene::new(UVec3::new(x, y, z)),
            voxelizer: Voxelizer::new(config.overflow_capacity),
            camera: CameraState::new(),
            output,
            pending_resize: None,
            max_mesh_resolution: config.max_mesh_resolution,
            stats: TickStats::new(),
        })
    }

    /// Run one frame. An error is always fatal to the loop.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.stats.tick();

        if let Some((width, height)) = self.pending_resize.take() {
            recoverable(self.backend.resize_output(width, height))?;
        }

        let report = self.voxelizer.record(&mut self.backend, &self.scene);
        let camera = self.camera.matrices();
        if let Some((view, projection)) = camera {
            self.backend.render(&FrameInputs {
                view,
                projection,
                scene_bounds: report.scene_bounds,
                mesh_count: report.mesh_count,
            })?;
        }
        self.backend.submit()?;
        self.voxelizer.commit(&mut self.scene, &report);

        self.backend.swap();

        let frames = self.drain()?;

        let status = if self.output.is_ready() && self.pending_resize.is_none() {
            let (width, height) = self.backend.output_size();
            let pixels = self.backend.read_output()?;
            self.output.send(&mut self.transport, width, height, &pixels)?
        } else {
            OutputStatus::NotReady
        };
        match status {
            OutputStatus::Sent(_) => self.stats.record_sent(),
            OutputStatus::Skipped => self.stats.record_skipped(),
            OutputStatus::NotReady => {}
        }

        if let Some(report) = self.stats.poll_report() {
            log::info!(
                "{:.1} ticks/s, {} frames sent, {} skipped, {} bytes received",
                report.ticks_per_sec,
                report.frames_sent,
                report.frames_skipped,
                report.bytes_received
            );
        }

        Ok(TickOutcome {
            frames,
            voxelized: report.voxelized.len(),
            rendered: camera.is_some(),
            output: status,
        })
    }

    /// Apply every frame available without blocking
    fn drain(&mut self) -> Result<usize> {
        let mut frames = 0;
        while let Some(frame) = self.reader.try_read_frame(&mut self.transport)? {
            frames += 1;
            self.stats.record_received(frame.payload_size());
            self.apply_frame(&frame)?;
        }
        Ok(frames)
    }

    fn apply_frame(&mut self, frame: &Frame) -> Result<()> {
        let message = match SceneMessage::from_frame(frame) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping {:?}/{:?} frame: {}", frame.method, frame.data, e);
                return Ok(());
            }
        };

        match message {
            SceneMessage::Projection(projection) => self.camera.set_projection(projection),
            SceneMessage::View(view) => self.camera.set_view(view),
            SceneMessage::Viewport { width, height } => {
                let size = self.output.apply_viewport(width, height);
                self.pending_resize = (self.backend.output_size() != size).then_some(size);
            }
            SceneMessage::GeometryBatch(primitives) => self.upsert_batch(primitives)?,
            SceneMessage::RemoveMeshes(names) => {
                for name in names {
                    let removed = self.scene.registry_mut().remove_mesh(&mut self.backend, &name);
                    log::info!("Removed mesh {} ({} primitives)", name, removed);
                }
            }
        }
        Ok(())
    }

    /// Derive every primitive's geometry before touching the registry, so a
    /// bad primitive rejects the whole batch
    fn upsert_batch(&mut self, primitives: Vec<DecodedPrimitive>) -> Result<()> {
        let mut batch = Vec::with_capacity(primitives.len());
        for primitive in primitives {
            let key = primitive.key.clone();
            match MeshGeometry::new(primitive, self.max_mesh_resolution) {
                Ok(geometry) => batch.push((key, geometry)),
                Err(e) => {
                    log::warn!("Dropping GeometryBatch: {}", e);
                    return Ok(());
                }
            }
        }

        for (key, geometry) in batch {
            recoverable(self.scene.registry_mut().upsert(&mut self.backend, key, geometry))?;
        }
        Ok(())
    }

    /// Release every mesh's GPU resources
    pub fn shutdown(&mut self) {
        self.scene.registry_mut().clear(&mut self.backend);
        log::info!("Renderer shut down after {} ticks", self.stats.report().tick_count);
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn is_ready(&self) -> bool {
        self.output.is_ready()
    }
}

/// Log a non-fatal error and carry on; pass fatal ones up
fn recoverable(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if !e.is_fatal() => {
            log::error!("{}", e);
            Ok(())
        }
        other => other,
    }
}
