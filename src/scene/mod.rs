//! Scene ingestion: geometry decoding, mesh registry and scene bounds

pub mod decoder;
pub mod mesh;
pub mod message;
pub mod registry;
pub mod scene;

pub use decoder::{decode_batch, primitive_key, DecodeError, DecodedPrimitive};
pub use mesh::{MeshGeometry, MESH_AABB_INFLATION, SCENE_AABB_INFLATION};
pub use message::SceneMessage;
pub use registry::{Mesh, MeshRegistry};
pub use scene::Scene;
