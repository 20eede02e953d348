//! Development host for fafnir - plays the host-tool side of the socket
//!
//! Listens for the renderer, streams a viewport, a camera and a geometry
//! batch, then collects the RGB frames it sends back:
//! ```ignore
//! let listener = TcpListener::bind(("127.0.0.1", fafnir_wire::DEFAULT_PORT)).await?;
//! let (stream, _) = listener.accept().await?;
//! let mut session = HostSession::new(stream);
//! session.send_scene(&HostScene::demo(512, 256)).await?;
//! let image = session.read_output().await?;
//! ```

pub mod error;
pub mod scene;
pub mod session;
pub mod snapshot;

pub use error::HostError;
pub use scene::HostScene;
pub use session::{HostSession, ReceivedImage};
pub use snapshot::save_png;
