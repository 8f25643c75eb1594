pub mod context;
pub mod frustum;
pub mod pipeline;
pub mod renderer;

pub use context::TerrainContext;
pub use frustum::{mesh_visible, CameraFrustum};
pub use renderer::{FrameCamera, TerrainRenderer};
