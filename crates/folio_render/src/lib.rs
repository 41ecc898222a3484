pub mod camera;
pub mod gpu_context;
pub mod mesh;
pub mod pipeline;
pub mod probe;
pub mod surface;
pub mod vertex;

pub use camera::PerspectiveCamera;
pub use gpu_context::GpuContext;
pub use pipeline::SceneRenderer;
pub use probe::WgpuCapabilitySource;
pub use surface::WgpuSurface;
pub use vertex::{InstanceRaw, MeshVertex};
