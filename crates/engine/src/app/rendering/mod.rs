mod raster;
mod renderer;

pub(crate) use renderer::DebugLayers;
pub use renderer::Renderer;
