//! GPU-accelerated widget rendering

pub mod backend;
pub mod plot;
pub mod renderer;
pub mod text;
pub mod vertex;
pub mod wgpu_backend;
