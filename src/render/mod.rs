//! Rendering: recorded graphics, the backend contract, drawables and surfaces.

pub mod backend;
pub(crate) mod cache;
/// Built-in software backend.
pub mod cpu;
pub mod drawable;
pub mod graphic;
pub mod scale;
pub(crate) mod surface;
