pub mod core;
pub mod error;
pub(crate) mod ids;
pub(crate) mod math;
