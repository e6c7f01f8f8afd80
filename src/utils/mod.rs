pub mod geometry;
pub mod status;
pub mod style;
