pub mod geometry;
pub mod observation;
pub mod product;
pub mod style;

pub use geometry::{Bounds, DEFAULT_AOI_BOUNDS, GeoPoint};
pub use product::{Catalog, Product};
pub use style::ColourStop;
