pub mod viewer;

pub use viewer::{CameraPose, CaptureStream, ImageryHost, Presenter, Viewer};
