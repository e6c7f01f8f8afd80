pub mod config;
pub mod endpoints;
pub mod error;
pub mod headless;
pub mod imagery;
pub mod models;
pub mod reader;
pub mod recording;
pub mod render;
pub mod routes;
pub mod server;
pub mod session;
pub mod settings;
pub mod timeline;
pub mod tour;
pub mod traits;
pub mod utils;

pub use config::{Config, Source};
pub use server::CogtourServer;
pub use session::{SelectOptions, Session};
