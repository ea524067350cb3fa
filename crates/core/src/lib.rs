pub mod config;
pub mod models;
pub mod registry;

pub use config::*;
pub use models::*;
pub use registry::*;
