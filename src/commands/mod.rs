pub mod camera;
pub mod config;
pub mod settings;

pub use camera::*;
pub use config::*;
pub use settings::*;
