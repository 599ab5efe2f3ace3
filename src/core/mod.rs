pub mod config;
pub mod config_loader;
pub mod error;
pub mod registry;
pub mod traits;
pub mod variables;

pub use error::*;
pub use registry::ShareRegistry;
pub use traits::*;
