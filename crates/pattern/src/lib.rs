pub mod config;
pub mod detector;
pub mod error;
pub mod loader;
pub mod window;

pub use config::{max_time_window, EventPattern, PatternConditions};
pub use detector::{PatternDetector, SYNTHETIC_SOURCE};
pub use error::PatternError;
pub use loader::load_patterns;
pub use window::WindowCache;
