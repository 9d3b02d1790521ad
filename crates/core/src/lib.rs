pub mod config;
pub mod decision;
pub mod error;
pub mod event;

pub use config::Config;
pub use decision::*;
pub use error::*;
pub use event::*;
