pub mod consumer;
pub mod error;
pub mod memory;
pub mod normalizer;
pub mod reader;

pub use consumer::{StreamConsumer, StreamHealth, StreamMessage};
pub use error::StreamError;
pub use memory::MemoryStreamHub;
pub use normalizer::Normalizer;
pub use reader::{ContextSource, NullContextSource, StaticContextSource, StreamReader};
