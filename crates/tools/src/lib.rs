pub mod action;
pub mod handlers;
pub mod registry;

pub use action::{ActionCategory, ActionHandler};
pub use handlers::{builtin_registry, MonitorAndReportTool, StubTool};
pub use registry::{RegistryError, ToolRegistry};
