//! Tool surface over the engine.

pub mod builtin;
pub mod registry;
pub mod tool;

pub use builtin::register_engine_tools;
pub use registry::ToolRegistry;
pub use tool::*;
