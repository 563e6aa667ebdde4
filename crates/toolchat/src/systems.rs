pub mod club;
mod registry;
pub mod remote;
mod system;

pub use registry::ToolRegistry;
pub use system::System;
