pub mod config;
pub mod error;
pub mod text;

pub use error::{ToolError, ToolResult};
