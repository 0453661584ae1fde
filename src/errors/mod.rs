mod mcp_error;
mod mold_error;
mod tool_error;

pub use mcp_error::{ErrorCode, McpError};
pub use mold_error::MoldError;
pub use tool_error::{ToolError, ToolErrorKind};
