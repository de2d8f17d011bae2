//! Tools served by a Model Context Protocol server over streamable HTTP.

pub mod bridge;
pub mod client;

pub use bridge::{bridge_tools, discover_tools, McpTool, McpToolCaller};
pub use client::{McpClient, McpToolSchema};
