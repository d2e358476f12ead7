//! MCP surface: JSON-RPC messages, tool definitions and the stdio server.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::McpServer;
