//! Multi-agent orchestration over chat-completion models.
//!
//! This crate bundles the orchestration core with the model contract and the
//! MCP client. The crate also includes a CLI tool for inspecting MCP servers
//! from the terminal.

#![deny(missing_docs)]

pub use baton_core::*;

/// Re-exports of [`baton_model`] crate.
pub mod model {
    pub use baton_model::*;
}

/// Re-exports of [`baton_mcp`] crate.
pub mod mcp {
    pub use baton_mcp::*;
}
