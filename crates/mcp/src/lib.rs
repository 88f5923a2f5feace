//! A Model Context Protocol client.
//!
//! [`McpServer`] drives an [`rmcp`] client against an MCP server, either a
//! child process over stdio or a remote server over streamable HTTP, and
//! implements [`RemoteToolProvider`](baton_core::remote::RemoteToolProvider)
//! so its tools can be registered on agents next to local ones.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod convert;
mod error;
mod server;

pub use config::{DEFAULT_TIMEOUT, McpConfig, McpConfigBuilder, TransportConfig};
pub use error::{Error, ErrorKind};
pub use server::{McpServer, scoped};
