//! A provider-neutral contract for chat-completion models.
//!
//! This crate establishes an unified protocol for the orchestration layer
//! to interact with various chat-completion backends, so that agents can
//! seamlessly switch between them without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. Concrete transports
//! (HTTP clients, SDK bindings, etc.) live in their own crates.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
