//! Orchestration core: agents, the tool-dispatch loop, termination policy
//! and team topologies.
//!
//! An [`Agent`] is bound to a chat-completion model through a
//! [`ModelClient`]. A [`Controller`] drives an agent through the
//! tool-calling loop: it sends the history, dispatches the tool calls the
//! model requests, merges their [`ContextVariables`] deltas, follows
//! handoffs to other agents and records a [`Trace`]. Teams compose several
//! agents around one controller and a [`Terminator`].

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod context;
mod controller;
mod error;
mod model_client;
pub mod remote;
pub mod team;
mod terminator;
pub mod tool;
pub mod trace;

pub use agent::{Agent, AgentBuilder, DEFAULT_INSTRUCTION, Instruction};
pub use context::ContextVariables;
pub use controller::{
    Controller, ControllerBuilder, DEFAULT_MAX_TURNS, Response,
};
pub use error::{Abort, Error};
pub use model_client::{ChatCompletion, ModelClient, RetryConfig};
pub use team::{
    LeaderTeam, LinearTeam, RoundTeam, StopReason, Team, TeamResponse,
};
pub use terminator::{Operator, TerminationData, Terminator};
