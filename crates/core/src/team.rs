//! Multi-agent conversation topologies.
//!
//! A team composes several agents, one [`Controller`] and a [`Terminator`]:
//!
//! - [`RoundTeam`] cycles through its agents over a shared log until the
//!   terminator fires.
//! - [`LinearTeam`] visits each agent once, passing every reply on to the
//!   next agent.
//! - [`LeaderTeam`] lets a leader delegate to subordinates through
//!   generated `transfer_to_*` tools.

mod leader;
mod linear;
mod round;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::Agent;
use crate::controller::{Controller, Response};
use crate::error::{Abort, Error};
use crate::terminator::{TerminationData, Terminator};
use crate::trace::Trace;
pub use leader::LeaderTeam;
pub use linear::LinearTeam;
pub use round::RoundTeam;

/// Why a team stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The terminator matched.
    Terminated,
    /// Every agent had its turn.
    Finished,
    /// A turn or time limit was hit.
    Aborted(Abort),
}

/// The result of a team run.
#[derive(Clone, Debug, PartialEq)]
pub struct TeamResponse {
    /// The agent that produced the last message.
    pub agent: Agent,
    /// The last message.
    pub message: Option<String>,
    /// The accumulated number of chat-completion turns.
    pub turns: usize,
    /// The number of agent activations.
    pub active_turns: usize,
    /// Why the team stopped.
    pub stop: StopReason,
}

/// A group of agents working on one task.
#[async_trait]
pub trait Team: Send {
    /// Runs the team on `task`.
    ///
    /// # Errors
    ///
    /// Aborts are reported through [`StopReason::Aborted`]. Model and tool
    /// failures, and teams that cannot run, are returned as errors.
    async fn run(&mut self, task: &str) -> Result<TeamResponse, Error>;

    /// Returns the participants.
    fn agents(&self) -> &[Agent];

    /// Returns the controller shared by the participants.
    fn controller(&self) -> &Controller;

    /// Returns the controller shared by the participants.
    fn controller_mut(&mut self) -> &mut Controller;

    /// Returns the trace of the shared controller.
    fn trace(&self) -> &Trace {
        self.controller().trace()
    }

    /// Clears the history of every participant.
    fn reset(&mut self) {
        for agent in self.agents() {
            agent.clear_messages();
        }
    }
}

/// Bookkeeping shared by the team variants.
struct Progress {
    started: Instant,
    agent: Agent,
    message: Option<String>,
    turns: usize,
    active_turns: usize,
}

impl Progress {
    fn new(agent: &Agent) -> Self {
        Self {
            started: Instant::now(),
            agent: agent.clone(),
            message: None,
            turns: 0,
            active_turns: 0,
        }
    }

    fn record(&mut self, response: Response) {
        self.turns += response.turns;
        self.active_turns += 1;
        self.agent = response.agent;
        self.message = response.message;
    }

    fn data(&self) -> TerminationData {
        TerminationData {
            message: self.message.clone(),
            turns: self.turns,
            active_turns: self.active_turns,
            elapsed: self.started.elapsed(),
        }
    }

    /// Feeds the latest state to `terminator`; returns `true` on a graceful
    /// stop.
    fn check(
        &self,
        terminator: Option<&mut Terminator>,
    ) -> Result<bool, Error> {
        let Some(terminator) = terminator else {
            return Ok(false);
        };
        terminator.update(&self.data());
        Ok(terminator.is_match()?)
    }

    fn finish(self, stop: StopReason) -> TeamResponse {
        TeamResponse {
            agent: self.agent,
            message: self.message,
            turns: self.turns,
            active_turns: self.active_turns,
            stop,
        }
    }

    /// Turns an abort into a response; other errors pass through.
    fn settle(
        self,
        result: Result<StopReason, Error>,
    ) -> Result<TeamResponse, Error> {
        match result {
            Ok(stop) => Ok(self.finish(stop)),
            Err(Error::Aborted(abort)) => {
                info!("team aborted: {abort}");
                Ok(self.finish(StopReason::Aborted(abort)))
            }
            Err(err) => Err(err),
        }
    }
}

impl Agent {
    /// Forms a [`RoundTeam`] of this agent and `other`.
    pub fn round_with(&self, other: &Agent) -> RoundTeam {
        RoundTeam::new([self.clone(), other.clone()])
    }

    /// Forms a [`LinearTeam`] where `other` follows this agent.
    pub fn then(&self, other: &Agent) -> LinearTeam {
        LinearTeam::new([self.clone(), other.clone()])
    }

    /// Forms a [`LeaderTeam`] led by this agent.
    pub fn lead<I: IntoIterator<Item = Agent>>(
        &self,
        subordinates: I,
    ) -> LeaderTeam {
        LeaderTeam::new(self.clone(), subordinates)
    }
}
