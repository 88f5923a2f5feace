use async_trait::async_trait;

use super::{Progress, StopReason, Team, TeamResponse};
use crate::Agent;
use crate::controller::Controller;
use crate::error::Error;
use crate::terminator::Terminator;

/// Agents work on the task one after another.
///
/// Every agent receives the task; each one after the first also receives
/// its predecessor's reply as an attributed assistant message. The
/// terminator, if any, may stop the chain early.
pub struct LinearTeam {
    agents: Vec<Agent>,
    controller: Controller,
    terminator: Option<Terminator>,
}

impl LinearTeam {
    /// Creates a team with a default controller and no terminator.
    pub fn new<I: IntoIterator<Item = Agent>>(agents: I) -> Self {
        Self {
            agents: agents.into_iter().collect(),
            controller: Controller::default(),
            terminator: None,
        }
    }

    /// Appends an agent to the chain.
    #[inline]
    pub fn then(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Replaces the controller.
    #[inline]
    pub fn with_controller(mut self, controller: Controller) -> Self {
        self.controller = controller;
        self
    }

    /// Sets the terminator.
    #[inline]
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = Some(terminator);
        self
    }

    async fn chain(
        &mut self,
        task: &str,
        progress: &mut Progress,
    ) -> Result<StopReason, Error> {
        for agent in &self.agents {
            agent.add_user_message(task);
        }
        for (idx, agent) in self.agents.iter().enumerate() {
            if idx > 0 {
                if let Some(message) = &progress.message {
                    agent.add_assistant_message(
                        message.clone(),
                        Some(progress.agent.name()),
                    );
                }
            }
            let response = self.controller.run(agent, None).await?;
            progress.record(response);
            if progress.check(self.terminator.as_mut())? {
                return Ok(StopReason::Terminated);
            }
        }
        Ok(StopReason::Finished)
    }
}

#[async_trait]
impl Team for LinearTeam {
    async fn run(&mut self, task: &str) -> Result<TeamResponse, Error> {
        let Some(first) = self.agents.first() else {
            return Err(Error::InvalidTeam("a team needs agents".to_owned()));
        };

        let mut progress = Progress::new(first);
        let result = self.chain(task, &mut progress).await;
        progress.settle(result)
    }

    #[inline]
    fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[inline]
    fn controller(&self) -> &Controller {
        &self.controller
    }

    #[inline]
    fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }
}
