use async_trait::async_trait;
use baton_model::ModelMessage;

use super::{Progress, StopReason, Team, TeamResponse};
use crate::Agent;
use crate::controller::Controller;
use crate::error::Error;
use crate::terminator::Terminator;

/// Agents take turns on a shared conversation.
///
/// Before each turn the agent's history is replaced with the shared log;
/// afterwards its reply is appended to the log as an assistant message
/// attributed to it. The rotation continues until the terminator matches,
/// so a terminator is required.
pub struct RoundTeam {
    agents: Vec<Agent>,
    controller: Controller,
    terminator: Option<Terminator>,
}

impl RoundTeam {
    /// Creates a team with a default controller and no terminator.
    pub fn new<I: IntoIterator<Item = Agent>>(agents: I) -> Self {
        Self {
            agents: agents.into_iter().collect(),
            controller: Controller::default(),
            terminator: None,
        }
    }

    /// Adds an agent to the rotation.
    #[inline]
    pub fn with_agent(mut self, agent: Agent) -> Self {
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

    async fn rotate(
        &mut self,
        task: &str,
        progress: &mut Progress,
    ) -> Result<StopReason, Error> {
        let mut global_messages = vec![ModelMessage::user(task)];
        loop {
            for agent in &self.agents {
                agent.set_messages(global_messages.clone());
                let response = self.controller.run(agent, None).await?;
                if let Some(message) = &response.message {
                    global_messages.push(ModelMessage::assistant(
                        message.clone(),
                        Some(response.agent.name().to_owned()),
                    ));
                }
                progress.record(response);
                if progress.check(self.terminator.as_mut())? {
                    return Ok(StopReason::Terminated);
                }
            }
        }
    }
}

#[async_trait]
impl Team for RoundTeam {
    async fn run(&mut self, task: &str) -> Result<TeamResponse, Error> {
        if self.terminator.is_none() {
            return Err(Error::InvalidTeam(
                "a round team needs a terminator".to_owned(),
            ));
        }
        let Some(first) = self.agents.first() else {
            return Err(Error::InvalidTeam("a team needs agents".to_owned()));
        };

        let mut progress = Progress::new(first);
        let result = self.rotate(task, &mut progress).await;
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
