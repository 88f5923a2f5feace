use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Progress, StopReason, Team, TeamResponse};
use crate::Agent;
use crate::controller::Controller;
use crate::error::Error;
use crate::terminator::Terminator;
use crate::tool::{self, FunctionTool, Outcome, Tool, ToolOutput};

/// A leader delegates to subordinates.
///
/// The leader gets one `transfer_to_<name>` tool per subordinate. Calling
/// it hands the instruction to the subordinate, which takes over with only
/// that instruction as history. After each run the subordinates' last
/// replies are moved into the leader's history as attributed assistant
/// messages. The loop continues until the terminator matches, so a
/// terminator is required.
pub struct LeaderTeam {
    agents: Vec<Agent>,
    transfer_tools: Vec<String>,
    controller: Controller,
    terminator: Option<Terminator>,
}

impl LeaderTeam {
    /// Creates a team and registers the transfer tools on `leader`.
    pub fn new<I: IntoIterator<Item = Agent>>(
        leader: Agent,
        subordinates: I,
    ) -> Self {
        let mut agents = vec![leader];
        let mut transfer_tools = vec![];
        for subordinate in subordinates {
            let tool = transfer_tool(&subordinate);
            transfer_tools.push(tool.name().to_owned());
            agents[0].add_tool(tool);
            agents.push(subordinate);
        }
        Self {
            agents,
            transfer_tools,
            controller: Controller::default(),
            terminator: None,
        }
    }

    /// Returns the leader.
    #[inline]
    pub fn leader(&self) -> &Agent {
        &self.agents[0]
    }

    /// Returns the subordinates.
    #[inline]
    pub fn subordinates(&self) -> &[Agent] {
        &self.agents[1..]
    }

    /// Overrides the descriptions of the transfer tools, one per
    /// subordinate in order.
    ///
    /// # Errors
    ///
    /// Fails if the number of descriptions differs from the number of
    /// subordinates.
    pub fn with_descriptions<I, S>(
        self,
        descriptions: I,
    ) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let descriptions: Vec<String> =
            descriptions.into_iter().map(Into::into).collect();
        if descriptions.len() != self.transfer_tools.len() {
            return Err(Error::InvalidTeam(format!(
                "expected {} descriptions, got {}",
                self.transfer_tools.len(),
                descriptions.len()
            )));
        }
        let leader = self.leader();
        for (name, description) in self.transfer_tools.iter().zip(descriptions)
        {
            leader.set_tool_description(name, description);
        }
        Ok(self)
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

    async fn delegate(
        &mut self,
        task: &str,
        progress: &mut Progress,
    ) -> Result<StopReason, Error> {
        let Some((leader, subordinates)) = self.agents.split_first() else {
            return Err(Error::InvalidTeam("a team needs agents".to_owned()));
        };
        leader.add_user_message(task);
        loop {
            let response = self.controller.run(leader, None).await?;
            progress.record(response);
            if progress.check(self.terminator.as_mut())? {
                return Ok(StopReason::Terminated);
            }
            for subordinate in subordinates {
                let Some(last) = subordinate.last_message() else {
                    continue;
                };
                if let Some(content) = last.content() {
                    leader.add_assistant_message(
                        content,
                        Some(subordinate.name()),
                    );
                }
                subordinate.clear_messages();
            }
        }
    }
}

/// Builds the tool that hands work to `subordinate`.
fn transfer_tool(subordinate: &Agent) -> FunctionTool {
    let name = subordinate.name();
    let parameters = json!({
        "type": "object",
        "properties": {
            "instruction": {
                "type": "string",
                "description": format!(
                    "The instruction for {name} to continue the task."
                )
            }
        },
        "required": ["instruction"]
    });
    let description = format!(
        "Transfer task to {name}, who is instructed to '{}' and will \
         continue the task.",
        subordinate.system_prompt()
    );

    let subordinate = subordinate.clone();
    FunctionTool::new(
        format!("transfer_to_{}", name.replace(' ', "_")),
        description,
        parameters,
        move |args, _| {
            let subordinate = subordinate.clone();
            async move {
                let Some(instruction) =
                    args.get("instruction").and_then(Value::as_str)
                else {
                    return Err(tool::Error::invalid_input()
                        .with_reason("missing instruction"));
                };
                subordinate.add_user_message(instruction);
                Ok(ToolOutput::from(
                    Outcome::new()
                        .with_agent(subordinate)
                        .with_copy_history(false),
                ))
            }
        },
    )
}

#[async_trait]
impl Team for LeaderTeam {
    async fn run(&mut self, task: &str) -> Result<TeamResponse, Error> {
        if self.terminator.is_none() {
            return Err(Error::InvalidTeam(
                "a leader team needs a terminator".to_owned(),
            ));
        }

        let mut progress = Progress::new(self.leader());
        let result = self.delegate(task, &mut progress).await;
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
