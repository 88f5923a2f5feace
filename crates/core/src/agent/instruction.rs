use std::fmt;
use std::sync::Arc;

use crate::context::ContextVariables;

/// The instruction used when none is given.
pub const DEFAULT_INSTRUCTION: &str = "You are a helpful assistant.";

type InstructionFn = Arc<dyn Fn(&ContextVariables) -> String + Send + Sync>;

/// The system instruction of an agent.
///
/// A dynamic instruction is evaluated against the shared context each time
/// a controller activates the agent.
#[derive(Clone)]
pub enum Instruction {
    /// A fixed text.
    Static(String),
    /// A function of the shared context.
    Dynamic(InstructionFn),
}

impl Instruction {
    /// Creates a dynamic instruction.
    #[inline]
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&ContextVariables) -> String + Send + Sync + 'static,
    {
        Instruction::Dynamic(Arc::new(f))
    }

    /// Produces the instruction text.
    pub fn resolve(&self, context_variables: &ContextVariables) -> String {
        match self {
            Instruction::Static(text) => text.clone(),
            Instruction::Dynamic(f) => f(context_variables),
        }
    }
}

impl Default for Instruction {
    #[inline]
    fn default() -> Self {
        Instruction::Static(DEFAULT_INSTRUCTION.to_owned())
    }
}

impl From<String> for Instruction {
    #[inline]
    fn from(text: String) -> Self {
        Instruction::Static(text)
    }
}

impl From<&str> for Instruction {
    #[inline]
    fn from(text: &str) -> Self {
        Instruction::Static(text.to_owned())
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Static(text) => {
                f.debug_tuple("Static").field(text).finish()
            }
            Instruction::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
