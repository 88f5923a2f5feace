//! Tool call supports.

mod error;
mod function;
mod object;
mod outcome;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::Agent;
use crate::context::ContextVariables;

pub use error::{Error, ErrorKind};
pub use function::FunctionTool;
pub(crate) use object::{ToolObject, ToolObjectImpl};
pub use outcome::{DEFAULT_CONTENT, Outcome, ToolOutput};

/// The result of a tool call.
pub type ToolResult = Result<ToolOutput, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless. Runtime state reaches
/// a tool through [`Injected`]: declare the parameter names with
/// [`Tool::injection`] and the controller fills them in before each call.
/// Those parameters are hidden from the model.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    ///
    /// Injected parameters may appear in the schema; they are removed
    /// before the schema is sent to the model.
    fn parameter_schema(&self) -> &Value;

    /// Returns the parameters that the controller should inject.
    fn injection(&self) -> Injection {
        Injection::default()
    }

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`.
    fn execute(
        &self,
        input: Self::Input,
        injected: Injected,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// Names of the tool parameters that receive runtime values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Injection {
    /// The parameter that receives the shared context.
    pub context_variables: Option<String>,
    /// The parameter that receives the calling agent.
    pub agent: Option<String>,
}

impl Injection {
    /// Injects the shared context into `param`.
    #[inline]
    pub fn with_context_variables<S: Into<String>>(mut self, param: S) -> Self {
        self.context_variables = Some(param.into());
        self
    }

    /// Injects the calling agent into `param`.
    #[inline]
    pub fn with_agent<S: Into<String>>(mut self, param: S) -> Self {
        self.agent = Some(param.into());
        self
    }

    /// Returns `true` if nothing is injected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.context_variables.is_none() && self.agent.is_none()
    }

    fn params(&self) -> impl Iterator<Item = &str> {
        self.context_variables
            .as_deref()
            .into_iter()
            .chain(self.agent.as_deref())
    }

    /// Removes the injected parameters from a JSON schema's `properties`
    /// and `required` lists.
    pub(crate) fn strip_schema(&self, schema: &Value) -> Value {
        let mut schema = schema.clone();
        if self.is_empty() {
            return schema;
        }
        if let Some(properties) =
            schema.get_mut("properties").and_then(Value::as_object_mut)
        {
            for param in self.params() {
                properties.shift_remove(param);
            }
        }
        if let Some(required) =
            schema.get_mut("required").and_then(Value::as_array_mut)
        {
            required.retain(|name| {
                name.as_str()
                    .is_none_or(|name| self.params().all(|p| p != name))
            });
        }
        schema
    }

    /// Removes the injected parameters from the model's arguments.
    pub(crate) fn strip_arguments(&self, arguments: &mut Map<String, Value>) {
        for param in self.params() {
            arguments.shift_remove(param);
        }
    }
}

/// Runtime values handed to a tool.
///
/// Only the fields named by the tool's [`Injection`] are filled. The
/// context is a snapshot; changes go back through the returned
/// [`Outcome`].
#[derive(Clone, Debug, Default)]
pub struct Injected {
    /// A snapshot of the shared context.
    pub context_variables: Option<ContextVariables>,
    /// The agent that issued the call.
    pub agent: Option<Agent>,
}
