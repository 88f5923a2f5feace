use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use baton_model::ModelTool;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{Error, Injected, Injection, Tool, ToolResult};

type BoxedHandler = Arc<
    dyn Fn(
            Map<String, Value>,
            Injected,
        ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>
        + Send
        + Sync,
>;

/// A tool backed by a closure.
///
/// The closure receives the model's arguments as a JSON object together with
/// the injected runtime values.
///
/// # Examples
///
/// ```
/// use baton_core::tool::{FunctionTool, Injected, ToolOutput};
/// use serde_json::json;
///
/// let tool = FunctionTool::new(
///     "get_weather",
///     "Get the weather of a city.",
///     json!({
///         "type": "object",
///         "properties": { "city": { "type": "string" } },
///         "required": ["city"]
///     }),
///     |args, _: Injected| async move {
///         let city = args.get("city").and_then(|c| c.as_str()).unwrap_or("");
///         Ok(ToolOutput::from(format!("{city}: sunny")))
///     },
/// );
/// ```
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameter_schema: Value,
    injection: Injection,
    handler: BoxedHandler,
}

impl FunctionTool {
    /// Creates a tool from a name, a description, a JSON schema of its
    /// parameters and a handler.
    pub fn new<N, D, F, Fut>(
        name: N,
        description: D,
        parameter_schema: Value,
        handler: F,
    ) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        F: Fn(Map<String, Value>, Injected) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema,
            injection: Injection::default(),
            handler: Arc::new(move |arguments, injected| {
                Box::pin(handler(arguments, injected))
            }),
        }
    }

    /// Creates a tool whose parameters are described by `I`.
    ///
    /// The schema is generated from `I`, and the arguments are deserialized
    /// into it before `handler` runs.
    pub fn typed<I, N, D, F, Fut>(name: N, description: D, handler: F) -> Self
    where
        I: DeserializeOwned + JsonSchema,
        N: Into<String>,
        D: Into<String>,
        F: Fn(I, Injected) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let mut parameter_schema = schemars::schema_for!(I).to_value();
        if let Some(schema) = parameter_schema.as_object_mut() {
            schema.remove("$schema");
            schema.remove("title");
        }
        let handler = Arc::new(handler);
        Self::new(
            name,
            description,
            parameter_schema,
            move |arguments, injected| {
                let handler = Arc::clone(&handler);
                async move {
                    let input: I =
                        serde_json::from_value(Value::Object(arguments))
                            .map_err(|err| {
                                Error::invalid_input()
                                    .with_reason(format!("{err}"))
                            })?;
                    handler(input, injected).await
                }
            },
        )
    }

    /// Creates a tool from an OpenAI-style function schema (`name`,
    /// `description` and `parameters`).
    ///
    /// Returns `None` if the schema has no name.
    pub fn from_function_schema<F, Fut>(
        schema: &Value,
        handler: F,
    ) -> Option<Self>
    where
        F: Fn(Map<String, Value>, Injected) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        let tool = ModelTool::from_function_schema(schema)?;
        Some(Self::new(
            tool.name,
            tool.description,
            tool.parameters,
            handler,
        ))
    }

    /// Injects the shared context into `param`.
    #[inline]
    pub fn with_context_variables<S: Into<String>>(mut self, param: S) -> Self {
        self.injection = self.injection.with_context_variables(param);
        self
    }

    /// Injects the calling agent into `param`.
    #[inline]
    pub fn with_agent<S: Into<String>>(mut self, param: S) -> Self {
        self.injection = self.injection.with_agent(param);
        self
    }

    /// Replaces the description.
    #[inline]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("injection", &self.injection)
            .finish_non_exhaustive()
    }
}

impl Tool for FunctionTool {
    type Input = Map<String, Value>;

    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[inline]
    fn injection(&self) -> Injection {
        self.injection.clone()
    }

    #[inline]
    fn execute(
        &self,
        input: Self::Input,
        injected: Injected,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        (self.handler)(input, injected)
    }
}
