use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::Instrument;

use super::{Error, Injected, Injection, Tool, ToolResult};

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn injection(&self) -> Injection;

    fn execute(
        self: Arc<Self>,
        arguments: Map<String, Value>,
        injected: Injected,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    #[inline]
    fn injection(&self) -> Injection {
        self.0.injection()
    }

    fn execute(
        self: Arc<Self>,
        mut arguments: Map<String, Value>,
        injected: Injected,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        // The model must not be able to spoof injected values.
        self.0.injection().strip_arguments(&mut arguments);
        let input: T::Input =
            match serde_json::from_value(Value::Object(arguments)) {
                Ok(input) => input,
                Err(err) => {
                    let reason = format!("{err}");
                    return Box::pin(std::future::ready(ToolResult::Err(
                        Error::invalid_input().with_reason(reason),
                    )));
                }
            };

        let span = debug_span!("tool execute", tool = self.0.name());
        Box::pin(self.0.execute(input, injected).instrument(span))
    }
}
