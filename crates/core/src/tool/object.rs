use std::any::Any;
use std::fmt::{self, Debug};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use lite_agent_model::ToolSchema;
use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn execute(&self, arguments: Value) -> BoxedToolFuture;
}

struct AnyTool<T: Tool>(T);

impl<T: Tool> ToolObject for AnyTool<T> {
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
    fn execute(&self, arguments: Value) -> BoxedToolFuture {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolResult::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };
        Box::pin(self.0.execute(input))
    }
}

/// A type-erased, cheaply cloneable tool.
///
/// This is what an [`Agent`](crate::Agent) stores and what the runner
/// dispatches to. [`ToolHandle::execute`] never panics and never fails in
/// any other way than returning an [`Error`].
#[derive(Clone)]
pub struct ToolHandle(Arc<dyn ToolObject>);

impl ToolHandle {
    /// Wraps a tool.
    #[inline]
    pub fn new<T: Tool>(tool: T) -> Self {
        Self(Arc::new(AnyTool(tool)))
    }

    /// Returns the name of the tool.
    #[inline]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Returns the description of the tool.
    #[inline]
    pub fn description(&self) -> &str {
        self.0.description()
    }

    /// Returns the parameter schema of the tool.
    #[inline]
    pub fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    /// Exports the schema advertised to the model.
    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameter_schema().clone(),
        }
    }

    /// Executes the tool with decoded JSON arguments.
    ///
    /// Arguments that do not fit the tool's input type are reported as
    /// [`ErrorKind::InvalidInput`](super::ErrorKind::InvalidInput). A panic
    /// inside the tool is caught and reported as
    /// [`ErrorKind::Panicked`](super::ErrorKind::Panicked).
    pub async fn execute(&self, arguments: Value) -> ToolResult {
        let span = debug_span!("tool execute", tool = self.name());
        let fut = match catch_unwind(AssertUnwindSafe(|| {
            self.0.execute(arguments)
        })) {
            Ok(fut) => fut,
            Err(payload) => return Err(panicked(payload)),
        };

        let result = AssertUnwindSafe(fut)
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|payload| Err(panicked(payload)));
        if let Err(err) = &result {
            debug!(tool = self.name(), "tool failed: {err}");
        }
        result
    }
}

impl Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolHandle")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl<T: Tool> From<T> for ToolHandle {
    #[inline]
    fn from(tool: T) -> Self {
        Self::new(tool)
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    };
    Error::panicked().with_reason(message)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::tool::ErrorKind;

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct Echo {
        schema: Value,
    }

    impl Tool for Echo {
        type Input = EchoInput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the text back."
        }

        fn parameter_schema(&self) -> &Value {
            &self.schema
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async move {
                match input.text.as_str() {
                    "panic" => panic!("echo exploded"),
                    "fail" => {
                        Err(Error::execution_error().with_reason("nope"))
                    }
                    text => Ok(text.to_owned()),
                }
            }
        }
    }

    fn echo() -> ToolHandle {
        ToolHandle::new(Echo {
            schema: json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            }),
        })
    }

    #[tokio::test]
    async fn test_execute() {
        let tool = echo();
        assert_eq!(tool.execute(json!({ "text": "hi" })).await.unwrap(), "hi");

        let err = tool.execute(json!({ "text": "fail" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert_eq!(err.reason(), "nope");
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let err = echo().execute(json!({ "txt": 1 })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(!err.reason().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let err = echo().execute(json!({ "text": "panic" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert_eq!(err.reason(), "echo exploded");
    }

    #[test]
    fn test_schema() {
        let schema = echo().schema();
        assert_eq!(schema.name, "echo");
        assert_eq!(schema.description, "Echoes the text back.");
        assert_eq!(schema.parameters["required"], json!(["text"]));
    }
}
