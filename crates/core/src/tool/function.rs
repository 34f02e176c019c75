use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::pin::Pin;

use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Tool, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;
type ToolFn<I> = Box<dyn Fn(I) -> BoxedToolFuture + Send + Sync>;

/// A tool backed by a closure.
///
/// The parameter schema is derived from the input type, so the input type
/// only needs to derive `Deserialize` and `JsonSchema`.
///
/// ```
/// use lite_agent_core::tool::FunctionTool;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct AddInput {
///     a: i64,
///     b: i64,
/// }
///
/// let add = FunctionTool::from_sync(
///     "add",
///     "Adds two integers.",
///     |input: AddInput| Ok((input.a + input.b).to_string()),
/// );
/// ```
pub struct FunctionTool<I> {
    name: String,
    description: String,
    parameter_schema: Value,
    func: ToolFn<I>,
    _input: PhantomData<fn(I)>,
}

impl<I> FunctionTool<I>
where
    I: JsonSchema + DeserializeOwned + Send + 'static,
{
    /// Creates a tool from an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameter_schema: schema_for!(I).to_value(),
            func: Box::new(move |input| Box::pin(func(input))),
            _input: PhantomData,
        }
    }

    /// Creates a tool from a blocking closure.
    ///
    /// The closure runs on the runner's task, keep it short.
    pub fn from_sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        func: F,
    ) -> Self
    where
        F: Fn(I) -> ToolResult + Send + Sync + 'static,
    {
        Self::new(name, description, move |input| {
            std::future::ready(func(input))
        })
    }
}

impl<I> Debug for FunctionTool<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<I> Tool for FunctionTool<I>
where
    I: JsonSchema + DeserializeOwned + Send + 'static,
{
    type Input = I;

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
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        (self.func)(input)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::tool::{Error, ToolHandle};

    #[derive(Deserialize, JsonSchema)]
    struct DivideInput {
        /// The dividend.
        a: f64,
        /// The divisor.
        b: f64,
    }

    #[tokio::test]
    async fn test_sync_function_tool() {
        let divide = FunctionTool::from_sync(
            "divide",
            "Divides a by b.",
            |input: DivideInput| {
                if input.b == 0.0 {
                    return Err(Error::execution_error()
                        .with_reason("division by zero"));
                }
                Ok((input.a / input.b).to_string())
            },
        );
        let schema = divide.parameter_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["description"], "The dividend.");

        let handle = ToolHandle::new(divide);
        let quotient = handle.execute(json!({ "a": 6, "b": 3 })).await;
        assert_eq!(quotient.unwrap(), "2");
        let err =
            handle.execute(json!({ "a": 1, "b": 0 })).await.unwrap_err();
        assert_eq!(err.reason(), "division by zero");
    }

    #[tokio::test]
    async fn test_async_function_tool() {
        #[derive(Deserialize, JsonSchema)]
        struct Empty {}

        let tool =
            FunctionTool::new("ping", "Replies pong.", |_: Empty| async {
                tokio::task::yield_now().await;
                Ok::<_, Error>("pong".to_owned())
            });
        let handle = ToolHandle::new(tool);
        assert_eq!(handle.execute(json!({})).await.unwrap(), "pong");
        assert_eq!(handle.name(), "ping");
    }
}
