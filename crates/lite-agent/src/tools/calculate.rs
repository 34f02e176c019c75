use std::iter::Peekable;
use std::str::CharIndices;

use lite_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

/// Deepest nesting of parentheses and unary signs accepted.
const MAX_DEPTH: usize = 128;

/// Parameters of [`CalculateTool`].
#[derive(Deserialize, JsonSchema)]
pub struct CalculateToolParameters {
    #[schemars(description = "The arithmetic expression, e.g. `(2+3)*4`.")]
    expression: String,
}

/// A tool for evaluating arithmetic expressions.
///
/// Supports `+`, `-`, `*`, `/`, `%`, parentheses, unary signs and decimal
/// numbers. Nothing else is evaluated.
pub struct CalculateTool {
    parameter_schema: Value,
}

impl CalculateTool {
    /// Creates a new calculate tool.
    #[inline]
    pub fn new() -> Self {
        CalculateTool {
            parameter_schema: schema_for!(CalculateToolParameters).to_value(),
        }
    }
}

impl Default for CalculateTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculateTool {
    type Input = CalculateToolParameters;

    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluates an arithmetic expression and returns the result."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CalculateToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move { evaluate(&input.expression) }
    }
}

fn evaluate(expression: &str) -> ToolResult {
    let mut parser = Parser {
        src: expression,
        chars: expression.char_indices().peekable(),
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if let Some((pos, c)) = parser.chars.peek() {
        return Err(invalid(format!("unexpected `{c}` at {pos}")));
    }
    if !value.is_finite() {
        return Err(ToolError::execution_error()
            .with_reason("the result is not a finite number"));
    }
    Ok(format_number(value))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn invalid(reason: String) -> ToolError {
    ToolError::invalid_input().with_reason(reason)
}

struct Parser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn peek_op(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.peek().map(|(_, c)| *c)
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut lhs = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.chars.next();
            let rhs = self.term()?;
            lhs = if op == '+' { lhs + rhs } else { lhs - rhs };
        }
        Ok(lhs)
    }

    // term := factor (('*' | '/' | '%') factor)*
    fn term(&mut self) -> Result<f64, ToolError> {
        let mut lhs = self.factor()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.chars.next();
            let rhs = self.factor()?;
            if op != '*' && rhs == 0.0 {
                return Err(ToolError::execution_error()
                    .with_reason("division by zero"));
            }
            lhs = match op {
                '*' => lhs * rhs,
                '/' => lhs / rhs,
                _ => lhs % rhs,
            };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<f64, ToolError> {
        if self.depth >= MAX_DEPTH {
            return Err(invalid("expression is nested too deeply".to_owned()));
        }
        self.depth += 1;
        let value = self.nested_factor();
        self.depth -= 1;
        value
    }

    // factor := ('+' | '-') factor | number | '(' expr ')'
    fn nested_factor(&mut self) -> Result<f64, ToolError> {
        match self.peek_op() {
            Some('-') => {
                self.chars.next();
                Ok(-self.factor()?)
            }
            Some('+') => {
                self.chars.next();
                self.factor()
            }
            Some('(') => {
                self.chars.next();
                let value = self.expr()?;
                match self.peek_op() {
                    Some(')') => {
                        self.chars.next();
                        Ok(value)
                    }
                    _ => Err(invalid("missing `)`".to_owned())),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(invalid(format!("unexpected `{c}`"))),
            None => Err(invalid("unexpected end of expression".to_owned())),
        }
    }

    fn number(&mut self) -> Result<f64, ToolError> {
        let Some(&(start, _)) = self.chars.peek() else {
            return Err(invalid("expected a number".to_owned()));
        };
        let mut end = start;
        while let Some((pos, c)) =
            self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.')
        {
            end = pos + c.len_utf8();
        }
        let literal = &self.src[start..end];
        literal
            .parse()
            .map_err(|_| invalid(format!("invalid number `{literal}`")))
    }
}
