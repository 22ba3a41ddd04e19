//! Arithmetic tool.

use async_trait::async_trait;
use serde_json::{json, Value};

use braid_agent::{RunContext, Tool, ToolError, ToolResult};

/// Basic arithmetic: add, sub, mul, div, pow, sqrt.
///
/// Input format is `"op arg1 [arg2]"`, e.g. `"add 1 2"` or `"sqrt 9"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform basic arithmetic. Usage: 'op arg1 [arg2]'. ops: add, sub, mul, div, pow, sqrt"
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"input": {"type": "string"}},
            "required": ["input"]
        })
    }

    async fn execute(&self, _ctx: &RunContext, input: &str) -> ToolResult<String> {
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.len() < 2 {
            return Err(ToolError::InvalidInput {
                reason: "usage: '<op> arg1 [arg2]'".into(),
            });
        }

        let op = parts[0].to_lowercase();
        let result = match op.as_str() {
            "sqrt" => {
                if parts.len() != 2 {
                    return Err(ToolError::InvalidInput {
                        reason: "sqrt requires 1 argument".into(),
                    });
                }
                let a = parse_number(parts[1])?;
                if a < 0.0 {
                    return Err(ToolError::InvalidInput {
                        reason: "sqrt of negative".into(),
                    });
                }
                a.sqrt()
            }
            "add" | "sub" | "mul" | "div" | "pow" => {
                if parts.len() != 3 {
                    return Err(ToolError::InvalidInput {
                        reason: format!("{op} requires 2 arguments"),
                    });
                }
                let a = parse_number(parts[1])?;
                let b = parse_number(parts[2])?;
                match op.as_str() {
                    "add" => a + b,
                    "sub" => a - b,
                    "mul" => a * b,
                    "div" => {
                        if b == 0.0 {
                            return Err(ToolError::InvalidInput {
                                reason: "division by zero".into(),
                            });
                        }
                        a / b
                    }
                    _ => a.powf(b),
                }
            }
            _ => {
                return Err(ToolError::InvalidInput {
                    reason: format!("unknown op: {op}"),
                })
            }
        };

        Ok(format_number(result))
    }
}

fn parse_number(s: &str) -> ToolResult<f64> {
    s.parse::<f64>().map_err(|_| ToolError::InvalidInput {
        reason: format!("not a number: {s}"),
    })
}

/// Render without a trailing `.0` for integral results.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    async fn calc(input: &str) -> ToolResult<String> {
        CalculatorTool::new()
            .execute(&RunContext::background(), input)
            .await
    }

    #[tokio::test]
    async fn binary_operations() {
        assert_eq!(calc("add 1 2").await.unwrap(), "3");
        assert_eq!(calc("sub 5 2").await.unwrap(), "3");
        assert_eq!(calc("mul 4 2.5").await.unwrap(), "10");
        assert_eq!(calc("div 9 2").await.unwrap(), "4.5");
        assert_eq!(calc("pow 2 10").await.unwrap(), "1024");
    }

    #[tokio::test]
    async fn sqrt_and_case_insensitive_op() {
        assert_eq!(calc("sqrt 9").await.unwrap(), "3");
        assert_eq!(calc("ADD 1 2").await.unwrap(), "3");
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        assert!(calc("add 1").await.is_err());
        assert!(calc("sqrt 1 2").await.is_err());
        assert!(calc("sqrt -1").await.is_err());
        assert!(calc("div 1 0").await.is_err());
        assert!(calc("noop 1 2").await.is_err());
        assert!(calc("add one 2").await.is_err());
        assert!(calc("").await.is_err());
    }

    #[test]
    fn schema_follows_single_input_convention() {
        let schema = CalculatorTool::new().schema();
        assert_eq!(schema["required"][0], "input");
        assert_eq!(schema["properties"]["input"]["type"], "string");
    }
}
