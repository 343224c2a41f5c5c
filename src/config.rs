use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options recognized by the interpreter core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct InterpreterConfig {
    /// Evaluate `|>`-marked bindings. When off, marked strings render
    /// verbatim and are never parsed.
    #[serde(alias = "enableJsExecution")]
    pub enable_expression_execution: bool,
}

impl InterpreterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expression_execution(mut self, enabled: bool) -> Self {
        self.enable_expression_execution = enabled;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
