//! Tool-call dispatch: gate, resolve, translate, invoke, normalize.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::EnvironmentDefaults;
use crate::errors::Error;
use crate::invoker;
use crate::mcp::tools::operation_for_tool;
use crate::output::{self, ToolError, ToolOutput};
use crate::params;
use crate::readiness::ReadinessGate;
use crate::translate;

/// Runs tool calls against whatever backend the gate publishes.
#[derive(Clone)]
pub struct Dispatcher {
    gate: Arc<ReadinessGate>,
    defaults: EnvironmentDefaults,
}

impl Dispatcher {
    pub fn new(gate: Arc<ReadinessGate>, defaults: EnvironmentDefaults) -> Self {
        Self { gate, defaults }
    }

    pub fn defaults(&self) -> &EnvironmentDefaults {
        &self.defaults
    }

    /// Execute one tool call.
    ///
    /// Unknown tools are rejected in every state; known tools are rejected
    /// while the backend is initializing. Missing or malformed arguments are
    /// rejected before any backend call.
    pub async fn call_tool(&self, name: &str, args: &Value) -> Result<ToolOutput, ToolError> {
        let operation = operation_for_tool(name)
            .ok_or_else(|| output::failure(None, &Error::MethodNotFound(name.to_string())))?;

        let backend = self.gate.backend().map_err(|e| output::failure(None, &e))?;

        let params = params::resolve(args, operation, &self.defaults)
            .map_err(|e| output::failure(Some(operation), &e))?;

        let request = translate::translate(backend.mode(), operation, &params);
        debug!(
            tool = name,
            mode = %request.mode,
            prefers_direct = request.prefers_direct,
            "dispatching tool call"
        );

        let invocation = invoker::invoke(&backend, &request).await;
        let path = invocation.authoritative_path();
        match invocation.result {
            Ok(value) => {
                info!(tool = name, path = ?path, attempts = invocation.attempts.len(), "tool call succeeded");
                Ok(output::success(&request, value))
            }
            Err(e) => {
                info!(tool = name, path = ?path, error = %e, "tool call failed");
                Err(output::failure(Some(operation), &e))
            }
        }
    }
}
