//! The dispatch runtime.
//!
//! A [`Runtime`] owns the frozen tool registry and drives one transport
//! connection: it reads a line, processes it to completion, writes at most one
//! response line and repeats. Lifecycle:
//!
//! ```text
//! AwaitingInit --initialize--> Initialized --notifications/initialized--> Serving
//!      |                            |                                        |
//!      +---- (compat) any request --+------------- tools/* -----------------+
//!                                                                            v
//!                                      end of input / terminate signal -> ShuttingDown
//! ```
//!
//! Only transport failures and handler-fatal errors end the loop early; every
//! other failure is answered with a structured error and the loop continues.

use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use skyhook_core::{
    take_confirm, DefaultInjector, DispatchError, MutationGate, ResetSummary, SharedState,
    ToolRegistry,
};

use crate::error::RuntimeError;
use crate::protocol::{
    call_result, methods, CallToolParams, JsonRpcRequest, JsonRpcResponse, ToolInfo,
    PROTOCOL_VERSION,
};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingInit,
    Initialized,
    Serving,
    ShuttingDown,
}

pub struct Runtime {
    registry: Arc<ToolRegistry>,
    state: SharedState,
    injector: DefaultInjector,
    gate: MutationGate,
    phase: Phase,
    fatal: Option<String>,
}

impl Runtime {
    pub fn new(registry: Arc<ToolRegistry>, state: SharedState) -> Self {
        let injector = DefaultInjector::from_config(&state.config);
        let gate = MutationGate::from_config(&state.config);
        Self {
            registry,
            state,
            injector,
            gate,
            phase: Phase::AwaitingInit,
            fatal: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Serve one transport until end of input, `shutdown` resolving, or a
    /// fatal error. Caches and client pools are released on every exit path.
    pub async fn serve<R, W, S>(
        mut self,
        reader: R,
        mut writer: W,
        shutdown: S,
    ) -> Result<ResetSummary, RuntimeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        tracing::info!(
            service = %self.state.config.service_name,
            tools = self.registry.len(),
            "serving tools over stdio"
        );

        let result = self.run(reader, &mut writer, shutdown).await;

        if let Err(e) = writer.flush().await {
            tracing::warn!(error = %e, "failed to flush transport during shutdown");
        }
        let summary = self.shutdown();

        match &result {
            Ok(()) => tracing::info!(
                cache_entries = summary.cache_entries,
                clients = summary.clients,
                "shut down cleanly"
            ),
            Err(e) => tracing::error!(error = %e, "shut down after fatal error"),
        }
        result.map(|()| summary)
    }

    async fn run<R, W, S>(&mut self, reader: R, writer: &mut W, shutdown: S) -> Result<(), RuntimeError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        S: Future<Output = ()>,
    {
        let mut lines = reader.lines();
        tokio::pin!(shutdown);

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line?,
                () = &mut shutdown => {
                    tracing::info!("terminate signal received");
                    return Ok(());
                }
            };

            let Some(line) = line else {
                tracing::debug!("end of input");
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut bytes = serde_json::to_vec(&response)?;
                bytes.push(b'\n');
                writer.write_all(&bytes).await?;
                writer.flush().await?;
            }

            if let Some(message) = self.fatal.take() {
                return Err(RuntimeError::Fatal(message));
            }
        }
    }

    /// Enter `ShuttingDown`, clearing every cache tier and client pool.
    pub fn shutdown(&mut self) -> ResetSummary {
        self.phase = Phase::ShuttingDown;
        self.state.reset()
    }

    /// Process one transport line. Returns the response to write, if any.
    pub async fn handle_line(&mut self, line: &str) -> Option<JsonRpcResponse> {
        match JsonRpcRequest::parse(line) {
            Ok(request) => self.handle_request(request).await,
            Err(response) => {
                tracing::warn!(line, "rejected malformed request");
                Some(response)
            }
        }
    }

    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let outcome = self.route(&request).await;

        let Some(id) = request.id else {
            if let Err(e) = outcome {
                tracing::debug!(method = %request.method, error = %e, "notification failed");
            }
            return None;
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result.unwrap_or_else(|| json!({}))),
            Err(e) => JsonRpcResponse::failure(id, &e),
        })
    }

    async fn route(&mut self, request: &JsonRpcRequest) -> Result<Option<Value>, DispatchError> {
        match request.method.as_str() {
            methods::INITIALIZE => Ok(Some(self.initialize())),
            methods::INITIALIZED => {
                if self.phase == Phase::Initialized {
                    self.transition(Phase::Serving);
                }
                Ok(None)
            }
            methods::PING => Ok(Some(json!({}))),
            method => {
                self.ensure_ready(method)?;
                match method {
                    methods::TOOLS_LIST => Ok(Some(self.list_tools())),
                    methods::TOOLS_CALL => self.call_tool(&request.params).await.map(Some),
                    _ if request.is_notification() => Ok(None),
                    _ => Err(DispatchError::MethodNotFound(method.to_string())),
                }
            }
        }
    }

    fn initialize(&mut self) -> Value {
        if self.phase == Phase::AwaitingInit {
            self.transition(Phase::Initialized);
        }
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.state.config.service_name,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {"tools": {"listChanged": false}},
        })
    }

    fn ensure_ready(&mut self, method: &str) -> Result<(), DispatchError> {
        match self.phase {
            Phase::Serving => Ok(()),
            Phase::Initialized => {
                self.transition(Phase::Serving);
                Ok(())
            }
            Phase::AwaitingInit if self.state.config.strict_handshake => {
                tracing::warn!(method, "request before initialize rejected");
                Err(DispatchError::ProtocolSequence(method.to_string()))
            }
            Phase::AwaitingInit => {
                tracing::warn!(method, "request before initialize; treating as implicit handshake");
                self.transition(Phase::Serving);
                Ok(())
            }
            Phase::ShuttingDown => Err(DispatchError::InvalidRequest(
                "server is shutting down".to_string(),
            )),
        }
    }

    fn transition(&mut self, next: Phase) {
        tracing::debug!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<ToolInfo> = self.registry.list().iter().map(ToolInfo::from).collect();
        json!({ "tools": tools })
    }

    async fn call_tool(&mut self, params: &Value) -> Result<Value, DispatchError> {
        let params: CallToolParams = serde_json::from_value(params.clone())
            .map_err(|e| DispatchError::InvalidParams(e.to_string()))?;
        let registry = Arc::clone(&self.registry);
        let descriptor = registry.resolve(&params.name)?;

        let mut arguments = params.argument_map()?;
        let confirmed = descriptor.is_mutating() && take_confirm(&mut arguments);
        let arguments = self.injector.inject(&arguments);

        if let Err(e) = self
            .gate
            .check(&params.name, descriptor.is_mutating(), confirmed)
        {
            tracing::warn!(tool = %params.name, error = %e, "call rejected by mutation gate");
            return Err(e.into());
        }

        tracing::debug!(tool = %params.name, "invoking tool");
        match descriptor.invoke(Value::Object(arguments)).await {
            Ok(result) => Ok(call_result(result)),
            Err(e) if e.is_fatal() => {
                tracing::error!(tool = %params.name, error = %e, "tool reported a fatal error");
                self.fatal = Some(e.to_string());
                Err(DispatchError::Handler(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "tool failed");
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("phase", &self.phase)
            .field("tools", &self.registry.len())
            .finish_non_exhaustive()
    }
}
