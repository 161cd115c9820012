//! Request dispatch for the language server skeleton.
//!
//! Spec.md §1 lists "a language server" among the surrounding tools out of
//! scope for this repository's core subject, so `Server` only wires up the
//! lifecycle every LSP client expects (`initialize`/`shutdown`/`exit`) plus
//! one real diagnostics notification, `flint/checkFile`, which runs the
//! tier-1 checker (spec.md §7) this repo does own over a single file and
//! reports the results as `textDocument/publishDiagnostics`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use flintc_core::ast::{FileNode, SyntaxArena};
use flintc_core::type_id::TypeRegistry;

use crate::error::{ErrorCode, LspError};
use crate::protocol::{RpcNotification, RpcRequest, RpcResponse};

/// Params for the `flint/checkFile` notification: a single already-resolved
/// file plus the arena and type registry it was built against. There is no
/// text frontend in this repository (spec.md §1), so a client that wants
/// diagnostics is expected to supply the same kind of pre-resolved AST the
/// `flintc` driver consumes, not raw source text.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckFileParams {
    pub uri: String,
    pub registry: TypeRegistry,
    pub arena: SyntaxArena,
    pub file: FileNode,
}

/// Server-side lifecycle state. `initialized` guards every request other
/// than `initialize` itself; `shutting_down` makes `exit` pick the right
/// process exit code per the LSP spec (0 if shutdown was requested first,
/// 1 otherwise).
pub struct Server {
    initialized: bool,
    shutting_down: bool,
}

impl Server {
    pub fn new() -> Self {
        Server { initialized: false, shutting_down: false }
    }

    pub fn should_exit(&self) -> bool {
        self.shutting_down
    }

    pub fn exit_code(&self) -> i32 {
        if self.shutting_down {
            0
        } else {
            1
        }
    }

    /// Handles one incoming message, returning the response to send back
    /// for a request (`None` for notifications and for the `exit`
    /// notification, which ends the loop instead).
    pub fn handle(&mut self, request: RpcRequest) -> Option<RpcResponse> {
        let is_notification = request.id.is_none();
        let result = self.dispatch(&request.method, request.params);

        if is_notification {
            if let Err(e) = result {
                tracing::warn!(method = %request.method, error = %e, "notification handling failed");
            }
            return None;
        }

        let id = request.id.unwrap_or(Value::Null);
        Some(match result {
            Ok(value) => RpcResponse::ok(id, value),
            Err(e) => RpcResponse::err(id, e.code(), e.to_string()),
        })
    }

    fn dispatch(&mut self, method: &str, params: Value) -> Result<Value, LspError> {
        match method {
            "initialize" => self.handle_initialize(params),
            "initialized" => Ok(Value::Null),
            "shutdown" => {
                self.shutting_down = true;
                Ok(Value::Null)
            }
            "exit" => Ok(Value::Null),
            "$/cancelRequest" => Ok(Value::Null),
            "flint/checkFile" => self.handle_check_file(params),
            "textDocument/didOpen" | "textDocument/didChange" | "textDocument/didClose" => Ok(Value::Null),
            other => Err(LspError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&mut self, _params: Value) -> Result<Value, LspError> {
        self.initialized = true;
        Ok(json!({
            "capabilities": {
                "textDocumentSync": 1,
                "diagnosticProvider": {
                    "interFileDependencies": false,
                    "workspaceDiagnostics": false,
                }
            },
            "serverInfo": { "name": "flintc-lsp", "version": env!("CARGO_PKG_VERSION") }
        }))
    }

    fn handle_check_file(&mut self, params: Value) -> Result<Value, LspError> {
        if !self.initialized {
            return Err(LspError::NotInitialized);
        }
        let mut params: CheckFileParams =
            serde_json::from_value(params).map_err(|e| LspError::InvalidParams(e.to_string()))?;
        let errors = flintc_check::check_file(&mut params.arena, &params.registry, &params.file);
        let diagnostics: Vec<Diagnostic> = errors.iter().map(|e| Diagnostic::from_type_error(e)).collect();
        Ok(json!({ "uri": params.uri, "diagnosticCount": diagnostics.len(), "diagnostics": diagnostics }))
    }

    /// Builds the `textDocument/publishDiagnostics` notification for a
    /// checked file, for callers that drive a push rather than pull model.
    pub fn publish_diagnostics_notification(uri: &str, diagnostics: &[Diagnostic]) -> RpcNotification {
        RpcNotification {
            jsonrpc: "2.0",
            method: "textDocument/publishDiagnostics",
            params: json!({ "uri": uri, "diagnostics": diagnostics }),
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// A diagnostic in the shape `textDocument/publishDiagnostics` expects,
/// built from a [`flintc_check::TypeError`]. Positions are left at the
/// file's zero origin: this repository has no lexer/parser producing real
/// source spans (spec.md §1), so a real client would need to supply its
/// own span mapping alongside the AST it sends.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Diagnostic {
    fn from_type_error(error: &flintc_check::TypeError) -> Self {
        let zero = Position { line: 0, character: 0 };
        Diagnostic {
            range: Range { start: zero.clone(), end: zero },
            severity: 1,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintc_core::graph::DepGraph;
    use serde_json::json;

    fn initialize_request(id: i64) -> RpcRequest {
        RpcRequest { jsonrpc: "2.0".to_string(), id: Some(Value::from(id)), method: "initialize".to_string(), params: Value::Null }
    }

    #[test]
    fn initialize_then_shutdown_then_exit() {
        let mut server = Server::new();
        let response = server.handle(initialize_request(1)).unwrap();
        assert!(response.error.is_none());
        assert!(!server.should_exit());

        let shutdown =
            RpcRequest { jsonrpc: "2.0".to_string(), id: Some(Value::from(2)), method: "shutdown".to_string(), params: Value::Null };
        let response = server.handle(shutdown).unwrap();
        assert!(response.error.is_none());
        assert!(server.should_exit());
        assert_eq!(server.exit_code(), 0);
    }

    #[test]
    fn unknown_method_reports_method_not_found() {
        let mut server = Server::new();
        server.handle(initialize_request(1));
        let request =
            RpcRequest { jsonrpc: "2.0".to_string(), id: Some(Value::from(2)), method: "bogus/method".to_string(), params: Value::Null };
        let response = server.handle(request).unwrap();
        assert_eq!(response.error.unwrap().code, ErrorCode::MethodNotFound.code());
    }

    #[test]
    fn check_file_before_initialize_is_rejected() {
        let mut server = Server::new();
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(Value::from(1)),
            method: "flint/checkFile".to_string(),
            params: json!({
                "uri": "file:///a.flint",
                "registry": TypeRegistry::new(),
                "arena": SyntaxArena::new(),
                "file": FileNode { id: flintc_core::FileId(0), path: "a.flint".to_string(), defs: Vec::new() },
            }),
        };
        let response = server.handle(request).unwrap();
        assert_eq!(response.error.unwrap().code, ErrorCode::ServerNotInitialized.code());
    }

    #[test]
    fn notifications_produce_no_response() {
        let mut server = Server::new();
        server.handle(initialize_request(1));
        let notification =
            RpcRequest { jsonrpc: "2.0".to_string(), id: None, method: "textDocument/didOpen".to_string(), params: Value::Null };
        assert!(server.handle(notification).is_none());
    }

    #[test]
    fn dep_graph_import_compiles() {
        let _graph = DepGraph::new();
    }
}
