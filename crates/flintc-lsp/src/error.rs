//! JSON-RPC error codes for the language server skeleton.
//!
//! Spec.md §1 explicitly puts "a language server skeleton" out of scope as
//! a subsystem; this crate stays a thin, real JSON-RPC-over-stdio shell
//! that dispatches `initialize`/`shutdown` and one diagnostics notification
//! backed by `flintc-check`, rather than a full incremental LSP.

use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes (plus the LSP-specific range), used to
/// populate the `code` field of an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerNotInitialized,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ServerNotInitialized => -32002,
        }
    }
}

/// Errors the server can surface, either as a JSON-RPC error response or a
/// fatal condition that ends the stdio loop.
#[derive(Debug, Error)]
pub enum LspError {
    #[error("failed to parse message: {0}")]
    Parse(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("request received before initialize")]
    NotInitialized,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LspError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LspError::Parse(_) => ErrorCode::ParseError,
            LspError::MethodNotFound(_) => ErrorCode::MethodNotFound,
            LspError::InvalidParams(_) => ErrorCode::InvalidParams,
            LspError::NotInitialized => ErrorCode::ServerNotInitialized,
            LspError::Io(_) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_jsonrpc_spec() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::ServerNotInitialized.code(), -32002);
    }

    #[test]
    fn lsp_error_maps_to_expected_code() {
        assert_eq!(LspError::NotInitialized.code().code(), -32002);
        assert_eq!(LspError::MethodNotFound("foo".into()).code().code(), -32601);
    }
}
