//! Minimal JSON-RPC 2.0 message framing over stdio, in the shape the
//! Language Server Protocol uses: a `Content-Length` header, a blank line,
//! then a UTF-8 JSON body (no `Content-Type` header required by clients).

use std::io::{BufRead, Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorCode, LspError};

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    /// Absent for notifications.
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        RpcResponse { jsonrpc: "2.0", id, result: Some(result), error: None }
    }

    pub fn err(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        RpcResponse {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError { code: code.code(), message: message.into() }),
        }
    }
}

/// Reads one `Content-Length`-framed JSON-RPC message from `reader`.
/// Returns `Ok(None)` at a clean EOF (the client closed stdin).
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<RpcRequest>, LspError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| LspError::Parse(format!("invalid Content-Length: {}", e)))?,
            );
        }
    }

    let len = content_length.ok_or_else(|| LspError::Parse("missing Content-Length header".to_string()))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    let text = String::from_utf8(body).map_err(|e| LspError::Parse(format!("body is not valid UTF-8: {}", e)))?;
    let request: RpcRequest = serde_json::from_str(&text).map_err(|e| LspError::Parse(e.to_string()))?;
    Ok(Some(request))
}

/// Writes one `Content-Length`-framed JSON value to `writer` and flushes it.
pub fn write_message<W: Write>(writer: &mut W, value: &impl Serialize) -> Result<(), LspError> {
    let body = serde_json::to_string(value).map_err(|e| LspError::Parse(e.to_string()))?;
    write!(writer, "Content-Length: {}\r\n\r\n{}", body.len(), body)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_framed_request() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let framed = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut cursor = Cursor::new(framed.into_bytes());
        let request = read_message(&mut cursor).unwrap().unwrap();
        assert_eq!(request.method, "initialize");
        assert_eq!(request.id, Some(Value::from(1)));
    }

    #[test]
    fn clean_eof_yields_none() {
        let mut cursor = Cursor::new(Vec::new());
        let result = read_message(&mut cursor).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_content_length_is_a_parse_error() {
        let framed = "\r\n{}";
        let mut cursor = Cursor::new(framed.as_bytes().to_vec());
        let result = read_message(&mut cursor);
        assert!(result.is_err());
    }

    #[test]
    fn write_message_frames_with_content_length() {
        let mut buf = Vec::new();
        let notification = RpcNotification { jsonrpc: "2.0", method: "test/ping", params: Value::Null };
        write_message(&mut buf, &notification).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Content-Length:"));
        assert!(text.ends_with("\"test/ping\",\"params\":null}"));
    }
}
