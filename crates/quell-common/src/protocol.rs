//! Wire protocol between browser backends and the in-page scanner runtime.
//!
//! Requests are serialized as `{"action": "<name>", ...}` and handed to
//! `window.Quell.process(...)`. Responses carry a `status` tag.

use crate::error::BackendError;
use crate::target::{ElementQuery, FrameScope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a synthetic key event is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTarget {
    Document,
    Body,
    /// The currently focused element, falling back to the body.
    Focused,
    /// The body of an embedded frame's content document.
    FrameBody { frame: String },
}

/// Actions executed by the in-page scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScannerAction {
    Count(QueryRequest),
    Text(QueryRequest),
    Value(QueryRequest),
    Enabled(QueryRequest),
    Focus(QueryRequest),
    Click(QueryRequest),
    SetValue(SetValueRequest),
    Clear(QueryRequest),
    DispatchKey(DispatchKeyRequest),
    BodyText(BodyTextRequest),
    RemoveMatching(RemoveMatchingRequest),
    InjectStyle(InjectStyleRequest),
    RemoveStyle(StyleRequest),
    Observe(ObserveRequest),
    Disconnect(DisconnectRequest),
}

impl ScannerAction {
    pub fn name(&self) -> &'static str {
        match self {
            ScannerAction::Count(_) => "count",
            ScannerAction::Text(_) => "text",
            ScannerAction::Value(_) => "value",
            ScannerAction::Enabled(_) => "enabled",
            ScannerAction::Focus(_) => "focus",
            ScannerAction::Click(_) => "click",
            ScannerAction::SetValue(_) => "set_value",
            ScannerAction::Clear(_) => "clear",
            ScannerAction::DispatchKey(_) => "dispatch_key",
            ScannerAction::BodyText(_) => "body_text",
            ScannerAction::RemoveMatching(_) => "remove_matching",
            ScannerAction::InjectStyle(_) => "inject_style",
            ScannerAction::RemoveStyle(_) => "remove_style",
            ScannerAction::Observe(_) => "observe",
            ScannerAction::Disconnect(_) => "disconnect",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: ElementQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetValueRequest {
    pub query: ElementQuery,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchKeyRequest {
    pub key: String,
    pub target: KeyTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BodyTextRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveMatchingRequest {
    pub selectors: Vec<String>,
    #[serde(default)]
    pub scope: FrameScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectStyleRequest {
    pub id: String,
    pub css: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserveRequest {
    pub id: String,
    pub selectors: Vec<String>,
    /// Dispatch Escape on the document whenever a match is removed.
    #[serde(default)]
    pub escape_on_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScannerProtocolResponse {
    Ok {
        #[serde(default)]
        value: Value,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ScannerProtocolResponse {
    /// Unwrap the payload, mapping scanner error codes onto [`BackendError`].
    pub fn into_value(self) -> Result<Value, BackendError> {
        match self {
            ScannerProtocolResponse::Ok { value } => Ok(value),
            ScannerProtocolResponse::Error { code, message } => Err(match code.as_str() {
                "frame_access_denied" | "frame_unavailable" => {
                    BackendError::FrameAccessDenied(message)
                }
                "element_not_found" => BackendError::ElementNotFound(message),
                _ => BackendError::Scanner(format!("{}: {}", code, message)),
            }),
        }
    }
}
