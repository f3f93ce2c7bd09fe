//! Immutable descriptions of outbound API calls.

/// HTTP method for a descriptor. The service only uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Immutable value describing one outbound call.
///
/// Built by the facade, consumed by the request pipeline. Paths are relative:
/// for authorized descriptors the pipeline prefixes the current user id
/// (`/<uid><path>`), for unauthenticated ones only the base URL.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub requires_authorization: bool,
}

impl RequestDescriptor {
    /// A bearer-authorized GET under the current user's scope.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::Get,
            body: None,
            requires_authorization: true,
        }
    }

    /// A bearer-authorized POST under the current user's scope.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            method: Method::Post,
            body: Some(body),
            requires_authorization: true,
        }
    }

    /// Skip authorization and user-id substitution for this call.
    pub fn unauthenticated(mut self) -> Self {
        self.requires_authorization = false;
        self
    }
}
