//! API Gateway proxy event model
//!
//! One model covers REST API (v1) and ALB events, which carry `httpMethod`, and
//! HTTP API (v2) and function URL events, which carry `requestContext.http.method`.
//! Only the fields the handler reads are modelled. Unknown fields are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Incoming proxy request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    /// Payload format version, `"2.0"` for HTTP API and function URL events
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub http_method: String,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub raw_path: Option<String>,

    /// Header names as sent by the client, case not normalized
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub request_context: Option<RequestContext>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpContext>,
}

/// `requestContext.http` of a v2 event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpContext {
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub path: Option<String>,
}

impl ProxyEvent {
    /// Request method from either payload format
    ///
    /// An event without a method is a direct invocation and is treated as `GET`.
    #[must_use]
    pub fn method(&self) -> &str {
        if !self.http_method.is_empty() {
            return self.http_method.as_str();
        }
        match self.http_context() {
            Some(http) if !http.method.is_empty() => http.method.as_str(),
            _ => "GET",
        }
    }

    /// Request path from either payload format
    #[must_use]
    pub fn request_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .or(self.raw_path.as_deref())
            .or_else(|| self.http_context()?.path.as_deref())
    }

    fn http_context(&self) -> Option<&HttpContext> {
        self.request_context.as_ref()?.http.as_ref()
    }

    /// Case-insensitive header lookup
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().map(str::as_bytes).unwrap_or_default()
    }
}

/// Outgoing proxy response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
