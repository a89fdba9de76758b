use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bootstrap::AppState;
use crate::error::ApiError;
use crate::handlers;

/// The Lambda-proxy HTTP request envelope every entry point accepts.
#[derive(Debug, Deserialize)]
pub struct HttpEnvelope {
    #[serde(rename = "httpMethod")]
    pub http_method: String,
    pub path: String,
    pub body: Option<String>,
    #[serde(rename = "queryStringParameters", default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl HttpEnvelope {
    pub fn query(&self) -> HashMap<String, String> {
        self.query_string_parameters.clone().unwrap_or_default()
    }

    pub fn body_json(&self) -> Result<serde_json::Value, ApiError> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("request body is required".to_string()))?;
        serde_json::from_str(body).map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {e}")))
    }
}

/// The Lambda-proxy HTTP response envelope.
#[derive(Debug, Serialize)]
pub struct HttpResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status_code: u16, value: serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("access-control-allow-origin".to_string(), "*".to_string());
        HttpResponse {
            status_code,
            headers,
            body: value.to_string(),
        }
    }

    pub fn message(status_code: u16, message: impl Into<String>) -> Self {
        HttpResponse::json(status_code, json!({ "message": message.into() }))
    }

    pub fn not_implemented() -> Self {
        HttpResponse::message(501, "method/path not implemented")
    }

    pub fn from_error(err: ApiError) -> Self {
        HttpResponse::message(err.status_code(), err.to_string())
    }
}

/// Routes an inbound request by `(method, path)` to its handler and folds
/// any handler error into an error response rather than letting it escape --
/// a malformed request must never fail the whole Lambda invocation.
pub async fn dispatch(state: &AppState, envelope: HttpEnvelope) -> HttpResponse {
    let outcome = match (envelope.http_method.as_str(), envelope.path.as_str()) {
        ("POST", "/collections") => handlers::register_collections(state, &envelope).await,
        ("GET", "/gaps") => handlers::get_gaps(state, &envelope).await,
        ("POST", "/reasons") => handlers::add_reasons(state, &envelope).await,
        ("GET", "/reasons") => handlers::get_reasons(state, &envelope).await,
        ("POST", "/reports") => handlers::generate_report(state, &envelope).await,
        _ => return HttpResponse::not_implemented(),
    };

    match outcome {
        Ok(response) => response,
        Err(err) => HttpResponse::from_error(err),
    }
}
