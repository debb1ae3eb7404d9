//! Blocking HTTP helpers shared by the Indigo, GitHub and raw-content clients

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Map, Value};

use crate::error::{CatalogError, Result};

/// Upper bound for every remote call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const USER_AGENT: &str = concat!("device-catalog/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 300;

pub fn build_client(accept_invalid_certs: bool) -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| CatalogError::Network {
            url: String::new(),
            message: format!("failed to build HTTP client: {}", e),
        })
}

/// Send a request and parse the JSON body. An empty body yields `{}`.
pub fn send_json(request: RequestBuilder, url: &str) -> Result<Value> {
    let response = request.send().map_err(|e| CatalogError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    let body = response.text().map_err(|e| CatalogError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    if !status.is_success() {
        return Err(CatalogError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            message: truncate(&body),
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(&body).map_err(|e| CatalogError::MalformedResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
