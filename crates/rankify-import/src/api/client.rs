//! HTTP API client for the Rankify backend
//!
//! Provides bulk record creation (the production upload sink) and category
//! lookup.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{redirect, Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::HashSet;

use crate::api::{endpoints, types::*};
use crate::config::ApiConfig;
use crate::error::{ImportError, Result};
use crate::pipeline::Batch;
use crate::record::{CategoryId, ImportMode};
use crate::sink::{SinkError, UploadSink};

/// Longest raw (non-JSON) error body surfaced to the user
const MAX_ERROR_BODY_CHARS: usize = 500;

/// API client for the Rankify backend
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// Redirects are not followed: the backend answers an expired session
    /// with a redirect to its login page, which must surface as an
    /// authorization failure rather than a 200 HTML page.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ImportError::config(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(redirect::Policy::none())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let config = ApiConfig::from_env().map_err(|e| ImportError::config(e.to_string()))?;
        Self::new(&config)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Create every record of `batch`, returning the created count.
    ///
    /// The count falls back to the batch size when the response omits it.
    pub async fn bulk_create(&self, mode: ImportMode, batch: &Batch) -> std::result::Result<u64, SinkError> {
        let url = endpoints::bulk_create_url(&self.base_url, mode, batch.is_final);
        let body = BulkCreateRequest {
            items: &batch.records,
        };

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, batch.index))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| request_error(e, batch.index))?;

        if is_unauthorized(status) {
            tracing::warn!(status = status.as_u16(), url = %url, "Bulk import not authorized");
            return Err(SinkError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let message = extract_error_message(&text)
                .unwrap_or_else(|| format!("Bulk import failed with HTTP {}", status.as_u16()));
            return Err(SinkError::rejected(Some(status.as_u16()), message));
        }

        let created = serde_json::from_str::<BulkCreateResponse>(&text)
            .ok()
            .and_then(|r| r.created)
            .unwrap_or(batch.len() as u64);
        Ok(created)
    }

    /// List every category, following limit/offset pagination
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let limit = endpoints::CATEGORY_PAGE_LIMIT;
        let mut all: Vec<Category> = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;

        loop {
            let url = endpoints::categories_url(&self.base_url, limit, offset);
            let response = self
                .authorize(self.client.get(&url))
                .send()
                .await?
                .error_for_status()?;

            let page = response.json::<CategoryList>().await?.into_vec();
            let page_len = page.len();
            let before = all.len();
            all.extend(page.into_iter().filter(|c| seen.insert(c.id)));

            // a backend that ignores offset would repeat the same page forever
            if page_len < limit || all.len() == before {
                break;
            }
            offset += limit;
        }

        tracing::debug!(count = all.len(), "Listed categories");
        Ok(all)
    }

    /// Resolve a category given as a numeric id, name or slug
    pub async fn resolve_category(&self, category: &str) -> Result<CategoryId> {
        let category = category.trim();
        if let Ok(id) = category.parse::<CategoryId>() {
            return Ok(id);
        }

        let categories = self.list_categories().await?;
        categories
            .iter()
            .find(|c| c.matches(category))
            .map(|c| c.id)
            .ok_or_else(|| {
                ImportError::config(format!(
                    "category '{}' not found. Run 'rankify-import categories' to list available categories",
                    category
                ))
            })
    }
}

#[async_trait]
impl UploadSink for ApiClient {
    async fn deliver(&self, mode: ImportMode, batch: &Batch) -> std::result::Result<u64, SinkError> {
        self.bulk_create(mode, batch).await
    }
}

fn is_unauthorized(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::FOUND
    )
}

fn request_error(err: reqwest::Error, batch: u64) -> SinkError {
    if err.is_timeout() {
        SinkError::Timeout { batch }
    } else {
        SinkError::transport(err.to_string())
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pull a readable message out of an error body.
///
/// A JSON string is used as-is, an array is joined with `", "`, and an
/// object (field errors) has its values flattened and joined with spaces.
/// Plain-text bodies are passed through; HTML pages and empty bodies yield
/// `None`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let message = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s,
        Ok(Value::Array(items)) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Ok(Value::Object(fields)) => fields
            .values()
            .flat_map(|v| match v {
                Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>(),
                other => vec![value_text(other)],
            })
            .collect::<Vec<_>>()
            .join(" "),
        Ok(_) => return None,
        Err(_) if trimmed.starts_with('<') => return None,
        Err(_) => trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    };

    let message = message.trim().to_string();
    (!message.is_empty()).then_some(message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_api_client_creation() {
        let client = ApiClient::new(&config("http://localhost:8000/api/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn test_api_client_rejects_bad_url() {
        assert!(matches!(
            ApiClient::new(&config("localhost:8000")),
            Err(ImportError::Config(_))
        ));
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(extract_error_message(r#""Bad CSV""#).unwrap(), "Bad CSV");
        assert_eq!(
            extract_error_message(r#"["name missing", "zip invalid"]"#).unwrap(),
            "name missing, zip invalid"
        );
        assert_eq!(
            extract_error_message(r#"{"detail": "Another bulk import is currently running."}"#).unwrap(),
            "Another bulk import is currently running."
        );
        assert_eq!(
            extract_error_message(r#"{"name": ["This field is required."], "zip": ["Too long."]}"#).unwrap(),
            "This field is required. Too long."
        );
        assert_eq!(extract_error_message("Service Unavailable").unwrap(), "Service Unavailable");
        assert_eq!(extract_error_message("<html><body>502</body></html>"), None);
        assert_eq!(extract_error_message("   "), None);
        assert_eq!(extract_error_message("{}"), None);
    }

    #[test]
    fn test_unauthorized_statuses() {
        assert!(is_unauthorized(StatusCode::UNAUTHORIZED));
        assert!(is_unauthorized(StatusCode::FORBIDDEN));
        assert!(is_unauthorized(StatusCode::FOUND));
        assert!(!is_unauthorized(StatusCode::BAD_REQUEST));
    }
}
