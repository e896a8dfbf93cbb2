//! Blocking HTTP implementation of [`FormsClient`].
//!
//! Every call is a single request (pagination aside) bounded by the agent's
//! global timeout. Non-2xx statuses are surfaced as [`ApiError::Status`] rather
//! than transport errors so callers can tell a rejected token from a dead
//! network.
use super::{FormMetadata, FormResponse, FormsClient, ResponseFilter, ResponseSet};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use ureq::http::Response;
use ureq::Body;

/// Failure modes of a single forms API request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport: {0}")]
    Transport(#[from] ureq::Error),
    #[error("forms API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("decode response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("pagination did not advance: page token {token:?} was returned twice")]
    RepeatedPageToken { token: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403, i.e. the credential was missing, expired, or lacks scope.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePage {
    #[serde(default)]
    responses: Vec<FormResponse>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchDeleteRequest<'a> {
    filter: &'a ResponseFilter,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Forms API client authenticated with a bearer token.
pub struct HttpFormsClient {
    agent: ureq::Agent,
    api_base: String,
    authorization: String,
}

impl HttpFormsClient {
    pub fn new(api_base: &str, access_token: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: format!("Bearer {access_token}"),
        }
    }

    fn form_url(&self, form_id: &str) -> String {
        format!("{}/v1/forms/{}", self.api_base, form_id)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        page_token: Option<&str>,
    ) -> Result<T, ApiError> {
        let start = Instant::now();
        let mut request = self
            .agent
            .get(url)
            .header("Authorization", &self.authorization);
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }
        let text = read_body("GET", url, start, request.call())?;
        Ok(serde_json::from_str(&text)?)
    }

    fn put_json<T: Serialize>(&self, url: &str, body: &T) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = self
            .agent
            .put(url)
            .header("Authorization", &self.authorization)
            .send_json(body);
        read_body("PUT", url, start, result)?;
        Ok(())
    }

    fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<(), ApiError> {
        let start = Instant::now();
        let result = self
            .agent
            .post(url)
            .header("Authorization", &self.authorization)
            .send_json(body);
        read_body("POST", url, start, result)?;
        Ok(())
    }
}

fn read_body(
    method: &str,
    url: &str,
    start: Instant,
    result: Result<Response<Body>, ureq::Error>,
) -> Result<String, ApiError> {
    let mut response = result?;
    let status = response.status();
    let text = response.body_mut().read_to_string()?;
    tracing::debug!(
        method,
        url,
        status = status.as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        response_bytes = text.len(),
        "forms api call"
    );
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    Ok(text)
}

/// Prefer the API's `error.message`; fall back to the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ => body.trim().to_string(),
    }
}

impl FormsClient for HttpFormsClient {
    fn get_form(&self, form_id: &str) -> Result<FormMetadata> {
        Ok(self.get_json(&self.form_url(form_id), None)?)
    }

    fn update_form(&self, form_id: &str, form: &FormMetadata) -> Result<()> {
        self.put_json(&self.form_url(form_id), form)?;
        Ok(())
    }

    fn list_responses(&self, form_id: &str) -> Result<ResponseSet> {
        let url = format!("{}/responses", self.form_url(form_id));
        let mut responses = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: ResponsePage = self.get_json(&url, page_token.as_deref())?;
            responses.extend(page.responses);
            let Some(token) = page.next_page_token.filter(|token| !token.is_empty()) else {
                break;
            };
            if !seen_tokens.insert(token.clone()) {
                return Err(ApiError::RepeatedPageToken { token }.into());
            }
            page_token = Some(token);
        }
        tracing::debug!(form_id, pages = seen_tokens.len() + 1, "listed responses");
        Ok(ResponseSet {
            form_id: form_id.to_string(),
            responses,
        })
    }

    fn batch_delete_responses(&self, form_id: &str, filter: &ResponseFilter) -> Result<()> {
        let url = format!("{}/responses:batchDelete", self.form_url(form_id));
        self.post_json(&url, &BatchDeleteRequest { filter })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
