//! HTTP collaborator - request execution delegated to reqwest

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::CollaboratorError;
use crate::spec::Method;

/// An HTTP response as observed from the collaborator. Non-JSON bodies
/// are observed with `body: None`; shape assertions against them fail
/// as mismatches, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

/// External HTTP client seam. One instance per execution context keeps
/// cases isolated from each other.
#[async_trait]
pub trait HttpCollaborator: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, CollaboratorError>;
}

/// Production collaborator backed by a dedicated `reqwest::Client`.
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpCollaborator for ReqwestHttp {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, CollaboratorError> {
        debug!("{} {}", method.as_str(), url);

        let mut request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.json::<serde_json::Value>().await.ok();

        Ok(HttpResponse { status, headers, body })
    }
}

fn classify(err: reqwest::Error) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout(err.to_string())
    } else if err.is_connect() {
        CollaboratorError::Connection(err.to_string())
    } else {
        CollaboratorError::Protocol(err.to_string())
    }
}
