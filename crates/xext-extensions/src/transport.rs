//! Request/response channel to the chat server
//!
//! Requests name a `module` and a `method` and carry JSON params. Each
//! request gets a correlation id that the server echoes back in the
//! response.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use xext_core::types::NetworkConfig;
use xext_core::{Error, Result};

/// Outgoing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub rid: String,
    pub module: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Request {
    pub fn new(module: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            rid: Uuid::new_v4().to_string(),
            module: module.into(),
            method: method.into(),
            params,
        }
    }

    /// `module/method` route of the request
    pub fn route(&self) -> String {
        format!("{}/{}", self.module, self.method)
    }
}

/// Incoming response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub rid: Option<String>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    pub fn success(data: Value) -> Self {
        Self {
            rid: None,
            result: "success".to_string(),
            data,
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            rid: None,
            result: "fail".to_string(),
            data: Value::Null,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == "success"
    }

    /// Data of a successful response, or a transport error
    pub fn into_data(self) -> Result<Value> {
        if self.is_success() {
            Ok(self.data)
        } else {
            Err(Error::transport(
                self.message
                    .unwrap_or_else(|| format!("request failed with result '{}'", self.result)),
            ))
        }
    }
}

/// Sends requests to the server
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// [`Transport`] posting JSON over HTTP
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, network: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .timeout(Duration::from_secs(network.http_timeout_secs))
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: None,
        })
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        debug!("Sending {} ({})", request.route(), request.rid);
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(Error::transport)?;
        if !response.status().is_success() {
            return Err(Error::transport(format!(
                "{} responded with {}",
                request.route(),
                response.status()
            )));
        }

        let response: Response = response.json().await.map_err(Error::transport)?;
        if let Some(rid) = &response.rid {
            if rid != &request.rid {
                return Err(Error::transport(format!(
                    "Response {} does not match request {}",
                    rid, request.rid
                )));
            }
        }
        Ok(response)
    }
}
