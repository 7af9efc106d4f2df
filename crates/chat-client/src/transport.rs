//! reqwest-backed transport
//!
//! The production [`Transport`] implementation: renders the dispatcher's
//! request into an HTTP call against the configured base URL and decodes
//! the rate-limit headers off the response.

use crate::error::ClientError;
use async_trait::async_trait;
use chat_common::RestConfig;
use chat_limiter::{
    Method, RateLimitHeaders, Request, Transport, TransportError, TransportResponse,
};

/// HTTP transport over reqwest
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestTransport {
    /// Build the transport with the configured per-request timeout
    pub fn new(config: &RestConfig, token: String) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| ClientError::Http(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token,
        })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .client
            .request(Self::method(request.method), &url)
            .bearer_auth(&self.token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let rate = RateLimitHeaders::from_lookup(|name| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(String::from)
        });
        let body = response.bytes().await.map_err(map_error)?.to_vec();

        Ok(TransportResponse { status, rate, body })
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
