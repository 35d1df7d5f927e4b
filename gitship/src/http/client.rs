//! HTTP client for the deploy endpoint

use std::time::Duration;

use openapi_client::{DeployRequest, DEPLOY_TOKEN_HEADER};
use reqwest::{header, redirect, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::errors::DeployError;

/// Connection options for the deploy request
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Accept invalid TLS certificates
    pub insecure: bool,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Status and raw body of a deploy response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// HTTP client bound to one deploy endpoint
pub struct HttpClient {
    client: Client,
    url: String,
}

impl HttpClient {
    /// Create a client for the full endpoint URL
    pub fn new(url: &str, options: &ClientOptions) -> Result<Self, DeployError> {
        if options.insecure {
            warn!("TLS certificate verification is disabled for {}", url);
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .redirect(redirect::Policy::limited(5))
            .user_agent(format!("gitship/{}", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(options.insecure)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// POST the deploy request with the token header.
    ///
    /// Any HTTP status is returned as a response; only transport failures are errors.
    pub async fn post_deploy(
        &self,
        token: &SecretString,
        body: &DeployRequest,
    ) -> Result<RawResponse, reqwest::Error> {
        debug!("POST {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .header(DEPLOY_TOKEN_HEADER, token.expose_secret())
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("POST {} -> {}", self.url, status);

        Ok(RawResponse { status, body })
    }
}
