//! reqwest-backed HTTP client for the remote adapter.

use crate::error::CliResult;
use docbridge_sync_engine::{HttpClient, HttpResponse, Method, RemoteConfig, SyncError};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

/// Blocking client that attaches the bearer token and API version header.
pub struct ReqwestClient {
    client: Client,
    token: String,
    api_version: String,
}

impl ReqwestClient {
    /// Builds a client from a validated remote configuration.
    pub fn new(config: &RemoteConfig) -> CliResult<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| SyncError::missing_credential("api token"))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("docbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            token,
            api_version: config.api_version.clone(),
        })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> Result<HttpResponse, String> {
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.api_version);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
