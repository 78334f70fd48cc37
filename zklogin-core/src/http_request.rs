use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};

use crate::error::ZkLoginError;

/// Outbound HTTP for the prover and the ledger. Adds the user agent and the configured
/// timeout, and sends every request exactly once.
#[derive(Debug, Clone)]
pub struct Request {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl Request {
    /// Client with an optional per-request timeout.
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Builder for `method` on `url`, carrying the user agent and timeout.
    pub(crate) fn req(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url).header(
            "User-Agent",
            format!("zklogin-core/{}", env!("CARGO_PKG_VERSION")),
        );
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// `POST` builder.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request built by `req`/`post`, mapping transport failures to `NetworkError`.
    ///
    /// Non-success statuses are returned as-is for the caller to interpret.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, ZkLoginError> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| ZkLoginError::NetworkError {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: None,
            error: format!("request build failed: {err}"),
        })?;
        let url = request.url().to_string();

        client
            .execute(request)
            .await
            .map_err(|err| ZkLoginError::NetworkError {
                url,
                status: None,
                error: if err.is_timeout() {
                    format!("request timed out: {err}")
                } else {
                    format!("request failed: {err}")
                },
            })
    }
}
