// Transport used by the loader: "give me the text at this URL".
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::TransportError;

/// Retrieves the body of a URL as text. Implementations must fail on
/// anything but a successful response; an empty body is still a success.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError>;
}

/// Plain HTTP GET over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Self::with_user_agent(timeout, concat!("sales_report/", env!("CARGO_PKG_VERSION")))
    }

    fn with_user_agent(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn builder_failure_is_a_client_error() {
        let err = HttpTransport::with_user_agent(Duration::from_secs(5), "bad\nagent").unwrap_err();
        assert!(matches!(err, TransportError::Client(_)));
        assert!(err.to_string().starts_with("failed to build HTTP client"));
    }
}
