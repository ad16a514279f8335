//! Table service client and batch executor

use crate::batch::{Batch, parse_batch_response, serialize_batch};
use crate::config::ClientConfig;
use crate::errors::{Result, TableError};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Request signing seam.
///
/// Authentication is an external collaborator: implementations add whatever
/// authorization headers the deployment requires. The client invokes the
/// signer once per request, after all protocol headers are in place.
pub trait RequestSigner: Send + Sync + fmt::Debug {
    /// Add authorization headers for the given request
    fn sign(&self, method: &Method, url: &Url, headers: &mut HeaderMap);
}

/// No-op signer for anonymous or emulator endpoints
#[derive(Debug, Default)]
pub struct AnonymousSigner;

impl RequestSigner for AnonymousSigner {
    fn sign(&self, _method: &Method, _url: &Url, _headers: &mut HeaderMap) {}
}

/// Client for the table service's batch endpoint.
///
/// Holds one `reqwest` client; independent batches may be executed
/// concurrently from multiple tasks, the client shares no mutable state
/// between calls.
#[derive(Debug, Clone)]
pub struct TableClient {
    config: ClientConfig,
    http: reqwest::Client,
    signer: Arc<dyn RequestSigner>,
}

impl TableClient {
    /// Create a client with the no-op signer
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_signer(config, Arc::new(AnonymousSigner))
    }

    /// Create a client with a custom request signer
    pub fn with_signer(config: ClientConfig, signer: Arc<dyn RequestSigner>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.settings.timeout))
            .build()
            .map_err(|e| {
                TableError::InvalidArgument(format!("failed to create HTTP client: {}", e))
            })?;

        info!(endpoint = %config.endpoint, "table client created");

        Ok(Self {
            config,
            http,
            signer,
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a batch as one atomic transaction.
    ///
    /// On success, returns one slot per operation in append order: the
    /// post-mutation ETag, or `None` for a Delete (no surviving row, no
    /// token). On any failure nothing in the batch was applied and a single
    /// error is raised; partial results are never returned.
    ///
    /// The request is sent exactly once. Re-executing an equivalent batch is
    /// not idempotent (an Insert fails the second time), so any retry policy
    /// belongs to a layer that knows the batch's contents.
    pub async fn execute_batch(&self, batch: Batch) -> Result<Vec<Option<String>>> {
        if batch.is_empty() {
            return Err(TableError::InvalidArgument(
                "cannot execute an empty batch".to_string(),
            ));
        }

        let serialized = serialize_batch(&batch, &self.config.endpoint)?;
        let url = self.batch_url()?;

        debug!(
            table = batch.table(),
            partition_key = batch.partition_key(),
            operations = batch.len(),
            "executing batch"
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&serialized.content_type)
                .map_err(|e| TableError::InvalidArgument(format!("invalid content type: {}", e)))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json;odata=minimalmetadata"),
        );
        headers.insert("DataServiceVersion", HeaderValue::from_static("3.0;"));
        headers.insert("MaxDataServiceVersion", HeaderValue::from_static("3.0;"));
        if let Ok(agent) = HeaderValue::from_str(&self.config.settings.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        self.signer.sign(&Method::POST, &url, &mut headers);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .body(serialized.body)
            .send()
            .await
            .map_err(|e| TableError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .text()
            .await
            .map_err(|e| TableError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            warn!(status, "batch request rejected");
        }
        parse_batch_response(status, content_type.as_deref(), &body, batch.len())
    }

    fn batch_url(&self) -> Result<Url> {
        let base = self.config.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/$batch", base))
            .map_err(|e| TableError::InvalidArgument(format!("invalid batch URL: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    fn config() -> ClientConfig {
        ConfigBuilder::new()
            .endpoint("https://account.table.example.net/")
            .build()
            .unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = TableClient::new(config()).unwrap();
        assert_eq!(
            client.config().endpoint.as_str(),
            "https://account.table.example.net/"
        );
    }

    #[test]
    fn test_batch_url() {
        let client = TableClient::new(config()).unwrap();
        assert_eq!(
            client.batch_url().unwrap().as_str(),
            "https://account.table.example.net/$batch"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_fails_before_any_request() {
        let client = TableClient::new(config()).unwrap();
        let batch = Batch::new("mytable", "p").unwrap();
        let err = client.execute_batch(batch).await.unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
