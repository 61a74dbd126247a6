//! REST client for the node API backed by `reqwest`.
//!
//! Features:
//! - Per-request timeout
//! - Automatic retry with exponential backoff for transient errors
//! - Circuit breaker shared by every monitor using the client

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use tokenindex_core::{Block, ChainClient, ContractInfo, IndexerConfig, IndexerError};

use crate::error::TransportError;
use crate::policy::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig, RetryPolicy};

/// Header carrying the node API key.
pub const API_KEY_HEADER: &str = "api_key";

/// Configuration for `HttpNodeClient`.
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl NodeClientConfig {
    /// Derive the client settings from the indexer configuration.
    pub fn from_indexer(config: &IndexerConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeightResponse {
    height: u64,
}

/// HTTP client for the node's REST API.
pub struct HttpNodeClient {
    base_url: String,
    http: reqwest::Client,
    api_key: Option<String>,
    retry: RetryPolicy,
    circuit: CircuitBreaker,
    request_timeout: Duration,
}

impl HttpNodeClient {
    /// Create a client for the node at `base_url` (e.g. `http://host:9922`).
    pub fn new(
        base_url: impl Into<String>,
        config: NodeClientConfig,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            circuit: CircuitBreaker::new(base_url.clone(), config.circuit_breaker),
            base_url,
            http,
            api_key: config.api_key,
            retry: RetryPolicy::new(config.retry),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// GET `path` and decode the JSON body, with retry and circuit breaking.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        if !self.circuit.is_allowed() {
            return Err(TransportError::CircuitOpen {
                url: self.base_url.clone(),
            });
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.get_once(path).await {
                Ok(value) => {
                    self.circuit.record_success();
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    self.circuit.record_failure();
                    match self.retry.next_delay(attempt) {
                        Some(delay) if self.circuit.is_allowed() => {
                            tracing::warn!(
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                path,
                                "Retrying node request"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        _ => {
                            tracing::error!(attempt, error = %e, path, "Node request failed");
                            return Err(e);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let resp = request.send().await.map_err(|e| self.map_reqwest(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await.map_err(|e| self.map_reqwest(e))?;
        serde_json::from_str(&body).map_err(|e| TransportError::Deserialization(e.to_string()))
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl ChainClient for HttpNodeClient {
    async fn contract_info(&self, contract_id: &str) -> Result<ContractInfo, IndexerError> {
        Ok(self.get_json(&format!("/contract/info/{contract_id}")).await?)
    }

    async fn height(&self) -> Result<u64, IndexerError> {
        let resp: HeightResponse = self.get_json("/blocks/height").await?;
        Ok(resp.height)
    }

    async fn blocks(&self, start: u64, end: u64) -> Result<Vec<Block>, IndexerError> {
        Ok(self.get_json(&format!("/blocks/seq/{start}/{end}")).await?)
    }
}

impl std::fmt::Debug for HttpNodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNodeClient")
            .field("base_url", &self.base_url)
            .field("circuit", &self.circuit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> NodeClientConfig {
        NodeClientConfig {
            api_key: None,
            request_timeout: Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(20),
                multiplier: 2,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 10,
                open_duration: Duration::from_secs(60),
                success_threshold: 1,
            },
        }
    }

    #[tokio::test]
    async fn reads_height_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/height"))
            .and(header("api_key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "height": 1000 })))
            .expect(1)
            .mount(&server)
            .await;

        let config = NodeClientConfig {
            api_key: Some("secret".into()),
            ..fast_config()
        };
        let client = HttpNodeClient::new(server.uri(), config).unwrap();
        assert_eq!(client.height().await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn fetches_contract_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contract/info/CF1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "contractId": "CF1",
                "transactionId": "tx0",
                "type": "NonFungibleContract",
                "height": 500,
                "info": []
            })))
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(server.uri(), fast_config()).unwrap();
        let info = client.contract_info("CF1").await.unwrap();
        assert_eq!(info.contract_type.as_deref(), Some("NonFungibleContract"));
        assert_eq!(info.height, Some(500));
    }

    #[tokio::test]
    async fn fetches_block_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/seq/10/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "height": 10, "transaction count": 1, "transactions": [{ "type": 5 }] },
                { "height": 11, "transaction count": 2, "transactions": [
                    { "type": 5 },
                    { "type": 9, "status": "Success", "contractId": "CF1", "functionIndex": 2 }
                ]}
            ])))
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(format!("{}/", server.uri()), fast_config()).unwrap();
        let blocks = client.blocks(10, 11).await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].transactions[1].function_index, Some(2));
    }

    #[tokio::test]
    async fn odd_transaction_fields_do_not_reject_the_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/seq/12/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "height": 12, "transaction count": 3, "transactions": [
                    { "type": 5 },
                    { "type": 9, "contractId": "CFother", "functionIndex": "2" },
                    { "type": 9, "status": "Success", "contractId": "CF1", "functionIndex": 2,
                      "functionData": "payload", "proofs": [{ "address": "AR1" }] }
                ]}
            ])))
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(server.uri(), fast_config()).unwrap();
        let blocks = client.blocks(12, 12).await.unwrap();
        let txs = &blocks[0].transactions;
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[1].function_index, None);
        assert_eq!(txs[2].function_index, Some(2));
        assert_eq!(txs[2].sender(), Some("AR1"));
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/height"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blocks/height"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "height": 7 })))
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(server.uri(), fast_config()).unwrap();
        assert_eq!(client.height().await.unwrap(), 7);
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contract/info/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(server.uri(), fast_config()).unwrap();
        let err = client.contract_info("missing").await.unwrap_err();
        assert!(matches!(err, IndexerError::Node(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn exhausted_retries_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(server.uri(), fast_config()).unwrap();
        let err = client.height().await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn circuit_opens_on_repeated_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let config = NodeClientConfig {
            retry: RetryConfig {
                max_retries: 0,
                ..fast_config().retry
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: 2,
                open_duration: Duration::from_secs(60),
                success_threshold: 1,
            },
            ..fast_config()
        };
        let client = HttpNodeClient::new(server.uri(), config).unwrap();

        assert!(client.height().await.is_err());
        assert!(client.height().await.is_err());
        assert_eq!(client.circuit_state(), CircuitState::Open);

        let err = client.get_json::<HeightResponse>("/blocks/height").await.unwrap_err();
        assert!(matches!(err, TransportError::CircuitOpen { .. }));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_body_is_a_node_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blocks/height"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = HttpNodeClient::new(server.uri(), fast_config()).unwrap();
        assert!(matches!(
            client.height().await.unwrap_err(),
            IndexerError::Node(_)
        ));
    }
}
