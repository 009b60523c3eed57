/// Kaspad RPC Client - block template retrieval from the full node
///
/// `node_source` picks the transport from the endpoint scheme: kaspad's own
/// wRPC JSON websocket (`ws://`, or a bare `host:port`) or JSON-RPC 2.0 over
/// HTTP (`http://`, `https://`) for deployments that front the node with a
/// JSON-RPC gateway. Every failure is surfaced as a `FetchError`; the poll
/// loop decides what to do with it (log and retry next cycle).

use async_trait::async_trait;
use hyper::{body::Buf, Method, Request};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use http_body_util::{BodyExt, Full};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::template::BlockTemplate;
use super::wrpc_client::KaspadWrpcClient;
use crate::metrics::prometheus as metrics;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("RPC request timeout after {0:?}")]
    Timeout(Duration),
    #[error("RPC connection failed: {0}")]
    Transport(String),
    #[error("RPC HTTP error: {0}")]
    Http(u16),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("node rejected template request: {0}")]
    Template(String),
    #[error("failed to decode RPC response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed template field: {0}")]
    Malformed(String),
}

/// Source of block templates keyed by payout address
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn get_block_template(&self, pay_address: &str) -> Result<BlockTemplate, FetchError>;
}

/// Build the template source for `endpoint`
pub fn node_source(endpoint: &str, timeout: Duration, extra_data: String) -> Arc<dyn TemplateSource> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Arc::new(KaspadRpcClient::new(endpoint, Some(timeout), extra_data))
    } else {
        Arc::new(KaspadWrpcClient::new(endpoint, Some(timeout), extra_data))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

/// JSON-RPC over HTTP, for a gateway in front of kaspad
pub struct KaspadRpcClient {
    base_url: String,
    timeout: Duration,
    extra_data: String,
    next_id: AtomicU64,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl KaspadRpcClient {
    /// `endpoint` may be a bare `host:port`; `http://` is assumed then.
    pub fn new(endpoint: &str, timeout: Option<Duration>, extra_data: String) -> Self {
        let base_url = normalize_endpoint(endpoint);

        let client = Client::builder(hyper_util::rt::TokioExecutor::new())
            .build_http();

        tracing::info!("KaspadRpcClient initialized: {}", base_url);

        Self {
            base_url,
            timeout: timeout.unwrap_or(Duration::from_secs(30)),
            extra_data,
            next_id: AtomicU64::new(1),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make RPC call to the node
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        metrics::inc_rpc_requests();

        let res = self.call_inner(method, params).await;
        if res.is_err() {
            metrics::inc_rpc_errors();
        }
        res
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        let payload = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: method.to_string(),
            params,
        };

        let body_bytes = serde_json::to_vec(&payload)?;
        let body = Full::new(Bytes::from(body_bytes));

        let req = Request::builder()
            .method(Method::POST)
            .uri(&self.base_url)
            .header("Content-Type", "application/json")
            .body(body)
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_bytes();
        let rpc_response: RpcResponse = serde_json::from_reader(body_bytes.reader())?;

        if let Some(error) = rpc_response.error {
            return Err(FetchError::Rpc(error.to_string()));
        }

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl TemplateSource for KaspadRpcClient {
    async fn get_block_template(&self, pay_address: &str) -> Result<BlockTemplate, FetchError> {
        let result = self
            .call(
                "getBlockTemplate",
                json!({ "payAddress": pay_address, "extraData": self.extra_data }),
            )
            .await?;
        parse_template(result)
    }
}

fn parse_template(result: Value) -> Result<BlockTemplate, FetchError> {
    let template: BlockTemplate = serde_json::from_value(result)?;
    if let Some(err) = &template.error {
        return Err(FetchError::Template(err.message.clone()));
    }
    Ok(template)
}

fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::template::tests::tagged_template;

    #[test]
    fn test_rpc_client_creation() {
        let client = KaspadRpcClient::new("127.0.0.1:8080", None, "Katpool".to_string());

        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_endpoint_with_scheme_is_kept() {
        assert_eq!(normalize_endpoint("https://node.example:443/rpc"), "https://node.example:443/rpc");
    }

    #[test]
    fn test_parse_template_rejects_node_error() {
        let mut value = serde_json::to_value(tagged_template(1)).unwrap();
        value["Error"] = json!({ "Message": "node is not synced" });

        match parse_template(value) {
            Err(FetchError::Template(msg)) => assert_eq!(msg, "node is not synced"),
            other => panic!("expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_template_rejects_garbage() {
        assert!(matches!(parse_template(json!({"foo": 1})), Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        // Port 9 (discard) is closed on any sane test host
        let client = KaspadRpcClient::new("127.0.0.1:9", Some(Duration::from_secs(2)), String::new());
        let err = client.get_block_template("kaspa:qq").await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_) | FetchError::Timeout(_)));
    }
}
