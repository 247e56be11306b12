//! JSON-RPC client for a Casper node.
use crate::error::RpcError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

pub const METHOD_GET_BLOCK: &str = "chain_get_block";
pub const METHOD_GET_STATUS: &str = "info_get_status";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Walk a list of JSON pointers and return the first value present.
fn lookup<'a>(value: &'a Value, pointers: &[&str]) -> Option<&'a Value> {
    pointers.iter().find_map(|p| value.pointer(p))
}

/// Latest block as reported by `chain_get_block`. The payload shape belongs to the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockInfo(Value);

impl BlockInfo {
    pub fn new(value: Value) -> Self {
        BlockInfo(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn height(&self) -> Option<u64> {
        lookup(&self.0, &["/block/header/height", "/height"]).and_then(Value::as_u64)
    }

    pub fn hash(&self) -> Option<&str> {
        lookup(&self.0, &["/block/hash", "/hash"]).and_then(Value::as_str)
    }
}

/// Node health snapshot as reported by `info_get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeStatus(Value);

impl NodeStatus {
    pub fn new(value: Value) -> Self {
        NodeStatus(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }

    pub fn version(&self) -> Option<&str> {
        lookup(&self.0, &["/api_version", "/version"]).and_then(Value::as_str)
    }

    /// Peer count, whether the node reports a peer list or a bare number.
    pub fn peer_count(&self) -> Option<usize> {
        let peers = self.0.get("peers")?;
        match peers {
            Value::Array(list) => Some(list.len()),
            other => other.as_u64().map(|n| n as usize),
        }
    }

    pub fn last_added_block_height(&self) -> Option<u64> {
        self.0
            .pointer("/last_added_block_info/height")
            .and_then(Value::as_u64)
    }
}

/// The two node queries the probe needs.
pub trait NodeRpc {
    fn fetch_latest_block_info(&self) -> impl Future<Output = Result<BlockInfo, RpcError>> + Send;

    fn fetch_status(&self) -> impl Future<Output = Result<NodeStatus, RpcError>> + Send;
}

pub struct CasperRpcClient {
    node_url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl CasperRpcClient {
    pub fn new(node_url: &str) -> Self {
        Self::with_client(node_url, reqwest::Client::new())
    }

    /// Use a preconfigured HTTP client (proxy, TLS or timeout settings).
    pub fn with_client(node_url: &str, http: reqwest::Client) -> Self {
        CasperRpcClient {
            node_url: node_url.to_string(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    async fn call(&self, method: &str) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: None,
        };
        debug!("RPC {} -> {}", method, self.node_url);

        let response = self
            .http
            .post(&self.node_url)
            .json(&request)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                method: method.to_string(),
                url: self.node_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| RpcError::Malformed {
                method: method.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(err) = body.error {
            return Err(RpcError::Rpc {
                method: method.to_string(),
                code: err.code,
                message: err.message,
            });
        }

        body.result.ok_or_else(|| RpcError::Malformed {
            method: method.to_string(),
            reason: "response carries neither result nor error".to_string(),
        })
    }
}

impl NodeRpc for CasperRpcClient {
    async fn fetch_latest_block_info(&self) -> Result<BlockInfo, RpcError> {
        self.call(METHOD_GET_BLOCK).await.map(BlockInfo::new)
    }

    async fn fetch_status(&self) -> Result<NodeStatus, RpcError> {
        self.call(METHOD_GET_STATUS).await.map(NodeStatus::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;

    type Reply = fn(&str, Value) -> (StatusCode, Value);

    /// Serve `reply` as a JSON-RPC endpoint on an ephemeral port.
    async fn spawn_node(reply: Reply) -> String {
        let app = Router::new().route(
            "/rpc",
            post(move |Json(req): Json<Value>| async move {
                let method = req["method"].as_str().unwrap_or_default().to_string();
                let (status, body) = reply(&method, req["id"].clone());
                (status, Json(body))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/rpc", addr)
    }

    fn client(url: &str) -> CasperRpcClient {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        CasperRpcClient::with_client(url, http)
    }

    fn casper_node(method: &str, id: Value) -> (StatusCode, Value) {
        let result = match method {
            METHOD_GET_BLOCK => json!({
                "api_version": "1.5.6",
                "block": {
                    "hash": "abc",
                    "header": { "height": 100, "era_id": 12 },
                    "body": { "deploy_hashes": [] }
                }
            }),
            METHOD_GET_STATUS => json!({
                "api_version": "1.5.6",
                "peers": [
                    { "node_id": "tls:01", "address": "10.0.0.1:35000" },
                    { "node_id": "tls:02", "address": "10.0.0.2:35000" },
                    { "node_id": "tls:03", "address": "10.0.0.3:35000" }
                ],
                "last_added_block_info": { "hash": "abc", "height": 100 }
            }),
            _ => {
                return (
                    StatusCode::OK,
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32601, "message": "Method not found" }
                    }),
                );
            }
        };
        (
            StatusCode::OK,
            json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        )
    }

    #[tokio::test]
    async fn test_fetch_latest_block_info() {
        let url = spawn_node(casper_node).await;
        let client = client(&url);

        let block = client.fetch_latest_block_info().await.unwrap();
        assert_eq!(block.height(), Some(100));
        assert_eq!(block.hash(), Some("abc"));
    }

    #[tokio::test]
    async fn test_fetch_status() {
        let url = spawn_node(casper_node).await;
        let client = client(&url);

        let status = client.fetch_status().await.unwrap();
        assert_eq!(status.version(), Some("1.5.6"));
        assert_eq!(status.peer_count(), Some(3));
        assert_eq!(status.last_added_block_height(), Some(100));
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        fn reject(_method: &str, id: Value) -> (StatusCode, Value) {
            (
                StatusCode::OK,
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": -32001, "message": "block not known" }
                }),
            )
        }
        let url = spawn_node(reject).await;
        let client = client(&url);

        match client.fetch_latest_block_info().await {
            Err(RpcError::Rpc { method, code, message }) => {
                assert_eq!(method, METHOD_GET_BLOCK);
                assert_eq!(code, -32001);
                assert_eq!(message, "block not known");
            }
            other => panic!("expected rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_status_error() {
        fn unavailable(_method: &str, _id: Value) -> (StatusCode, Value) {
            (StatusCode::SERVICE_UNAVAILABLE, json!({}))
        }
        let url = spawn_node(unavailable).await;
        let client = client(&url);

        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(err, RpcError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_response_without_result() {
        fn empty(_method: &str, id: Value) -> (StatusCode, Value) {
            (StatusCode::OK, json!({ "jsonrpc": "2.0", "id": id }))
        }
        let url = spawn_node(empty).await;
        let client = client(&url);

        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(err, RpcError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(&format!("http://{}/rpc", addr));
        let err = client.fetch_latest_block_info().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport { .. }));
        assert!(err.to_string().contains("network error"));
    }

    #[test]
    fn test_request_envelope() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: METHOD_GET_STATUS,
            params: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(
            encoded,
            json!({ "jsonrpc": "2.0", "id": 7, "method": "info_get_status" })
        );
    }

    #[test]
    fn test_accessors_tolerate_unknown_shapes() {
        let block = BlockInfo::new(json!({ "unexpected": true }));
        assert_eq!(block.height(), None);
        assert_eq!(block.hash(), None);

        let status = NodeStatus::new(json!({ "peers": 3, "version": "1.0" }));
        assert_eq!(status.peer_count(), Some(3));
        assert_eq!(status.version(), Some("1.0"));
    }
}
