/// Kaspad wRPC Client - block templates over rusty-kaspa's JSON websocket RPC
///
/// kaspad serves wRPC JSON on port 18110 (mainnet). Requests are
/// `{"id", "method", "params"}` text frames; the reply carries the same id
/// with the result under `params` or a failure under `error`. Field names in
/// results are camelCase and get mapped onto the PascalCase `BlockTemplate`
/// the channel subscribers decode.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use super::rpc_client::{FetchError, TemplateSource};
use super::template::{
    BlockTemplate, RpcBlock, RpcBlockHeader, RpcBlockLevelParents, RpcOutpoint, RpcScriptPublicKey,
    RpcTransaction, RpcTransactionInput, RpcTransactionOutput,
};
use crate::metrics::prometheus as metrics;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Serialize)]
struct WrpcRequest<'a, P: Serialize> {
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct WrpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetBlockTemplateRequest<'a> {
    pay_address: &'a str,
    extra_data: &'a [u8],
}

pub struct KaspadWrpcClient {
    url: String,
    timeout: Duration,
    extra_data: String,
    next_id: AtomicU64,
    stream: Mutex<Option<WsStream>>,
}

impl KaspadWrpcClient {
    /// `endpoint` may be a bare `host:port`; `ws://` is assumed then.
    /// The socket is opened on the first call and reopened after any
    /// transport failure.
    pub fn new(endpoint: &str, timeout: Option<Duration>, extra_data: String) -> Self {
        let url = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("ws://{}", endpoint)
        };

        tracing::info!("KaspadWrpcClient initialized: {}", url);

        Self {
            url,
            timeout: timeout.unwrap_or(Duration::from_secs(30)),
            extra_data,
            next_id: AtomicU64::new(1),
            stream: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<P: Serialize>(&self, method: &str, params: P) -> Result<Value, FetchError> {
        metrics::inc_rpc_requests();

        let res = self.call_inner(method, params).await;
        if res.is_err() {
            metrics::inc_rpc_errors();
        }
        res
    }

    async fn call_inner<P: Serialize>(&self, method: &str, params: P) -> Result<Value, FetchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = serde_json::to_string(&WrpcRequest { id, method, params })?;

        let mut slot = self.stream.lock().await;
        let res = match tokio::time::timeout(self.timeout, exchange(&self.url, &mut slot, id, text)).await {
            Ok(res) => res,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        if matches!(res, Err(FetchError::Transport(_) | FetchError::Timeout(_))) && slot.take().is_some() {
            tracing::debug!("Dropped wRPC connection to {}", self.url);
        }
        res
    }
}

async fn exchange(url: &str, slot: &mut Option<WsStream>, id: u64, text: String) -> Result<Value, FetchError> {
    let ws = match slot.take() {
        Some(ws) => ws,
        None => {
            let (ws, _) = connect_async(url).await.map_err(transport)?;
            tracing::info!("Connected to kaspad wRPC at {}", url);
            ws
        }
    };
    let ws = slot.insert(ws);

    ws.send(Message::Text(text)).await.map_err(transport)?;

    while let Some(msg) = ws.next().await {
        match msg.map_err(transport)? {
            Message::Text(text) => {
                let response: WrpcResponse = serde_json::from_str(&text)?;
                // Notifications and stale replies carry another id
                if response.id != Some(id) {
                    continue;
                }
                if let Some(error) = response.error {
                    return Err(FetchError::Rpc(error_message(&error)));
                }
                return Ok(response.params.unwrap_or(Value::Null));
            }
            Message::Ping(data) => ws.send(Message::Pong(data)).await.map_err(transport)?,
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(FetchError::Transport("connection closed by node".to_string()))
}

fn transport(e: impl std::fmt::Display) -> FetchError {
    FetchError::Transport(e.to_string())
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

#[async_trait]
impl TemplateSource for KaspadWrpcClient {
    async fn get_block_template(&self, pay_address: &str) -> Result<BlockTemplate, FetchError> {
        let request = GetBlockTemplateRequest {
            pay_address,
            extra_data: self.extra_data.as_bytes(),
        };
        let result = self.call("getBlockTemplate", request).await?;
        let response: WrpcBlockTemplate = serde_json::from_value(result)?;
        response.into_template()
    }
}

// ---------------------------------------------------------------------------
// camelCase response model
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcBlockTemplate {
    block: WrpcBlock,
    #[serde(default)]
    is_synced: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcBlock {
    header: WrpcHeader,
    #[serde(default)]
    transactions: Vec<WrpcTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcHeader {
    version: u32,
    #[serde(default)]
    parents_by_level: Vec<Vec<String>>,
    hash_merkle_root: String,
    accepted_id_merkle_root: String,
    utxo_commitment: String,
    timestamp: i64,
    bits: u32,
    nonce: u64,
    daa_score: u64,
    blue_work: BlueWork,
    blue_score: u64,
    pruning_point: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcTransaction {
    version: u16,
    #[serde(default)]
    inputs: Vec<WrpcInput>,
    #[serde(default)]
    outputs: Vec<WrpcOutput>,
    lock_time: u64,
    subnetwork_id: HexBytes,
    gas: u64,
    payload: HexBytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcInput {
    previous_outpoint: WrpcOutpoint,
    signature_script: HexBytes,
    sequence: u64,
    sig_op_count: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcOutpoint {
    transaction_id: String,
    index: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrpcOutput {
    value: u64,
    script_public_key: ScriptKey,
}

/// Byte fields arrive hex encoded; raw arrays are accepted too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HexBytes {
    Hex(String),
    Raw(Vec<u8>),
}

impl HexBytes {
    fn into_hex(self) -> String {
        match self {
            HexBytes::Hex(s) => s,
            HexBytes::Raw(bytes) => hex::encode(bytes),
        }
    }
}

/// Either `"<version:4 hex><script hex>"` or `{version, script}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptKey {
    Packed(String),
    Split { version: u16, script: HexBytes },
}

impl ScriptKey {
    fn into_rpc(self) -> Result<RpcScriptPublicKey, FetchError> {
        match self {
            ScriptKey::Split { version, script } => Ok(RpcScriptPublicKey {
                version,
                script: script.into_hex(),
            }),
            ScriptKey::Packed(s) => {
                let version = s
                    .get(..4)
                    .and_then(|v| u16::from_str_radix(v, 16).ok())
                    .ok_or_else(|| FetchError::Malformed(format!("scriptPublicKey '{}'", s)))?;
                Ok(RpcScriptPublicKey {
                    version,
                    script: s[4..].to_string(),
                })
            }
        }
    }
}

/// Hex string (optionally 0x-prefixed) or a plain number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BlueWork {
    Hex(String),
    Number(u64),
}

impl BlueWork {
    /// Lowercase hex without leading zeros
    fn into_hex(self) -> String {
        let digits = match self {
            BlueWork::Hex(s) => s.trim_start_matches("0x").to_ascii_lowercase(),
            BlueWork::Number(n) => format!("{:x}", n),
        };
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() }
    }
}

impl WrpcBlockTemplate {
    fn into_template(self) -> Result<BlockTemplate, FetchError> {
        let h = self.block.header;
        let header = RpcBlockHeader {
            version: h.version,
            parents: h
                .parents_by_level
                .into_iter()
                .map(|parent_hashes| RpcBlockLevelParents { parent_hashes })
                .collect(),
            hash_merkle_root: h.hash_merkle_root,
            accepted_id_merkle_root: h.accepted_id_merkle_root,
            utxo_commitment: h.utxo_commitment,
            timestamp: h.timestamp,
            bits: h.bits,
            nonce: h.nonce,
            daa_score: h.daa_score,
            blue_work: h.blue_work.into_hex(),
            blue_score: h.blue_score,
            pruning_point: h.pruning_point,
        };

        let transactions = self
            .block
            .transactions
            .into_iter()
            .map(WrpcTransaction::into_rpc)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BlockTemplate {
            block: RpcBlock {
                header,
                transactions,
                verbose_data: None,
            },
            is_synced: self.is_synced,
            error: None,
        })
    }
}

impl WrpcTransaction {
    fn into_rpc(self) -> Result<RpcTransaction, FetchError> {
        let outputs = self
            .outputs
            .into_iter()
            .map(|o| {
                Ok(RpcTransactionOutput {
                    amount: o.value,
                    script_public_key: o.script_public_key.into_rpc()?,
                    verbose_data: None,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        Ok(RpcTransaction {
            version: self.version,
            inputs: self
                .inputs
                .into_iter()
                .map(|i| RpcTransactionInput {
                    previous_outpoint: RpcOutpoint {
                        transaction_id: i.previous_outpoint.transaction_id,
                        index: i.previous_outpoint.index,
                    },
                    signature_script: i.signature_script.into_hex(),
                    sequence: i.sequence,
                    sig_op_count: i.sig_op_count,
                    verbose_data: None,
                })
                .collect(),
            outputs,
            lock_time: self.lock_time,
            subnetwork_id: self.subnetwork_id.into_hex(),
            gas: self.gas,
            payload: self.payload.into_hex(),
            verbose_data: None,
        })
    }
}
