use crate::blockchain::models::RpcBlock;
use crate::config::RpcConfig;
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const RPC_VERSION: &str = "1.0";
const RPC_ID: &str = "indexer";

/// Verbosity for `getblock` that inlines decoded transactions.
const BLOCK_VERBOSITY: u8 = 2;

/// Network failures worth another attempt, and everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    ConnectionReset,
    TimedOut,
    Aborted,
    Other,
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Transport error ({kind:?}) calling {method}: {source}")]
    Transport {
        method: String,
        kind: TransportKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("Node error {code} calling {method}: {message}")]
    Node {
        method: String,
        code: i64,
        message: String,
    },

    #[error("HTTP status {status} calling {method}")]
    Http { method: String, status: u16 },

    #[error("Invalid response to {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RpcError {
    /// Only connection resets, timeouts and aborted connections are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport { kind, .. } if *kind != TransportKind::Other)
    }
}

/// Read access to the chain, as needed by the synchronizer.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Height of the node's current tip.
    async fn get_block_count(&self) -> Result<u64, RpcError>;

    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError>;

    /// Full block with decoded transactions.
    async fn get_block(&self, hash: &str) -> Result<RpcBlock, RpcError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorPayload>,
}

#[derive(Deserialize)]
struct RpcErrorPayload {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC client for a Zcash full node.
///
/// One HTTP client, and so one connection pool, is shared by every call.
#[derive(Clone)]
pub struct RpcClient {
    http_client: Client,
    url: String,
    user: String,
    password: String,
    max_retries: usize,
    retry_delay: Duration,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        info!("Initializing node RPC client with endpoint: {}", config.url);

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RpcError::Client)?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        })
    }

    /// Calls `method` and decodes its result.
    ///
    /// Transient transport failures are retried after a fixed delay until the
    /// retry budget runs out; the last failure is then returned. Node errors
    /// and every other failure are returned at once.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: &[Value]) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: RPC_VERSION,
            id: RPC_ID,
            method,
            params,
        };

        let policy = ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(self.max_retries);

        let result = (|| self.send(&request))
            .retry(policy)
            .when(RpcError::is_transient)
            .notify(|err, delay| warn!("RPC {} failed: {}; retrying in {:?}", method, err, delay))
            .await?;

        serde_json::from_value(result).map_err(|source| RpcError::Decode {
            method: method.to_string(),
            source,
        })
    }

    async fn send(&self, request: &RpcRequest<'_>) -> Result<Value, RpcError> {
        debug!("RPC call {} {:?}", request.method, request.params);

        let response = self
            .http_client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(request.method, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(request.method, e))?;

        // Nodes answer RPC errors with a non-2xx status and an error envelope
        let envelope: RpcResponse = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Http {
                    method: request.method.to_string(),
                    status: status.as_u16(),
                });
            }
            Err(source) => {
                return Err(RpcError::Decode {
                    method: request.method.to_string(),
                    source,
                });
            }
        };

        if let Some(error) = envelope.error {
            return Err(RpcError::Node {
                method: request.method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        if !status.is_success() {
            return Err(RpcError::Http {
                method: request.method.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainSource for RpcClient {
    async fn get_block_count(&self) -> Result<u64, RpcError> {
        self.call("getblockcount", &[]).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<String, RpcError> {
        self.call("getblockhash", &[json!(height)]).await
    }

    async fn get_block(&self, hash: &str) -> Result<RpcBlock, RpcError> {
        self.call("getblock", &[json!(hash), json!(BLOCK_VERBOSITY)]).await
    }
}

fn transport_error(method: &str, source: reqwest::Error) -> RpcError {
    RpcError::Transport {
        method: method.to_string(),
        kind: transport_kind(&source),
        source,
    }
}

fn transport_kind(err: &reqwest::Error) -> TransportKind {
    if err.is_timeout() {
        return TransportKind::TimedOut;
    }

    let mut cause = err.source();
    while let Some(current) = cause {
        if let Some(io_err) = current.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionReset => return TransportKind::ConnectionReset,
                io::ErrorKind::TimedOut => return TransportKind::TimedOut,
                io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => {
                    return TransportKind::Aborted
                }
                _ => {}
            }
        }
        // Peer closed the socket before a full response arrived
        if let Some(hyper_err) = current.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() {
                return TransportKind::Aborted;
            }
        }
        cause = current.source();
    }

    TransportKind::Other
}
