//! tests/rpc_tests.rs - JSON-RPC client against a mock node served by axum

#[cfg(test)]
mod tests {
    use crate::blockchain::client::{ChainSource, RpcClient, RpcError, TransportKind};
    use crate::config::RpcConfig;
    use axum::{
        extract::State,
        http::{header, HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    // base64("user:pass")
    const EXPECTED_AUTH: &str = "Basic dXNlcjpwYXNz";

    #[derive(Clone, Copy)]
    enum Mode {
        Healthy,
        NodeError,
        Slow,
        NotJson,
    }

    struct MockNode {
        mode: Mode,
        hits: AtomicUsize,
        last_request: Mutex<Option<Value>>,
    }

    impl MockNode {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    async fn handle(State(node): State<Arc<MockNode>>, headers: HeaderMap, Json(request): Json<Value>) -> Response {
        node.hits.fetch_add(1, Ordering::SeqCst);
        *node.last_request.lock().unwrap() = Some(request.clone());

        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some(EXPECTED_AUTH);
        if !authorized {
            return StatusCode::UNAUTHORIZED.into_response();
        }

        match node.mode {
            Mode::Slow => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"result": 1, "error": null, "id": "indexer"})).into_response()
            }
            Mode::NotJson => (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response(),
            Mode::NodeError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "result": null,
                    "error": {"code": -8, "message": "Block height out of range"},
                    "id": "indexer"
                })),
            )
                .into_response(),
            Mode::Healthy => {
                let result = match request["method"].as_str() {
                    Some("getblockcount") => json!(2_750_000),
                    Some("getblockhash") => json!(format!("hash-{}", request["params"][0])),
                    Some("getblock") => json!({
                        "hash": request["params"][0],
                        "height": 2_750_000,
                        "time": 1_730_000_000,
                        "previousblockhash": "hash-2749999",
                        "tx": [{"txid": "cb", "vin": [{"coinbase": "03"}], "vout": []}]
                    }),
                    _ => Value::Null,
                };
                Json(json!({"result": result, "error": null, "id": "indexer"})).into_response()
            }
        }
    }

    async fn spawn_node(mode: Mode) -> (String, Arc<MockNode>) {
        let node = Arc::new(MockNode {
            mode,
            hits: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        });

        let app = Router::new().route("/", post(handle)).with_state(node.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (url, node)
    }

    #[derive(Clone, Copy)]
    enum Hangup {
        Close,
        Reset,
    }

    // Reads one whole request, then closes the socket without answering.
    async fn spawn_hangup_node(hangup: Hangup) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    read_request(&mut stream).await;
                    if let Hangup::Reset = hangup {
                        #[allow(deprecated)]
                        let _ = stream.set_linger(Some(Duration::ZERO));
                    }
                    drop(stream);
                });
            }
        });

        (url, hits)
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) {
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = stream.read(&mut chunk).await.unwrap_or(0);
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    fn client(url: &str, password: &str) -> RpcClient {
        let config = RpcConfig {
            timeout: Duration::from_millis(200),
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
            ..RpcConfig::new(url, "user", password)
        };
        RpcClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_request_envelope_and_typed_helpers() {
        let (url, node) = spawn_node(Mode::Healthy).await;
        let rpc = client(&url, "pass");

        assert_eq!(rpc.get_block_count().await.unwrap(), 2_750_000);

        let hash = rpc.get_block_hash(2_750_000).await.unwrap();
        assert_eq!(hash, "hash-2750000");

        let block = rpc.get_block(&hash).await.unwrap();
        assert_eq!(block.hash, "hash-2750000");
        assert_eq!(block.previous_block_hash.as_deref(), Some("hash-2749999"));
        assert_eq!(block.tx.len(), 1);

        let last = node.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(last["jsonrpc"], json!("1.0"));
        assert_eq!(last["id"], json!("indexer"));
        assert_eq!(last["method"], json!("getblock"));
        assert_eq!(last["params"], json!(["hash-2750000", 2]));
        assert_eq!(node.hits(), 3);
    }

    #[tokio::test]
    async fn test_node_error_is_not_retried() {
        let (url, node) = spawn_node(Mode::NodeError).await;
        let rpc = client(&url, "pass");

        let err = rpc.get_block_hash(99_999_999).await.unwrap_err();
        match err {
            RpcError::Node { code, ref message, .. } => {
                assert_eq!(code, -8);
                assert_eq!(message, "Block height out of range");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(node.hits(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_retry_until_budget_is_spent() {
        let (url, node) = spawn_node(Mode::Slow).await;
        let rpc = client(&url, "pass");

        let err = rpc.get_block_count().await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(
            err,
            RpcError::Transport {
                kind: TransportKind::TimedOut,
                ..
            }
        ));
        assert_eq!(node.hits(), 3, "first attempt plus two retries");
    }

    #[tokio::test]
    async fn test_http_error_without_envelope() {
        let (url, node) = spawn_node(Mode::NotJson).await;
        let rpc = client(&url, "pass");

        let err = rpc.get_block_count().await.unwrap_err();
        assert!(matches!(err, RpcError::Http { status: 502, .. }));
        assert_eq!(node.hits(), 1);
    }

    #[tokio::test]
    async fn test_bad_credentials_surface_as_http_error() {
        let (url, _node) = spawn_node(Mode::Healthy).await;
        let rpc = client(&url, "wrong");

        let err = rpc.get_block_count().await.unwrap_err();
        assert!(matches!(err, RpcError::Http { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_unexpected_result_shape_is_a_decode_error() {
        let (url, _node) = spawn_node(Mode::Healthy).await;
        let rpc = client(&url, "pass");

        let err = rpc.call::<u64>("getblockhash", &[json!(1)]).await.unwrap_err();
        assert!(matches!(err, RpcError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_hangup_before_response_is_retried() {
        let (url, hits) = spawn_hangup_node(Hangup::Close).await;
        let rpc = client(&url, "pass");

        let err = rpc.get_block_count().await.unwrap_err();

        assert!(matches!(
            err,
            RpcError::Transport {
                kind: TransportKind::Aborted,
                ..
            }
        ));
        assert!(err.is_transient());
        assert_eq!(hits.load(Ordering::SeqCst), 3, "first attempt plus two retries");
    }

    #[tokio::test]
    async fn test_connection_reset_is_retried() {
        let (url, hits) = spawn_hangup_node(Hangup::Reset).await;
        let rpc = client(&url, "pass");

        let err = rpc.get_block_count().await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(err, RpcError::Transport { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3, "first attempt plus two retries");
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_retried() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let rpc = client(&url, "pass");
        let err = rpc.get_block_count().await.unwrap_err();

        assert!(matches!(err, RpcError::Transport { .. }));
        assert!(!err.is_transient());
    }
}
