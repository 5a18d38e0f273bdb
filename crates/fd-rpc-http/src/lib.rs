use anyhow::{Context, Result};
use async_trait::async_trait;
use fd_types::TargetNetwork;
use fd_wallet::{EventHandler, Eip1193Transport, Subscription, WalletError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::Cell;
use std::time::Duration;
use tracing::{debug, warn};

pub const RPC_URL_VAR: &str = "FUNDER_RPC_URL";

/// JSON-RPC transport over HTTP, for driving the client against a node that
/// holds unlocked accounts (a local dev chain).
///
/// Reads `FUNDER_RPC_URL` from environment at construction time
/// (default: `http://localhost:8545`). Nodes never push events, so
/// subscriptions are inert.
pub struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
    next_id: Cell<u64>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpTransport {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var(RPC_URL_VAR).ok())
            .unwrap_or_else(|| "http://localhost:8545".to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: Cell::new(1),
        }
    }

    pub fn for_network(network: &TargetNetwork) -> Self {
        Self::new(Some(network.rpc_url.clone()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, method: &str, params: Value) -> Result<RpcResponse> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method: node_method(method),
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} transport"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("{method} HTTP {status}: {text}");
        }

        response
            .json()
            .await
            .with_context(|| format!("{method} response parse"))
    }
}

// ── JSON-RPC 2.0 envelope ────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// A node has no permission prompt; its account list is the grant.
fn node_method(method: &str) -> &str {
    match method {
        "eth_requestAccounts" => "eth_accounts",
        other => other,
    }
}

fn into_result(response: RpcResponse) -> Result<Value, WalletError> {
    match response.error {
        Some(err) => Err(WalletError::from_rpc(err.code, err.message)),
        None => Ok(response.result.unwrap_or(Value::Null)),
    }
}

#[async_trait(?Send)]
impl Eip1193Transport for HttpTransport {
    fn is_available(&self) -> bool {
        true
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WalletError> {
        debug!("{method} -> {}", self.endpoint);
        let response = self.call(method, params).await.map_err(|err| {
            warn!("json-rpc {method} failed: {err:#}");
            WalletError::Transport(format!("{err:#}"))
        })?;
        into_result(response)
    }

    fn subscribe(&self, _handler: EventHandler) -> Subscription {
        Subscription::detached()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
