//! JSON-RPC node client.
//!
//! The wallet engine is synchronous, so the client owns a current-thread
//! tokio runtime and blocks on each request. Every call is bounded by the
//! configured request timeout.

use std::time::Duration;

use jsonrpsee::core::client::{ClientT, Error as RpcError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;
use tracing::debug;

use beryl_core::error::NodeError;
use beryl_core::traits::{NodeClient, OutputInfo, OutputRange, PostOutcome};
use beryl_core::types::{Commitment, PublicKey, Transaction};

/// `NodeClient` over the node's HTTP JSON-RPC API.
pub struct RpcNodeClient {
    url: String,
    client: HttpClient,
    runtime: Runtime,
}

impl RpcNodeClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NodeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NodeError::Unreachable(format!("runtime: {e}")))?;
        let client = {
            let _guard = runtime.enter();
            HttpClientBuilder::default()
                .request_timeout(timeout)
                .build(url)
                .map_err(|e| NodeError::Unreachable(format!("{url}: {e}")))?
        };
        Ok(Self { url: url.to_string(), client, runtime })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: ArrayParams) -> Result<T, NodeError> {
        debug!(url = %self.url, method, "node request");
        self.runtime
            .block_on(self.client.request(method, params))
            .map_err(map_rpc_error)
    }
}

fn map_rpc_error(e: RpcError) -> NodeError {
    match e {
        RpcError::RequestTimeout => NodeError::Timeout,
        RpcError::Transport(e) => NodeError::Unreachable(e.to_string()),
        other => NodeError::Protocol(other.to_string()),
    }
}

fn params<I>(values: I) -> Result<ArrayParams, NodeError>
where
    I: IntoIterator<Item = serde_json::Value>,
{
    let mut params = ArrayParams::new();
    for value in values {
        params.insert(value).map_err(|e| NodeError::Protocol(e.to_string()))?;
    }
    Ok(params)
}

fn json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, NodeError> {
    serde_json::to_value(value).map_err(|e| NodeError::Protocol(e.to_string()))
}

impl NodeClient for RpcNodeClient {
    fn get_height(&self) -> Result<u64, NodeError> {
        self.call("get_tip_height", ArrayParams::new())
    }

    fn get_outputs(&self, commitments: &[Commitment]) -> Result<Vec<OutputInfo>, NodeError> {
        if commitments.is_empty() {
            return Ok(Vec::new());
        }
        self.call("get_outputs", params([json(&commitments)?])?)
    }

    fn post_transaction(&self, tx: &Transaction) -> Result<PostOutcome, NodeError> {
        let bytes = bincode::encode_to_vec(tx, bincode::config::standard())
            .map_err(|e| NodeError::Protocol(format!("encode transaction: {e}")))?;
        self.call("push_transaction", params([serde_json::Value::String(hex::encode(bytes))])?)
    }

    fn get_outputs_in_range(
        &self,
        start_index: u64,
        end_index: Option<u64>,
        max: u64,
    ) -> Result<OutputRange, NodeError> {
        self.call(
            "get_unspent_outputs",
            params([start_index.into(), json(&end_index)?, max.into()])?,
        )
    }

    fn get_pmmr_range(
        &self,
        start_height: u64,
        end_height: Option<u64>,
    ) -> Result<(u64, u64), NodeError> {
        self.call("get_pmmr_indices", params([start_height.into(), json(&end_height)?])?)
    }

    fn get_kernel(&self, excess: &PublicKey) -> Result<Option<u64>, NodeError> {
        self.call("get_kernel_height", params([json(excess)?])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_timeout() {
        assert_eq!(map_rpc_error(RpcError::RequestTimeout), NodeError::Timeout);
    }

    #[test]
    fn other_errors_are_protocol() {
        let err = map_rpc_error(RpcError::Custom("bad payload".into()));
        assert!(matches!(err, NodeError::Protocol(_)));
    }

    #[test]
    fn unreachable_node_reports_unreachable() {
        // Nothing listens on port 1.
        let client = RpcNodeClient::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let err = client.get_height().unwrap_err();
        assert!(err.is_unreachable(), "{err:?}");
    }

    #[test]
    fn empty_lookup_skips_request() {
        let client = RpcNodeClient::new("http://127.0.0.1:1", Duration::from_millis(100)).unwrap();
        assert!(client.get_outputs(&[]).unwrap().is_empty());
    }
}
