//! Exposes an [`Allocator`] over a local TCP socket so every build
//! coordinator process shares one set of per-user counts, and a matching
//! client that implements [`Allocator`] by talking to that socket.
//!
//! Wire format: newline-delimited JSON, one request/response pair per line.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{error, warn};
use zeusci_core::{Allocator, Error, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum RpcRequest {
    RequestContainer { username: String },
    ReturnContainer { username: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct RpcResponse {
    granted: bool,
}

/// Run the allocator RPC server until the listener errors or the process
/// is killed. Each connection is handled on its own task.
pub async fn serve(addr: SocketAddr, allocator: Arc<dyn Allocator>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("allocator rpc: failed to bind {addr}: {e}")))?;

    loop {
        let (socket, peer) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("allocator rpc: accept failed: {e}")))?;
        let allocator = allocator.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, allocator).await {
                warn!(%peer, error = %e, "allocator rpc connection ended with error");
            }
        });
    }
}

async fn handle_connection(socket: TcpStream, allocator: Arc<dyn Allocator>) -> Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new());
    while let Some(line) = framed.next().await {
        let line = line.map_err(|e| Error::Internal(format!("allocator rpc: {e}")))?;
        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                error!(error = %e, "allocator rpc: malformed request");
                continue;
            }
        };
        let response = match request {
            RpcRequest::RequestContainer { username } => RpcResponse {
                granted: allocator.request_container(&username).await?,
            },
            RpcRequest::ReturnContainer { username } => {
                allocator.return_container(&username).await;
                RpcResponse { granted: true }
            }
        };
        let payload = serde_json::to_string(&response)
            .map_err(|e| Error::Internal(format!("allocator rpc: encode response: {e}")))?;
        framed
            .send(payload)
            .await
            .map_err(|e| Error::Internal(format!("allocator rpc: write response: {e}")))?;
    }
    Ok(())
}

/// Client-side [`Allocator`] backed by the RPC server. Opens a fresh
/// connection per call; simple over efficient, since a container's
/// request/release rate is far below what connection setup would bottleneck.
pub struct RpcAllocatorClient {
    addr: SocketAddr,
}

impl RpcAllocatorClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    async fn call(&self, request: RpcRequest) -> Result<RpcResponse> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|e| Error::Internal(format!("allocator rpc: connect {}: {e}", self.addr)))?;
        let mut framed = Framed::new(stream, LinesCodec::new());
        let payload = serde_json::to_string(&request)
            .map_err(|e| Error::Internal(format!("allocator rpc: encode request: {e}")))?;
        framed
            .send(payload)
            .await
            .map_err(|e| Error::Internal(format!("allocator rpc: write request: {e}")))?;
        let line = framed
            .next()
            .await
            .ok_or_else(|| Error::Internal("allocator rpc: connection closed before reply".to_string()))?
            .map_err(|e| Error::Internal(format!("allocator rpc: {e}")))?;
        serde_json::from_str(&line)
            .map_err(|e| Error::Internal(format!("allocator rpc: decode response: {e}")))
    }
}

#[async_trait]
impl Allocator for RpcAllocatorClient {
    async fn request_container(&self, username: &str) -> Result<bool> {
        let response = self
            .call(RpcRequest::RequestContainer {
                username: username.to_string(),
            })
            .await?;
        Ok(response.granted)
    }

    async fn return_container(&self, username: &str) {
        let _ = self
            .call(RpcRequest::ReturnContainer {
                username: username.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inprocess::{InProcessAllocator, UserLimitSource};
    use std::time::Duration;

    struct FixedLimit(i32);

    #[async_trait]
    impl UserLimitSource for FixedLimit {
        async fn container_limit(&self, _username: &str) -> Result<i32> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn client_round_trips_through_server() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = TcpListener::bind(addr).await.unwrap();
        let bound_addr = listener.local_addr().unwrap();
        drop(listener);

        let allocator: Arc<dyn Allocator> = Arc::new(InProcessAllocator::new(Arc::new(FixedLimit(1))));
        tokio::spawn(serve(bound_addr, allocator));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = RpcAllocatorClient::new(bound_addr);
        assert!(client.request_container("alice").await.unwrap());
        assert!(!client.request_container("alice").await.unwrap());
        client.return_container("alice").await;
        assert!(client.request_container("alice").await.unwrap());
    }
}
