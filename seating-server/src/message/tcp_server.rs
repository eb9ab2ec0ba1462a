//! TCP 服务器实现
//!
//! 负责处理客户端连接，包括：
//! - 监听连接
//! - 协议握手验证
//! - 逐条读取请求、分发到 [`RequestRouter`](super::RequestRouter) 并写回应答
//!
//! 同一连接上的请求按到达顺序处理；不同连接之间完全并发。

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use shared::error::ErrorCode;
use shared::message::{
    BusMessage, EventType, HandshakePayload, PROTOCOL_VERSION, RequestCommandPayload, ResponsePayload,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::router::{HandlerContext, Session};
use super::transport::{TcpTransport, Transport};
use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// 发送握手错误后关闭连接前的等待 (让客户端读到应答)
const HANDSHAKE_ERROR_DELAY_MS: u64 = 100;

/// 已连接客户端
pub type ClientRegistry = Arc<DashMap<String, Arc<dyn Transport>>>;

/// 请求监听服务
#[derive(Clone)]
pub struct MessageServer {
    state: ServerState,
    clients: ClientRegistry,
    shutdown: CancellationToken,
}

impl MessageServer {
    pub fn new(state: ServerState, shutdown: CancellationToken) -> Self {
        Self {
            state,
            clients: Arc::new(DashMap::new()),
            shutdown,
        }
    }

    /// 绑定监听地址
    pub async fn bind(addr: &str) -> AppResult<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!("Request listener bound on {}", local);
        }
        Ok(listener)
    }

    /// 当前连接数
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Main accept loop，取消令牌触发后返回
    pub async fn serve(self, listener: TcpListener) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(clients = self.client_count(), "Request listener shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Client connected: {}", addr);
                            self.spawn_client_handler(stream, addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }

        let open: Vec<Arc<dyn Transport>> = self.clients.iter().map(|entry| entry.value().clone()).collect();
        self.clients.clear();
        for transport in open {
            let _ = transport.close().await;
        }
    }

    fn spawn_client_handler(&self, stream: TcpStream, addr: SocketAddr) {
        let server = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server.handle_client_connection(stream, addr).await {
                tracing::debug!("Client {} handler finished: {}", addr, e);
            }
        });
    }

    /// Handle a single client connection
    async fn handle_client_connection(&self, stream: TcpStream, addr: SocketAddr) -> AppResult<()> {
        let transport: Arc<dyn Transport> = Arc::new(TcpTransport::from_stream(stream));

        let client_id = perform_handshake(&transport, addr).await?;
        self.clients.insert(client_id.clone(), transport.clone());
        tracing::debug!(client_id = %client_id, "Client registered");

        let session = Arc::new(Session::new(Some(addr.to_string())));
        self.read_client_requests(&transport, &session, &client_id, addr).await;

        let _ = transport.close().await;
        self.clients.remove(&client_id);
        tracing::debug!(client_id = %client_id, "Client removed from registry");
        Ok(())
    }

    /// 请求循环
    async fn read_client_requests(
        &self,
        transport: &Arc<dyn Transport>,
        session: &Arc<Session>,
        client_id: &str,
        addr: SocketAddr,
    ) {
        loop {
            let msg = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                read_result = transport.read_message() => match read_result {
                    Ok(msg) => msg,
                    Err(AppError::ClientDisconnected) => {
                        tracing::debug!(client_id = %client_id, "Client {} disconnected", addr);
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(client_id = %client_id, "Client {} read error: {}", addr, e);
                        break;
                    }
                },
            };

            let reply = self.handle_message(&msg, session, client_id).await;
            let response = BusMessage::response(&reply).with_correlation_id(msg.request_id);
            if let Err(e) = transport.write_message(&response).await {
                tracing::debug!(client_id = %client_id, "Client write failed: {}", e);
                break;
            }
        }
    }

    async fn handle_message(&self, msg: &BusMessage, session: &Arc<Session>, client_id: &str) -> ResponsePayload {
        if msg.event_type != EventType::RequestCommand {
            tracing::warn!(client_id = %client_id, event = %msg.event_type, "Unexpected event from client");
            return ResponsePayload::error(
                "protocol.invalid",
                ErrorCode::InvalidRequest,
                format!("Unexpected event type: {}", msg.event_type),
            );
        }

        let request: RequestCommandPayload = match msg.parse_payload() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(client_id = %client_id, error = %e, "Malformed request payload");
                return ResponsePayload::error(
                    "protocol.invalid",
                    ErrorCode::InvalidFormat,
                    format!("Malformed request: {}", e),
                );
            }
        };

        tracing::debug!(client_id = %client_id, identifier = %request.identifier, "Request received");
        let ctx = HandlerContext {
            state: self.state.clone(),
            session: session.clone(),
        };
        self.state.router.dispatch(ctx, request).await
    }
}

/// Perform protocol handshake with client
async fn perform_handshake(transport: &Arc<dyn Transport>, addr: SocketAddr) -> AppResult<String> {
    tracing::debug!("Waiting for handshake from {}", addr);

    let msg = transport.read_message().await.inspect_err(|e| {
        tracing::warn!("Client {} handshake error: {}", addr, e);
    })?;

    if msg.event_type != EventType::Handshake {
        tracing::warn!("Client {} failed to handshake: expected Handshake, got {}", addr, msg.event_type);
        send_handshake_error(transport, &msg, ErrorCode::InvalidRequest, "Expected Handshake message").await;
        return Err(AppError::invalid("Expected Handshake message"));
    }

    let payload: HandshakePayload = match msg.parse_payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Client {} sent invalid handshake payload: {}", addr, e);
            send_handshake_error(transport, &msg, ErrorCode::InvalidFormat, "Invalid handshake payload").await;
            return Err(AppError::invalid(format!("Invalid handshake payload: {}", e)));
        }
    };

    if payload.version != PROTOCOL_VERSION {
        tracing::warn!(
            "Client {} protocol version mismatch: expected {}, got {}",
            addr,
            PROTOCOL_VERSION,
            payload.version
        );
        send_handshake_error(
            transport,
            &msg,
            ErrorCode::InvalidRequest,
            &format!(
                "Protocol version mismatch: server={}, client={}. Please update your client.",
                PROTOCOL_VERSION, payload.version
            ),
        )
        .await;
        return Err(AppError::invalid("Protocol version mismatch"));
    }

    let client_id = payload.client_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::debug!(
        "Client {} handshake success (v{}, client: {:?}, id: {})",
        addr,
        payload.version,
        payload.client_name,
        client_id
    );

    let response = BusMessage::response(&ResponsePayload::success(
        "handshake.ok",
        Some(serde_json::json!({ "client_id": client_id })),
    ))
    .with_correlation_id(msg.request_id);
    transport.write_message(&response).await?;

    Ok(client_id)
}

async fn send_handshake_error(transport: &Arc<dyn Transport>, msg: &BusMessage, code: ErrorCode, message: &str) {
    let response =
        BusMessage::response(&ResponsePayload::error("handshake.rejected", code, message)).with_correlation_id(msg.request_id);

    if let Err(e) = transport.write_message(&response).await {
        tracing::error!("Failed to send handshake error: {}", e);
    }

    tokio::time::sleep(std::time::Duration::from_millis(HANDSHAKE_ERROR_DELAY_MS)).await;
}
