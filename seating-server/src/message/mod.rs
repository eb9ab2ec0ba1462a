//! 请求 / 应答消息层
//!
//! ```text
//!   client ──frame──▶ TcpTransport ──▶ MessageServer ──▶ RequestRouter ──▶ api handler
//!          ◀─frame───               ◀── Response (correlation_id = request_id)
//! ```

pub mod router;
pub mod tcp_server;
pub mod transport;

pub use router::{HandlerContext, IDENTITY_KEY, Outcome, RequestRouter, Session, parse_params, split_identifier};
pub use tcp_server::MessageServer;
pub use transport::{TcpTransport, Transport};
