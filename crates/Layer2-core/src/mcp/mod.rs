//! MCP - Model Context Protocol 연동
//!
//! 외부 MCP 서버를 통해 도구를 확장합니다.
//!
//! ## 기능
//! - MCP 서버 연결 관리 (`McpManager`)
//! - 도구 목록 동기화 (`{server}_{tool}` 이름으로 등록)
//! - 도구 호출 프록시 (`McpClient::call_tool`)
//!
//! ## 지원 전송
//! - stdio (로컬 프로세스, 줄 단위 JSON-RPC)
//! - http (호출마다 POST)
//! - streamable-http (POST + SSE 응답 스트림)
//!
//! ## 참고
//! - https://modelcontextprotocol.io/

mod client;
mod manager;
pub mod transport;
mod types;

pub use client::{McpClient, ServerInfo, SessionState};
pub use manager::{McpManager, ServerStatus};
pub use transport::{open_transport, McpTransport};
pub use types::{
    McpContent, McpTool, McpToolAnnotations, McpToolCall, McpToolResult, MCP_PROTOCOL_VERSION,
};
