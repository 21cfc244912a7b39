//! 테스트용 MCP HTTP 서버
//!
//! `TcpListener` 위에서 HTTP/1.1 요청을 직접 읽고 응답을 씁니다.
//! 요청마다 연결을 닫으므로 keep-alive 처리가 필요 없습니다.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// 받은 요청
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn rpc_method(&self) -> Option<&str> {
        self.body.as_ref()?.get("method")?.as_str()
    }

    pub fn rpc_id(&self) -> Option<u64> {
        self.body.as_ref()?.get("id")?.as_u64()
    }
}

/// 응답 종류
pub enum Reply {
    /// application/json 본문
    Json(Value),
    /// application/json + 추가 헤더
    JsonWithHeaders(Value, Vec<(&'static str, String)>),
    /// text/event-stream, 이벤트를 모두 보낸 뒤 연결 종료
    Sse(Vec<Value>),
    /// 이벤트를 보낸 뒤 응답 없이 대기
    SseThenHang(Vec<Value>),
    /// 상태 코드만
    Status(u16),
}

pub type Handler = Arc<dyn Fn(&Request) -> Reply + Send + Sync>;

/// 실행 중인 mock 서버
pub struct MockServer {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Request>>>,
}

impl MockServer {
    pub async fn start(handler: Handler) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/mcp", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let handler = handler.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    serve(stream, handler, seen).await;
                });
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// 특정 JSON-RPC 메서드 요청만
    pub fn calls(&self, rpc_method: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.rpc_method() == Some(rpc_method))
            .collect()
    }
}

async fn serve(stream: TcpStream, handler: Handler, seen: Arc<Mutex<Vec<Request>>>) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
        return;
    }
    let method = request_line.split_whitespace().next().unwrap_or("").to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    if length > 0 && reader.read_exact(&mut body).await.is_err() {
        return;
    }

    let request = Request {
        method,
        headers,
        body: serde_json::from_slice(&body).ok(),
    };
    seen.lock().unwrap().push(request.clone());

    // 알림과 DELETE는 내용 없이 수락
    let reply = if request.method != "POST" || request.rpc_id().is_none() {
        Reply::Status(202)
    } else {
        handler(&request)
    };

    let mut stream = reader.into_inner();
    match reply {
        Reply::Json(value) => write_json(&mut stream, &value, &[]).await,
        Reply::JsonWithHeaders(value, extra) => write_json(&mut stream, &value, &extra).await,
        Reply::Sse(events) => write_sse(&mut stream, &events).await,
        Reply::SseThenHang(events) => {
            write_sse(&mut stream, &events).await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Reply::Status(code) => {
            let head = format!(
                "HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                code
            );
            let _ = stream.write_all(head.as_bytes()).await;
        }
    }
    let _ = stream.shutdown().await;
}

async fn write_json(stream: &mut TcpStream, value: &Value, extra: &[(&'static str, String)]) {
    let body = value.to_string();
    let mut head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (key, val) in extra {
        head.push_str(&format!("{}: {}\r\n", key, val));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes()).await;
    let _ = stream.write_all(body.as_bytes()).await;
}

async fn write_sse(stream: &mut TcpStream, events: &[Value]) {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n";
    let _ = stream.write_all(head.as_bytes()).await;
    for event in events {
        let _ = stream
            .write_all(format!("data: {}\n\n", event).as_bytes())
            .await;
        let _ = stream.flush().await;
    }
}

// ============================================================================
// JSON-RPC 헬퍼
// ============================================================================

pub fn result(id: Option<u64>, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": { "name": "mock", "version": "0.1.0" },
        "capabilities": { "tools": {} }
    })
}

pub fn tools_result(names: &[&str]) -> Value {
    let tools: Vec<Value> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "description": format!("{} tool", name),
                "inputSchema": { "type": "object" },
                "annotations": { "readOnlyHint": true }
            })
        })
        .collect();
    json!({ "tools": tools })
}

pub fn text_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [ { "type": "text", "text": text } ],
        "isError": is_error
    })
}

pub fn progress(token: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "notifications/progress",
        "params": { "progressToken": token, "progress": 1 }
    })
}
