//! MCP Types - MCP 관련 타입 정의

use anvil_foundation::{Capabilities, ToolDescriptor, TransportKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MCP 프로토콜 버전
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP 서버에서 제공하는 도구 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    /// 도구 이름
    pub name: String,

    /// 도구 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 입력 스키마 (JSON Schema)
    #[serde(default = "empty_schema")]
    pub input_schema: Value,

    /// 동작 힌트
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<McpToolAnnotations>,
}

/// 도구 동작 힌트 (서버가 보고하는 값, 신뢰 근거는 아님)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

impl McpTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: empty_schema(),
            annotations: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.annotations = Some(McpToolAnnotations {
            read_only_hint: Some(true),
            ..McpToolAnnotations::default()
        });
        self
    }

    /// readOnlyHint가 명시된 경우만 읽기 전용으로 취급
    pub fn is_read_only(&self) -> bool {
        self.annotations
            .as_ref()
            .and_then(|a| a.read_only_hint)
            .unwrap_or(false)
    }

    /// 능력 플래그 (힌트가 없으면 쓰기 가능으로 간주)
    pub fn capabilities(&self) -> Capabilities {
        if self.is_read_only() {
            Capabilities::read_only()
        } else {
            Capabilities::filesystem_write()
        }
    }

    /// 레지스트리 descriptor (`{server}_{tool}`)
    pub fn descriptor(&self, server: &str, transport: TransportKind) -> ToolDescriptor {
        ToolDescriptor::remote(
            server,
            &self.name,
            transport,
            self.description.clone().unwrap_or_default(),
            self.input_schema.clone(),
        )
        .with_capabilities(self.capabilities())
    }
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// MCP 도구 호출
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolCall {
    /// 도구 이름 (서버 기준 원래 이름)
    pub name: String,

    /// 인자
    #[serde(default)]
    pub arguments: Value,
}

impl McpToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// MCP 도구 실행 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolResult {
    /// 도구가 실패를 보고했는지
    #[serde(default)]
    pub is_error: bool,

    /// 결과 콘텐츠
    #[serde(default)]
    pub content: Vec<McpContent>,
}

/// MCP 콘텐츠
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// 텍스트 콘텐츠
    Text { text: String },

    /// 이미지 콘텐츠
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    /// 리소스 참조
    Resource { resource: Value },
}

impl McpToolResult {
    /// 성공 결과 생성
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![McpContent::Text { text: text.into() }],
        }
    }

    /// 오류 결과 생성
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![McpContent::Text { text: text.into() }],
        }
    }

    /// 첫 텍스트 콘텐츠
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            McpContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// 모델에게 넘길 출력 (텍스트는 이어 붙이고 나머지는 요약)
    pub fn render(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                McpContent::Text { text } => text.clone(),
                McpContent::Image { mime_type, data } => {
                    format!("[image {} ({} bytes base64)]", mime_type, data.len())
                }
                McpContent::Resource { resource } => resource
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| resource.to_string()),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
