//! MCP 서버 설정
//!
//! Claude Code 호환 형식 (+ http / streamable-http 확장):
//! ```json
//! {
//!   "mcpServers": {
//!     "filesystem": {
//!       "command": "npx",
//!       "args": ["-y", "@modelcontextprotocol/server-filesystem", "/path"],
//!       "env": { "KEY": "${HOME}" }
//!     },
//!     "github": {
//!       "type": "streamable-http",
//!       "url": "https://api.example.com/mcp",
//!       "bearerTokenEnvVar": "GITHUB_TOKEN",
//!       "disabledTools": ["delete_*"]
//!     }
//!   }
//! }
//! ```

use crate::core::TransportKind;
use crate::permission::{any_matches, ToolPattern};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 개별 MCP 서버 설정
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    /// 전송 타입 (기본: stdio)
    #[serde(rename = "type", default)]
    pub transport: TransportKind,

    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,

    // === stdio 전용 ===
    /// 실행 명령어
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// 명령어 인자
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// 작업 디렉토리
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// 환경 변수 (${VAR}, ${VAR:-default} 지원)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    // === http / streamable-http 전용 ===
    /// 서버 URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// 고정 헤더 (값에 ${VAR} 사용 가능)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Bearer 토큰을 읽을 환경 변수 이름
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token_env_var: Option<String>,

    // === 공통 ===
    /// 시작 타임아웃 (초, 기본은 limits 값)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_timeout_secs: Option<u64>,

    /// 도구 실행 타임아웃 (초, 기본은 limits 값)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// 서버가 동시 요청 처리를 지원하는지 (기본: 직렬)
    #[serde(default)]
    pub multiplexing: bool,

    /// 허용할 도구 (비어 있으면 전부, 원래 도구 이름 기준)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_tools: Vec<ToolPattern>,

    /// 제외할 도구
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled_tools: Vec<ToolPattern>,
}

impl McpServerConfig {
    fn empty(transport: TransportKind) -> Self {
        Self {
            transport,
            enabled: true,
            command: None,
            args: vec![],
            cwd: None,
            env: HashMap::new(),
            url: None,
            headers: HashMap::new(),
            bearer_token_env_var: None,
            startup_timeout_secs: None,
            tool_timeout_secs: None,
            multiplexing: false,
            enabled_tools: vec![],
            disabled_tools: vec![],
        }
    }

    /// stdio 타입 서버 생성
    pub fn stdio(command: impl Into<String>) -> Self {
        let mut config = Self::empty(TransportKind::Stdio);
        config.command = Some(command.into());
        config
    }

    /// http 타입 서버 생성
    pub fn http(url: impl Into<String>) -> Self {
        let mut config = Self::empty(TransportKind::Http);
        config.url = Some(url.into());
        config
    }

    /// streamable-http 타입 서버 생성
    pub fn streamable_http(url: impl Into<String>) -> Self {
        let mut config = Self::empty(TransportKind::StreamableHttp);
        config.url = Some(url.into());
        config
    }

    /// 유효성 검증
    pub fn validate(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::Config(format!("invalid MCP server name '{}'", name)));
        }
        match self.transport {
            TransportKind::Stdio => {
                if self.command.as_deref().map_or(true, str::is_empty) {
                    return Err(Error::Config(format!(
                        "{}: stdio server requires 'command'",
                        name
                    )));
                }
            }
            TransportKind::Http | TransportKind::StreamableHttp => {
                let url = self.url.as_deref().unwrap_or_default();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(Error::Config(format!(
                        "{}: {} server requires an http(s) 'url'",
                        name, self.transport
                    )));
                }
            }
        }
        Ok(())
    }

    /// 환경변수 확장된 env
    pub fn expand_env(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_var(v)))
            .collect()
    }

    /// 요청에 붙일 헤더 (토큰 포함)
    pub fn resolved_headers(&self) -> Result<HashMap<String, String>> {
        let mut headers: HashMap<String, String> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_var(v)))
            .collect();

        if let Some(var) = &self.bearer_token_env_var {
            let token = std::env::var(var).map_err(|_| {
                Error::Config(format!("bearer token variable '{}' is not set", var))
            })?;
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }

        Ok(headers)
    }

    pub fn startup_timeout(&self, default: Duration) -> Duration {
        self.startup_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    pub fn tool_timeout(&self, default: Duration) -> Duration {
        self.tool_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    /// 원격 도구를 레지스트리에 노출할지
    pub fn exposes_tool(&self, remote_name: &str) -> bool {
        let enabled =
            self.enabled_tools.is_empty() || any_matches(&self.enabled_tools, remote_name);
        enabled && !any_matches(&self.disabled_tools, remote_name)
    }

    // === Builder methods ===

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn startup_timeout_secs(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = Some(secs);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = Some(secs);
        self
    }

    pub fn multiplexing(mut self, enabled: bool) -> Self {
        self.multiplexing = enabled;
        self
    }

    pub fn disable_tool(mut self, pattern: ToolPattern) -> Self {
        self.disabled_tools.push(pattern);
        self
    }

    pub fn enable_tool(mut self, pattern: ToolPattern) -> Self {
        self.enabled_tools.push(pattern);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// 환경변수 확장
/// - ${VAR}: 환경변수 값
/// - ${VAR:-default}: 환경변수가 없으면 기본값
pub fn expand_env_var(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after[..end];
        let (name, default) = match expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (expr, None),
        };
        match std::env::var(name) {
            Ok(v) => out.push_str(&v),
            Err(_) => out.push_str(default.unwrap_or_default()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn default_true() -> bool {
    true
}
