//! Write Tool - 파일 쓰기 도구
//!
//! 파일 내용을 쓰거나 덮어씁니다.
//! - 새 파일 생성
//! - 기존 파일 덮어쓰기
//! - 부모 디렉토리 자동 생성
//!
//! 파일시스템을 변경하므로 신뢰되지 않은 디렉토리에서는 항상 승인이
//! 필요하고, 서브에이전트 레지스트리에는 포함되지 않습니다.

use crate::tool::context::resolve_path;
use anvil_foundation::{
    Capabilities, Error, Result, Tool, ToolContext, ToolExecutionResult, ToolMeta,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Write 도구 입력
#[derive(Debug, Deserialize)]
pub struct WriteInput {
    /// 파일 경로 (상대 경로는 작업 디렉토리 기준)
    pub file_path: String,

    /// 작성할 내용
    pub content: String,

    /// 부모 디렉토리 자동 생성 여부 (기본: true)
    #[serde(default = "default_create_dirs")]
    pub create_directories: bool,
}

fn default_create_dirs() -> bool {
    true
}

/// Write 도구
#[derive(Debug, Default)]
pub struct WriteTool;

impl WriteTool {
    /// 도구 이름
    pub const NAME: &'static str = "write";

    pub fn new() -> Self {
        Self
    }

    /// 자격 증명류 경로
    fn is_sensitive_path(path: &str) -> bool {
        const SENSITIVE: &[&str] = &[".env", ".ssh", "credentials", ".pem", ".key", "_rsa", ".aws"];
        let lower = path.to_lowercase();
        SENSITIVE.iter().any(|p| lower.contains(p))
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .display_name("Write File")
            .description("Write content to a file (creates or overwrites)")
            .category("filesystem")
            .capabilities(Capabilities::filesystem_write())
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                },
                "create_directories": {
                    "type": "boolean",
                    "description": "Create parent directories if they don't exist (default: true)",
                    "default": true
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, input: Value, context: &dyn ToolContext) -> Result<ToolExecutionResult> {
        let parsed: WriteInput = serde_json::from_value(input)
            .map_err(|e| Error::InvalidInput(format!("Invalid input: {}", e)))?;

        if Self::is_sensitive_path(&parsed.file_path) {
            return Ok(ToolExecutionResult::error(format!(
                "Refusing to write credential-like path: {}",
                parsed.file_path
            )));
        }

        let path = resolve_path(context.working_dir(), &parsed.file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                if !parsed.create_directories {
                    return Ok(ToolExecutionResult::error(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let existed = path.exists();
        tokio::fs::write(&path, parsed.content.as_bytes()).await?;

        let verb = if existed { "Overwrote" } else { "Created" };
        Ok(ToolExecutionResult::success(format!(
            "{} {} ({} bytes)",
            verb,
            path.display(),
            parsed.content.len()
        ))
        .with_metadata("bytes", json!(parsed.content.len()))
        .with_metadata("created", json!(!existed)))
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::RuntimeContext;

    #[test]
    fn test_capabilities() {
        let meta = WriteTool::new().meta();
        assert!(meta.capabilities.writes_filesystem);
        assert!(meta.capabilities.is_trust_guarded());
        assert!(!meta.capabilities.allowed_in_subagent());
    }

    #[test]
    fn test_sensitive_path() {
        assert!(WriteTool::is_sensitive_path("/home/u/.ssh/config"));
        assert!(WriteTool::is_sensitive_path("app/.env"));
        assert!(!WriteTool::is_sensitive_path("src/lib.rs"));
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path());

        let result = WriteTool::new()
            .execute(json!({ "file_path": "a/b/out.txt", "content": "hi" }), &ctx)
            .await
            .unwrap();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a/b/out.txt")).unwrap(),
            "hi"
        );
        assert_eq!(result.metadata["created"], json!(true));
    }

    #[tokio::test]
    async fn test_write_without_create_directories() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path());

        let result = WriteTool::new()
            .execute(
                json!({ "file_path": "missing/out.txt", "content": "x", "create_directories": false }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert!(!dir.path().join("missing").exists());
    }
}
