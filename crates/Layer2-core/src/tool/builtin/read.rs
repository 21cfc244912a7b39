//! Read Tool - 파일 읽기 도구
//!
//! 파일 내용을 읽어서 반환합니다.
//! - 줄 번호 포함 (cat -n 스타일)
//! - offset/limit 지원 (대용량 파일 처리)
//! - 바이너리 파일 감지
//!
//! 읽기 전용이므로 서브에이전트에서도 사용 가능합니다.

use crate::tool::context::resolve_path;
use anvil_foundation::{
    Capabilities, Error, Result, Tool, ToolContext, ToolExecutionResult, ToolMeta,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

/// Read 도구 입력
#[derive(Debug, Deserialize)]
pub struct ReadInput {
    /// 파일 경로 (상대 경로는 작업 디렉토리 기준)
    pub file_path: String,

    /// 시작 줄 번호 (1-based, optional)
    #[serde(default)]
    pub offset: Option<usize>,

    /// 최대 읽을 줄 수 (optional, 기본: 2000)
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Read 도구
#[derive(Debug, Default)]
pub struct ReadTool;

impl ReadTool {
    /// 도구 이름
    pub const NAME: &'static str = "read";

    /// 기본 줄 제한
    const DEFAULT_LIMIT: usize = 2000;

    /// 최대 줄 길이 (이 이상은 잘림)
    const MAX_LINE_LENGTH: usize = 2000;

    pub fn new() -> Self {
        Self
    }

    /// 바이너리 파일인지 확인 (확장자 기준)
    fn is_binary_file(path: &Path) -> bool {
        const BINARY: &[&str] = &[
            "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "tar", "gz", "7z",
            "exe", "dll", "so", "dylib", "mp3", "mp4", "mov", "woff", "woff2", "ttf",
        ];

        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| BINARY.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// 줄 번호 포맷: "   123→내용"
    fn number_lines(content: &str, offset: usize, limit: usize) -> String {
        let start = offset.max(1);
        let mut output = String::new();

        for (idx, line) in content.lines().enumerate().skip(start - 1).take(limit) {
            let line = match line.char_indices().nth(Self::MAX_LINE_LENGTH) {
                Some((cut, _)) => format!("{}... [truncated]", &line[..cut]),
                None => line.to_string(),
            };
            output.push_str(&format!("{:>6}→{}\n", idx + 1, line));
        }

        output
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .display_name("Read File")
            .description("Read file contents with line numbers")
            .category("filesystem")
            .capabilities(Capabilities::read_only())
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
                    "description": "Path to the file to read (relative paths resolve against the working directory)"
                },
                "offset": {
                    "type": "integer",
                    "description": "Start line number (1-based). Only provide if the file is too large to read at once."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum lines to read (default: 2000)."
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, input: Value, context: &dyn ToolContext) -> Result<ToolExecutionResult> {
        let parsed: ReadInput = serde_json::from_value(input)
            .map_err(|e| Error::InvalidInput(format!("Invalid input: {}", e)))?;
        let path = resolve_path(context.working_dir(), &parsed.file_path);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(_) => {
                return Ok(ToolExecutionResult::error(format!(
                    "File not found: {}",
                    path.display()
                )))
            }
        };
        if metadata.is_dir() {
            return Ok(ToolExecutionResult::error(format!(
                "Cannot read directory: {}. Use glob to list directory contents.",
                path.display()
            )));
        }

        if Self::is_binary_file(&path) {
            return Ok(ToolExecutionResult::success(format!(
                "[Binary file: {} ({} bytes)]",
                path.display(),
                metadata.len()
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        let content = String::from_utf8_lossy(&bytes);
        let offset = parsed.offset.unwrap_or(1);
        let limit = parsed.limit.unwrap_or(Self::DEFAULT_LIMIT);
        let numbered = Self::number_lines(&content, offset, limit);

        let total_lines = content.lines().count();
        let output = if numbered.is_empty() {
            "[Empty file]".to_string()
        } else {
            numbered
        };
        Ok(ToolExecutionResult::success(output).with_metadata("total_lines", json!(total_lines)))
    }
}

// ============================================================================
// 테스트
// ============================================================================
