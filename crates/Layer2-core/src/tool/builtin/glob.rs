//! Glob Tool - 파일 패턴 검색 도구
//!
//! 글로브 패턴으로 파일을 검색합니다.
//! - 최근 수정 순 정렬
//! - 결과 제한
//! - 읽기 전용 (서브에이전트 허용)

use crate::tool::context::resolve_path;
use anvil_foundation::{
    Capabilities, Error, Result, Tool, ToolContext, ToolExecutionResult, ToolMeta,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Glob 도구 입력
#[derive(Debug, Deserialize)]
pub struct GlobInput {
    /// 글로브 패턴 (예: "**/*.rs", "src/**/*.ts")
    pub pattern: String,

    /// 검색 시작 디렉토리 (기본: 현재 작업 디렉토리)
    #[serde(default)]
    pub path: Option<String>,

    /// 최대 결과 수 (기본: 1000)
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Glob 도구
#[derive(Debug, Default)]
pub struct GlobTool;

impl GlobTool {
    /// 도구 이름
    pub const NAME: &'static str = "glob";

    /// 기본 결과 제한
    const DEFAULT_LIMIT: usize = 1000;

    pub fn new() -> Self {
        Self
    }

    /// 동기 검색 (spawn_blocking 안에서 실행)
    fn search(root: &Path, pattern: &str, limit: usize) -> Result<(Vec<PathBuf>, bool)> {
        let full = root.join(pattern);
        let full = full.to_string_lossy();
        let options = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        let paths = glob::glob_with(&full, options)
            .map_err(|e| Error::InvalidInput(format!("Invalid glob pattern: {}", e)))?;

        let mut found: Vec<(PathBuf, Option<SystemTime>)> = paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .map(|path| {
                let modified = path.metadata().ok().and_then(|m| m.modified().ok());
                (path, modified)
            })
            .collect();

        // 최근 수정 파일 먼저
        found.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let truncated = found.len() > limit;
        found.truncate(limit);

        Ok((found.into_iter().map(|(p, _)| p).collect(), truncated))
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .display_name("Glob")
            .description("Find files by glob pattern, most recently modified first")
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
                "pattern": {
                    "type": "string",
                    "description": "The glob pattern to match files against (e.g., \"**/*.js\", \"src/**/*.ts\")"
                },
                "path": {
                    "type": "string",
                    "description": "The directory to search in. Defaults to the working directory."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 1000)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, context: &dyn ToolContext) -> Result<ToolExecutionResult> {
        let parsed: GlobInput = serde_json::from_value(input)
            .map_err(|e| Error::InvalidInput(format!("Invalid input: {}", e)))?;

        let root = match &parsed.path {
            Some(p) => resolve_path(context.working_dir(), p),
            None => context.working_dir().to_path_buf(),
        };
        if !root.is_dir() {
            return Ok(ToolExecutionResult::error(format!(
                "Directory not found: {}",
                root.display()
            )));
        }

        let limit = parsed.limit.unwrap_or(Self::DEFAULT_LIMIT);
        let pattern = parsed.pattern.clone();
        let search_root = root.clone();
        let (paths, truncated) =
            tokio::task::spawn_blocking(move || Self::search(&search_root, &pattern, limit))
                .await
                .map_err(|e| Error::Internal(format!("glob task failed: {}", e)))??;

        if paths.is_empty() {
            return Ok(ToolExecutionResult::success(format!(
                "No files matched '{}'",
                parsed.pattern
            ))
            .with_metadata("count", json!(0)));
        }

        let mut output = paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        if truncated {
            output.push_str(&format!("\n[results truncated at {}]", limit));
        }

        Ok(ToolExecutionResult::success(output)
            .with_metadata("count", json!(paths.len()))
            .with_metadata("truncated", json!(truncated)))
    }
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::RuntimeContext;

    #[tokio::test]
    async fn test_glob_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        let ctx = RuntimeContext::new("t", dir.path());

        let result = GlobTool::new()
            .execute(json!({ "pattern": "**/*.rs" }), &ctx)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.metadata["count"], json!(2));
        assert!(!result.output.contains("README"));
    }

    #[tokio::test]
    async fn test_glob_limit() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{}.txt", i)), "").unwrap();
        }
        let ctx = RuntimeContext::new("t", dir.path());

        let result = GlobTool::new()
            .execute(json!({ "pattern": "*.txt", "limit": 2 }), &ctx)
            .await
            .unwrap();
        assert_eq!(result.metadata["count"], json!(2));
        assert_eq!(result.metadata["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_glob_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path());
        let result = GlobTool::new()
            .execute(json!({ "pattern": "*", "path": "nope" }), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
    }
}
