//! Bash Tool - Shell 명령 실행 도구
//!
//! Shell 명령을 실행합니다.
//! - 타임아웃 지원 (초과 시 프로세스 종료)
//! - 작업 디렉토리 유지
//! - 프로세스 실행 능력으로 표시되어 신뢰되지 않은 디렉토리에서는 항상 승인 필요

use anvil_foundation::{
    Capabilities, Error, Result, Tool, ToolContext, ToolExecutionResult, ToolMeta,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Bash 도구 입력
#[derive(Debug, Deserialize)]
pub struct BashInput {
    /// 실행할 명령어
    pub command: String,

    /// 타임아웃 (밀리초, 기본: 120000 = 2분, 최대: 600000 = 10분)
    #[serde(default)]
    pub timeout: Option<u64>,

    /// 명령어 설명 (UI 표시용)
    #[serde(default)]
    pub description: Option<String>,
}

/// Bash 도구
#[derive(Debug, Default)]
pub struct BashTool;

impl BashTool {
    /// 새 인스턴스 생성
    pub fn new() -> Self {
        Self
    }

    /// 도구 이름
    pub const NAME: &'static str = "bash";

    /// 기본 타임아웃 (2분)
    const DEFAULT_TIMEOUT_MS: u64 = 120_000;

    /// 최대 타임아웃 (10분)
    const MAX_TIMEOUT_MS: u64 = 600_000;

    /// 최대 출력 크기 (30KB)
    const MAX_OUTPUT_SIZE: usize = 30_000;

    fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
        let stdout = String::from_utf8_lossy(stdout);
        let stderr = String::from_utf8_lossy(stderr);

        let mut output = String::new();
        if !stdout.is_empty() {
            output.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str("[stderr]\n");
            output.push_str(&stderr);
        }

        if output.len() > Self::MAX_OUTPUT_SIZE {
            let mut cut = Self::MAX_OUTPUT_SIZE;
            while !output.is_char_boundary(cut) {
                cut -= 1;
            }
            output.truncate(cut);
            output.push_str("\n... [output truncated]");
        }
        output
    }
}

#[async_trait]
impl Tool for BashTool {
    fn meta(&self) -> ToolMeta {
        ToolMeta::new(Self::NAME)
            .display_name("Bash")
            .description(
                "Execute a shell command in the working directory. Output from stdout and \
                 stderr is returned; non-zero exit codes are reported as errors.",
            )
            .category("execute")
            .capabilities(Capabilities::process_exec())
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "Optional timeout in milliseconds (max 600000)"
                },
                "description": {
                    "type": "string",
                    "description": "Clear, concise description of what this command does"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, context: &dyn ToolContext) -> Result<ToolExecutionResult> {
        let parsed: BashInput = serde_json::from_value(input)
            .map_err(|e| Error::InvalidInput(format!("Invalid input: {}", e)))?;

        if parsed.command.trim().is_empty() {
            return Ok(ToolExecutionResult::error("Command cannot be empty"));
        }

        let timeout_ms = parsed
            .timeout
            .unwrap_or(Self::DEFAULT_TIMEOUT_MS)
            .min(Self::MAX_TIMEOUT_MS);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&parsed.command)
            .current_dir(context.working_dir())
            .envs(context.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolExecutionResult::error(format!(
                    "Failed to spawn process: {}",
                    e
                )));
            }
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let result = timeout(Duration::from_millis(timeout_ms), async {
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();

            // 파이프가 가득 차 멈추지 않도록 동시에 읽음
            let read_out = async {
                if let Some(out) = stdout.as_mut() {
                    let _ = out.read_to_end(&mut stdout_buf).await;
                }
            };
            let read_err = async {
                if let Some(err) = stderr.as_mut() {
                    let _ = err.read_to_end(&mut stderr_buf).await;
                }
            };
            tokio::join!(read_out, read_err);

            let status = child.wait().await;
            (status, stdout_buf, stderr_buf)
        })
        .await;

        match result {
            Ok((status, stdout_buf, stderr_buf)) => {
                let status = match status {
                    Ok(s) => s,
                    Err(e) => {
                        return Ok(ToolExecutionResult::error(format!("Process error: {}", e)));
                    }
                };

                let output = Self::combine_output(&stdout_buf, &stderr_buf);
                let exit_code = status.code().unwrap_or(-1);

                if status.success() {
                    let output = if output.is_empty() {
                        "[Command completed successfully with no output]".to_string()
                    } else {
                        output
                    };
                    Ok(ToolExecutionResult::success(output)
                        .with_metadata("exit_code", json!(exit_code)))
                } else {
                    let message = if output.is_empty() {
                        format!("Command failed with exit code {}", exit_code)
                    } else {
                        format!("Exit code {}\n{}", exit_code, output)
                    };
                    Ok(ToolExecutionResult::error(message)
                        .with_metadata("exit_code", json!(exit_code)))
                }
            }
            Err(_) => {
                // kill_on_drop 이 남은 프로세스를 정리
                Ok(ToolExecutionResult::error(format!(
                    "Command timed out after {} ms",
                    timeout_ms
                )))
            }
        }
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
    fn test_meta() {
        let meta = BashTool::new().meta();
        assert_eq!(meta.name, "bash");
        assert_eq!(meta.category, "execute");
        assert!(meta.capabilities.executes_process);
        assert!(!meta.capabilities.allowed_in_subagent());
    }

    #[test]
    fn test_schema() {
        let schema = BashTool::new().schema();
        assert!(schema["properties"]["command"].is_object());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ctx = RuntimeContext::new("t", dir.path());

        let result = BashTool::new()
            .execute(json!({ "command": "ls" }), &ctx)
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_is_passed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path()).with_env("ANVIL_TEST_VALUE", "hello");

        let result = BashTool::new()
            .execute(json!({ "command": "echo $ANVIL_TEST_VALUE" }), &ctx)
            .await
            .unwrap();
        assert_eq!(result.output.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path());

        let result = BashTool::new()
            .execute(json!({ "command": "echo oops >&2; exit 3" }), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.metadata["exit_code"], json!(3));
        assert!(result.error.unwrap().contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path());

        let result = BashTool::new()
            .execute(json!({ "command": "sleep 5", "timeout": 100 }), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new("t", dir.path());
        let result = BashTool::new()
            .execute(json!({ "command": "  " }), &ctx)
            .await
            .unwrap();
        assert!(!result.success);
    }
}
