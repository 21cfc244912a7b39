//! Tool Context - 도구 실행 컨텍스트
//!
//! Layer1 `ToolContext` trait 구현. 권한 판단은 dispatcher가 끝낸 뒤
//! 도구가 실행되므로 컨텍스트에는 실행 환경만 담습니다.

use anvil_foundation::ToolContext;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 런타임 컨텍스트
///
/// - 세션 ID
/// - 작업 디렉토리 (상대 경로의 기준)
/// - 도구 프로세스에 추가로 넘길 환경 변수
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    session_id: String,
    working_dir: PathBuf,
    env: HashMap<String, String>,
}

impl RuntimeContext {
    /// 새 컨텍스트 생성
    pub fn new(session_id: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            working_dir: working_dir.into(),
            env: HashMap::new(),
        }
    }

    /// 환경 변수 추가
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// 작업 디렉토리 기준으로 경로 해석
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve_path(self.working_dir(), path)
    }
}

impl ToolContext for RuntimeContext {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn env_vars(&self) -> &HashMap<String, String> {
        &self.env
    }
}

/// 절대 경로는 그대로, 상대 경로는 작업 디렉토리 기준
pub fn resolve_path(working_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_context() {
        let ctx = RuntimeContext::new("test-session", "/tmp").with_env("MY_VAR", "value");

        assert_eq!(ctx.session_id(), "test-session");
        assert_eq!(ctx.working_dir(), Path::new("/tmp"));
        assert_eq!(ctx.env_vars().get("MY_VAR"), Some(&"value".to_string()));
    }

    #[test]
    fn test_resolve() {
        let ctx = RuntimeContext::new("s", "/work");
        assert_eq!(ctx.resolve("src/main.rs"), PathBuf::from("/work/src/main.rs"));
        assert_eq!(ctx.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
