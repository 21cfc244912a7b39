//! Builtin Tools - 내장 도구들
//!
//! ## 도구 목록
//!
//! ### 파일시스템 (Filesystem)
//! - `read` - 파일 읽기 (줄 번호 포함)
//! - `write` - 파일 쓰기 (생성 또는 덮어쓰기)
//! - `glob` - 파일 패턴 검색
//!
//! ### 실행 (Execute)
//! - `bash` - Shell 명령 실행
//!
//! 위임 도구 `task`는 실행기가 세션마다 달라서 여기가 아니라
//! `tool::delegate`에 있습니다.

// Filesystem tools
pub mod glob;
pub mod read;
pub mod write;

// Execute tools
pub mod bash;

pub use bash::BashTool;
pub use glob::GlobTool;
pub use read::ReadTool;
pub use write::WriteTool;

use anvil_foundation::Tool;
use std::sync::Arc;

/// 모든 builtin 도구 반환
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadTool::new()),
        Arc::new(WriteTool::new()),
        Arc::new(GlobTool::new()),
        Arc::new(BashTool::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tools() {
        let names: Vec<_> = all_tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["read", "write", "glob", "bash"]);
    }

    #[test]
    fn test_subagent_safe_subset() {
        let names: Vec<_> = all_tools()
            .iter()
            .filter(|t| t.meta().capabilities.allowed_in_subagent())
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["read", "glob"]);
    }

    #[test]
    fn test_descriptor_carries_capabilities() {
        for tool in all_tools() {
            let descriptor = tool.descriptor();
            assert_eq!(descriptor.capabilities, tool.meta().capabilities);
            assert!(!descriptor.is_remote());
        }
    }
}
