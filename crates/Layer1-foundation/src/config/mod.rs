//! Config - 세션 설정
//!
//! - `settings.rs` - settings.json 구조 (권한 규칙, 한도, 서브에이전트)
//! - `mcp.rs` - MCP 서버 설정
//! - `loader.rs` - global/project 파일 로드
//! - `snapshot.rs` - 세션 동안 불변인 SessionSnapshot

mod loader;
mod mcp;
mod settings;
mod snapshot;

pub use loader::SettingsLoader;
pub use mcp::{expand_env_var, McpServerConfig};
pub use settings::{
    AskPolicy, Limits, LimitsConfig, NonInteractiveConfig, PermissionSettings, Settings,
    SubagentProfileConfig, CONFIG_DIR_NAME, SETTINGS_FILE,
};
pub use snapshot::SessionSnapshot;
