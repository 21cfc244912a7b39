//! Configuration Loader
//!
//! ## 검색 위치
//!
//! 1. Global: `~/.anvil/settings.json`
//! 2. Project: `<working_dir>/.anvil/settings.json`
//!
//! 두 파일 모두 없어도 됩니다. 파일이 있는데 파싱에 실패하면 에러입니다
//! (권한 규칙이 조용히 빠지는 것을 막기 위해).

use super::settings::{Settings, CONFIG_DIR_NAME, SETTINGS_FILE};
use super::snapshot::SessionSnapshot;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 설정 로더
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    working_dir: PathBuf,
    global_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// 기본 검색 경로로 생성
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let global_path = dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(SETTINGS_FILE));
        let project_path = Some(working_dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE));
        Self {
            working_dir,
            global_path,
            project_path,
        }
    }

    /// global 경로 변경 (테스트, `--config`)
    pub fn global_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_path = Some(path.into());
        self
    }

    /// global 설정을 읽지 않음
    pub fn without_global(mut self) -> Self {
        self.global_path = None;
        self
    }

    pub fn project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    /// 두 scope를 읽어 세션 스냅샷 생성
    pub fn load(&self) -> Result<SessionSnapshot> {
        let global = load_optional(self.global_path.as_deref(), "global")?;
        let project = load_optional(self.project_path.as_deref(), "project")?;
        SessionSnapshot::from_layers(&self.working_dir, global, project)
    }
}

fn load_optional(path: Option<&Path>, scope: &str) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };

    if !path.exists() {
        debug!("No {} settings at {}", scope, path.display());
        return Ok(Settings::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    let settings = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded {} settings from: {}", scope, path.display());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{Disposition, RuleScope};

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_missing_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SettingsLoader::new(dir.path()).without_global().load().unwrap();
        assert!(snapshot.rules().is_empty());
        assert!(snapshot.servers().is_empty());
        assert!(!snapshot.is_trusted());
    }

    #[test]
    fn test_scopes_are_kept() {
        let global_dir = tempfile::tempdir().unwrap();
        let project_dir = tempfile::tempdir().unwrap();
        let global = write(
            global_dir.path(),
            r#"{ "permissions": { "rules": [ { "pattern": "read", "disposition": "deny" } ] } }"#,
        );
        let project = write(
            project_dir.path(),
            r#"{ "permissions": { "rules": [ { "pattern": "read", "disposition": "always" } ] } }"#,
        );

        let snapshot = SettingsLoader::new(project_dir.path())
            .global_path(global)
            .project_path(project)
            .load()
            .unwrap();

        let rules = snapshot.rules();
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().any(|(scope, r)| *scope == RuleScope::Global
            && r.disposition == Disposition::Deny));
        assert!(rules.iter().any(|(scope, r)| *scope == RuleScope::Project
            && r.disposition == Disposition::Always));
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "{ not json");
        let result = SettingsLoader::new(dir.path())
            .without_global()
            .project_path(path)
            .load();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
