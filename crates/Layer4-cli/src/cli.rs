//! Diagnostic commands
//!
//! 세션 하나를 열어 (설정 스냅샷 → 레지스트리 → MCP 서버 연결) 상태를 출력합니다.

use anvil_agent::SubagentProfile;
use anvil_core::{McpManager, ToolEntry, ToolRegistry};
use anvil_foundation::{
    Capabilities, Requester, SessionSnapshot, SettingsLoader, ToolDescriptor, ToolOrigin,
    ToolPattern,
};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 열린 진단 세션
pub struct Session {
    snapshot: SessionSnapshot,
    manager: McpManager,
}

impl Session {
    /// 설정을 읽고 builtin + `task` 등록 후, `connect`면 MCP 서버 연결
    pub async fn open(working_dir: &Path, global: Option<PathBuf>, connect: bool) -> Result<Self> {
        let mut loader = SettingsLoader::new(working_dir);
        if let Some(path) = global {
            loader = loader.global_path(path);
        }
        let snapshot = loader.load().context("failed to load settings")?;

        let registry = Arc::new(ToolRegistry::with_builtins());
        registry.register(ToolEntry::delegate())?;
        let manager = McpManager::new(registry, snapshot.limits().clone());

        if connect {
            let connected = manager.connect_all(&snapshot).await;
            tracing::debug!(connected, "Connected MCP servers");
        }

        Ok(Self { snapshot, manager })
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.manager.registry()
    }

    pub async fn close(self) {
        self.manager.shutdown().await;
    }
}

/// `anvil servers`
pub async fn servers(session: &Session) -> Result<()> {
    let status = session.manager.status().await;
    if status.is_empty() {
        println!("No MCP servers configured.");
        return Ok(());
    }

    println!("{:<20} {:<16} {:<10} {:>5}", "SERVER", "TRANSPORT", "STATE", "TOOLS");
    println!("{}", "-".repeat(54));
    for server in status {
        println!(
            "{:<20} {:<16} {:<10} {:>5}",
            server.name,
            server.transport.to_string(),
            server.state.to_string(),
            server.tool_count
        );
        if let Some(error) = server.error {
            println!("  error: {}", error);
        }
    }
    Ok(())
}

/// `anvil tools [PATTERN]`
pub async fn tools(
    session: &Session,
    pattern: Option<&str>,
    subagent: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut descriptors = match pattern {
        Some(raw) => session.registry().list_matching(&ToolPattern::parse(raw)?),
        None => session.registry().descriptors(),
    };

    if let Some(name) = subagent {
        let profile = subagent_profile(&session.snapshot, name)?;
        descriptors.retain(|d| profile.allows(d));
    }
    descriptors.sort_by(|a, b| a.name.cmp(&b.name));

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    for d in &descriptors {
        println!("{:<32} {:<24} {}", d.name, origin_label(d), capability_flags(&d.capabilities));
    }
    println!("\n{} tool(s)", descriptors.len());
    Ok(())
}

/// `anvil check <TOOL>`
pub async fn check(session: &Session, tool: &str, depth: u32) -> Result<()> {
    let descriptor = session
        .registry()
        .get(tool)
        .ok_or_else(|| anyhow!("tool '{}' is not registered", tool))?
        .descriptor;

    let resolver = session.snapshot.resolver()?;
    let requester = if depth == 0 {
        Requester::TopLevel
    } else {
        Requester::Subagent {
            task_id: "check".to_string(),
            depth,
        }
    };
    let resolution = resolver.resolve(&descriptor, &requester);

    println!("tool:         {}", descriptor.name);
    println!("origin:       {}", origin_label(&descriptor));
    println!("capabilities: {}", capability_flags(&descriptor.capabilities));
    println!("requester:    {}", requester);
    println!(
        "directory:    {} ({})",
        session.snapshot.working_dir().display(),
        if session.snapshot.is_trusted() { "trusted" } else { "untrusted" }
    );
    println!("decision:     {}", resolution.explain());
    if depth > 0 && !descriptor.capabilities.allowed_in_subagent() {
        println!("note:         subagents never see this tool");
    }
    Ok(())
}

fn subagent_profile(snapshot: &SessionSnapshot, name: &str) -> Result<SubagentProfile> {
    if name == SubagentProfile::EXPLORE && !snapshot.subagents().contains_key(name) {
        return Ok(SubagentProfile::explore());
    }
    let config = snapshot
        .subagents()
        .get(name)
        .ok_or_else(|| anyhow!("unknown subagent profile '{}'", name))?;
    Ok(SubagentProfile::from_config(name, config)?)
}

fn origin_label(descriptor: &ToolDescriptor) -> String {
    match &descriptor.origin {
        ToolOrigin::Local => "local".to_string(),
        ToolOrigin::Remote {
            server, transport, ..
        } => format!("{} ({})", server, transport),
    }
}

fn capability_flags(caps: &Capabilities) -> String {
    let mut flags = Vec::new();
    if caps.writes_filesystem {
        flags.push("write");
    }
    if caps.executes_process {
        flags.push("exec");
    }
    if caps.prompts_user {
        flags.push("prompt");
    }
    if caps.delegates {
        flags.push("delegate");
    }
    if caps.allowed_in_subagent() {
        flags.push("subagent-ok");
    }
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_flags() {
        assert_eq!(capability_flags(&Capabilities::read_only()), "subagent-ok");
        assert_eq!(capability_flags(&Capabilities::process_exec()), "exec");
        assert_eq!(capability_flags(&Capabilities::default()), "-");
    }

    #[tokio::test]
    async fn test_open_without_servers() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.json");
        std::fs::write(
            &global,
            r#"{ "subagents": { "docs": { "tools": ["read"] } } }"#,
        )
        .unwrap();

        let session = Session::open(dir.path(), Some(global), false).await.unwrap();
        assert!(session.registry().contains("task"));
        assert!(session.registry().contains("bash"));

        let docs = subagent_profile(&session.snapshot, "docs").unwrap();
        let read = session.registry().get("read").unwrap().descriptor;
        let glob = session.registry().get("glob").unwrap().descriptor;
        assert!(docs.allows(&read));
        assert!(!docs.allows(&glob));

        assert!(subagent_profile(&session.snapshot, "explore").is_ok());
        assert!(subagent_profile(&session.snapshot, "missing").is_err());
        session.close().await;
    }
}
