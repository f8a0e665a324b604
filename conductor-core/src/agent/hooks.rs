//! Hook settings for claude's `--settings` flag

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::warn;

/// Hooks to install in a claude session
#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    /// Socket of the permission server; adds a hook gating every tool call
    pub permission_socket: Option<PathBuf>,
    /// Route Bash tool calls through the `dcg` guard
    pub guard_mode: bool,
}

/// Timeout for the permission hook, in milliseconds
const PERMISSION_HOOK_TIMEOUT_MS: u64 = 120_000;

/// Timeout for the guard hook, in milliseconds
const GUARD_HOOK_TIMEOUT_MS: u64 = 5_000;

/// Paths are interpolated into shell commands, so only these characters pass
fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '.' | '-'))
}

fn command_hook(matcher: &str, command: String, timeout_ms: u64) -> Value {
    json!({
        "matcher": matcher,
        "hooks": [{
            "type": "command",
            "command": command,
            "timeout": timeout_ms,
        }],
    })
}

/// Build the settings JSON, or `None` when no hook applies
pub fn build_hook_settings(config: &HookConfig) -> Option<String> {
    build_hook_settings_with_home(config, dirs::home_dir().as_deref())
}

fn build_hook_settings_with_home(config: &HookConfig, home: Option<&Path>) -> Option<String> {
    let mut pre_tool_use = Vec::new();

    if let Some(ref socket) = config.permission_socket {
        let socket = socket.to_string_lossy();
        if is_safe_path(&socket) {
            pre_tool_use.push(command_hook(
                "",
                format!("conductor hook --socket {}", socket),
                PERMISSION_HOOK_TIMEOUT_MS,
            ));
        } else {
            warn!(socket = %socket, "permission socket path has unsafe characters, skipping hook");
        }
    }

    if config.guard_mode {
        match home {
            None => warn!("could not determine home directory, skipping guard hook"),
            Some(home) => {
                let dcg_config = home.join(".config").join("dcg").join("config.toml");
                let dcg_config = dcg_config.to_string_lossy();
                if is_safe_path(&dcg_config) {
                    pre_tool_use.push(command_hook(
                        "Bash",
                        format!("DCG_CONFIG='{}' dcg", dcg_config),
                        GUARD_HOOK_TIMEOUT_MS,
                    ));
                } else {
                    warn!(path = %dcg_config, "dcg config path has unsafe characters, skipping guard hook");
                }
            }
        }
    }

    if pre_tool_use.is_empty() {
        return None;
    }

    Some(json!({ "hooks": { "PreToolUse": pre_tool_use } }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(settings: &str) -> Value {
        serde_json::from_str(settings).unwrap()
    }

    #[test]
    fn test_no_hooks() {
        assert_eq!(build_hook_settings(&HookConfig::default()), None);
    }

    #[test]
    fn test_permission_hook() {
        let config = HookConfig {
            permission_socket: Some(PathBuf::from("/tmp/conductor-1234.sock")),
            guard_mode: false,
        };
        let settings = parse(&build_hook_settings(&config).unwrap());
        let hooks = settings["hooks"]["PreToolUse"].as_array().unwrap();

        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0]["matcher"], "");
        assert_eq!(
            hooks[0]["hooks"][0]["command"],
            "conductor hook --socket /tmp/conductor-1234.sock"
        );
        assert_eq!(hooks[0]["hooks"][0]["type"], "command");
        assert_eq!(hooks[0]["hooks"][0]["timeout"], 120000);
    }

    #[test]
    fn test_unsafe_socket_path_skipped() {
        let config = HookConfig {
            permission_socket: Some(PathBuf::from("/tmp/x; rm -rf ~")),
            guard_mode: false,
        };
        assert_eq!(build_hook_settings(&config), None);
    }

    #[test]
    fn test_guard_hook() {
        let config = HookConfig {
            permission_socket: None,
            guard_mode: true,
        };
        let settings =
            build_hook_settings_with_home(&config, Some(Path::new("/home/dev"))).unwrap();
        let settings = parse(&settings);
        let hooks = settings["hooks"]["PreToolUse"].as_array().unwrap();

        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0]["matcher"], "Bash");
        assert_eq!(
            hooks[0]["hooks"][0]["command"],
            "DCG_CONFIG='/home/dev/.config/dcg/config.toml' dcg"
        );
        assert_eq!(hooks[0]["hooks"][0]["timeout"], 5000);
    }

    #[test]
    fn test_guard_hook_skipped_for_unsafe_home() {
        let config = HookConfig {
            permission_socket: None,
            guard_mode: true,
        };
        assert_eq!(
            build_hook_settings_with_home(&config, Some(Path::new("/home/my user"))),
            None
        );
        assert_eq!(build_hook_settings_with_home(&config, None), None);
    }

    #[test]
    fn test_both_hooks_in_order() {
        let config = HookConfig {
            permission_socket: Some(PathBuf::from("/run/perm.sock")),
            guard_mode: true,
        };
        let settings =
            build_hook_settings_with_home(&config, Some(Path::new("/home/dev"))).unwrap();
        let settings = parse(&settings);
        let hooks = settings["hooks"]["PreToolUse"].as_array().unwrap();
        assert_eq!(hooks[0]["matcher"], "");
        assert_eq!(hooks[1]["matcher"], "Bash");
    }
}
