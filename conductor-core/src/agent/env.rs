//! Child environment construction for agent processes
//!
//! Every agent process starts from the inherited environment with all known
//! provider API keys and the backend's config-directory variable removed.
//! Only values present in the explicit per-backend configuration are added
//! back, so a key configured for one agent can never leak into another.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Provider API key variables stripped from every agent environment
pub const PROVIDER_API_KEY_VARS: [&str; 5] = [
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "GEMINI_API_KEY",
    "OPENROUTER_API_KEY",
    "MISTRAL_API_KEY",
];

/// Key variable used when the provider is empty or not recognized
pub const DEFAULT_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Map a provider name to its API key variable
///
/// Unknown and empty providers fall back to [`DEFAULT_API_KEY_VAR`].
pub fn provider_api_key_var(provider: &str) -> &'static str {
    match provider {
        "anthropic" => "ANTHROPIC_API_KEY",
        "openai" => "OPENAI_API_KEY",
        "google" => "GEMINI_API_KEY",
        "openrouter" => "OPENROUTER_API_KEY",
        "mistral" => "MISTRAL_API_KEY",
        _ => DEFAULT_API_KEY_VAR,
    }
}

/// Extract the provider prefix from a `provider/model` string
///
/// Returns an empty string when there is no `/` or nothing precedes it.
pub fn provider_from_model(model: &str) -> &str {
    match model.find('/') {
        Some(i) if i > 0 => &model[..i],
        _ => "",
    }
}

/// What one backend needs in its child environment
#[derive(Debug, Clone)]
pub struct EnvSpec {
    /// Backend config-directory variable, always stripped from the inherited set
    pub config_dir_var: &'static str,
    /// Value for `config_dir_var`, if configured
    pub config_dir: Option<PathBuf>,
    /// Variable that receives `api_key`
    pub api_key_var: &'static str,
    /// Explicitly configured API key
    pub api_key: Option<String>,
}

impl EnvSpec {
    /// Requirements with nothing configured
    pub fn new(config_dir_var: &'static str, api_key_var: &'static str) -> Self {
        Self {
            config_dir_var,
            config_dir: None,
            api_key_var,
            api_key: None,
        }
    }

    /// Set the config directory (empty paths are ignored)
    pub fn with_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config_dir = dir.filter(|d| !d.as_os_str().is_empty());
        self
    }

    /// Set the API key (empty keys are ignored)
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    fn is_filtered(&self, name: &OsStr) -> bool {
        name == self.config_dir_var || PROVIDER_API_KEY_VARS.iter().any(|var| name == *var)
    }
}

/// Build the child environment from the current process environment
pub fn build_env(spec: &EnvSpec) -> Vec<(OsString, OsString)> {
    build_env_from(std::env::vars_os(), spec)
}

/// Build the child environment from an explicit inherited set
pub fn build_env_from<I>(inherited: I, spec: &EnvSpec) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: Vec<(OsString, OsString)> = inherited
        .into_iter()
        .filter(|(name, _)| !spec.is_filtered(name))
        .collect();

    if let Some(ref dir) = spec.config_dir {
        env.push((spec.config_dir_var.into(), dir.clone().into_os_string()));
    }
    if let Some(ref key) = spec.api_key {
        env.push((spec.api_key_var.into(), key.into()));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inherited(pairs: &[(&str, &str)]) -> Vec<(OsString, OsString)> {
        pairs
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    fn lookup<'a>(env: &'a [(OsString, OsString)], name: &str) -> Vec<&'a OsString> {
        env.iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    #[test]
    fn test_explicit_key_replaces_inherited() {
        let spec = EnvSpec::new("CLAUDE_CONFIG_DIR", "ANTHROPIC_API_KEY")
            .with_api_key(Some("explicit".to_string()));
        let env = build_env_from(
            inherited(&[("ANTHROPIC_API_KEY", "leaked"), ("HOME", "/home/me")]),
            &spec,
        );

        assert_eq!(lookup(&env, "ANTHROPIC_API_KEY"), vec!["explicit"]);
        assert_eq!(lookup(&env, "HOME"), vec!["/home/me"]);
    }

    #[test]
    fn test_all_provider_keys_stripped() {
        let spec = EnvSpec::new("PI_CODING_AGENT_DIR", "ANTHROPIC_API_KEY");
        let env = build_env_from(
            inherited(&[
                ("ANTHROPIC_API_KEY", "a"),
                ("OPENAI_API_KEY", "b"),
                ("GEMINI_API_KEY", "c"),
                ("OPENROUTER_API_KEY", "d"),
                ("MISTRAL_API_KEY", "e"),
                ("PATH", "/usr/bin"),
            ]),
            &spec,
        );

        for var in PROVIDER_API_KEY_VARS {
            assert!(lookup(&env, var).is_empty(), "{} should be stripped", var);
        }
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_config_dir_replaced() {
        let spec = EnvSpec::new("OPENCODE_CONFIG_DIR", "ANTHROPIC_API_KEY")
            .with_config_dir(Some(PathBuf::from("/new/dir")));
        let env = build_env_from(inherited(&[("OPENCODE_CONFIG_DIR", "/old/dir")]), &spec);

        assert_eq!(lookup(&env, "OPENCODE_CONFIG_DIR"), vec!["/new/dir"]);
    }

    #[test]
    fn test_inherited_config_dir_dropped_when_unset() {
        let spec = EnvSpec::new("CLAUDE_CONFIG_DIR", "ANTHROPIC_API_KEY");
        let env = build_env_from(inherited(&[("CLAUDE_CONFIG_DIR", "/inherited")]), &spec);
        assert!(env.is_empty());
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let spec = EnvSpec::new("CODEX_HOME", "OPENAI_API_KEY")
            .with_api_key(Some(String::new()))
            .with_config_dir(Some(PathBuf::new()));
        let env = build_env_from(Vec::new(), &spec);
        assert!(env.is_empty());
    }

    #[test]
    fn test_other_backend_config_dir_is_kept() {
        let spec = EnvSpec::new("CODEX_HOME", "OPENAI_API_KEY");
        let env = build_env_from(inherited(&[("CLAUDE_CONFIG_DIR", "/c")]), &spec);
        assert_eq!(lookup(&env, "CLAUDE_CONFIG_DIR"), vec!["/c"]);
    }

    #[test]
    fn test_provider_from_model() {
        assert_eq!(provider_from_model("anthropic/claude-sonnet-4-5"), "anthropic");
        assert_eq!(provider_from_model("openrouter/meta/llama"), "openrouter");
        assert_eq!(provider_from_model("gpt-4o"), "");
        assert_eq!(provider_from_model("/leading"), "");
        assert_eq!(provider_from_model(""), "");
    }

    #[test]
    fn test_provider_api_key_var() {
        assert_eq!(provider_api_key_var("openai"), "OPENAI_API_KEY");
        assert_eq!(provider_api_key_var("google"), "GEMINI_API_KEY");
        assert_eq!(provider_api_key_var("custom-provider"), "ANTHROPIC_API_KEY");
        assert_eq!(provider_api_key_var(""), "ANTHROPIC_API_KEY");
    }
}
