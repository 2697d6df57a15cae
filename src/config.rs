use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Repositories to triage, as `owner/repo` full names.
    #[serde(default)]
    pub repos: Vec<String>,
    pub github: GitHubConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Deserialize, Clone)]
pub struct GitHubConfig {
    pub token: String,
    /// Items without this label (or a `[ taproot ]` title marker) are skipped.
    #[serde(default = "default_trigger_label")]
    pub trigger_label: String,
}

// Manual Debug impl to avoid leaking the access token
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"[REDACTED]")
            .field("trigger_label", &self.trigger_label)
            .finish()
    }
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EditorConfig {
    #[serde(default = "default_editor_command")]
    pub command: String,
    #[serde(default = "default_editor_args")]
    pub args: Vec<String>,
    #[serde(default = "default_message_flag")]
    pub message_flag: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command: default_editor_command(),
            args: default_editor_args(),
            message_flag: default_message_flag(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    #[serde(default = "default_workspace_dir")]
    pub base_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: default_workspace_dir(),
        }
    }
}

fn default_trigger_label() -> String {
    "taproot".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_editor_command() -> String {
    "aider".to_string()
}

fn default_editor_args() -> Vec<String> {
    vec!["--sonnet".to_string(), "--yes-always".to_string()]
}

fn default_message_flag() -> String {
    "--message".to_string()
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("/tmp/taproot-workspaces")
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            // Try default paths
            builder = builder.add_source(config::File::with_name("taproot").required(false));
        }

        // Environment variable overrides with TAPROOT_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("TAPROOT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn github_token(&self) -> &str {
        &self.github.token
    }

    pub fn llm_api_key(&self) -> &str {
        &self.llm.api_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let github = GitHubConfig {
            token: "ghp_secret".to_string(),
            trigger_label: "taproot".to_string(),
        };
        let out = format!("{github:?}");
        assert!(!out.contains("ghp_secret"));
        assert!(out.contains("[REDACTED]"));

        let llm = LlmConfig {
            api_key: "sk-secret".to_string(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        };
        let out = format!("{llm:?}");
        assert!(!out.contains("sk-secret"));
    }

    #[test]
    fn test_editor_defaults() {
        let editor = EditorConfig::default();
        assert_eq!(editor.command, "aider");
        assert_eq!(editor.message_flag, "--message");
    }
}
