//! External code editor invocation.
//!
//! The editor is an opaque process: it consumes an instruction string inside
//! a checked-out working copy and leaves zero or more commits behind.
//! Whether it actually changed anything is judged by the caller from the
//! before/after HEAD hash, not from the exit code.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::EditorConfig;
use crate::error::{AppError, Result};

/// Captured output of one editor run.
#[derive(Debug, Clone)]
pub struct EditorTranscript {
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CodeEditor: Send + Sync {
    /// Run the editor with an instruction in the given working directory.
    /// The working directory is passed explicitly; the process CWD is never
    /// mutated.
    async fn run(&self, instruction: &str, workdir: &Path) -> Result<EditorTranscript>;
}

/// Editor that shells out to a configured command (aider by default).
pub struct CommandEditor {
    command: String,
    args: Vec<String>,
    message_flag: String,
}

impl CommandEditor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            message_flag: config.message_flag.clone(),
        }
    }

    async fn run_once(&self, instruction: &str, workdir: &Path) -> Result<EditorTranscript> {
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(&self.message_flag)
            .arg(instruction)
            .current_dir(workdir)
            .output()
            .await
            .map_err(|e| AppError::Editor(format!("Failed to spawn {}: {e}", self.command)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(AppError::Editor(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(EditorTranscript { stdout, stderr })
    }
}

#[async_trait]
impl CodeEditor for CommandEditor {
    async fn run(&self, instruction: &str, workdir: &Path) -> Result<EditorTranscript> {
        let transcript = self.run_once(instruction, workdir).await?;

        // aider restarts itself after self-updating; one retry covers it
        if transcript.stdout.contains("Re-run aider to use new version") {
            tracing::info!("Editor self-updated, re-running");
            return self.run_once(instruction, workdir).await;
        }

        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell_editor(script: &str) -> CommandEditor {
        // `sh -c <script>` ignores the trailing message flag and
        // instruction, which land in $0/$1.
        CommandEditor {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            message_flag: "--message".to_string(),
        }
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let editor = shell_editor("echo applied the edit");
        let transcript = editor.run("do it", Path::new(".")).await.unwrap();
        assert!(transcript.stdout.contains("applied the edit"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_editor_error() {
        let editor = shell_editor("echo broken >&2; exit 3");
        let err = editor.run("do it", Path::new(".")).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("broken"), "unexpected error: {msg}");
    }

    #[tokio::test]
    async fn test_missing_command_is_editor_error() {
        let editor = CommandEditor {
            command: "definitely-not-installed-anywhere".to_string(),
            args: vec![],
            message_flag: "--message".to_string(),
        };
        let err = editor.run("do it", Path::new(".")).await.unwrap_err();
        assert!(matches!(err, AppError::Editor(_)));
    }
}
