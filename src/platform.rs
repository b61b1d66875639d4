//! # Platform-specific utilities
//!
//! Centralizza la risoluzione dei tool esterni (ffmpeg, ffprobe) e il
//! controllo della loro presenza. I path possono essere sovrascritti con
//! variabili d'ambiente `FFMPEG_PATH` / `FFPROBE_PATH`.

use crate::error::ConvertError;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// Platform-specific command manager
pub struct PlatformCommands {
    commands: HashMap<&'static str, String>,
    which_command: &'static str,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let (suffix, which_command) = if cfg!(windows) {
            (".exe", "where")
        } else {
            ("", "which")
        };

        let mut commands = HashMap::new();
        for tool in ["ffmpeg", "ffprobe"] {
            let env_key = format!("{}_PATH", tool.to_ascii_uppercase());
            let command = match std::env::var(&env_key) {
                Ok(path) if !path.trim().is_empty() => {
                    debug!("Using {} from {}: {}", tool, env_key, path);
                    path
                }
                _ => format!("{}{}", tool, suffix),
            };
            commands.insert(tool, command);
        }

        Self {
            commands,
            which_command,
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&'a self, base_name: &'a str) -> &'a str {
        self.commands
            .get(base_name)
            .map(String::as_str)
            .unwrap_or(base_name)
    }

    /// Get the command used to check if a program exists
    pub fn which_command(&self) -> &str {
        self.which_command
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        let command_name = self.get_command(base_name);

        // Explicit paths are checked directly
        if std::path::Path::new(command_name).components().count() > 1 {
            return std::path::Path::new(command_name).is_file();
        }

        let result = tokio::process::Command::new(self.which_command)
            .arg(command_name)
            .output()
            .await;

        match result {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// Fail with `MissingDependency` for the first tool that cannot be found
    pub async fn require(&self, tools: &[&str]) -> Result<(), ConvertError> {
        for tool in tools {
            if !self.is_command_available(tool).await {
                return Err(ConvertError::MissingDependency(format!(
                    "{} is required for video conversion",
                    tool
                )));
            }
        }
        Ok(())
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
