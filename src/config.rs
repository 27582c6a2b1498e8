use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Runtime configuration, resolved once at startup. Everything has a
/// default so the tool runs without any config file present.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: Option<String>,
    pub refresh_secs: u64,
    pub page_size: usize,
    pub feedback_command: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            source: None,
            refresh_secs: 5,
            page_size: 50,
            feedback_command: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct MantaConfigFile {
    #[serde(default)]
    refresh_secs: Option<u64>,
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    feedback: FeedbackSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FeedbackSpec {
    #[serde(default, alias = "cmd")]
    command: Option<String>,
}

impl RuntimeConfig {
    pub fn load() -> Result<Self> {
        let Some(path) = discover_config_path() else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let parsed: MantaConfigFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        let defaults = Self::default();
        Ok(Self {
            source: Some(path.display().to_string()),
            refresh_secs: parsed.refresh_secs.unwrap_or(defaults.refresh_secs).max(1),
            page_size: parsed.page_size.unwrap_or(defaults.page_size).max(1),
            feedback_command: parsed
                .feedback
                .command
                .filter(|command| !command.trim().is_empty()),
        })
    }
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MANTA_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [PathBuf::from("manta.yaml"), PathBuf::from(".manta.yaml")];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/manta/config.yaml"),
            PathBuf::from(&home).join(".config/manta/config.yml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{MantaConfigFile, RuntimeConfig};

    #[test]
    fn defaults_apply_without_a_file() {
        let config = RuntimeConfig::default();
        assert_eq!(config.refresh_secs, 5);
        assert_eq!(config.page_size, 50);
        assert!(config.feedback_command.is_none());
    }

    #[test]
    fn partial_files_fall_back_per_field() {
        let parsed: MantaConfigFile = serde_yaml::from_str("page_size: 25\n").expect("parse");
        assert_eq!(parsed.page_size, Some(25));
        assert_eq!(parsed.refresh_secs, None);
    }

    #[test]
    fn feedback_command_accepts_cmd_alias() {
        let parsed: MantaConfigFile =
            serde_yaml::from_str("feedback:\n  cmd: /usr/local/bin/send-feedback\n")
                .expect("parse");
        assert_eq!(
            parsed.feedback.command.as_deref(),
            Some("/usr/local/bin/send-feedback")
        );
    }
}
