// Global configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::engine::EngineConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub defaults: DefaultsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    /// Pinned ffmpeg binary the engine runs
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// Pinned ffprobe binary used for duration probing
    #[serde(default = "default_probe_binary")]
    pub probe_binary: PathBuf,

    /// Diagnostic logging (engine output at debug level plus ffconvert.log)
    #[serde(default = "default_log")]
    pub log: bool,

    /// Extra arguments appended to every conversion, shell-style
    #[serde(default)]
    pub extra_args: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    /// Directory converted files are saved into (defaults to the current
    /// directory)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSection {
    /// Format used when none is requested
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_binary() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_probe_binary() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log() -> bool {
    true
}

fn default_format() -> String {
    "mp4".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            probe_binary: default_probe_binary(),
            log: default_log(),
            extra_args: String::new(),
        }
    }
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            binary: self.binary.clone(),
            probe_binary: self.probe_binary.clone(),
            log: self.log,
            extra_args: self.extra_args.clone(),
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join("ffconvert")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("ffconvert")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from disk, or fall back to built-in defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            let config: Config = toml::from_str(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?;

            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Check if config file exists
    pub fn exists() -> bool {
        Self::config_path().map(|p| p.exists()).unwrap_or(false)
    }

    /// Create a default config file if it doesn't exist
    pub fn ensure_default() -> Result<()> {
        if !Self::exists() {
            let config = Config::default();
            config.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.binary, PathBuf::from("ffmpeg"));
        assert_eq!(config.engine.probe_binary, PathBuf::from("ffprobe"));
        assert!(config.engine.log, "diagnostic logging is on by default");
        assert_eq!(config.defaults.format, "mp4");
        assert_eq!(config.output.dir, None);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [engine]
            binary = "/opt/ffmpeg/bin/ffmpeg"

            [defaults]
            format = "webm"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.binary, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        // Unspecified fields keep their defaults
        assert_eq!(config.engine.probe_binary, PathBuf::from("ffprobe"));
        assert!(config.engine.log);
        assert_eq!(config.defaults.format, "webm");
    }

    #[test]
    fn test_roundtrip() {
        let mut config = Config::default();
        config.engine.extra_args = "-c:v copy".to_string();
        config.output.dir = Some(PathBuf::from("/tmp/out"));

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.engine.extra_args, "-c:v copy");
        assert_eq!(parsed.output.dir, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_to_engine_config() {
        let section = EngineSection {
            binary: PathBuf::from("/usr/bin/ffmpeg"),
            probe_binary: PathBuf::from("/usr/bin/ffprobe"),
            log: false,
            extra_args: "-loglevel info".to_string(),
        };
        let engine_config = section.to_engine_config();
        assert_eq!(engine_config.binary, PathBuf::from("/usr/bin/ffmpeg"));
        assert!(!engine_config.log);
        assert_eq!(engine_config.extra_args, "-loglevel info");
    }
}
