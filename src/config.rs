use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::events::Mode;
use crate::graph::GraphOptions;
use crate::report::AnalysisOptions;

/// Application configuration loaded from TOML config file.
/// All fields have defaults — the config file is optional.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Default MIDI channel (0-15) when `--channel` is not given.
    pub channel: Option<i32>,
    /// Default transition-counting mode.
    pub mode: Mode,
    /// Keep isolated notes in the presentation graph.
    pub show_isolated_nodes: bool,
    /// Number of parallel workers for batch scans. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
}

impl AppConfig {
    /// Load config from `~/.config/tonnetz/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Merge CLI overrides over config values.
    pub fn analysis_options(
        &self,
        channel: Option<i32>,
        mode: Option<Mode>,
        show_isolated_nodes: bool,
    ) -> Option<AnalysisOptions> {
        Some(AnalysisOptions {
            channel: channel.or(self.channel)?,
            mode: mode.unwrap_or(self.mode),
            graph: GraphOptions {
                show_isolated_nodes: show_isolated_nodes || self.show_isolated_nodes,
            },
        })
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.mode, Mode::Monophonic);
        assert!(!config.show_isolated_nodes);
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::parse(
            r#"
            channel = 3
            mode = "polyphonic"
            show_isolated_nodes = true
            workers = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.channel, Some(3));
        assert_eq!(config.mode, Mode::Polyphonic);
        assert_eq!(config.resolve_workers(), 4);
    }

    #[test]
    fn test_bad_mode_rejected() {
        assert!(AppConfig::parse("mode = \"chordal\"").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = AppConfig {
            channel: Some(2),
            mode: Mode::Polyphonic,
            ..Default::default()
        };
        let opts = config.analysis_options(Some(9), None, false).unwrap();
        assert_eq!(opts.channel, 9);
        assert_eq!(opts.mode, Mode::Polyphonic);

        let opts = config.analysis_options(None, Some(Mode::Monophonic), true).unwrap();
        assert_eq!(opts.channel, 2);
        assert_eq!(opts.mode, Mode::Monophonic);
        assert!(opts.graph.show_isolated_nodes);
    }

    #[test]
    fn test_channel_required_somewhere() {
        assert!(AppConfig::default().analysis_options(None, None, false).is_none());
    }
}
