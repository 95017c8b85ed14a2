//! Daemon configuration.
//!
//! Options come from the command line and, optionally, an ini-style
//! configuration file. The file format is a fixed legacy dialect (flat
//! `KEY = value` lines with `#`/`;` comments, optionally quoted values, a
//! repeatable NETWORK key and numbered NETWORK1..NETWORK5 slot keys), so it
//! is parsed by hand rather than through a document parser. Command-line
//! options override file values; mapping entries from both sources are
//! combined.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cli::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("{path}:{line}: expected KEY = value")]
    Syntax { path: PathBuf, line: usize },
    #[error("{path}:{line}: invalid value {value:?} for {key}")]
    Value { path: PathBuf, line: usize, key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// 0 = trace .. 5 = fatal.
    pub log_level: u8,
    pub log_color: bool,
    pub log_file: Option<PathBuf>,
    /// Raw `interface:tableid` mapping entries, validated later by the
    /// engine's mapping parser.
    pub networks: Vec<String>,
    /// Non-fatal findings collected before logging is up; emitted once the
    /// subscriber is installed.
    pub warnings: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: 2,
            log_color: true,
            log_file: None,
            networks: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Config {
    /// Resolve the effective configuration from the parsed command line.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = &cli.config {
            let text = fs::read_to_string(path)
                .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
            config.apply_file(path, &text)?;
        }

        config.apply_cli(cli);
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(level) = cli.loglevel {
            self.log_level = level;
        }
        if cli.verbose {
            self.log_level = 0;
        } else if cli.quiet {
            self.log_level = 3;
        }
        if let Some(color) = cli.logcolor {
            self.log_color = color;
        }
        if let Some(file) = &cli.logfile {
            self.log_file = Some(file.clone());
        }
        self.networks.extend(cli.networks.iter().cloned());
    }

    fn apply_file(&mut self, path: &Path, text: &str) -> Result<(), ConfigError> {
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            // Section headers are legal ini noise; the dialect is flat.
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::Syntax { path: path.to_path_buf(), line });
            };
            let key = key.trim().to_ascii_uppercase();
            let value = strip_quotes(value.trim());

            match key.as_str() {
                "LOGLEVEL" => {
                    self.log_level = value.parse().ok().filter(|level| *level <= 5).ok_or_else(
                        || ConfigError::Value {
                            path: path.to_path_buf(),
                            line,
                            key: key.clone(),
                            value: value.to_string(),
                        },
                    )?;
                }
                "LOGCOLOR" => {
                    self.log_color = parse_bool(value).ok_or_else(|| ConfigError::Value {
                        path: path.to_path_buf(),
                        line,
                        key: key.clone(),
                        value: value.to_string(),
                    })?;
                }
                "LOGFILE" => {
                    self.log_file = Some(PathBuf::from(value));
                }
                // Repeatable NETWORK key plus the legacy numbered slots.
                "NETWORK" | "NETWORK1" | "NETWORK2" | "NETWORK3" | "NETWORK4" | "NETWORK5" => {
                    self.networks.push(value.to_string());
                }
                _ => {
                    self.warnings.push(format!(
                        "{}:{line}: ignoring unknown key {key}",
                        path.display()
                    ));
                }
            }
        }
        Ok(())
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse_file(text: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        config.apply_file(Path::new("test.conf"), text)?;
        Ok(config)
    }

    #[test]
    fn parses_a_typical_file() {
        let config = parse_file(
            "# srcrouted configuration\n\
             LOGLEVEL = 1\n\
             LOGCOLOR = off\n\
             LOGFILE = /var/log/srcrouted.log\n\
             NETWORK = eno1:2000\n\
             NETWORK = \"eno2:3000\"\n",
        )
        .unwrap();

        assert_eq!(config.log_level, 1);
        assert!(!config.log_color);
        assert_eq!(config.log_file.as_deref(), Some(Path::new("/var/log/srcrouted.log")));
        assert_eq!(config.networks, vec!["eno1:2000", "eno2:3000"]);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn accepts_legacy_slot_keys_and_sections() {
        let config = parse_file(
            "[general]\n\
             network1 = eno1:2000\n\
             NETWORK2 = 'eno2:3000'\n\
             Network = eno3:4000\n",
        )
        .unwrap();

        assert_eq!(config.networks, vec!["eno1:2000", "eno2:3000", "eno3:4000"]);
    }

    #[test]
    fn unknown_keys_warn_and_out_of_slot_keys_are_unknown() {
        let config = parse_file("NETWORK9 = eno9:2900\nFOO = bar\n").unwrap();
        assert!(config.networks.is_empty());
        assert_eq!(config.warnings.len(), 2);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(parse_file("LOGLEVEL = 9"), Err(ConfigError::Value { .. })));
        assert!(matches!(parse_file("LOGCOLOR = maybe"), Err(ConfigError::Value { .. })));
        assert!(matches!(parse_file("just some text"), Err(ConfigError::Syntax { .. })));
    }

    #[test]
    fn command_line_overrides_file_values() {
        let mut config = parse_file("LOGLEVEL = 1\nNETWORK = eno1:2000\n").unwrap();

        let cli = Cli::parse_from([
            "srcrouted",
            "--loglevel",
            "4",
            "--logcolor",
            "false",
            "--network",
            "eno2:3000",
        ]);
        config.apply_cli(&cli);

        assert_eq!(config.log_level, 4);
        assert!(!config.log_color);
        assert_eq!(config.networks, vec!["eno1:2000", "eno2:3000"]);
    }

    #[test]
    fn verbose_and_quiet_shortcuts() {
        let mut config = Config::default();
        config.apply_cli(&Cli::parse_from(["srcrouted", "-v"]));
        assert_eq!(config.log_level, 0);

        let mut config = Config::default();
        config.apply_cli(&Cli::parse_from(["srcrouted", "-q"]));
        assert_eq!(config.log_level, 3);
    }
}
