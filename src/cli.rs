//! Command-line interface parsing for homedash
//!
//! This module handles parsing of CLI arguments using clap and resolves them
//! into the storage and logging choices used at startup.

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::FileStorage;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// `--no-cache` and `--cache-dir` both given
    #[error("--no-cache cannot be combined with --cache-dir")]
    ConflictingCacheFlags,
}

/// homedash - a terminal home dashboard
#[derive(Parser, Debug)]
#[command(name = "homedash")]
#[command(about = "Home dashboard: weather, calendar, meals, energy, air purifier and devices")]
#[command(version)]
pub struct Cli {
    /// Path to the YAML config file
    ///
    /// Defaults to ./homedash.yaml, then $XDG_CONFIG_HOME/homedash/config.yaml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding cached card data
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Keep cached data in memory only, nothing survives a restart
    #[arg(long)]
    pub no_cache: bool,

    /// Write logs to this file instead of <cache dir>/homedash.log
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where cached entries live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageChoice {
    /// Files under this directory
    Dir(PathBuf),
    /// In-memory only
    Memory,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    pub config_path: Option<PathBuf>,
    pub storage: StorageChoice,
    /// `None` when there is nowhere sensible to log
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Arguments
    /// * `cli` - The parsed CLI struct
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with storage and log locations resolved
    /// * `Err(CliError)` if the flags contradict each other
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        Self::resolve(cli, FileStorage::default_dir())
    }

    fn resolve(cli: &Cli, default_dir: Option<PathBuf>) -> Result<Self, CliError> {
        if cli.no_cache && cli.cache_dir.is_some() {
            return Err(CliError::ConflictingCacheFlags);
        }

        let cache_dir = cli.cache_dir.clone().or(default_dir);
        let log_file = cli
            .log_file
            .clone()
            .or_else(|| cache_dir.as_ref().map(|dir| dir.join("homedash.log")));

        let storage = match (cli.no_cache, cache_dir) {
            (false, Some(dir)) => StorageChoice::Dir(dir),
            _ => StorageChoice::Memory,
        };

        Ok(StartupConfig {
            config_path: cli.config.clone(),
            storage,
            log_file,
            verbose: cli.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(args: &[&str]) -> Result<StartupConfig, CliError> {
        let cli = Cli::parse_from(std::iter::once("homedash").chain(args.iter().copied()));
        StartupConfig::resolve(&cli, Some(PathBuf::from("/home/me/.cache/homedash")))
    }

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["homedash"]);
        assert!(cli.config.is_none());
        assert!(cli.cache_dir.is_none());
        assert!(!cli.no_cache);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_all_flags() {
        let cli = Cli::parse_from([
            "homedash",
            "--config",
            "dash.yaml",
            "--cache-dir",
            "/tmp/dash",
            "--log-file",
            "/tmp/dash.log",
            "-v",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("dash.yaml")));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/dash")));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/dash.log")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_startup_config_defaults_to_cache_dir() {
        let config = resolve(&[]).unwrap();
        assert_eq!(
            config.storage,
            StorageChoice::Dir(PathBuf::from("/home/me/.cache/homedash"))
        );
        assert_eq!(
            config.log_file,
            Some(PathBuf::from("/home/me/.cache/homedash/homedash.log"))
        );
    }

    #[test]
    fn test_startup_config_explicit_cache_dir() {
        let config = resolve(&["--cache-dir", "/tmp/dash"]).unwrap();
        assert_eq!(config.storage, StorageChoice::Dir(PathBuf::from("/tmp/dash")));
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/dash/homedash.log")));
    }

    #[test]
    fn test_startup_config_no_cache_still_logs() {
        let config = resolve(&["--no-cache"]).unwrap();
        assert_eq!(config.storage, StorageChoice::Memory);
        assert!(config.log_file.is_some());
    }

    #[test]
    fn test_startup_config_without_default_dir() {
        let cli = Cli::parse_from(["homedash"]);
        let config = StartupConfig::resolve(&cli, None).unwrap();
        assert_eq!(config.storage, StorageChoice::Memory);
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_no_cache_conflicts_with_cache_dir() {
        let err = resolve(&["--no-cache", "--cache-dir", "/tmp/dash"]).unwrap_err();
        assert!(err.to_string().contains("--no-cache"));
    }
}
