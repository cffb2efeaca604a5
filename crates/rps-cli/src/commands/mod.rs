//! Command handler modules for the rps CLI.
//!
//! Shared utilities used by multiple command paths live here.

pub mod resolve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use rps_config::{
    load_layered_yaml, report_unused_keys, ConfigConsumer, ControllerConfig, UnusedKeyPolicy,
};

/// Load the layered config (defaults when no paths are given) and warn about
/// keys the CLI never reads.
pub fn load_cli_config(paths: &[String]) -> Result<ControllerConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    let report = report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &report.unused_leaf_pointers {
        eprintln!("warning: config key {ptr} is not used by the CLI");
    }
    loaded.controller()
}

/// `--objects` wins over `store.objects_path`; one of them is required.
pub fn objects_path(flag: Option<String>, cfg: &ControllerConfig) -> Result<PathBuf> {
    flag.map(PathBuf::from)
        .or_else(|| cfg.store.objects_path.clone())
        .context("no object fixture: pass --objects or set store.objects_path")
}

/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
