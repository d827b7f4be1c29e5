use std::fs;
use std::path::{Path, PathBuf};

use crate::io::paths::AppDirs;
use crate::io::records::RecordStore;
use crate::model::config::BoardConfig;

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no board.toml at {0} (run `sy init` to create one)")]
    Missing(PathBuf),
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse board.toml: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Read and validate board.toml from the config directory.
pub fn read_config(dirs: &AppDirs) -> Result<BoardConfig, ConfigError> {
    let path = dirs.config_file();
    if !path.exists() {
        return Err(ConfigError::Missing(path));
    }
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    let config: BoardConfig = toml::from_str(&text)?;
    if let Some(problem) = validate(&config).into_iter().next() {
        return Err(ConfigError::Invalid(problem));
    }
    Ok(config)
}

/// Structural problems in a parsed config. Empty means valid.
pub fn validate(config: &BoardConfig) -> Vec<String> {
    let mut problems = Vec::new();
    if config.panels.is_empty() {
        problems.push("no panels configured".to_string());
    }
    for (i, panel) in config.panels.iter().enumerate() {
        if panel.id.is_empty() {
            problems.push(format!("panel #{} has an empty id", i + 1));
        }
        if panel.file.is_empty() {
            problems.push(format!("panel '{}' has an empty file", panel.id));
        }
        if config.panels[..i].iter().any(|p| p.id == panel.id) {
            problems.push(format!("duplicate panel id '{}'", panel.id));
        }
    }
    let period_panels: Vec<&str> = config
        .panels
        .iter()
        .filter(|p| p.period.is_some())
        .map(|p| p.id.as_str())
        .collect();
    if period_panels.len() > 1 {
        problems.push(format!(
            "more than one period panel: {}",
            period_panels.join(", ")
        ));
    }
    problems
}

/// Problems found when probing the panel record stores.
pub fn check_stores(dirs: &AppDirs, config: &BoardConfig) -> Vec<String> {
    let mut problems = Vec::new();
    for panel in &config.panels {
        let store = RecordStore::new(dirs.store_file(&panel.file));
        if let Err(e) = store.load() {
            problems.push(format!("panel '{}': {}", panel.id, e));
        }
    }
    problems
}

/// The scaffolded board.toml written by `sy init`.
pub const DEFAULT_CONFIG: &str = r##"# syncboard configuration
# Values shown are the defaults.

[board]
refresh_secs = 60
debounce_ms = 500
undo_limit = 15

[[panels]]
id = "goals"
title = "Weekly Goals"
file = "goals.json"
period = "weekly"
caps = ["create", "complete", "abandon", "move", "delete"]

[[panels]]
id = "tasks"
title = "Tasks"
file = "tasks.json"
caps = ["create", "complete", "defer", "delete", "move"]

[[panels]]
id = "issues"
title = "Issues"
file = "issues.json"
groups = ["Backlog", "Todo", "In Progress", "In Review"]
caps = ["create", "complete", "setstate", "assign", "move"]

[ui.state_labels]
"In Progress" = "progress"
"In Review" = "review"

# [ui.colors]
# highlight = "#FB4196"
"##;

/// Write the default config and empty record stores. Refuses to overwrite
/// an existing board.toml unless `force` is set.
pub fn scaffold(dirs: &AppDirs, force: bool) -> Result<PathBuf, ConfigError> {
    let path = dirs.config_file();
    if path.exists() && !force {
        return Err(ConfigError::Invalid(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    let write_err = |path: &Path, e: std::io::Error| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    };
    fs::create_dir_all(&dirs.config_dir).map_err(|e| write_err(&dirs.config_dir, e))?;
    fs::create_dir_all(&dirs.data_dir).map_err(|e| write_err(&dirs.data_dir, e))?;
    fs::write(&path, DEFAULT_CONFIG).map_err(|e| write_err(&path, e))?;

    let config: BoardConfig = toml::from_str(DEFAULT_CONFIG)?;
    for panel in &config.panels {
        let store_path = dirs.store_file(&panel.file);
        if !store_path.exists() {
            fs::write(&store_path, "[]").map_err(|e| write_err(&store_path, e))?;
        }
    }
    Ok(path)
}
