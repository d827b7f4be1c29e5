use std::path::{Path, PathBuf};

/// Resolved directories for config, record stores, and logs.
#[derive(Debug, Clone)]
pub struct AppDirs {
    /// Holds board.toml
    pub config_dir: PathBuf,
    /// Holds the panel record stores
    pub data_dir: PathBuf,
    /// Holds log files
    pub state_dir: PathBuf,
}

impl AppDirs {
    /// Resolve directories. With an explicit root (the `-C` flag or a test
    /// directory) everything lives under it; otherwise the platform config/
    /// data/state dirs are used, each with a `syncboard` subdirectory.
    pub fn resolve(root: Option<&Path>) -> AppDirs {
        match root {
            Some(root) => AppDirs {
                config_dir: root.to_path_buf(),
                data_dir: root.join("data"),
                state_dir: root.join("state"),
            },
            None => {
                let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
                let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
                // No state dir on every platform; fall back to the data dir.
                let state = dirs::state_dir().unwrap_or_else(|| data.clone());
                AppDirs {
                    config_dir: config.join("syncboard"),
                    data_dir: data.join("syncboard"),
                    state_dir: state.join("syncboard"),
                }
            }
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("board.toml")
    }

    pub fn store_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_keeps_everything_under_it() {
        let dirs = AppDirs::resolve(Some(Path::new("/tmp/sb")));
        assert_eq!(dirs.config_file(), PathBuf::from("/tmp/sb/board.toml"));
        assert_eq!(dirs.store_file("goals.json"), PathBuf::from("/tmp/sb/data/goals.json"));
        assert_eq!(dirs.state_dir, PathBuf::from("/tmp/sb/state"));
    }
}
