use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration from board.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default)]
    pub board: BoardSettings,
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSettings {
    /// Default: see the scaffolded board.toml
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    /// Default: see the scaffolded board.toml
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Default: see the scaffolded board.toml
    #[serde(default = "default_undo_limit")]
    pub undo_limit: usize,
}

impl Default for BoardSettings {
    fn default() -> Self {
        BoardSettings {
            refresh_secs: 60,
            debounce_ms: 500,
            undo_limit: 15,
        }
    }
}

fn default_refresh_secs() -> u64 {
    60
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_undo_limit() -> usize {
    15
}

/// What operations a panel supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Create,
    Complete,
    Defer,
    Delete,
    Move,
    Setstate,
    Assign,
    Abandon,
}

/// How often the review panel's period rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub id: String,
    pub title: String,
    /// Record store file, relative to the data directory.
    pub file: String,
    /// Group display order. Rows in groups not listed here sort after, by
    /// group name.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub caps: Vec<Capability>,
    /// If set, this panel partitions rows by period and gets the rollover
    /// review behavior. At most one panel may set this.
    #[serde(default)]
    pub period: Option<PeriodKind>,
}

impl PanelConfig {
    pub fn supports(&self, cap: Capability) -> bool {
        self.caps.contains(&cap)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    /// Hex color overrides, e.g. `highlight = "#FB4196"`.
    #[serde(default)]
    pub colors: HashMap<String, String>,
    /// Short display labels for long state names (e.g. "In Progress" =
    /// "progress").
    #[serde(default)]
    pub state_labels: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let s = BoardSettings::default();
        assert_eq!(s.refresh_secs, 60);
        assert_eq!(s.debounce_ms, 500);
        assert_eq!(s.undo_limit, 15);
    }

    #[test]
    fn minimal_panel_parses() {
        let cfg: BoardConfig = toml::from_str(
            r#"
[[panels]]
id = "tasks"
title = "Tasks"
file = "tasks.json"
caps = ["create", "complete", "defer", "move"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.panels.len(), 1);
        assert_eq!(cfg.board.refresh_secs, 60);
        let p = &cfg.panels[0];
        assert!(p.supports(Capability::Create));
        assert!(!p.supports(Capability::Assign));
        assert!(p.period.is_none());
    }

    #[test]
    fn period_kind_parses() {
        let cfg: BoardConfig = toml::from_str(
            r#"
[[panels]]
id = "goals"
title = "Weekly Goals"
file = "goals.json"
period = "weekly"
"#,
        )
        .unwrap();
        assert_eq!(cfg.panels[0].period, Some(PeriodKind::Weekly));
    }
}
