use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::row::RowKey;

/// Identifier of a configured panel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(String);

impl PanelId {
    pub fn new(id: impl Into<String>) -> Self {
        PanelId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelId {
    fn from(s: &str) -> Self {
        PanelId(s.to_string())
    }
}

/// Direction for in-group reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDir {
    Up,
    Down,
}

/// A user command routed through the controller.
///
/// Commands carry the target panel explicitly; the row they act on is the
/// panel's current selection, looked up by key at dispatch time.
#[derive(Debug, Clone)]
pub enum UserCommand {
    /// Create a row in the panel, inserted at the selection position.
    Create {
        panel: PanelId,
        title: String,
        due: Option<chrono::NaiveDate>,
    },
    /// Mark the selected row done.
    Complete { panel: PanelId },
    /// Push the selected row's due date to the next working day.
    Defer { panel: PanelId },
    /// Delete the selected row. Not undoable.
    Delete { panel: PanelId },
    /// Move the selected row within its group.
    Move { panel: PanelId, dir: MoveDir },
    /// Set the selected row's state (and therefore its group).
    SetState { panel: PanelId, state: String },
    /// Assign or unassign the selected row.
    Assign {
        panel: PanelId,
        assignee: Option<String>,
    },
    /// Abandon the selected row, or restore it if already abandoned.
    Abandon { panel: PanelId },
    /// Undo the most recent undoable action.
    Undo,
    /// Refresh every panel from its source.
    Refresh,
    /// Dismiss the period-review prompt, returning the review panel to
    /// normal mode.
    DismissReview,
    /// Move the panel's selection to the row with this key.
    Select { panel: PanelId, key: Option<RowKey> },
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A message surfaced to the user in the status row.
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            text: text.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Notice {
            text: text.into(),
            severity: Severity::Warning,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            text: text.into(),
            severity: Severity::Error,
        }
    }
}
