pub mod command;
pub mod config;
pub mod row;

pub use command::{MoveDir, Notice, PanelId, Severity, UserCommand};
pub use config::{BoardConfig, BoardSettings, Capability, PanelConfig, PeriodKind, UiConfig};
pub use row::{Row, RowFields, RowKey};
