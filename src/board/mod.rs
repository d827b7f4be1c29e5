pub mod controller;
pub mod undo;

pub use controller::{Controller, Panel, ReviewState};
pub use undo::{UndoStack, UndoableAction};
