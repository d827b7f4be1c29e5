use chrono::NaiveDate;

use crate::model::command::PanelId;
use crate::model::row::RowKey;
use crate::remote::source::RemoteOp;

/// A confirmed action and everything its inverse needs.
///
/// Pushed only after the remote confirmed the forward action; popped and
/// executed at most once. Every new variant must ship its inverse in
/// `inverse_op` — the match is exhaustive on purpose.
#[derive(Debug, Clone)]
pub enum UndoableAction {
    /// A row was completed.
    Complete {
        panel: PanelId,
        key: RowKey,
        description: String,
    },
    /// A row's due date was pushed out.
    Defer {
        panel: PanelId,
        key: RowKey,
        previous_due: Option<NaiveDate>,
        description: String,
    },
    /// A row was reordered within its group.
    Reorder {
        panel: PanelId,
        key: RowKey,
        previous_order: f64,
        description: String,
    },
    /// A row's state (group) was changed.
    SetState {
        panel: PanelId,
        key: RowKey,
        previous_state: String,
        description: String,
    },
    /// A row's assignee was changed.
    Assign {
        panel: PanelId,
        key: RowKey,
        previous_assignee: Option<String>,
        description: String,
    },
    /// A row was abandoned.
    Abandon {
        panel: PanelId,
        key: RowKey,
        description: String,
    },
}

impl UndoableAction {
    pub fn description(&self) -> &str {
        match self {
            UndoableAction::Complete { description, .. }
            | UndoableAction::Defer { description, .. }
            | UndoableAction::Reorder { description, .. }
            | UndoableAction::SetState { description, .. }
            | UndoableAction::Assign { description, .. }
            | UndoableAction::Abandon { description, .. } => description,
        }
    }

    pub fn panel(&self) -> &PanelId {
        match self {
            UndoableAction::Complete { panel, .. }
            | UndoableAction::Defer { panel, .. }
            | UndoableAction::Reorder { panel, .. }
            | UndoableAction::SetState { panel, .. }
            | UndoableAction::Assign { panel, .. }
            | UndoableAction::Abandon { panel, .. } => panel,
        }
    }

    pub fn key(&self) -> &RowKey {
        match self {
            UndoableAction::Complete { key, .. }
            | UndoableAction::Defer { key, .. }
            | UndoableAction::Reorder { key, .. }
            | UndoableAction::SetState { key, .. }
            | UndoableAction::Assign { key, .. }
            | UndoableAction::Abandon { key, .. } => key,
        }
    }

    /// The remote operation that reverses this action.
    pub fn inverse_op(&self) -> RemoteOp {
        match self {
            UndoableAction::Complete { .. } => RemoteOp::Reopen,
            UndoableAction::Defer { previous_due, .. } => RemoteOp::SetDue {
                date: *previous_due,
            },
            UndoableAction::Reorder { previous_order, .. } => RemoteOp::SetOrder {
                order: *previous_order,
            },
            UndoableAction::SetState { previous_state, .. } => RemoteOp::SetState {
                state: previous_state.clone(),
            },
            UndoableAction::Assign {
                previous_assignee, ..
            } => RemoteOp::Assign {
                assignee: previous_assignee.clone(),
            },
            UndoableAction::Abandon { .. } => RemoteOp::Restore,
        }
    }
}

/// Bounded LIFO of inverse-action descriptors. The oldest action is evicted
/// silently when the bound is exceeded.
#[derive(Debug)]
pub struct UndoStack {
    stack: Vec<UndoableAction>,
    limit: usize,
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        UndoStack {
            stack: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, action: UndoableAction) {
        self.stack.push(action);
        if self.stack.len() > self.limit {
            self.stack.drain(..self.stack.len() - self.limit);
        }
    }

    /// Remove and return the most recent action, or None when empty.
    pub fn pop(&mut self) -> Option<UndoableAction> {
        self.stack.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(n: usize) -> UndoableAction {
        UndoableAction::Complete {
            panel: PanelId::new("tasks"),
            key: RowKey::new(n.to_string()),
            description: format!("Complete: task {}", n),
        }
    }

    // ── stack discipline ───────────────────────────────────────────

    #[test]
    fn new_stack_is_empty() {
        let mut stack = UndoStack::new(15);
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
    }

    #[test]
    fn pop_order_is_reverse_of_push_order() {
        let mut stack = UndoStack::new(15);
        for n in 0..3 {
            stack.push(complete(n));
        }
        for n in (0..3).rev() {
            let action = stack.pop().unwrap();
            assert_eq!(action.key(), &RowKey::new(n.to_string()));
        }
        assert!(stack.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut stack = UndoStack::new(15);
        for n in 0..16 {
            stack.push(complete(n));
        }
        assert_eq!(stack.len(), 15);
        // Most recent 15 remain: 15 down to 1.
        for n in (1..16).rev() {
            assert_eq!(stack.pop().unwrap().key(), &RowKey::new(n.to_string()));
        }
        assert!(stack.pop().is_none());
    }

    // ── inverses ───────────────────────────────────────────────────

    #[test]
    fn every_variant_has_an_inverse() {
        let panel = PanelId::new("p");
        let key = RowKey::new("1");
        let desc = String::new();
        let cases: Vec<(UndoableAction, RemoteOp)> = vec![
            (
                UndoableAction::Complete {
                    panel: panel.clone(),
                    key: key.clone(),
                    description: desc.clone(),
                },
                RemoteOp::Reopen,
            ),
            (
                UndoableAction::Defer {
                    panel: panel.clone(),
                    key: key.clone(),
                    previous_due: Some("2025-06-02".parse().unwrap()),
                    description: desc.clone(),
                },
                RemoteOp::SetDue {
                    date: Some("2025-06-02".parse().unwrap()),
                },
            ),
            (
                UndoableAction::Reorder {
                    panel: panel.clone(),
                    key: key.clone(),
                    previous_order: 2.5,
                    description: desc.clone(),
                },
                RemoteOp::SetOrder { order: 2.5 },
            ),
            (
                UndoableAction::SetState {
                    panel: panel.clone(),
                    key: key.clone(),
                    previous_state: "Todo".into(),
                    description: desc.clone(),
                },
                RemoteOp::SetState {
                    state: "Todo".into(),
                },
            ),
            (
                UndoableAction::Assign {
                    panel: panel.clone(),
                    key: key.clone(),
                    previous_assignee: None,
                    description: desc.clone(),
                },
                RemoteOp::Assign { assignee: None },
            ),
            (
                UndoableAction::Abandon {
                    panel,
                    key,
                    description: desc,
                },
                RemoteOp::Restore,
            ),
        ];
        for (action, expected) in cases {
            assert_eq!(action.inverse_op(), expected);
        }
    }
}
