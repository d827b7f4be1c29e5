use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::model::command::PanelId;
use crate::model::row::RowKey;

/// The single deferred reorder write for one collection.
///
/// `order_before` is the moved row's key before the first move of the burst;
/// consecutive reschedules of the same row keep it, so the eventual undo
/// restores the position the user started from.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub key: RowKey,
    /// Group the row belonged to when scheduled; a mismatch at fire time
    /// means the write is stale.
    pub group: String,
    pub order_before: f64,
    deadline: Instant,
}

impl PendingWrite {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Per-collection timer table coalescing rapid reorders into one deferred
/// write. Only the latest scheduled payload survives; earlier ones for the
/// same collection are discarded, never double-written.
#[derive(Debug)]
pub struct DebouncedWriteback {
    quiet: Duration,
    pending: HashMap<PanelId, PendingWrite>,
}

impl DebouncedWriteback {
    pub fn new(quiet: Duration) -> Self {
        DebouncedWriteback {
            quiet,
            pending: HashMap::new(),
        }
    }

    /// Schedule a write for `key`, replacing any pending write for the panel
    /// and restarting the quiet interval. If the pending write already
    /// targets the same row, its `order_before` is preserved so the burst
    /// counts as one move for undo purposes.
    pub fn schedule(
        &mut self,
        panel: &PanelId,
        key: RowKey,
        group: String,
        order_before: f64,
        now: Instant,
    ) {
        let order_before = match self.pending.get(panel) {
            Some(prior) if prior.key == key => prior.order_before,
            _ => order_before,
        };
        self.pending.insert(
            panel.clone(),
            PendingWrite {
                key,
                group,
                order_before,
                deadline: now + self.quiet,
            },
        );
    }

    /// Cancel the panel's pending write. Idempotent.
    pub fn cancel(&mut self, panel: &PanelId) -> Option<PendingWrite> {
        self.pending.remove(panel)
    }

    /// Rewrite the pending target after a temp→real key promotion.
    pub fn retarget(&mut self, panel: &PanelId, old: &RowKey, new: &RowKey) {
        if let Some(write) = self.pending.get_mut(panel)
            && write.key == *old
        {
            write.key = new.clone();
        }
    }

    pub fn pending_for(&self, panel: &PanelId) -> Option<&PendingWrite> {
        self.pending.get(panel)
    }

    /// Drain every write whose quiet interval has elapsed.
    pub fn due(&mut self, now: Instant) -> Vec<(PanelId, PendingWrite)> {
        let fired: Vec<PanelId> = self
            .pending
            .iter()
            .filter(|(_, w)| w.deadline <= now)
            .map(|(p, _)| p.clone())
            .collect();
        fired
            .into_iter()
            .filter_map(|p| self.pending.remove(&p).map(|w| (p, w)))
            .collect()
    }

    /// Earliest pending deadline, for event-loop timeout sizing.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|w| w.deadline).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(500);

    fn panel(id: &str) -> PanelId {
        PanelId::new(id)
    }

    #[test]
    fn schedule_then_due_after_quiet_window() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 1.0, t0);
        assert!(wb.due(t0 + Duration::from_millis(499)).is_empty());
        let fired = wb.due(t0 + QUIET);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1.key, RowKey::new("1"));
        // Drained: nothing fires twice.
        assert!(wb.due(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn reschedule_replaces_payload_and_restarts_window() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        for n in 0..5 {
            let at = t0 + Duration::from_millis(n * 100);
            wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 1.0, at);
        }
        // Quiet window counts from the fifth call.
        assert!(wb.due(t0 + Duration::from_millis(800)).is_empty());
        let fired = wb.due(t0 + Duration::from_millis(900));
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn same_row_burst_keeps_first_order_before() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 3.0, t0);
        wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 99.0, t0 + Duration::from_millis(100));
        let fired = wb.due(t0 + Duration::from_secs(1));
        assert_eq!(fired[0].1.order_before, 3.0);
    }

    #[test]
    fn different_row_replaces_order_before() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 3.0, t0);
        wb.schedule(&panel("tasks"), RowKey::new("2"), "todo".into(), 7.0, t0);
        let fired = wb.due(t0 + Duration::from_secs(1));
        assert_eq!(fired[0].1.key, RowKey::new("2"));
        assert_eq!(fired[0].1.order_before, 7.0);
    }

    #[test]
    fn panels_debounce_independently() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 1.0, t0);
        wb.schedule(&panel("issues"), RowKey::new("9"), "todo".into(), 2.0, t0);
        let fired = wb.due(t0 + Duration::from_secs(1));
        assert_eq!(fired.len(), 2);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("tasks"), RowKey::new("1"), "todo".into(), 1.0, t0);
        assert!(wb.cancel(&panel("tasks")).is_some());
        assert!(wb.cancel(&panel("tasks")).is_none());
        assert!(wb.due(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn retarget_rewrites_matching_key_only() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("tasks"), RowKey::new("temp-1"), "todo".into(), 1.0, t0);
        wb.retarget(&panel("tasks"), &RowKey::new("temp-2"), &RowKey::new("901"));
        assert_eq!(
            wb.pending_for(&panel("tasks")).unwrap().key,
            RowKey::new("temp-1")
        );
        wb.retarget(&panel("tasks"), &RowKey::new("temp-1"), &RowKey::new("900"));
        assert_eq!(
            wb.pending_for(&panel("tasks")).unwrap().key,
            RowKey::new("900")
        );
    }

    #[test]
    fn next_deadline_is_earliest() {
        let mut wb = DebouncedWriteback::new(QUIET);
        let t0 = Instant::now();
        wb.schedule(&panel("a"), RowKey::new("1"), "todo".into(), 1.0, t0);
        wb.schedule(&panel("b"), RowKey::new("2"), "todo".into(), 1.0, t0 + Duration::from_millis(100));
        assert_eq!(wb.next_deadline(), Some(t0 + QUIET));
    }
}
