use crate::model::row::{Row, RowKey};

/// Error type for collection operations
#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("row not found: {0}")]
    NotFound(RowKey),
    #[error("row {0} has a mutation in flight")]
    Busy(RowKey),
}

/// Outcome of an in-group move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// Index of the row after the swap.
    pub new_index: usize,
    /// The row's order key before the swap. Order keys are not touched by
    /// the move itself; the debounced write-back allocates the new key.
    pub order_before: f64,
}

/// In-memory ordered rows for one panel.
///
/// The `Vec` order is the display order and is authoritative between
/// refreshes; order keys are reconciled against it when a reorder write
/// fires or a fresh snapshot arrives.
#[derive(Debug, Default)]
pub struct OptimisticCollection {
    rows: Vec<Row>,
    /// Group display order; groups not listed sort after, by name.
    group_order: Vec<String>,
}

impl OptimisticCollection {
    pub fn new(group_order: Vec<String>) -> Self {
        OptimisticCollection {
            rows: Vec::new(),
            group_order,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.rows.iter().find(|r| &r.key == key)
    }

    pub fn position(&self, key: &RowKey) -> Option<usize> {
        self.rows.iter().position(|r| &r.key == key)
    }

    fn group_rank(&self, group: &str) -> (usize, String) {
        match self.group_order.iter().position(|g| g == group) {
            Some(i) => (i, String::new()),
            None => (self.group_order.len(), group.to_string()),
        }
    }

    /// Replace the collection with a fresh snapshot.
    ///
    /// Rows are sorted by (group rank, order key). Locally created rows that
    /// are still pending under a temp key survive a snapshot that does not
    /// contain them, re-inserted at their prior index clamped to bounds.
    /// Every other local state is superseded.
    pub fn replace_all(&mut self, mut rows: Vec<Row>) {
        let kept: Vec<(usize, Row)> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.pending && r.key.is_temp())
            .filter(|(_, r)| !rows.iter().any(|fresh| fresh.key == r.key))
            .map(|(i, r)| (i, r.clone()))
            .collect();

        rows.sort_by(|a, b| {
            let ka = self.group_rank(&a.group);
            let kb = self.group_rank(&b.group);
            ka.cmp(&kb)
                .then(a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal))
        });

        self.rows = rows;
        for (index, row) in kept {
            let at = index.min(self.rows.len());
            self.rows.insert(at, row);
        }
    }

    /// Insert a locally created row at `index` (clamped), marked pending.
    pub fn insert_pending(&mut self, index: usize, mut row: Row) {
        row.pending = true;
        let at = index.min(self.rows.len());
        self.rows.insert(at, row);
    }

    /// Apply `transform` to the row synchronously and mark it pending.
    /// Returns the pre-mutation row for rollback.
    ///
    /// Rejects rows that already have a mutation in flight; per-row
    /// serialization is enforced here, before any state changes.
    pub fn mutate(
        &mut self,
        key: &RowKey,
        transform: impl FnOnce(&mut Row),
    ) -> Result<Row, CollectionError> {
        let row = self
            .rows
            .iter_mut()
            .find(|r| &r.key == key)
            .ok_or_else(|| CollectionError::NotFound(key.clone()))?;
        if row.pending {
            return Err(CollectionError::Busy(key.clone()));
        }
        let snapshot = row.clone();
        transform(row);
        row.pending = true;
        Ok(snapshot)
    }

    /// Clear `pending` after the remote confirmed the mutation.
    pub fn confirm(&mut self, key: &RowKey) -> bool {
        match self.rows.iter_mut().find(|r| &r.key == key) {
            Some(row) => {
                row.pending = false;
                true
            }
            None => false,
        }
    }

    /// Restore the pre-mutation state after the remote rejected or failed.
    /// The snapshot arrives with `pending` already false.
    pub fn rollback(&mut self, key: &RowKey, snapshot: Row) {
        if let Some(row) = self.rows.iter_mut().find(|r| &r.key == key) {
            *row = snapshot;
            row.pending = false;
        }
    }

    /// Rewrite a temp key to its confirmed identity and clear `pending`.
    /// Returns false if the temp row is gone (e.g. superseded by a refresh
    /// that already carried the real row).
    pub fn promote(&mut self, temp: &RowKey, real: RowKey, remote_id: String) -> bool {
        match self.rows.iter_mut().find(|r| &r.key == temp) {
            Some(row) => {
                row.key = real;
                row.remote_id = Some(remote_id);
                row.pending = false;
                true
            }
            None => false,
        }
    }

    /// Remove a row, returning its index and the row itself so a failed
    /// remote delete can reinsert it.
    pub fn remove(&mut self, key: &RowKey) -> Option<(usize, Row)> {
        let index = self.position(key)?;
        Some((index, self.rows.remove(index)))
    }

    /// Reinsert a row removed optimistically, at its old index clamped.
    pub fn reinsert(&mut self, index: usize, row: Row) {
        let at = index.min(self.rows.len());
        self.rows.insert(at, row);
    }

    /// Swap the row one step up or down within its group. Returns None if
    /// the row is missing, at the group edge, or the neighbor belongs to a
    /// different group (moves never cross groups).
    pub fn move_row(&mut self, key: &RowKey, delta: isize) -> Option<MoveOutcome> {
        let index = self.position(key)?;
        let target = index.checked_add_signed(delta)?;
        if target >= self.rows.len() {
            return None;
        }
        if self.rows[index].group != self.rows[target].group {
            return None;
        }
        let order_before = self.rows[index].order;
        self.rows.swap(index, target);
        Some(MoveOutcome {
            new_index: target,
            order_before,
        })
    }

    /// Order keys of the row's group in display order, with the row's
    /// position within that slice.
    pub fn group_orders(&self, key: &RowKey) -> Option<(Vec<f64>, usize)> {
        let row = self.get(key)?;
        let group = row.group.clone();
        let mut orders = Vec::new();
        let mut pos = None;
        for r in self.rows.iter().filter(|r| r.group == group) {
            if r.key == *key {
                pos = Some(orders.len());
            }
            orders.push(r.order);
        }
        Some((orders, pos?))
    }

    /// Move a row to the position its (group rank, order key) pair calls
    /// for, leaving every other row in place. Used after a state change
    /// regroups a row or an undo rewrites its order key. Returns the row's
    /// new index.
    pub fn reposition(&mut self, key: &RowKey) -> Option<usize> {
        let (_, row) = self.remove(key)?;
        let rank = self.group_rank(&row.group);
        let pos = self
            .rows
            .iter()
            .position(|r| {
                let other = self.group_rank(&r.group);
                other > rank || (other == rank && r.group == row.group && r.order > row.order)
            })
            .unwrap_or(self.rows.len());
        self.rows.insert(pos, row);
        Some(pos)
    }

    /// Set a row's order key directly (reorder write-back or its undo).
    pub fn set_order(&mut self, key: &RowKey, order: f64) -> bool {
        match self.rows.iter_mut().find(|r| &r.key == key) {
            Some(row) => {
                row.order = order;
                true
            }
            None => false,
        }
    }

    /// Re-sort a single group by order key, leaving other groups' relative
    /// positions untouched. Used after an undo rewrites an order key.
    pub fn resort_group(&mut self, group: &str) {
        let mut members: Vec<Row> = Vec::new();
        let mut slots: Vec<usize> = Vec::new();
        for (i, r) in self.rows.iter().enumerate() {
            if r.group == group {
                slots.push(i);
            }
        }
        for i in slots.iter().rev() {
            members.push(self.rows.remove(*i));
        }
        members.sort_by(|a, b| a.order.partial_cmp(&b.order).unwrap_or(std::cmp::Ordering::Equal));
        for (slot, row) in slots.into_iter().zip(members) {
            self.rows.insert(slot, row);
        }
    }

    /// Assign fresh evenly spaced order keys to the row's group, in current
    /// display order. Returns (key, new order) pairs for the write-back.
    pub fn renumber_group(&mut self, group: &str) -> Vec<(RowKey, f64)> {
        let count = self.rows.iter().filter(|r| r.group == group).count();
        let fresh = super::order::renumber(count);
        let mut out = Vec::with_capacity(count);
        let mut next = fresh.into_iter();
        for row in self.rows.iter_mut().filter(|r| r.group == group) {
            if let Some(order) = next.next() {
                row.order = order;
                out.push((row.key.clone(), order));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row::RowFields;
    use pretty_assertions::assert_eq;

    fn row(key: &str, group: &str, order: f64) -> Row {
        Row::new(RowKey::new(key), group, order, RowFields::titled(key))
    }

    fn keys(c: &OptimisticCollection) -> Vec<&str> {
        c.rows().iter().map(|r| r.key.as_str()).collect()
    }

    fn collection(rows: Vec<Row>) -> OptimisticCollection {
        let mut c = OptimisticCollection::new(vec!["todo".into(), "progress".into()]);
        c.replace_all(rows);
        c
    }

    // ── replace_all ────────────────────────────────────────────────

    #[test]
    fn replace_sorts_by_group_then_order() {
        let c = collection(vec![
            row("b", "progress", 1.0),
            row("a", "todo", 2.0),
            row("c", "todo", 1.0),
        ]);
        assert_eq!(keys(&c), vec!["c", "a", "b"]);
    }

    #[test]
    fn unknown_groups_sort_after_known_by_name() {
        let c = collection(vec![
            row("z", "zebra", 1.0),
            row("a", "apple", 1.0),
            row("t", "todo", 1.0),
        ]);
        assert_eq!(keys(&c), vec!["t", "a", "z"]);
    }

    #[test]
    fn pending_temp_row_survives_refresh() {
        let mut c = collection(vec![row("1", "todo", 1.0), row("2", "todo", 2.0)]);
        c.insert_pending(1, row("temp-1", "todo", 1.5));
        c.replace_all(vec![row("1", "todo", 1.0), row("2", "todo", 2.0)]);
        assert_eq!(keys(&c), vec!["1", "temp-1", "2"]);
        assert!(c.get(&RowKey::new("temp-1")).unwrap().pending);
    }

    #[test]
    fn temp_row_present_in_snapshot_is_not_duplicated() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        c.insert_pending(1, row("temp-1", "todo", 1.5));
        // A snapshot that already carries the temp key (source echoed it).
        c.replace_all(vec![row("1", "todo", 1.0), row("temp-1", "todo", 1.5)]);
        assert_eq!(keys(&c), vec!["1", "temp-1"]);
    }

    #[test]
    fn pending_real_row_is_superseded() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        c.mutate(&RowKey::new("1"), |r| r.fields.done = true).unwrap();
        c.replace_all(vec![row("1", "todo", 1.0)]);
        let r = c.get(&RowKey::new("1")).unwrap();
        assert!(!r.fields.done);
        assert!(!r.pending);
    }

    // ── mutate / confirm / rollback ────────────────────────────────

    #[test]
    fn mutate_marks_pending_and_returns_prior_state() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        let key = RowKey::new("1");
        let snapshot = c.mutate(&key, |r| r.fields.done = true).unwrap();
        assert!(!snapshot.fields.done);
        let r = c.get(&key).unwrap();
        assert!(r.fields.done);
        assert!(r.pending);
    }

    #[test]
    fn confirm_clears_pending_and_keeps_transform() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        let key = RowKey::new("1");
        c.mutate(&key, |r| r.fields.done = true).unwrap();
        assert!(c.confirm(&key));
        let r = c.get(&key).unwrap();
        assert!(r.fields.done);
        assert!(!r.pending);
    }

    #[test]
    fn rollback_restores_prior_state() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        let key = RowKey::new("1");
        let snapshot = c.mutate(&key, |r| r.fields.done = true).unwrap();
        c.rollback(&key, snapshot);
        let r = c.get(&key).unwrap();
        assert!(!r.fields.done);
        assert!(!r.pending);
    }

    #[test]
    fn mutate_missing_row_is_not_found() {
        let mut c = collection(vec![]);
        let err = c.mutate(&RowKey::new("ghost"), |_| {}).unwrap_err();
        assert!(matches!(err, CollectionError::NotFound(_)));
    }

    #[test]
    fn second_mutation_on_pending_row_is_rejected() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        let key = RowKey::new("1");
        c.mutate(&key, |r| r.fields.done = true).unwrap();
        let err = c.mutate(&key, |r| r.fields.done = false).unwrap_err();
        assert!(matches!(err, CollectionError::Busy(_)));
        // The first transform is untouched.
        assert!(c.get(&key).unwrap().fields.done);
    }

    // ── promotion ──────────────────────────────────────────────────

    #[test]
    fn promote_rewrites_key_and_clears_pending() {
        let mut c = collection(vec![row("1", "todo", 1.0)]);
        c.insert_pending(1, row("temp-1", "todo", 2.0));
        let temp = RowKey::new("temp-1");
        assert!(c.promote(&temp, RowKey::new("900"), "900".into()));
        assert!(c.get(&temp).is_none());
        let r = c.get(&RowKey::new("900")).unwrap();
        assert_eq!(r.remote_id.as_deref(), Some("900"));
        assert!(!r.pending);
    }

    #[test]
    fn promote_missing_temp_row_reports_false() {
        let mut c = collection(vec![]);
        assert!(!c.promote(&RowKey::new("temp-1"), RowKey::new("900"), "900".into()));
    }

    // ── moves ──────────────────────────────────────────────────────

    #[test]
    fn move_swaps_within_group() {
        let mut c = collection(vec![
            row("1", "todo", 1.0),
            row("2", "todo", 2.0),
            row("3", "todo", 3.0),
        ]);
        let outcome = c.move_row(&RowKey::new("2"), -1).unwrap();
        assert_eq!(outcome.new_index, 0);
        assert_eq!(outcome.order_before, 2.0);
        assert_eq!(keys(&c), vec!["2", "1", "3"]);
        // Order keys untouched until the write-back fires.
        assert_eq!(c.get(&RowKey::new("2")).unwrap().order, 2.0);
    }

    #[test]
    fn move_across_group_boundary_is_refused() {
        let mut c = collection(vec![row("1", "todo", 1.0), row("2", "progress", 1.0)]);
        assert!(c.move_row(&RowKey::new("1"), 1).is_none());
        assert_eq!(keys(&c), vec!["1", "2"]);
    }

    #[test]
    fn move_past_edges_is_refused() {
        let mut c = collection(vec![row("1", "todo", 1.0), row("2", "todo", 2.0)]);
        assert!(c.move_row(&RowKey::new("1"), -1).is_none());
        assert!(c.move_row(&RowKey::new("2"), 1).is_none());
    }

    #[test]
    fn group_orders_reflect_display_positions() {
        let mut c = collection(vec![
            row("1", "todo", 1.0),
            row("2", "todo", 2.0),
            row("p", "progress", 1.0),
            row("3", "todo", 3.0),
        ]);
        c.move_row(&RowKey::new("3"), -1).unwrap();
        let (orders, pos) = c.group_orders(&RowKey::new("3")).unwrap();
        assert_eq!(orders, vec![1.0, 3.0, 2.0]);
        assert_eq!(pos, 1);
    }

    // ── remove / reinsert ──────────────────────────────────────────

    #[test]
    fn remove_and_reinsert_round_trip() {
        let mut c = collection(vec![row("1", "todo", 1.0), row("2", "todo", 2.0)]);
        let (index, removed) = c.remove(&RowKey::new("1")).unwrap();
        assert_eq!(index, 0);
        assert_eq!(keys(&c), vec!["2"]);
        c.reinsert(index, removed);
        assert_eq!(keys(&c), vec!["1", "2"]);
    }

    #[test]
    fn reposition_moves_regrouped_row_to_its_slot() {
        let mut c = collection(vec![
            row("1", "todo", 1.0),
            row("2", "todo", 2.0),
            row("p", "progress", 1.0),
        ]);
        c.mutate(&RowKey::new("1"), |r| {
            r.group = "progress".into();
            r.order = 2.0;
        })
        .unwrap();
        let index = c.reposition(&RowKey::new("1")).unwrap();
        assert_eq!(index, 2);
        assert_eq!(keys(&c), vec!["2", "p", "1"]);
    }

    // ── renumber / resort ──────────────────────────────────────────

    #[test]
    fn renumber_group_spaces_keys_in_display_order() {
        let mut c = collection(vec![
            row("1", "todo", 1.0),
            row("2", "todo", 1.0000000000000002),
            row("p", "progress", 5.0),
        ]);
        let writes = c.renumber_group("todo");
        assert_eq!(
            writes,
            vec![(RowKey::new("1"), 1.0), (RowKey::new("2"), 2.0)]
        );
        assert_eq!(c.get(&RowKey::new("p")).unwrap().order, 5.0);
    }

    #[test]
    fn resort_group_orders_by_key_in_place() {
        let mut c = collection(vec![
            row("1", "todo", 1.0),
            row("2", "todo", 2.0),
            row("p", "progress", 1.0),
        ]);
        c.set_order(&RowKey::new("1"), 3.0);
        c.resort_group("todo");
        assert_eq!(keys(&c), vec!["2", "1", "p"]);
    }
}
