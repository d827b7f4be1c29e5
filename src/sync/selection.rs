use crate::model::row::{Row, RowKey};

/// Keeps the cursor attached to a logical row identity across full list
/// replacement and other structural changes.
///
/// The selected row is always found again by key lookup, never by index; the
/// remembered index is only the fallback when the row disappeared.
#[derive(Debug, Default)]
pub struct ViewIdentityTracker {
    selected: Option<RowKey>,
    last_index: usize,
}

impl ViewIdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_key(&self) -> Option<&RowKey> {
        self.selected.as_ref()
    }

    /// Record an explicit selection change (cursor movement).
    pub fn select(&mut self, key: Option<RowKey>, index: usize) {
        self.selected = key;
        self.last_index = index;
    }

    /// Rewrite the tracked key after a temp→real promotion.
    pub fn retarget(&mut self, old: &RowKey, new: &RowKey) {
        if self.selected.as_ref() == Some(old) {
            self.selected = Some(new.clone());
        }
    }

    /// Re-attach the selection after any structural change. `rows` is the
    /// panel's display list. Returns the index of the selected row, falling
    /// back to the row that preceded the old index (clamped) when the
    /// tracked row is gone, or None when the list is empty.
    pub fn reattach(&mut self, rows: &[&Row]) -> Option<usize> {
        if rows.is_empty() {
            self.selected = None;
            self.last_index = 0;
            return None;
        }
        if let Some(key) = &self.selected
            && let Some(index) = rows.iter().position(|r| &r.key == key)
        {
            self.last_index = index;
            return Some(index);
        }
        let index = self.last_index.saturating_sub(1).min(rows.len() - 1);
        self.selected = Some(rows[index].key.clone());
        self.last_index = index;
        Some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row::RowFields;

    fn rows(keys: &[&str]) -> Vec<Row> {
        keys.iter()
            .enumerate()
            .map(|(i, k)| Row::new(RowKey::new(*k), "todo", i as f64, RowFields::titled(*k)))
            .collect()
    }

    fn reattach_to(t: &mut ViewIdentityTracker, rows: &[Row]) -> Option<usize> {
        let refs: Vec<&Row> = rows.iter().collect();
        t.reattach(&refs)
    }

    fn tracker_on(key: &str, index: usize) -> ViewIdentityTracker {
        let mut t = ViewIdentityTracker::new();
        t.select(Some(RowKey::new(key)), index);
        t
    }

    #[test]
    fn surviving_key_is_found_by_value() {
        let mut t = tracker_on("B", 1);
        let index = reattach_to(&mut t, &rows(&["A", "B", "D"]));
        assert_eq!(index, Some(1));
        assert_eq!(t.selected_key(), Some(&RowKey::new("B")));
    }

    #[test]
    fn surviving_key_found_even_after_index_shift() {
        let mut t = tracker_on("B", 1);
        let index = reattach_to(&mut t, &rows(&["X", "Y", "B"]));
        assert_eq!(index, Some(2));
    }

    #[test]
    fn missing_key_falls_back_to_row_above() {
        let mut t = tracker_on("B", 1);
        let index = reattach_to(&mut t, &rows(&["A", "C", "D"]));
        assert_eq!(index, Some(0));
        assert_eq!(t.selected_key(), Some(&RowKey::new("A")));
    }

    #[test]
    fn fallback_clamps_to_bounds() {
        let mut t = tracker_on("Z", 9);
        let index = reattach_to(&mut t, &rows(&["A", "B"]));
        assert_eq!(index, Some(1));
        assert_eq!(t.selected_key(), Some(&RowKey::new("B")));
    }

    #[test]
    fn empty_list_selects_nothing() {
        let mut t = tracker_on("B", 1);
        assert_eq!(t.reattach(&[]), None);
        assert!(t.selected_key().is_none());
    }

    #[test]
    fn no_prior_selection_lands_on_first_row() {
        let mut t = ViewIdentityTracker::new();
        let index = reattach_to(&mut t, &rows(&["A", "B"]));
        assert_eq!(index, Some(0));
        assert_eq!(t.selected_key(), Some(&RowKey::new("A")));
    }

    #[test]
    fn retarget_rewrites_tracked_key() {
        let mut t = tracker_on("temp-1", 0);
        t.retarget(&RowKey::new("temp-1"), &RowKey::new("900"));
        assert_eq!(t.selected_key(), Some(&RowKey::new("900")));
    }

    #[test]
    fn retarget_ignores_other_keys() {
        let mut t = tracker_on("A", 0);
        t.retarget(&RowKey::new("temp-1"), &RowKey::new("900"));
        assert_eq!(t.selected_key(), Some(&RowKey::new("A")));
    }
}
