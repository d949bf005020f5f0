//! Transient multi-select state over a displayed entry list.
//!
//! `Selection` is a plain value object scoped to one screen session: it is
//! never persisted and never global. Batch deletion consumes the selected
//! ids at confirmation time and the selection is cleared afterwards.

use std::collections::HashSet;

/// Multi-select state for the currently displayed entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    active: bool,
    selected: HashSet<i64>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters selection mode via a long-press on an item.
    ///
    /// Entering the mode selects that item as part of the same operation.
    pub fn begin(&mut self, id: i64) {
        self.active = true;
        self.selected.insert(id);
    }

    /// Sets the selection state of exactly one entry, leaving all others
    /// untouched.
    pub fn toggle(&mut self, id: i64, value: bool) {
        if value {
            self.selected.insert(id);
        } else {
            self.selected.remove(&id);
        }
    }

    /// Sets every currently visible entry to `value`.
    pub fn select_all<I>(&mut self, visible: I, value: bool)
    where
        I: IntoIterator<Item = i64>,
    {
        for id in visible {
            self.toggle(id, value);
        }
    }

    /// Exits selection mode and resets every entry to unselected.
    pub fn clear(&mut self) {
        self.active = false;
        self.selected.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// The selected ids, in ascending order.
    pub fn selected_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.selected.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_selects_the_pressed_item() {
        let mut selection = Selection::new();
        selection.begin(7);
        assert!(selection.is_active());
        assert!(selection.is_selected(7));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn toggle_then_select_all_then_toggle() {
        let visible = [1, 2, 3];
        let mut selection = Selection::new();
        selection.begin(2);
        selection.select_all(visible, false);
        selection.toggle(1, true);
        assert_eq!(selection.selected_ids(), vec![1]);
    }

    #[test]
    fn clear_exits_mode_and_deselects_everything() {
        let mut selection = Selection::new();
        selection.begin(1);
        selection.toggle(2, true);
        selection.clear();
        assert!(!selection.is_active());
        assert!(selection.is_empty());
    }

    #[test]
    fn select_all_true_selects_visible_only() {
        let mut selection = Selection::new();
        selection.select_all([4, 5], true);
        assert_eq!(selection.selected_ids(), vec![4, 5]);
        assert!(!selection.is_selected(6));
    }
}
