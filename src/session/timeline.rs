//! Indexed view over `history ++ active ++ [pending]`.

use super::conversation::Turn;

/// Where a logical index lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    History(usize),
    Active(usize),
    Pending,
}

/// Read-only concatenation of the three turn sequences of a conversation.
#[derive(Debug, Clone, Copy)]
pub struct Timeline<'a> {
    history: &'a [Turn],
    active: &'a [Turn],
    pending: Option<&'a Turn>,
}

impl<'a> Timeline<'a> {
    pub fn new(history: &'a [Turn], active: &'a [Turn], pending: Option<&'a Turn>) -> Self {
        Self {
            history,
            active,
            pending,
        }
    }

    pub fn len(&self) -> usize {
        self.history.len() + self.active.len() + usize::from(self.pending.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the newest item.
    pub fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    pub fn slot(&self, index: usize) -> Option<Slot> {
        let active_start = self.history.len();
        let pending_index = active_start + self.active.len();
        if index < active_start {
            Some(Slot::History(index))
        } else if index < pending_index {
            Some(Slot::Active(index - active_start))
        } else if index == pending_index && self.pending.is_some() {
            Some(Slot::Pending)
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&'a Turn> {
        match self.slot(index)? {
            Slot::History(i) => self.history.get(i),
            Slot::Active(i) => self.active.get(i),
            Slot::Pending => self.pending,
        }
    }

    /// `cursor` if it is in range, otherwise the newest index (0 when empty).
    pub fn clamp(&self, cursor: usize) -> usize {
        match self.last_index() {
            Some(last) if cursor <= last => cursor,
            Some(last) => last,
            None => 0,
        }
    }

    /// One step back, wrapping from the first item to the last.
    pub fn prev_index(&self, cursor: usize) -> usize {
        match self.last_index() {
            None => 0,
            Some(last) => {
                let cursor = self.clamp(cursor);
                if cursor == 0 {
                    last
                } else {
                    cursor - 1
                }
            }
        }
    }

    /// One step forward, wrapping from the last item to the first.
    pub fn next_index(&self, cursor: usize) -> usize {
        match self.last_index() {
            None => 0,
            Some(last) => {
                let cursor = self.clamp(cursor);
                if cursor >= last {
                    0
                } else {
                    cursor + 1
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(labels: &[&str]) -> Vec<Turn> {
        labels.iter().map(|l| Turn::sealed(*l, "")).collect()
    }

    #[test]
    fn slots_follow_concatenation_order() {
        let history = turns(&["h0", "h1"]);
        let active = turns(&["a0"]);
        let pending = Turn::new("p");
        let view = Timeline::new(&history, &active, Some(&pending));

        assert_eq!(view.len(), 4);
        assert_eq!(view.slot(0), Some(Slot::History(0)));
        assert_eq!(view.slot(2), Some(Slot::Active(0)));
        assert_eq!(view.slot(3), Some(Slot::Pending));
        assert_eq!(view.slot(4), None);
        assert_eq!(view.get(1).map(Turn::question), Some("h1"));
        assert_eq!(view.get(3).map(Turn::question), Some("p"));
    }

    #[test]
    fn without_pending_the_tail_is_active() {
        let active = turns(&["a0", "a1"]);
        let view = Timeline::new(&[], &active, None);
        assert_eq!(view.slot(1), Some(Slot::Active(1)));
        assert_eq!(view.slot(2), None);
    }

    #[test]
    fn stepping_wraps_at_both_ends() {
        let active = turns(&["a", "b", "c"]);
        let view = Timeline::new(&[], &active, None);
        assert_eq!(view.next_index(2), 0);
        assert_eq!(view.prev_index(0), 2);
        assert_eq!(view.next_index(0), 1);
        assert_eq!(view.prev_index(2), 1);
    }

    #[test]
    fn out_of_range_cursor_resets_to_newest() {
        let active = turns(&["a", "b"]);
        let view = Timeline::new(&[], &active, None);
        assert_eq!(view.clamp(7), 1);
        assert_eq!(view.prev_index(7), 0);
    }

    #[test]
    fn empty_view_stays_at_zero() {
        let view = Timeline::new(&[], &[], None);
        assert!(view.is_empty());
        assert_eq!(view.next_index(0), 0);
        assert_eq!(view.prev_index(0), 0);
        assert_eq!(view.get(0), None);
    }
}
