//! Bounded undo log for destructive edits.
//!
//! Each push raises a transient notice offering undo. The notice dismisses
//! itself after a fixed delay; undoing dismisses it immediately.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use sf_project::{ScenarioDef, VisualizationDef};

pub const UNDO_CAPACITY: usize = 10;
pub const UNDO_NOTICE_MS: u64 = 5000;

/// A reversible destructive action.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    /// Undo re-appends the visualization at the end of the list.
    VisualizationRemoved { visualization: VisualizationDef },
    /// Undo re-appends the scenario.
    ScenarioDeleted { scenario: ScenarioDef },
}

impl UndoEntry {
    pub fn describe(&self) -> String {
        match self {
            Self::VisualizationRemoved { visualization } => {
                format!("Removed visualization \"{}\"", visualization.title)
            }
            Self::ScenarioDeleted { scenario } => {
                format!("Deleted scenario \"{}\"", scenario.name)
            }
        }
    }
}

/// LIFO stack that silently drops its bottom entry beyond capacity.
#[derive(Debug, Clone)]
pub struct UndoStack<T> {
    capacity: usize,
    entries: VecDeque<T>,
}

impl<T> UndoStack<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from bottom (oldest) to top.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T> Default for UndoStack<T> {
    fn default() -> Self {
        Self::new(UNDO_CAPACITY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoNotice {
    pub message: String,
    pub shown_at: Instant,
    pub dismiss_after: Duration,
}

impl UndoNotice {
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) < self.dismiss_after
    }
}

/// Undo stack plus its confirmation notice.
#[derive(Debug, Clone)]
pub struct UndoLog {
    stack: UndoStack<UndoEntry>,
    notice: Option<UndoNotice>,
    notice_delay: Duration,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(UNDO_CAPACITY, Duration::from_millis(UNDO_NOTICE_MS))
    }
}

impl UndoLog {
    pub fn new(capacity: usize, notice_delay: Duration) -> Self {
        Self {
            stack: UndoStack::new(capacity),
            notice: None,
            notice_delay,
        }
    }

    pub fn record(&mut self, entry: UndoEntry, now: Instant) {
        self.notice = Some(UndoNotice {
            message: entry.describe(),
            shown_at: now,
            dismiss_after: self.notice_delay,
        });
        self.stack.push(entry);
    }

    /// Pop the newest entry and dismiss the notice.
    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.notice = None;
        self.stack.pop()
    }

    /// Visible notice at `now`; an expired notice is dropped.
    pub fn notice(&mut self, now: Instant) -> Option<&UndoNotice> {
        if self.notice.as_ref().is_some_and(|n| !n.is_visible(now)) {
            self.notice = None;
        }
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &UndoEntry> {
        self.stack.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_project::VisualizationKind;

    fn removed(n: usize) -> UndoEntry {
        UndoEntry::VisualizationRemoved {
            visualization: VisualizationDef {
                id: format!("v{}", n),
                title: format!("Chart {}", n),
                kind: VisualizationKind::LineChart,
                fields: vec!["revenue".to_string()],
            },
        }
    }

    #[test]
    fn eleventh_push_drops_the_oldest() {
        let mut stack = UndoStack::new(UNDO_CAPACITY);
        for n in 0..11 {
            stack.push(n);
        }
        assert_eq!(stack.len(), 10);
        assert_eq!(stack.iter().next(), Some(&1));
        assert_eq!(stack.pop(), Some(10));
    }

    #[test]
    fn pop_is_lifo_and_empty_pop_is_none() {
        let mut stack = UndoStack::new(3);
        stack.push("a");
        stack.push("b");
        assert_eq!(stack.pop(), Some("b"));
        assert_eq!(stack.pop(), Some("a"));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn notice_expires_after_delay() {
        let start = Instant::now();
        let mut log = UndoLog::new(10, Duration::from_millis(5000));
        log.record(removed(1), start);

        let notice = log.notice(start + Duration::from_millis(4999)).cloned();
        assert_eq!(notice.unwrap().message, "Removed visualization \"Chart 1\"");
        assert!(log.notice(start + Duration::from_millis(5000)).is_none());
        // Expiry hides the notice but keeps the entry undoable.
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn undo_dismisses_notice() {
        let start = Instant::now();
        let mut log = UndoLog::default();
        log.record(removed(1), start);
        assert_eq!(log.pop(), Some(removed(1)));
        assert!(log.notice(start).is_none());
    }

    #[test]
    fn new_entry_restarts_notice() {
        let start = Instant::now();
        let mut log = UndoLog::new(10, Duration::from_millis(100));
        log.record(removed(1), start);
        log.record(removed(2), start + Duration::from_millis(90));

        let notice = log.notice(start + Duration::from_millis(150)).cloned();
        assert_eq!(notice.unwrap().message, "Removed visualization \"Chart 2\"");
    }
}
