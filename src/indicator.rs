use crate::entry::EntryId;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shown {
    id: EntryId,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct Reset {
    shown: Shown,
    due: Instant,
}

/// Transient "Copied!" marker. Each copy starts a new generation; a reset
/// only clears the marker if it belongs to the generation still on screen.
#[derive(Debug)]
pub struct CopiedIndicator {
    duration: Duration,
    generation: u64,
    shown: Option<Shown>,
    resets: Vec<Reset>,
}

impl CopiedIndicator {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            generation: 0,
            shown: None,
            resets: Vec::new(),
        }
    }

    pub fn mark(&mut self, id: EntryId, now: Instant) {
        self.generation += 1;
        let shown = Shown {
            id,
            generation: self.generation,
        };
        self.shown = Some(shown);
        self.resets.push(Reset {
            shown,
            due: now + self.duration,
        });
    }

    pub fn current(&self) -> Option<EntryId> {
        self.shown.map(|shown| shown.id)
    }

    pub fn is_copied(&self, id: EntryId) -> bool {
        self.current() == Some(id)
    }

    /// Runs every reset due at `now`. Returns true if the marker went away.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        let mut cleared = false;
        let shown = &mut self.shown;
        self.resets.retain(|reset| {
            if reset.due > now {
                return true;
            }
            if *shown == Some(reset.shown) {
                *shown = None;
                cleared = true;
            }
            false
        });
        cleared
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.resets.iter().map(|reset| reset.due).min()
    }

    pub fn clear(&mut self) {
        self.shown = None;
        self.resets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const TWO_SECONDS: Duration = Duration::from_secs(2);

    #[test]
    fn marker_expires_after_duration() {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let mut indicator = CopiedIndicator::new(TWO_SECONDS);
        indicator.mark(id, start);
        assert!(indicator.is_copied(id));
        assert!(!indicator.fire_due(start + Duration::from_millis(1999)));
        assert!(indicator.is_copied(id));
        assert!(indicator.fire_due(start + TWO_SECONDS));
        assert_eq!(indicator.current(), None);
        assert_eq!(indicator.next_due(), None);
    }

    #[test]
    fn earlier_timer_does_not_clear_later_copy() {
        let start = Instant::now();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut indicator = CopiedIndicator::new(TWO_SECONDS);
        indicator.mark(first, start);
        indicator.mark(second, start + Duration::from_millis(500));
        assert!(!indicator.is_copied(first));
        assert!(indicator.is_copied(second));

        assert!(!indicator.fire_due(start + TWO_SECONDS));
        assert!(indicator.is_copied(second));
        assert!(!indicator.is_copied(first));

        assert!(indicator.fire_due(start + Duration::from_millis(2500)));
        assert_eq!(indicator.current(), None);
    }

    #[test]
    fn recopying_same_entry_restarts_window() {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let mut indicator = CopiedIndicator::new(TWO_SECONDS);
        indicator.mark(id, start);
        indicator.mark(id, start + Duration::from_secs(1));
        assert!(!indicator.fire_due(start + TWO_SECONDS));
        assert!(indicator.is_copied(id));
        assert!(indicator.fire_due(start + Duration::from_secs(3)));
    }

    #[test]
    fn next_due_is_earliest_pending_reset() {
        let start = Instant::now();
        let mut indicator = CopiedIndicator::new(TWO_SECONDS);
        indicator.mark(Uuid::new_v4(), start);
        indicator.mark(Uuid::new_v4(), start + Duration::from_secs(1));
        assert_eq!(indicator.next_due(), Some(start + TWO_SECONDS));
        indicator.clear();
        assert_eq!(indicator.next_due(), None);
        assert_eq!(indicator.current(), None);
    }
}
