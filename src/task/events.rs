#![forbid(unsafe_code)]

use crate::task::model::Task;

/// Positional change published after each successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    Inserted(usize),
    Removed(usize),
    Moved { from: usize, to: usize },
    Changed(usize),
}

/// Receives change events together with the list as it is after the change.
pub trait ListObserver {
    fn on_change(&mut self, event: &ListEvent, snapshot: &[Task]);
}

impl<F> ListObserver for F
where
    F: FnMut(&ListEvent, &[Task]),
{
    fn on_change(&mut self, event: &ListEvent, snapshot: &[Task]) {
        self(event, snapshot);
    }
}
