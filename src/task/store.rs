#![forbid(unsafe_code)]

//! The ordered task list and everything that follows from mutating it.
//!
//! Every successful mutation, in order: updates the list, writes the encoded
//! list to storage, adjusts reminders, then notifies observers.
//! Rejected mutations (blank text, unknown id, index out of range) change
//! nothing and have no side effects.

use tracing::{debug, warn};

use crate::error::TodoError;
use crate::reminder::{Clock, ReminderScheduler, SystemClock};
use crate::task::codec;
use crate::task::events::{ListEvent, ListObserver};
use crate::task::model::{Priority, Task};
use crate::task::storage::KeyValueStore;

/// The most recent removal, kept so it can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedTask {
    pub index: usize,
    pub task: Task,
}

pub struct TaskStore<S, R> {
    tasks: Vec<Task>,
    storage: S,
    key: String,
    scheduler: R,
    clock: Box<dyn Clock>,
    observers: Vec<Box<dyn ListObserver>>,
    last_removed: Option<RemovedTask>,
}

impl<S: KeyValueStore, R: ReminderScheduler> TaskStore<S, R> {
    /// Loads the list stored under `key`. A missing value is an empty list;
    /// an unreadable one is discarded and also yields an empty list.
    pub fn open(mut storage: S, key: impl Into<String>, scheduler: R) -> Self {
        let key = key.into();
        let tasks = load(&mut storage, &key);
        Self {
            tasks,
            storage,
            key,
            scheduler,
            clock: Box::new(SystemClock),
            observers: Vec::new(),
            last_removed: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn subscribe(&mut self, observer: impl ListObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn last_removed(&self) -> Option<&RemovedTask> {
        self.last_removed.as_ref()
    }

    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub fn scheduler(&self) -> &R {
        &self.scheduler
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Adds a task at the top of the list. Blank text is rejected.
    pub fn add(&mut self, text: &str, priority: Priority, due_millis: Option<i64>) -> Option<Task> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let task = Task::new(text, priority, due_millis);
        self.tasks.insert(0, task.clone());
        self.save();
        self.schedule_if_future(&task);
        self.notify(ListEvent::Inserted(0));
        debug!(id = %task.id, "task added");
        Some(task)
    }

    /// Replaces text and due time. Blank text or an unknown id is a no-op.
    pub fn edit(&mut self, id: &str, new_text: &str, new_due_millis: Option<i64>) -> bool {
        let text = new_text.trim();
        if text.is_empty() {
            return false;
        }
        let Some(pos) = self.position(id) else {
            return false;
        };

        let task = &mut self.tasks[pos];
        let had_due = task.due_millis.is_some();
        task.text = text.to_owned();
        task.due_millis = new_due_millis;

        self.save();
        if had_due {
            self.scheduler.cancel(id);
        }
        self.schedule_if_future(&self.tasks[pos]);
        self.notify(ListEvent::Changed(pos));
        true
    }

    /// Returns the new `done` value, or `None` for an unknown id.
    pub fn toggle_done(&mut self, id: &str) -> Option<bool> {
        self.toggle(id, |t| &mut t.done)
    }

    /// Returns the new `starred` value, or `None` for an unknown id.
    pub fn toggle_star(&mut self, id: &str) -> Option<bool> {
        self.toggle(id, |t| &mut t.starred)
    }

    /// Detaches the task at `index` and keeps it for [`Self::undo_remove`].
    pub fn remove_at(&mut self, index: usize) -> Option<Task> {
        if index >= self.tasks.len() {
            return None;
        }
        let task = self.tasks.remove(index);
        self.save();
        self.scheduler.cancel(&task.id);
        self.last_removed = Some(RemovedTask {
            index,
            task: task.clone(),
        });
        self.notify(ListEvent::Removed(index));
        debug!(id = %task.id, index, "task removed");
        Some(task)
    }

    /// Puts a removed task back. `index` is clamped to the current length.
    /// Returns the position it landed at.
    pub fn reinsert(&mut self, index: usize, task: Task) -> usize {
        let pos = index.min(self.tasks.len());
        if self
            .last_removed
            .as_ref()
            .is_some_and(|r| r.task.id == task.id)
        {
            self.last_removed = None;
        }
        self.tasks.insert(pos, task);
        self.save();
        self.schedule_if_future(&self.tasks[pos]);
        self.notify(ListEvent::Inserted(pos));
        pos
    }

    /// Reinserts the most recently removed task at its old index.
    pub fn undo_remove(&mut self) -> Option<usize> {
        let removed = self.last_removed.take()?;
        Some(self.reinsert(removed.index, removed.task))
    }

    /// Relocates the task at `from` to `to`, shifting the ones in between.
    pub fn move_task(&mut self, from: usize, to: usize) -> bool {
        let len = self.tasks.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }
        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        self.save();
        self.notify(ListEvent::Moved { from, to });
        true
    }

    /// Writes the current list unconditionally, e.g. when the app goes to
    /// the background.
    pub fn persist(&mut self) -> Result<(), TodoError> {
        let text = codec::encode(&self.tasks)?;
        self.storage.put(&self.key, &text)
    }

    /// Registers reminders for every task still due in the future.
    pub fn reschedule_all(&self) -> usize {
        let now = self.clock.now_millis();
        let mut count = 0;
        for task in self.tasks.iter().filter(|t| t.is_due_after(now)) {
            self.schedule(task);
            count += 1;
        }
        count
    }

    fn toggle(&mut self, id: &str, field: impl FnOnce(&mut Task) -> &mut bool) -> Option<bool> {
        let pos = self.position(id)?;
        let flag = field(&mut self.tasks[pos]);
        *flag = !*flag;
        let value = *flag;
        self.save();
        self.notify(ListEvent::Changed(pos));
        Some(value)
    }

    fn schedule_if_future(&self, task: &Task) {
        if task.is_due_after(self.clock.now_millis()) {
            self.schedule(task);
        }
    }

    fn schedule(&self, task: &Task) {
        if let Some(due) = task.due_millis {
            self.scheduler.schedule(&task.id, due, &task.text);
        }
    }

    fn notify(&mut self, event: ListEvent) {
        for observer in &mut self.observers {
            observer.on_change(&event, &self.tasks);
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.persist() {
            warn!("failed to save tasks under '{}': {e}", self.key);
        }
    }
}

fn load<S: KeyValueStore>(storage: &mut S, key: &str) -> Vec<Task> {
    let text = match storage.get(key) {
        Ok(Some(text)) => text,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("failed to read stored tasks under '{key}': {e}");
            return Vec::new();
        }
    };
    match codec::decode(&text) {
        Ok(tasks) => {
            debug!(count = tasks.len(), "loaded tasks");
            tasks
        }
        Err(e) => {
            warn!("{e}; clearing stored tasks under '{key}'");
            if let Err(e) = storage.remove(key) {
                warn!("failed to clear stored tasks under '{key}': {e}");
            }
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::task::storage::{DEFAULT_KEY, MemoryStore};

    const NOW: i64 = 1_700_000_000_000;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Schedule(String, i64, String),
        Cancel(String),
    }

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<Call>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Call> {
            self.calls.take()
        }
    }

    impl ReminderScheduler for Recorder {
        fn schedule(&self, task_id: &str, fire_at_millis: i64, display_text: &str) {
            self.calls.borrow_mut().push(Call::Schedule(
                task_id.to_owned(),
                fire_at_millis,
                display_text.to_owned(),
            ));
        }

        fn cancel(&self, task_id: &str) {
            self.calls
                .borrow_mut()
                .push(Call::Cancel(task_id.to_owned()));
        }
    }

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0
        }
    }

    fn store_with(storage: MemoryStore) -> TaskStore<MemoryStore, Recorder> {
        TaskStore::open(storage, DEFAULT_KEY, Recorder::default()).with_clock(FixedClock(NOW))
    }

    fn store() -> TaskStore<MemoryStore, Recorder> {
        store_with(MemoryStore::new())
    }

    fn texts(store: &TaskStore<MemoryStore, Recorder>) -> Vec<&str> {
        store.tasks().iter().map(|t| t.text.as_str()).collect()
    }

    fn stored(store: &TaskStore<MemoryStore, Recorder>) -> Vec<Task> {
        codec::decode(store.storage().value(DEFAULT_KEY).expect("stored value")).unwrap()
    }

    #[test]
    fn add_inserts_at_top_and_persists() {
        let mut s = store();
        let a = s.add("first", Priority::Normal, None).unwrap();
        let b = s.add("  second  ", Priority::Urgent, None).unwrap();
        assert_eq!(texts(&s), vec!["second", "first"]);
        assert_eq!(b.text, "second");
        assert_eq!(b.priority, Priority::Urgent);
        assert_ne!(a.id, b.id);
        assert_eq!(stored(&s), s.tasks());
        assert!(s.scheduler().take().is_empty());
    }

    #[test]
    fn add_rejects_blank_text() {
        let mut s = store();
        assert!(s.add("   ", Priority::High, Some(NOW + 1)).is_none());
        assert!(s.is_empty());
        assert_eq!(s.storage().value(DEFAULT_KEY), None);
        assert!(s.scheduler().take().is_empty());
    }

    #[test]
    fn add_schedules_only_future_due_times() {
        let mut s = store();
        let past = s.add("past", Priority::Normal, Some(NOW - 1)).unwrap();
        let exact = s.add("now", Priority::Normal, Some(NOW)).unwrap();
        let future = s.add("later", Priority::Normal, Some(NOW + 60_000)).unwrap();
        assert_eq!(past.due_millis, Some(NOW - 1));
        assert_eq!(exact.due_millis, Some(NOW));
        assert_eq!(
            s.scheduler().take(),
            vec![Call::Schedule(future.id, NOW + 60_000, "later".to_owned())]
        );
    }

    #[test]
    fn edit_updates_in_place_and_reschedules() {
        let mut s = store();
        let t = s.add("draft", Priority::Normal, Some(NOW + 1_000)).unwrap();
        s.add("other", Priority::Normal, None).unwrap();
        s.scheduler().take();

        assert!(s.edit(&t.id, " final ", Some(NOW + 5_000)));
        let edited = s.get(&t.id).unwrap();
        assert_eq!(edited.text, "final");
        assert_eq!(edited.due_millis, Some(NOW + 5_000));
        assert_eq!(s.position(&t.id), Some(1));
        assert_eq!(
            s.scheduler().take(),
            vec![
                Call::Cancel(t.id.clone()),
                Call::Schedule(t.id.clone(), NOW + 5_000, "final".to_owned())
            ]
        );

        assert!(s.edit(&t.id, "final", None));
        assert_eq!(s.scheduler().take(), vec![Call::Cancel(t.id.clone())]);
        assert_eq!(stored(&s)[1].due_millis, None);
    }

    #[test]
    fn edit_rejects_blank_text_and_unknown_ids() {
        let mut s = store();
        let t = s.add("keep", Priority::Normal, None).unwrap();
        assert!(!s.edit(&t.id, "  ", Some(NOW + 1)));
        assert!(!s.edit("missing", "x", None));
        assert_eq!(s.get(&t.id).unwrap().text, "keep");
        assert!(s.scheduler().take().is_empty());
    }

    #[test]
    fn toggles_flip_flags_without_scheduling() {
        let mut s = store();
        let t = s.add("x", Priority::Normal, Some(NOW + 1)).unwrap();
        s.scheduler().take();

        assert_eq!(s.toggle_done(&t.id), Some(true));
        assert_eq!(s.toggle_star(&t.id), Some(true));
        assert_eq!(s.toggle_done(&t.id), Some(false));
        assert_eq!(s.toggle_done("missing"), None);
        let got = s.get(&t.id).unwrap();
        assert!(!got.done);
        assert!(got.starred);
        assert!(stored(&s)[0].starred);
        assert!(s.scheduler().take().is_empty());
    }

    #[test]
    fn remove_then_reinsert_restores_list() {
        let mut s = store();
        s.add("buy milk", Priority::Normal, None).unwrap();
        let after_add = s.tasks().to_vec();

        let removed = s.remove_at(0).unwrap();
        assert!(s.is_empty());
        assert!(stored(&s).is_empty());
        assert_eq!(s.scheduler().take(), vec![Call::Cancel(removed.id.clone())]);

        assert_eq!(s.reinsert(0, removed), 0);
        assert_eq!(s.tasks(), after_add.as_slice());
        assert_eq!(stored(&s), after_add);
        assert!(s.last_removed().is_none());
    }

    #[test]
    fn remove_out_of_bounds_is_noop() {
        let mut s = store();
        s.add("a", Priority::Normal, None).unwrap();
        assert!(s.remove_at(1).is_none());
        assert_eq!(s.len(), 1);
        assert!(s.last_removed().is_none());
    }

    #[test]
    fn reinsert_clamps_and_reschedules_future_tasks() {
        let mut s = store();
        s.add("c", Priority::Normal, None).unwrap();
        s.add("b", Priority::Normal, None).unwrap();
        let a = s.add("a", Priority::Normal, Some(NOW + 10)).unwrap();
        s.scheduler().take();

        let removed = s.remove_at(2).unwrap();
        s.remove_at(0).unwrap();
        s.scheduler().take();

        assert_eq!(s.reinsert(2, removed), 1);
        assert_eq!(texts(&s), vec!["b", "c"]);
        assert!(s.scheduler().take().is_empty());

        assert_eq!(s.undo_remove(), Some(0));
        assert_eq!(texts(&s), vec!["a", "b", "c"]);
        assert_eq!(
            s.scheduler().take(),
            vec![Call::Schedule(a.id, NOW + 10, "a".to_owned())]
        );
        assert_eq!(s.undo_remove(), None);
    }

    #[test]
    fn undo_slot_holds_only_the_latest_removal() {
        let mut s = store();
        s.add("b", Priority::Normal, None).unwrap();
        s.add("a", Priority::Normal, None).unwrap();
        s.remove_at(0).unwrap();
        s.remove_at(0).unwrap();
        assert_eq!(s.last_removed().map(|r| r.task.text.as_str()), Some("b"));
        assert_eq!(s.undo_remove(), Some(0));
        assert_eq!(texts(&s), vec!["b"]);
        assert_eq!(s.undo_remove(), None);
    }

    #[test]
    fn move_shifts_instead_of_swapping() {
        let mut s = store();
        s.add("C", Priority::Normal, None).unwrap();
        s.add("B", Priority::Normal, None).unwrap();
        s.add("A", Priority::Normal, None).unwrap();

        assert!(s.move_task(0, 2));
        assert_eq!(texts(&s), vec!["B", "C", "A"]);
        assert!(s.move_task(2, 0));
        assert_eq!(texts(&s), vec!["A", "B", "C"]);
        assert_eq!(
            stored(&s).iter().map(|t| t.text.clone()).collect::<Vec<_>>(),
            vec!["A", "B", "C"]
        );

        assert!(!s.move_task(0, 3));
        assert!(!s.move_task(5, 0));
        assert_eq!(texts(&s), vec!["A", "B", "C"]);
    }

    #[test]
    fn observers_see_positional_events_and_snapshots() {
        let events: Rc<RefCell<Vec<(ListEvent, usize)>>> = Rc::default();
        let mut s = store();
        let sink = Rc::clone(&events);
        s.subscribe(move |e: &ListEvent, snapshot: &[Task]| {
            sink.borrow_mut().push((*e, snapshot.len()));
        });

        let t = s.add("a", Priority::Normal, None).unwrap();
        s.add("b", Priority::Normal, None).unwrap();
        s.toggle_done(&t.id);
        s.edit(&t.id, "a2", None);
        s.move_task(0, 1);
        let removed = s.remove_at(0).unwrap();
        s.reinsert(0, removed);
        s.move_task(9, 0);
        s.add(" ", Priority::Normal, None);

        assert_eq!(
            events.borrow().as_slice(),
            &[
                (ListEvent::Inserted(0), 1),
                (ListEvent::Inserted(0), 2),
                (ListEvent::Changed(1), 2),
                (ListEvent::Changed(1), 2),
                (ListEvent::Moved { from: 0, to: 1 }, 2),
                (ListEvent::Removed(0), 1),
                (ListEvent::Inserted(0), 2),
            ]
        );
    }

    #[test]
    #[allow(clippy::arc_with_non_send_sync)]
    fn observers_run_after_reminders_are_updated() {
        let recorder = std::sync::Arc::new(Recorder::default());
        let mut s = TaskStore::open(
            MemoryStore::new(),
            DEFAULT_KEY,
            std::sync::Arc::clone(&recorder),
        )
        .with_clock(FixedClock(NOW));
        let seen: Rc<RefCell<Vec<(ListEvent, Vec<Call>)>>> = Rc::default();
        let sink = Rc::clone(&seen);
        let calls = std::sync::Arc::clone(&recorder);
        s.subscribe(move |e: &ListEvent, _: &[Task]| {
            sink.borrow_mut().push((*e, calls.calls.borrow().clone()));
        });

        let t = s.add("ping", Priority::Normal, Some(NOW + 5)).unwrap();
        s.remove_at(0).unwrap();

        let schedule = Call::Schedule(t.id.clone(), NOW + 5, "ping".to_owned());
        assert_eq!(
            seen.borrow().as_slice(),
            &[
                (ListEvent::Inserted(0), vec![schedule.clone()]),
                (ListEvent::Removed(0), vec![schedule, Call::Cancel(t.id.clone())]),
            ]
        );
    }

    #[test]
    fn opens_tolerantly_from_legacy_data() {
        let storage =
            MemoryStore::with_value(DEFAULT_KEY, r#"[{"id":5,"text":"x"}, 3, {"text":"y","done":true}]"#);
        let s = store_with(storage);
        assert_eq!(texts(&s), vec!["x", "y"]);
        assert_eq!(s.tasks()[0].id, "5");
        assert!(s.tasks()[1].done);
    }

    #[test]
    fn corrupt_storage_resets_and_clears_value() {
        for raw in [r#"{"not":"an array"}"#, "[{oops"] {
            let s = store_with(MemoryStore::with_value(DEFAULT_KEY, raw));
            assert!(s.is_empty());
            assert_eq!(s.storage().value(DEFAULT_KEY), None);
        }
    }

    #[test]
    fn persist_twice_is_idempotent() {
        let mut s = store();
        s.add("a", Priority::High, Some(NOW + 1)).unwrap();
        s.persist().unwrap();
        let once = s.storage().value(DEFAULT_KEY).map(str::to_owned);
        s.persist().unwrap();
        assert_eq!(s.storage().value(DEFAULT_KEY).map(str::to_owned), once);
    }

    #[test]
    fn reschedule_all_registers_future_reminders() {
        let raw = format!(
            r#"[{{"id":"a","text":"soon","dueMillis":{}}},{{"id":"b","text":"old","dueMillis":{}}},{{"id":"c","text":"none"}}]"#,
            NOW + 100,
            NOW - 100
        );
        let s = store_with(MemoryStore::with_value(DEFAULT_KEY, &raw));
        assert_eq!(s.reschedule_all(), 1);
        assert_eq!(
            s.scheduler().take(),
            vec![Call::Schedule("a".to_owned(), NOW + 100, "soon".to_owned())]
        );
    }
}
