#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::reminder::{Clock, Reminder, ReminderScheduler, SystemClock};

type Pending = HashMap<String, (u64, JoinHandle<()>)>;

/// In-process reminders: one tokio task per task id, sleeping until the due
/// time and then sending the [`Reminder`] on a channel.
pub struct TimerScheduler {
    handle: Handle,
    tx: mpsc::UnboundedSender<Reminder>,
    pending: Arc<Mutex<Pending>>,
    clock: Arc<dyn Clock + Send + Sync>,
    next_generation: AtomicU64,
}

impl TimerScheduler {
    #[must_use]
    pub fn new(handle: Handle, tx: mpsc::UnboundedSender<Reminder>) -> Self {
        Self {
            handle,
            tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            clock: Arc::new(SystemClock),
            next_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn channel(handle: Handle) -> (Self, mpsc::UnboundedReceiver<Reminder>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(handle, tx), rx)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn is_pending(&self, task_id: &str) -> bool {
        lock(&self.pending).contains_key(task_id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    fn generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl ReminderScheduler for TimerScheduler {
    fn schedule(&self, task_id: &str, fire_at_millis: i64, display_text: &str) {
        let delay_ms = fire_at_millis.saturating_sub(self.clock.now_millis()).max(0);
        let delay = Duration::from_millis(u64::try_from(delay_ms).unwrap_or_default());
        let generation = self.generation();
        let reminder = Reminder {
            task_id: task_id.to_owned(),
            fire_at_millis,
            text: display_text.to_owned(),
        };

        let tx = self.tx.clone();
        let pending = Arc::clone(&self.pending);
        let mut guard = lock(&self.pending);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = lock(&pending);
                if pending
                    .get(&reminder.task_id)
                    .is_some_and(|(g, _)| *g == generation)
                {
                    pending.remove(&reminder.task_id);
                }
            }
            let id = reminder.task_id.clone();
            if tx.send(reminder).is_err() {
                tracing::debug!(task_id = %id, "reminder receiver dropped");
            }
        });
        if let Some((_, previous)) = guard.insert(task_id.to_owned(), (generation, join)) {
            previous.abort();
        }
        tracing::debug!(task_id, fire_at_millis, "reminder scheduled");
    }

    fn cancel(&self, task_id: &str) {
        if let Some((_, join)) = lock(&self.pending).remove(task_id) {
            join.abort();
            tracing::debug!(task_id, "reminder cancelled");
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        for (_, (_, join)) in lock(&self.pending).drain() {
            join.abort();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
