#![forbid(unsafe_code)]

pub mod timer;

use std::sync::Arc;

use sha2::{Digest as _, Sha256};
use tokio::sync::mpsc;

use crate::config::{Config, ReminderBackend};

pub use timer::TimerScheduler;

/// One-shot reminder registration keyed by task id.
///
/// Calls are fire-and-forget. Scheduling an id that already has a pending
/// reminder replaces it, so a task never fires twice.
pub trait ReminderScheduler {
    fn schedule(&self, task_id: &str, fire_at_millis: i64, display_text: &str);
    fn cancel(&self, task_id: &str);
}

impl<T: ReminderScheduler + ?Sized> ReminderScheduler for Box<T> {
    fn schedule(&self, task_id: &str, fire_at_millis: i64, display_text: &str) {
        (**self).schedule(task_id, fire_at_millis, display_text);
    }

    fn cancel(&self, task_id: &str) {
        (**self).cancel(task_id);
    }
}

impl<T: ReminderScheduler + ?Sized> ReminderScheduler for Arc<T> {
    fn schedule(&self, task_id: &str, fire_at_millis: i64, display_text: &str) {
        (**self).schedule(task_id, fire_at_millis, display_text);
    }

    fn cancel(&self, task_id: &str) {
        (**self).cancel(task_id);
    }
}

/// Used when reminders are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScheduler;

impl ReminderScheduler for NoopScheduler {
    fn schedule(&self, _task_id: &str, _fire_at_millis: i64, _display_text: &str) {}
    fn cancel(&self, _task_id: &str) {}
}

/// A reminder that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: String,
    pub fire_at_millis: i64,
    pub text: String,
}

impl Reminder {
    #[must_use]
    pub fn notification_text(&self, label: &str) -> String {
        if self.text.trim().is_empty() {
            label.to_owned()
        } else {
            format!("{label}: {}", self.text)
        }
    }
}

pub trait Clock {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
        i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
    }
}

/// Stable non-negative 31-bit code for platform alarm APIs that key pending
/// registrations by integer. Unlike `std`'s hasher this does not change
/// between runs.
#[must_use]
pub fn request_code(task_id: &str) -> i32 {
    let digest = Sha256::digest(task_id.as_bytes());
    let code = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & 0x7fff_ffff;
    i32::try_from(code).unwrap_or_default()
}

/// Builds the scheduler selected by `[reminders] backend`.
///
/// The timer backend needs a running tokio runtime; without one it falls
/// back to no reminders. The receiver yields reminders as they come due.
pub fn from_config(
    cfg: &Config,
) -> (
    Box<dyn ReminderScheduler>,
    Option<mpsc::UnboundedReceiver<Reminder>>,
) {
    if cfg.reminders.backend == ReminderBackend::None {
        return (Box::new(NoopScheduler), None);
    }
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let (scheduler, rx) = TimerScheduler::channel(handle);
            (Box::new(scheduler), Some(rx))
        }
        Err(e) => {
            tracing::warn!("reminders disabled, no tokio runtime available: {e}");
            (Box::new(NoopScheduler), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_text_uses_label() {
        let r = Reminder {
            task_id: "a".to_owned(),
            fire_at_millis: 1,
            text: "buy milk".to_owned(),
        };
        assert_eq!(r.notification_text("Reminder"), "Reminder: buy milk");

        let blank = Reminder {
            text: "  ".to_owned(),
            ..r
        };
        assert_eq!(blank.notification_text("Reminder"), "Reminder");
    }

    #[test]
    fn request_code_is_stable_and_non_negative() {
        let a = request_code("3f2a9c1e-0000-4000-8000-000000000000");
        assert_eq!(a, request_code("3f2a9c1e-0000-4000-8000-000000000000"));
        assert!(a >= 0);
        assert_ne!(request_code("1"), request_code("2"));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn disabled_backend_builds_noop() {
        let mut cfg = Config::default();
        cfg.reminders.backend = ReminderBackend::None;
        let (_scheduler, rx) = from_config(&cfg);
        assert!(rx.is_none());
    }

    #[tokio::test]
    async fn timer_backend_builds_inside_runtime() {
        let cfg = Config::default();
        let (_scheduler, rx) = from_config(&cfg);
        assert!(rx.is_some());
    }
}
