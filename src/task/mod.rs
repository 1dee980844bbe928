#![forbid(unsafe_code)]

pub mod codec;
pub mod events;
pub mod model;
pub mod storage;
pub mod store;

use tokio::sync::mpsc;

use crate::config::{AppPaths, Config};
use crate::reminder::{self, Reminder, ReminderScheduler};
use crate::task::storage::FileStore;
use crate::task::store::TaskStore;

pub type FileTaskStore = TaskStore<FileStore, Box<dyn ReminderScheduler>>;

/// Opens the file-backed store described by `cfg`, with the configured
/// reminder backend, and re-arms reminders that are still due in the future.
/// The receiver, when present, yields due reminders.
pub fn open_from_config(
    cfg: &Config,
    paths: &AppPaths,
) -> anyhow::Result<(FileTaskStore, Option<mpsc::UnboundedReceiver<Reminder>>)> {
    cfg.validate()?;
    let storage = FileStore::new(cfg.storage_dir(paths));
    tracing::debug!(dir = %storage.dir().display(), key = %cfg.storage.key, "opening task store");
    let (scheduler, rx) = reminder::from_config(cfg);
    let store = TaskStore::open(storage, cfg.storage.key.clone(), scheduler);
    let rearmed = store.reschedule_all();
    if rearmed > 0 {
        tracing::info!(count = rearmed, "re-armed pending reminders");
    }
    Ok((store, rx))
}
