#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    /// Maps a stored level onto a priority. Anything outside 0..=2 is `None`.
    #[must_use]
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Normal),
            1 => Some(Self::High),
            2 => Some(Self::Urgent),
            _ => None,
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::High => 1,
            Self::Urgent => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.level()
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_level(i64::from(level))
            .ok_or_else(|| format!("invalid priority {level}: must be 0, 1 or 2"))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub starred: bool,
    #[serde(default)]
    pub due_millis: Option<i64>,
}

impl Task {
    #[must_use]
    pub fn new(text: impl Into<String>, priority: Priority, due_millis: Option<i64>) -> Self {
        Self {
            id: Self::new_id(),
            text: text.into(),
            done: false,
            priority,
            starred: false,
            due_millis,
        }
    }

    #[must_use]
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// True when the task carries a due time strictly after `now_millis`.
    #[must_use]
    pub fn is_due_after(&self, now_millis: i64) -> bool {
        self.due_millis.is_some_and(|due| due > now_millis)
    }

    /// Renders the due time the way the list row shows it, e.g.
    /// `Due: Mar 05, 02:30 PM`.
    #[must_use]
    pub fn due_label(&self, offset: UtcOffset) -> Option<String> {
        let millis = self.due_millis?;
        let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .ok()?
            .to_offset(offset);
        let fmt = time::format_description::parse(
            "[month repr:short] [day], [hour repr:12]:[minute] [period]",
        )
        .ok()?;
        let formatted = at.format(&fmt).ok()?;
        Some(format!("Due: {formatted}"))
    }
}
