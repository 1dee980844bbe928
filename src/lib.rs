#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod reminder;
pub mod task;
