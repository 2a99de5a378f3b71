//! Command handlers and terminal rendering

pub mod alloc;
pub mod history;
pub mod refresh;
pub mod setup;
pub mod spending;
pub mod summary;
pub mod ui;
