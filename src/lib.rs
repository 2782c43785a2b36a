//! hrdesk - terminal console for HR records
//!
//! The core is the multi-step record form: field state, per-step gating,
//! debounced drafts and submission, with the REST API and terminal UI as
//! replaceable collaborators.

pub mod api;
pub mod app;
pub mod config;
pub mod form;
pub mod logging;
pub mod records;
pub mod session;
pub mod storage;
pub mod ui;
