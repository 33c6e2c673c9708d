//! Wait for live document state to settle, and an in-memory TodoMVC bench
//! to wait on.
//!
//! [`wait_for`] polls a predicate every 20ms until it returns `true`. The
//! rest of the crate is what the TodoMVC suite drives with it: a small
//! document model, a mocked HTTP service, a demo app and a suite runner.

pub mod app;
pub mod config;
pub mod dom;
pub mod fixture;
pub mod model;
pub mod poll;
pub mod suite;
pub mod todomvc;

pub use config::HarnessConfig;
pub use poll::{
    DEFAULT_POLL_INTERVAL, PollState, PollTask, Resolution, WaitError, WaitOptions, try_wait_for,
    wait_for, wait_for_with,
};
pub use suite::{Assert, RunOptions, Suite, SuiteReport};
pub use todomvc::SuiteContext;
