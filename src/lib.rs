//! Core library for the bizplan-tools command line application.
//!
//! The library exposes the task-level helpers that power the command-line
//! interface as well as the tests. Inputs are described in [`config`], turned
//! into spreadsheet cells by [`formula`], written and read through [`io`],
//! checked by [`audit`], and the tasks are composed in [`pipeline`]. The
//! stage-gate runner in [`workflow`] drives those tasks as subprocesses.

pub mod audit;
pub mod config;
pub mod error;
pub mod formula;
pub mod gates;
pub mod io;
pub mod pipeline;
pub mod plan;
pub mod project;
pub mod publish;
pub mod research;
pub mod workflow;

pub use error::{Result, ToolError};
