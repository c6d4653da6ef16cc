//! taskmaster - a persistent task list
//!
//! - `model`: tasks, filters and configuration
//! - `io`: durable stores, the persistent cell, locking and file watching
//! - `ops`: the task store and drag-reorder reconciliation
//! - `cli`: the `tm` command line

pub mod cli;
pub mod io;
pub mod model;
pub mod ops;
