//! Worker pool for task execution
//!
//! This module provides:
//! - [`WorkerPool`] - Fixed set of workers with a two-phase shutdown
//! - [`WorkerState`] - Lifecycle of a single worker
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        WorkerPool                             │
//! │                                                               │
//! │   shard 0            shard 1                  shard N-1       │
//! │  ┌──────────────┐   ┌──────────────┐        ┌──────────────┐  │
//! │  │ work loop    │   │ work loop    │  ...   │ work loop    │  │
//! │  │ pop → run    │   │ pop → run    │        │ pop → run    │  │
//! │  │ → delay      │   │ → delay      │        │ → delay      │  │
//! │  ├──────────────┤   ├──────────────┤        ├──────────────┤  │
//! │  │ control path │   │ control path │        │ control path │  │
//! │  │ stop → drain │   │ stop → drain │        │ stop → drain │  │
//! │  │ → ack        │   │ → ack        │        │ → ack        │  │
//! │  └──────────────┘   └──────────────┘        └──────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//!              ▲ pop
//!              │
//!        ┌─────┴─────┐
//!        │ TaskQueue │
//!        └───────────┘
//! ```
//!
//! A task that has been popped always runs to completion; cancellation is
//! only observed while a worker waits on the queue or sleeps between tasks.

mod pool;
#[allow(clippy::module_inception)]
mod worker;

pub use pool::{PoolStats, WorkerPool, WorkerPoolStatus};
pub use worker::WorkerState;
