//! # Provision
//!
//! Turns a resolved cluster spec into an ordered provisioning plan and runs
//! it against a virtualization platform.
//!
//! ## Core Concepts
//!
//! - **Plan**: phases of platform steps, then guest script batches
//! - **Phase**: steps submitted together and awaited together
//! - **Executor**: runs phases in order and stops at the first failure
//!
//! ## Example
//!
//! ```ignore
//! use clusterfile::{AutoConfirm, ClusterFile, LabelOrder};
//! use provision::{ExecuteOptions, Plan, execute_simple};
//!
//! let spec = ClusterFile::load(path)?.read(&mut AutoConfirm)?;
//! let plan = Plan::create(&spec, LabelOrder::default())?;
//! println!("{plan}");
//!
//! let summary = execute_simple(&plan, ExecuteOptions::default(), &platform, &waiter, &guest)?;
//! ```
//!
//! ## Collaborator Traits
//!
//! - [`Platform`]: inventory lookups and asynchronous task submission
//! - [`TaskWaiter`]: blocks until submitted tasks finish
//! - [`GuestExecutor`]: runs scripts inside guests
//! - [`ConfirmCallback`]: accepts or declines destructive phases
//! - [`ProgressCallback`]: receives progress updates

pub mod context;
pub mod executor;
pub mod planner;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, GuestExecutor, NoProgress, Platform,
    ProgressCallback, TaskWaiter,
};
pub use executor::{Executor, execute_simple};
pub use planner::{Action, Mode, Phase, Plan, Step};
pub use types::{
    ExecuteError, ExecuteOptions, ExecuteSummary, ObjectKind, ObjectRef, Result, StepResult,
    TaskId, TaskOutcome,
};
