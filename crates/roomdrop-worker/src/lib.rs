//! # roomdrop-worker
//!
//! Background maintenance for the sync engine:
//! - a job executor that dispatches named jobs to registered handlers,
//! - a cron scheduler driving the periodic reapers,
//! - handlers for upload expiry, room expiry, and version retention.
//!
//! Jobs are few and strictly periodic, so the scheduler invokes the
//! executor directly; there is no durable job queue.

pub mod executor;
pub mod jobs;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use scheduler::CronScheduler;
